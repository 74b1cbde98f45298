//! Seams to the host renderer: offscreen target allocation and blit recording.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, trace};

use crate::error::{OutlineError, OutlineResult};
use crate::render::material::{MaterialHandle, MaterialParameterBlock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub fn new(width: u32, height: u32) -> Self { Self { width, height } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    Rgba8Unorm,
    Rgba16Float,
    Rgba32Float,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetDesc {
    pub extent: Extent,
    pub format: TargetFormat,
}

/// Process-unique target identity, so handles from different backends never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderTargetHandle(u64);

impl RenderTargetHandle {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 { self.0 }
}

pub trait RenderTargetAllocator {
    fn acquire(&mut self, desc: &TargetDesc) -> OutlineResult<RenderTargetHandle>;
    fn release(&mut self, target: RenderTargetHandle);
}

pub trait CommandRecorder {
    /// Copy `source` into `destination`, optionally through a shader program.
    fn blit(&mut self, source: RenderTargetHandle, destination: RenderTargetHandle, program: Option<&MaterialParameterBlock>);
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Blit {
        source: RenderTargetHandle,
        destination: RenderTargetHandle,
        program: Option<MaterialHandle>,
    },
}

/// In-memory backend that hands out handles and records commands.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    live: BTreeMap<RenderTargetHandle, TargetDesc>,
    commands: Vec<Command>,
    allocations: usize,
    /// Refuse every allocation, to exercise error paths.
    pub fail_allocations: bool,
}

impl RecordingBackend {
    pub fn new() -> Self { Self::default() }

    /// Reserve a handle standing in for a camera color target.
    pub fn camera_target(&mut self, extent: Extent) -> RenderTargetHandle {
        let handle = RenderTargetHandle::next();
        debug!("camera target {:?} at {}x{}", handle, extent.width, extent.height);
        handle
    }

    pub fn commands(&self) -> &[Command] { &self.commands }
    pub fn take_commands(&mut self) -> Vec<Command> { std::mem::take(&mut self.commands) }
    pub fn live_targets(&self) -> usize { self.live.len() }
    pub fn allocations(&self) -> usize { self.allocations }
    pub fn target_desc(&self, handle: RenderTargetHandle) -> Option<&TargetDesc> { self.live.get(&handle) }
}

impl RenderTargetAllocator for RecordingBackend {
    fn acquire(&mut self, desc: &TargetDesc) -> OutlineResult<RenderTargetHandle> {
        if self.fail_allocations {
            return Err(OutlineError::Allocation(format!("{}x{} {:?}", desc.extent.width, desc.extent.height, desc.format)));
        }
        let handle = RenderTargetHandle::next();
        self.live.insert(handle, *desc);
        self.allocations += 1;
        debug!("acquire {:?}: {:?}", handle, desc);
        Ok(handle)
    }

    fn release(&mut self, target: RenderTargetHandle) {
        if self.live.remove(&target).is_some() {
            debug!("release {:?}", target);
        }
    }
}

impl CommandRecorder for RecordingBackend {
    fn blit(&mut self, source: RenderTargetHandle, destination: RenderTargetHandle, program: Option<&MaterialParameterBlock>) {
        trace!("blit {:?} -> {:?} via {:?}", source, destination, program.map(MaterialParameterBlock::program));
        self.commands.push(Command::Blit { source, destination, program: program.map(MaterialParameterBlock::handle) });
    }
}
