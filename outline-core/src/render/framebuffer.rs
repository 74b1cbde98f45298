//! Ping-pong color targets for full-screen post passes.
//!
//! Every stage reads one buffer and writes the other, then flips which one is
//! "current". A frame is recorded through [`FrameRecording`], which borrows
//! the sequencer mutably, so the pair cannot be reallocated mid-frame.

use log::{debug, info};

use crate::error::{OutlineError, OutlineResult};
use crate::render::backend::{CommandRecorder, Extent, RenderTargetAllocator, RenderTargetHandle, TargetDesc, TargetFormat};
use crate::render::material::MaterialParameterBlock;

#[derive(Debug)]
pub struct FrameBufferSequencer {
    format: TargetFormat,
    extent: Option<Extent>,
    targets: Option<[RenderTargetHandle; 2]>,
    current: usize,
    toggles: u64,
}

/// What one recorded frame did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub composited: bool,
    /// Role flips during this frame: 2 for pass-through, 3 with a composite.
    pub toggles: u64,
}

impl FrameBufferSequencer {
    pub fn new(format: TargetFormat) -> Self {
        Self { format, extent: None, targets: None, current: 0, toggles: 0 }
    }

    /// Make sure both targets match `extent`. Returns `true` when they were (re)allocated.
    ///
    /// The format never changes. On failure the previous pair stays in place.
    pub fn configure<A: RenderTargetAllocator>(&mut self, allocator: &mut A, extent: Extent) -> OutlineResult<bool> {
        if self.targets.is_some() && self.extent == Some(extent) {
            return Ok(false);
        }
        let desc = TargetDesc { extent, format: self.format };
        let first = allocator.acquire(&desc)?;
        let second = match allocator.acquire(&desc) {
            Ok(t) => t,
            Err(e) => {
                allocator.release(first);
                return Err(e);
            }
        };
        if let Some(old) = self.targets.replace([first, second]) {
            old.into_iter().for_each(|t| allocator.release(t));
        }
        info!("frame buffers allocated at {}x{} ({:?})", extent.width, extent.height, self.format);
        self.extent = Some(extent);
        Ok(true)
    }

    pub fn release<A: RenderTargetAllocator>(&mut self, allocator: &mut A) {
        if let Some(targets) = self.targets.take() {
            targets.into_iter().for_each(|t| allocator.release(t));
            debug!("frame buffers released");
        }
        self.extent = None;
    }

    /// Copy the camera color into the current buffer and start a frame.
    pub fn begin_frame<'a, C: CommandRecorder>(
        &'a mut self,
        recorder: &'a mut C,
        camera: RenderTargetHandle,
    ) -> OutlineResult<FrameRecording<'a, C>> {
        let targets = self.targets.ok_or(OutlineError::TargetsNotAllocated)?;
        let start = self.toggles;
        let mut frame = FrameRecording { seq: self, recorder, camera, targets, start, composited: false, finished: false };
        let current = frame.targets[frame.seq.current];
        frame.stage(camera, current, None);
        Ok(frame)
    }

    pub fn current_index(&self) -> usize { self.current }
    pub fn back_index(&self) -> usize { 1 - self.current }
    pub fn targets(&self) -> Option<[RenderTargetHandle; 2]> { self.targets }
    pub fn extent(&self) -> Option<Extent> { self.extent }
    pub fn format(&self) -> TargetFormat { self.format }
    /// Total role flips since creation.
    pub fn toggles(&self) -> u64 { self.toggles }

    fn toggle(&mut self) {
        self.current = 1 - self.current;
        self.toggles += 1;
    }
}

/// One frame in flight. Drop it only through [`FrameRecording::finish`].
#[must_use = "a frame must be finished to blit back to the camera"]
pub struct FrameRecording<'a, C: CommandRecorder> {
    seq: &'a mut FrameBufferSequencer,
    recorder: &'a mut C,
    camera: RenderTargetHandle,
    targets: [RenderTargetHandle; 2],
    start: u64,
    composited: bool,
    finished: bool,
}

impl<'a, C: CommandRecorder> FrameRecording<'a, C> {
    /// Run `program` over the most recent result, writing the other buffer.
    pub fn composite(&mut self, program: &MaterialParameterBlock) {
        let (back, current) = (self.back(), self.current());
        self.stage(back, current, Some(program));
        self.composited = true;
    }

    /// Blit the most recent result back onto the camera target.
    pub fn finish(mut self) -> CycleReport {
        let back = self.back();
        self.stage(back, self.camera, None);
        self.finished = true;
        CycleReport { composited: self.composited, toggles: self.seq.toggles - self.start }
    }

    /// Buffer holding the most recent write.
    pub fn back(&self) -> RenderTargetHandle { self.targets[self.seq.back_index()] }
    pub fn current(&self) -> RenderTargetHandle { self.targets[self.seq.current_index()] }

    fn stage(&mut self, source: RenderTargetHandle, destination: RenderTargetHandle, program: Option<&MaterialParameterBlock>) {
        debug_assert_ne!(source, destination, "stage would read and write the same target");
        self.recorder.blit(source, destination, program);
        self.seq.toggle();
    }
}

impl<C: CommandRecorder> Drop for FrameRecording<'_, C> {
    fn drop(&mut self) {
        debug_assert!(self.finished || std::thread::panicking(), "frame dropped before finish; camera target never written back");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::{Command, RecordingBackend};

    fn setup() -> (FrameBufferSequencer, RecordingBackend, RenderTargetHandle) {
        let mut backend = RecordingBackend::new();
        let camera = backend.camera_target(Extent::new(64, 32));
        let mut seq = FrameBufferSequencer::new(TargetFormat::Rgba32Float);
        assert!(seq.configure(&mut backend, Extent::new(64, 32)).unwrap());
        (seq, backend, camera)
    }

    fn blits(backend: &RecordingBackend) -> Vec<(RenderTargetHandle, RenderTargetHandle)> {
        backend
            .commands()
            .iter()
            .map(|c| match c {
                Command::Blit { source, destination, .. } => (*source, *destination),
            })
            .collect()
    }

    #[test]
    fn pass_through_copies_in_and_back() {
        let (mut seq, mut backend, camera) = setup();
        let [a, b] = seq.targets().unwrap();
        let report = seq.begin_frame(&mut backend, camera).unwrap().finish();

        assert!(!report.composited);
        assert_eq!(report.toggles % 2, 0);
        assert_eq!(blits(&backend), vec![(camera, a), (a, camera)]);
        assert_ne!(a, b);
    }

    #[test]
    fn composite_reads_back_and_writes_current() {
        let (mut seq, mut backend, camera) = setup();
        let [a, b] = seq.targets().unwrap();
        let program = MaterialParameterBlock::new("post/outline");

        let mut frame = seq.begin_frame(&mut backend, camera).unwrap();
        assert_eq!(frame.back(), a);
        frame.composite(&program);
        assert_ne!(frame.back(), frame.current());
        let report = frame.finish();

        assert!(report.composited);
        assert_eq!(report.toggles % 2, 1);
        assert_eq!(blits(&backend), vec![(camera, a), (a, b), (b, camera)]);
        match &backend.commands()[1] {
            Command::Blit { program: p, .. } => assert_eq!(*p, Some(program.handle())),
        }
    }

    #[test]
    fn roles_never_coincide_across_frames() {
        let (mut seq, mut backend, camera) = setup();
        let program = MaterialParameterBlock::new("post/outline");
        for i in 0..6 {
            let mut frame = seq.begin_frame(&mut backend, camera).unwrap();
            if i % 2 == 0 {
                frame.composite(&program);
            }
            let _ = frame.finish();
            assert_ne!(seq.current_index(), seq.back_index());
        }
        assert!(blits(&backend).iter().all(|(s, d)| s != d));
    }

    #[test]
    fn reallocates_only_on_resize() {
        let (mut seq, mut backend, _) = setup();
        let before = seq.targets();
        assert!(!seq.configure(&mut backend, Extent::new(64, 32)).unwrap());
        assert_eq!(seq.targets(), before);
        assert_eq!(backend.allocations(), 2);

        assert!(seq.configure(&mut backend, Extent::new(128, 64)).unwrap());
        assert_ne!(seq.targets(), before);
        assert_eq!(backend.live_targets(), 2);
        let [a, _] = seq.targets().unwrap();
        let desc = backend.target_desc(a).unwrap();
        assert_eq!(desc.format, TargetFormat::Rgba32Float);
        assert_eq!(desc.extent, Extent::new(128, 64));

        seq.release(&mut backend);
        assert_eq!(backend.live_targets(), 0);
    }

    #[test]
    fn failed_resize_keeps_old_pair() {
        let (mut seq, mut backend, _) = setup();
        let before = seq.targets();
        backend.fail_allocations = true;
        assert!(matches!(seq.configure(&mut backend, Extent::new(8, 8)), Err(OutlineError::Allocation(_))));
        assert_eq!(seq.targets(), before);
        assert_eq!(seq.extent(), Some(Extent::new(64, 32)));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "frame dropped before finish")]
    fn unfinished_frame_panics_on_drop() {
        let (mut seq, mut backend, camera) = setup();
        let frame = seq.begin_frame(&mut backend, camera).unwrap();
        drop(frame);
    }

    #[test]
    fn frame_before_allocation_fails() {
        let mut backend = RecordingBackend::new();
        let camera = backend.camera_target(Extent::new(1, 1));
        let mut seq = FrameBufferSequencer::new(TargetFormat::Rgba32Float);
        assert!(matches!(seq.begin_frame(&mut backend, camera), Err(OutlineError::TargetsNotAllocated)));
    }
}
