//! Screen-space outline post pass.
//!
//! Edge detection itself lives in the compositor shader; this module decides
//! whether it runs, feeds it parameters and sequences the ping-pong blits.

use glam::Vec4;
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::error::OutlineResult;
use crate::render::backend::{CommandRecorder, Extent, RenderTargetAllocator, RenderTargetHandle, TargetFormat};
use crate::render::framebuffer::{CycleReport, FrameBufferSequencer};
use crate::render::material::MaterialParameterBlock;

pub const COMPOSITOR_PROGRAM: &str = "post/outline";

pub const PARAM_WIDTH: &str = "width";
pub const PARAM_DISTANCE_THRESHOLD: &str = "distance_threshold";
pub const PARAM_NORMAL_THRESHOLD: &str = "normal_threshold";
pub const PARAM_NORMAL_THRESHOLD_SCALE: &str = "normal_threshold_scale";
pub const PARAM_COLOR: &str = "color";
pub const KEYWORD_OUTLINE_ONLY: &str = "OUTLINE_ONLY";

pub const MAX_WIDTH: f32 = 5.0;

/// Per-frame outline parameters, resolved by the caller each frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostProcessState {
    pub width: f32,
    pub distance_threshold: f32,
    pub normal_threshold: f32,
    pub normal_threshold_scale: f32,
    pub color: Vec4,
    /// Output only the outline, dropping scene color.
    pub only_outline: bool,
}

impl Default for PostProcessState {
    fn default() -> Self {
        Self {
            width: 0.0,
            distance_threshold: 1.0,
            normal_threshold: 1.0,
            normal_threshold_scale: 2.0,
            color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            only_outline: false,
        }
    }
}

impl PostProcessState {
    /// Width limited to `[0, MAX_WIDTH]`; NaN becomes 0.
    pub fn clamped(mut self) -> Self {
        self.width = if self.width.is_nan() { 0.0 } else { self.width.clamp(0.0, MAX_WIDTH) };
        self
    }

    pub fn is_active(&self) -> bool { self.width > 0.0 }

    fn push_into(&self, block: &mut MaterialParameterBlock) {
        block.set_float(PARAM_WIDTH, self.width);
        block.set_float(PARAM_DISTANCE_THRESHOLD, self.distance_threshold);
        block.set_float(PARAM_NORMAL_THRESHOLD, self.normal_threshold);
        block.set_float(PARAM_NORMAL_THRESHOLD_SCALE, self.normal_threshold_scale);
        block.set_color(PARAM_COLOR, self.color);
        block.set_keyword(KEYWORD_OUTLINE_ONLY, self.only_outline);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraKind {
    Game,
    SceneView,
    Preview,
    Reflection,
}

impl CameraKind {
    /// Preview and reflection cameras never get post passes.
    pub fn wants_post(self) -> bool { matches!(self, Self::Game | Self::SceneView) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameContext {
    pub camera: CameraKind,
    pub color_target: RenderTargetHandle,
    pub extent: Extent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Skipped,
    Rendered(CycleReport),
}

#[derive(Debug)]
pub struct PostProcessOrchestrator {
    sequencer: FrameBufferSequencer,
    compositor: Option<MaterialParameterBlock>,
}

impl Default for PostProcessOrchestrator {
    fn default() -> Self { Self::new(Some(MaterialParameterBlock::new(COMPOSITOR_PROGRAM))) }
}

impl PostProcessOrchestrator {
    /// `compositor` is `None` when the host could not provide the shader;
    /// frames then pass through unchanged.
    pub fn new(compositor: Option<MaterialParameterBlock>) -> Self {
        if compositor.is_none() {
            debug!("no outline compositor; post pass runs as pass-through");
        }
        Self { sequencer: FrameBufferSequencer::new(TargetFormat::Rgba32Float), compositor }
    }

    /// Record one frame for one camera.
    pub fn render_frame<A, C>(
        &mut self,
        ctx: &FrameContext,
        state: &PostProcessState,
        allocator: &mut A,
        recorder: &mut C,
    ) -> OutlineResult<FrameOutcome>
    where
        A: RenderTargetAllocator,
        C: CommandRecorder,
    {
        if !ctx.camera.wants_post() {
            trace!("skipping post pass for {:?} camera", ctx.camera);
            return Ok(FrameOutcome::Skipped);
        }
        self.sequencer.configure(allocator, ctx.extent)?;
        let state = state.clone().clamped();

        let compositor = match self.compositor.as_mut() {
            Some(block) if state.is_active() => {
                state.push_into(block);
                Some(&*block)
            }
            _ => None,
        };

        let mut frame = self.sequencer.begin_frame(recorder, ctx.color_target)?;
        if let Some(block) = compositor {
            frame.composite(block);
        }
        Ok(FrameOutcome::Rendered(frame.finish()))
    }

    /// Whether the composite stage would run for `state`.
    pub fn is_enabled(&self, state: &PostProcessState) -> bool {
        state.is_active() && self.compositor.is_some()
    }

    pub fn compositor(&self) -> Option<&MaterialParameterBlock> { self.compositor.as_ref() }
    pub fn sequencer(&self) -> &FrameBufferSequencer { &self.sequencer }

    /// Release both frame buffers.
    pub fn dispose<A: RenderTargetAllocator>(&mut self, allocator: &mut A) {
        self.sequencer.release(allocator);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backend::{Command, RecordingBackend};

    fn frame(backend: &mut RecordingBackend, camera: CameraKind) -> FrameContext {
        let extent = Extent::new(320, 180);
        FrameContext { camera, color_target: backend.camera_target(extent), extent }
    }

    fn active() -> PostProcessState {
        PostProcessState { width: 1.5, only_outline: true, ..Default::default() }
    }

    #[test]
    fn active_state_composites_and_pushes_params() {
        let mut backend = RecordingBackend::new();
        let ctx = frame(&mut backend, CameraKind::Game);
        let mut alloc = RecordingBackend::new();
        let mut post = PostProcessOrchestrator::default();

        let outcome = post.render_frame(&ctx, &active(), &mut alloc, &mut backend).unwrap();
        match outcome {
            FrameOutcome::Rendered(report) => assert!(report.composited),
            FrameOutcome::Skipped => panic!("game camera skipped"),
        }
        let block = post.compositor().unwrap();
        assert_eq!(block.float(PARAM_WIDTH), Some(1.5));
        assert_eq!(block.float(PARAM_NORMAL_THRESHOLD_SCALE), Some(2.0));
        assert!(block.keyword_enabled(KEYWORD_OUTLINE_ONLY));
        assert_eq!(backend.commands().len(), 3);
    }

    #[test]
    fn zero_width_passes_through() {
        let mut backend = RecordingBackend::new();
        let ctx = frame(&mut backend, CameraKind::SceneView);
        let mut alloc = RecordingBackend::new();
        let mut post = PostProcessOrchestrator::default();

        let state = PostProcessState::default();
        assert!(!post.is_enabled(&state));
        let outcome = post.render_frame(&ctx, &state, &mut alloc, &mut backend).unwrap();
        assert!(matches!(outcome, FrameOutcome::Rendered(CycleReport { composited: false, toggles: 2 })));
        assert!(backend.commands().iter().all(|c| matches!(c, Command::Blit { program: None, .. })));
        assert!(post.compositor().unwrap().float(PARAM_WIDTH).is_none());
    }

    #[test]
    fn missing_compositor_degrades_to_copy() {
        let mut backend = RecordingBackend::new();
        let ctx = frame(&mut backend, CameraKind::Game);
        let mut alloc = RecordingBackend::new();
        let mut post = PostProcessOrchestrator::new(None);

        assert!(!post.is_enabled(&active()));
        let outcome = post.render_frame(&ctx, &active(), &mut alloc, &mut backend).unwrap();
        assert!(matches!(outcome, FrameOutcome::Rendered(CycleReport { composited: false, .. })));
        assert_eq!(backend.commands().len(), 2);
    }

    #[test]
    fn preview_and_reflection_cameras_are_skipped() {
        let mut backend = RecordingBackend::new();
        let mut alloc = RecordingBackend::new();
        let mut post = PostProcessOrchestrator::default();
        for kind in [CameraKind::Preview, CameraKind::Reflection] {
            let ctx = frame(&mut backend, kind);
            assert_eq!(post.render_frame(&ctx, &active(), &mut alloc, &mut backend).unwrap(), FrameOutcome::Skipped);
        }
        assert!(backend.commands().is_empty());
        assert_eq!(alloc.allocations(), 0);
    }

    #[test]
    fn resize_reallocates_and_dispose_releases() {
        let mut backend = RecordingBackend::new();
        let mut alloc = RecordingBackend::new();
        let mut post = PostProcessOrchestrator::default();
        let mut ctx = frame(&mut backend, CameraKind::Game);

        post.render_frame(&ctx, &active(), &mut alloc, &mut backend).unwrap();
        post.render_frame(&ctx, &active(), &mut alloc, &mut backend).unwrap();
        assert_eq!(alloc.allocations(), 2);

        ctx.extent = Extent::new(640, 360);
        post.render_frame(&ctx, &active(), &mut alloc, &mut backend).unwrap();
        assert_eq!(alloc.allocations(), 4);
        assert_eq!(alloc.live_targets(), 2);

        post.dispose(&mut alloc);
        assert_eq!(alloc.live_targets(), 0);
    }

    #[test]
    fn oversized_width_is_clamped_per_frame() {
        let mut backend = RecordingBackend::new();
        let ctx = frame(&mut backend, CameraKind::Game);
        let mut alloc = RecordingBackend::new();
        let mut post = PostProcessOrchestrator::default();

        let state = PostProcessState { width: 9.0, ..Default::default() };
        post.render_frame(&ctx, &state, &mut alloc, &mut backend).unwrap();
        assert_eq!(post.compositor().unwrap().float(PARAM_WIDTH), Some(MAX_WIDTH));
    }

    #[test]
    fn separate_allocator_and_recorder_never_alias() {
        let mut recorder = RecordingBackend::new();
        let mut targets = RecordingBackend::new();
        let ctx = frame(&mut recorder, CameraKind::Game);
        let mut post = PostProcessOrchestrator::default();

        post.render_frame(&ctx, &active(), &mut targets, &mut recorder).unwrap();
        let [a, b] = post.sequencer().targets().unwrap();
        assert!(ctx.color_target != a && ctx.color_target != b);
        for c in recorder.commands() {
            let Command::Blit { source, destination, .. } = c;
            assert_ne!(source, destination);
        }
    }

    #[test]
    fn clamp_limits_width() {
        assert_eq!(PostProcessState { width: 9.0, ..Default::default() }.clamped().width, MAX_WIDTH);
        assert_eq!(PostProcessState { width: -1.0, ..Default::default() }.clamped().width, 0.0);
        assert_eq!(PostProcessState { width: f32::NAN, ..Default::default() }.clamped().width, 0.0);
    }
}
