//! Error types for baking and outline setup.

use thiserror::Error;

/// Result type for outline operations.
pub type OutlineResult<T> = Result<T, OutlineError>;

/// Errors raised by baking, outline setup and frame sequencing.
///
/// Steady-state conditions (a missing compositor program, a degenerate
/// normal group) are not errors and never show up here.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OutlineError {
    /// Mesh has no vertex data to bake.
    #[error("mesh is empty")]
    EmptyMesh,

    /// A per-vertex channel does not match the position count.
    #[error("channel `{channel}` has {actual} entries, expected {expected}")]
    ChannelLength {
        channel: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A submesh references a vertex that does not exist.
    #[error("submesh {submesh} references vertex {index} (mesh has {vertex_count} vertices)")]
    IndexOutOfRange {
        submesh: usize,
        index: u32,
        vertex_count: usize,
    },

    /// Tangent-space baking was requested on a mesh without tangents.
    #[error("tangent-space bake requested but mesh has no tangents")]
    MissingTangents,

    #[error("outline has no mesh sources")]
    NoMeshSources,

    #[error("outline has no renderers")]
    NoRenderers,

    /// Stencil layer does not fit an 8-bit stencil buffer.
    #[error("stencil layer {0} out of range (0..8)")]
    InvalidLayer(u32),

    /// A frame was started before the ping-pong targets were allocated.
    #[error("frame buffers are not allocated")]
    TargetsNotAllocated,

    /// The render-target allocator refused a request.
    #[error("render target allocation failed: {0}")]
    Allocation(String),
}
