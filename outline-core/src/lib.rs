//! Outline rendering support: smoothed-normal baking for mesh outlines, the
//! outline mode depth/stencil policy, and the ping-pong sequencing of the
//! screen-space outline pass.

pub mod bake;
pub mod config;
pub mod error;
pub mod export;
pub mod render;

pub use error::{OutlineError, OutlineResult};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
