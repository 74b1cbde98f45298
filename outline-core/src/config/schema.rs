use serde::{Deserialize, Serialize};

use crate::render::outline::OutlineSettings;
use crate::render::post::PostProcessState;

/// Top-level YAML document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineConfig {
    /// Mesh outline (fill + mask materials).
    pub outline: OutlineSettings,
    /// Screen-space outline pass.
    pub post: PostProcessState,
}
