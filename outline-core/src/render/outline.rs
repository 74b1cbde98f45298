//! Mesh outline pass: backface expansion along baked normals.
//!
//! The effect draws two extra materials on every outlined surface. The mask
//! writes the layer bit into the stencil buffer, the fill extrudes the mesh
//! along its baked normals and only lands where the mask did not. Depth test
//! choices decide whether the outline shows in front of, behind, or through
//! occluders.

use glam::Vec4;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::bake::{bake_mesh, BakeOptions};
use crate::error::{OutlineError, OutlineResult};
use crate::render::material::{MaterialList, MaterialParameterBlock};
use crate::render::mesh::Mesh;

pub const FILL_PROGRAM: &str = "outline/fill";
pub const MASK_PROGRAM: &str = "outline/mask";

pub const PARAM_COLOR: &str = "outline_color";
pub const PARAM_WIDTH: &str = "outline_width";
pub const PARAM_Z_TEST: &str = "z_test";
pub const PARAM_STENCIL: &str = "stencil";
pub const KEYWORD_TANGENT_SPACE: &str = "TANGENT_SPACE";

/// Stencil buffers are 8 bits wide.
pub const MAX_LAYERS: u32 = 8;

/// Stencil layer index, always below [`MAX_LAYERS`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StencilLayer(u8);

impl StencilLayer {
    pub fn new(layer: u32) -> OutlineResult<Self> {
        if layer < MAX_LAYERS {
            Ok(Self(layer as u8))
        } else {
            Err(OutlineError::InvalidLayer(layer))
        }
    }

    pub fn index(self) -> u32 { u32::from(self.0) }

    /// Stencil reference and mask bit for this layer.
    pub fn bit(self) -> i32 { 1 << self.0 }
}

impl TryFrom<u32> for StencilLayer {
    type Error = OutlineError;

    fn try_from(layer: u32) -> OutlineResult<Self> { Self::new(layer) }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "RawMode")]
pub enum OutlineMode {
    /// Outline the visible part only.
    #[default]
    Normal,
    /// Outline only where the object is hidden.
    XRayOnly,
    /// Always outline, through occluders.
    XRay,
    /// Always outline, the fill stays depth tested.
    XRayFill,
}

impl OutlineMode {
    pub const ALL: [OutlineMode; 4] = [Self::Normal, Self::XRayOnly, Self::XRay, Self::XRayFill];

    /// Unknown values map to [`OutlineMode::Normal`].
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            1 => Self::XRayOnly,
            2 => Self::XRay,
            3 => Self::XRayFill,
            _ => Self::Normal,
        }
    }

    /// Unknown names map to [`OutlineMode::Normal`].
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "x_ray_only" | "xray_only" => Self::XRayOnly,
            "x_ray" | "xray" => Self::XRay,
            "x_ray_fill" | "xray_fill" => Self::XRayFill,
            _ => Self::Normal,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMode {
    Index(i64),
    Name(String),
}

impl From<RawMode> for OutlineMode {
    fn from(raw: RawMode) -> Self {
        match raw {
            RawMode::Index(i) => Self::from_raw(i),
            RawMode::Name(n) => Self::from_name(&n),
        }
    }
}

/// Depth comparison, with the raw codes the outline shaders expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum CompareFunction {
    Disabled = 0,
    Never = 1,
    Less = 2,
    Equal = 3,
    LessEqual = 4,
    Greater = 5,
    NotEqual = 6,
    GreaterEqual = 7,
    Always = 8,
}

impl CompareFunction {
    pub fn raw(self) -> i32 { self as i32 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutlinePolicy {
    pub fill_test: CompareFunction,
    pub mask_test: CompareFunction,
    /// Stencil reference and mask, shared by fill and mask.
    pub stencil: i32,
}

/// Depth/stencil policy for `mode` on stencil `layer`.
pub fn resolve_policy(mode: OutlineMode, layer: StencilLayer) -> OutlinePolicy {
    use CompareFunction::*;
    let (fill_test, mask_test) = match mode {
        OutlineMode::Normal => (LessEqual, LessEqual),
        OutlineMode::XRayOnly => (GreaterEqual, NotEqual),
        OutlineMode::XRay => (Always, Greater),
        OutlineMode::XRayFill => (Always, LessEqual),
    };
    OutlinePolicy { fill_test, mask_test, stencil: layer.bit() }
}

/// Push width, color, stencil and depth tests into the two blocks.
pub fn apply_policy(
    policy: &OutlinePolicy,
    width: f32,
    color: Vec4,
    fill: &mut MaterialParameterBlock,
    mask: &mut MaterialParameterBlock,
) {
    fill.set_float(PARAM_WIDTH, width);
    fill.set_color(PARAM_COLOR, color);
    fill.set_int(PARAM_STENCIL, policy.stencil);
    fill.set_int(PARAM_Z_TEST, policy.fill_test.raw());
    mask.set_int(PARAM_STENCIL, policy.stencil);
    mask.set_int(PARAM_Z_TEST, policy.mask_test.raw());
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineSettings {
    pub color: Vec4,
    pub width: f32,
    /// Bake normals in tangent space; the fill shader rebuilds them per frame.
    pub tangent_space: bool,
    /// Outlines on the same layer merge; different layers never interact.
    pub layer: u32,
    pub mode: OutlineMode,
    /// Skip baking at setup because the meshes were baked ahead of time.
    pub baked: bool,
}

impl Default for OutlineSettings {
    fn default() -> Self {
        Self { color: Vec4::ONE, width: 10.0, tangent_space: false, layer: 0, mode: OutlineMode::Normal, baked: false }
    }
}

/// Outline effect attached to a set of renderers.
///
/// Owns its fill and mask blocks. While enabled, both handles sit at the end
/// of every renderer's material list; dropping the outline detaches them.
#[derive(Debug)]
pub struct Outline<R: MaterialList> {
    settings: OutlineSettings,
    layer: StencilLayer,
    fill: MaterialParameterBlock,
    mask: MaterialParameterBlock,
    renderers: Vec<R>,
    enabled: bool,
    baked: bool,
}

impl<R: MaterialList> Outline<R> {
    /// Set up the effect, baking `meshes` unless `settings.baked` is set.
    ///
    /// On error nothing is modified: meshes are baked into copies and only
    /// written back once every bake succeeded.
    pub fn new(settings: OutlineSettings, meshes: &mut [Mesh], renderers: Vec<R>) -> OutlineResult<Self> {
        if meshes.is_empty() {
            return Err(OutlineError::NoMeshSources);
        }
        if renderers.is_empty() {
            return Err(OutlineError::NoRenderers);
        }
        let layer = StencilLayer::new(settings.layer)?;

        let mut outline = Self {
            baked: settings.baked,
            settings,
            layer,
            fill: MaterialParameterBlock::new(FILL_PROGRAM),
            mask: MaterialParameterBlock::new(MASK_PROGRAM),
            renderers,
            enabled: false,
        };
        if !outline.baked {
            outline.rebake(meshes)?;
        }
        outline.update_materials();
        Ok(outline)
    }

    /// Bake all meshes again. Stale bakes are never detected automatically.
    pub fn rebake(&mut self, meshes: &mut [Mesh]) -> OutlineResult<()> {
        let options = BakeOptions { tangent_space: self.settings.tangent_space };
        let baked = meshes.iter().map(|m| bake_mesh(m, &options)).collect::<OutlineResult<Vec<_>>>()?;
        for (slot, mesh) in meshes.iter_mut().zip(baked) {
            *slot = mesh;
        }
        self.baked = true;
        Ok(())
    }

    /// Push the current settings into the fill and mask blocks.
    pub fn update_materials(&mut self) {
        let policy = resolve_policy(self.settings.mode, self.layer);
        self.fill.set_keyword(KEYWORD_TANGENT_SPACE, self.settings.tangent_space);
        apply_policy(&policy, self.settings.width, self.settings.color, &mut self.fill, &mut self.mask);
        debug!(
            "outline materials: mode={:?} fill={:?} mask={:?} stencil={:#x}",
            self.settings.mode, policy.fill_test, policy.mask_test, policy.stencil
        );
    }

    /// Append the fill and mask handles to every renderer.
    pub fn enable(&mut self) {
        if self.enabled {
            return;
        }
        for r in &mut self.renderers {
            r.push_material(self.fill.handle());
            r.push_material(self.mask.handle());
        }
        self.enabled = true;
        info!("outline enabled on {} renderers", self.renderers.len());
    }

    /// Remove exactly the fill and mask handles from every renderer.
    pub fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        for r in &mut self.renderers {
            r.remove_material(self.fill.handle());
            r.remove_material(self.mask.handle());
        }
        self.enabled = false;
        info!("outline disabled on {} renderers", self.renderers.len());
    }

    pub fn set_width(&mut self, width: f32) {
        if (width - self.settings.width).abs() <= f32::EPSILON {
            return;
        }
        self.settings.width = width;
        self.update_materials();
    }

    pub fn set_color(&mut self, color: Vec4) {
        self.settings.color = color;
        self.update_materials();
    }

    pub fn set_mode(&mut self, mode: OutlineMode) {
        self.settings.mode = mode;
        self.update_materials();
    }

    pub fn set_layer(&mut self, layer: u32) -> OutlineResult<()> {
        self.layer = StencilLayer::new(layer)?;
        self.settings.layer = layer;
        self.update_materials();
        Ok(())
    }

    /// Only flips the shader keyword; call [`Outline::rebake`] to re-encode the meshes.
    pub fn set_tangent_space(&mut self, tangent_space: bool) {
        self.settings.tangent_space = tangent_space;
        self.update_materials();
    }

    pub fn settings(&self) -> &OutlineSettings { &self.settings }
    pub fn fill(&self) -> &MaterialParameterBlock { &self.fill }
    pub fn mask(&self) -> &MaterialParameterBlock { &self.mask }
    pub fn renderers(&self) -> &[R] { &self.renderers }
    pub fn is_enabled(&self) -> bool { self.enabled }
    pub fn is_baked(&self) -> bool { self.baked }
}

impl<R: MaterialList> Drop for Outline<R> {
    fn drop(&mut self) {
        self.disable();
    }
}
