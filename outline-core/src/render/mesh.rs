//! Mesh data consumed by the baker and the outline draw path.

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::error::{OutlineError, OutlineResult};

/// Indexed triangle mesh with an auxiliary channel for baked outline normals.
///
/// All per-vertex channels share the position count. Tangents are optional
/// as a whole: either empty or one per vertex, `w` holding handedness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub name: String,
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    #[serde(default)]
    tangents: Vec<Vec4>,
    submeshes: Vec<Vec<u32>>,
    #[serde(default)]
    baked_normals: Option<Vec<Vec3>>,
}

impl Mesh {
    pub fn new(
        name: impl Into<String>,
        positions: Vec<Vec3>,
        normals: Vec<Vec3>,
        tangents: Vec<Vec4>,
        submeshes: Vec<Vec<u32>>,
    ) -> OutlineResult<Self> {
        let n = positions.len();
        if normals.len() != n {
            return Err(OutlineError::ChannelLength { channel: "normals", expected: n, actual: normals.len() });
        }
        if !tangents.is_empty() && tangents.len() != n {
            return Err(OutlineError::ChannelLength { channel: "tangents", expected: n, actual: tangents.len() });
        }
        for (submesh, indices) in submeshes.iter().enumerate() {
            if let Some(&index) = indices.iter().find(|&&i| i as usize >= n) {
                return Err(OutlineError::IndexOutOfRange { submesh, index, vertex_count: n });
            }
        }
        Ok(Self { name: name.into(), positions, normals, tangents, submeshes, baked_normals: None })
    }

    pub fn vertex_count(&self) -> usize { self.positions.len() }
    pub fn is_empty(&self) -> bool { self.positions.is_empty() }

    pub fn positions(&self) -> &[Vec3] { &self.positions }
    pub fn normals(&self) -> &[Vec3] { &self.normals }
    pub fn tangents(&self) -> &[Vec4] { &self.tangents }
    pub fn has_tangents(&self) -> bool { !self.tangents.is_empty() }

    pub fn submesh_count(&self) -> usize { self.submeshes.len() }
    pub fn submesh(&self, index: usize) -> Option<&[u32]> { self.submeshes.get(index).map(Vec::as_slice) }

    /// Append a copy of the only submesh so the outline pass gets its own slot.
    /// Returns `false` when the mesh does not have exactly one submesh.
    pub(crate) fn duplicate_single_submesh(&mut self) -> bool {
        if self.submeshes.len() != 1 {
            return false;
        }
        let copy = self.submeshes[0].clone();
        self.submeshes.push(copy);
        true
    }

    /// Baked outline normals, if a bake has run.
    pub fn baked_normals(&self) -> Option<&[Vec3]> { self.baked_normals.as_deref() }

    pub(crate) fn set_baked_normals(&mut self, baked: Vec<Vec3>) -> OutlineResult<()> {
        if baked.len() != self.positions.len() {
            return Err(OutlineError::ChannelLength {
                channel: "baked_normals",
                expected: self.positions.len(),
                actual: baked.len(),
            });
        }
        self.baked_normals = Some(baked);
        Ok(())
    }
}

// Generate a unit-radius UV sphere centered at origin, scaled by radius.
// stacks: latitude segments (>= 3), slices: longitude segments (>= 3)
// The seam column and both poles repeat positions, which is what the smoother merges.
pub fn generate_uv_sphere(radius: f32, stacks: u32, slices: u32) -> Mesh {
    let stacks = stacks.max(3);
    let slices = slices.max(3);
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut tangents = Vec::new();
    let mut indices = Vec::new();

    for i in 0..=stacks {
        let v = i as f32 / stacks as f32; // 0..1
        let theta = v * std::f32::consts::PI; // 0..PI
        // snap the poles so their vertices share exact positions
        let (sin_t, cos_t) = match i {
            0 => (0.0, 1.0),
            i if i == stacks => (0.0, -1.0),
            _ => theta.sin_cos(),
        };
        for j in 0..=slices {
            let u = j as f32 / slices as f32; // 0..1
            // the seam column repeats column 0 exactly
            let phi = if j == slices { 0.0 } else { u * std::f32::consts::PI * 2.0 }; // 0..2PI
            let (sin_p, cos_p) = phi.sin_cos();

            let n = Vec3::new(sin_t * cos_p, cos_t, sin_t * sin_p);
            positions.push(n * radius);
            normals.push(n);
            // d(pos)/d(phi), well defined at the poles too
            tangents.push(Vec4::new(-sin_p, 0.0, cos_p, 1.0));
        }
    }

    let stride = slices + 1;
    for i in 0..stacks {
        for j in 0..slices {
            let a = i * stride + j;
            let b = a + 1;
            let c = a + stride;
            let d = c + 1;
            indices.extend_from_slice(&[a, c, b]);
            indices.extend_from_slice(&[b, c, d]);
        }
    }

    Mesh {
        name: format!("uv_sphere_{stacks}x{slices}"),
        positions,
        normals,
        tangents,
        submeshes: vec![indices],
        baked_normals: None,
    }
}

/// Axis-aligned cube with 4 vertices per face (24 total), so every corner
/// position is shared by three vertices with different face normals.
pub fn generate_split_cube(half_extent: f32) -> Mesh {
    // (normal, tangent) per face; bitangent = normal x tangent
    const FACES: [([f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0]),
    ];

    let mut positions = Vec::with_capacity(24);
    let mut normals = Vec::with_capacity(24);
    let mut tangents = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (n, t) in FACES {
        let n = Vec3::from(n);
        let t = Vec3::from(t);
        let b = n.cross(t);
        let base = positions.len() as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            positions.push((n + t * su + b * sv) * half_extent);
            normals.push(n);
            tangents.push(t.extend(1.0));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    Mesh {
        name: "split_cube".to_string(),
        positions,
        normals,
        tangents,
        submeshes: vec![indices],
        baked_normals: None,
    }
}
