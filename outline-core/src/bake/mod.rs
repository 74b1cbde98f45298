//! Outline normal baking.
//!
//! Produces the extrusion directions used by the outline fill pass and
//! stores them in the mesh's auxiliary channel. Shading normals are never
//! touched.

pub mod smooth;
pub mod tangent;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{OutlineError, OutlineResult};
use crate::render::mesh::Mesh;

pub use smooth::{smooth_normals, SmoothStats};
pub use tangent::{from_tangent_space, tangent_frame, to_tangent_space};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BakeOptions {
    /// Store the smoothed normal in tangent space (for skinned meshes).
    pub tangent_space: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BakeSummary {
    pub smooth: SmoothStats,
    pub duplicated_submesh: bool,
    pub submesh_count: usize,
    pub tangent_space: bool,
}

/// Bake outline normals into `mesh`.
///
/// Safe to repeat: the submesh is only duplicated while the mesh has exactly
/// one. Must not run while a draw reads the same mesh.
pub fn bake_in_place(mesh: &mut Mesh, options: &BakeOptions) -> OutlineResult<BakeSummary> {
    if mesh.is_empty() {
        return Err(OutlineError::EmptyMesh);
    }

    // Compute everything before mutating so a failure leaves the mesh untouched.
    let (smoothed, smooth) = smooth_normals(mesh.positions(), mesh.normals())?;
    let baked = if options.tangent_space {
        to_tangent_space(&smoothed, mesh.normals(), mesh.tangents())?
    } else {
        smoothed
    };

    let duplicated_submesh = mesh.duplicate_single_submesh();
    if duplicated_submesh {
        debug!("{}: duplicated submesh 0 for the outline material slot", mesh.name);
    }
    mesh.set_baked_normals(baked)?;

    let summary = BakeSummary {
        smooth,
        duplicated_submesh,
        submesh_count: mesh.submesh_count(),
        tangent_space: options.tangent_space,
    };
    info!(
        "baked {} ({} vertices, {} groups, tangent_space={})",
        mesh.name, smooth.vertices, smooth.groups, options.tangent_space
    );
    Ok(summary)
}

/// Non-mutating form of [`bake_in_place`].
pub fn bake_mesh(mesh: &Mesh, options: &BakeOptions) -> OutlineResult<Mesh> {
    let mut baked = mesh.clone();
    bake_in_place(&mut baked, options)?;
    Ok(baked)
}
