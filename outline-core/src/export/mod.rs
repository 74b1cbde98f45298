//! Persisting baked meshes (JSON) and packing the baked channel for upload.

use std::path::Path;

use anyhow::{bail, Context, Result};
use glam::Vec3;
use log::info;
use serde::{Deserialize, Serialize};

use crate::render::mesh::Mesh;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BakedMeshFile {
    pub version: u32,
    pub tangent_space: bool,
    pub mesh: Mesh,
}

pub fn save_mesh_json<P: AsRef<Path>>(path: P, mesh: &Mesh, tangent_space: bool) -> Result<()> {
    let path = path.as_ref();
    if mesh.baked_normals().is_none() {
        bail!("mesh `{}` has not been baked", mesh.name);
    }
    let file = BakedMeshFile { version: FORMAT_VERSION, tangent_space, mesh: mesh.clone() };
    let text = serde_json::to_string_pretty(&file)?;
    std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
    info!("wrote baked mesh `{}` to {}", mesh.name, path.display());
    Ok(())
}

pub fn load_mesh_json<P: AsRef<Path>>(path: P) -> Result<BakedMeshFile> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_mesh_json(&text)
}

pub fn parse_mesh_json(text: &str) -> Result<BakedMeshFile> {
    let file: BakedMeshFile = serde_json::from_str(text).context("invalid baked mesh file")?;
    if file.version != FORMAT_VERSION {
        bail!("unsupported baked mesh version {} (expected {})", file.version, FORMAT_VERSION);
    }
    // re-run channel validation on whatever came off disk
    let m = &file.mesh;
    let submeshes = (0..m.submesh_count()).filter_map(|i| m.submesh(i)).map(<[u32]>::to_vec).collect();
    let mut checked = Mesh::new(m.name.clone(), m.positions().to_vec(), m.normals().to_vec(), m.tangents().to_vec(), submeshes)?;
    if let Some(baked) = m.baked_normals() {
        checked.set_baked_normals(baked.to_vec())?;
    }
    Ok(BakedMeshFile { mesh: checked, ..file })
}

/// Raw `f32x3` bytes of the baked channel, ready for a vertex buffer.
pub fn baked_channel_bytes(mesh: &Mesh) -> Option<&[u8]> {
    mesh.baked_normals().map(bytemuck::cast_slice::<Vec3, u8>)
}

/// Encode unit vectors as RGB8 (`n * 0.5 + 0.5`), one pixel per vertex.
pub fn encode_normals_rgb8(normals: &[Vec3]) -> Vec<u8> {
    normals
        .iter()
        .flat_map(|n| {
            let c = (*n * 0.5 + Vec3::splat(0.5)).clamp(Vec3::ZERO, Vec3::ONE) * 255.0;
            [c.x.round() as u8, c.y.round() as u8, c.z.round() as u8]
        })
        .collect()
}
