//! Position-grouped normal smoothing.
//!
//! Hard edges and UV seams split a geometric corner into several vertices,
//! each with its own normal. Extruding those along their own normals tears
//! the outline open at the seam, so every vertex instead receives the
//! normalized sum of all normals found at its exact position.

use std::collections::HashMap;

use glam::Vec3;
use log::{debug, warn};

use crate::error::{OutlineError, OutlineResult};

/// Counters from one smoothing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SmoothStats {
    pub vertices: usize,
    pub groups: usize,
    /// Groups whose normals cancelled out (or were not finite).
    pub degenerate_groups: usize,
}

/// Exact position key. `-0.0` and `+0.0` compare equal as floats, so they
/// must land in the same bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PositionKey([u32; 3]);

impl PositionKey {
    fn new(p: Vec3) -> Self {
        let canon = |v: f32| if v == 0.0 { 0.0f32.to_bits() } else { v.to_bits() };
        Self([canon(p.x), canon(p.y), canon(p.z)])
    }
}

struct VertexGroup {
    sum: Vec3,
    first: Vec3,
}

impl VertexGroup {
    fn resolve(&self) -> Option<Vec3> {
        self.sum.try_normalize()
    }

    /// Cancelled sums fall back to the first member's normal so the whole
    /// group still shares one value.
    fn fallback(&self) -> Vec3 {
        self.first.try_normalize().unwrap_or(Vec3::ZERO)
    }
}

/// Average normals across vertices that share a position.
///
/// Output order matches the input; vertices with identical positions get
/// bit-identical normals.
pub fn smooth_normals(positions: &[Vec3], normals: &[Vec3]) -> OutlineResult<(Vec<Vec3>, SmoothStats)> {
    if positions.len() != normals.len() {
        return Err(OutlineError::ChannelLength {
            channel: "normals",
            expected: positions.len(),
            actual: normals.len(),
        });
    }

    let mut groups: HashMap<PositionKey, VertexGroup> = HashMap::with_capacity(positions.len());
    for (p, n) in positions.iter().zip(normals) {
        groups
            .entry(PositionKey::new(*p))
            .and_modify(|g| g.sum += *n)
            .or_insert(VertexGroup { sum: *n, first: *n });
    }

    let mut resolved: HashMap<PositionKey, Vec3> = HashMap::with_capacity(groups.len());
    let mut degenerate_groups = 0;
    for (key, group) in &groups {
        let normal = match group.resolve() {
            Some(n) => n,
            None => {
                degenerate_groups += 1;
                warn!("normals cancel at position {:?}; keeping first vertex normal", f32_triplet(key));
                group.fallback()
            }
        };
        resolved.insert(*key, normal);
    }

    let out: Vec<Vec3> = positions.iter().map(|p| resolved[&PositionKey::new(*p)]).collect();
    let stats = SmoothStats { vertices: positions.len(), groups: groups.len(), degenerate_groups };
    debug!(
        "smoothed {} vertices into {} position groups ({} degenerate)",
        stats.vertices, stats.groups, stats.degenerate_groups
    );
    Ok((out, stats))
}

fn f32_triplet(key: &PositionKey) -> [f32; 3] {
    key.0.map(f32::from_bits)
}
