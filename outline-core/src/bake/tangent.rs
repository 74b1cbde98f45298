//! Re-express smoothed normals in each vertex's tangent frame.
//!
//! Skinned meshes move their tangent frames every frame. A normal stored in
//! object space goes stale as soon as the mesh deforms; stored in tangent
//! space, the vertex shader rebuilds it from the deformed TBN instead.

use glam::{Mat3, Vec3, Vec4};

use crate::error::{OutlineError, OutlineResult};

/// Orthonormal tangent frame of one vertex, columns (tangent, bitangent, normal).
pub fn tangent_frame(normal: Vec3, tangent: Vec4) -> Mat3 {
    let Some(n) = normal.try_normalize() else {
        return Mat3::IDENTITY;
    };
    // Gram-Schmidt with the normal held fixed
    let t = (tangent.truncate() - n * n.dot(tangent.truncate()))
        .try_normalize()
        .unwrap_or_else(|| n.any_orthonormal_vector());
    let handedness = if tangent.w < 0.0 { -1.0 } else { 1.0 };
    let b = (n.cross(t) * handedness).normalize();
    Mat3::from_cols(t, b, n)
}

/// Map object-space `smoothed` normals into the per-vertex tangent frames.
pub fn to_tangent_space(smoothed: &[Vec3], normals: &[Vec3], tangents: &[Vec4]) -> OutlineResult<Vec<Vec3>> {
    if tangents.is_empty() && !smoothed.is_empty() {
        return Err(OutlineError::MissingTangents);
    }
    check_len("normals", smoothed.len(), normals.len())?;
    check_len("tangents", smoothed.len(), tangents.len())?;

    Ok(smoothed
        .iter()
        .zip(normals.iter().zip(tangents))
        .map(|(s, (n, t))| tangent_frame(*n, *t).transpose() * *s)
        .collect())
}

/// Inverse of [`to_tangent_space`], the reconstruction the outline shader performs.
pub fn from_tangent_space(encoded: &[Vec3], normals: &[Vec3], tangents: &[Vec4]) -> OutlineResult<Vec<Vec3>> {
    check_len("normals", encoded.len(), normals.len())?;
    check_len("tangents", encoded.len(), tangents.len())?;
    Ok(encoded
        .iter()
        .zip(normals.iter().zip(tangents))
        .map(|(e, (n, t))| tangent_frame(*n, *t) * *e)
        .collect())
}

fn check_len(channel: &'static str, expected: usize, actual: usize) -> OutlineResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(OutlineError::ChannelLength { channel, expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn normal_maps_to_local_z() {
        let n = Vec3::new(0.0, 1.0, 0.0);
        let t = Vec4::new(1.0, 0.0, 0.0, 1.0);
        let out = to_tangent_space(&[n], &[n], &[t]).unwrap();
        assert_relative_eq!(out[0].z, 1.0, epsilon = 1e-6);
        assert_relative_eq!(out[0].truncate().length(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn round_trip_recovers_input() {
        let smoothed = [Vec3::new(0.3, 0.8, -0.52).normalize(), Vec3::new(-0.9, 0.1, 0.4).normalize()];
        let normals = [Vec3::new(0.1, 1.0, 0.0), Vec3::new(0.0, 0.2, 1.0)];
        // second tangent is skewed and left-handed
        let tangents = [Vec4::new(1.0, 0.0, 0.2, 1.0), Vec4::new(1.0, 0.5, 0.3, -1.0)];

        let ts = to_tangent_space(&smoothed, &normals, &tangents).unwrap();
        let back = from_tangent_space(&ts, &normals, &tangents).unwrap();
        for (a, b) in smoothed.iter().zip(&back) {
            assert_relative_eq!(a.x, b.x, epsilon = 1e-5);
            assert_relative_eq!(a.y, b.y, epsilon = 1e-5);
            assert_relative_eq!(a.z, b.z, epsilon = 1e-5);
        }
    }

    #[test]
    fn handedness_flips_bitangent() {
        let right = tangent_frame(Vec3::Z, Vec4::new(1.0, 0.0, 0.0, 1.0));
        let left = tangent_frame(Vec3::Z, Vec4::new(1.0, 0.0, 0.0, -1.0));
        assert_relative_eq!(right.y_axis.y, 1.0, epsilon = 1e-6);
        assert_relative_eq!(left.y_axis.y, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn degenerate_frames_stay_finite() {
        let parallel = tangent_frame(Vec3::Y, Vec4::new(0.0, 2.0, 0.0, 1.0));
        assert!(parallel.is_finite());
        assert_relative_eq!(parallel.x_axis.dot(Vec3::Y), 0.0, epsilon = 1e-6);

        assert_eq!(tangent_frame(Vec3::ZERO, Vec4::X), Mat3::IDENTITY);
    }

    #[test]
    fn missing_tangents_is_an_error() {
        let err = to_tangent_space(&[Vec3::Y], &[Vec3::Y], &[]).unwrap_err();
        assert_eq!(err, OutlineError::MissingTangents);
    }
}
