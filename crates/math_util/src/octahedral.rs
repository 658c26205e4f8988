//! Octahedral direction mapping
//!
//! Stores a full-sphere direction in a 2D square. Probe irradiance/depth
//! tiles use this layout; the border-patch pass relies on the mapping being
//! continuous across the diamond fold.

use glam::{Vec2, Vec3};

/// Encode a unit direction into octahedral UV in [-1, 1]².
pub fn oct_encode(dir: Vec3) -> Vec2 {
    let n = dir / (dir.x.abs() + dir.y.abs() + dir.z.abs());
    let mut uv = Vec2::new(n.x, n.y);
    if n.z < 0.0 {
        // Fold the lower hemisphere across the diagonal.
        uv = Vec2::new(
            (1.0 - n.y.abs()) * sign_not_zero(n.x),
            (1.0 - n.x.abs()) * sign_not_zero(n.y),
        );
    }
    uv
}

/// Decode octahedral UV in [-1, 1]² back into a unit direction.
pub fn oct_decode(uv: Vec2) -> Vec3 {
    let mut n = Vec3::new(uv.x, uv.y, 1.0 - uv.x.abs() - uv.y.abs());
    if n.z < 0.0 {
        let x = (1.0 - n.y.abs()) * sign_not_zero(n.x);
        let y = (1.0 - n.x.abs()) * sign_not_zero(n.y);
        n.x = x;
        n.y = y;
    }
    n.normalize()
}

#[inline]
fn sign_not_zero(v: f32) -> f32 {
    if v >= 0.0 {
        1.0
    } else {
        -1.0
    }
}

/// Texel coordinate inside an `interior`-sized octahedral tile for `dir`.
pub fn oct_texel(dir: Vec3, interior: u32) -> (u32, u32) {
    let uv = oct_encode(dir) * 0.5 + Vec2::splat(0.5);
    let n = interior as f32;
    let x = (uv.x * n).min(n - 1.0).max(0.0) as u32;
    let y = (uv.y * n).min(n - 1.0).max(0.0) as u32;
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_axes() {
        for dir in [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z] {
            let d = oct_decode(oct_encode(dir));
            assert!((d - dir).length() < 1e-5, "axis {dir:?} decoded to {d:?}");
        }
    }

    #[test]
    fn test_roundtrip_random_like() {
        // Fixed direction sample set, lower hemisphere included.
        let dirs = [
            Vec3::new(0.3, -0.5, 0.81),
            Vec3::new(-0.7, 0.1, -0.7),
            Vec3::new(0.57, 0.57, -0.59),
        ];
        for dir in dirs {
            let dir = dir.normalize();
            let d = oct_decode(oct_encode(dir));
            assert!((d - dir).length() < 1e-4);
        }
    }

    #[test]
    fn test_texel_in_range() {
        let (x, y) = oct_texel(Vec3::new(0.9, 0.1, -0.42).normalize(), 6);
        assert!(x < 6 && y < 6);
    }
}
