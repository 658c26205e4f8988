//! Shared geometry helpers for the renderer crates
//!
//! AABB/OBB primitives, frustum extraction, ray tests and the octahedral
//! direction mapping used by the probe textures.

pub mod aabb;
pub mod frustum;
pub mod obb;
pub mod octahedral;
pub mod ray;

pub use aabb::Aabb;
pub use frustum::{Frustum, Plane};
pub use obb::Obb;
pub use ray::Ray;

/// Snap a scalar down to a multiple of `cell`.
#[inline]
pub fn snap_down(value: f32, cell: f32) -> f32 {
    (value / cell).floor() * cell
}

/// Snap a vector down to a multiple of `cell` per component.
#[inline]
pub fn snap_vec_down(v: glam::Vec3, cell: f32) -> glam::Vec3 {
    glam::Vec3::new(snap_down(v.x, cell), snap_down(v.y, cell), snap_down(v.z, cell))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_down() {
        assert_eq!(snap_down(7.3, 2.0), 6.0);
        assert_eq!(snap_down(-0.1, 2.0), -2.0);
        assert_eq!(snap_down(8.0, 2.0), 8.0);
    }
}
