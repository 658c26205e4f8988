//! Frustum culling helpers
//!
//! Extracts frustum planes from a view-projection matrix and tests AABBs
//! against them.

use crate::aabb::Aabb;
use glam::{Mat4, Vec3, Vec4};

/// A plane in 3D space (ax + by + cz + d = 0)
#[derive(Debug, Clone, Copy)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal, distance }
    }

    /// Create plane from Vec4 (x, y, z, w) and normalize
    pub fn from_vec4(v: Vec4) -> Self {
        let length = v.truncate().length();
        Self {
            normal: v.truncate() / length,
            distance: v.w / length,
        }
    }

    /// Distance from plane to point (positive = in front)
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}

/// View frustum with 6 planes (left, right, bottom, top, near, far)
#[derive(Debug, Clone)]
pub struct Frustum {
    planes: [Plane; 6],
}

impl Frustum {
    /// Extract frustum planes from view-projection matrix
    /// Using Gribb-Hartmann method
    pub fn from_matrix(vp: Mat4) -> Self {
        let row0 = vp.row(0);
        let row1 = vp.row(1);
        let row2 = vp.row(2);
        let row3 = vp.row(3);

        let left = Plane::from_vec4(row3 + row0);
        let right = Plane::from_vec4(row3 - row0);
        let bottom = Plane::from_vec4(row3 + row1);
        let top = Plane::from_vec4(row3 - row1);
        let near = Plane::from_vec4(row3 + row2);
        let far = Plane::from_vec4(row3 - row2);

        Self {
            planes: [left, right, bottom, top, near, far],
        }
    }

    /// Test if AABB is inside or intersects frustum (conservative test)
    /// Returns true if visible (inside or intersecting)
    pub fn test_aabb(&self, aabb: &Aabb) -> bool {
        let center = aabb.center();
        let extents = aabb.half_extents();

        for plane in &self.planes {
            // Radius of the AABB projected onto the plane normal
            let radius = extents.x * plane.normal.x.abs()
                + extents.y * plane.normal.y.abs()
                + extents.z * plane.normal.z.abs();

            let distance = plane.distance_to_point(center);

            if distance < -radius {
                return false;
            }
        }

        true
    }

    /// Sphere-vs-frustum test, used by the card qualification pass.
    pub fn test_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|p| p.distance_to_point(center) >= -radius)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn look_down_z() -> Frustum {
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let proj = Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.1, 100.0);
        Frustum::from_matrix(proj * view)
    }

    #[test]
    fn test_aabb_in_front() {
        let f = look_down_z();
        let visible = Aabb::cube(Vec3::new(0.0, 0.0, -10.0), 1.0);
        let behind = Aabb::cube(Vec3::new(0.0, 0.0, 10.0), 1.0);
        assert!(f.test_aabb(&visible));
        assert!(!f.test_aabb(&behind));
    }

    #[test]
    fn test_sphere_culling() {
        let f = look_down_z();
        assert!(f.test_sphere(Vec3::new(0.0, 0.0, -5.0), 1.0));
        assert!(!f.test_sphere(Vec3::new(0.0, 0.0, -200.0), 1.0));
    }
}
