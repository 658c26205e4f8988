//! Oriented bounding boxes
//!
//! Used by the surface card system: each of the 6 box faces gets an
//! orthographic "camera" looking along the face normal.

use crate::aabb::Aabb;
use glam::{Mat3, Mat4, Vec3};

/// Oriented Bounding Box
#[derive(Debug, Clone, Copy)]
pub struct Obb {
    pub center: Vec3,
    /// Column-major local axes (already scaled by the object rotation).
    pub axes: Mat3,
    pub half_extents: Vec3,
}

impl Obb {
    pub fn new(center: Vec3, axes: Mat3, half_extents: Vec3) -> Self {
        Self { center, axes, half_extents }
    }

    /// OBB from a local-space AABB and a world transform.
    pub fn from_aabb_transform(local: &Aabb, transform: Mat4) -> Self {
        let center = transform.transform_point3(local.center());
        let rot = Mat3::from_mat4(transform);
        let he = local.half_extents();
        // Fold the transform scale into the extents, keep axes normalized.
        let sx = rot.x_axis.length();
        let sy = rot.y_axis.length();
        let sz = rot.z_axis.length();
        let axes = Mat3::from_cols(
            rot.x_axis / sx.max(f32::EPSILON),
            rot.y_axis / sy.max(f32::EPSILON),
            rot.z_axis / sz.max(f32::EPSILON),
        );
        Self {
            center,
            axes,
            half_extents: Vec3::new(he.x * sx, he.y * sy, he.z * sz),
        }
    }

    /// Bounding sphere radius.
    pub fn radius(&self) -> f32 {
        self.half_extents.length()
    }

    /// Outward normal of face `face` (0..6: +X,-X,+Y,-Y,+Z,-Z).
    pub fn face_normal(&self, face: usize) -> Vec3 {
        let axis = self.axes.col(face / 2);
        if face % 2 == 0 {
            axis
        } else {
            -axis
        }
    }

    /// World-space extents of face `face`: (width, height, depth) where
    /// width/height span the face plane and depth is along the normal.
    pub fn face_extents(&self, face: usize) -> (f32, f32, f32) {
        let he = self.half_extents;
        match face / 2 {
            0 => (he.y * 2.0, he.z * 2.0, he.x * 2.0),
            1 => (he.x * 2.0, he.z * 2.0, he.y * 2.0),
            _ => (he.x * 2.0, he.y * 2.0, he.z * 2.0),
        }
    }

    /// Orthographic view-projection looking at face `face` from outside,
    /// covering the whole face plus the box depth.
    pub fn face_view_projection(&self, face: usize) -> Mat4 {
        let normal = self.face_normal(face);
        let (w, h, d) = self.face_extents(face);
        let eye = self.center + normal * (d * 0.5 + 0.01);
        // Pick an up vector that is not parallel to the view direction.
        let up_axis = self.axes.col((face / 2 + 1) % 3);
        let view = Mat4::look_at_rh(eye, self.center, up_axis);
        let proj = Mat4::orthographic_rh(-w * 0.5, w * 0.5, -h * 0.5, h * 0.5, 0.0, d + 0.02);
        proj * view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_transform() {
        let local = Aabb::cube(Vec3::ZERO, 1.0);
        let obb = Obb::from_aabb_transform(&local, Mat4::IDENTITY);
        assert!((obb.half_extents - Vec3::ONE).length() < 1e-5);
        assert_eq!(obb.face_normal(0), Vec3::X);
        assert_eq!(obb.face_normal(1), -Vec3::X);
    }

    #[test]
    fn test_scaled_transform() {
        let local = Aabb::cube(Vec3::ZERO, 1.0);
        let obb = Obb::from_aabb_transform(&local, Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0)));
        assert!((obb.half_extents.x - 2.0).abs() < 1e-5);
        assert!((obb.face_normal(0).length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_face_projection_centers_face() {
        let local = Aabb::cube(Vec3::splat(0.0), 1.0);
        let obb = Obb::from_aabb_transform(&local, Mat4::from_translation(Vec3::new(5.0, 0.0, 0.0)));
        let vp = obb.face_view_projection(0);
        // Box center should project to the clip-space origin (xy).
        let clip = vp.project_point3(obb.center);
        assert!(clip.x.abs() < 1e-4 && clip.y.abs() < 1e-4);
    }
}
