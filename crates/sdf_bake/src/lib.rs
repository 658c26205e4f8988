//! Per-mesh signed distance field baking
//!
//! Voxelizes a padded mesh bounding box into a grid of 16-bit normalized
//! signed distances, builds a small mip chain, and persists the result to a
//! content-addressed file. Loading is lazy; a missing or unreadable file
//! simply reads as "needs baking".

#![forbid(unsafe_code)]

mod bake;
mod persist;
mod volume;

pub use bake::{bake, BakeConfig};
pub use persist::{baked_file_path, load_volume, save_volume};
pub use volume::{padded_bake_bounds, MeshDistanceField, SdfVolume};

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use job_system::JobSystem;

    pub(crate) fn cube_mesh(half: f32) -> (Vec<Vec3>, Vec<u32>) {
        let h = half;
        let positions = vec![
            Vec3::new(-h, -h, -h),
            Vec3::new(h, -h, -h),
            Vec3::new(h, h, -h),
            Vec3::new(-h, h, -h),
            Vec3::new(-h, -h, h),
            Vec3::new(h, -h, h),
            Vec3::new(h, h, h),
            Vec3::new(-h, h, h),
        ];
        // Outward winding per face.
        let indices = vec![
            0, 2, 1, 0, 3, 2, // -Z
            4, 5, 6, 4, 6, 7, // +Z
            0, 1, 5, 0, 5, 4, // -Y
            3, 6, 2, 3, 7, 6, // +Y
            0, 4, 7, 0, 7, 3, // -X
            1, 2, 6, 1, 6, 5, // +X
        ];
        (positions, indices)
    }

    #[test]
    fn test_cube_interior_is_negative() {
        let (positions, indices) = cube_mesh(1.0);
        let jobs = JobSystem::new(2);
        let field = bake(&positions, &indices, &BakeConfig::default(), &jobs).unwrap();

        // Origin is well inside the 2x2x2 cube.
        assert!(field.sample_local(Vec3::ZERO) < 0.0);
        // A point outside the padded bounds is positive.
        assert!(field.sample_local(Vec3::new(1.6, 0.0, 0.0)) > 0.0);
    }

    #[test]
    fn test_surface_distance_is_small() {
        let (positions, indices) = cube_mesh(1.0);
        let jobs = JobSystem::new(2);
        let field = bake(&positions, &indices, &BakeConfig::default(), &jobs).unwrap();
        let voxel = field.voxel_size().max_element();
        assert!(field.sample_local(Vec3::new(1.0, 0.0, 0.0)).abs() < voxel * 2.0);
    }

    #[test]
    fn test_empty_mesh_is_none() {
        let jobs = JobSystem::new(1);
        assert!(bake(&[], &[], &BakeConfig::default(), &jobs).is_none());
    }
}
