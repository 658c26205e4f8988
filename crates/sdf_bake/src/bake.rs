//! Voxelization pass
//!
//! Distance per voxel comes from the BVH closest-point query; the sign
//! comes from casting a fixed direction set and checking whether the
//! majority of hits strike back faces. That inside/outside test is a
//! heuristic and can misclassify thin or open geometry; callers tolerate
//! sign noise near such features.

use crate::volume::{encode_distance, MeshDistanceField, SdfVolume};
use glam::{UVec3, Vec3};
use half::f16;
use job_system::JobSystem;
use math_util::{Aabb, Ray};
use mesh_bvh::Bvh;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct BakeConfig {
    /// Target texel density per local-space unit.
    pub texels_per_unit: f32,
    pub min_resolution: u32,
    pub max_resolution: u32,
    /// Direction set is `sample_directions²` rays per voxel.
    pub sample_directions: u32,
    /// Total mip levels including mip 0 (capped at 3).
    pub mip_levels: u32,
    /// Thread budget for the BVH build.
    pub build_threads: usize,
}

impl Default for BakeConfig {
    fn default() -> Self {
        Self {
            texels_per_unit: 10.0,
            min_resolution: 32,
            max_resolution: 128,
            sample_directions: 6,
            mip_levels: 3,
            build_threads: 4,
        }
    }
}

/// Bake a mesh into a distance field. Returns `None` for an empty mesh.
/// Voxel sampling is split across the job system by z-slice.
pub fn bake(
    positions: &[Vec3],
    indices: &[u32],
    config: &BakeConfig,
    jobs: &JobSystem,
) -> Option<MeshDistanceField> {
    if positions.is_empty() || indices.len() < 3 {
        return None;
    }

    let mut mesh_bounds = Aabb::empty();
    for &p in positions {
        mesh_bounds.expand_point(p);
    }
    let bounds = crate::volume::padded_bake_bounds(&mesh_bounds);
    let size = resolution_for(&bounds, config);
    let max_distance = bounds.size().max_element();

    let bvh = Arc::new(Bvh::build(positions, indices, config.build_threads));
    let directions = Arc::new(direction_set(config.sample_directions));

    log::debug!(
        "baking sdf: {} triangles into {}x{}x{}",
        bvh.triangle_count(),
        size.x,
        size.y,
        size.z
    );

    // One job per z-slice; each slice lands in the shared list and is
    // stitched afterwards.
    let voxel_size = bounds.size() / size.as_vec3();
    let slices: Arc<Mutex<Vec<(usize, Vec<f16>)>>> =
        Arc::new(Mutex::new(Vec::with_capacity(size.z as usize)));
    {
        let slices = Arc::clone(&slices);
        let bvh = Arc::clone(&bvh);
        let directions = Arc::clone(&directions);
        let min = bounds.min;
        jobs.dispatch(size.z as usize, 1, move |range| {
            for z in range {
                let mut slice = Vec::with_capacity((size.x * size.y) as usize);
                for y in 0..size.y {
                    for x in 0..size.x {
                        let center = min
                            + Vec3::new(x as f32 + 0.5, y as f32 + 0.5, z as f32 + 0.5)
                                * voxel_size;
                        let d = voxel_distance(&bvh, &directions, center, max_distance);
                        slice.push(encode_distance(d, max_distance));
                    }
                }
                slices.lock().unwrap().push((z, slice));
            }
        });
    }
    jobs.wait();

    let mut slices = match Arc::try_unwrap(slices) {
        Ok(m) => m.into_inner().unwrap(),
        Err(_) => return None,
    };
    slices.sort_by_key(|(z, _)| *z);
    let mut mip0 = Vec::with_capacity((size.x * size.y * size.z) as usize);
    for (_, slice) in slices {
        mip0.extend(slice);
    }

    let mut volume = SdfVolume {
        size,
        mips: vec![mip0],
    };
    build_mip_chain(&mut volume, config.mip_levels.min(3));

    let (mul, add) = MeshDistanceField::uvw_mapping(&bounds);
    Some(MeshDistanceField {
        volume,
        max_distance,
        local_to_uvw_mul: mul,
        local_to_uvw_add: add,
        local_bounds: bounds,
    })
}

fn resolution_for(bounds: &Aabb, config: &BakeConfig) -> UVec3 {
    let size = bounds.size();
    let res = |extent: f32| -> u32 {
        ((extent * config.texels_per_unit).ceil() as u32)
            .clamp(config.min_resolution, config.max_resolution)
    };
    UVec3::new(res(size.x), res(size.y), res(size.z))
}

/// Fixed direction set: uniform in azimuth, cosine-spaced in elevation.
fn direction_set(n: u32) -> Vec<Vec3> {
    let mut dirs = Vec::with_capacity((n * n) as usize);
    for i in 0..n {
        let theta = std::f32::consts::TAU * (i as f32 + 0.5) / n as f32;
        for j in 0..n {
            let z = 1.0 - 2.0 * (j as f32 + 0.5) / n as f32;
            let r = (1.0 - z * z).max(0.0).sqrt();
            dirs.push(Vec3::new(r * theta.cos(), r * theta.sin(), z));
        }
    }
    dirs
}

fn voxel_distance(bvh: &Bvh, directions: &[Vec3], point: Vec3, max_distance: f32) -> f32 {
    let distance = bvh
        .closest_point(point, max_distance)
        .map(|c| c.dist_sq.sqrt())
        .unwrap_or(max_distance);

    let mut hits = 0u32;
    let mut back_hits = 0u32;
    for &dir in directions {
        let ray = Ray::new(point, dir);
        if let Some(hit) = bvh.intersect(&ray, 0.0, max_distance) {
            hits += 1;
            if hit.backface {
                back_hits += 1;
            }
        }
    }

    // Majority of hits on back faces reads as "inside".
    if hits > 0 && back_hits * 2 > hits {
        -distance
    } else {
        distance
    }
}

/// 2x2x2 box filter per level on the decoded values, repacked per level.
fn build_mip_chain(volume: &mut SdfVolume, levels: u32) {
    for level in 1..levels as usize {
        let src_size = volume.mip_size(level - 1);
        let dst_size = volume.mip_size(level);
        if dst_size == src_size {
            break;
        }
        let src = &volume.mips[level - 1];
        let mut dst = Vec::with_capacity((dst_size.x * dst_size.y * dst_size.z) as usize);

        let fetch = |x: u32, y: u32, z: u32| -> f32 {
            let x = x.min(src_size.x - 1);
            let y = y.min(src_size.y - 1);
            let z = z.min(src_size.z - 1);
            src[(x + y * src_size.x + z * src_size.x * src_size.y) as usize].to_f32()
        };

        for z in 0..dst_size.z {
            for y in 0..dst_size.y {
                for x in 0..dst_size.x {
                    let (sx, sy, sz) = (x * 2, y * 2, z * 2);
                    let mut sum = 0.0;
                    for (dx, dy, dz) in NEIGHBORS {
                        sum += fetch(sx + dx, sy + dy, sz + dz);
                    }
                    dst.push(f16::from_f32(sum / 8.0));
                }
            }
        }
        volume.mips.push(dst);
    }
}

const NEIGHBORS: [(u32, u32, u32); 8] = [
    (0, 0, 0),
    (1, 0, 0),
    (0, 1, 0),
    (1, 1, 0),
    (0, 0, 1),
    (1, 0, 1),
    (0, 1, 1),
    (1, 1, 1),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_set_count_and_unit_length() {
        let dirs = direction_set(6);
        assert_eq!(dirs.len(), 36);
        for d in &dirs {
            assert!((d.length() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_resolution_clamps() {
        let config = BakeConfig::default();
        let tiny = Aabb::cube(Vec3::ZERO, 0.01);
        let huge = Aabb::cube(Vec3::ZERO, 500.0);
        assert_eq!(resolution_for(&tiny, &config), UVec3::splat(32));
        assert_eq!(resolution_for(&huge, &config), UVec3::splat(128));
    }

    #[test]
    fn test_mip_chain_levels() {
        let size = UVec3::splat(32);
        let mip0 = vec![f16::from_f32(0.5); (size.x * size.y * size.z) as usize];
        let mut volume = SdfVolume { size, mips: vec![mip0] };
        build_mip_chain(&mut volume, 3);
        assert_eq!(volume.mips.len(), 3);
        assert_eq!(volume.mips[1].len(), 16 * 16 * 16);
        assert_eq!(volume.mips[2].len(), 8 * 8 * 8);
        // Box filter of a constant field stays constant.
        assert!((volume.mips[2][0].to_f32() - 0.5).abs() < 1e-3);
    }
}
