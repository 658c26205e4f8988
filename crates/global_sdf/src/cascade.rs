//! Cascade state machine
//!
//! Each eligible cascade re-anchors on a chunk-snapped camera position,
//! culls contributing objects, rebuilds the chunk scratch, and diffs it
//! against the previous occupancy: chunks that emptied get cleared, chunks
//! with an unchanged contributor set are skipped, the rest are
//! re-rasterized layer by layer.

use crate::chunk::{ChunkKey, ChunkScratch};
use crate::{
    GlobalSdfConfig, GlobalSdfData, ObjectRasterizeData, CASCADE_SCALES,
    CASCADE_UPDATE_FREQUENCIES, CHUNK_SIZE,
};
use glam::{IVec3, Vec3};
use math_util::{snap_vec_down, Aabb};
use std::collections::{HashMap, HashSet};

/// One scene object as the distance field sees it this frame.
#[derive(Debug, Clone)]
pub struct SdfObject {
    /// Stable identity across frames.
    pub id: u64,
    /// Bumped whenever the object's transform or field changes.
    pub revision: u32,
    /// World-space bounding sphere.
    pub center: Vec3,
    pub radius: f32,
    pub raster: ObjectRasterizeData,
}

/// One rasterize dispatch: a chunk layer and its contributing objects
/// (indices into the frame object list, at most `MAX_MODELS_PER_CHUNK`).
#[derive(Debug, Clone, PartialEq)]
pub struct RasterizeTask {
    pub coord: IVec3,
    pub layer: u32,
    pub objects: Vec<u32>,
}

/// GPU work derived from one cascade update.
#[derive(Debug, Clone, Default)]
pub struct CascadeTasks {
    pub cascade: usize,
    pub chunks_to_clear: Vec<IVec3>,
    pub rasterize: Vec<RasterizeTask>,
    /// True when any chunk was touched; triggers the mip flood.
    pub flood_mip: bool,
}

/// Work for the whole field this frame.
#[derive(Debug, Clone, Default)]
pub struct UpdateTasks {
    /// Set when the cascade layout changed: the shared texture and every
    /// occupancy set were reset.
    pub full_clear: bool,
    pub cascades: Vec<CascadeTasks>,
}

/// One nested cube of the field.
#[derive(Debug)]
pub struct Cascade {
    pub index: usize,
    pub half_extent: f32,
    pub voxel_size: f32,
    /// Chunk-size-snapped center; avoids sub-chunk flicker under motion.
    pub anchor: Vec3,
    initialized: bool,
    pub non_empty_chunks: HashSet<IVec3>,
    pub static_chunks: HashSet<IVec3>,
    chunk_fingerprints: HashMap<IVec3, Vec<(u64, u32)>>,
}

impl Cascade {
    fn new(index: usize, half_extent: f32, resolution: u32) -> Self {
        Self {
            index,
            half_extent,
            voxel_size: half_extent * 2.0 / resolution as f32,
            anchor: Vec3::ZERO,
            initialized: false,
            non_empty_chunks: HashSet::new(),
            static_chunks: HashSet::new(),
            chunk_fingerprints: HashMap::new(),
        }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::cube(self.anchor, self.half_extent)
    }

    pub fn chunk_world_size(&self) -> f32 {
        self.voxel_size * CHUNK_SIZE as f32
    }

    fn clear_occupancy(&mut self) {
        self.non_empty_chunks.clear();
        self.static_chunks.clear();
        self.chunk_fingerprints.clear();
        self.initialized = false;
    }

    fn world_to_chunk(&self, p: Vec3, chunks_per_axis: i32) -> IVec3 {
        let local = (p - self.bounds().min) / self.chunk_world_size();
        IVec3::new(
            (local.x.floor() as i32).clamp(0, chunks_per_axis - 1),
            (local.y.floor() as i32).clamp(0, chunks_per_axis - 1),
            (local.z.floor() as i32).clamp(0, chunks_per_axis - 1),
        )
    }

    fn update(
        &mut self,
        objects: &[SdfObject],
        camera_pos: Vec3,
        config: &GlobalSdfConfig,
        scratch: &mut ChunkScratch,
    ) -> CascadeTasks {
        scratch.clear();

        // Re-anchor. A move of more than one voxel invalidates the static
        // set: the same chunk coordinate now covers different world space.
        let new_anchor = snap_vec_down(camera_pos, self.chunk_world_size());
        let moved = !self.initialized
            || (new_anchor - self.anchor).abs().max_element() > self.voxel_size;
        if moved {
            self.chunk_fingerprints.clear();
            self.static_chunks.clear();
        }
        self.anchor = new_anchor;
        self.initialized = true;

        let chunks_per_axis = (config.resolution / CHUNK_SIZE) as i32;
        let bounds = self.bounds();
        let margin = 4.0 * self.voxel_size;
        let min_radius = config.min_object_radius_voxels * self.voxel_size;

        for (index, object) in objects.iter().enumerate() {
            if object.radius < min_radius {
                continue;
            }
            let reach = object.radius + margin;
            if !bounds.intersects_sphere(object.center, reach) {
                continue;
            }
            let lo = self.world_to_chunk(object.center - Vec3::splat(reach), chunks_per_axis);
            let hi = self.world_to_chunk(object.center + Vec3::splat(reach), chunks_per_axis);
            for z in lo.z..=hi.z {
                for y in lo.y..=hi.y {
                    for x in lo.x..=hi.x {
                        scratch.add_object(
                            IVec3::new(x, y, z),
                            index as u32,
                            object.id,
                            object.revision,
                        );
                    }
                }
            }
        }

        let mut tasks = CascadeTasks {
            cascade: self.index,
            ..Default::default()
        };

        // Chunks that contributed last time but hold nothing now.
        for &coord in &self.non_empty_chunks {
            if scratch.get(&coord).is_none() {
                tasks.chunks_to_clear.push(coord);
            }
        }

        // Unchanged contributor sets are skipped; the rest re-rasterize.
        self.static_chunks.clear();
        for (&coord, chunk) in scratch.iter() {
            let unchanged = self
                .chunk_fingerprints
                .get(&coord)
                .is_some_and(|prev| same_fingerprint(prev, &chunk.fingerprint));
            if unchanged {
                self.static_chunks.insert(coord);
                continue;
            }
            for layer in 0..chunk.layer_count() {
                tasks.rasterize.push(RasterizeTask {
                    coord,
                    layer: layer as u32,
                    objects: chunk.layer_objects(layer).to_vec(),
                });
            }
        }

        // Deterministic dispatch order.
        tasks
            .chunks_to_clear
            .sort_by_key(|&coord| ChunkKey::new(coord, 0).flatten());
        tasks
            .rasterize
            .sort_by_key(|task| ChunkKey::new(task.coord, task.layer).flatten());

        self.non_empty_chunks = scratch.iter().map(|(&coord, _)| coord).collect();
        self.chunk_fingerprints = scratch.take_fingerprints();

        tasks.flood_mip = !tasks.chunks_to_clear.is_empty() || !tasks.rasterize.is_empty();
        tasks
    }
}

fn same_fingerprint(a: &[(u64, u32)], b: &[(u64, u32)]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut a: Vec<_> = a.to_vec();
    let mut b: Vec<_> = b.to_vec();
    a.sort_unstable();
    b.sort_unstable();
    a == b
}

/// The cascade set plus the resize latch.
pub struct GlobalDistanceField {
    config: GlobalSdfConfig,
    cascades: Vec<Cascade>,
    resize_pending: bool,
}

impl GlobalDistanceField {
    pub fn new(config: GlobalSdfConfig) -> Self {
        let cascades = build_cascades(&config);
        Self {
            config,
            cascades,
            resize_pending: true,
        }
    }

    pub fn config(&self) -> &GlobalSdfConfig {
        &self.config
    }

    pub fn cascades(&self) -> &[Cascade] {
        &self.cascades
    }

    /// Change cascade count/resolution; forces a full clear next update.
    pub fn request_resize(&mut self, config: GlobalSdfConfig) {
        self.config = config;
        self.cascades = build_cascades(&self.config);
        self.resize_pending = true;
    }

    /// Diff every eligible cascade. Pure given its inputs: all transient
    /// chunk state lives in the caller's `scratch`.
    pub fn update(
        &mut self,
        objects: &[SdfObject],
        camera_pos: Vec3,
        frame: u64,
        scratch: &mut ChunkScratch,
    ) -> UpdateTasks {
        let full_clear = std::mem::take(&mut self.resize_pending);
        if full_clear {
            for cascade in &mut self.cascades {
                cascade.clear_occupancy();
            }
        }

        let mut tasks = UpdateTasks {
            full_clear,
            cascades: Vec::new(),
        };

        for (k, cascade) in self.cascades.iter_mut().enumerate() {
            let frequency = CASCADE_UPDATE_FREQUENCIES[k.min(CASCADE_UPDATE_FREQUENCIES.len() - 1)];
            if !full_clear && frame % frequency != 0 {
                continue;
            }
            let cascade_tasks = cascade.update(objects, camera_pos, &self.config, scratch);
            log::trace!(
                "cascade {}: {} clears, {} rasterizes, {} static",
                k,
                cascade_tasks.chunks_to_clear.len(),
                cascade_tasks.rasterize.len(),
                cascade.static_chunks.len()
            );
            tasks.cascades.push(cascade_tasks);
        }

        tasks
    }

    /// Uniform block for passes that trace the field.
    pub fn uniform_data(&self) -> GlobalSdfData {
        let mut data = GlobalSdfData {
            cascade_pos_distance: [[0.0; 4]; 4],
            cascade_voxel_size: [0.0; 4],
            resolution: self.config.resolution as f32,
            cascade_count: self.cascades.len() as u32,
            _pad: [0; 2],
        };
        for (k, cascade) in self.cascades.iter().take(4).enumerate() {
            data.cascade_pos_distance[k] = [
                cascade.anchor.x,
                cascade.anchor.y,
                cascade.anchor.z,
                cascade.half_extent,
            ];
            data.cascade_voxel_size[k] = cascade.voxel_size;
        }
        data
    }
}

fn build_cascades(config: &GlobalSdfConfig) -> Vec<Cascade> {
    (0..config.cascade_count.min(CASCADE_SCALES.len()))
        .map(|k| {
            Cascade::new(
                k,
                config.base_distance * CASCADE_SCALES[k],
                config.resolution,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::Zeroable;

    fn object(id: u64, center: Vec3, radius: f32) -> SdfObject {
        SdfObject {
            id,
            revision: 0,
            center,
            radius,
            raster: ObjectRasterizeData::zeroed(),
        }
    }

    fn test_config() -> GlobalSdfConfig {
        GlobalSdfConfig {
            base_distance: 16.0,
            resolution: 128,
            cascade_count: 1,
            min_object_radius_voxels: 0.5,
        }
    }

    fn update_all(
        field: &mut GlobalDistanceField,
        objects: &[SdfObject],
        frame: u64,
    ) -> UpdateTasks {
        let mut scratch = ChunkScratch::new();
        field.update(objects, Vec3::ZERO, frame, &mut scratch)
    }

    #[test]
    fn test_first_update_rasterizes_object() {
        let mut field = GlobalDistanceField::new(test_config());
        let objects = vec![object(1, Vec3::ZERO, 1.0)];
        let tasks = update_all(&mut field, &objects, 0);
        assert!(tasks.full_clear);
        let cascade = &tasks.cascades[0];
        assert!(cascade.chunks_to_clear.is_empty());
        assert!(!cascade.rasterize.is_empty());
        assert!(cascade.flood_mip);
        assert!(!field.cascades()[0].non_empty_chunks.is_empty());
    }

    #[test]
    fn test_static_scene_is_idempotent() {
        let mut field = GlobalDistanceField::new(test_config());
        let objects = vec![object(1, Vec3::ZERO, 1.0), object(2, Vec3::new(3.0, 0.0, 0.0), 1.0)];
        update_all(&mut field, &objects, 0);

        // Same objects, same anchor: nothing to clear, nothing to draw.
        let tasks = update_all(&mut field, &objects, 2);
        let cascade = &tasks.cascades[0];
        assert!(cascade.chunks_to_clear.is_empty());
        assert!(cascade.rasterize.is_empty());
        assert!(!cascade.flood_mip);
        // Static set fully covers the occupancy set.
        let c = &field.cascades()[0];
        assert_eq!(c.static_chunks, c.non_empty_chunks);
    }

    #[test]
    fn test_removed_object_clears_its_chunks() {
        let mut field = GlobalDistanceField::new(test_config());
        let objects = vec![object(1, Vec3::ZERO, 1.0)];
        update_all(&mut field, &objects, 0);
        let occupied = field.cascades()[0].non_empty_chunks.clone();
        assert!(!occupied.is_empty());

        let tasks = update_all(&mut field, &[], 2);
        let cascade = &tasks.cascades[0];
        let mut cleared = cascade.chunks_to_clear.clone();
        let mut expected: Vec<IVec3> = occupied.into_iter().collect();
        cleared.sort_by_key(|&c| ChunkKey::new(c, 0).flatten());
        expected.sort_by_key(|&c| ChunkKey::new(c, 0).flatten());
        assert_eq!(cleared, expected);
        assert!(field.cascades()[0].non_empty_chunks.is_empty());
    }

    #[test]
    fn test_moved_object_invalidates_chunk() {
        let mut field = GlobalDistanceField::new(test_config());
        let mut objects = vec![object(1, Vec3::ZERO, 1.0)];
        update_all(&mut field, &objects, 0);

        objects[0].revision = 1;
        objects[0].center = Vec3::new(0.5, 0.0, 0.0);
        let tasks = update_all(&mut field, &objects, 2);
        assert!(!tasks.cascades[0].rasterize.is_empty());
    }

    #[test]
    fn test_small_object_culled() {
        let config = test_config();
        let voxel = config.base_distance * 2.0 / config.resolution as f32;
        let mut field = GlobalDistanceField::new(config);
        let objects = vec![object(1, Vec3::ZERO, voxel * 0.1)];
        let tasks = update_all(&mut field, &objects, 0);
        assert!(tasks.cascades[0].rasterize.is_empty());
    }

    #[test]
    fn test_two_objects_one_chunk_single_layer() {
        let mut field = GlobalDistanceField::new(test_config());
        // Both spheres overlap the chunk containing the origin corner.
        let objects = vec![
            object(1, Vec3::new(1.0, 1.0, 1.0), 0.5),
            object(2, Vec3::new(1.5, 1.0, 1.0), 0.5),
        ];
        let tasks = update_all(&mut field, &objects, 0);
        let cascade = &tasks.cascades[0];
        // Every produced task is layer 0 with both objects where they share
        // a chunk.
        assert!(cascade.rasterize.iter().all(|t| t.layer == 0));
        assert!(cascade
            .rasterize
            .iter()
            .any(|t| t.objects == vec![0, 1]));
    }

    #[test]
    fn test_outer_cascade_contains_inner() {
        let mut config = test_config();
        config.cascade_count = 4;
        let mut field = GlobalDistanceField::new(config);
        update_all(&mut field, &[], 0);
        let cascades = field.cascades();
        for k in 0..3 {
            let inner = cascades[k].bounds();
            let outer = cascades[k + 1].bounds();
            // Scale gap (>= 2.5x) dwarfs the snap offset.
            assert!(outer.min.cmple(inner.min).all() && outer.max.cmpge(inner.max).all());
        }
    }

    #[test]
    fn test_update_frequency_gating() {
        let mut config = test_config();
        config.cascade_count = 4;
        let mut field = GlobalDistanceField::new(config);
        update_all(&mut field, &[], 0); // full clear updates everything

        // Frame 6 divides 2 and 3 but not 5 or 11.
        let tasks = update_all(&mut field, &[], 6);
        let updated: Vec<usize> = tasks.cascades.iter().map(|c| c.cascade).collect();
        assert_eq!(updated, vec![0, 1]);
    }

    #[test]
    fn test_anchor_move_drops_static_set() {
        let mut field = GlobalDistanceField::new(test_config());
        let objects = vec![object(1, Vec3::ZERO, 1.0)];
        let mut scratch = ChunkScratch::new();
        field.update(&objects, Vec3::ZERO, 0, &mut scratch);
        field.update(&objects, Vec3::ZERO, 2, &mut scratch);
        assert!(!field.cascades()[0].static_chunks.is_empty());

        // Move the camera a whole chunk: nothing may be treated static.
        let chunk = field.cascades()[0].chunk_world_size();
        let tasks = field.update(&objects, Vec3::splat(chunk * 2.0), 4, &mut scratch);
        assert!(!tasks.cascades[0].rasterize.is_empty());
    }
}
