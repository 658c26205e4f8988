//! Cascaded global distance field
//!
//! Maintains nested world-space cube cascades of a shared 3D distance
//! texture. Each update incrementally merges per-object baked fields into
//! 32³-voxel chunks: chunks whose contributing object set is unchanged are
//! skipped, chunks that lost all objects are cleared, everything else is
//! re-rasterized. A flood-fill pass regenerates the coarse mip whenever a
//! chunk was touched.
//!
//! The CPU diff is pure given `(objects, camera, frame, scratch)` and
//! produces task lists; GPU recording consumes them separately.

mod atlas;
mod cascade;
mod chunk;
pub mod gpu;
mod shaders;

pub use atlas::{FieldAtlas, FieldSlot, FIELD_ATLAS_HEIGHT, FIELD_ATLAS_WIDTH};
pub use cascade::{Cascade, CascadeTasks, GlobalDistanceField, RasterizeTask, SdfObject, UpdateTasks};
pub use chunk::{ChunkKey, ChunkScratch};

use bytemuck::{Pod, Zeroable};

/// Voxels per chunk axis; the unit of incremental update.
pub const CHUNK_SIZE: u32 = 32;
/// Objects a single chunk layer can reference in one rasterize dispatch.
/// Chunks holding more overflow into additional layers, never drop.
pub const MAX_MODELS_PER_CHUNK: usize = 28;
/// Flood-fill iterations when regenerating the mip.
pub const MIP_FLOOD_PASSES: u32 = 4;
/// Mip resolution divisor relative to the cascade resolution.
pub const MIP_FACTOR: u32 = 4;
/// Per-cascade update divisors: outer cascades refresh less often.
pub const CASCADE_UPDATE_FREQUENCIES: [u64; 4] = [2, 3, 5, 11];
/// Cascade extent scale factors; cascade k+1 fully contains cascade k.
pub const CASCADE_SCALES: [f32; 4] = [1.0, 2.5, 5.0, 10.0];
/// Chunk coordinates must stay inside ±this for `ChunkKey::flatten`.
pub const CHUNK_KEY_HASH_RESOLUTION: i32 = 1024;

/// Global distance field configuration.
#[derive(Debug, Clone)]
pub struct GlobalSdfConfig {
    /// Cascade 0 half-extent in world units.
    pub base_distance: f32,
    /// Voxels per cascade axis (shared texture resolution per cascade).
    pub resolution: u32,
    pub cascade_count: usize,
    /// Objects smaller than this many voxels are culled per cascade.
    pub min_object_radius_voxels: f32,
}

impl Default for GlobalSdfConfig {
    fn default() -> Self {
        Self {
            base_distance: 15.0,
            resolution: 128,
            cascade_count: 4,
            min_object_radius_voxels: 0.5,
        }
    }
}

/// Uniform block read by every pass that traces the global field.
/// Field order and vec4 alignment are a wire contract with the kernels.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GlobalSdfData {
    /// Per cascade: xyz = center, w = half extent.
    pub cascade_pos_distance: [[f32; 4]; 4],
    pub cascade_voxel_size: [f32; 4],
    pub resolution: f32,
    pub cascade_count: u32,
    pub _pad: [u32; 2],
}

/// Per-object record in the rasterize storage buffer.
/// Field order and vec4 alignment are a wire contract with the kernels.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct ObjectRasterizeData {
    pub world_to_local: [[f32; 4]; 4],
    /// xyz: local -> tile-atlas UVW multiply; w: decoded max distance.
    pub uvw_mul: [f32; 4],
    /// xyz: local -> tile-atlas UVW add; w: unused.
    pub uvw_add: [f32; 4],
}

/// Push constants for one chunk rasterize dispatch: the chunk coordinate
/// plus the (≤28) contributing object indices. Exactly 128 bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct RasterizeConsts {
    pub chunk_coord: [i32; 3],
    pub object_count: u32,
    pub objects: [u32; MAX_MODELS_PER_CHUNK],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_constant_budget() {
        // The rasterize constants must fit the 128-byte push range.
        assert_eq!(std::mem::size_of::<RasterizeConsts>(), 128);
    }

    #[test]
    fn test_uniform_layout_is_vec4_aligned() {
        assert_eq!(std::mem::size_of::<GlobalSdfData>() % 16, 0);
        assert_eq!(std::mem::size_of::<ObjectRasterizeData>() % 16, 0);
    }
}
