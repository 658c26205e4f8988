//! Chunk keys and the per-update scratch cache

use crate::{CHUNK_KEY_HASH_RESOLUTION, MAX_MODELS_PER_CHUNK};
use glam::IVec3;
use std::collections::HashMap;

/// Address of one rasterize unit: a chunk coordinate plus an overflow
/// layer. Layer 0 is authoritative for occupancy bookkeeping; higher
/// layers are strictly additive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    pub coord: IVec3,
    pub layer: u32,
}

impl ChunkKey {
    pub fn new(coord: IVec3, layer: u32) -> Self {
        Self { coord, layer }
    }

    /// Linearized key used for stable dispatch ordering. Coordinates
    /// outside the hash resolution would alias, so they are asserted
    /// rather than assumed unreachable.
    pub fn flatten(&self) -> u64 {
        let res = CHUNK_KEY_HASH_RESOLUTION;
        debug_assert!(
            self.coord.abs().max_element() < res / 2,
            "chunk coordinate {:?} outside hash resolution",
            self.coord
        );
        let biased = self.coord + IVec3::splat(res / 2);
        let spatial = biased.x as u64
            + biased.y as u64 * res as u64
            + biased.z as u64 * (res as u64 * res as u64);
        spatial + self.layer as u64 * (res as u64 * res as u64 * res as u64)
    }
}

/// What one chunk holds this update: contributing object indices into the
/// frame object list, plus the identity set used for the static diff.
#[derive(Debug, Default, Clone)]
pub struct ChunkObjects {
    pub objects: Vec<u32>,
    /// (object id, revision) pairs; order of insertion.
    pub fingerprint: Vec<(u64, u32)>,
}

impl ChunkObjects {
    /// Layers this chunk needs: objects split into groups of
    /// `MAX_MODELS_PER_CHUNK`.
    pub fn layer_count(&self) -> usize {
        self.objects.len().div_ceil(MAX_MODELS_PER_CHUNK)
    }

    pub fn layer_objects(&self, layer: usize) -> &[u32] {
        let start = layer * MAX_MODELS_PER_CHUNK;
        let end = (start + MAX_MODELS_PER_CHUNK).min(self.objects.len());
        &self.objects[start..end]
    }
}

/// Transient scratch rebuilt by every cascade update. Owned by the caller
/// and passed in so the update function has no hidden cross-call state.
#[derive(Debug, Default)]
pub struct ChunkScratch {
    map: HashMap<IVec3, ChunkObjects>,
}

impl ChunkScratch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Append an object to a chunk. Overflow opens new layers implicitly
    /// via `ChunkObjects::layer_count`; nothing is ever dropped.
    pub fn add_object(&mut self, coord: IVec3, object_index: u32, id: u64, revision: u32) {
        let entry = self.map.entry(coord).or_default();
        entry.objects.push(object_index);
        entry.fingerprint.push((id, revision));
    }

    pub fn get(&self, coord: &IVec3) -> Option<&ChunkObjects> {
        self.map.get(coord)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IVec3, &ChunkObjects)> {
        self.map.iter()
    }

    /// Drain into a coordinate -> fingerprint map kept by the cascade for
    /// the next diff.
    pub fn take_fingerprints(&mut self) -> HashMap<IVec3, Vec<(u64, u32)>> {
        self.map
            .drain()
            .map(|(coord, objects)| (coord, objects.fingerprint))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_unique_for_neighbors() {
        let a = ChunkKey::new(IVec3::new(0, 0, 0), 0).flatten();
        let b = ChunkKey::new(IVec3::new(1, 0, 0), 0).flatten();
        let c = ChunkKey::new(IVec3::new(0, 1, 0), 0).flatten();
        let d = ChunkKey::new(IVec3::new(0, 0, 0), 1).flatten();
        assert!(a != b && a != c && a != d && b != c);
    }

    #[test]
    fn test_overflow_opens_layers() {
        let mut scratch = ChunkScratch::new();
        let coord = IVec3::ZERO;
        for i in 0..(MAX_MODELS_PER_CHUNK as u32 + 5) {
            scratch.add_object(coord, i, i as u64, 0);
        }
        let chunk = scratch.get(&coord).unwrap();
        assert_eq!(chunk.layer_count(), 2);
        assert_eq!(chunk.layer_objects(0).len(), MAX_MODELS_PER_CHUNK);
        assert_eq!(chunk.layer_objects(1).len(), 5);

        // Union across layers covers every inserted object.
        let mut all: Vec<u32> = (0..chunk.layer_count())
            .flat_map(|l| chunk.layer_objects(l).to_vec())
            .collect();
        all.sort();
        let expected: Vec<u32> = (0..(MAX_MODELS_PER_CHUNK as u32 + 5)).collect();
        assert_eq!(all, expected);
    }

    #[test]
    fn test_two_objects_share_layer_zero() {
        let mut scratch = ChunkScratch::new();
        scratch.add_object(IVec3::ZERO, 0, 10, 0);
        scratch.add_object(IVec3::ZERO, 1, 11, 0);
        let chunk = scratch.get(&IVec3::ZERO).unwrap();
        assert_eq!(chunk.layer_count(), 1);
        assert_eq!(chunk.layer_objects(0), &[0, 1]);
    }
}
