//! Card lifecycle and redraw/relight scheduling
//!
//! Every qualifying object owns up to 6 tiles, one orthographic card per
//! OBB face. Tiles are kept across frames with a resize hysteresis so
//! small extent changes do not churn the packer, redrawn when stale, and
//! freed when the object stops qualifying.

use crate::rect_atlas::{Rect, RectAtlas, TileId};
use glam::Mat4;
use math_util::Obb;
use std::collections::HashMap;

/// Periodic staleness refresh: a tile older than this redraws even
/// without an explicit dirty event.
pub const REDRAW_FRAMES: u64 = 120;
/// Full relight sweep period integrating indirect bounce.
pub const GI_FRAMES: u64 = 15;
/// Resize requests closer than this to the current size keep the tile.
pub const TILE_REFIT_STEP: u32 = 32;
pub const TILE_MIN: u32 = 32;
pub const TILE_MAX: u32 = 128;
/// Frames between allocation failure and a defragmentation attempt.
const DEFRAG_COOLDOWN: u64 = 60;

#[derive(Debug, Clone)]
pub struct AtlasConfig {
    pub resolution: u32,
    /// Objects with a smaller bounding radius never get cards.
    pub min_object_radius: f32,
    /// Objects farther than this from the camera never get cards.
    pub max_distance: f32,
    /// World extent -> texels conversion for card resolution.
    pub texels_per_unit: f32,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            resolution: 4096,
            min_object_radius: 0.5,
            max_distance: 200.0,
            texels_per_unit: 16.0,
        }
    }
}

/// One card tile.
#[derive(Debug, Clone)]
pub struct SurfaceTile {
    pub id: TileId,
    pub rect: Rect,
    pub view_proj: Mat4,
    /// Row in the GPU tile metadata buffer, reassigned every upload.
    pub address: u32,
    pub last_frame_updated: u64,
    pub last_frame_lit: u64,
    pub dirty: bool,
}

/// Per-object card set.
#[derive(Debug, Clone)]
pub struct ObjectCards {
    pub obb: Obb,
    pub radius: f32,
    pub tiles: [Option<SurfaceTile>; 6],
    pub last_frame_used: u64,
}

/// What the atlas sees of one scene object this frame.
#[derive(Debug, Clone)]
pub struct AtlasObject {
    pub id: u64,
    pub obb: Obb,
    pub distance_to_camera: f32,
}

/// A light as the relight pass sees it.
#[derive(Debug, Clone)]
pub struct AtlasLight {
    pub id: u64,
    /// Bumped when the light moves or changes color.
    pub revision: u32,
    pub position: glam::Vec3,
    /// Influence radius; `None` reads as directional (affects all).
    pub radius: Option<f32>,
}

/// One card redraw order.
#[derive(Debug, Clone)]
pub struct DrawTask {
    pub object_id: u64,
    pub face: usize,
    pub rect: Rect,
    pub view_proj: Mat4,
}

/// One tile relight order (tile metadata addresses).
#[derive(Debug, Clone, Default)]
pub struct RelightTask {
    pub light_id: u64,
    pub tile_addresses: Vec<u32>,
}

#[derive(Debug, Default)]
pub struct AtlasStats {
    pub qualified_objects: usize,
    pub evicted_objects: usize,
    pub allocated_tiles: usize,
    pub failed_inserts: usize,
    pub redrawn_tiles: usize,
}

/// CPU side of the surface atlas.
pub struct SurfaceAtlas {
    config: AtlasConfig,
    packer: RectAtlas,
    objects: HashMap<u64, ObjectCards>,
    light_revisions: HashMap<u64, u32>,
    last_frame_insert_fail: Option<u64>,
    last_frame_defrag: Option<u64>,
    pub stats: AtlasStats,
}

impl SurfaceAtlas {
    pub fn new(config: AtlasConfig) -> Self {
        let packer = RectAtlas::new(config.resolution, config.resolution);
        Self {
            config,
            packer,
            objects: HashMap::new(),
            light_revisions: HashMap::new(),
            last_frame_insert_fail: None,
            last_frame_defrag: None,
            stats: AtlasStats::default(),
        }
    }

    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    pub fn object(&self, id: u64) -> Option<&ObjectCards> {
        self.objects.get(&id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Per-frame card maintenance: qualification, tile allocation with
    /// refit hysteresis, staleness dirtying, eviction of untouched
    /// objects, and the defragmentation opportunity check.
    pub fn update(&mut self, frame: u64, objects: &[AtlasObject]) -> Vec<DrawTask> {
        self.stats = AtlasStats::default();
        let mut draws = Vec::new();

        for object in objects {
            if object.obb.radius() < self.config.min_object_radius
                || object.distance_to_camera >= self.config.max_distance
            {
                continue;
            }
            self.stats.qualified_objects += 1;

            let entry = self
                .objects
                .entry(object.id)
                .or_insert_with(|| ObjectCards {
                    obb: object.obb,
                    radius: object.obb.radius(),
                    tiles: Default::default(),
                    last_frame_used: frame,
                });
            entry.last_frame_used = frame;
            entry.obb = object.obb;
            entry.radius = object.obb.radius();

            for face in 0..6 {
                let desired = tile_resolution(&object.obb, face, self.config.texels_per_unit);

                let keep = entry.tiles[face].as_ref().is_some_and(|tile| {
                    tile.rect.width.abs_diff(desired.0) < TILE_REFIT_STEP
                        && tile.rect.height.abs_diff(desired.1) < TILE_REFIT_STEP
                });

                if !keep {
                    if let Some(tile) = entry.tiles[face].take() {
                        self.packer.free(tile.id);
                    }
                    match self.packer.insert(desired.0, desired.1) {
                        Some(id) => {
                            entry.tiles[face] = Some(SurfaceTile {
                                id,
                                rect: self.packer.rect(id),
                                view_proj: object.obb.face_view_projection(face),
                                address: u32::MAX,
                                last_frame_updated: 0,
                                last_frame_lit: 0,
                                dirty: true,
                            });
                        }
                        None => {
                            self.stats.failed_inserts += 1;
                            self.last_frame_insert_fail = Some(frame);
                        }
                    }
                }

                if let Some(tile) = entry.tiles[face].as_mut() {
                    // Keep the view in sync with the object transform.
                    tile.view_proj = object.obb.face_view_projection(face);
                    if frame.saturating_sub(tile.last_frame_updated) >= REDRAW_FRAMES {
                        tile.dirty = true;
                    }
                    if tile.dirty {
                        draws.push(DrawTask {
                            object_id: object.id,
                            face,
                            rect: tile.rect,
                            view_proj: tile.view_proj,
                        });
                        tile.dirty = false;
                        tile.last_frame_updated = frame;
                    }
                }
            }
        }

        self.evict_untouched(frame);
        self.maybe_defrag(frame);

        self.stats.allocated_tiles = self
            .objects
            .values()
            .map(|o| o.tiles.iter().flatten().count())
            .sum();
        self.stats.redrawn_tiles = draws.len();
        draws
    }

    /// Assign tile metadata addresses for this frame's upload and return
    /// the tiles in address order.
    pub fn assign_addresses(&mut self) -> Vec<(u64, usize, SurfaceTile)> {
        let mut ordered: Vec<(u64, usize)> = self
            .objects
            .iter()
            .flat_map(|(&id, cards)| {
                cards
                    .tiles
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.is_some())
                    .map(move |(face, _)| (id, face))
            })
            .collect();
        ordered.sort();

        let mut out = Vec::with_capacity(ordered.len());
        for (address, (id, face)) in ordered.into_iter().enumerate() {
            if let Some(cards) = self.objects.get_mut(&id) {
                if let Some(tile) = cards.tiles[face].as_mut() {
                    tile.address = address as u32;
                    out.push((id, face, tile.clone()));
                }
            }
        }
        out
    }

    /// Relight scheduling: per changed/stale light, the tiles of objects
    /// inside its influence; every `GI_FRAMES` a full sweep refreshes the
    /// indirect bounce term for every tile.
    pub fn schedule_relight(&mut self, frame: u64, lights: &[AtlasLight]) -> Vec<RelightTask> {
        let gi_sweep = frame % GI_FRAMES == 0;
        let mut tasks = Vec::new();

        for light in lights {
            let changed = self
                .light_revisions
                .insert(light.id, light.revision)
                .map_or(true, |prev| prev != light.revision);

            let mut task = RelightTask {
                light_id: light.id,
                ..Default::default()
            };
            for cards in self.objects.values_mut() {
                let in_range = match light.radius {
                    Some(radius) => {
                        (cards.obb.center - light.position).length() <= radius + cards.radius
                    }
                    None => true,
                };
                if !in_range {
                    continue;
                }
                for tile in cards.tiles.iter_mut().flatten() {
                    let stale = frame.saturating_sub(tile.last_frame_lit) >= REDRAW_FRAMES;
                    if changed || stale || gi_sweep {
                        task.tile_addresses.push(tile.address);
                        tile.last_frame_lit = frame;
                    }
                }
            }
            if !task.tile_addresses.is_empty() {
                tasks.push(task);
            }
        }
        tasks
    }

    fn evict_untouched(&mut self, frame: u64) {
        let stale: Vec<u64> = self
            .objects
            .iter()
            .filter(|(_, cards)| cards.last_frame_used != frame)
            .map(|(&id, _)| id)
            .collect();
        for id in stale {
            if let Some(cards) = self.objects.remove(&id) {
                for tile in cards.tiles.into_iter().flatten() {
                    self.packer.free(tile.id);
                }
                self.stats.evicted_objects += 1;
            }
        }
    }

    /// Defragmentation opportunity: recent insert failures with no recent
    /// defrag empty the packer and dirty every surviving tile once.
    fn maybe_defrag(&mut self, frame: u64) {
        let failed_recently = self
            .last_frame_insert_fail
            .is_some_and(|f| frame.saturating_sub(f) < DEFRAG_COOLDOWN);
        let defragged_recently = self
            .last_frame_defrag
            .is_some_and(|f| frame.saturating_sub(f) < DEFRAG_COOLDOWN);
        if !failed_recently || defragged_recently {
            return;
        }

        log::debug!("surface atlas defragmentation at frame {frame}");
        self.packer.reset();
        for cards in self.objects.values_mut() {
            for slot in cards.tiles.iter_mut() {
                if let Some(tile) = slot.take() {
                    if let Some(id) = self.packer.insert(tile.rect.width, tile.rect.height) {
                        *slot = Some(SurfaceTile {
                            id,
                            rect: self.packer.rect(id),
                            dirty: true,
                            ..tile
                        });
                    }
                }
            }
        }
        self.last_frame_defrag = Some(frame);
        self.last_frame_insert_fail = None;
    }
}

/// Card resolution from the face's world extent: clamped to
/// `[TILE_MIN, TILE_MAX]` and 8-aligned.
pub fn tile_resolution(obb: &Obb, face: usize, texels_per_unit: f32) -> (u32, u32) {
    let (w, h, _) = obb.face_extents(face);
    let snap = |extent: f32| -> u32 {
        let texels = (extent * texels_per_unit) as u32;
        let aligned = texels.div_ceil(8) * 8;
        aligned.clamp(TILE_MIN, TILE_MAX)
    };
    (snap(w), snap(h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat3, Vec3};

    fn obb(center: Vec3, half: f32) -> Obb {
        Obb::new(center, Mat3::IDENTITY, Vec3::splat(half))
    }

    fn atlas_object(id: u64, half: f32, distance: f32) -> AtlasObject {
        AtlasObject {
            id,
            obb: obb(Vec3::ZERO, half),
            distance_to_camera: distance,
        }
    }

    fn small_atlas() -> SurfaceAtlas {
        SurfaceAtlas::new(AtlasConfig {
            resolution: 512,
            ..Default::default()
        })
    }

    #[test]
    fn test_qualification_filters() {
        let mut atlas = small_atlas();
        let objects = vec![
            atlas_object(1, 2.0, 10.0),
            atlas_object(2, 0.1, 10.0),   // too small
            atlas_object(3, 2.0, 1000.0), // too far
        ];
        atlas.update(0, &objects);
        assert!(atlas.object(1).is_some());
        assert!(atlas.object(2).is_none());
        assert!(atlas.object(3).is_none());
    }

    #[test]
    fn test_six_faces_allocated_and_drawn() {
        let mut atlas = small_atlas();
        let draws = atlas.update(0, &[atlas_object(1, 2.0, 10.0)]);
        assert_eq!(draws.len(), 6);
        let cards = atlas.object(1).unwrap();
        assert!(cards.tiles.iter().all(|t| t.is_some()));
    }

    #[test]
    fn test_refit_hysteresis_keeps_tile() {
        let mut atlas = small_atlas();
        atlas.update(0, &[atlas_object(1, 2.0, 10.0)]);
        let before: Vec<Rect> = atlas.object(1).unwrap().tiles.iter()
            .map(|t| t.as_ref().unwrap().rect)
            .collect();

        // Slightly larger object: desired size moves by < TILE_REFIT_STEP.
        let mut grown = atlas_object(1, 2.0, 10.0);
        grown.obb = obb(Vec3::ZERO, 2.2);
        atlas.update(1, &[grown]);
        let after: Vec<Rect> = atlas.object(1).unwrap().tiles.iter()
            .map(|t| t.as_ref().unwrap().rect)
            .collect();
        assert_eq!(before, after, "tiles must be retained under small resizes");
    }

    #[test]
    fn test_large_resize_reallocates() {
        let mut atlas = small_atlas();
        atlas.update(0, &[atlas_object(1, 1.0, 10.0)]);
        let before = atlas.object(1).unwrap().tiles[0].as_ref().unwrap().rect;

        let mut grown = atlas_object(1, 1.0, 10.0);
        grown.obb = obb(Vec3::ZERO, 4.0);
        let draws = atlas.update(1, &[grown]);
        let after = atlas.object(1).unwrap().tiles[0].as_ref().unwrap().rect;
        assert_ne!(before.width, after.width);
        assert_eq!(draws.len(), 6, "resized tiles redraw");
    }

    #[test]
    fn test_eviction_frees_tiles() {
        let mut atlas = small_atlas();
        atlas.update(0, &[atlas_object(1, 2.0, 10.0)]);
        assert_eq!(atlas.object_count(), 1);
        atlas.update(1, &[]);
        assert_eq!(atlas.object_count(), 0);
        // Freed space is reusable.
        atlas.update(2, &[atlas_object(2, 2.0, 10.0)]);
        assert_eq!(atlas.object(2).unwrap().tiles.iter().flatten().count(), 6);
    }

    #[test]
    fn test_no_redraw_on_static_frame() {
        let mut atlas = small_atlas();
        atlas.update(0, &[atlas_object(1, 2.0, 10.0)]);
        let draws = atlas.update(1, &[atlas_object(1, 2.0, 10.0)]);
        assert!(draws.is_empty());
    }

    #[test]
    fn test_periodic_staleness_redraw() {
        let mut atlas = small_atlas();
        atlas.update(0, &[atlas_object(1, 2.0, 10.0)]);
        let draws = atlas.update(REDRAW_FRAMES, &[atlas_object(1, 2.0, 10.0)]);
        assert_eq!(draws.len(), 6);
    }

    #[test]
    fn test_relight_on_light_change_only() {
        let mut atlas = small_atlas();
        atlas.update(0, &[atlas_object(1, 2.0, 10.0)]);
        atlas.assign_addresses();

        let light = AtlasLight {
            id: 9,
            revision: 0,
            position: Vec3::ZERO,
            radius: Some(50.0),
        };
        // Frame 1: new light, everything relights.
        let tasks = atlas.schedule_relight(1, &[light.clone()]);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].tile_addresses.len(), 6);

        // Frame 2: unchanged light, not a GI sweep frame: nothing.
        let tasks = atlas.schedule_relight(2, &[light.clone()]);
        assert!(tasks.is_empty());

        // Changed light relights again.
        let mut moved = light;
        moved.revision = 1;
        let tasks = atlas.schedule_relight(3, &[moved]);
        assert_eq!(tasks[0].tile_addresses.len(), 6);
    }

    #[test]
    fn test_gi_sweep_relights_all() {
        let mut atlas = small_atlas();
        atlas.update(0, &[atlas_object(1, 2.0, 10.0)]);
        atlas.assign_addresses();
        let light = AtlasLight {
            id: 9,
            revision: 0,
            position: Vec3::ZERO,
            radius: Some(50.0),
        };
        atlas.schedule_relight(1, &[light.clone()]);
        // GI_FRAMES boundary forces the sweep even with nothing changed.
        let tasks = atlas.schedule_relight(GI_FRAMES, &[light]);
        assert_eq!(tasks[0].tile_addresses.len(), 6);
    }

    #[test]
    fn test_point_light_range_filter() {
        let mut atlas = small_atlas();
        let mut far_object = atlas_object(1, 2.0, 10.0);
        far_object.obb = obb(Vec3::new(500.0, 0.0, 0.0), 2.0);
        // Keep distance small so the object qualifies.
        far_object.distance_to_camera = 10.0;
        atlas.update(0, &[far_object]);
        atlas.assign_addresses();

        let light = AtlasLight {
            id: 9,
            revision: 0,
            position: Vec3::ZERO,
            radius: Some(5.0),
        };
        let tasks = atlas.schedule_relight(1, &[light]);
        assert!(tasks.is_empty(), "light cannot reach the object");
    }

    #[test]
    fn test_insert_failure_then_defrag() {
        // Atlas with room for very few tiles.
        let mut atlas = SurfaceAtlas::new(AtlasConfig {
            resolution: 128,
            ..Default::default()
        });
        // Many large objects cannot all fit; failures must be recorded,
        // never panic.
        let objects: Vec<AtlasObject> = (0..16).map(|i| atlas_object(i, 4.0, 10.0)).collect();
        atlas.update(0, &objects);
        assert!(atlas.stats.failed_inserts > 0);

        // The defrag opportunity fires on a later frame.
        atlas.update(1, &objects);
        assert!(atlas.last_frame_defrag.is_some());
    }
}
