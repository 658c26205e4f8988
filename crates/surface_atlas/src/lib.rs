//! Global surface atlas
//!
//! Every qualifying object owns up to six orthographic "card" renders of
//! its bounding-box faces, packed as rectangles into shared G-buffer atlas
//! pages. Updates are tile-granular: cards redraw when allocated, resized
//! or stale, and relight only when their lights change, with a periodic
//! full sweep to integrate indirect bounce.

mod cards;
pub mod gpu;
mod rect_atlas;
mod shaders;

pub use cards::{
    tile_resolution, AtlasConfig, AtlasLight, AtlasObject, AtlasStats, DrawTask, ObjectCards,
    RelightTask, SurfaceAtlas, SurfaceTile, GI_FRAMES, REDRAW_FRAMES, TILE_MAX, TILE_MIN,
    TILE_REFIT_STEP,
};
pub use gpu::{
    AtlasLightData, AtlasTargets, CardConsts, CardVertex, CullingBuffer, GlobalSurfaceAtlasData,
    SurfaceAtlasGpu, SurfaceTileData, CULL_OBJECT_FRAME_SIZE,
};
pub use rect_atlas::{Rect, RectAtlas, TileId};
