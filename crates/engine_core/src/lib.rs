//! Engine core: scene model and GI frame orchestration
//!
//! Owns the object table, lights and mesh assets, and drives the GI
//! subsystems in a fixed order every frame: baked-field upload, global
//! distance field, surface atlas, irradiance volume, denoisers.

mod config;
mod engine;
mod handle;
mod scene;
mod scheduler;

pub use config::{DenoiseSettings, EngineConfig, GlobalSdfSettings, SurfaceAtlasSettings};
pub use engine::{Camera, EngineState, GiEngine, ViewTargets};
pub use handle::{ObjectHandle, ObjectTable};
pub use scene::{FieldState, Light, LightKind, MeshAsset, MeshId, Scene, SceneObject};
pub use scheduler::{Scheduler, SystemNode};
