//! Engine configuration
//!
//! Loads settings from a JSON file or falls back to defaults. The GI
//! tunables are plain named fields so scene files stay hand-editable.

use ddgi::DdgiSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub global_sdf: GlobalSdfSettings,
    pub surface_atlas: SurfaceAtlasSettings,
    pub ddgi: DdgiSettings,
    pub denoise: DenoiseSettings,
    /// Directory for baked distance-field files.
    pub bake_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalSdfSettings {
    pub base_distance: f32,
    pub resolution: u32,
    pub cascade_count: usize,
    pub min_object_radius_voxels: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceAtlasSettings {
    pub resolution: u32,
    pub min_object_radius: f32,
    pub max_distance: f32,
    pub texels_per_unit: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenoiseSettings {
    pub depth_sigma: f32,
    pub normal_sigma: f32,
    pub history_weight: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            global_sdf: GlobalSdfSettings {
                base_distance: 15.0,
                resolution: 128,
                cascade_count: 4,
                min_object_radius_voxels: 0.5,
            },
            surface_atlas: SurfaceAtlasSettings {
                resolution: 4096,
                min_object_radius: 0.5,
                max_distance: 200.0,
                texels_per_unit: 16.0,
            },
            ddgi: DdgiSettings::default(),
            denoise: DenoiseSettings {
                depth_sigma: 0.01,
                normal_sigma: 32.0,
                history_weight: 0.9,
            },
            bake_dir: "sdf".to_string(),
        }
    }
}

impl EngineConfig {
    /// Read from `path`, or write defaults there when missing/invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(config) => config,
                Err(err) => {
                    log::warn!("config {:?} invalid ({err}); using defaults", path);
                    Self::default()
                }
            },
            Err(_) => {
                let config = Self::default();
                if let Ok(json) = serde_json::to_string_pretty(&config) {
                    if let Some(parent) = path.parent() {
                        let _ = fs::create_dir_all(parent);
                    }
                    let _ = fs::write(path, json);
                }
                config
            }
        }
    }

    pub fn global_sdf_config(&self) -> global_sdf::GlobalSdfConfig {
        global_sdf::GlobalSdfConfig {
            base_distance: self.global_sdf.base_distance,
            resolution: self.global_sdf.resolution,
            cascade_count: self.global_sdf.cascade_count,
            min_object_radius_voxels: self.global_sdf.min_object_radius_voxels,
        }
    }

    pub fn atlas_config(&self) -> surface_atlas::AtlasConfig {
        surface_atlas::AtlasConfig {
            resolution: self.surface_atlas.resolution,
            min_object_radius: self.surface_atlas.min_object_radius,
            max_distance: self.surface_atlas.max_distance,
            texels_per_unit: self.surface_atlas.texels_per_unit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.global_sdf.resolution, 128);
        assert_eq!(back.ddgi.rays_per_probe, config.ddgi.rays_per_probe);
    }

    #[test]
    fn test_load_missing_writes_defaults() {
        let dir = std::env::temp_dir().join("gi_engine_config_test");
        let path = dir.join("settings.json");
        let _ = fs::remove_file(&path);
        let config = EngineConfig::load_or_default(&path);
        assert_eq!(config.surface_atlas.resolution, 4096);
        assert!(path.exists(), "defaults written back");
        let _ = fs::remove_file(&path);
    }
}
