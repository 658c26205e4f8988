//! Irradiance probe volume
//!
//! A regular grid of light probes placed over the scene bounds. Each
//! frame while playing: trace radiance per probe ray, blend the result
//! into octahedral irradiance/depth textures against the previous frame
//! (ping-pong), patch tile borders for seamless bilinear sampling, then
//! expose the probes for the deferred sample pass and swap.

mod gpu;
mod shaders;
mod volume;

pub use gpu::{DdgiGpu, TraceInputs};
pub use volume::{IrradianceVolume, ProbePhase};

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Interior texel width of one octahedral irradiance tile (plus a 1-texel
/// border on each side in the texture).
pub const IRRADIANCE_TEXELS: u32 = 6;
/// Interior texel width of one octahedral depth tile.
pub const DEPTH_TEXELS: u32 = 14;

/// Persistent, serialized probe volume tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DdgiSettings {
    /// World-space spacing between probes.
    pub probe_distance: f32,
    pub rays_per_probe: u32,
    /// Temporal blend weight toward history (0 = no history).
    pub hysteresis: f32,
    /// Surface offset applied when sampling to fight self-shadowing.
    pub normal_bias: f32,
    /// Perceptual encoding exponent for stored irradiance.
    pub gamma: f32,
    /// Integrate surface-atlas bounce light into traced radiance.
    pub infinite_bounces: bool,
    /// SDF-march fallback instead of hardware ray tracing. Permanent on
    /// devices without ray tracing support.
    pub soft_trace: bool,
}

impl Default for DdgiSettings {
    fn default() -> Self {
        Self {
            probe_distance: 1.5,
            rays_per_probe: 192,
            hysteresis: 0.98,
            normal_bias: 0.25,
            gamma: 5.0,
            infinite_bounces: true,
            soft_trace: true,
        }
    }
}

/// Uniform block consumed by the probe kernels and the deferred sampler.
/// Field order and vec4 alignment are a wire contract with the kernels.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DdgiUniform {
    /// xyz: grid start position, w: probe spacing.
    pub start_position: [f32; 4],
    /// Per-frame random rotation applied to the fixed ray set (quaternion).
    pub ray_rotation: [f32; 4],
    /// xyz: probe counts, w: rays per probe.
    pub probe_counts: [i32; 4],
    pub hysteresis: f32,
    pub normal_bias: f32,
    pub gamma: f32,
    pub max_ray_distance: f32,
    pub irradiance_texels: i32,
    pub depth_texels: i32,
    /// Write index this frame; history is `1 - ping_pong`.
    pub ping_pong: u32,
    /// Set on the first frame after initialization: overwrite, no blend.
    pub first_frame: u32,
}

/// History/new-sample blend factor: the convex combination weight the
/// probe update kernel applies (1.0 on the first frame).
pub fn blend_alpha(hysteresis: f32, first_frame: bool) -> f32 {
    if first_frame {
        1.0
    } else {
        (1.0 - hysteresis).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_layout() {
        assert_eq!(std::mem::size_of::<DdgiUniform>() % 16, 0);
        assert_eq!(std::mem::size_of::<DdgiUniform>(), 80);
    }

    #[test]
    fn test_blend_alpha_first_frame_overwrites() {
        assert_eq!(blend_alpha(0.98, true), 1.0);
        let a = blend_alpha(0.98, false);
        assert!((a - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_octahedral_tile_mapping_covers_interior() {
        // The probe kernels address octahedral tiles the same way the CPU
        // helpers do; every direction must land inside the interior.
        use glam::Vec3;
        for dir in [
            Vec3::X,
            Vec3::NEG_Y,
            Vec3::new(0.5, -0.3, 0.81).normalize(),
            Vec3::new(-0.2, 0.9, -0.38).normalize(),
        ] {
            let (x, y) = math_util::octahedral::oct_texel(dir, IRRADIANCE_TEXELS);
            assert!(x < IRRADIANCE_TEXELS && y < IRRADIANCE_TEXELS);
            let decoded = math_util::octahedral::oct_decode(math_util::octahedral::oct_encode(dir));
            assert!((decoded - dir).length() < 1e-4);
        }
    }

    #[test]
    fn test_settings_serialize_named_fields() {
        let json = serde_json::to_string(&DdgiSettings::default()).unwrap();
        assert!(json.contains("\"probe_distance\""));
        assert!(json.contains("\"hysteresis\""));
        assert!(json.contains("\"soft_trace\""));
        let back: DdgiSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.rays_per_probe, 192);
    }
}
