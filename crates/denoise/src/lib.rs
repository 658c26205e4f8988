//! Temporal + à-trous denoisers
//!
//! One implementation, instantiated for ray-traced reflections and for
//! ray-traced shadows. Per frame: reset the indirect-dispatch argument
//! buffers, temporally reproject the previous accumulation (classifying
//! every 8x8 tile as "needs denoising" or "converged, just copy"), then
//! run the expanding-stride à-trous iterations over the flagged tiles
//! only. Cost tracks disocclusion, not screen size.

mod pipeline;
mod shaders;

pub use pipeline::{Denoiser, DenoiseInputs};

use bytemuck::{Pod, Zeroable};

/// À-trous iteration count; stride doubles per iteration.
pub const ATROUS_ITERATIONS: u32 = 4;
/// Classification granularity in pixels.
pub const TILE_SIZE: u32 = 8;

/// What a denoiser instance works on.
#[derive(Debug, Clone)]
pub struct DenoiserConfig {
    pub label: &'static str,
    /// Signal format: color for reflections, single channel for shadows.
    pub format: wgpu::TextureFormat,
    /// Run at half resolution and upsample at the end.
    pub upsample: bool,
}

use render_core::wgpu;

impl DenoiserConfig {
    pub fn reflections() -> Self {
        Self {
            label: "reflections",
            format: wgpu::TextureFormat::Rgba16Float,
            upsample: true,
        }
    }

    pub fn shadows() -> Self {
        Self {
            label: "shadows",
            format: wgpu::TextureFormat::Rgba16Float,
            upsample: false,
        }
    }
}

/// Per-frame view data for reprojection.
/// Field order and vec4 alignment are a wire contract with the kernels.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DenoiseViewData {
    /// Current world -> previous clip reprojection.
    pub reproject: [[f32; 4]; 4],
    pub inv_view_proj: [[f32; 4]; 4],
    pub depth_sigma: f32,
    pub normal_sigma: f32,
    pub history_weight: f32,
    pub _pad: f32,
}

/// À-trous stride for an iteration: 1, 2, 4, 8.
pub fn atrous_stride(iteration: u32) -> u32 {
    1 << iteration
}

/// Tile grid covering a target.
pub fn tile_counts(width: u32, height: u32) -> (u32, u32) {
    (width.div_ceil(TILE_SIZE), height.div_ceil(TILE_SIZE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_expands() {
        let strides: Vec<u32> = (0..ATROUS_ITERATIONS).map(atrous_stride).collect();
        assert_eq!(strides, vec![1, 2, 4, 8]);
    }

    #[test]
    fn test_tile_counts_round_up() {
        assert_eq!(tile_counts(1920, 1080), (240, 135));
        assert_eq!(tile_counts(17, 8), (3, 1));
    }

    #[test]
    fn test_view_data_alignment() {
        assert_eq!(std::mem::size_of::<DenoiseViewData>() % 16, 0);
    }

    #[test]
    fn test_both_instances_share_structure() {
        let reflections = DenoiserConfig::reflections();
        let shadows = DenoiserConfig::shadows();
        assert_ne!(reflections.label, shadows.label);
        assert!(reflections.upsample);
        assert!(!shadows.upsample);
    }
}
