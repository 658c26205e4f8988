//! Probe volume state machine

use crate::gpu::DdgiGpu;
use crate::{blend_alpha, DdgiSettings, DdgiUniform, DEPTH_TEXELS, IRRADIANCE_TEXELS};
use glam::{UVec3, Vec3};
use math_util::Aabb;
use rand::Rng;
use render_core::{wgpu, GpuContext};

const MIN_PROBES_PER_AXIS: u32 = 2;
const MAX_PROBES_PER_AXIS: u32 = 64;

/// Update phases, advanced once per frame while playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbePhase {
    Uninitialized,
    Tracing,
    ProbeUpdate,
    BorderUpdate,
    SampleProbe,
}

/// CPU state of the probe volume. GPU resources exist only between
/// `on_play_start` and `on_play_end`.
pub struct IrradianceVolume {
    pub settings: DdgiSettings,
    scene_bounds: Aabb,
    start_position: Vec3,
    probe_counts: UVec3,
    phase: ProbePhase,
    ping_pong: u32,
    frame: u64,
    first_frame: bool,
    playing: bool,
    gpu: Option<DdgiGpu>,
    /// Set when the grid changed shape; textures reallocate on demand.
    needs_realloc: bool,
}

impl IrradianceVolume {
    pub fn new(settings: DdgiSettings) -> Self {
        Self {
            settings,
            scene_bounds: Aabb::cube(Vec3::ZERO, 1.0),
            start_position: Vec3::ZERO,
            probe_counts: UVec3::splat(MIN_PROBES_PER_AXIS),
            phase: ProbePhase::Uninitialized,
            ping_pong: 0,
            frame: 0,
            first_frame: true,
            playing: false,
            gpu: None,
            needs_realloc: true,
        }
    }

    pub fn phase(&self) -> ProbePhase {
        self.phase
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn probe_counts(&self) -> UVec3 {
        self.probe_counts
    }

    pub fn probe_count(&self) -> u32 {
        self.probe_counts.x * self.probe_counts.y * self.probe_counts.z
    }

    pub fn gpu(&self) -> Option<&DdgiGpu> {
        self.gpu.as_ref()
    }

    /// Game-start lifecycle: allocate and reset history.
    pub fn on_play_start(&mut self, ctx: Option<&GpuContext>) {
        self.playing = true;
        self.phase = ProbePhase::Tracing;
        self.ping_pong = 0;
        self.frame = 0;
        self.first_frame = true;
        self.needs_realloc = true;
        if let Some(ctx) = ctx {
            self.gpu = Some(DdgiGpu::new(ctx));
        }
        log::info!(
            "probe volume started: {}x{}x{} probes",
            self.probe_counts.x,
            self.probe_counts.y,
            self.probe_counts.z
        );
    }

    /// Game-end lifecycle: drop GPU resources; nothing persists across
    /// edit sessions.
    pub fn on_play_end(&mut self) {
        self.playing = false;
        self.phase = ProbePhase::Uninitialized;
        self.gpu = None;
    }

    /// Track the scene bounds. The grid is recomputed only when the box
    /// changed meaningfully, not every frame.
    pub fn set_scene_bounds(&mut self, bounds: Aabb) {
        let spacing = self.settings.probe_distance;
        let center_moved = (bounds.center() - self.scene_bounds.center()).length() > spacing;
        let size_changed = (bounds.size() - self.scene_bounds.size()).abs().max_element() > spacing;
        if !center_moved && !size_changed && self.phase != ProbePhase::Uninitialized {
            return;
        }
        self.scene_bounds = bounds;

        let counts = (bounds.size() / spacing).ceil();
        self.probe_counts = UVec3::new(
            (counts.x as u32 + 1).clamp(MIN_PROBES_PER_AXIS, MAX_PROBES_PER_AXIS),
            (counts.y as u32 + 1).clamp(MIN_PROBES_PER_AXIS, MAX_PROBES_PER_AXIS),
            (counts.z as u32 + 1).clamp(MIN_PROBES_PER_AXIS, MAX_PROBES_PER_AXIS),
        );
        // Center the grid on the box.
        let grid_size = (self.probe_counts - UVec3::ONE).as_vec3() * spacing;
        self.start_position = bounds.center() - grid_size * 0.5;
        self.needs_realloc = true;
        log::debug!(
            "probe grid recomputed: {}x{}x{}",
            self.probe_counts.x,
            self.probe_counts.y,
            self.probe_counts.z
        );
    }

    /// Uniform for this frame's kernels.
    pub fn uniform(&self, rng: &mut impl Rng) -> DdgiUniform {
        DdgiUniform {
            start_position: [
                self.start_position.x,
                self.start_position.y,
                self.start_position.z,
                self.settings.probe_distance,
            ],
            ray_rotation: random_rotation_quat(rng),
            probe_counts: [
                self.probe_counts.x as i32,
                self.probe_counts.y as i32,
                self.probe_counts.z as i32,
                self.settings.rays_per_probe as i32,
            ],
            hysteresis: self.settings.hysteresis,
            normal_bias: self.settings.normal_bias,
            gamma: self.settings.gamma,
            max_ray_distance: self.settings.probe_distance * 4.0,
            irradiance_texels: IRRADIANCE_TEXELS as i32,
            depth_texels: DEPTH_TEXELS as i32,
            ping_pong: self.ping_pong,
            first_frame: self.first_frame as u32,
        }
    }

    /// Effective blend factor for the probe update this frame.
    pub fn blend_alpha(&self) -> f32 {
        blend_alpha(self.settings.hysteresis, self.first_frame)
    }

    /// Run one frame of the phase machine, recording GPU passes when a
    /// device is present. No-op outside play.
    pub fn advance(
        &mut self,
        encoder: Option<&mut wgpu::CommandEncoder>,
        queue: Option<&wgpu::Queue>,
        device: Option<&wgpu::Device>,
        trace_inputs: Option<&crate::gpu::TraceInputs<'_>>,
        rng: &mut impl Rng,
    ) {
        if !self.playing {
            return;
        }
        let uniform = self.uniform(rng);

        if let (Some(gpu), Some(device), Some(queue)) = (self.gpu.as_mut(), device, queue) {
            if self.needs_realloc {
                gpu.reallocate(device, self.probe_counts, self.settings.rays_per_probe);
                self.needs_realloc = false;
                self.first_frame = true;
            }
            if let (Some(encoder), Some(inputs)) = (encoder, trace_inputs) {
                gpu.upload_uniform(queue, &uniform);
                // Tracing -> ProbeUpdate -> BorderUpdate in submission
                // order; barriers are implicit in the pass ordering.
                self.phase = ProbePhase::Tracing;
                gpu.record_trace(device, encoder, inputs);
                self.phase = ProbePhase::ProbeUpdate;
                gpu.record_probe_update(device, encoder, self.ping_pong);
                self.phase = ProbePhase::BorderUpdate;
                gpu.record_border_update(device, encoder, self.ping_pong);
            }
        }

        // Probes are now consumable by the deferred sample pass.
        self.phase = ProbePhase::SampleProbe;

        // End of frame: swap ping-pong and count the frame.
        self.ping_pong = 1 - self.ping_pong;
        self.frame += 1;
        self.first_frame = false;
        self.phase = ProbePhase::Tracing;
    }
}

/// Uniform random rotation quaternion (Shoemake's method).
fn random_rotation_quat(rng: &mut impl Rng) -> [f32; 4] {
    let u1: f32 = rng.random();
    let u2: f32 = rng.random();
    let u3: f32 = rng.random();
    let a = (1.0 - u1).sqrt();
    let b = u1.sqrt();
    let tau = std::f32::consts::TAU;
    [
        a * (tau * u2).sin(),
        a * (tau * u2).cos(),
        b * (tau * u3).sin(),
        b * (tau * u3).cos(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng() -> impl Rng {
        use rand::SeedableRng;
        rand::rngs::StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_lifecycle_phases() {
        let mut volume = IrradianceVolume::new(DdgiSettings::default());
        assert_eq!(volume.phase(), ProbePhase::Uninitialized);
        volume.on_play_start(None);
        assert_eq!(volume.phase(), ProbePhase::Tracing);
        volume.on_play_end();
        assert_eq!(volume.phase(), ProbePhase::Uninitialized);
    }

    #[test]
    fn test_grid_from_bounds() {
        let mut volume = IrradianceVolume::new(DdgiSettings {
            probe_distance: 1.5,
            ..Default::default()
        });
        volume.on_play_start(None);
        volume.set_scene_bounds(Aabb::cube(Vec3::ZERO, 3.0));
        // 6 units / 1.5 spacing -> 4 cells -> 5 probes per axis.
        assert_eq!(volume.probe_counts(), UVec3::splat(5));
    }

    #[test]
    fn test_small_bounds_move_keeps_grid() {
        let mut volume = IrradianceVolume::new(DdgiSettings::default());
        volume.on_play_start(None);
        volume.set_scene_bounds(Aabb::cube(Vec3::ZERO, 3.0));
        let before = volume.probe_counts();
        let before_start = volume.start_position;

        // Sub-spacing jitter must not retrigger a grid rebuild.
        volume.set_scene_bounds(Aabb::cube(Vec3::splat(0.2), 3.0));
        assert_eq!(volume.probe_counts(), before);
        assert_eq!(volume.start_position, before_start);
    }

    #[test]
    fn test_first_frame_then_blend() {
        let mut volume = IrradianceVolume::new(DdgiSettings {
            hysteresis: 0.9,
            ..Default::default()
        });
        volume.on_play_start(None);
        assert_eq!(volume.blend_alpha(), 1.0, "no history on the first frame");
        volume.advance(None, None, None, None, &mut rng());
        let alpha = volume.blend_alpha();
        assert!((alpha - 0.1).abs() < 1e-6, "convex blend after history exists");
    }

    #[test]
    fn test_ping_pong_swaps_each_frame() {
        let mut volume = IrradianceVolume::new(DdgiSettings::default());
        volume.on_play_start(None);
        let mut r = rng();
        let first = volume.uniform(&mut r).ping_pong;
        volume.advance(None, None, None, None, &mut r);
        let second = volume.uniform(&mut r).ping_pong;
        assert_ne!(first, second);
    }

    #[test]
    fn test_not_playing_is_noop() {
        let mut volume = IrradianceVolume::new(DdgiSettings::default());
        let mut r = rng();
        volume.advance(None, None, None, None, &mut r);
        assert_eq!(volume.phase(), ProbePhase::Uninitialized);
    }

    #[test]
    fn test_random_rotation_is_unit() {
        let mut r = rng();
        let q = random_rotation_quat(&mut r);
        let len = (q[0] * q[0] + q[1] * q[1] + q[2] * q[2] + q[3] * q[3]).sqrt();
        assert!((len - 1.0).abs() < 1e-4);
    }
}
