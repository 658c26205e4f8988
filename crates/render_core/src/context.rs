//! Headless device setup

use std::sync::Arc;

/// Device/queue pair for compute-heavy GI work. No surface: the GI
/// pipeline renders into its own targets.
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub adapter_name: String,
    /// Hardware ray tracing is unavailable through this backend; the
    /// SDF-march fallback stays selected.
    pub supports_hardware_raytracing: bool,
}

impl GpuContext {
    /// Acquire a headless device. `None` when no adapter is available;
    /// the engine then runs the CPU-side bookkeeping without GPU passes.
    pub fn new() -> Option<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))?;

        let info = adapter.get_info();
        let mut required_features = wgpu::Features::PUSH_CONSTANTS;
        if !adapter.features().contains(required_features) {
            required_features = wgpu::Features::empty();
        }
        let mut limits = wgpu::Limits::default();
        if required_features.contains(wgpu::Features::PUSH_CONSTANTS) {
            limits.max_push_constant_size = 128;
        }

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("gi_device"),
                required_features,
                required_limits: limits,
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        ))
        .map_err(|err| {
            log::warn!("device request failed: {err}");
            err
        })
        .ok()?;

        log::info!("gpu: {} ({:?})", info.name, info.backend);
        Some(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            adapter_name: info.name,
            supports_hardware_raytracing: false,
        })
    }

    pub fn has_push_constants(&self) -> bool {
        self.device.features().contains(wgpu::Features::PUSH_CONSTANTS)
    }
}
