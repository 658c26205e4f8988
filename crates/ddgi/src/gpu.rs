//! GPU resources and pass recording for the probe volume
//!
//! Textures are reallocated on demand when the grid shape changes, never
//! per frame. Irradiance/depth exist as ping-pong pairs: the kernels read
//! `1 - ping_pong` as history and write `ping_pong`.

use crate::{shaders, DdgiUniform, DEPTH_TEXELS, IRRADIANCE_TEXELS};
use glam::UVec3;
use render_core::{create_compute_pipeline, create_storage_texture_2d, wgpu, GpuContext};

/// Read-only references into the other GI subsystems used while tracing.
pub struct TraceInputs<'a> {
    pub sdf_uniform: &'a wgpu::Buffer,
    pub sdf_mip_view: &'a wgpu::TextureView,
    pub sdf_sampler: &'a wgpu::Sampler,
    pub atlas_radiance_view: &'a wgpu::TextureView,
    pub atlas_sampler: &'a wgpu::Sampler,
}

struct ProbeTextures {
    radiance: wgpu::Texture,
    radiance_view: wgpu::TextureView,
    // Views keep the underlying textures alive.
    irradiance_views: [wgpu::TextureView; 2],
    depth_views: [wgpu::TextureView; 2],
}

pub struct DdgiGpu {
    uniform: wgpu::Buffer,
    sampler: wgpu::Sampler,
    textures: Option<ProbeTextures>,
    trace_layout: wgpu::BindGroupLayout,
    trace_pipeline: wgpu::ComputePipeline,
    update_layout: wgpu::BindGroupLayout,
    irradiance_pipeline: wgpu::ComputePipeline,
    depth_pipeline: wgpu::ComputePipeline,
    border_irradiance_pipeline: wgpu::ComputePipeline,
    border_depth_pipeline: wgpu::ComputePipeline,
    sample_layout: wgpu::BindGroupLayout,
    sample_pipeline: wgpu::ComputePipeline,
    probe_counts: UVec3,
}

impl DdgiGpu {
    pub fn new(ctx: &GpuContext) -> Self {
        let device = &ctx.device;

        let uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ddgi_uniform"),
            size: std::mem::size_of::<DdgiUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("ddgi_probe_sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        let trace_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ddgi_trace_layout"),
            entries: &[
                buffer_entry(0, wgpu::BufferBindingType::Uniform),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: wgpu::TextureFormat::Rgba16Float,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
                buffer_entry(2, wgpu::BufferBindingType::Uniform),
                // The distance-field mip is r32float: not filterable.
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D3,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                    count: None,
                },
                texture_entry(5, wgpu::TextureViewDimension::D2),
                sampler_entry(6),
            ],
        });
        let trace_pipeline = create_compute_pipeline(
            device,
            "ddgi_trace",
            &shaders::trace_src(),
            "trace_probes",
            &[&trace_layout],
            0,
        );

        let update_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ddgi_update_layout"),
            entries: &[
                buffer_entry(0, wgpu::BufferBindingType::Uniform),
                texture_entry(1, wgpu::TextureViewDimension::D2),
                texture_entry(2, wgpu::TextureViewDimension::D2),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: wgpu::TextureFormat::Rgba16Float,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
                // Depth history is rg32float: loaded, never filtered.
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 5,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: wgpu::TextureFormat::Rg32Float,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
            ],
        });
        let update_source = shaders::update_src();
        let irradiance_pipeline = create_compute_pipeline(
            device,
            "ddgi_update_irradiance",
            &update_source,
            "update_irradiance",
            &[&update_layout],
            0,
        );
        let depth_pipeline = create_compute_pipeline(
            device,
            "ddgi_update_depth",
            &update_source,
            "update_depth",
            &[&update_layout],
            0,
        );
        let border_irradiance_pipeline = create_compute_pipeline(
            device,
            "ddgi_border_irradiance",
            &update_source,
            "border_irradiance",
            &[&update_layout],
            0,
        );
        let border_depth_pipeline = create_compute_pipeline(
            device,
            "ddgi_border_depth",
            &update_source,
            "border_depth",
            &[&update_layout],
            0,
        );

        let sample_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ddgi_sample_layout"),
            entries: &[
                buffer_entry(0, wgpu::BufferBindingType::Uniform),
                texture_entry(1, wgpu::TextureViewDimension::D2),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                sampler_entry(3),
                texture_entry(4, wgpu::TextureViewDimension::D2),
                texture_entry(5, wgpu::TextureViewDimension::D2),
                wgpu::BindGroupLayoutEntry {
                    binding: 6,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: wgpu::TextureFormat::Rgba16Float,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
            ],
        });
        let sample_pipeline = create_compute_pipeline(
            device,
            "ddgi_sample",
            &shaders::sample_src(),
            "sample_probes",
            &[&sample_layout],
            0,
        );

        Self {
            uniform,
            sampler,
            textures: None,
            trace_layout,
            trace_pipeline,
            update_layout,
            irradiance_pipeline,
            depth_pipeline,
            border_irradiance_pipeline,
            border_depth_pipeline,
            sample_layout,
            sample_pipeline,
            probe_counts: UVec3::ZERO,
        }
    }

    /// Full-screen indirect-lighting resolve consumed by deferred
    /// lighting: samples the probe grid for every G-buffer texel.
    pub fn record_sample(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        ping_pong: u32,
        gbuffer_position: &wgpu::TextureView,
        gbuffer_normal: &wgpu::TextureView,
        output: &wgpu::TextureView,
        output_size: (u32, u32),
    ) {
        let Some(textures) = &self.textures else {
            return;
        };
        let index = ping_pong as usize;
        let bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ddgi_sample_bind"),
            layout: &self.sample_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: self.uniform.as_entire_binding() },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&textures.irradiance_views[index]),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&textures.depth_views[index]),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(gbuffer_position),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(gbuffer_normal),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::TextureView(output),
                },
            ],
        });
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("ddgi_sample_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.sample_pipeline);
        pass.set_bind_group(0, &bind, &[]);
        pass.dispatch_workgroups(output_size.0.div_ceil(8), output_size.1.div_ceil(8), 1);
    }

    /// Recreate the probe textures for a new grid shape.
    pub fn reallocate(&mut self, device: &wgpu::Device, probe_counts: UVec3, rays_per_probe: u32) {
        self.probe_counts = probe_counts;
        let probe_count = probe_counts.x * probe_counts.y * probe_counts.z;

        let radiance = create_storage_texture_2d(
            device,
            "ddgi_trace_radiance",
            (rays_per_probe.max(1), probe_count.max(1)),
            wgpu::TextureFormat::Rgba16Float,
            false,
        );
        let radiance_view = radiance.create_view(&wgpu::TextureViewDescriptor::default());

        let irr_size = probe_texture_size(probe_counts, IRRADIANCE_TEXELS);
        let depth_size = probe_texture_size(probe_counts, DEPTH_TEXELS);
        let make_pair = |label: &'static str, size: (u32, u32), format| {
            let a = create_storage_texture_2d(device, label, size, format, false);
            let b = create_storage_texture_2d(device, label, size, format, false);
            let va = a.create_view(&wgpu::TextureViewDescriptor::default());
            let vb = b.create_view(&wgpu::TextureViewDescriptor::default());
            [va, vb]
        };
        let irradiance_views =
            make_pair("ddgi_irradiance", irr_size, wgpu::TextureFormat::Rgba16Float);
        let depth_views = make_pair("ddgi_depth", depth_size, wgpu::TextureFormat::Rg32Float);

        self.textures = Some(ProbeTextures {
            radiance,
            radiance_view,
            irradiance_views,
            depth_views,
        });
        log::debug!(
            "ddgi textures reallocated: irradiance {}x{}, depth {}x{}",
            irr_size.0,
            irr_size.1,
            depth_size.0,
            depth_size.1
        );
    }

    pub fn upload_uniform(&self, queue: &wgpu::Queue, uniform: &DdgiUniform) {
        queue.write_buffer(&self.uniform, 0, bytemuck::bytes_of(uniform));
    }

    pub fn uniform_buffer(&self) -> &wgpu::Buffer {
        &self.uniform
    }

    pub fn probe_sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    /// Irradiance view written this frame (front buffer after swap).
    pub fn irradiance_view(&self, ping_pong: u32) -> Option<&wgpu::TextureView> {
        self.textures
            .as_ref()
            .map(|t| &t.irradiance_views[ping_pong as usize])
    }

    pub fn depth_view(&self, ping_pong: u32) -> Option<&wgpu::TextureView> {
        self.textures.as_ref().map(|t| &t.depth_views[ping_pong as usize])
    }

    pub fn record_trace(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        inputs: &TraceInputs<'_>,
    ) {
        let Some(textures) = &self.textures else {
            return;
        };
        let bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ddgi_trace_bind"),
            layout: &self.trace_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: self.uniform.as_entire_binding() },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&textures.radiance_view),
                },
                wgpu::BindGroupEntry { binding: 2, resource: inputs.sdf_uniform.as_entire_binding() },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(inputs.sdf_mip_view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(inputs.sdf_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(inputs.atlas_radiance_view),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::Sampler(inputs.atlas_sampler),
                },
            ],
        });

        let size = textures.radiance.size();
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("ddgi_trace_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.trace_pipeline);
        pass.set_bind_group(0, &bind, &[]);
        pass.dispatch_workgroups(size.width.div_ceil(8), size.height.div_ceil(8), 1);
    }

    /// Blend the fresh trace into the `ping_pong` textures, reading the
    /// other pair as history.
    pub fn record_probe_update(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        ping_pong: u32,
    ) {
        self.record_update_pass(
            device,
            encoder,
            ping_pong,
            "ddgi_probe_update",
            &self.irradiance_pipeline,
            &self.depth_pipeline,
            false,
        );
    }

    /// Patch the 1-texel borders of every probe tile.
    pub fn record_border_update(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        ping_pong: u32,
    ) {
        self.record_update_pass(
            device,
            encoder,
            ping_pong,
            "ddgi_border_update",
            &self.border_irradiance_pipeline,
            &self.border_depth_pipeline,
            true,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn record_update_pass(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        ping_pong: u32,
        label: &'static str,
        irradiance_pipeline: &wgpu::ComputePipeline,
        depth_pipeline: &wgpu::ComputePipeline,
        with_border: bool,
    ) {
        let Some(textures) = &self.textures else {
            return;
        };
        let write = ping_pong as usize;
        let history = 1 - write;
        let bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.update_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: self.uniform.as_entire_binding() },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&textures.radiance_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&textures.irradiance_views[history]),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&textures.irradiance_views[write]),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&textures.depth_views[history]),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(&textures.depth_views[write]),
                },
            ],
        });

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(label),
            timestamp_writes: None,
        });
        pass.set_bind_group(0, &bind, &[]);

        let counts = self.probe_counts;
        let plane = counts.x * counts.y;
        let dims = |texels: u32, border: bool| -> (u32, u32) {
            if border {
                ((texels + 2) * plane, (texels + 2) * counts.z)
            } else {
                (texels * plane, texels * counts.z)
            }
        };

        let (w, h) = dims(IRRADIANCE_TEXELS, with_border);
        pass.set_pipeline(irradiance_pipeline);
        pass.dispatch_workgroups(w.div_ceil(8), h.div_ceil(8), 1);

        let (w, h) = dims(DEPTH_TEXELS, with_border);
        pass.set_pipeline(depth_pipeline);
        pass.dispatch_workgroups(w.div_ceil(8), h.div_ceil(8), 1);
    }
}

fn probe_texture_size(counts: UVec3, texels: u32) -> (u32, u32) {
    (
        (counts.x * counts.y * (texels + 2)).max(1),
        (counts.z * (texels + 2)).max(1),
    )
}

fn buffer_entry(binding: u32, ty: wgpu::BufferBindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(binding: u32, dim: wgpu::TextureViewDimension) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: dim,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}
