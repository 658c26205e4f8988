//! Denoiser instance
//!
//! Owns the history ping-pong, the working textures for the à-trous
//! chain, the tile lists and their indirect-dispatch argument buffer.

use crate::{shaders, DenoiseViewData, DenoiserConfig, ATROUS_ITERATIONS};
use bytemuck::{Pod, Zeroable};
use render_core::{create_compute_pipeline, create_storage_texture_2d, wgpu, GpuContext};

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct AtrousConsts {
    stride: u32,
    tiles_per_row: u32,
}

/// Byte offsets of the two indirect dispatch argument triples.
const DENOISE_ARGS_OFFSET: u64 = 0;
const COPY_ARGS_OFFSET: u64 = 12;

/// Per-frame inputs: the raw traced signal plus the G-buffer used for
/// edge stopping.
pub struct DenoiseInputs<'a> {
    pub signal_view: &'a wgpu::TextureView,
    pub depth_view: &'a wgpu::TextureView,
    pub normal_view: &'a wgpu::TextureView,
}

pub struct Denoiser {
    config: DenoiserConfig,
    size: (u32, u32),
    tiles: (u32, u32),
    history: [wgpu::Texture; 2],
    history_views: [wgpu::TextureView; 2],
    working: [wgpu::Texture; 2],
    working_views: [wgpu::TextureView; 2],
    output_view: wgpu::TextureView,
    upsampled: Option<(wgpu::Texture, wgpu::TextureView)>,
    args: wgpu::Buffer,
    denoise_tiles: wgpu::Buffer,
    copy_tiles: wgpu::Buffer,
    uniform: wgpu::Buffer,
    sampler: wgpu::Sampler,
    reproject_layout: wgpu::BindGroupLayout,
    reproject_pipeline: wgpu::ComputePipeline,
    atrous_layout: wgpu::BindGroupLayout,
    atrous_pipeline: wgpu::ComputePipeline,
    copy_pipeline: wgpu::ComputePipeline,
    upsample_layout: wgpu::BindGroupLayout,
    upsample_pipeline: wgpu::ComputePipeline,
    ping_pong: u32,
    push_constants: bool,
}

impl Denoiser {
    pub fn new(ctx: &GpuContext, config: DenoiserConfig, size: (u32, u32)) -> Self {
        let device = &ctx.device;
        let tiles = crate::tile_counts(size.0, size.1);
        let tile_capacity = (tiles.0 * tiles.1) as u64;

        let make = |label: &'static str| {
            let t = create_storage_texture_2d(device, label, size, config.format, false);
            let v = t.create_view(&wgpu::TextureViewDescriptor::default());
            (t, v)
        };
        let (h0, hv0) = make("denoise_history");
        let (h1, hv1) = make("denoise_history");
        let (w0, wv0) = make("denoise_working");
        let (w1, wv1) = make("denoise_working");
        let (_output, output_view) = make("denoise_output");
        let upsampled = config.upsample.then(|| {
            let full = (size.0 * 2, size.1 * 2);
            let t = create_storage_texture_2d(device, "denoise_upsampled", full, config.format, false);
            let v = t.create_view(&wgpu::TextureViewDescriptor::default());
            (t, v)
        });

        let args = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("denoise_dispatch_args"),
            size: 32,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::INDIRECT
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let tile_list = |label: &'static str| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: (tile_capacity * 4).max(4),
                usage: wgpu::BufferUsages::STORAGE,
                mapped_at_creation: false,
            })
        };
        let denoise_tiles = tile_list("denoise_tile_list");
        let copy_tiles = tile_list("denoise_copy_list");
        let uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("denoise_view_uniform"),
            size: std::mem::size_of::<DenoiseViewData>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("denoise_sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let reproject_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("denoise_reproject_layout"),
            entries: &[
                uniform_entry(0),
                texture_entry(1),
                texture_entry(2),
                depth_entry(3),
                storage_texture_entry(4, config.format),
                rw_buffer_entry(5),
                rw_buffer_entry(6),
                rw_buffer_entry(7),
                sampler_entry(8),
            ],
        });
        let reproject_pipeline = create_compute_pipeline(
            device,
            "denoise_reproject",
            shaders::REPROJECT_SRC,
            "reproject",
            &[&reproject_layout],
            0,
        );

        let push = ctx.has_push_constants();
        let atrous_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("denoise_atrous_layout"),
            entries: &[
                uniform_entry(0),
                texture_entry(1),
                depth_entry(2),
                texture_entry(3),
                storage_texture_entry(4, config.format),
                ro_buffer_entry(5),
            ],
        });
        let push_size = if push {
            std::mem::size_of::<AtrousConsts>() as u32
        } else {
            0
        };
        let atrous_pipeline = create_compute_pipeline(
            device,
            "denoise_atrous",
            shaders::ATROUS_SRC,
            "atrous",
            &[&atrous_layout],
            push_size,
        );
        let copy_pipeline = create_compute_pipeline(
            device,
            "denoise_copy_tile",
            shaders::ATROUS_SRC,
            "copy_tile",
            &[&atrous_layout],
            push_size,
        );

        let upsample_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("denoise_upsample_layout"),
            entries: &[
                texture_entry(0),
                sampler_entry(1),
                storage_texture_entry(2, config.format),
            ],
        });
        let upsample_pipeline = create_compute_pipeline(
            device,
            "denoise_upsample",
            shaders::UPSAMPLE_SRC,
            "upsample",
            &[&upsample_layout],
            0,
        );

        log::debug!(
            "denoiser '{}' created: {}x{}, {} tiles",
            config.label,
            size.0,
            size.1,
            tile_capacity
        );

        Self {
            config,
            size,
            tiles,
            history: [h0, h1],
            history_views: [hv0, hv1],
            working: [w0, w1],
            working_views: [wv0, wv1],
            output_view,
            upsampled,
            args,
            denoise_tiles,
            copy_tiles,
            uniform,
            sampler,
            reproject_layout,
            reproject_pipeline,
            atrous_layout,
            atrous_pipeline,
            copy_pipeline,
            upsample_layout,
            upsample_pipeline,
            ping_pong: 0,
            push_constants: push,
        }
    }

    pub fn label(&self) -> &'static str {
        self.config.label
    }

    /// Denoised result of the last recorded frame.
    pub fn output_view(&self) -> &wgpu::TextureView {
        match &self.upsampled {
            Some((_, view)) => view,
            None => &self.output_view,
        }
    }

    /// Record one denoise frame. Pass order: reset args -> reproject and
    /// classify -> à-trous over flagged tiles (indirect) -> copy converged
    /// tiles -> optional upsample.
    pub fn record(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        inputs: &DenoiseInputs<'_>,
        view_data: &DenoiseViewData,
    ) {
        if !self.push_constants {
            return;
        }
        // Reset both indirect argument triples: zero tiles, 1x1 planes.
        queue.write_buffer(&self.args, 0, bytemuck::cast_slice(&[0u32, 1, 1, 0, 1, 1, 0, 0]));
        queue.write_buffer(&self.uniform, 0, bytemuck::bytes_of(view_data));

        let write = self.ping_pong as usize;
        let history = 1 - write;

        // Temporal reprojection + tile classification.
        {
            let bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("denoise_reproject_bind"),
                layout: &self.reproject_layout,
                entries: &[
                    wgpu::BindGroupEntry { binding: 0, resource: self.uniform.as_entire_binding() },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(inputs.signal_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(&self.history_views[history]),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(inputs.depth_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::TextureView(&self.history_views[write]),
                    },
                    wgpu::BindGroupEntry { binding: 5, resource: self.args.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 6, resource: self.denoise_tiles.as_entire_binding() },
                    wgpu::BindGroupEntry { binding: 7, resource: self.copy_tiles.as_entire_binding() },
                    wgpu::BindGroupEntry {
                        binding: 8,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                ],
            });
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("denoise_reproject_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.reproject_pipeline);
            pass.set_bind_group(0, &bind, &[]);
            pass.dispatch_workgroups(self.tiles.0, self.tiles.1, 1);
        }

        // Seed the working chain so taps into untouched tiles stay valid.
        encoder.copy_texture_to_texture(
            self.history[write].as_image_copy(),
            self.working[0].as_image_copy(),
            wgpu::Extent3d {
                width: self.size.0,
                height: self.size.1,
                depth_or_array_layers: 1,
            },
        );

        // Expanding-stride iterations over flagged tiles only; the last
        // one lands in the output texture.
        for iteration in 0..ATROUS_ITERATIONS {
            let src = &self.working_views[(iteration % 2) as usize];
            let dst = if iteration + 1 == ATROUS_ITERATIONS {
                &self.output_view
            } else {
                &self.working_views[((iteration + 1) % 2) as usize]
            };
            let bind = self.atrous_bind(device, src, dst, inputs, &self.denoise_tiles);
            let consts = AtrousConsts {
                stride: crate::atrous_stride(iteration),
                tiles_per_row: self.tiles.0,
            };
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("denoise_atrous_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.atrous_pipeline);
            pass.set_bind_group(0, &bind, &[]);
            pass.set_push_constants(0, bytemuck::bytes_of(&consts));
            pass.dispatch_workgroups_indirect(&self.args, DENOISE_ARGS_OFFSET);
        }

        // Converged tiles bypass the filter chain.
        {
            let bind = self.atrous_bind(
                device,
                &self.history_views[write],
                &self.output_view,
                inputs,
                &self.copy_tiles,
            );
            let consts = AtrousConsts {
                stride: 1,
                tiles_per_row: self.tiles.0,
            };
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("denoise_copy_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.copy_pipeline);
            pass.set_bind_group(0, &bind, &[]);
            pass.set_push_constants(0, bytemuck::bytes_of(&consts));
            pass.dispatch_workgroups_indirect(&self.args, COPY_ARGS_OFFSET);
        }

        if let Some((texture, view)) = &self.upsampled {
            let bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("denoise_upsample_bind"),
                layout: &self.upsample_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&self.output_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&self.sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(view),
                    },
                ],
            });
            let size = texture.size();
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("denoise_upsample_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.upsample_pipeline);
            pass.set_bind_group(0, &bind, &[]);
            pass.dispatch_workgroups(size.width.div_ceil(8), size.height.div_ceil(8), 1);
        }

        self.ping_pong = 1 - self.ping_pong;
    }

    fn atrous_bind(
        &self,
        device: &wgpu::Device,
        src: &wgpu::TextureView,
        dst: &wgpu::TextureView,
        inputs: &DenoiseInputs<'_>,
        tiles: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("denoise_atrous_bind"),
            layout: &self.atrous_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: self.uniform.as_entire_binding() },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(src),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(inputs.depth_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(inputs.normal_view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(dst),
                },
                wgpu::BindGroupEntry { binding: 5, resource: tiles.as_entire_binding() },
            ],
        })
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn depth_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Depth,
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn storage_texture_entry(binding: u32, format: wgpu::TextureFormat) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format,
            view_dimension: wgpu::TextureViewDimension::D2,
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

fn rw_buffer_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: false },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn ro_buffer_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}
