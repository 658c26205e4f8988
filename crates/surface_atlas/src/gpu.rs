//! GPU side of the surface atlas
//!
//! Shared G-buffer atlas pages, the card draw/clear pipelines, the tile
//! relight compute pass, and the culling output buffer with its rotating
//! readback. The global distance field resources are passed in read-only;
//! this module never writes them.

use crate::cards::{DrawTask, RelightTask, SurfaceTile};
use crate::rect_atlas::Rect;
use bytemuck::{Pod, Zeroable};
use render_core::{create_compute_pipeline, create_storage_texture_2d, wgpu, DynamicBuffer, GpuContext, ReadbackRing};

/// Frames of latency tolerated on the culling counter readback.
pub const CULL_OBJECT_FRAME_SIZE: usize = 8;
/// Safety factor applied to the CPU-side culled object estimate.
const CULL_ESTIMATE_FACTOR: f32 = 1.3;

/// Uniform block shared by the atlas kernels.
/// Field order and vec4 alignment are a wire contract with the kernels.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GlobalSurfaceAtlasData {
    pub resolution: f32,
    pub tile_count: u32,
    pub light_count: u32,
    pub _pad: u32,
}

/// Per-tile metadata row.
/// Field order and vec4 alignment are a wire contract with the kernels.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SurfaceTileData {
    pub view_proj: [[f32; 4]; 4],
    pub inv_view_proj: [[f32; 4]; 4],
    /// x, y, width, height in atlas texels.
    pub rect: [f32; 4],
    /// x: object table index, y: face, zw: unused.
    pub meta: [u32; 4],
}

/// Per-light row consumed by the relight kernel.
/// Field order and vec4 alignment are a wire contract with the kernels.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct AtlasLightData {
    /// xyz: position (or direction for directionals), w: radius, 0 = directional.
    pub position_radius: [f32; 4],
    pub color: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct RelightConsts {
    tile_address: u32,
}

/// Card vertex: position + normal.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CardVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CardConsts {
    pub view_proj: [[f32; 4]; 4],
    pub albedo: [f32; 4],
    /// roughness, metalness, emissive scale, unused.
    pub material: [f32; 4],
}

/// The G-buffer atlas pages.
pub struct AtlasTargets {
    pub albedo: wgpu::Texture,
    pub normal: wgpu::Texture,
    pub pbr: wgpu::Texture,
    pub emissive: wgpu::Texture,
    pub radiance: wgpu::Texture,
    pub depth: wgpu::Texture,
    pub albedo_view: wgpu::TextureView,
    pub normal_view: wgpu::TextureView,
    pub pbr_view: wgpu::TextureView,
    pub emissive_view: wgpu::TextureView,
    pub radiance_view: wgpu::TextureView,
    pub depth_view: wgpu::TextureView,
}

impl AtlasTargets {
    fn new(device: &wgpu::Device, resolution: u32) -> Self {
        let size = (resolution, resolution);
        let albedo = create_storage_texture_2d(device, "atlas_albedo", size, wgpu::TextureFormat::Rgba8Unorm, true);
        let normal = create_storage_texture_2d(device, "atlas_normal", size, wgpu::TextureFormat::Rgba8Unorm, true);
        let pbr = create_storage_texture_2d(device, "atlas_pbr", size, wgpu::TextureFormat::Rgba8Unorm, true);
        let emissive = create_storage_texture_2d(device, "atlas_emissive", size, wgpu::TextureFormat::Rgba16Float, true);
        let radiance = create_storage_texture_2d(device, "atlas_radiance", size, wgpu::TextureFormat::Rgba16Float, false);
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("atlas_depth"),
            size: wgpu::Extent3d {
                width: resolution,
                height: resolution,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth32Float,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let albedo_view = albedo.create_view(&wgpu::TextureViewDescriptor::default());
        let normal_view = normal.create_view(&wgpu::TextureViewDescriptor::default());
        let pbr_view = pbr.create_view(&wgpu::TextureViewDescriptor::default());
        let emissive_view = emissive.create_view(&wgpu::TextureViewDescriptor::default());
        let radiance_view = radiance.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            albedo,
            normal,
            pbr,
            emissive,
            radiance,
            depth,
            albedo_view,
            normal_view,
            pbr_view,
            emissive_view,
            radiance_view,
            depth_view,
        }
    }
}

/// GPU-side object culling output: a counter followed by object indices.
/// Capacity is estimated from the CPU cull count and refined by the
/// rotating readback of the actual GPU counter.
pub struct CullingBuffer {
    buffer: Option<wgpu::Buffer>,
    capacity: u32,
    ring: ReadbackRing,
    observed_count: u32,
}

impl CullingBuffer {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            buffer: None,
            capacity: 0,
            ring: ReadbackRing::new(device, "cull_counter_readback", 4, CULL_OBJECT_FRAME_SIZE),
            observed_count: 0,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn observed_count(&self) -> u32 {
        self.observed_count
    }

    /// Size the buffer for this frame without stalling on the GPU: the
    /// CPU estimate scaled by 1.3, never below the last observed count.
    pub fn ensure_capacity(&mut self, device: &wgpu::Device, cpu_culled_objects: usize) -> &wgpu::Buffer {
        let estimate = (cpu_culled_objects as f32 * CULL_ESTIMATE_FACTOR) as u32;
        let required = estimate.max(self.observed_count).max(64);
        if self.buffer.is_none() || required > self.capacity {
            self.capacity = required.next_power_of_two();
            self.buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("atlas_culling_buffer"),
                size: 4 + self.capacity as u64 * 4,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            log::trace!("culling buffer resized to {} entries", self.capacity);
        }
        self.buffer.as_ref().expect("culling buffer allocated above")
    }

    /// Copy the GPU counter into the readback ring.
    pub fn stage_readback(&mut self, encoder: &mut wgpu::CommandEncoder) {
        if let Some(buffer) = &self.buffer {
            self.ring.stage_copy(encoder, buffer, 0);
        }
    }

    pub fn after_submit(&mut self) {
        self.ring.after_submit();
    }

    /// Fold the newest finished readback into the capacity estimate.
    pub fn poll(&mut self, device: &wgpu::Device) {
        if let Some(bytes) = self.ring.poll(device) {
            if bytes.len() >= 4 {
                self.observed_count = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            }
        }
    }
}

/// Pipelines and buffers for card drawing and relighting.
pub struct SurfaceAtlasGpu {
    pub targets: AtlasTargets,
    pub tiles: DynamicBuffer<SurfaceTileData>,
    pub lights: DynamicBuffer<AtlasLightData>,
    pub culling: CullingBuffer,
    uniform: wgpu::Buffer,
    card_pipeline: wgpu::RenderPipeline,
    clear_pipeline: wgpu::RenderPipeline,
    relight_layout: wgpu::BindGroupLayout,
    relight_pipeline: wgpu::ComputePipeline,
    push_constants: bool,
    resolution: u32,
    /// Set on (re)allocation; the next card pass clears the whole atlas.
    pub needs_full_clear: bool,
}

impl SurfaceAtlasGpu {
    pub fn new(ctx: &GpuContext, resolution: u32) -> Self {
        let device = &ctx.device;
        let targets = AtlasTargets::new(device, resolution);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("atlas_card_shader"),
            source: wgpu::ShaderSource::Wgsl(crate::shaders::CARD_SRC.into()),
        });

        let push = ctx.has_push_constants();
        let card_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("atlas_card_layout"),
            bind_group_layouts: &[],
            push_constant_ranges: &if push {
                vec![wgpu::PushConstantRange {
                    stages: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    range: 0..std::mem::size_of::<CardConsts>() as u32,
                }]
            } else {
                Vec::new()
            },
        });

        let gbuffer_targets = [
            Some(wgpu::ColorTargetState {
                format: wgpu::TextureFormat::Rgba8Unorm,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            }),
            Some(wgpu::ColorTargetState {
                format: wgpu::TextureFormat::Rgba8Unorm,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            }),
            Some(wgpu::ColorTargetState {
                format: wgpu::TextureFormat::Rgba8Unorm,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            }),
            Some(wgpu::ColorTargetState {
                format: wgpu::TextureFormat::Rgba16Float,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            }),
        ];

        let card_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("atlas_card_pipeline"),
            layout: Some(&card_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<CardVertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        wgpu::VertexAttribute {
                            offset: 0,
                            shader_location: 0,
                            format: wgpu::VertexFormat::Float32x3,
                        },
                        wgpu::VertexAttribute {
                            offset: 12,
                            shader_location: 1,
                            format: wgpu::VertexFormat::Float32x3,
                        },
                    ],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &gbuffer_targets,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        // Tile-local clear: a scissored far-plane triangle with depth
        // writes always on.
        let clear_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("atlas_clear_pipeline"),
            layout: Some(&card_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_clear",
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_clear",
                targets: &gbuffer_targets,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: Some(wgpu::DepthStencilState {
                format: wgpu::TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let relight_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("atlas_relight_layout"),
            entries: &[
                uniform_entry(0),
                storage_entry(1),
                storage_entry(2),
                texture_entry(3, wgpu::TextureSampleType::Float { filterable: true }, wgpu::TextureViewDimension::D2),
                texture_entry(4, wgpu::TextureSampleType::Float { filterable: true }, wgpu::TextureViewDimension::D2),
                texture_entry(5, wgpu::TextureSampleType::Float { filterable: true }, wgpu::TextureViewDimension::D2),
                wgpu::BindGroupLayoutEntry {
                    binding: 6,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 7,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: wgpu::TextureFormat::Rgba16Float,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
                uniform_entry(8),
                // The distance-field mip is r32float: not filterable.
                texture_entry(9, wgpu::TextureSampleType::Float { filterable: false }, wgpu::TextureViewDimension::D3),
                wgpu::BindGroupLayoutEntry {
                    binding: 10,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                    count: None,
                },
            ],
        });

        let relight_pipeline = create_compute_pipeline(
            device,
            "atlas_relight",
            crate::shaders::RELIGHT_SRC,
            "relight_tile",
            &[&relight_layout],
            if push { std::mem::size_of::<RelightConsts>() as u32 } else { 0 },
        );

        let uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("atlas_uniform"),
            size: std::mem::size_of::<GlobalSurfaceAtlasData>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        if !push {
            log::warn!("push constants unavailable; surface atlas passes are disabled");
        }

        Self {
            targets,
            tiles: DynamicBuffer::storage("atlas_tiles"),
            lights: DynamicBuffer::storage("atlas_lights"),
            culling: CullingBuffer::new(device),
            uniform,
            card_pipeline,
            clear_pipeline,
            relight_layout,
            relight_pipeline,
            push_constants: push,
            resolution,
            needs_full_clear: true,
        }
    }

    /// Rebuild the tile metadata buffer from this frame's tiles.
    pub fn upload_tiles(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        tiles: &[(u64, usize, SurfaceTile)],
        object_indices: impl Fn(u64) -> u32,
    ) {
        self.tiles.clear();
        for (object_id, face, tile) in tiles {
            self.tiles.push(SurfaceTileData {
                view_proj: tile.view_proj.to_cols_array_2d(),
                inv_view_proj: tile.view_proj.inverse().to_cols_array_2d(),
                rect: [
                    tile.rect.x as f32,
                    tile.rect.y as f32,
                    tile.rect.width as f32,
                    tile.rect.height as f32,
                ],
                meta: [object_indices(*object_id), *face as u32, 0, 0],
            });
        }
        self.tiles.upload(device, queue);
    }

    pub fn upload_lights(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        lights: impl Iterator<Item = AtlasLightData>,
    ) {
        self.lights.clear();
        for light in lights {
            self.lights.push(light);
        }
        self.lights.upload(device, queue);
    }

    /// Record card clears + draws. The caller supplies the mesh buffers
    /// for each draw task; tiles are scissored individually, a full clear
    /// runs only right after the atlas was (re)created.
    pub fn record_card_draws(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        draws: &[(DrawTask, CardConsts, wgpu::BufferSlice<'_>, wgpu::BufferSlice<'_>, u32)],
    ) {
        if !self.push_constants || (draws.is_empty() && !self.needs_full_clear) {
            return;
        }
        let load = if self.needs_full_clear {
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT)
        } else {
            wgpu::LoadOp::Load
        };
        fn color_attachment(
            view: &wgpu::TextureView,
            load: wgpu::LoadOp<wgpu::Color>,
        ) -> Option<wgpu::RenderPassColorAttachment<'_>> {
            Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })
        }
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("atlas_card_pass"),
            color_attachments: &[
                color_attachment(&self.targets.albedo_view, load),
                color_attachment(&self.targets.normal_view, load),
                color_attachment(&self.targets.pbr_view, load),
                color_attachment(&self.targets.emissive_view, load),
            ],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.targets.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: if self.needs_full_clear {
                        wgpu::LoadOp::Clear(1.0)
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        for (task, consts, vertices, indices, index_count) in draws {
            let rect = task.rect;
            pass.set_scissor_rect(rect.x, rect.y, rect.width, rect.height);

            if !self.needs_full_clear {
                // Tile-local clear before redrawing into it.
                pass.set_pipeline(&self.clear_pipeline);
                pass.set_push_constants(
                    wgpu::ShaderStages::VERTEX_FRAGMENT,
                    0,
                    bytemuck::bytes_of(consts),
                );
                pass.draw(0..3, 0..1);
            }

            pass.set_viewport(
                rect.x as f32,
                rect.y as f32,
                rect.width as f32,
                rect.height as f32,
                0.0,
                1.0,
            );
            pass.set_pipeline(&self.card_pipeline);
            pass.set_push_constants(
                wgpu::ShaderStages::VERTEX_FRAGMENT,
                0,
                bytemuck::bytes_of(consts),
            );
            pass.set_vertex_buffer(0, *vertices);
            pass.set_index_buffer(*indices, wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..*index_count, 0, 0..1);
            // Restore the full viewport for the next scissored clear.
            pass.set_viewport(
                0.0,
                0.0,
                self.resolution as f32,
                self.resolution as f32,
                0.0,
                1.0,
            );
        }
        drop(pass);
        self.needs_full_clear = false;
    }

    /// Record relight dispatches over the union of scheduled tiles.
    /// The distance field uniform/mip come from the cascade subsystem and
    /// are read-only here.
    pub fn record_relight(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        tasks: &[RelightTask],
        tile_rects: impl Fn(u32) -> Option<Rect>,
        sdf_uniform: &wgpu::Buffer,
        sdf_mip_view: &wgpu::TextureView,
        sdf_sampler: &wgpu::Sampler,
    ) {
        if !self.push_constants || tasks.is_empty() {
            return;
        }
        let (Some(tile_buffer), Some(light_buffer)) = (self.tiles.buffer(), self.lights.buffer())
        else {
            return;
        };

        let data = GlobalSurfaceAtlasData {
            resolution: self.resolution as f32,
            tile_count: self.tiles.len() as u32,
            light_count: self.lights.len() as u32,
            _pad: 0,
        };
        queue.write_buffer(&self.uniform, 0, bytemuck::bytes_of(&data));

        let bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("atlas_relight_bind"),
            layout: &self.relight_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: self.uniform.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: tile_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: light_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 3, resource: wgpu::BindingResource::TextureView(&self.targets.albedo_view) },
                wgpu::BindGroupEntry { binding: 4, resource: wgpu::BindingResource::TextureView(&self.targets.normal_view) },
                wgpu::BindGroupEntry { binding: 5, resource: wgpu::BindingResource::TextureView(&self.targets.emissive_view) },
                wgpu::BindGroupEntry { binding: 6, resource: wgpu::BindingResource::TextureView(&self.targets.depth_view) },
                wgpu::BindGroupEntry { binding: 7, resource: wgpu::BindingResource::TextureView(&self.targets.radiance_view) },
                wgpu::BindGroupEntry { binding: 8, resource: sdf_uniform.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 9, resource: wgpu::BindingResource::TextureView(sdf_mip_view) },
                wgpu::BindGroupEntry { binding: 10, resource: wgpu::BindingResource::Sampler(sdf_sampler) },
            ],
        });

        // Dispatch each tile once even when several lights touched it.
        let mut addresses: Vec<u32> = tasks
            .iter()
            .flat_map(|t| t.tile_addresses.iter().copied())
            .collect();
        addresses.sort_unstable();
        addresses.dedup();

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("atlas_relight_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.relight_pipeline);
        pass.set_bind_group(0, &bind, &[]);
        for address in addresses {
            let Some(rect) = tile_rects(address) else {
                continue;
            };
            let consts = RelightConsts { tile_address: address };
            pass.set_push_constants(0, bytemuck::bytes_of(&consts));
            pass.dispatch_workgroups(rect.width.div_ceil(8), rect.height.div_ceil(8), 1);
        }
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

fn storage_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
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

fn texture_entry(
    binding: u32,
    sample_type: wgpu::TextureSampleType,
    view_dimension: wgpu::TextureViewDimension,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            sample_type,
            view_dimension,
            multisampled: false,
        },
        count: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_struct_alignment() {
        assert_eq!(std::mem::size_of::<SurfaceTileData>() % 16, 0);
        assert_eq!(std::mem::size_of::<AtlasLightData>() % 16, 0);
        assert_eq!(std::mem::size_of::<GlobalSurfaceAtlasData>(), 16);
        assert_eq!(std::mem::size_of::<CardConsts>(), 96);
    }
}
