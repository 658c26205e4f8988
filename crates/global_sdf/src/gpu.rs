//! GPU recording for the cascade texture
//!
//! Consumes the task lists produced by the CPU diff. Pass order inside
//! one cascade is clear -> rasterize layer 0 -> additive layers -> mip
//! seed -> flood ping-pong; command submission order is the dependency
//! contract.

use crate::atlas::FieldAtlas;
use crate::shaders;
use crate::{
    CascadeTasks, GlobalSdfConfig, GlobalSdfData, ObjectRasterizeData, RasterizeConsts,
    UpdateTasks, CHUNK_SIZE, MAX_MODELS_PER_CHUNK, MIP_FACTOR, MIP_FLOOD_PASSES,
};
use bytemuck::{Pod, Zeroable};
use glam::IVec3;
use render_core::{create_compute_pipeline, create_storage_texture_3d, wgpu, DynamicBuffer, GpuContext};

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct MipConsts {
    cascade: u32,
    mip_resolution: u32,
    mip_factor: u32,
    voxel_size: f32,
}

/// Cascade texture set plus the compute pipelines that update it.
pub struct GlobalSdfGpu {
    resolution: u32,
    cascade_count: u32,
    pub cascade_texture: wgpu::Texture,
    cascade_view: wgpu::TextureView,
    cascade_sampled_view: wgpu::TextureView,
    pub mip_texture: wgpu::Texture,
    mip_view: wgpu::TextureView,
    mip_sampled_view: wgpu::TextureView,
    flood_scratch: wgpu::Texture,
    flood_view: wgpu::TextureView,
    flood_sampled_view: wgpu::TextureView,
    pub field_atlas: FieldAtlas,
    mip_sampler: wgpu::Sampler,
    pub objects: DynamicBuffer<ObjectRasterizeData>,
    uniform: wgpu::Buffer,
    raster_layout: wgpu::BindGroupLayout,
    mip_layout: wgpu::BindGroupLayout,
    clear_pipeline: wgpu::ComputePipeline,
    seed_pipeline: wgpu::ComputePipeline,
    add_pipeline: wgpu::ComputePipeline,
    mip_seed_pipeline: wgpu::ComputePipeline,
    flood_pipeline: wgpu::ComputePipeline,
    push_constants: bool,
}

impl GlobalSdfGpu {
    pub fn new(ctx: &GpuContext, config: &GlobalSdfConfig) -> Self {
        let device = &ctx.device;
        let resolution = config.resolution;
        let cascade_count = config.cascade_count as u32;
        let mip_resolution = resolution / MIP_FACTOR;

        let cascade_texture = create_storage_texture_3d(
            device,
            "global_sdf_cascades",
            (resolution * cascade_count, resolution, resolution),
            1,
            wgpu::TextureFormat::R32Float,
        );
        let mip_texture = create_storage_texture_3d(
            device,
            "global_sdf_mip",
            (mip_resolution * cascade_count, mip_resolution, mip_resolution),
            1,
            wgpu::TextureFormat::R32Float,
        );
        let flood_scratch = create_storage_texture_3d(
            device,
            "global_sdf_flood_scratch",
            (mip_resolution * cascade_count, mip_resolution, mip_resolution),
            1,
            wgpu::TextureFormat::R32Float,
        );

        let cascade_view = cascade_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let cascade_sampled_view =
            cascade_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mip_view = mip_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mip_sampled_view = mip_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let flood_view = flood_scratch.create_view(&wgpu::TextureViewDescriptor::default());
        let flood_sampled_view =
            flood_scratch.create_view(&wgpu::TextureViewDescriptor::default());

        let field_atlas = FieldAtlas::new(device);

        // The r32float volumes are not filterable without extra device
        // features; consumers sample them through a nearest sampler.
        let mip_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("global_sdf_mip_sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        let uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("global_sdf_uniform"),
            size: std::mem::size_of::<GlobalSdfData>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let raster_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("global_sdf_raster_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D3,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::ReadWrite,
                        format: wgpu::TextureFormat::R32Float,
                        view_dimension: wgpu::TextureViewDimension::D3,
                    },
                    count: None,
                },
            ],
        });

        let mip_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("global_sdf_mip_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D3,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: wgpu::TextureFormat::R32Float,
                        view_dimension: wgpu::TextureViewDimension::D3,
                    },
                    count: None,
                },
            ],
        });

        let push = ctx.has_push_constants();
        let push_size = |size: u32| if push { size } else { 0 };
        let clear_pipeline = create_compute_pipeline(
            device,
            "global_sdf_clear",
            shaders::RASTERIZE_SRC,
            "clear_chunk",
            &[&raster_layout],
            push_size(std::mem::size_of::<RasterizeConsts>() as u32),
        );
        let seed_pipeline = create_compute_pipeline(
            device,
            "global_sdf_raster_seed",
            shaders::RASTERIZE_SRC,
            "raster_seed",
            &[&raster_layout],
            push_size(std::mem::size_of::<RasterizeConsts>() as u32),
        );
        let add_pipeline = create_compute_pipeline(
            device,
            "global_sdf_raster_add",
            shaders::RASTERIZE_SRC,
            "raster_add",
            &[&raster_layout],
            push_size(std::mem::size_of::<RasterizeConsts>() as u32),
        );
        let mip_seed_pipeline = create_compute_pipeline(
            device,
            "global_sdf_mip_seed",
            shaders::MIP_SRC,
            "mip_seed",
            &[&mip_layout],
            push_size(std::mem::size_of::<MipConsts>() as u32),
        );
        let flood_pipeline = create_compute_pipeline(
            device,
            "global_sdf_mip_flood",
            shaders::MIP_SRC,
            "mip_flood",
            &[&mip_layout],
            push_size(std::mem::size_of::<MipConsts>() as u32),
        );

        if !push {
            log::warn!("push constants unavailable; distance field dispatches are disabled");
        }

        // Seed the object table so the bind group is always valid, even on
        // frames with nothing to rasterize.
        let mut objects = DynamicBuffer::storage("global_sdf_objects");
        objects.push(ObjectRasterizeData::zeroed());
        objects.upload(device, &ctx.queue);

        Self {
            resolution,
            cascade_count,
            cascade_texture,
            cascade_view,
            cascade_sampled_view,
            mip_texture,
            mip_view,
            mip_sampled_view,
            flood_scratch,
            flood_view,
            flood_sampled_view,
            field_atlas,
            mip_sampler,
            objects,
            uniform,
            raster_layout,
            mip_layout,
            clear_pipeline,
            seed_pipeline,
            add_pipeline,
            mip_seed_pipeline,
            flood_pipeline,
            push_constants: push,
        }
    }

    /// Uniform buffer for passes that trace the field (read-only use).
    pub fn uniform_buffer(&self) -> &wgpu::Buffer {
        &self.uniform
    }

    /// Flooded mip volume view for coarse tracing by other subsystems.
    pub fn mip_view(&self) -> &wgpu::TextureView {
        &self.mip_sampled_view
    }

    pub fn field_sampler(&self) -> &wgpu::Sampler {
        &self.field_atlas.sampler
    }

    /// Nearest sampler matching the non-filterable mip volume.
    pub fn mip_sampler(&self) -> &wgpu::Sampler {
        &self.mip_sampler
    }

    /// Repopulate and upload the per-frame object table.
    pub fn upload_objects(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        objects: impl Iterator<Item = ObjectRasterizeData>,
    ) {
        self.objects.clear();
        for raster in objects {
            self.objects.push(raster);
        }
        self.objects.upload(device, queue);
    }

    /// Record the update derived by the CPU diff.
    pub fn record(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        tasks: &UpdateTasks,
        uniform: &GlobalSdfData,
    ) {
        if !self.push_constants {
            return;
        }
        let Some(object_buffer) = self.objects.buffer() else {
            // No rasterizable objects uploaded; clears can still run once
            // the buffer exists, so skip the whole frame.
            return;
        };
        queue.write_buffer(&self.uniform, 0, bytemuck::bytes_of(uniform));

        let bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("global_sdf_raster_bind"),
            layout: &self.raster_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.uniform.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: object_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&self.field_atlas.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.field_atlas.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&self.cascade_view),
                },
            ],
        });

        if tasks.full_clear {
            self.record_full_clear(encoder, &bind);
        }
        for cascade_tasks in &tasks.cascades {
            self.record_cascade(encoder, &bind, cascade_tasks, uniform);
        }

        for cascade_tasks in &tasks.cascades {
            if cascade_tasks.flood_mip || tasks.full_clear {
                self.record_mip_flood(device, encoder, cascade_tasks.cascade as u32, uniform);
            }
        }
    }

    fn chunk_origin(&self, cascade: usize, coord: IVec3) -> [i32; 3] {
        [
            (cascade as u32 * self.resolution) as i32 + coord.x * CHUNK_SIZE as i32,
            coord.y * CHUNK_SIZE as i32,
            coord.z * CHUNK_SIZE as i32,
        ]
    }

    fn record_full_clear(&self, encoder: &mut wgpu::CommandEncoder, bind: &wgpu::BindGroup) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("global_sdf_full_clear"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.clear_pipeline);
        pass.set_bind_group(0, bind, &[]);
        let chunks = self.resolution / CHUNK_SIZE;
        for cascade in 0..self.cascade_count {
            for z in 0..chunks as i32 {
                for y in 0..chunks as i32 {
                    for x in 0..chunks as i32 {
                        let consts = RasterizeConsts {
                            chunk_coord: self.chunk_origin(cascade as usize, IVec3::new(x, y, z)),
                            object_count: 0,
                            objects: [0; MAX_MODELS_PER_CHUNK],
                        };
                        pass.set_push_constants(0, bytemuck::bytes_of(&consts));
                        dispatch_chunk(&mut pass);
                    }
                }
            }
        }
    }

    fn record_cascade(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        bind: &wgpu::BindGroup,
        tasks: &CascadeTasks,
        _uniform: &GlobalSdfData,
    ) {
        if tasks.chunks_to_clear.is_empty() && tasks.rasterize.is_empty() {
            return;
        }
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("global_sdf_cascade_update"),
            timestamp_writes: None,
        });
        pass.set_bind_group(0, bind, &[]);

        pass.set_pipeline(&self.clear_pipeline);
        for &coord in &tasks.chunks_to_clear {
            let consts = RasterizeConsts {
                chunk_coord: self.chunk_origin(tasks.cascade, coord),
                object_count: 0,
                objects: [0; MAX_MODELS_PER_CHUNK],
            };
            pass.set_push_constants(0, bytemuck::bytes_of(&consts));
            dispatch_chunk(&mut pass);
        }

        // Layer 0 overwrites, higher layers min-combine.
        for task in &tasks.rasterize {
            let pipeline = if task.layer == 0 {
                &self.seed_pipeline
            } else {
                &self.add_pipeline
            };
            pass.set_pipeline(pipeline);
            let mut objects = [0u32; MAX_MODELS_PER_CHUNK];
            objects[..task.objects.len()].copy_from_slice(&task.objects);
            let consts = RasterizeConsts {
                chunk_coord: self.chunk_origin(tasks.cascade, task.coord),
                object_count: task.objects.len() as u32,
                objects,
            };
            pass.set_push_constants(0, bytemuck::bytes_of(&consts));
            dispatch_chunk(&mut pass);
        }
    }

    /// Downsample seed, then an even number of flood passes ping-ponging
    /// between the mip volume and the scratch volume so the final data
    /// lands back in the mip texture.
    fn record_mip_flood(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        cascade: u32,
        uniform: &GlobalSdfData,
    ) {
        let mip_resolution = self.resolution / MIP_FACTOR;
        let consts = MipConsts {
            cascade,
            mip_resolution,
            mip_factor: MIP_FACTOR,
            voxel_size: uniform.cascade_voxel_size[cascade as usize] * MIP_FACTOR as f32,
        };
        let groups = mip_resolution.div_ceil(4);

        let make_bind = |src: &wgpu::TextureView, dst: &wgpu::TextureView| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("global_sdf_mip_bind"),
                layout: &self.mip_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(src),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(dst),
                    },
                ],
            })
        };

        let seed_bind = make_bind(&self.cascade_sampled_view, &self.mip_view);
        let to_scratch = make_bind(&self.mip_sampled_view, &self.flood_view);
        let to_mip = make_bind(&self.flood_sampled_view, &self.mip_view);

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("global_sdf_mip_seed"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.mip_seed_pipeline);
            pass.set_bind_group(0, &seed_bind, &[]);
            pass.set_push_constants(0, bytemuck::bytes_of(&consts));
            pass.dispatch_workgroups(groups, groups, groups);
        }

        for iteration in 0..MIP_FLOOD_PASSES {
            let bind = if iteration % 2 == 0 { &to_scratch } else { &to_mip };
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("global_sdf_mip_flood"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.flood_pipeline);
            pass.set_bind_group(0, bind, &[]);
            pass.set_push_constants(0, bytemuck::bytes_of(&consts));
            pass.dispatch_workgroups(groups, groups, groups);
        }
    }
}

fn dispatch_chunk(pass: &mut wgpu::ComputePass<'_>) {
    let groups = CHUNK_SIZE / 4;
    pass.dispatch_workgroups(groups, groups, groups);
}
