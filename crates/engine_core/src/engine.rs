//! Frame orchestration
//!
//! One `GiEngine` owns the scene and every GI subsystem. Systems are
//! registered once, in dependency order: baked fields upload before the
//! distance field updates, the distance field before the surface atlas
//! (which reads it for occlusion), the atlas before the probe volume
//! (which traces the field and reads the atlas for bounce), and the
//! denoisers last. That registration order is the ordering contract;
//! GPU work is serialized by command submission order.

use crate::config::EngineConfig;
use crate::handle::ObjectHandle;
use crate::scene::{FieldState, Light, LightKind, MeshId, Scene};
use crate::scheduler::Scheduler;
use ddgi::{IrradianceVolume, TraceInputs};
use denoise::{DenoiseInputs, DenoiseViewData, Denoiser, DenoiserConfig};
use glam::{Mat4, Vec3};
use global_sdf::{
    ChunkScratch, FieldSlot, GlobalDistanceField, ObjectRasterizeData, SdfObject,
    gpu::GlobalSdfGpu,
};
use job_system::JobSystem;
use rand::rngs::StdRng;
use rand::SeedableRng;
use render_core::wgpu::util::DeviceExt;
use render_core::{create_storage_texture_2d, wgpu, GpuContext};
use std::collections::HashMap;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use surface_atlas::{
    AtlasLight, AtlasLightData, AtlasObject, CardConsts, CardVertex, Rect, SurfaceAtlas,
    SurfaceAtlasGpu,
};

/// Viewer state for the GI passes.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub position: Vec3,
    pub view_proj: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            view_proj: Mat4::IDENTITY,
        }
    }
}

struct GpuMesh {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

/// Main-view targets the ray-traced effects and denoisers work on. The
/// outer renderer writes the signal textures; reflections run at half
/// resolution and upsample.
pub struct ViewTargets {
    pub size: (u32, u32),
    pub depth_view: wgpu::TextureView,
    pub normal_view: wgpu::TextureView,
    pub shadow_signal_view: wgpu::TextureView,
    pub half_depth_view: wgpu::TextureView,
    pub half_normal_view: wgpu::TextureView,
    pub reflection_signal_view: wgpu::TextureView,
}

impl ViewTargets {
    fn new(device: &wgpu::Device, size: (u32, u32)) -> Self {
        let half = (size.0.div_ceil(2).max(1), size.1.div_ceil(2).max(1));
        let depth = |label, size: (u32, u32)| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size: wgpu::Extent3d {
                        width: size.0,
                        height: size.1,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: wgpu::TextureFormat::Depth32Float,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                        | wgpu::TextureUsages::TEXTURE_BINDING,
                    view_formats: &[],
                })
                .create_view(&wgpu::TextureViewDescriptor::default())
        };
        let color = |label, size: (u32, u32), format| {
            create_storage_texture_2d(device, label, size, format, true)
                .create_view(&wgpu::TextureViewDescriptor::default())
        };
        Self {
            size,
            depth_view: depth("view_depth", size),
            normal_view: color("view_normal", size, wgpu::TextureFormat::Rgba8Unorm),
            shadow_signal_view: color("view_shadow_signal", size, wgpu::TextureFormat::Rgba16Float),
            half_depth_view: depth("view_half_depth", half),
            half_normal_view: color("view_half_normal", half, wgpu::TextureFormat::Rgba8Unorm),
            reflection_signal_view: color(
                "view_reflection_signal",
                half,
                wgpu::TextureFormat::Rgba16Float,
            ),
        }
    }
}

struct GpuState {
    ctx: GpuContext,
    sdf_gpu: GlobalSdfGpu,
    atlas_gpu: SurfaceAtlasGpu,
    meshes: HashMap<MeshId, GpuMesh>,
    field_slots: HashMap<MeshId, FieldSlot>,
    view: Option<ViewTargets>,
    denoisers: Option<(Denoiser, Denoiser)>,
}

/// Everything the scheduled systems operate on.
pub struct EngineState {
    pub config: EngineConfig,
    pub scene: Scene,
    pub jobs: JobSystem,
    pub camera: Camera,
    pub field: GlobalDistanceField,
    pub atlas: SurfaceAtlas,
    pub volume: IrradianceVolume,
    pub frame: u64,
    scratch: ChunkScratch,
    prev_view_proj: Mat4,
    rng: StdRng,
    gpu: Option<GpuState>,
    encoder: Option<wgpu::CommandEncoder>,
    /// Tiles with addresses assigned this frame, for relight dispatch.
    frame_tiles: Vec<(u64, usize, surface_atlas::SurfaceTile)>,
}

pub struct GiEngine {
    scheduler: Scheduler<EngineState>,
    pub state: EngineState,
}

impl GiEngine {
    /// Engine with a GPU device when one is available.
    pub fn new(config: EngineConfig) -> Self {
        let ctx = GpuContext::new();
        Self::build(config, ctx)
    }

    /// Engine without GPU passes: all CPU-side bookkeeping still runs.
    pub fn headless(config: EngineConfig) -> Self {
        Self::build(config, None)
    }

    fn build(config: EngineConfig, ctx: Option<GpuContext>) -> Self {
        let gpu = ctx.map(|ctx| {
            let sdf_gpu = GlobalSdfGpu::new(&ctx, &config.global_sdf_config());
            let atlas_gpu = SurfaceAtlasGpu::new(&ctx, config.surface_atlas.resolution);
            GpuState {
                ctx,
                sdf_gpu,
                atlas_gpu,
                meshes: HashMap::new(),
                field_slots: HashMap::new(),
                view: None,
                denoisers: None,
            }
        });

        let state = EngineState {
            field: GlobalDistanceField::new(config.global_sdf_config()),
            atlas: SurfaceAtlas::new(config.atlas_config()),
            volume: IrradianceVolume::new(config.ddgi.clone()),
            config,
            scene: Scene::new(),
            jobs: JobSystem::with_default_threads(),
            camera: Camera::default(),
            frame: 0,
            scratch: ChunkScratch::new(),
            prev_view_proj: Mat4::IDENTITY,
            rng: StdRng::seed_from_u64(0x5d_f00d),
            gpu,
            encoder: None,
            frame_tiles: Vec::new(),
        };

        let mut scheduler = Scheduler::new();
        scheduler.register("mesh_fields", sys_mesh_fields);
        scheduler.register("global_sdf", sys_global_sdf);
        scheduler.register("surface_atlas", sys_surface_atlas);
        scheduler.register("irradiance_volume", sys_irradiance);
        scheduler.register("denoise", sys_denoise);

        Self { scheduler, state }
    }

    pub fn has_gpu(&self) -> bool {
        self.state.gpu.is_some()
    }

    pub fn system_names(&self) -> Vec<&'static str> {
        self.scheduler.names()
    }

    /// Allocate the main-view targets and the two denoiser instances.
    pub fn set_view_target(&mut self, width: u32, height: u32) {
        let Some(gpu) = self.state.gpu.as_mut() else {
            return;
        };
        let size = (width.max(8), height.max(8));
        let half = (size.0.div_ceil(2).max(1), size.1.div_ceil(2).max(1));
        gpu.view = Some(ViewTargets::new(&gpu.ctx.device, size));
        gpu.denoisers = Some((
            Denoiser::new(&gpu.ctx, DenoiserConfig::reflections(), half),
            Denoiser::new(&gpu.ctx, DenoiserConfig::shadows(), size),
        ));
    }

    /// Bake every mesh that still needs a field. Each bake parallelizes
    /// its voxel sampling across the job system; results are persisted
    /// best-effort and kept in memory regardless.
    pub fn trigger_bake_all_pending_fields(&mut self) -> usize {
        let state = &mut self.state;
        let bake_config = sdf_bake::BakeConfig::default();
        let mut baked = 0;
        for mesh in state.scene.meshes.iter_mut() {
            if mesh.field.is_baked() {
                continue;
            }
            let Some(field) = sdf_bake::bake(&mesh.positions, &mesh.indices, &bake_config, &state.jobs)
            else {
                log::warn!("mesh '{}' cannot be baked (empty)", mesh.name);
                continue;
            };
            let millis = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0);
            let path = sdf_bake::baked_file_path(Path::new(&state.config.bake_dir), &mesh.name, millis);
            if let Err(err) = sdf_bake::save_volume(&field.volume, &path) {
                log::warn!("baked field write failed for {:?}: {err}", path);
            }
            mesh.field = FieldState::Baked(field);
            baked += 1;
        }
        log::info!("baked {} distance fields", baked);
        baked
    }

    /// Load a previously baked field for a mesh. A missing or unreadable
    /// file leaves the mesh in the needs-baking state.
    pub fn try_load_field(&mut self, mesh: MeshId, path: &Path) -> bool {
        let Some(asset) = self.state.scene.meshes.get_mut(mesh) else {
            return false;
        };
        match sdf_bake::load_volume(path) {
            Some(volume) => {
                asset.field = FieldState::Baked(sdf_bake::MeshDistanceField::from_volume(
                    volume,
                    &asset.local_bounds,
                ));
                true
            }
            None => false,
        }
    }

    /// Enter the play state: probe volume resources come alive.
    pub fn trigger_run_gi(&mut self) {
        let ctx = self.state.gpu.as_ref().map(|g| &g.ctx);
        self.state.volume.on_play_start(ctx);
    }

    /// Leave the play state: probe volume resources are torn down.
    pub fn stop_gi(&mut self) {
        self.state.volume.on_play_end();
    }

    /// Run one frame of GI maintenance in system order, then submit.
    pub fn update(&mut self) {
        let state = &mut self.state;
        if let Some(gpu) = state.gpu.as_ref() {
            state.encoder = Some(gpu.ctx.device.create_command_encoder(
                &wgpu::CommandEncoderDescriptor {
                    label: Some("gi_frame"),
                },
            ));
        }

        self.scheduler.run(state);

        if let Some(gpu) = state.gpu.as_mut() {
            if let Some(mut encoder) = state.encoder.take() {
                gpu.atlas_gpu.culling.stage_readback(&mut encoder);
                gpu.ctx.queue.submit([encoder.finish()]);
                gpu.atlas_gpu.culling.after_submit();
                gpu.atlas_gpu.culling.poll(&gpu.ctx.device);
            }
        }

        state.prev_view_proj = state.camera.view_proj;
        state.frame += 1;
    }
}

/// Lazy GPU upload of baked fields into the shared field atlas.
fn sys_mesh_fields(state: &mut EngineState) {
    let Some(gpu) = state.gpu.as_mut() else {
        return;
    };
    for (mesh_id, mesh) in state.scene.meshes.iter().enumerate() {
        let FieldState::Baked(field) = &mesh.field else {
            continue;
        };
        if gpu.field_slots.contains_key(&mesh_id) {
            continue;
        }
        if let Some(slot) = gpu.sdf_gpu.field_atlas.upload(&gpu.ctx.queue, field) {
            gpu.field_slots.insert(mesh_id, slot);
        }
    }
}

/// Cascade diff + GPU rasterize/flood recording.
fn sys_global_sdf(state: &mut EngineState) {
    let objects = collect_sdf_objects(state);
    let tasks = state
        .field
        .update(&objects, state.camera.position, state.frame, &mut state.scratch);

    let (Some(gpu), Some(encoder)) = (state.gpu.as_mut(), state.encoder.as_mut()) else {
        return;
    };
    gpu.sdf_gpu
        .upload_objects(&gpu.ctx.device, &gpu.ctx.queue, objects.iter().map(|o| o.raster));
    let uniform = state.field.uniform_data();
    gpu.sdf_gpu
        .record(&gpu.ctx.device, &gpu.ctx.queue, encoder, &tasks, &uniform);
}

fn collect_sdf_objects(state: &EngineState) -> Vec<SdfObject> {
    let mut objects = Vec::new();
    for (handle, object) in state.scene.objects.iter() {
        let Some(mesh) = state.scene.meshes.get(object.mesh) else {
            continue;
        };
        // Objects without a baked field are skipped, never block.
        let Some(field) = mesh.field.field() else {
            continue;
        };
        let Some(obb) = state.scene.object_bounds(object) else {
            continue;
        };

        let (mul, add) = match state
            .gpu
            .as_ref()
            .and_then(|gpu| gpu.field_slots.get(&object.mesh))
        {
            Some(slot) => slot.atlas_mapping(field),
            None => (field.local_to_uvw_mul, field.local_to_uvw_add),
        };
        objects.push(SdfObject {
            id: handle.id(),
            revision: object.revision,
            center: obb.center,
            radius: obb.radius(),
            raster: ObjectRasterizeData {
                world_to_local: object.transform.inverse().to_cols_array_2d(),
                uvw_mul: [mul.x, mul.y, mul.z, field.max_distance],
                uvw_add: [add.x, add.y, add.z, 0.0],
            },
        });
    }
    objects
}

/// Card maintenance, draws and relighting.
fn sys_surface_atlas(state: &mut EngineState) {
    let camera_pos = state.camera.position;
    let mut atlas_objects = Vec::new();
    let mut materials: HashMap<u64, (MeshId, ObjectHandle)> = HashMap::new();
    for (handle, object) in state.scene.objects.iter() {
        let Some(obb) = state.scene.object_bounds(object) else {
            continue;
        };
        let id = handle.id();
        materials.insert(id, (object.mesh, handle));
        atlas_objects.push(AtlasObject {
            id,
            obb,
            distance_to_camera: (obb.center - camera_pos).length(),
        });
    }

    let draws = state.atlas.update(state.frame, &atlas_objects);
    state.frame_tiles = state.atlas.assign_addresses();

    let lights: Vec<AtlasLight> = state
        .scene
        .lights
        .iter()
        .enumerate()
        .map(|(index, light)| AtlasLight {
            id: index as u64,
            revision: light.revision,
            position: light.position,
            radius: match light.kind {
                LightKind::Directional => None,
                _ => Some(light.radius),
            },
        })
        .collect();
    let relights = state.atlas.schedule_relight(state.frame, &lights);

    let (Some(gpu), Some(encoder)) = (state.gpu.as_mut(), state.encoder.as_mut()) else {
        return;
    };
    let GpuState {
        ctx,
        sdf_gpu,
        atlas_gpu,
        meshes,
        ..
    } = gpu;
    let device = &ctx.device;
    let queue = &ctx.queue;

    // Size the culling output from the CPU-side frustum estimate before
    // recording; the async counter readback refines it over later frames.
    let frustum = math_util::Frustum::from_matrix(state.camera.view_proj);
    let culled = atlas_objects
        .iter()
        .filter(|o| frustum.test_sphere(o.obb.center, o.obb.radius()))
        .count();
    atlas_gpu.culling.ensure_capacity(device, culled.max(1));

    let object_index: HashMap<u64, u32> = atlas_objects
        .iter()
        .enumerate()
        .map(|(index, o)| (o.id, index as u32))
        .collect();
    atlas_gpu.upload_tiles(device, queue, &state.frame_tiles, |id| {
        object_index.get(&id).copied().unwrap_or(0)
    });
    atlas_gpu.upload_lights(
        device,
        queue,
        state.scene.lights.iter().map(light_to_gpu),
    );

    // Upload any mesh buffers the draw list needs.
    for task in &draws {
        if let Some(&(mesh_id, _)) = materials.get(&task.object_id) {
            if !meshes.contains_key(&mesh_id) {
                if let Some(mesh) = state.scene.meshes.get(mesh_id) {
                    meshes.insert(mesh_id, upload_mesh(device, mesh));
                }
            }
        }
    }

    let meshes = &*meshes;
    let draw_list: Vec<_> = draws
        .iter()
        .filter_map(|task| {
            let &(mesh_id, handle) = materials.get(&task.object_id)?;
            let gpu_mesh = meshes.get(&mesh_id)?;
            let object = state.scene.objects.get(handle)?;
            let consts = CardConsts {
                view_proj: task.view_proj.to_cols_array_2d(),
                albedo: object.albedo,
                material: [object.roughness, object.metalness, object.emissive, 0.0],
            };
            Some((
                task.clone(),
                consts,
                gpu_mesh.vertices.slice(..),
                gpu_mesh.indices.slice(..),
                gpu_mesh.index_count,
            ))
        })
        .collect();
    atlas_gpu.record_card_draws(encoder, &draw_list);

    let tile_rects: HashMap<u32, Rect> = state
        .frame_tiles
        .iter()
        .map(|(_, _, tile)| (tile.address, tile.rect))
        .collect();
    atlas_gpu.record_relight(
        device,
        queue,
        encoder,
        &relights,
        |address| tile_rects.get(&address).copied(),
        sdf_gpu.uniform_buffer(),
        sdf_gpu.mip_view(),
        sdf_gpu.mip_sampler(),
    );
}

fn light_to_gpu(light: &Light) -> AtlasLightData {
    let radius = match light.kind {
        LightKind::Directional => 0.0,
        _ => light.radius,
    };
    AtlasLightData {
        position_radius: [light.position.x, light.position.y, light.position.z, radius],
        color: [light.color.x, light.color.y, light.color.z, 1.0],
    }
}

fn upload_mesh(device: &wgpu::Device, mesh: &crate::scene::MeshAsset) -> GpuMesh {
    // Per-vertex normals from accumulated face normals.
    let mut normals = vec![Vec3::ZERO; mesh.positions.len()];
    for tri in mesh.indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let n = (mesh.positions[b] - mesh.positions[a])
            .cross(mesh.positions[c] - mesh.positions[a]);
        normals[a] += n;
        normals[b] += n;
        normals[c] += n;
    }
    let vertices: Vec<CardVertex> = mesh
        .positions
        .iter()
        .zip(&normals)
        .map(|(p, n)| CardVertex {
            position: p.to_array(),
            normal: n.normalize_or_zero().to_array(),
        })
        .collect();

    GpuMesh {
        vertices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("card_mesh_vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        }),
        indices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("card_mesh_indices"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        }),
        index_count: mesh.indices.len() as u32,
    }
}

/// Probe volume phase machine.
fn sys_irradiance(state: &mut EngineState) {
    let bounds = state.scene.world_bounds();
    state.volume.set_scene_bounds(bounds);

    match (state.gpu.as_ref(), state.encoder.as_mut()) {
        (Some(gpu), Some(encoder)) => {
            let inputs = TraceInputs {
                sdf_uniform: gpu.sdf_gpu.uniform_buffer(),
                sdf_mip_view: gpu.sdf_gpu.mip_view(),
                sdf_sampler: gpu.sdf_gpu.mip_sampler(),
                atlas_radiance_view: &gpu.atlas_gpu.targets.radiance_view,
                atlas_sampler: gpu.sdf_gpu.field_sampler(),
            };
            state.volume.advance(
                Some(encoder),
                Some(&gpu.ctx.queue),
                Some(&gpu.ctx.device),
                Some(&inputs),
                &mut state.rng,
            );
        }
        _ => {
            state.volume.advance(None, None, None, None, &mut state.rng);
        }
    }
}

/// Reflection + shadow denoisers; identical structure, two instances.
fn sys_denoise(state: &mut EngineState) {
    let (Some(gpu), Some(encoder)) = (state.gpu.as_mut(), state.encoder.as_mut()) else {
        return;
    };
    let (Some(view), Some((reflections, shadows))) = (gpu.view.as_ref(), gpu.denoisers.as_mut())
    else {
        return;
    };

    let view_data = DenoiseViewData {
        reproject: state.prev_view_proj.to_cols_array_2d(),
        inv_view_proj: state.camera.view_proj.inverse().to_cols_array_2d(),
        depth_sigma: state.config.denoise.depth_sigma,
        normal_sigma: state.config.denoise.normal_sigma,
        history_weight: state.config.denoise.history_weight,
        _pad: 0.0,
    };
    let device = &gpu.ctx.device;
    let queue = &gpu.ctx.queue;

    reflections.record(
        device,
        queue,
        encoder,
        &DenoiseInputs {
            signal_view: &view.reflection_signal_view,
            depth_view: &view.half_depth_view,
            normal_view: &view.half_normal_view,
        },
        &view_data,
    );
    shadows.record(
        device,
        queue,
        encoder,
        &DenoiseInputs {
            signal_view: &view.shadow_signal_view,
            depth_view: &view.depth_view,
            normal_view: &view.normal_view,
        },
        &view_data,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{MeshAsset, SceneObject};

    fn cube_mesh() -> MeshAsset {
        let h = 1.0;
        let positions = vec![
            Vec3::new(-h, -h, -h),
            Vec3::new(h, -h, -h),
            Vec3::new(h, h, -h),
            Vec3::new(-h, h, -h),
            Vec3::new(-h, -h, h),
            Vec3::new(h, -h, h),
            Vec3::new(h, h, h),
            Vec3::new(-h, h, h),
        ];
        let indices = vec![
            0, 2, 1, 0, 3, 2, 4, 5, 6, 4, 6, 7, 0, 1, 5, 0, 5, 4, 3, 6, 2, 3, 7, 6, 0, 4, 7, 0,
            7, 3, 1, 2, 6, 1, 6, 5,
        ];
        MeshAsset::new("cube", positions, indices)
    }

    fn quick_engine() -> GiEngine {
        let mut config = EngineConfig::default();
        config.global_sdf.cascade_count = 1;
        config.bake_dir = std::env::temp_dir()
            .join("gi_engine_test_bakes")
            .to_string_lossy()
            .into_owned();
        GiEngine::headless(config)
    }

    #[test]
    fn test_system_registration_order() {
        let engine = quick_engine();
        assert_eq!(
            engine.system_names(),
            vec![
                "mesh_fields",
                "global_sdf",
                "surface_atlas",
                "irradiance_volume",
                "denoise"
            ]
        );
    }

    #[test]
    fn test_cube_end_to_end() {
        let mut engine = quick_engine();
        let mesh = engine.state.scene.add_mesh(cube_mesh());
        assert_eq!(engine.state.scene.pending_bake_count(), 1);
        assert_eq!(engine.trigger_bake_all_pending_fields(), 1);
        assert_eq!(engine.state.scene.pending_bake_count(), 0);

        // Interior of the cube bakes negative, outside positive.
        let field = engine.state.scene.meshes[mesh].field.field().unwrap();
        assert!(field.sample_local(Vec3::ZERO) < 0.0);
        assert!(field.sample_local(Vec3::new(1.3, 0.0, 0.0)) > 0.0);

        let handle = engine.state.scene.spawn(SceneObject::new(mesh, Mat4::IDENTITY));
        engine.update();
        let occupied = engine.state.field.cascades()[0].non_empty_chunks.clone();
        assert!(!occupied.is_empty(), "cube must mark cascade chunks");

        // Removing the object clears exactly those chunks on the next
        // eligible update.
        engine.state.scene.despawn(handle);
        for _ in 0..4 {
            engine.update();
        }
        assert!(engine.state.field.cascades()[0].non_empty_chunks.is_empty());
    }

    #[test]
    fn test_unbaked_object_excluded_not_blocking() {
        let mut engine = quick_engine();
        let mesh = engine.state.scene.add_mesh(cube_mesh());
        engine.state.scene.spawn(SceneObject::new(mesh, Mat4::IDENTITY));

        // No bake happened: the update runs and the cascade stays empty.
        engine.update();
        assert!(engine.state.field.cascades()[0].non_empty_chunks.is_empty());
    }

    #[test]
    fn test_atlas_sees_scene_objects() {
        let mut engine = quick_engine();
        let mesh = engine.state.scene.add_mesh(cube_mesh());
        let handle = engine.state.scene.spawn(SceneObject::new(mesh, Mat4::IDENTITY));
        engine.update();
        assert_eq!(engine.state.atlas.object_count(), 1);
        assert_eq!(engine.state.frame_tiles.len(), 6);

        engine.state.scene.despawn(handle);
        engine.update();
        assert_eq!(engine.state.atlas.object_count(), 0);
    }

    #[test]
    fn test_play_lifecycle() {
        let mut engine = quick_engine();
        let mesh = engine.state.scene.add_mesh(cube_mesh());
        engine.state.scene.spawn(SceneObject::new(mesh, Mat4::IDENTITY));
        assert!(!engine.state.volume.is_playing());

        engine.trigger_run_gi();
        assert!(engine.state.volume.is_playing());
        engine.update();
        engine.update();
        assert!(engine.state.volume.probe_count() >= 8);

        engine.stop_gi();
        assert!(!engine.state.volume.is_playing());
    }

    #[test]
    fn test_stale_handle_despawn_is_noop() {
        let mut engine = quick_engine();
        let mesh = engine.state.scene.add_mesh(cube_mesh());
        let handle = engine.state.scene.spawn(SceneObject::new(mesh, Mat4::IDENTITY));
        assert!(engine.state.scene.despawn(handle));
        assert!(!engine.state.scene.despawn(handle), "stale handles must fail");
    }
}
