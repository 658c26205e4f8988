//! Compute kernels for chunk rasterization and the mip flood fill

/// Chunk clear + rasterize. `raster_seed` overwrites a chunk from its
/// layer-0 object set; `raster_add` min-combines further layers into the
/// existing voxels. The cascade texture is r32float, the one format with
/// guaranteed read-write storage support.
pub const RASTERIZE_SRC: &str = r#"
struct GlobalSdfData {
    cascade_pos_distance: array<vec4<f32>, 4>,
    cascade_voxel_size: vec4<f32>,
    resolution: f32,
    cascade_count: u32,
    pad0: u32,
    pad1: u32,
}

struct ObjectData {
    world_to_local: mat4x4<f32>,
    uvw_mul: vec4<f32>,
    uvw_add: vec4<f32>,
}

struct RasterizeConsts {
    chunk_origin: vec3<i32>,
    object_count: u32,
    objects: array<vec4<u32>, 7>,
}

@group(0) @binding(0) var<uniform> data: GlobalSdfData;
@group(0) @binding(1) var<storage, read> objects: array<ObjectData>;
@group(0) @binding(2) var fields: texture_3d<f32>;
@group(0) @binding(3) var fields_sampler: sampler;
@group(0) @binding(4) var cascade_out: texture_storage_3d<r32float, read_write>;

var<push_constant> consts: RasterizeConsts;

fn object_index(slot: u32) -> u32 {
    return consts.objects[slot / 4u][slot % 4u];
}

fn voxel_world_position(texel: vec3<i32>) -> vec3<f32> {
    let res = i32(data.resolution);
    let cascade = texel.x / res;
    let local = vec3<i32>(texel.x - cascade * res, texel.y, texel.z);
    let info = data.cascade_pos_distance[cascade];
    let voxel = data.cascade_voxel_size[cascade];
    let origin = info.xyz - vec3<f32>(info.w);
    return origin + (vec3<f32>(local) + vec3<f32>(0.5)) * voxel;
}

fn far_distance(texel: vec3<i32>) -> f32 {
    let cascade = texel.x / i32(data.resolution);
    return data.cascade_voxel_size[cascade] * 10.0;
}

fn object_distance(slot: u32, world: vec3<f32>) -> f32 {
    let obj = objects[object_index(slot)];
    let local = (obj.world_to_local * vec4<f32>(world, 1.0)).xyz;
    let uvw = clamp(local * obj.uvw_mul.xyz + obj.uvw_add.xyz, vec3<f32>(0.0), vec3<f32>(1.0));
    let encoded = textureSampleLevel(fields, fields_sampler, uvw, 0.0).r;
    return (encoded * 2.0 - 1.0) * obj.uvw_mul.w;
}

@compute @workgroup_size(4, 4, 4)
fn clear_chunk(@builtin(global_invocation_id) id: vec3<u32>) {
    let texel = consts.chunk_origin + vec3<i32>(id);
    textureStore(cascade_out, texel, vec4<f32>(far_distance(texel), 0.0, 0.0, 0.0));
}

@compute @workgroup_size(4, 4, 4)
fn raster_seed(@builtin(global_invocation_id) id: vec3<u32>) {
    let texel = consts.chunk_origin + vec3<i32>(id);
    let world = voxel_world_position(texel);
    var distance = far_distance(texel);
    for (var slot = 0u; slot < consts.object_count; slot = slot + 1u) {
        distance = min(distance, object_distance(slot, world));
    }
    textureStore(cascade_out, texel, vec4<f32>(distance, 0.0, 0.0, 0.0));
}

@compute @workgroup_size(4, 4, 4)
fn raster_add(@builtin(global_invocation_id) id: vec3<u32>) {
    let texel = consts.chunk_origin + vec3<i32>(id);
    let world = voxel_world_position(texel);
    var distance = textureLoad(cascade_out, texel).r;
    for (var slot = 0u; slot < consts.object_count; slot = slot + 1u) {
        distance = min(distance, object_distance(slot, world));
    }
    textureStore(cascade_out, texel, vec4<f32>(distance, 0.0, 0.0, 0.0));
}
"#;

/// Mip generation: a min-downsample seed pass followed by flood-fill
/// iterations that ping-pong between the mip volume and a scratch volume,
/// propagating distance one mip voxel per pass.
pub const MIP_SRC: &str = r#"
struct MipConsts {
    cascade: u32,
    mip_resolution: u32,
    mip_factor: u32,
    voxel_size: f32,
}

@group(0) @binding(0) var src: texture_3d<f32>;
@group(0) @binding(1) var dst: texture_storage_3d<r32float, write>;

var<push_constant> consts: MipConsts;

@compute @workgroup_size(4, 4, 4)
fn mip_seed(@builtin(global_invocation_id) id: vec3<u32>) {
    let base = vec3<i32>(id) * i32(consts.mip_factor);
    let src_offset = vec3<i32>(i32(consts.cascade * consts.mip_resolution * consts.mip_factor), 0, 0);
    var d = 1e30;
    for (var z = 0; z < i32(consts.mip_factor); z = z + 1) {
        for (var y = 0; y < i32(consts.mip_factor); y = y + 1) {
            for (var x = 0; x < i32(consts.mip_factor); x = x + 1) {
                let texel = src_offset + base + vec3<i32>(x, y, z);
                d = min(d, textureLoad(src, texel, 0).r);
            }
        }
    }
    let out = vec3<i32>(i32(consts.cascade * consts.mip_resolution), 0, 0) + vec3<i32>(id);
    textureStore(dst, out, vec4<f32>(d, 0.0, 0.0, 0.0));
}

@compute @workgroup_size(4, 4, 4)
fn mip_flood(@builtin(global_invocation_id) id: vec3<u32>) {
    let offset = vec3<i32>(i32(consts.cascade * consts.mip_resolution), 0, 0);
    let center = offset + vec3<i32>(id);
    let res = i32(consts.mip_resolution);
    var d = textureLoad(src, center, 0).r;
    for (var z = -1; z <= 1; z = z + 1) {
        for (var y = -1; y <= 1; y = y + 1) {
            for (var x = -1; x <= 1; x = x + 1) {
                let local = vec3<i32>(id) + vec3<i32>(x, y, z);
                if (all(local >= vec3<i32>(0)) && all(local < vec3<i32>(res))) {
                    let step = length(vec3<f32>(f32(x), f32(y), f32(z))) * consts.voxel_size;
                    d = min(d, textureLoad(src, offset + local, 0).r + step);
                }
            }
        }
    }
    textureStore(dst, center, vec4<f32>(d, 0.0, 0.0, 0.0));
}
"#;
