//! Card G-buffer, tile clear and relight kernels

/// Card draw: orthographic projection of one object face into its tile
/// rectangle, writing G-buffer channels. Push constants carry the view
/// projection and material factors.
pub const CARD_SRC: &str = r#"
struct CardConsts {
    view_proj: mat4x4<f32>,
    albedo: vec4<f32>,
    material: vec4<f32>, // roughness, metalness, emissive scale, unused
}

var<push_constant> consts: CardConsts;

struct VertexIn {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

struct VertexOut {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) normal: vec3<f32>,
}

@vertex
fn vs_main(v: VertexIn) -> VertexOut {
    var out: VertexOut;
    out.clip_position = consts.view_proj * vec4<f32>(v.position, 1.0);
    out.normal = v.normal;
    return out;
}

struct GBufferOut {
    @location(0) albedo: vec4<f32>,
    @location(1) normal: vec4<f32>,
    @location(2) pbr: vec4<f32>,
    @location(3) emissive: vec4<f32>,
}

@fragment
fn fs_main(v: VertexOut) -> GBufferOut {
    var out: GBufferOut;
    out.albedo = consts.albedo;
    out.normal = vec4<f32>(normalize(v.normal) * 0.5 + vec3<f32>(0.5), 1.0);
    out.pbr = vec4<f32>(consts.material.x, consts.material.y, 1.0, 0.0);
    out.emissive = consts.albedo * consts.material.z;
    return out;
}

@vertex
fn vs_clear(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    // Full-viewport triangle at the far plane; the scissor rect limits it
    // to the tile being cleared.
    let x = f32(i32(index & 1u) * 4 - 1);
    let y = f32(i32(index >> 1u) * 4 - 1);
    return vec4<f32>(x, y, 1.0, 1.0);
}

@fragment
fn fs_clear() -> GBufferOut {
    var out: GBufferOut;
    out.albedo = vec4<f32>(0.0);
    out.normal = vec4<f32>(0.5, 0.5, 0.5, 0.0);
    out.pbr = vec4<f32>(0.0);
    out.emissive = vec4<f32>(0.0);
    return out;
}
"#;

/// Tile relight: one dispatch per dirty tile, looping the frame's light
/// list. Direct lighting is shadowed by marching the global distance
/// field mip.
pub const RELIGHT_SRC: &str = r#"
struct AtlasData {
    resolution: f32,
    tile_count: u32,
    light_count: u32,
    pad0: u32,
}

struct TileData {
    view_proj: mat4x4<f32>,
    inv_view_proj: mat4x4<f32>,
    rect: vec4<f32>,
    meta: vec4<u32>,
}

struct LightData {
    position_radius: vec4<f32>, // xyz position / direction, w radius (0 = directional)
    color: vec4<f32>,
}

struct GlobalSdfData {
    cascade_pos_distance: array<vec4<f32>, 4>,
    cascade_voxel_size: vec4<f32>,
    resolution: f32,
    cascade_count: u32,
    pad0: u32,
    pad1: u32,
}

struct RelightConsts {
    tile_address: u32,
}

@group(0) @binding(0) var<uniform> atlas: AtlasData;
@group(0) @binding(1) var<storage, read> tiles: array<TileData>;
@group(0) @binding(2) var<storage, read> lights: array<LightData>;
@group(0) @binding(3) var albedo_tex: texture_2d<f32>;
@group(0) @binding(4) var normal_tex: texture_2d<f32>;
@group(0) @binding(5) var emissive_tex: texture_2d<f32>;
@group(0) @binding(6) var depth_tex: texture_depth_2d;
@group(0) @binding(7) var radiance_out: texture_storage_2d<rgba16float, write>;
@group(0) @binding(8) var<uniform> sdf: GlobalSdfData;
@group(0) @binding(9) var sdf_mip: texture_3d<f32>;
@group(0) @binding(10) var sdf_sampler: sampler;

var<push_constant> consts: RelightConsts;

fn sample_global_sdf(world: vec3<f32>) -> f32 {
    // Finest cascade containing the point wins.
    for (var cascade = 0u; cascade < sdf.cascade_count; cascade = cascade + 1u) {
        let info = sdf.cascade_pos_distance[cascade];
        let local = (world - info.xyz) / (info.w * 2.0) + vec3<f32>(0.5);
        if (all(local > vec3<f32>(0.01)) && all(local < vec3<f32>(0.99))) {
            let x = (local.x + f32(cascade)) / f32(sdf.cascade_count);
            let uvw = vec3<f32>(x, local.y, local.z);
            return textureSampleLevel(sdf_mip, sdf_sampler, uvw, 0.0).r;
        }
    }
    return 1e10;
}

fn shadow_march(origin: vec3<f32>, dir: vec3<f32>, max_t: f32) -> f32 {
    var t = sdf.cascade_voxel_size.x * 2.0;
    for (var i = 0; i < 32; i = i + 1) {
        if (t >= max_t) {
            break;
        }
        let d = sample_global_sdf(origin + dir * t);
        if (d < sdf.cascade_voxel_size.x * 0.5) {
            return 0.0;
        }
        t = t + max(d, sdf.cascade_voxel_size.x);
    }
    return 1.0;
}

@compute @workgroup_size(8, 8)
fn relight_tile(@builtin(global_invocation_id) id: vec3<u32>) {
    let tile = tiles[consts.tile_address];
    if (f32(id.x) >= tile.rect.z || f32(id.y) >= tile.rect.w) {
        return;
    }
    let texel = vec2<i32>(i32(tile.rect.x) + i32(id.x), i32(tile.rect.y) + i32(id.y));

    let depth = textureLoad(depth_tex, texel, 0);
    if (depth >= 1.0) {
        textureStore(radiance_out, texel, vec4<f32>(0.0));
        return;
    }

    // Reconstruct the world position from the card projection.
    let uv = (vec2<f32>(id.xy) + vec2<f32>(0.5)) / tile.rect.zw;
    let ndc = vec3<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, depth);
    let world_h = tile.inv_view_proj * vec4<f32>(ndc, 1.0);
    let world = world_h.xyz / world_h.w;

    let albedo = textureLoad(albedo_tex, texel, 0).rgb;
    let normal = normalize(textureLoad(normal_tex, texel, 0).xyz * 2.0 - vec3<f32>(1.0));
    var radiance = textureLoad(emissive_tex, texel, 0).rgb;

    for (var i = 0u; i < atlas.light_count; i = i + 1u) {
        let light = lights[i];
        var dir: vec3<f32>;
        var attenuation = 1.0;
        var max_t = 1e6;
        if (light.position_radius.w <= 0.0) {
            dir = normalize(-light.position_radius.xyz);
        } else {
            let to_light = light.position_radius.xyz - world;
            let dist = length(to_light);
            if (dist > light.position_radius.w) {
                continue;
            }
            dir = to_light / max(dist, 1e-4);
            attenuation = 1.0 - dist / light.position_radius.w;
            max_t = dist;
        }
        let ndotl = max(dot(normal, dir), 0.0);
        if (ndotl <= 0.0) {
            continue;
        }
        let shadow = shadow_march(world + normal * sdf.cascade_voxel_size.x, dir, max_t);
        radiance = radiance + albedo * light.color.rgb * (ndotl * attenuation * shadow);
    }

    textureStore(radiance_out, texel, vec4<f32>(radiance, 1.0));
}
"#;
