//! Reprojection, à-trous and copy kernels

/// Temporal reprojection + tile classification. One workgroup per 8x8
/// tile; disoccluded pixels vote through workgroup atomics and thread 0
/// appends the tile to the matching indirect-dispatch list.
pub const REPROJECT_SRC: &str = r#"
struct DenoiseViewData {
    reproject: mat4x4<f32>,
    inv_view_proj: mat4x4<f32>,
    depth_sigma: f32,
    normal_sigma: f32,
    history_weight: f32,
    pad: f32,
}

struct DispatchArgs {
    x: atomic<u32>,
    y: u32,
    z: u32,
}

struct TileLists {
    denoise_args: DispatchArgs,
    copy_args: DispatchArgs,
}

@group(0) @binding(0) var<uniform> view: DenoiseViewData;
@group(0) @binding(1) var signal_in: texture_2d<f32>;
@group(0) @binding(2) var history_in: texture_2d<f32>;
@group(0) @binding(3) var depth_in: texture_depth_2d;
@group(0) @binding(4) var accumulated_out: texture_storage_2d<rgba16float, write>;
@group(0) @binding(5) var<storage, read_write> lists: TileLists;
@group(0) @binding(6) var<storage, read_write> denoise_tiles: array<u32>;
@group(0) @binding(7) var<storage, read_write> copy_tiles: array<u32>;
@group(0) @binding(8) var history_sampler: sampler;

var<workgroup> disoccluded_votes: atomic<u32>;

@compute @workgroup_size(8, 8)
fn reproject(
    @builtin(global_invocation_id) id: vec3<u32>,
    @builtin(local_invocation_index) local_index: u32,
    @builtin(workgroup_id) group_id: vec3<u32>,
    @builtin(num_workgroups) group_count: vec3<u32>,
) {
    if (local_index == 0u) {
        atomicStore(&disoccluded_votes, 0u);
    }
    workgroupBarrier();

    let dims = textureDimensions(signal_in);
    var disoccluded = false;
    if (id.x < dims.x && id.y < dims.y) {
        let texel = vec2<i32>(id.xy);
        let depth = textureLoad(depth_in, texel, 0);
        let fresh = textureLoad(signal_in, texel, 0);

        var result = fresh;
        if (depth < 1.0) {
            // Reconstruct and reproject into the previous frame.
            let uv = (vec2<f32>(id.xy) + vec2<f32>(0.5)) / vec2<f32>(dims);
            let ndc = vec3<f32>(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, depth);
            let world_h = view.inv_view_proj * vec4<f32>(ndc, 1.0);
            let world = world_h.xyz / world_h.w;
            let prev_clip = view.reproject * vec4<f32>(world, 1.0);
            let prev_ndc = prev_clip.xyz / prev_clip.w;
            let prev_uv = vec2<f32>(prev_ndc.x * 0.5 + 0.5, 0.5 - prev_ndc.y * 0.5);

            if (all(prev_uv >= vec2<f32>(0.0)) && all(prev_uv <= vec2<f32>(1.0))) {
                let history = textureSampleLevel(history_in, history_sampler, prev_uv, 0.0);
                let delta = abs(prev_ndc.z - depth);
                if (delta < view.depth_sigma) {
                    result = mix(fresh, history, view.history_weight);
                } else {
                    disoccluded = true;
                }
            } else {
                disoccluded = true;
            }
        }
        textureStore(accumulated_out, texel, result);
    }

    if (disoccluded) {
        atomicAdd(&disoccluded_votes, 1u);
    }
    workgroupBarrier();

    if (local_index == 0u) {
        let tile = group_id.y * group_count.x + group_id.x;
        if (atomicLoad(&disoccluded_votes) > 0u) {
            let slot = atomicAdd(&lists.denoise_args.x, 1u);
            denoise_tiles[slot] = tile;
        } else {
            let slot = atomicAdd(&lists.copy_args.x, 1u);
            copy_tiles[slot] = tile;
        }
    }
}
"#;

/// Edge-aware à-trous blur over the flagged tiles, launched indirectly.
/// The stride doubles per iteration instead of widening the kernel.
pub const ATROUS_SRC: &str = r#"
struct DenoiseViewData {
    reproject: mat4x4<f32>,
    inv_view_proj: mat4x4<f32>,
    depth_sigma: f32,
    normal_sigma: f32,
    history_weight: f32,
    pad: f32,
}

struct AtrousConsts {
    stride: u32,
    tiles_per_row: u32,
}

@group(0) @binding(0) var<uniform> view: DenoiseViewData;
@group(0) @binding(1) var signal_in: texture_2d<f32>;
@group(0) @binding(2) var depth_in: texture_depth_2d;
@group(0) @binding(3) var normal_in: texture_2d<f32>;
@group(0) @binding(4) var signal_out: texture_storage_2d<rgba16float, write>;
@group(0) @binding(5) var<storage, read> tiles: array<u32>;

var<push_constant> consts: AtrousConsts;

@compute @workgroup_size(8, 8)
fn atrous(
    @builtin(workgroup_id) group_id: vec3<u32>,
    @builtin(local_invocation_id) local_id: vec3<u32>,
) {
    let tile = tiles[group_id.x];
    let tile_coord = vec2<u32>(tile % consts.tiles_per_row, tile / consts.tiles_per_row);
    let pixel = vec2<i32>(tile_coord * 8u + local_id.xy);
    let dims = vec2<i32>(textureDimensions(signal_in));
    if (pixel.x >= dims.x || pixel.y >= dims.y) {
        return;
    }

    let center_depth = textureLoad(depth_in, pixel, 0);
    let center_normal = textureLoad(normal_in, pixel, 0).xyz * 2.0 - vec3<f32>(1.0);
    var kernel_weights = array<f32, 3>(0.375, 0.25, 0.0625);
    var sum = vec4<f32>(0.0);
    var weight_sum = 0.0;

    for (var dy = -2; dy <= 2; dy = dy + 1) {
        for (var dx = -2; dx <= 2; dx = dx + 1) {
            let tap = pixel + vec2<i32>(dx, dy) * i32(consts.stride);
            if (tap.x < 0 || tap.y < 0 || tap.x >= dims.x || tap.y >= dims.y) {
                continue;
            }
            let tap_depth = textureLoad(depth_in, tap, 0);
            let tap_normal = textureLoad(normal_in, tap, 0).xyz * 2.0 - vec3<f32>(1.0);

            let depth_weight = exp(-abs(tap_depth - center_depth) / max(view.depth_sigma, 1e-5));
            let normal_weight = pow(max(dot(tap_normal, center_normal), 0.0), view.normal_sigma);
            let kernel = kernel_weights[abs(dx)] * kernel_weights[abs(dy)];
            let weight = kernel * depth_weight * normal_weight;

            sum = sum + textureLoad(signal_in, tap, 0) * weight;
            weight_sum = weight_sum + weight;
        }
    }
    textureStore(signal_out, pixel, sum / max(weight_sum, 1e-5));
}

// Converged tiles skip filtering entirely.
@compute @workgroup_size(8, 8)
fn copy_tile(
    @builtin(workgroup_id) group_id: vec3<u32>,
    @builtin(local_invocation_id) local_id: vec3<u32>,
) {
    let tile = tiles[group_id.x];
    let tile_coord = vec2<u32>(tile % consts.tiles_per_row, tile / consts.tiles_per_row);
    let pixel = vec2<i32>(tile_coord * 8u + local_id.xy);
    let dims = vec2<i32>(textureDimensions(signal_in));
    if (pixel.x >= dims.x || pixel.y >= dims.y) {
        return;
    }
    textureStore(signal_out, pixel, textureLoad(signal_in, pixel, 0));
}
"#;

/// Bilinear upsample to the full-resolution target.
pub const UPSAMPLE_SRC: &str = r#"
@group(0) @binding(0) var signal_in: texture_2d<f32>;
@group(0) @binding(1) var signal_sampler: sampler;
@group(0) @binding(2) var signal_out: texture_storage_2d<rgba16float, write>;

@compute @workgroup_size(8, 8)
fn upsample(@builtin(global_invocation_id) id: vec3<u32>) {
    let dims = textureDimensions(signal_out);
    if (id.x >= dims.x || id.y >= dims.y) {
        return;
    }
    let uv = (vec2<f32>(id.xy) + vec2<f32>(0.5)) / vec2<f32>(dims);
    let value = textureSampleLevel(signal_in, signal_sampler, uv, 0.0);
    textureStore(signal_out, vec2<i32>(id.xy), value);
}
"#;
