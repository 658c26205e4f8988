//! Probe tracing, update, border and sample kernels

/// Shared WGSL prelude: uniform block and octahedral helpers.
const PRELUDE: &str = r#"
struct DdgiUniform {
    start_position: vec4<f32>,
    ray_rotation: vec4<f32>,
    probe_counts: vec4<i32>,
    hysteresis: f32,
    normal_bias: f32,
    gamma: f32,
    max_ray_distance: f32,
    irradiance_texels: i32,
    depth_texels: i32,
    ping_pong: u32,
    first_frame: u32,
}

fn probe_position(index: i32) -> vec3<f32> {
    let counts = ddgi.probe_counts.xyz;
    let x = index % counts.x;
    let y = (index / counts.x) % counts.y;
    let z = index / (counts.x * counts.y);
    return ddgi.start_position.xyz
        + vec3<f32>(f32(x), f32(y), f32(z)) * ddgi.start_position.w;
}

fn sign_not_zero(v: f32) -> f32 {
    return select(-1.0, 1.0, v >= 0.0);
}

fn oct_encode(dir: vec3<f32>) -> vec2<f32> {
    let n = dir / (abs(dir.x) + abs(dir.y) + abs(dir.z));
    var uv = n.xy;
    if (n.z < 0.0) {
        uv = vec2<f32>(
            (1.0 - abs(n.y)) * sign_not_zero(n.x),
            (1.0 - abs(n.x)) * sign_not_zero(n.y),
        );
    }
    return uv;
}

fn oct_decode(uv: vec2<f32>) -> vec3<f32> {
    var n = vec3<f32>(uv.x, uv.y, 1.0 - abs(uv.x) - abs(uv.y));
    if (n.z < 0.0) {
        let x = (1.0 - abs(n.y)) * sign_not_zero(n.x);
        let y = (1.0 - abs(n.x)) * sign_not_zero(n.y);
        n.x = x;
        n.y = y;
    }
    return normalize(n);
}

fn rotate_by_quat(v: vec3<f32>, q: vec4<f32>) -> vec3<f32> {
    let t = 2.0 * cross(q.xyz, v);
    return v + q.w * t + cross(q.xyz, t);
}

// Spherical Fibonacci distribution of the fixed ray set.
fn ray_direction(ray: i32, ray_count: i32) -> vec3<f32> {
    let phi = 2.61803398875; // golden ratio + 1
    let i = f32(ray) + 0.5;
    let z = 1.0 - 2.0 * i / f32(ray_count);
    let r = sqrt(max(0.0, 1.0 - z * z));
    let theta = 6.28318530718 * i * phi;
    let fixed_dir = vec3<f32>(r * cos(theta), r * sin(theta), z);
    return rotate_by_quat(fixed_dir, ddgi.ray_rotation);
}
"#;

/// Ray/SDF trace: one thread per (ray, probe), writing radiance + hit
/// distance into the trace texture.
pub fn trace_src() -> String {
    format!(
        r#"
@group(0) @binding(0) var<uniform> ddgi: DdgiUniform;
@group(0) @binding(1) var radiance_out: texture_storage_2d<rgba16float, write>;
@group(0) @binding(2) var<uniform> sdf: GlobalSdfData;
@group(0) @binding(3) var sdf_mip: texture_3d<f32>;
@group(0) @binding(4) var sdf_sampler: sampler;
@group(0) @binding(5) var atlas_radiance: texture_2d<f32>;
@group(0) @binding(6) var atlas_sampler: sampler;

struct GlobalSdfData {{
    cascade_pos_distance: array<vec4<f32>, 4>,
    cascade_voxel_size: vec4<f32>,
    resolution: f32,
    cascade_count: u32,
    pad0: u32,
    pad1: u32,
}}

{PRELUDE}

fn sample_global_sdf(world: vec3<f32>) -> f32 {{
    for (var cascade = 0u; cascade < sdf.cascade_count; cascade = cascade + 1u) {{
        let info = sdf.cascade_pos_distance[cascade];
        let local = (world - info.xyz) / (info.w * 2.0) + vec3<f32>(0.5);
        if (all(local > vec3<f32>(0.01)) && all(local < vec3<f32>(0.99))) {{
            let x = (local.x + f32(cascade)) / f32(sdf.cascade_count);
            return textureSampleLevel(sdf_mip, sdf_sampler, vec3<f32>(x, local.y, local.z), 0.0).r;
        }}
    }}
    return 1e10;
}}

fn sdf_normal(world: vec3<f32>) -> vec3<f32> {{
    let e = sdf.cascade_voxel_size.x;
    let dx = sample_global_sdf(world + vec3<f32>(e, 0.0, 0.0)) - sample_global_sdf(world - vec3<f32>(e, 0.0, 0.0));
    let dy = sample_global_sdf(world + vec3<f32>(0.0, e, 0.0)) - sample_global_sdf(world - vec3<f32>(0.0, e, 0.0));
    let dz = sample_global_sdf(world + vec3<f32>(0.0, 0.0, e)) - sample_global_sdf(world - vec3<f32>(0.0, 0.0, e));
    return normalize(vec3<f32>(dx, dy, dz) + vec3<f32>(1e-6));
}}

@compute @workgroup_size(8, 8)
fn trace_probes(@builtin(global_invocation_id) id: vec3<u32>) {{
    let ray = i32(id.x);
    let probe = i32(id.y);
    let ray_count = ddgi.probe_counts.w;
    let probe_count = ddgi.probe_counts.x * ddgi.probe_counts.y * ddgi.probe_counts.z;
    if (ray >= ray_count || probe >= probe_count) {{
        return;
    }}

    let origin = probe_position(probe);
    let dir = ray_direction(ray, ray_count);

    var t = sdf.cascade_voxel_size.x;
    var hit = false;
    for (var i = 0; i < 64; i = i + 1) {{
        if (t >= ddgi.max_ray_distance) {{
            break;
        }}
        let d = sample_global_sdf(origin + dir * t);
        if (d < sdf.cascade_voxel_size.x * 0.5) {{
            hit = true;
            break;
        }}
        t = t + max(d, sdf.cascade_voxel_size.x * 0.25);
    }}

    var radiance = vec3<f32>(0.36, 0.44, 0.58); // sky fallback
    if (hit) {{
        // Bounce term: surface cache radiance looked up by the hit
        // normal's octahedral footprint (coarse, intentionally cheap).
        let n = sdf_normal(origin + dir * t);
        let uv = oct_encode(n) * 0.5 + vec2<f32>(0.5);
        radiance = textureSampleLevel(atlas_radiance, atlas_sampler, uv, 0.0).rgb;
    }}
    textureStore(radiance_out, vec2<i32>(ray, probe), vec4<f32>(radiance, t));
}}
"#
    )
}

/// Probe texture update + border patch. The border entry points recompute
/// the mirrored interior texel instead of reading the freshly written
/// texture, so every pass stays write-only on its output.
pub fn update_src() -> String {
    format!(
        r#"
@group(0) @binding(0) var<uniform> ddgi: DdgiUniform;
@group(0) @binding(1) var trace_radiance: texture_2d<f32>;
@group(0) @binding(2) var irradiance_history: texture_2d<f32>;
@group(0) @binding(3) var irradiance_out: texture_storage_2d<rgba16float, write>;
@group(0) @binding(4) var depth_history: texture_2d<f32>;
@group(0) @binding(5) var depth_out: texture_storage_2d<rg32float, write>;

{PRELUDE}

// Texel layout per probe tile: 1-texel border around the interior.
fn tile_origin(probe: i32, texels: i32) -> vec2<i32> {{
    let counts = ddgi.probe_counts.xyz;
    let plane = probe % (counts.x * counts.y);
    return vec2<i32>(plane * (texels + 2) + 1, (probe / (counts.x * counts.y)) * (texels + 2) + 1);
}}

fn texel_direction(local: vec2<i32>, texels: i32) -> vec3<f32> {{
    let uv = (vec2<f32>(local) + vec2<f32>(0.5)) / f32(texels);
    return oct_decode(uv * 2.0 - vec2<f32>(1.0));
}}

fn accumulate_irradiance(probe: i32, dir: vec3<f32>) -> vec4<f32> {{
    var sum = vec3<f32>(0.0);
    var weight_sum = 0.0;
    let ray_count = ddgi.probe_counts.w;
    for (var ray = 0; ray < ray_count; ray = ray + 1) {{
        let w = max(dot(dir, ray_direction(ray, ray_count)), 0.0);
        if (w > 1e-4) {{
            sum = sum + textureLoad(trace_radiance, vec2<i32>(ray, probe), 0).rgb * w;
            weight_sum = weight_sum + w;
        }}
    }}
    return vec4<f32>(sum / max(weight_sum, 1e-4), 1.0);
}}

fn accumulate_depth(probe: i32, dir: vec3<f32>) -> vec2<f32> {{
    var sum = vec2<f32>(0.0);
    var weight_sum = 0.0;
    let ray_count = ddgi.probe_counts.w;
    for (var ray = 0; ray < ray_count; ray = ray + 1) {{
        let w = pow(max(dot(dir, ray_direction(ray, ray_count)), 0.0), 8.0);
        if (w > 1e-4) {{
            let t = min(textureLoad(trace_radiance, vec2<i32>(ray, probe), 0).a, ddgi.max_ray_distance);
            sum = sum + vec2<f32>(t, t * t) * w;
            weight_sum = weight_sum + w;
        }}
    }}
    return sum / max(weight_sum, 1e-4);
}}

fn blend_alpha() -> f32 {{
    return select(1.0 - ddgi.hysteresis, 1.0, ddgi.first_frame == 1u);
}}

@compute @workgroup_size(8, 8)
fn update_irradiance(@builtin(global_invocation_id) id: vec3<u32>) {{
    let texels = ddgi.irradiance_texels;
    let counts = ddgi.probe_counts.xyz;
    let probe_count = counts.x * counts.y * counts.z;
    let probe = i32(id.x) / texels + (i32(id.y) / texels) * counts.x * counts.y;
    if (probe >= probe_count) {{
        return;
    }}
    let local = vec2<i32>(i32(id.x) % texels, i32(id.y) % texels);
    let dir = texel_direction(local, texels);
    let fresh = accumulate_irradiance(probe, dir);

    let texel = tile_origin(probe, texels) + local;
    let history = textureLoad(irradiance_history, texel, 0);
    let blended = mix(history, fresh, blend_alpha());
    textureStore(irradiance_out, texel, blended);
}}

@compute @workgroup_size(8, 8)
fn update_depth(@builtin(global_invocation_id) id: vec3<u32>) {{
    let texels = ddgi.depth_texels;
    let counts = ddgi.probe_counts.xyz;
    let probe_count = counts.x * counts.y * counts.z;
    let probe = i32(id.x) / texels + (i32(id.y) / texels) * counts.x * counts.y;
    if (probe >= probe_count) {{
        return;
    }}
    let local = vec2<i32>(i32(id.x) % texels, i32(id.y) % texels);
    let dir = texel_direction(local, texels);
    let fresh = accumulate_depth(probe, dir);

    let texel = tile_origin(probe, texels) + local;
    let history = textureLoad(depth_history, texel, 0).rg;
    let blended = mix(history, fresh, blend_alpha());
    textureStore(depth_out, texel, vec4<f32>(blended, 0.0, 0.0));
}}

// Border texels mirror the interior across the octahedral fold so
// bilinear taps never read garbage. Each border thread recomputes its
// source interior value.
fn mirrored_interior(local: vec2<i32>, texels: i32) -> vec2<i32> {{
    var p = local;
    if (p.x < 0) {{ p.x = 0; p.y = texels - 1 - p.y; }}
    if (p.x >= texels) {{ p.x = texels - 1; p.y = texels - 1 - p.y; }}
    if (p.y < 0) {{ p.y = 0; p.x = texels - 1 - p.x; }}
    if (p.y >= texels) {{ p.y = texels - 1; p.x = texels - 1 - p.x; }}
    return p;
}}

@compute @workgroup_size(8, 8)
fn border_irradiance(@builtin(global_invocation_id) id: vec3<u32>) {{
    let texels = ddgi.irradiance_texels;
    let stride = texels + 2;
    let counts = ddgi.probe_counts.xyz;
    let probe_count = counts.x * counts.y * counts.z;
    let probe = i32(id.x) / stride + (i32(id.y) / stride) * counts.x * counts.y;
    if (probe >= probe_count) {{
        return;
    }}
    let local = vec2<i32>(i32(id.x) % stride - 1, i32(id.y) % stride - 1);
    let inside = local.x >= 0 && local.x < texels && local.y >= 0 && local.y < texels;
    if (inside) {{
        return;
    }}
    let src = mirrored_interior(local, texels);
    let dir = texel_direction(src, texels);
    let fresh = accumulate_irradiance(probe, dir);
    let src_texel = tile_origin(probe, texels) + src;
    let history = textureLoad(irradiance_history, src_texel, 0);
    let value = mix(history, fresh, blend_alpha());

    let texel = tile_origin(probe, texels) + local;
    textureStore(irradiance_out, texel, value);
}}

@compute @workgroup_size(8, 8)
fn border_depth(@builtin(global_invocation_id) id: vec3<u32>) {{
    let texels = ddgi.depth_texels;
    let stride = texels + 2;
    let counts = ddgi.probe_counts.xyz;
    let probe_count = counts.x * counts.y * counts.z;
    let probe = i32(id.x) / stride + (i32(id.y) / stride) * counts.x * counts.y;
    if (probe >= probe_count) {{
        return;
    }}
    let local = vec2<i32>(i32(id.x) % stride - 1, i32(id.y) % stride - 1);
    let inside = local.x >= 0 && local.x < texels && local.y >= 0 && local.y < texels;
    if (inside) {{
        return;
    }}
    let src = mirrored_interior(local, texels);
    let dir = texel_direction(src, texels);
    let fresh = accumulate_depth(probe, dir);
    let src_texel = tile_origin(probe, texels) + src;
    let history = textureLoad(depth_history, src_texel, 0).rg;
    let value = mix(history, fresh, blend_alpha());

    let texel = tile_origin(probe, texels) + local;
    textureStore(depth_out, texel, vec4<f32>(value, 0.0, 0.0));
}}
"#
    )
}

/// Full-screen indirect lighting: trilinear across probes, bilinear
/// within each octahedral tile, weighted by the depth (visibility) term.
pub fn sample_src() -> String {
    format!(
        r#"
@group(0) @binding(0) var<uniform> ddgi: DdgiUniform;
@group(0) @binding(1) var irradiance_tex: texture_2d<f32>;
@group(0) @binding(2) var depth_tex: texture_2d<f32>;
@group(0) @binding(3) var probe_sampler: sampler;
@group(0) @binding(4) var gbuffer_position: texture_2d<f32>;
@group(0) @binding(5) var gbuffer_normal: texture_2d<f32>;
@group(0) @binding(6) var indirect_out: texture_storage_2d<rgba16float, write>;

{PRELUDE}

fn probe_uv(probe_grid: vec3<i32>, dir: vec3<f32>, texels: i32, tex_size: vec2<f32>) -> vec2<f32> {{
    let counts = ddgi.probe_counts.xyz;
    let probe = probe_grid.x + probe_grid.y * counts.x + probe_grid.z * counts.x * counts.y;
    let origin = tile_origin(probe, texels);
    let oct = oct_encode(dir) * 0.5 + vec2<f32>(0.5);
    let texel = vec2<f32>(origin) + oct * f32(texels);
    return texel / tex_size;
}}

fn tile_origin(probe: i32, texels: i32) -> vec2<i32> {{
    let counts = ddgi.probe_counts.xyz;
    let plane = probe % (counts.x * counts.y);
    return vec2<i32>(plane * (texels + 2) + 1, (probe / (counts.x * counts.y)) * (texels + 2) + 1);
}}

@compute @workgroup_size(8, 8)
fn sample_probes(@builtin(global_invocation_id) id: vec3<u32>) {{
    let dims = textureDimensions(indirect_out);
    if (id.x >= dims.x || id.y >= dims.y) {{
        return;
    }}
    let texel = vec2<i32>(id.xy);
    let world = textureLoad(gbuffer_position, texel, 0).xyz;
    let normal = normalize(textureLoad(gbuffer_normal, texel, 0).xyz * 2.0 - vec3<f32>(1.0));
    let biased = world + normal * ddgi.normal_bias;

    let counts = ddgi.probe_counts.xyz;
    let grid = (biased - ddgi.start_position.xyz) / ddgi.start_position.w;
    let base = clamp(vec3<i32>(floor(grid)), vec3<i32>(0), counts - vec3<i32>(2));
    let frac = clamp(grid - vec3<f32>(base), vec3<f32>(0.0), vec3<f32>(1.0));

    let tex_size = vec2<f32>(textureDimensions(irradiance_tex));
    var sum = vec3<f32>(0.0);
    var weight_sum = 0.0;
    for (var i = 0; i < 8; i = i + 1) {{
        let offset = vec3<i32>(i & 1, (i >> 1) & 1, (i >> 2) & 1);
        let probe_grid = base + offset;
        let tri = mix(vec3<f32>(1.0) - frac, frac, vec3<f32>(offset));
        var weight = tri.x * tri.y * tri.z;

        // Direction-of-probe backface cut.
        let probe_index = probe_grid.x + probe_grid.y * counts.x + probe_grid.z * counts.x * counts.y;
        let to_probe = normalize(probe_position(probe_index) - world);
        weight = weight * max(dot(to_probe, normal), 0.0);
        if (weight <= 1e-5) {{
            continue;
        }}

        let uv = probe_uv(probe_grid, normal, ddgi.irradiance_texels, tex_size);
        let irr = textureSampleLevel(irradiance_tex, probe_sampler, uv, 0.0).rgb;
        sum = sum + pow(irr, vec3<f32>(ddgi.gamma * 0.5)) * weight;
        weight_sum = weight_sum + weight;
    }}
    let result = sum / max(weight_sum, 1e-4);
    textureStore(indirect_out, texel, vec4<f32>(result, 1.0));
}}
"#
    )
}
