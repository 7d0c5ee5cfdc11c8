/// Phong lighting for scene meshes, with an optional shadow map lookup.
pub(crate) const SCENE_SHADER: &str = r#"
struct GlobalUniform {
    view_proj: mat4x4<f32>,
    light_view_proj: mat4x4<f32>,
    camera_position: vec4<f32>,
    light_position: vec4<f32>,
    light_ambient: vec4<f32>,
    light_diffuse: vec4<f32>,
    light_specular: vec4<f32>,
}

struct ObjectConstants {
    model: mat4x4<f32>,
    normal: mat3x4<f32>,
    ambient: vec4<f32>,
    // rgb diffuse, a = material alpha
    diffuse: vec4<f32>,
    // rgb specular, w = shininess
    specular: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: GlobalUniform;
@group(0) @binding(1)
var shadow_map: texture_depth_2d;
@group(0) @binding(2)
var shadow_sampler: sampler_comparison;

@group(1) @binding(0)
var<uniform> object: ObjectConstants;
@group(1) @binding(1)
var diffuse_map: texture_2d<f32>;
@group(1) @binding(2)
var diffuse_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_position = object.model * vec4<f32>(input.position, 1.0);
    out.position = globals.view_proj * world_position;
    out.world_pos = world_position.xyz;

    let normal_matrix = mat3x3<f32>(
        object.normal[0].xyz,
        object.normal[1].xyz,
        object.normal[2].xyz
    );
    out.normal = normalize(normal_matrix * input.normal);
    out.uv = input.uv;
    return out;
}

fn shade(input: VertexOutput, texel: vec4<f32>, lit: f32) -> vec4<f32> {
    let normal = normalize(input.normal);
    let to_light = normalize(globals.light_position.xyz - input.world_pos);
    let to_camera = normalize(globals.camera_position.xyz - input.world_pos);
    let reflected = reflect(-to_light, normal);

    let diffuse_term = max(dot(normal, to_light), 0.0);
    let specular_term = select(
        0.0,
        pow(max(dot(reflected, to_camera), 0.0), max(object.specular.w, 1.0)),
        diffuse_term > 0.0
    );

    let base = object.diffuse.rgb * texel.rgb;
    let ambient = globals.light_ambient.rgb * object.ambient.rgb * texel.rgb;
    let diffuse = globals.light_diffuse.rgb * base * diffuse_term;
    let specular = globals.light_specular.rgb * object.specular.rgb * specular_term;
    let color = ambient + lit * (diffuse + specular);
    return vec4<f32>(color, object.diffuse.a * texel.a);
}

fn shadow_factor(world_pos: vec3<f32>) -> f32 {
    let light_clip = globals.light_view_proj * vec4<f32>(world_pos, 1.0);
    let ndc = light_clip.xyz / light_clip.w;
    let uv = vec2<f32>(ndc.x * 0.5 + 0.5, -ndc.y * 0.5 + 0.5);
    if (uv.x < 0.0 || uv.x > 1.0 || uv.y < 0.0 || uv.y > 1.0 || ndc.z > 1.0) {
        return 1.0;
    }

    // 3x3 percentage closer filtering
    let texel = 1.0 / vec2<f32>(textureDimensions(shadow_map));
    var visible = 0.0;
    for (var x = -1; x <= 1; x += 1) {
        for (var y = -1; y <= 1; y += 1) {
            let offset = vec2<f32>(f32(x), f32(y)) * texel;
            visible += textureSampleCompareLevel(shadow_map, shadow_sampler, uv + offset, ndc.z);
        }
    }
    return visible / 9.0;
}

@fragment
fn fs_phong(input: VertexOutput) -> @location(0) vec4<f32> {
    let texel = textureSample(diffuse_map, diffuse_sampler, input.uv);
    return shade(input, texel, 1.0);
}

@fragment
fn fs_shadowed(input: VertexOutput) -> @location(0) vec4<f32> {
    let texel = textureSample(diffuse_map, diffuse_sampler, input.uv);
    return shade(input, texel, shadow_factor(input.world_pos));
}
"#;

/// Depth-only pass rendering shadow casters from the light.
pub(crate) const SHADOW_SHADER: &str = r#"
struct ShadowUniform {
    light_view_proj: mat4x4<f32>,
}

struct ObjectConstants {
    model: mat4x4<f32>,
    normal: mat3x4<f32>,
    ambient: vec4<f32>,
    diffuse: vec4<f32>,
    specular: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> caster: ShadowUniform;

@group(1) @binding(0)
var<uniform> object: ObjectConstants;

@vertex
fn vs_shadow(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return caster.light_view_proj * object.model * vec4<f32>(position, 1.0);
}
"#;

/// Cube-mapped sky drawn as a full screen triangle at the far plane.
pub(crate) const SKYBOX_SHADER: &str = r#"
struct SkyUniform {
    inv_view_proj: mat4x4<f32>,
}

@group(0) @binding(0)
var<uniform> sky: SkyUniform;
@group(0) @binding(1)
var sky_texture: texture_cube<f32>;
@group(0) @binding(2)
var sky_sampler: sampler;

struct SkyOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) direction: vec3<f32>,
}

@vertex
fn vs_sky(@builtin(vertex_index) index: u32) -> SkyOutput {
    let corner = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    let clip = vec4<f32>(corner * 2.0 - 1.0, 1.0, 1.0);
    let world = sky.inv_view_proj * clip;

    var out: SkyOutput;
    out.position = clip;
    out.direction = world.xyz / world.w;
    return out;
}

@fragment
fn fs_sky(input: SkyOutput) -> @location(0) vec4<f32> {
    return textureSample(sky_texture, sky_sampler, normalize(input.direction));
}
"#;

/// Shows the shadow map depth as grey levels inside the current viewport.
pub(crate) const PREVIEW_SHADER: &str = r#"
@group(0) @binding(0)
var depth_texture: texture_depth_2d;

struct PreviewOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_preview(@builtin(vertex_index) index: u32) -> PreviewOutput {
    let corner = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: PreviewOutput;
    out.position = vec4<f32>(corner * 2.0 - 1.0, 0.0, 1.0);
    out.uv = vec2<f32>(corner.x, 1.0 - corner.y);
    return out;
}

@fragment
fn fs_preview(input: PreviewOutput) -> @location(0) vec4<f32> {
    let size = vec2<f32>(textureDimensions(depth_texture));
    let texel = vec2<i32>(clamp(input.uv, vec2<f32>(0.0), vec2<f32>(0.999)) * size);
    let depth = textureLoad(depth_texture, texel, 0);
    return vec4<f32>(vec3<f32>(depth), 1.0);
}
"#;
