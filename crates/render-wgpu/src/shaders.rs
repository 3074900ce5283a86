/// WGSL shader for lit scene meshes.
///
/// `mesh.params` packs metallic, roughness, environment intensity and an
/// unlit flag; `light_color[i].w` carries the light's intensity.
pub const MESH_SHADER: &str = r#"
struct Frame {
    view_proj: mat4x4<f32>,
    camera_pos: vec4<f32>,
    ambient: vec4<f32>,
    environment: vec4<f32>,
    light_count: vec4<u32>,
    light_pos: array<vec4<f32>, 4>,
    light_color: array<vec4<f32>, 4>,
};

struct Mesh {
    model: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
    base_color: vec4<f32>,
    params: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> frame: Frame;

@group(1) @binding(0)
var<uniform> mesh: Mesh;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
};

@vertex
fn vs_main(vertex: VertexInput) -> VertexOutput {
    let world = mesh.model * vec4<f32>(vertex.position, 1.0);
    var out: VertexOutput;
    out.clip_position = frame.view_proj * world;
    out.world_pos = world.xyz;
    out.world_normal = normalize((mesh.normal_matrix * vec4<f32>(vertex.normal, 0.0)).xyz);
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    if (mesh.params.w > 0.5) {
        return mesh.base_color;
    }
    let base = mesh.base_color.rgb;
    let metallic = mesh.params.x;
    let roughness = mesh.params.y;
    let env_intensity = mesh.params.z;

    let n = normalize(in.world_normal);
    let v = normalize(frame.camera_pos.xyz - in.world_pos);
    let diffuse_color = base * (1.0 - metallic);
    let f0 = mix(vec3<f32>(0.04), base, metallic);
    let shininess = mix(256.0, 4.0, roughness);

    var color = frame.ambient.rgb * diffuse_color;
    color += frame.environment.rgb * frame.environment.w * env_intensity
        * mix(diffuse_color, f0, 0.5);

    for (var i = 0u; i < frame.light_count.x; i = i + 1u) {
        let to_light = frame.light_pos[i].xyz - in.world_pos;
        let dist = length(to_light);
        let l = to_light / max(dist, 0.0001);
        let h = normalize(l + v);
        let attenuation = frame.light_color[i].w / (1.0 + 0.02 * dist * dist);
        let n_dot_l = max(dot(n, l), 0.0);
        let spec = pow(max(dot(n, h), 0.0), shininess) * n_dot_l;
        color += frame.light_color[i].rgb * attenuation * (diffuse_color * n_dot_l + f0 * spec);
    }

    return vec4<f32>(color, mesh.base_color.a);
}
"#;
