//! Built-in GLSL sources and the paths they are registered under.
//!
//! Sources are GLSL 450 in the Vulkan dialect: uniforms live in
//! `set = 0` blocks (binding 0 for the vertex stage, 1 for the fragment
//! stage) and textures are split into a `texture2D` at binding 2 and its
//! `<name>_sampler` at binding 3. Matrices follow GL clip conventions; vertex
//! stages remap clip depth from [-w, w] onto [0, w] before writing
//! `gl_Position`.
//!
//! Uniform names used here are the contract with the renderer: `transform`,
//! `M`, `M_IT`, `VP`, `camera_position`, `light_count`, `lights[i].*`,
//! `sky.*`, `tint`, `alphaThreshold` and `tex`.

pub const TEXTURED_VERT_PATH: &str = "assets/shaders/textured.vert";
pub const TEXTURED_FRAG_PATH: &str = "assets/shaders/textured.frag";
pub const LIT_VERT_PATH: &str = "assets/shaders/lit.vert";
pub const LIT_FRAG_PATH: &str = "assets/shaders/lit.frag";
pub const FULLSCREEN_VERT_PATH: &str = "assets/shaders/fullscreen.vert";
pub const GRAYSCALE_FRAG_PATH: &str = "assets/shaders/postprocess/grayscale.frag";

/// Position, color, texture coordinate and normal at locations 0 to 3.
pub const TEXTURED_VERT: &str = r#"#version 450

layout(location = 0) in vec3 position;
layout(location = 1) in vec4 color;
layout(location = 2) in vec2 tex_coord;

layout(location = 0) out vec4 v_color;
layout(location = 1) out vec2 v_tex_coord;

layout(set = 0, binding = 0) uniform VertexUniforms {
    mat4 transform;
};

void main() {
    vec4 clip = transform * vec4(position, 1.0);
    gl_Position = vec4(clip.xy, 0.5 * (clip.z + clip.w), clip.w);
    v_color = color;
    v_tex_coord = tex_coord;
}
"#;

pub const TEXTURED_FRAG: &str = r#"#version 450

layout(location = 0) in vec4 v_color;
layout(location = 1) in vec2 v_tex_coord;

layout(location = 0) out vec4 frag_color;

layout(set = 0, binding = 1) uniform FragmentUniforms {
    vec4 tint;
    float alphaThreshold;
};

layout(set = 0, binding = 2) uniform texture2D tex;
layout(set = 0, binding = 3) uniform sampler tex_sampler;

void main() {
    vec4 color = tint * v_color * texture(sampler2D(tex, tex_sampler), v_tex_coord);
    if (color.a < alphaThreshold) {
        discard;
    }
    frag_color = color;
}
"#;

pub const LIT_VERT: &str = r#"#version 450

layout(location = 0) in vec3 position;
layout(location = 1) in vec4 color;
layout(location = 2) in vec2 tex_coord;
layout(location = 3) in vec3 normal;

layout(location = 0) out vec4 v_color;
layout(location = 1) out vec2 v_tex_coord;
layout(location = 2) out vec3 v_world;
layout(location = 3) out vec3 v_normal;

layout(set = 0, binding = 0) uniform VertexUniforms {
    mat4 M;
    mat4 M_IT;
    mat4 VP;
};

void main() {
    vec4 world = M * vec4(position, 1.0);
    vec4 clip = VP * world;
    gl_Position = vec4(clip.xy, 0.5 * (clip.z + clip.w), clip.w);
    v_color = color;
    v_tex_coord = tex_coord;
    v_world = world.xyz;
    v_normal = normalize((M_IT * vec4(normal, 0.0)).xyz);
}
"#;

pub const LIT_FRAG: &str = r#"#version 450

#define MAX_LIGHTS 8
#define DIRECTIONAL 0
#define POINT 1
#define SPOT 2

struct Light {
    int type;
    vec3 color;
    vec3 position;
    vec3 direction;
    vec3 attenuation;
    vec2 cone_angles;
};

struct Sky {
    vec3 top;
    vec3 horizon;
    vec3 bottom;
};

layout(location = 0) in vec4 v_color;
layout(location = 1) in vec2 v_tex_coord;
layout(location = 2) in vec3 v_world;
layout(location = 3) in vec3 v_normal;

layout(location = 0) out vec4 frag_color;

layout(set = 0, binding = 1) uniform FragmentUniforms {
    Light lights[MAX_LIGHTS];
    int light_count;
    Sky sky;
    vec3 camera_position;
    vec4 tint;
    float alphaThreshold;
};

layout(set = 0, binding = 2) uniform texture2D tex;
layout(set = 0, binding = 3) uniform sampler tex_sampler;

vec3 ambient(vec3 normal) {
    float y = normal.y;
    if (y > 0.0) {
        return mix(sky.horizon, sky.top, y);
    }
    return mix(sky.horizon, sky.bottom, -y);
}

void main() {
    vec4 albedo = tint * v_color * texture(sampler2D(tex, tex_sampler), v_tex_coord);
    if (albedo.a < alphaThreshold) {
        discard;
    }

    vec3 normal = normalize(v_normal);
    vec3 view = normalize(camera_position - v_world);
    vec3 light_sum = ambient(normal);

    int count = min(light_count, MAX_LIGHTS);
    for (int i = 0; i < count; i++) {
        Light light = lights[i];
        vec3 to_light = -light.direction;
        float intensity = 1.0;
        if (light.type != DIRECTIONAL) {
            vec3 offset = light.position - v_world;
            float d = length(offset);
            to_light = offset / d;
            intensity = 1.0 / dot(light.attenuation, vec3(d * d, d, 1.0));
            if (light.type == SPOT) {
                float angle = acos(dot(-to_light, normalize(light.direction)));
                intensity *= smoothstep(light.cone_angles.y, light.cone_angles.x, angle);
            }
        }
        float diffuse = max(dot(normal, to_light), 0.0);
        vec3 halfway = normalize(to_light + view);
        float specular = pow(max(dot(normal, halfway), 0.0), 32.0);
        light_sum += light.color * intensity * (diffuse + 0.25 * specular);
    }

    frag_color = vec4(albedo.rgb * light_sum, albedo.a);
}
"#;

/// Full-screen triangle generated from `gl_VertexIndex`; no vertex buffer bound.
/// Texture rows start at the top of the render target, so `v` runs downwards.
pub const FULLSCREEN_VERT: &str = r#"#version 450

layout(location = 0) out vec2 v_tex_coord;

void main() {
    vec2 positions[3] = vec2[3](vec2(-1.0, -1.0), vec2(3.0, -1.0), vec2(-1.0, 3.0));
    vec2 position = positions[gl_VertexIndex];
    gl_Position = vec4(position, 0.0, 1.0);
    v_tex_coord = vec2(0.5 * position.x + 0.5, 0.5 - 0.5 * position.y);
}
"#;

pub const GRAYSCALE_FRAG: &str = r#"#version 450

layout(location = 0) in vec2 v_tex_coord;
layout(location = 0) out vec4 frag_color;

layout(set = 0, binding = 2) uniform texture2D tex;
layout(set = 0, binding = 3) uniform sampler tex_sampler;

void main() {
    vec4 color = texture(sampler2D(tex, tex_sampler), v_tex_coord);
    float luma = dot(color.rgb, vec3(0.2126, 0.7152, 0.0722));
    frag_color = vec4(vec3(luma), color.a);
}
"#;

/// Every built-in source keyed by path.
pub const BUILTIN: [(&str, &str); 6] = [
    (TEXTURED_VERT_PATH, TEXTURED_VERT),
    (TEXTURED_FRAG_PATH, TEXTURED_FRAG),
    (LIT_VERT_PATH, LIT_VERT),
    (LIT_FRAG_PATH, LIT_FRAG),
    (FULLSCREEN_VERT_PATH, FULLSCREEN_VERT),
    (GRAYSCALE_FRAG_PATH, GRAYSCALE_FRAG),
];
