//! Built-in GLSL sources: defaults written to disk when a requested primary
//! file does not exist, plus the fixed stages the render graph needs
//! (billboard vertex stage, overlay shaders, fallback FXAA filter).

/// Vertex stage for every full-screen pass (canvas, buffer passes,
/// post-processing). The billboard quad carries position + texcoord.
pub const BILLBOARD_VERT: &str = r#"#version 330 core
uniform mat4 u_modelViewProjectionMatrix;
layout(location = 0) in vec2 a_position;
layout(location = 1) in vec2 a_texcoord;
out vec2 v_texcoord;
void main() {
    v_texcoord = a_texcoord;
    gl_Position = u_modelViewProjectionMatrix * vec4(a_position, 0.0, 1.0);
}
"#;

pub const DEFAULT_FRAG: &str = r#"#version 330 core
uniform vec2 u_resolution;
uniform float u_time;
out vec4 frag_color;
void main() {
    vec2 st = gl_FragCoord.xy / u_resolution;
    vec3 color = vec3(st.x, st.y, abs(sin(u_time)));
    frag_color = vec4(color, 1.0);
}
"#;

pub const DEFAULT_VERT: &str = BILLBOARD_VERT;

pub const DEFAULT_SCENE_VERT: &str = r#"#version 330 core
uniform mat4 u_modelViewProjectionMatrix;
#ifdef SHADOW_MAP
uniform mat4 u_lightMatrix;
out vec4 v_lightcoord;
#endif
layout(location = 0) in vec3 a_position;
layout(location = 1) in vec3 a_normal;
layout(location = 2) in vec2 a_texcoord;
out vec4 v_position;
out vec3 v_normal;
out vec2 v_texcoord;
void main() {
    v_position = vec4(a_position, 1.0);
    v_normal = a_normal;
    v_texcoord = a_texcoord;
#ifdef SHADOW_MAP
    v_lightcoord = u_lightMatrix * v_position;
#endif
    gl_Position = u_modelViewProjectionMatrix * v_position;
}
"#;

// Cool/warm shading with a Blinn highlight, so untextured models read well.
pub const DEFAULT_SCENE_FRAG: &str = r#"#version 330 core
uniform vec3 u_light;
uniform vec3 u_camera;
in vec4 v_position;
in vec3 v_normal;
in vec2 v_texcoord;
out vec4 frag_color;
void main() {
    vec3 color = vec3(1.0);
    color.rg *= v_texcoord;
    vec3 l = normalize(u_light);
    vec3 n = normalize(v_normal);
    vec3 v = normalize(u_camera);
    vec3 h = normalize(l + v);
    float t = dot(n, l) * 0.5 + 0.5;
    float s = pow(max(0.0, dot(n, h)), 20.0);
    vec3 cool = vec3(0.0, 0.0, 0.3) + color * 0.255;
    vec3 warm = vec3(0.35, 0.25, 0.0) + color * 0.255;
    frag_color = vec4(mix(mix(cool, warm, t), vec3(1.0), s), 1.0);
}
"#;

/// Billboard placed in pixels: `u_scale` is the quad size, `u_translate`
/// its center, both under an orthographic projection.
pub const DYNAMIC_BILLBOARD_VERT: &str = r#"#version 330 core
uniform mat4 u_modelViewProjectionMatrix;
uniform vec2 u_translate;
uniform vec2 u_scale;
layout(location = 0) in vec2 a_position;
layout(location = 1) in vec2 a_texcoord;
out vec2 v_texcoord;
void main() {
    v_texcoord = a_texcoord;
    vec2 p = a_position * u_scale * 0.5 + u_translate;
    gl_Position = u_modelViewProjectionMatrix * vec4(p, 0.0, 1.0);
}
"#;

pub const DYNAMIC_BILLBOARD_FRAG: &str = r#"#version 330 core
uniform sampler2D u_tex0;
uniform float u_depth;
in vec2 v_texcoord;
out vec4 frag_color;
void main() {
    vec4 c = texture(u_tex0, v_texcoord);
    if (u_depth > 0.5) c = vec4(vec3(c.r), 1.0);
    frag_color = c;
}
"#;

pub const WIREFRAME2D_VERT: &str = r#"#version 330 core
uniform mat4 u_modelViewProjectionMatrix;
uniform vec2 u_translate;
layout(location = 0) in vec2 a_position;
void main() {
    gl_Position = u_modelViewProjectionMatrix * vec4(a_position + u_translate, 0.0, 1.0);
}
"#;

pub const WIREFRAME2D_FRAG: &str = r#"#version 330 core
uniform vec4 u_color;
out vec4 frag_color;
void main() {
    frag_color = u_color;
}
"#;

/// Draws the 256-bin frequency texture as stacked channel curves.
pub const HISTOGRAM_FRAG: &str = r#"#version 330 core
uniform sampler2D u_histogram;
in vec2 v_texcoord;
out vec4 frag_color;
void main() {
    vec4 freq = texture(u_histogram, vec2(v_texcoord.x, 0.5));
    vec3 rgb = step(vec3(v_texcoord.y), freq.rgb);
    float luma = step(v_texcoord.y, freq.a) * 0.35;
    float alpha = max(max(rgb.r, max(rgb.g, rgb.b)) * 0.65, luma);
    frag_color = vec4(rgb * 0.8 + vec3(luma), alpha);
}
"#;

/// Luma-based single-pass FXAA over the scene texture, used when the
/// fallback anti-aliasing filter is requested and the user source declares
/// no post-processing pass of its own.
pub const FXAA_FRAG: &str = r#"#version 330 core
uniform sampler2D u_scene;
uniform vec2 u_resolution;
in vec2 v_texcoord;
out vec4 frag_color;

float luma(vec3 c) { return dot(c, vec3(0.299, 0.587, 0.114)); }

void main() {
    vec2 px = 1.0 / u_resolution;
    vec3 rgb_nw = texture(u_scene, v_texcoord + vec2(-1.0, -1.0) * px).rgb;
    vec3 rgb_ne = texture(u_scene, v_texcoord + vec2( 1.0, -1.0) * px).rgb;
    vec3 rgb_sw = texture(u_scene, v_texcoord + vec2(-1.0,  1.0) * px).rgb;
    vec3 rgb_se = texture(u_scene, v_texcoord + vec2( 1.0,  1.0) * px).rgb;
    vec3 rgb_m  = texture(u_scene, v_texcoord).rgb;

    float l_nw = luma(rgb_nw);
    float l_ne = luma(rgb_ne);
    float l_sw = luma(rgb_sw);
    float l_se = luma(rgb_se);
    float l_m  = luma(rgb_m);
    float l_min = min(l_m, min(min(l_nw, l_ne), min(l_sw, l_se)));
    float l_max = max(l_m, max(max(l_nw, l_ne), max(l_sw, l_se)));

    vec2 dir = vec2(-((l_nw + l_ne) - (l_sw + l_se)), (l_nw + l_sw) - (l_ne + l_se));
    float dir_reduce = max((l_nw + l_ne + l_sw + l_se) * 0.03125, 0.0078125);
    float rcp = 1.0 / (min(abs(dir.x), abs(dir.y)) + dir_reduce);
    dir = clamp(dir * rcp, vec2(-8.0), vec2(8.0)) * px;

    vec3 rgb_a = 0.5 * (texture(u_scene, v_texcoord + dir * (1.0 / 3.0 - 0.5)).rgb
                      + texture(u_scene, v_texcoord + dir * (2.0 / 3.0 - 0.5)).rgb);
    vec3 rgb_b = rgb_a * 0.5 + 0.25 * (texture(u_scene, v_texcoord + dir * -0.5).rgb
                                     + texture(u_scene, v_texcoord + dir * 0.5).rgb);
    float l_b = luma(rgb_b);
    frag_color = vec4((l_b < l_min || l_b > l_max) ? rgb_a : rgb_b, 1.0);
}
"#;

pub const WIREFRAME3D_VERT: &str = r#"#version 330 core
uniform mat4 u_modelViewProjectionMatrix;
layout(location = 0) in vec3 a_position;
void main() {
    gl_Position = u_modelViewProjectionMatrix * vec4(a_position, 1.0);
}
"#;

pub const SHADOW_VERT: &str = r#"#version 330 core
uniform mat4 u_lightMatrix;
layout(location = 0) in vec3 a_position;
void main() {
    gl_Position = u_lightMatrix * vec4(a_position, 1.0);
}
"#;

pub const SHADOW_FRAG: &str = r#"#version 330 core
void main() {}
"#;

/// Skybox drawn as a full-screen quad; rays come from unprojecting NDC.
pub const CUBEMAP_VERT: &str = r#"#version 330 core
layout(location = 0) in vec2 a_position;
out vec2 v_ndc;
void main() {
    v_ndc = a_position;
    gl_Position = vec4(a_position, 0.999, 1.0);
}
"#;

pub const CUBEMAP_FRAG: &str = r#"#version 330 core
uniform samplerCube u_cubeMap;
uniform mat4 u_unprojection;
in vec2 v_ndc;
out vec4 frag_color;
void main() {
    vec4 d = u_unprojection * vec4(v_ndc, 1.0, 1.0);
    frag_color = vec4(texture(u_cubeMap, normalize(d.xyz / d.w)).rgb, 1.0);
}
"#;
