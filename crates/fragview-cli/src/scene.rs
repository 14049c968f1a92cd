//! Scene collaborator: geometry mode.
//!
//! When a mesh is supplied on the command line the main pass renders it with
//! the user's material shaders instead of the flat billboard. The sandbox
//! talks to this module through a narrow contract — load geometry, load
//! shaders, render, shadow pass, change tracking — and feeds uniforms
//! through the same path as every other pass.

use std::path::Path;

use glam::{Mat4, Vec3};
use glow::HasContext;

use crate::defaults;
use crate::gfx::{Billboard, Fbo, FboLayout, Shader};
use crate::state::SceneControl;
use crate::textures::CubeMap;
use crate::logi;

const SHADOW_MAP_SIZE: i32 = 1024;

/// Interleaved vertex stream: position(3) normal(3) texcoord(2).
pub struct MeshData {
    pub vertices: Vec<f32>,
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 8
    }

    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }

    pub fn radius(&self) -> f32 {
        let dx = self.max[0] - self.min[0];
        let dy = self.max[1] - self.min[1];
        let dz = self.max[2] - self.min[2];
        0.5 * (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Parse a Wavefront OBJ into triangles. Polygon faces are fan-triangulated;
/// missing normals are synthesized flat per triangle.
pub fn parse_obj(src: &str) -> anyhow::Result<MeshData> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut texcoords: Vec<[f32; 2]> = Vec::new();
    // (position, texcoord, normal) index triples per face corner
    let mut corners: Vec<(usize, Option<usize>, Option<usize>)> = Vec::new();

    fn resolve(idx: i64, len: usize) -> usize {
        if idx < 0 {
            (len as i64 + idx) as usize
        } else {
            (idx - 1) as usize
        }
    }

    for line in src.lines() {
        let mut toks = line.split_whitespace();
        match toks.next() {
            Some("v") => {
                let mut p = [0.0f32; 3];
                for v in p.iter_mut() {
                    *v = toks.next().and_then(|t| t.parse().ok()).unwrap_or(0.0);
                }
                positions.push(p);
            }
            Some("vn") => {
                let mut n = [0.0f32; 3];
                for v in n.iter_mut() {
                    *v = toks.next().and_then(|t| t.parse().ok()).unwrap_or(0.0);
                }
                normals.push(n);
            }
            Some("vt") => {
                let u = toks.next().and_then(|t| t.parse().ok()).unwrap_or(0.0);
                let v = toks.next().and_then(|t| t.parse().ok()).unwrap_or(0.0);
                texcoords.push([u, v]);
            }
            Some("f") => {
                let face: Vec<(usize, Option<usize>, Option<usize>)> = toks
                    .filter_map(|t| {
                        let mut parts = t.split('/');
                        let p: i64 = parts.next()?.parse().ok()?;
                        let vt = parts.next().and_then(|s| s.parse::<i64>().ok());
                        let vn = parts.next().and_then(|s| s.parse::<i64>().ok());
                        Some((
                            resolve(p, positions.len()),
                            vt.map(|i| resolve(i, texcoords.len())),
                            vn.map(|i| resolve(i, normals.len())),
                        ))
                    })
                    .collect();
                for i in 1..face.len().saturating_sub(1) {
                    corners.push(face[0]);
                    corners.push(face[i]);
                    corners.push(face[i + 1]);
                }
            }
            _ => {}
        }
    }

    if corners.is_empty() {
        anyhow::bail!("no faces found");
    }

    let mut min = [f32::MAX; 3];
    let mut max = [f32::MIN; 3];
    let mut vertices = Vec::with_capacity(corners.len() * 8);

    for tri in corners.chunks_exact(3) {
        let p: Vec<[f32; 3]> = tri.iter().map(|c| positions[c.0]).collect();
        let flat = {
            let a = Vec3::from(p[1]) - Vec3::from(p[0]);
            let b = Vec3::from(p[2]) - Vec3::from(p[0]);
            a.cross(b).normalize_or_zero()
        };
        for (k, corner) in tri.iter().enumerate() {
            let pos = p[k];
            for (axis, v) in pos.iter().enumerate() {
                min[axis] = min[axis].min(*v);
                max[axis] = max[axis].max(*v);
            }
            let n = corner.2.and_then(|i| normals.get(i)).copied().unwrap_or(flat.into());
            let t = corner.1.and_then(|i| texcoords.get(i)).copied().unwrap_or([0.0, 0.0]);
            vertices.extend_from_slice(&pos);
            vertices.extend_from_slice(&n);
            vertices.extend_from_slice(&t);
        }
    }

    Ok(MeshData { vertices, min, max })
}

struct Mesh {
    vao: glow::NativeVertexArray,
    vbo: glow::NativeBuffer,
    vertex_count: i32,
}

impl Mesh {
    fn upload(gl: &glow::Context, data: &MeshData) -> Self {
        unsafe {
            let vao = gl.create_vertex_array().expect("create_vertex_array failed");
            let vbo = gl.create_buffer().expect("create_buffer failed");
            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                std::slice::from_raw_parts(
                    data.vertices.as_ptr() as *const u8,
                    data.vertices.len() * 4,
                ),
                glow::STATIC_DRAW,
            );
            let stride = 8 * 4;
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, stride, 0);
            gl.enable_vertex_attrib_array(1);
            gl.vertex_attrib_pointer_f32(1, 3, glow::FLOAT, false, stride, 12);
            gl.enable_vertex_attrib_array(2);
            gl.vertex_attrib_pointer_f32(2, 2, glow::FLOAT, false, stride, 24);
            gl.bind_vertex_array(None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            Self { vao, vbo, vertex_count: data.vertex_count() as i32 }
        }
    }

    fn draw(&self, gl: &glow::Context) {
        unsafe {
            gl.bind_vertex_array(Some(self.vao));
            gl.draw_arrays(glow::TRIANGLES, 0, self.vertex_count);
            gl.bind_vertex_array(None);
        }
    }

    fn delete(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_vertex_array(self.vao);
            gl.delete_buffer(self.vbo);
        }
    }
}

pub struct Camera {
    pub distance: f32,
    pub fov_deg: f32,
    position: Vec3,
    target: Vec3,
    viewport: (i32, i32),
}

impl Camera {
    fn new() -> Self {
        Self {
            distance: 3.0,
            fov_deg: 45.0,
            position: Vec3::new(0.0, 0.0, 3.0),
            target: Vec3::ZERO,
            viewport: (1, 1),
        }
    }

    pub fn set_viewport(&mut self, w: i32, h: i32) {
        self.viewport = (w.max(1), h.max(1));
    }

    pub fn orbit(&mut self, lat_deg: f32, lon_deg: f32, distance: f32) {
        self.distance = distance;
        let lat = lat_deg.to_radians();
        let lon = lon_deg.to_radians().clamp(-1.55, 1.55);
        self.position = self.target
            + distance * Vec3::new(lon.cos() * lat.sin(), lon.sin(), lon.cos() * lat.cos());
    }

    pub fn set_distance(&mut self, d: f32) {
        let dir = (self.position - self.target).normalize_or_zero();
        self.distance = d;
        self.position = self.target + dir * d;
    }

    pub fn set_position(&mut self, p: [f32; 3]) {
        self.position = Vec3::from(p);
        self.distance = (self.position - self.target).length();
    }

    pub fn position(&self) -> [f32; 3] {
        self.position.into()
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn projection(&self) -> Mat4 {
        let aspect = self.viewport.0 as f32 / self.viewport.1 as f32;
        Mat4::perspective_rh_gl(self.fov_deg.to_radians(), aspect, 0.01, 100.0)
    }
}

pub struct Light {
    pub position: Vec3,
    pub color: Vec3,
    pub shadow_map: Fbo,
}

impl Light {
    fn new() -> Self {
        Self {
            position: Vec3::new(1.0, 3.0, 1.0),
            color: Vec3::ONE,
            shadow_map: Fbo::new(),
        }
    }

    /// Light-space view-projection used for the shadow pass and for
    /// `u_lightMatrix` in material shaders.
    pub fn matrix(&self) -> Mat4 {
        let proj = Mat4::orthographic_rh_gl(-4.0, 4.0, -4.0, 4.0, 0.1, 20.0);
        let view = Mat4::look_at_rh(self.position, Vec3::ZERO, Vec3::Y);
        proj * view
    }
}

struct LineBatch {
    vao: glow::NativeVertexArray,
    vbo: glow::NativeBuffer,
}

impl LineBatch {
    fn axis(gl: &glow::Context, len: f32) -> Self {
        let verts: [f32; 18] = [
            0.0, 0.0, 0.0, len, 0.0, 0.0, //
            0.0, 0.0, 0.0, 0.0, len, 0.0, //
            0.0, 0.0, 0.0, 0.0, 0.0, len,
        ];
        unsafe {
            let vao = gl.create_vertex_array().expect("create_vertex_array failed");
            let vbo = gl.create_buffer().expect("create_buffer failed");
            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            gl.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                std::slice::from_raw_parts(verts.as_ptr() as *const u8, verts.len() * 4),
                glow::STATIC_DRAW,
            );
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(0, 3, glow::FLOAT, false, 12, 0);
            gl.bind_vertex_array(None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            Self { vao, vbo }
        }
    }

    fn draw_segment(&self, gl: &glow::Context, index: i32) {
        unsafe {
            gl.bind_vertex_array(Some(self.vao));
            gl.draw_arrays(glow::LINES, index * 2, 2);
            gl.bind_vertex_array(None);
        }
    }

    fn delete(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_vertex_array(self.vao);
            gl.delete_buffer(self.vbo);
        }
    }
}

pub struct Scene {
    mesh: Option<Mesh>,
    model: Mat4,
    shader: Shader,
    shadow_shader: Shader,
    cubemap_shader: Shader,
    axis_shader: Shader,
    axis: Option<LineBatch>,
    pub camera: Camera,
    pub light: Light,
    pub show_cubemap: bool,
    pub show_grid: bool,
    pub show_axis: bool,
    change: bool,
}

impl Scene {
    pub fn new(gl: &glow::Context) -> Self {
        let mut shadow_shader = Shader::new();
        shadow_shader.load(gl, defaults::SHADOW_FRAG, defaults::SHADOW_VERT, false);
        let mut cubemap_shader = Shader::new();
        cubemap_shader.load(gl, defaults::CUBEMAP_FRAG, defaults::CUBEMAP_VERT, false);
        let mut axis_shader = Shader::new();
        axis_shader.load(gl, defaults::WIREFRAME2D_FRAG, defaults::WIREFRAME3D_VERT, false);

        Self {
            mesh: None,
            model: Mat4::IDENTITY,
            shader: Shader::new(),
            shadow_shader,
            cubemap_shader,
            axis_shader,
            axis: None,
            camera: Camera::new(),
            light: Light::new(),
            show_cubemap: false,
            show_grid: false,
            show_axis: false,
            change: true,
        }
    }

    pub fn load_geometry(&mut self, gl: &glow::Context, path: &Path, verbose: bool) -> anyhow::Result<()> {
        let src = std::fs::read_to_string(path)?;
        let data = parse_obj(&src)?;

        // Center the model and frame it with the camera.
        let center = data.center();
        self.model = Mat4::from_translation(-Vec3::from(center));
        let r = data.radius().max(0.001);
        self.camera.set_distance(r * 3.0);

        if let Some(old) = self.mesh.take() {
            old.delete(gl);
        }
        let count = data.vertex_count();
        self.mesh = Some(Mesh::upload(gl, &data));

        if self.light.shadow_map.layout() != FboLayout::DepthTexture
            || !self.light.shadow_map.is_allocated()
        {
            self.light.shadow_map.allocate(gl, SHADOW_MAP_SIZE, SHADOW_MAP_SIZE, FboLayout::DepthTexture);
        }

        if verbose {
            logi!("SCENE", "loaded {} ({} vertices)", path.display(), count);
        }
        self.change = true;
        Ok(())
    }

    /// Compile the material shaders for the current sources. `shadow` turns
    /// on the shadow-sampling define so the vertex stage emits light coords.
    pub fn load_shaders(&mut self, gl: &glow::Context, frag: &str, vert: &str, shadow: bool, verbose: bool) -> bool {
        if shadow {
            self.shader.add_define("SHADOW_MAP", "");
        } else {
            self.shader.del_define("SHADOW_MAP");
        }
        let ok = self.shader.load(gl, frag, vert, verbose);
        self.change = true;
        ok
    }

    /// Adopt the sandbox's master define set (pass-specific defines are
    /// managed by `load_shaders`).
    pub fn sync_defines(&mut self, defines: &std::collections::BTreeMap<String, String>) {
        self.shader.sync_defines(defines);
    }

    /// Apply console-set camera/light parameters, then publish the current
    /// values back so queries report what the orbit controls did.
    pub fn sync_control(&mut self, ctl: &mut SceneControl) {
        if ctl.changed {
            self.camera.fov_deg = ctl.camera_fov;
            if let Some(p) = ctl.camera_position.take() {
                self.camera.set_position(p);
            } else if (ctl.camera_distance - self.camera.distance).abs() > f32::EPSILON {
                self.camera.set_distance(ctl.camera_distance);
            }
            self.light.position = Vec3::from(ctl.light_position);
            self.light.color = Vec3::from(ctl.light_color);
            ctl.changed = false;
            self.change = true;
        }
        ctl.camera_distance = self.camera.distance;
        ctl.camera_fov = self.camera.fov_deg;
        ctl.light_position = self.light.position.into();
        ctl.light_color = self.light.color.into();
    }

    pub fn render_shadow_map(&self, gl: &glow::Context) {
        let Some(mesh) = &self.mesh else { return };
        self.light.shadow_map.bind(gl);
        unsafe {
            gl.enable(glow::DEPTH_TEST);
            gl.clear(glow::DEPTH_BUFFER_BIT);
        }
        self.shadow_shader.use_program(gl);
        self.shadow_shader.set_mat4(gl, "u_lightMatrix", &(self.light.matrix() * self.model));
        mesh.draw(gl);
        self.light.shadow_map.unbind(gl);
    }

    pub fn render(
        &self,
        gl: &glow::Context,
        billboard: &Billboard,
        cubemap: Option<&CubeMap>,
        feed: impl Fn(&Shader),
    ) {
        let view = self.camera.view();
        let proj = self.camera.projection();

        if self.show_cubemap {
            if let Some(cm) = cubemap {
                // Strip the translation so the skybox stays at infinity.
                let rot = Mat4::from_mat3(glam::Mat3::from_mat4(view));
                unsafe { gl.depth_mask(false) };
                self.cubemap_shader.use_program(gl);
                self.cubemap_shader.set_mat4(gl, "u_unprojection", &(proj * rot).inverse());
                self.cubemap_shader.set_cubemap_texture(gl, "u_cubeMap", cm.id());
                billboard.draw(gl);
                unsafe { gl.depth_mask(true) };
            }
        }

        let Some(mesh) = &self.mesh else { return };

        unsafe { gl.enable(glow::DEPTH_TEST) };
        self.shader.use_program(gl);
        feed(&self.shader);

        let mvp = proj * view * self.model;
        self.shader.set_mat4(gl, "u_modelViewProjectionMatrix", &mvp);
        self.shader.set_mat4(gl, "u_modelMatrix", &self.model);
        self.shader.set_mat4(gl, "u_viewMatrix", &view);
        self.shader.set_mat4(gl, "u_projectionMatrix", &proj);
        self.shader.set_vec3(gl, "u_camera", self.camera.position());
        self.shader.set_vec3(gl, "u_light", self.light.position.into());
        self.shader.set_vec3(gl, "u_lightColor", self.light.color.into());
        self.shader.set_mat4(gl, "u_lightMatrix", &(self.light.matrix() * self.model));

        mesh.draw(gl);
        unsafe { gl.disable(glow::DEPTH_TEST) };
    }

    pub fn render_debug(&mut self, gl: &glow::Context) {
        if !self.show_axis && !self.show_grid {
            return;
        }
        if self.axis.is_none() {
            self.axis = Some(LineBatch::axis(gl, 1.0));
        }
        let Some(axis) = &self.axis else { return };

        let mvp = self.camera.projection() * self.camera.view();
        unsafe { gl.line_width(2.0) };
        self.axis_shader.use_program(gl);
        self.axis_shader.set_mat4(gl, "u_modelViewProjectionMatrix", &mvp);
        for (i, color) in [[1.0, 0.2, 0.2, 1.0], [0.2, 1.0, 0.2, 1.0], [0.2, 0.2, 1.0, 1.0]]
            .iter()
            .enumerate()
        {
            self.axis_shader.set_vec4(gl, "u_color", *color);
            axis.draw_segment(gl, i as i32);
        }
        unsafe { gl.line_width(1.0) };
    }

    pub fn have_change(&self) -> bool {
        self.change
    }

    pub fn flag_change(&mut self) {
        self.change = true;
    }

    pub fn unflag_change(&mut self) {
        self.change = false;
    }

    pub fn clear(&mut self, gl: &glow::Context) {
        if let Some(mesh) = self.mesh.take() {
            mesh.delete(gl);
        }
        if let Some(axis) = self.axis.take() {
            axis.delete(gl);
        }
        self.shader.delete(gl);
        self.shadow_shader.delete(gl);
        self.cubemap_shader.delete(gl);
        self.axis_shader.delete(gl);
        self.light.shadow_map.delete(gl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_triangles_with_normals_and_texcoords() {
        let src = "\
v 0 0 0
v 1 0 0
v 0 1 0
vn 0 0 1
vt 0 0
vt 1 0
vt 0 1
f 1/1/1 2/2/1 3/3/1
";
        let mesh = parse_obj(src).unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        // normal of the first vertex
        assert_eq!(&mesh.vertices[3..6], &[0.0, 0.0, 1.0]);
        assert_eq!(mesh.min, [0.0, 0.0, 0.0]);
        assert_eq!(mesh.max, [1.0, 1.0, 0.0]);
    }

    #[test]
    fn fan_triangulates_quads_and_synthesizes_normals() {
        let src = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
f 1 2 3 4
";
        let mesh = parse_obj(src).unwrap();
        assert_eq!(mesh.vertex_count(), 6);
        // Flat normal faces +Z for counter-clockwise winding.
        assert_eq!(&mesh.vertices[3..6], &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn rejects_sources_without_faces() {
        assert!(parse_obj("v 0 0 0\n").is_err());
    }

    #[test]
    fn negative_indices_resolve_from_the_end() {
        let src = "\
v 0 0 0
v 1 0 0
v 0 1 0
f -3 -2 -1
";
        let mesh = parse_obj(src).unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(&mesh.vertices[8..11], &[1.0, 0.0, 0.0]);
    }
}
