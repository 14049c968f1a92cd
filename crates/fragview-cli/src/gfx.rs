//! Thin wrappers over the GL objects the sandbox juggles: programs with
//! injected defines, framebuffers in the pixel layouts the render graph
//! needs, and the two tiny vertex batches (fullscreen billboard, cursor
//! cross) everything is drawn with.
//!
//! All GL calls stay on the render thread; nothing in here is shared.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::path::Path;

use glow::HasContext;

use fragview_engine::glsl;

use crate::loge;

unsafe fn try_compile_program(
    gl: &glow::Context,
    vert_src: &str,
    frag_src: &str,
) -> anyhow::Result<glow::NativeProgram> {
    let vs = gl
        .create_shader(glow::VERTEX_SHADER)
        .map_err(|e| anyhow::anyhow!("create vertex shader: {e}"))?;
    gl.shader_source(vs, vert_src);
    gl.compile_shader(vs);
    if !gl.get_shader_compile_status(vs) {
        let log = gl.get_shader_info_log(vs);
        gl.delete_shader(vs);
        return Err(anyhow::anyhow!("Vertex shader compile error:\n{log}"));
    }

    let fs = gl
        .create_shader(glow::FRAGMENT_SHADER)
        .map_err(|e| anyhow::anyhow!("create fragment shader: {e}"))?;
    gl.shader_source(fs, frag_src);
    gl.compile_shader(fs);
    if !gl.get_shader_compile_status(fs) {
        let log = gl.get_shader_info_log(fs);
        gl.delete_shader(vs);
        gl.delete_shader(fs);
        return Err(anyhow::anyhow!("Fragment shader compile error:\n{log}"));
    }

    let program = gl.create_program().map_err(|e| anyhow::anyhow!("create program: {e}"))?;
    gl.attach_shader(program, vs);
    gl.attach_shader(program, fs);
    gl.link_program(program);

    if !gl.get_program_link_status(program) {
        let log = gl.get_program_info_log(program);
        gl.detach_shader(program, vs);
        gl.detach_shader(program, fs);
        gl.delete_shader(vs);
        gl.delete_shader(fs);
        gl.delete_program(program);
        return Err(anyhow::anyhow!("Program link error:\n{log}"));
    }

    gl.detach_shader(program, vs);
    gl.detach_shader(program, fs);
    gl.delete_shader(vs);
    gl.delete_shader(fs);

    Ok(program)
}

/// A compiled program plus the define set injected into its sources.
///
/// `load` keeps the previous program alive when the new sources fail to
/// compile: the error goes to the log and the old visuals keep running.
pub struct Shader {
    program: Option<glow::NativeProgram>,
    defines: BTreeMap<String, String>,
    texture_unit: Cell<u32>,
}

impl Shader {
    pub fn new() -> Self {
        Self { program: None, defines: BTreeMap::new(), texture_unit: Cell::new(0) }
    }

    pub fn add_define(&mut self, name: &str, value: &str) {
        self.defines.insert(name.to_string(), value.to_string());
    }

    pub fn del_define(&mut self, name: &str) {
        self.defines.remove(name);
    }

    /// Replace this shader's define set with the sandbox's master set.
    /// Pass-specific defines (`BUFFER_<n>`, `POSTPROCESSING`) are re-added
    /// by the caller after syncing.
    pub fn sync_defines(&mut self, defines: &BTreeMap<String, String>) {
        self.defines = defines.clone();
    }

    pub fn load(&mut self, gl: &glow::Context, frag_src: &str, vert_src: &str, verbose: bool) -> bool {
        let frag = glsl::inject_defines(frag_src, &self.defines);
        let vert = glsl::inject_defines(vert_src, &self.defines);
        match unsafe { try_compile_program(gl, &vert, &frag) } {
            Ok(p) => {
                if let Some(old) = self.program.take() {
                    unsafe { gl.delete_program(old) };
                }
                self.program = Some(p);
                if verbose {
                    crate::logi!("SHADER", "program linked ({} defines)", self.defines.len());
                }
                true
            }
            Err(e) => {
                loge!("SHADER", "{e}");
                false
            }
        }
    }

    /// Bind the program and reset the texture unit counter for this draw.
    pub fn use_program(&self, gl: &glow::Context) {
        if let Some(p) = self.program {
            unsafe { gl.use_program(Some(p)) };
        }
        self.texture_unit.set(0);
    }

    fn location(&self, gl: &glow::Context, name: &str) -> Option<glow::NativeUniformLocation> {
        let p = self.program?;
        unsafe { gl.get_uniform_location(p, name) }
    }

    pub fn set_float(&self, gl: &glow::Context, name: &str, v: f32) {
        if let Some(loc) = self.location(gl, name) {
            unsafe { gl.uniform_1_f32(Some(&loc), v) };
        }
    }

    pub fn set_vec2(&self, gl: &glow::Context, name: &str, v: [f32; 2]) {
        if let Some(loc) = self.location(gl, name) {
            unsafe { gl.uniform_2_f32(Some(&loc), v[0], v[1]) };
        }
    }

    pub fn set_vec3(&self, gl: &glow::Context, name: &str, v: [f32; 3]) {
        if let Some(loc) = self.location(gl, name) {
            unsafe { gl.uniform_3_f32(Some(&loc), v[0], v[1], v[2]) };
        }
    }

    pub fn set_vec4(&self, gl: &glow::Context, name: &str, v: [f32; 4]) {
        if let Some(loc) = self.location(gl, name) {
            unsafe { gl.uniform_4_f32(Some(&loc), v[0], v[1], v[2], v[3]) };
        }
    }

    pub fn set_mat3(&self, gl: &glow::Context, name: &str, m: &glam::Mat3) {
        if let Some(loc) = self.location(gl, name) {
            unsafe { gl.uniform_matrix_3_f32_slice(Some(&loc), false, &m.to_cols_array()) };
        }
    }

    pub fn set_mat4(&self, gl: &glow::Context, name: &str, m: &glam::Mat4) {
        if let Some(loc) = self.location(gl, name) {
            unsafe { gl.uniform_matrix_4_f32_slice(Some(&loc), false, &m.to_cols_array()) };
        }
    }

    pub fn set_value(&self, gl: &glow::Context, name: &str, v: &fragview_engine::uniforms::UniformValue) {
        use fragview_engine::uniforms::UniformValue::*;
        match v {
            Float(x) => self.set_float(gl, name, *x),
            Vec2(x) => self.set_vec2(gl, name, *x),
            Vec3(x) => self.set_vec3(gl, name, *x),
            Vec4(x) => self.set_vec4(gl, name, *x),
        }
    }

    /// Bind `tex` to the next free texture unit and point `name` at it.
    pub fn set_texture(&self, gl: &glow::Context, name: &str, tex: glow::NativeTexture) {
        let unit = self.texture_unit.get();
        self.texture_unit.set(unit + 1);
        if let Some(loc) = self.location(gl, name) {
            unsafe {
                gl.active_texture(glow::TEXTURE0 + unit);
                gl.bind_texture(glow::TEXTURE_2D, Some(tex));
                gl.uniform_1_i32(Some(&loc), unit as i32);
            }
        }
    }

    pub fn set_cubemap_texture(&self, gl: &glow::Context, name: &str, tex: glow::NativeTexture) {
        let unit = self.texture_unit.get();
        self.texture_unit.set(unit + 1);
        if let Some(loc) = self.location(gl, name) {
            unsafe {
                gl.active_texture(glow::TEXTURE0 + unit);
                gl.bind_texture(glow::TEXTURE_CUBE_MAP, Some(tex));
                gl.uniform_1_i32(Some(&loc), unit as i32);
            }
        }
    }

    pub fn delete(&mut self, gl: &glow::Context) {
        if let Some(p) = self.program.take() {
            unsafe { gl.delete_program(p) };
        }
    }
}

/// Pixel layouts the reload engine reconciles framebuffers into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FboLayout {
    /// Color texture only (buffer ping-pong passes).
    ColorTexture,
    /// Color texture + depth renderbuffer (scene pass without depth sampling).
    ColorTextureDepthBuffer,
    /// Separate color and depth textures (scene pass sampled by `u_sceneDepth`).
    ColorDepthTextures,
    /// Depth texture only (shadow map).
    DepthTexture,
}

pub struct Fbo {
    fbo: Option<glow::NativeFramebuffer>,
    color: Option<glow::NativeTexture>,
    depth_tex: Option<glow::NativeTexture>,
    depth_rbo: Option<glow::NativeRenderbuffer>,
    layout: FboLayout,
    w: i32,
    h: i32,
}

impl Fbo {
    pub fn new() -> Self {
        Self {
            fbo: None,
            color: None,
            depth_tex: None,
            depth_rbo: None,
            layout: FboLayout::ColorTexture,
            w: 0,
            h: 0,
        }
    }

    pub fn is_allocated(&self) -> bool {
        self.fbo.is_some()
    }

    pub fn layout(&self) -> FboLayout {
        self.layout
    }

    pub fn size(&self) -> (i32, i32) {
        (self.w, self.h)
    }

    pub fn color_texture(&self) -> Option<glow::NativeTexture> {
        self.color
    }

    pub fn depth_texture(&self) -> Option<glow::NativeTexture> {
        self.depth_tex
    }

    /// (Re)create the attachments for `layout` at the given size. Any
    /// previous allocation is released first.
    pub fn allocate(&mut self, gl: &glow::Context, w: i32, h: i32, layout: FboLayout) {
        self.delete(gl);
        self.layout = layout;
        self.w = w.max(1);
        self.h = h.max(1);

        unsafe {
            let fbo = gl.create_framebuffer().expect("create_framebuffer failed");
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));

            if layout != FboLayout::DepthTexture {
                let tex = gl.create_texture().expect("create_texture failed");
                gl.bind_texture(glow::TEXTURE_2D, Some(tex));
                gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
                gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
                gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
                gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
                gl.tex_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    glow::RGBA as i32,
                    self.w,
                    self.h,
                    0,
                    glow::RGBA,
                    glow::UNSIGNED_BYTE,
                    glow::PixelUnpackData::Slice(None),
                );
                gl.bind_texture(glow::TEXTURE_2D, None);
                gl.framebuffer_texture_2d(
                    glow::FRAMEBUFFER,
                    glow::COLOR_ATTACHMENT0,
                    glow::TEXTURE_2D,
                    Some(tex),
                    0,
                );
                self.color = Some(tex);
            }

            match layout {
                FboLayout::ColorTexture => {}
                FboLayout::ColorTextureDepthBuffer => {
                    let rbo = gl.create_renderbuffer().expect("create_renderbuffer failed");
                    gl.bind_renderbuffer(glow::RENDERBUFFER, Some(rbo));
                    gl.renderbuffer_storage(glow::RENDERBUFFER, glow::DEPTH_COMPONENT24, self.w, self.h);
                    gl.bind_renderbuffer(glow::RENDERBUFFER, None);
                    gl.framebuffer_renderbuffer(
                        glow::FRAMEBUFFER,
                        glow::DEPTH_ATTACHMENT,
                        glow::RENDERBUFFER,
                        Some(rbo),
                    );
                    self.depth_rbo = Some(rbo);
                }
                FboLayout::ColorDepthTextures | FboLayout::DepthTexture => {
                    let tex = gl.create_texture().expect("create_texture failed");
                    gl.bind_texture(glow::TEXTURE_2D, Some(tex));
                    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::NEAREST as i32);
                    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::NEAREST as i32);
                    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
                    gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
                    gl.tex_image_2d(
                        glow::TEXTURE_2D,
                        0,
                        glow::DEPTH_COMPONENT24 as i32,
                        self.w,
                        self.h,
                        0,
                        glow::DEPTH_COMPONENT,
                        glow::UNSIGNED_INT,
                        glow::PixelUnpackData::Slice(None),
                    );
                    gl.bind_texture(glow::TEXTURE_2D, None);
                    gl.framebuffer_texture_2d(
                        glow::FRAMEBUFFER,
                        glow::DEPTH_ATTACHMENT,
                        glow::TEXTURE_2D,
                        Some(tex),
                        0,
                    );
                    self.depth_tex = Some(tex);
                    if layout == FboLayout::DepthTexture {
                        gl.draw_buffer(glow::NONE);
                        gl.read_buffer(glow::NONE);
                    }
                }
            }

            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            if status != glow::FRAMEBUFFER_COMPLETE {
                panic!("FBO incomplete: 0x{:x}", status);
            }
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            self.fbo = Some(fbo);
        }
    }

    pub fn bind(&self, gl: &glow::Context) {
        if let Some(fbo) = self.fbo {
            unsafe {
                gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
                gl.viewport(0, 0, self.w, self.h);
            }
        }
    }

    pub fn unbind(&self, gl: &glow::Context) {
        unsafe { gl.bind_framebuffer(glow::FRAMEBUFFER, None) };
    }

    /// Synchronous RGBA8 readback of the color attachment.
    pub fn read_pixels(&self, gl: &glow::Context) -> Vec<u8> {
        let mut buf = vec![0u8; (self.w.max(1) as usize) * (self.h.max(1) as usize) * 4];
        if let Some(fbo) = self.fbo {
            unsafe {
                gl.bind_framebuffer(glow::READ_FRAMEBUFFER, Some(fbo));
                gl.read_pixels(
                    0,
                    0,
                    self.w,
                    self.h,
                    glow::RGBA,
                    glow::UNSIGNED_BYTE,
                    glow::PixelPackData::Slice(Some(buf.as_mut_slice())),
                );
                gl.bind_framebuffer(glow::READ_FRAMEBUFFER, None);
            }
        }
        buf
    }

    pub fn delete(&mut self, gl: &glow::Context) {
        unsafe {
            if let Some(t) = self.color.take() {
                gl.delete_texture(t);
            }
            if let Some(t) = self.depth_tex.take() {
                gl.delete_texture(t);
            }
            if let Some(r) = self.depth_rbo.take() {
                gl.delete_renderbuffer(r);
            }
            if let Some(f) = self.fbo.take() {
                gl.delete_framebuffer(f);
            }
        }
    }
}

/// Unit quad (position + texcoord, triangle strip) used for every
/// full-screen and billboard draw.
pub struct Billboard {
    vao: glow::NativeVertexArray,
    vbo: glow::NativeBuffer,
}

impl Billboard {
    pub fn new(gl: &glow::Context) -> Self {
        // x, y, u, v
        let verts: [f32; 16] = [
            -1.0, -1.0, 0.0, 0.0, //
            1.0, -1.0, 1.0, 0.0, //
            -1.0, 1.0, 0.0, 1.0, //
            1.0, 1.0, 1.0, 1.0,
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
            gl.vertex_attrib_pointer_f32(0, 2, glow::FLOAT, false, 16, 0);
            gl.enable_vertex_attrib_array(1);
            gl.vertex_attrib_pointer_f32(1, 2, glow::FLOAT, false, 16, 8);
            gl.bind_vertex_array(None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            Self { vao, vbo }
        }
    }

    pub fn draw(&self, gl: &glow::Context) {
        unsafe {
            gl.bind_vertex_array(Some(self.vao));
            gl.draw_arrays(glow::TRIANGLE_STRIP, 0, 4);
            gl.bind_vertex_array(None);
        }
    }

    pub fn delete(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_vertex_array(self.vao);
            gl.delete_buffer(self.vbo);
        }
    }
}

/// Four line vertices forming the cursor crosshair, in pixels around the
/// origin; positioned per draw via `u_translate`.
pub struct CrossMarker {
    vao: glow::NativeVertexArray,
    vbo: glow::NativeBuffer,
}

impl CrossMarker {
    pub fn new(gl: &glow::Context, radius: f32) -> Self {
        let verts: [f32; 8] = [-radius, 0.0, radius, 0.0, 0.0, -radius, 0.0, radius];
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
            gl.vertex_attrib_pointer_f32(0, 2, glow::FLOAT, false, 8, 0);
            gl.bind_vertex_array(None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);
            Self { vao, vbo }
        }
    }

    pub fn draw(&self, gl: &glow::Context) {
        unsafe {
            gl.bind_vertex_array(Some(self.vao));
            gl.draw_arrays(glow::LINES, 0, 4);
            gl.bind_vertex_array(None);
        }
    }

    pub fn delete(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_vertex_array(self.vao);
            gl.delete_buffer(self.vbo);
        }
    }
}

/// Flip rows in place; GL readback is bottom-up.
pub fn vflip_inplace(buf: &mut [u8], w: i32, h: i32) {
    let w = w.max(1) as usize;
    let h = h.max(1) as usize;
    let row = w * 4;
    for y in 0..(h / 2) {
        let a0 = y * row;
        let b0 = (h - 1 - y) * row;
        for x in 0..row {
            buf.swap(a0 + x, b0 + x);
        }
    }
}

/// Encode an RGBA8 readback buffer as a PNG.
pub fn save_png(path: &Path, mut pixels: Vec<u8>, w: i32, h: i32) -> anyhow::Result<()> {
    vflip_inplace(&mut pixels, w, h);
    let img = image::RgbaImage::from_raw(w.max(1) as u32, h.max(1) as u32, pixels)
        .ok_or_else(|| anyhow::anyhow!("readback buffer size mismatch"))?;
    img.save(path)?;
    Ok(())
}
