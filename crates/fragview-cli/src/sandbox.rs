//! The sandbox: reload/reconfigure engine plus per-frame orchestration.
//!
//! All GL-owning state lives here, on the render thread. The watcher and
//! console threads only publish intents (a changed-file index, queued
//! operations, a screenshot path); `frame` consumes them once per frame and
//! runs the reload engine synchronously before drawing resumes.
//!
//! Reload policy is last-known-good: an unreadable source aborts the whole
//! reload and leaves compiled programs and framebuffers untouched. A compile
//! failure keeps the previous program running too, but the dependency list,
//! uniform presence, and pass topology have already been refreshed for the
//! new source by then, so bookkeeping can describe a program that is not the
//! one on screen until the next successful compile.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::time::Instant;

use glam::{Mat3, Mat4, Vec2};
use glow::HasContext;

use fragview_engine::commands::{Command, CommandSet};
use fragview_engine::glsl;
use fragview_engine::uniforms::{Builtin, FrameSample};
use fragview_engine::watch::FileKind;

use crate::defaults;
use crate::gfx::{self, Billboard, CrossMarker, Fbo, FboLayout, Shader};
use crate::scene::Scene;
use crate::state::{EngineOp, RecordRequest, SharedState};
use crate::textures::{CubeMap, Texture};
use crate::{loge, logi, logw};

struct Clock {
    start: Instant,
    last: Instant,
    time: f32,
    delta: f32,
    fps: f32,
}

impl Clock {
    fn new() -> Self {
        let now = Instant::now();
        Self { start: now, last: now, time: 0.0, delta: 0.0, fps: 0.0 }
    }

    fn tick(&mut self) {
        let now = Instant::now();
        self.delta = (now - self.last).as_secs_f32();
        self.last = now;
        self.time = (now - self.start).as_secs_f32();
        if self.delta > 0.0 {
            self.fps = self.fps * 0.9 + 0.1 / self.delta;
        }
    }
}

struct RecordState {
    start: f32,
    end: f32,
    head: f32,
    fdelta: f32,
    counter: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Rendered,
    Skipped,
    Finished,
}

pub struct SandboxSettings {
    pub frag_index: Option<usize>,
    pub vert_index: Option<usize>,
    pub geom_index: Option<usize>,
    pub include_folders: Vec<PathBuf>,
    pub texture_bindings: Vec<(String, PathBuf, bool)>,
    pub cubemap: Option<(PathBuf, bool)>,
    pub verbose: bool,
    pub fxaa: bool,
    pub time_limit: Option<f32>,
    pub output_file: Option<PathBuf>,
    pub width: i32,
    pub height: i32,
    pub pixel_density: f32,
}

pub struct Sandbox {
    shared: SharedState,
    settings: SandboxSettings,

    frag_path: Option<PathBuf>,
    vert_path: Option<PathBuf>,
    frag_source: String,
    vert_source: String,
    frag_dependencies: Vec<PathBuf>,
    vert_dependencies: Vec<PathBuf>,
    defines: BTreeMap<String, String>,

    canvas_shader: Shader,
    buffer_shaders: Vec<Shader>,
    buffers: Vec<Fbo>,
    buffers_total: usize,
    postprocessing_shader: Shader,
    postprocessing: bool,
    post_label: Option<&'static str>,

    scene_fbo: Fbo,
    record_fbo: Fbo,

    billboard_shader: Shader,
    histogram_shader: Shader,
    wireframe_shader: Shader,
    billboard: Billboard,
    cross: CrossMarker,

    scene: Option<Scene>,
    textures: BTreeMap<String, Texture>,
    cubemap: Option<CubeMap>,

    view2d: Mat3,
    lat: f32,
    lon: f32,

    record: Option<RecordState>,
    histogram_texture: Option<Texture>,

    width: i32,
    height: i32,
    mouse: [f32; 2],

    clock: Clock,
    sample: FrameSample,
    change: bool,
    initialized: bool,
    frame: u64,
    time_limited: bool,
}

impl Sandbox {
    pub fn new(gl: &glow::Context, shared: SharedState, settings: SandboxSettings) -> Self {
        let mut billboard_shader = Shader::new();
        billboard_shader.load(gl, defaults::DYNAMIC_BILLBOARD_FRAG, defaults::DYNAMIC_BILLBOARD_VERT, false);
        let mut histogram_shader = Shader::new();
        histogram_shader.load(gl, defaults::HISTOGRAM_FRAG, defaults::DYNAMIC_BILLBOARD_VERT, false);
        let mut wireframe_shader = Shader::new();
        wireframe_shader.load(gl, defaults::WIREFRAME2D_FRAG, defaults::WIREFRAME2D_VERT, false);

        let width = settings.width;
        let height = settings.height;

        Self {
            shared,
            settings,
            frag_path: None,
            vert_path: None,
            frag_source: String::new(),
            vert_source: String::new(),
            frag_dependencies: Vec::new(),
            vert_dependencies: Vec::new(),
            defines: BTreeMap::new(),
            canvas_shader: Shader::new(),
            buffer_shaders: Vec::new(),
            buffers: Vec::new(),
            buffers_total: 0,
            postprocessing_shader: Shader::new(),
            postprocessing: false,
            post_label: None,
            scene_fbo: Fbo::new(),
            record_fbo: Fbo::new(),
            billboard_shader,
            histogram_shader,
            wireframe_shader,
            billboard: Billboard::new(gl),
            cross: CrossMarker::new(gl, 10.0),
            scene: None,
            textures: BTreeMap::new(),
            cubemap: None,
            view2d: Mat3::IDENTITY,
            lat: 180.0,
            lon: 0.0,
            record: None,
            histogram_texture: None,
            width,
            height,
            mouse: [0.0, 0.0],
            clock: Clock::new(),
            sample: FrameSample::default(),
            change: true,
            initialized: false,
            frame: 0,
            time_limited: false,
        }
    }

    pub fn setup(&mut self, gl: &glow::Context) {
        // Primary sources. Paths come from the registry entries cached at
        // startup; a read failure falls back to the built-in defaults.
        let (frag_path, vert_path, geom_path) = {
            let w = self.shared.watch.lock().unwrap();
            let path_of = |idx: Option<usize>| {
                idx.and_then(|i| w.registry.entry_at(i)).map(|e| e.path.clone())
            };
            (
                path_of(self.settings.frag_index),
                path_of(self.settings.vert_index),
                path_of(self.settings.geom_index),
            )
        };
        self.frag_path = frag_path;
        self.vert_path = vert_path;

        let scene_mode = self.settings.geom_index.is_some();

        self.vert_source = match &self.vert_path {
            Some(p) => {
                self.vert_dependencies.clear();
                match glsl::load_source(p, &self.settings.include_folders, &mut self.vert_dependencies) {
                    Ok(src) => src,
                    Err(e) => {
                        loge!("SETUP", "{e}");
                        default_vert(scene_mode).to_string()
                    }
                }
            }
            None => default_vert(scene_mode).to_string(),
        };

        self.frag_source = match &self.frag_path {
            Some(p) => {
                self.frag_dependencies.clear();
                match glsl::load_source(p, &self.settings.include_folders, &mut self.frag_dependencies) {
                    Ok(src) => src,
                    Err(e) => {
                        loge!("SETUP", "{e}");
                        default_frag(scene_mode).to_string()
                    }
                }
            }
            None => default_frag(scene_mode).to_string(),
        };

        // Textures and environment map.
        for (name, path, v_flip) in self.settings.texture_bindings.clone() {
            match Texture::load(gl, &path, v_flip) {
                Ok(t) => {
                    if self.settings.verbose {
                        logi!("SETUP", "texture {} <- {}", name, path.display());
                    }
                    self.textures.insert(name, t);
                }
                Err(e) => logw!("SETUP", "skipping texture {}: {e}", path.display()),
            }
        }
        if let Some((path, _)) = self.settings.cubemap.clone() {
            match CubeMap::load(gl, &path, true) {
                Ok(cm) => {
                    self.cubemap = Some(cm);
                    self.defines.insert("SCENE_CUBEMAP".to_string(), "u_cubeMap".to_string());
                }
                Err(e) => logw!("SETUP", "skipping cubemap {}: {e}", path.display()),
            }
        }

        // Geometry mode.
        if scene_mode {
            let mut scene = Scene::new(gl);
            if let Some(path) = &geom_path {
                if let Err(e) = scene.load_geometry(gl, path, self.settings.verbose) {
                    loge!("SETUP", "geometry {}: {e}", path.display());
                }
            }
            if let Some((_, visible)) = &self.settings.cubemap {
                scene.show_cubemap = *visible && self.cubemap.is_some();
            }
            scene.camera.set_viewport(self.width, self.height);
            self.scene = Some(scene);
        }

        {
            let mut c = self.shared.control.lock().unwrap();
            c.has_scene = scene_mode;
        }

        unsafe {
            gl.disable(glow::DEPTH_TEST);
            gl.front_face(glow::CCW);
            gl.enable(glow::BLEND);
            gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
            gl.clear_color(0.0, 0.0, 0.0, 0.0);
            gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }

        self.reload_shaders(gl);
        self.change = true;
    }

    /// The reload/reconfigure engine. Recompiles the program for the current
    /// mode, swaps the watched dependency set, recomputes uniform presence,
    /// and reconciles the buffer-pass and post-processing topology derived
    /// from the fragment source.
    pub fn reload_shaders(&mut self, gl: &glow::Context) -> bool {
        self.change = true;
        let verbose = self.settings.verbose;

        if self.scene.is_none() {
            if verbose {
                logi!("RELOAD", "reloading 2D shaders");
            }
            self.canvas_shader.sync_defines(&self.defines);
            self.canvas_shader.load(gl, &self.frag_source, &self.vert_source, verbose);
        } else {
            if verbose {
                logi!("RELOAD", "reloading 3D scene shaders");
            }
            let shadow = self.frag_source.contains("u_lightShadowMap")
                || self.vert_source.contains("u_lightShadowMap");
            if let Some(scene) = self.scene.as_mut() {
                scene.sync_defines(&self.defines);
                scene.load_shaders(gl, &self.frag_source, &self.vert_source, shadow, verbose);
            }
        }

        // Swap the watched dependency set for the freshly collected one.
        {
            let mut merged = self.frag_dependencies.clone();
            for d in &self.vert_dependencies {
                if !merged.contains(d) {
                    merged.push(d.clone());
                }
            }
            let mut w = self.shared.watch.lock().unwrap();
            w.registry.replace_dependencies(&merged);
            if verbose {
                for d in &merged {
                    logi!("WATCH", "watching dependency {}", d.display());
                }
            }
        }

        // Uniform liveness against the new sources.
        {
            let mut u = self.shared.uniforms.lock().unwrap();
            u.check_presence(&self.vert_source, &self.frag_source);
            u.flag_all_changed();
        }

        // Pass topology, derived from the fragment source text.
        let topology = glsl::derive_topology(&self.frag_source);
        self.buffers_total = topology.buffer_passes;
        self.update_buffers(gl);

        // Post-processing pass.
        if topology.postprocessing {
            self.postprocessing_shader.sync_defines(&self.defines);
            self.postprocessing_shader.add_define("POSTPROCESSING", "");
            self.postprocessing_shader.load(gl, &self.frag_source, defaults::BILLBOARD_VERT, false);
            self.postprocessing = true;
            self.post_label = Some("Custom");
        } else if self.settings.fxaa {
            self.postprocessing_shader.sync_defines(&self.defines);
            self.postprocessing_shader.load(gl, defaults::FXAA_FRAG, defaults::BILLBOARD_VERT, false);
            self.shared.uniforms.lock().unwrap().force_present("u_scene");
            self.postprocessing = true;
            self.post_label = Some("FXAA");
        } else {
            self.postprocessing = false;
            self.post_label = None;
        }

        // Scene framebuffer layout follows the depth-sampling requirement.
        let histogram = self.shared.control.lock().unwrap().histogram;
        if self.postprocessing || histogram {
            let layout = self.scene_fbo_layout();
            if !self.scene_fbo.is_allocated() || self.scene_fbo.layout() != layout {
                self.scene_fbo.allocate(gl, self.width, self.height, layout);
            }
        }

        self.snapshot_to_control();
        true
    }

    fn scene_fbo_layout(&self) -> FboLayout {
        if self.shared.uniforms.lock().unwrap().is_present("u_sceneDepth") {
            FboLayout::ColorDepthTextures
        } else {
            FboLayout::ColorTextureDepthBuffer
        }
    }

    /// Reconcile the buffer framebuffer/shader arrays with the derived pass
    /// count: a changed count discards and reallocates both arrays, an
    /// unchanged count only recompiles each pass in place.
    fn update_buffers(&mut self, gl: &glow::Context) {
        if self.buffers_total != self.buffers.len() {
            if self.settings.verbose {
                logi!(
                    "RELOAD",
                    "buffer passes {} -> {}",
                    self.buffers.len(),
                    self.buffers_total
                );
            }
            for mut f in self.buffers.drain(..) {
                f.delete(gl);
            }
            for mut s in self.buffer_shaders.drain(..) {
                s.delete(gl);
            }
            for i in 0..self.buffers_total {
                let mut fbo = Fbo::new();
                fbo.allocate(gl, self.width, self.height, FboLayout::ColorTexture);
                self.buffers.push(fbo);

                let mut shader = Shader::new();
                shader.sync_defines(&self.defines);
                shader.add_define(&format!("BUFFER_{}", i), "");
                shader.load(gl, &self.frag_source, defaults::BILLBOARD_VERT, false);
                self.buffer_shaders.push(shader);
            }
        } else {
            for (i, shader) in self.buffer_shaders.iter_mut().enumerate() {
                shader.sync_defines(&self.defines);
                shader.add_define(&format!("BUFFER_{}", i), "");
                shader.load(gl, &self.frag_source, defaults::BILLBOARD_VERT, false);
            }
        }
    }

    fn snapshot_to_control(&self) {
        let mut c = self.shared.control.lock().unwrap();
        c.frag_source = self.frag_source.clone();
        c.vert_source = self.vert_source.clone();
        c.frag_dependencies = self.frag_dependencies.clone();
        c.vert_dependencies = self.vert_dependencies.clone();
        c.defines = self.defines.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        c.buffer_names = (0..self.buffers_total).map(|i| format!("u_buffer{}", i)).collect();
        c.postprocessing = self.post_label;
        c.textures = self.textures.iter().map(|(n, t)| (n.clone(), t.path.clone())).collect();
    }

    /// React to one consumed watch-registry change. Dependency changes are
    /// re-routed to whichever primary stage included the file.
    pub fn on_file_change(&mut self, gl: &glow::Context, index: usize) {
        let entry = {
            let w = self.shared.watch.lock().unwrap();
            w.registry.entry_at(index).cloned()
        };
        let Some(entry) = entry else { return };

        let mut kind = entry.kind;
        let mut path = entry.path.clone();

        if kind == FileKind::Dependency {
            if self.frag_dependencies.contains(&path) {
                if let Some(p) = self.frag_path.clone() {
                    kind = FileKind::FragShader;
                    path = p;
                }
            } else if self.vert_dependencies.contains(&path) {
                if let Some(p) = self.vert_path.clone() {
                    kind = FileKind::VertShader;
                    path = p;
                }
            }
        }

        match kind {
            FileKind::FragShader => {
                let mut deps = Vec::new();
                match glsl::load_source(&path, &self.settings.include_folders, &mut deps) {
                    Ok(src) => {
                        self.frag_source = src;
                        self.frag_dependencies = deps;
                        self.reload_shaders(gl);
                    }
                    Err(e) => {
                        loge!("RELOAD", "{e} (keeping last good state)");
                        return;
                    }
                }
            }
            FileKind::VertShader => {
                let mut deps = Vec::new();
                match glsl::load_source(&path, &self.settings.include_folders, &mut deps) {
                    Ok(src) => {
                        self.vert_source = src;
                        self.vert_dependencies = deps;
                        self.reload_shaders(gl);
                    }
                    Err(e) => {
                        loge!("RELOAD", "{e} (keeping last good state)");
                        return;
                    }
                }
            }
            FileKind::Geometry => {
                if let Some(scene) = self.scene.as_mut() {
                    if let Err(e) = scene.load_geometry(gl, &path, self.settings.verbose) {
                        loge!("RELOAD", "geometry {}: {e}", path.display());
                    }
                }
            }
            FileKind::Image => {
                if let Some(tex) = self.textures.values_mut().find(|t| t.path == path) {
                    logi!("RELOAD", "texture {}", path.display());
                    if let Err(e) = tex.reload(gl) {
                        loge!("RELOAD", "texture {}: {e}", path.display());
                    }
                }
            }
            FileKind::Cubemap => {
                if let Some(cm) = &self.cubemap {
                    if let Err(e) = cm.reload(gl) {
                        loge!("RELOAD", "cubemap {}: {e}", path.display());
                    }
                }
            }
            FileKind::Dependency => {}
        }

        self.change = true;
    }

    fn drain_ops(&mut self, gl: &glow::Context) {
        let ops: Vec<EngineOp> = {
            let mut c = self.shared.control.lock().unwrap();
            std::mem::take(&mut c.pending)
        };
        if ops.is_empty() {
            return;
        }
        let mut recompile = false;
        for op in ops {
            match op {
                EngineOp::Define(name, value) => {
                    self.defines.insert(name, value);
                    recompile = true;
                }
                EngineOp::Undefine(name) => {
                    self.defines.remove(&name);
                    recompile = true;
                }
                EngineOp::UpdateAll => {
                    self.shared.uniforms.lock().unwrap().flag_all_changed();
                    self.change = true;
                }
            }
        }
        if recompile {
            self.reload_shaders(gl);
        }
    }

    fn have_change(&self) -> bool {
        if self.change || self.record.is_some() {
            return true;
        }
        {
            let c = self.shared.control.lock().unwrap();
            if c.screenshot_file.is_some() || c.record_request.is_some() {
                return true;
            }
        }
        if self.scene.as_ref().map(|s| s.have_change()).unwrap_or(false) {
            return true;
        }
        if self.scene.is_some() && self.shared.scene_ctl.lock().unwrap().changed {
            return true;
        }
        self.shared.uniforms.lock().unwrap().have_change()
    }

    fn update_sample(&mut self) {
        let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
        let day_seconds = now.hour() as f32 * 3600.0
            + now.minute() as f32 * 60.0
            + now.second() as f32
            + now.nanosecond() as f32 * 1e-9;
        let s = FrameSample {
            time: self.clock.time,
            delta: self.clock.delta,
            fps: self.clock.fps,
            frame: self.frame,
            date: [now.year() as f32, u8::from(now.month()) as f32, now.day() as f32, day_seconds],
            mouse: self.mouse,
            resolution: [self.width as f32, self.height as f32],
            pixel_density: self.settings.pixel_density,
        };
        self.sample = s;
        *self.shared.sample.lock().unwrap() = s;
    }

    /// One render-loop iteration: consume pending intents, decide whether to
    /// skip, draw, and finish bookkeeping.
    pub fn frame(&mut self, gl: &glow::Context) -> FrameOutcome {
        self.clock.tick();
        self.update_sample();

        // At most one pending file change is consumed per frame.
        let pending = { self.shared.watch.lock().unwrap().take_pending() };
        if let Some(index) = pending {
            self.on_file_change(gl, index);
        }

        self.drain_ops(gl);

        // Scene debug flags and camera/light edits from the console.
        if let Some(scene) = self.scene.as_mut() {
            {
                let c = self.shared.control.lock().unwrap();
                scene.show_grid = c.scene_debug;
                scene.show_axis = c.scene_debug;
            }
            let mut ctl = self.shared.scene_ctl.lock().unwrap();
            scene.sync_control(&mut ctl);
        }

        // A time limit forces one final frame so the exit screenshot can
        // complete before shutdown.
        if let Some(limit) = self.settings.time_limit {
            if !self.time_limited && self.clock.time >= limit {
                self.time_limited = true;
                self.shared.finish.store(true, Ordering::Relaxed);
                if let Some(out) = self.settings.output_file.clone() {
                    self.shared.control.lock().unwrap().screenshot_file = Some(out);
                }
            }
        }

        let record_request = self.shared.control.lock().unwrap().record_request.take();
        if let Some(req) = record_request {
            self.start_record(req);
        }

        let finish = self.shared.finish.load(Ordering::Relaxed);
        let full_fps = self.shared.full_fps.load(Ordering::Relaxed);
        if !finish && !full_fps && !self.have_change() {
            return FrameOutcome::Skipped;
        }

        self.render(gl);
        self.render_ui(gl);
        self.render_done(gl);

        let screenshot_pending = self.shared.control.lock().unwrap().screenshot_file.is_some();
        if finish && self.record.is_none() && !screenshot_pending {
            return FrameOutcome::Finished;
        }
        FrameOutcome::Rendered
    }

    fn start_record(&mut self, req: RecordRequest) {
        let mut start = req.start;
        if start >= req.end {
            start = 0.0;
        }
        let fps = if req.fps > 0.0 { req.fps } else { 24.0 };
        self.record = Some(RecordState {
            start,
            end: req.end,
            head: start,
            fdelta: 1.0 / fps,
            counter: 0,
        });
        self.shared.control.lock().unwrap().record_progress = 0;
    }

    fn bind_screen(&self, gl: &glow::Context) {
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            gl.viewport(0, 0, self.width, self.height);
        }
    }

    fn render(&mut self, gl: &glow::Context) {
        let (histogram, screenshot_pending) = {
            let c = self.shared.control.lock().unwrap();
            (c.histogram, c.screenshot_file.is_some())
        };
        let capture = self.record.is_some() || screenshot_pending;

        // Shadow pass first so material shaders can sample the map.
        if let Some(scene) = &self.scene {
            if self.shared.uniforms.lock().unwrap().is_present("u_lightShadowMap") {
                scene.render_shadow_map(gl);
            }
        }

        if !self.buffers.is_empty() {
            self.render_buffers(gl);
        }

        if capture && !self.record_fbo.is_allocated() {
            self.record_fbo.allocate(gl, self.width, self.height, FboLayout::ColorTextureDepthBuffer);
        }

        if self.postprocessing || histogram {
            if !self.scene_fbo.is_allocated() {
                let layout = self.scene_fbo_layout();
                self.scene_fbo.allocate(gl, self.width, self.height, layout);
            }
            self.scene_fbo.bind(gl);
        } else if capture {
            self.record_fbo.bind(gl);
        } else {
            self.bind_screen(gl);
        }

        unsafe {
            gl.clear_color(0.0, 0.0, 0.0, 0.0);
            gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }

        if let Some(scene) = &self.scene {
            scene.render(gl, &self.billboard, self.cubemap.as_ref(), |sh| self.feed_shader(gl, sh));
        } else {
            self.canvas_shader.use_program(gl);
            self.feed_shader(gl, &self.canvas_shader);
            self.canvas_shader.set_mat4(gl, "u_modelViewProjectionMatrix", &Mat4::IDENTITY);
            self.billboard.draw(gl);
        }
        if let Some(scene) = self.scene.as_mut() {
            scene.render_debug(gl);
        }

        if self.postprocessing {
            self.scene_fbo.unbind(gl);
            if capture {
                self.record_fbo.bind(gl);
            } else {
                self.bind_screen(gl);
            }

            self.postprocessing_shader.use_program(gl);
            self.feed_shader(gl, &self.postprocessing_shader);
            for (i, b) in self.buffers.iter().enumerate() {
                if let Some(t) = b.color_texture() {
                    self.postprocessing_shader.set_texture(gl, &format!("u_buffer{}", i), t);
                }
            }
            self.postprocessing_shader.set_mat4(gl, "u_modelViewProjectionMatrix", &Mat4::IDENTITY);
            self.billboard.draw(gl);
        } else if histogram {
            self.scene_fbo.unbind(gl);
            if capture {
                self.record_fbo.bind(gl);
            } else {
                self.bind_screen(gl);
            }
            if let Some(t) = self.scene_fbo.color_texture() {
                self.draw_tile(gl, t, 0.0, self.width as f32, self.height as f32,
                    self.width as f32 * 0.5, self.height as f32 * 0.5);
            }
        }

        if capture {
            self.record_fbo.unbind(gl);
            self.bind_screen(gl);
            if let Some(t) = self.record_fbo.color_texture() {
                self.draw_tile(gl, t, 0.0, self.width as f32, self.height as f32,
                    self.width as f32 * 0.5, self.height as f32 * 0.5);
            }
        }
    }

    fn render_buffers(&self, gl: &glow::Context) {
        unsafe { gl.disable(glow::BLEND) };
        for i in 0..self.buffers.len() {
            self.buffers[i].bind(gl);
            let shader = &self.buffer_shaders[i];
            shader.use_program(gl);
            self.feed_shader(gl, shader);
            for (j, other) in self.buffers.iter().enumerate() {
                if i != j {
                    if let Some(t) = other.color_texture() {
                        shader.set_texture(gl, &format!("u_buffer{}", j), t);
                    }
                }
            }
            shader.set_mat4(gl, "u_modelViewProjectionMatrix", &Mat4::IDENTITY);
            self.billboard.draw(gl);
            self.buffers[i].unbind(gl);
        }
        unsafe {
            gl.enable(glow::BLEND);
            gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
        }
    }

    /// Bind every present uniform function and all user data uniforms into
    /// the given program, then the named textures and the environment map.
    fn feed_shader(&self, gl: &glow::Context, shader: &Shader) {
        {
            let u = self.shared.uniforms.lock().unwrap();
            for (name, f) in u.functions() {
                if !f.present {
                    continue;
                }
                match f.builtin {
                    Builtin::Time => {
                        let t = self.record.as_ref().map(|r| r.head).unwrap_or(self.clock.time);
                        shader.set_float(gl, name, t);
                    }
                    Builtin::Delta => {
                        let d = self.record.as_ref().map(|r| r.fdelta).unwrap_or(self.clock.delta);
                        shader.set_float(gl, name, d);
                    }
                    Builtin::Date => shader.set_vec4(gl, name, self.sample.date),
                    Builtin::Mouse => shader.set_vec2(gl, name, self.mouse),
                    Builtin::Resolution => {
                        shader.set_vec2(gl, name, [self.width as f32, self.height as f32]);
                    }
                    Builtin::SceneTexture => {
                        if self.postprocessing {
                            if let Some(t) = self.scene_fbo.color_texture() {
                                shader.set_texture(gl, name, t);
                            }
                        }
                    }
                    Builtin::SceneDepth => {
                        if self.postprocessing {
                            if let Some(t) = self.scene_fbo.depth_texture() {
                                shader.set_texture(gl, name, t);
                            }
                        }
                    }
                    Builtin::LightShadowMap => {
                        if let Some(scene) = &self.scene {
                            if let Some(t) = scene.light.shadow_map.depth_texture() {
                                shader.set_texture(gl, name, t);
                            }
                        }
                    }
                    Builtin::View2d => shader.set_mat3(gl, name, &self.view2d),
                    Builtin::ModelViewProjection => {}
                }
            }
            for (name, d) in u.data() {
                shader.set_value(gl, name, &d.value);
            }
        }

        for (name, tex) in &self.textures {
            shader.set_texture(gl, name, tex.id());
            shader.set_vec2(
                gl,
                &format!("{}Resolution", name),
                [tex.width as f32, tex.height as f32],
            );
        }
        if let Some(ht) = &self.histogram_texture {
            shader.set_texture(gl, "u_histogram", ht.id());
        }
        if let Some(cm) = &self.cubemap {
            shader.set_cubemap_texture(gl, "u_cubeMap", cm.id());
        }
    }

    /// Draw a texture as a screen-space tile (pixel units, ortho projection).
    fn draw_tile(&self, gl: &glow::Context, tex: glow::NativeTexture, depth: f32, w: f32, h: f32, cx: f32, cy: f32) {
        let ortho = Mat4::orthographic_rh_gl(0.0, self.width as f32, 0.0, self.height as f32, -1.0, 1.0);
        self.billboard_shader.use_program(gl);
        self.billboard_shader.set_float(gl, "u_depth", depth);
        self.billboard_shader.set_vec2(gl, "u_scale", [w, h]);
        self.billboard_shader.set_vec2(gl, "u_translate", [cx, cy]);
        self.billboard_shader.set_mat4(gl, "u_modelViewProjectionMatrix", &ortho);
        self.billboard_shader.set_texture(gl, "u_tex0", tex);
        self.billboard.draw(gl);
    }

    fn render_ui(&mut self, gl: &glow::Context) {
        let (show_passes, show_textures, histogram, cursor) = {
            let c = self.shared.control.lock().unwrap();
            (c.show_passes, c.show_textures, c.histogram, c.cursor)
        };
        let w = self.width as f32;
        let h = self.height as f32;

        if show_passes {
            // Small tiles down the left edge: buffer passes, then the scene
            // color/depth attachments, then the shadow map.
            let mut tiles: Vec<(glow::NativeTexture, f32)> = Vec::new();
            for b in &self.buffers {
                if let Some(t) = b.color_texture() {
                    tiles.push((t, 0.0));
                }
            }
            {
                let u = self.shared.uniforms.lock().unwrap();
                if self.postprocessing {
                    if u.is_present("u_scene") {
                        if let Some(t) = self.scene_fbo.color_texture() {
                            tiles.push((t, 0.0));
                        }
                    }
                    if u.is_present("u_sceneDepth") {
                        if let Some(t) = self.scene_fbo.depth_texture() {
                            tiles.push((t, 1.0));
                        }
                    }
                }
                if u.is_present("u_lightShadowMap") {
                    if let Some(scene) = &self.scene {
                        if let Some(t) = scene.light.shadow_map.depth_texture() {
                            tiles.push((t, 1.0));
                        }
                    }
                }
            }

            if !tiles.is_empty() {
                let scale = (1.0 / tiles.len() as f32).min(0.25) * 0.5;
                let x_step = w * scale;
                let y_step = h * scale;
                let mut y = h - y_step;
                for (tex, depth) in tiles {
                    self.draw_tile(gl, tex, depth, x_step, y_step, x_step, y);
                    y -= y_step * 2.0;
                }
            }
        }

        if histogram && self.histogram_texture.is_some() {
            let ortho = Mat4::orthographic_rh_gl(0.0, w, 0.0, h, -1.0, 1.0);
            let ht = self.histogram_texture.as_ref().unwrap();
            self.histogram_shader.use_program(gl);
            self.histogram_shader.set_vec2(gl, "u_scale", [200.0, 100.0]);
            self.histogram_shader.set_vec2(gl, "u_translate", [w * 0.5, 60.0]);
            self.histogram_shader.set_mat4(gl, "u_modelViewProjectionMatrix", &ortho);
            self.histogram_shader.set_texture(gl, "u_histogram", ht.id());
            self.billboard.draw(gl);
        }

        if show_textures && !self.textures.is_empty() {
            let scale = (1.0 / self.textures.len() as f32).min(0.25) * 0.5;
            let x_step = h * scale;
            let y_step = h * scale;
            let mut y = h - y_step;
            for tex in self.textures.values() {
                self.draw_tile(gl, tex.id(), 0.0, x_step, y_step, w - x_step, y);
                y -= y_step * 2.0;
            }
        }

        if cursor {
            let ortho = Mat4::orthographic_rh_gl(0.0, w, 0.0, h, -1.0, 1.0);
            unsafe { gl.line_width(2.0) };
            self.wireframe_shader.use_program(gl);
            self.wireframe_shader.set_vec4(gl, "u_color", [1.0, 1.0, 1.0, 1.0]);
            self.wireframe_shader.set_vec2(gl, "u_translate", self.mouse);
            self.wireframe_shader.set_mat4(gl, "u_modelViewProjectionMatrix", &ortho);
            self.cross.draw(gl);
            unsafe { gl.line_width(1.0) };
        }
    }

    fn render_done(&mut self, gl: &glow::Context) {
        if self.record.is_some() {
            let (path, done, pct) = {
                let rec = self.record.as_mut().unwrap();
                let path = PathBuf::from(format!("{:05}.png", rec.counter));
                rec.head += rec.fdelta;
                rec.counter += 1;
                let span = (rec.end - rec.start).max(f32::EPSILON);
                let pct = (((rec.head - rec.start) / span) * 100.0) as i32;
                (path, rec.head >= rec.end, pct)
            };
            self.save_frame(gl, &path, true);
            self.shared.control.lock().unwrap().record_progress =
                if done { 100 } else { pct.clamp(0, 99) };
            if done {
                self.record = None;
            }
        } else {
            let shot = {
                let mut c = self.shared.control.lock().unwrap();
                if self.record_fbo.is_allocated() { c.screenshot_file.take() } else { None }
            };
            if let Some(path) = shot {
                self.save_frame(gl, &path, false);
            }
        }

        let histogram = self.shared.control.lock().unwrap().histogram;
        if histogram {
            self.update_histogram(gl);
        }

        self.frame += 1;
        self.unflag_change();

        if !self.initialized {
            self.initialized = true;
            self.shared.ready.store(true, Ordering::Relaxed);
            self.change = true;
        }
    }

    fn unflag_change(&mut self) {
        self.change = false;
        if let Some(scene) = self.scene.as_mut() {
            scene.unflag_change();
        }
        self.shared.uniforms.lock().unwrap().unflag_change();
    }

    fn save_frame(&self, gl: &glow::Context, path: &Path, recording: bool) {
        let (w, h) = self.record_fbo.size();
        let pixels = self.record_fbo.read_pixels(gl);
        match gfx::save_png(path, pixels, w, h) {
            Ok(()) => {
                if !recording {
                    println!("// Screenshot saved to {}", path.display());
                    crate::console::prompt();
                }
            }
            Err(e) => loge!("CAPTURE", "{}: {e}", path.display()),
        }
    }

    /// CPU histogram of the scene framebuffer: 256 bins per channel plus a
    /// luma channel, normalized, uploaded as a 256x1 float texture.
    fn update_histogram(&mut self, gl: &glow::Context) {
        if !self.scene_fbo.is_allocated() {
            return;
        }
        let pixels = self.scene_fbo.read_pixels(gl);
        let mut freqs = [[0f32; 4]; 256];
        let mut max_rgb = 0f32;
        let mut max_luma = 0f32;
        for px in pixels.chunks_exact(4) {
            for ch in 0..3 {
                let f = &mut freqs[px[ch] as usize][ch];
                *f += 1.0;
                if *f > max_rgb {
                    max_rgb = *f;
                }
            }
            let luma = (0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32) as usize;
            let f = &mut freqs[luma.min(255)][3];
            *f += 1.0;
            if *f > max_luma {
                max_luma = *f;
            }
        }

        let mut data = Vec::with_capacity(256 * 4);
        for f in &freqs {
            data.push(f[0] / max_rgb.max(1.0));
            data.push(f[1] / max_rgb.max(1.0));
            data.push(f[2] / max_rgb.max(1.0));
            data.push(f[3] / max_luma.max(1.0));
        }

        if let Some(t) = self.histogram_texture.as_mut() {
            t.update_rgba32f(gl, &data);
        } else {
            self.histogram_texture = Some(Texture::from_rgba32f(gl, 256, 1, &data));
        }
    }

    pub fn on_viewport_resize(&mut self, gl: &glow::Context, width: i32, height: i32) {
        if width == self.width && height == self.height {
            return;
        }
        self.width = width.max(1);
        self.height = height.max(1);

        for b in &mut self.buffers {
            b.allocate(gl, self.width, self.height, FboLayout::ColorTexture);
        }
        if self.scene_fbo.is_allocated() {
            let layout = self.scene_fbo.layout();
            self.scene_fbo.allocate(gl, self.width, self.height, layout);
        }
        if self.record_fbo.is_allocated() {
            self.record_fbo.allocate(gl, self.width, self.height, FboLayout::ColorTextureDepthBuffer);
        }
        if let Some(scene) = self.scene.as_mut() {
            scene.camera.set_viewport(self.width, self.height);
            scene.flag_change();
        }
        self.change = true;
    }

    pub fn set_pixel_density(&mut self, density: f32) {
        self.settings.pixel_density = density;
    }

    pub fn set_mouse(&mut self, x: f32, y: f32) {
        self.mouse = [x, y];
    }

    /// Vertical scroll zooms the 2D view; four clicks double the scale.
    pub fn on_scroll(&mut self, y_offset: f32) {
        if y_offset == 0.0 {
            return;
        }
        let z = 1.1892f32.powf(y_offset);
        let origin = Vec2::new(self.width as f32 * 0.5, self.height as f32 * 0.5);
        self.view2d = self.view2d
            * Mat3::from_translation(origin)
            * Mat3::from_scale(Vec2::splat(z))
            * Mat3::from_translation(-origin);
        self.change = true;
    }

    pub fn on_mouse_drag(&mut self, vel_x: f32, vel_y: f32, button: u32) {
        if button == 1 {
            // Left drag pans the 2D view and orbits the 3D camera.
            self.view2d = self.view2d * Mat3::from_translation(-Vec2::new(vel_x, vel_y));
            if let Some(scene) = self.scene.as_mut() {
                if vel_x.abs() < 50.0 && vel_y.abs() < 50.0 {
                    self.lat -= vel_x;
                    self.lon -= vel_y * 0.5;
                    let dist = scene.camera.distance;
                    scene.camera.orbit(self.lat, self.lon, dist);
                    scene.flag_change();
                }
            }
        } else if let Some(scene) = self.scene.as_mut() {
            // Right drag zooms the 3D camera.
            let dist = scene.camera.distance - 0.008 * vel_y;
            if dist > 0.0 {
                scene.camera.set_distance(dist);
                scene.flag_change();
            }
        }
        self.change = true;
    }

    /// Ordered teardown: the caller blanks the context first, this releases
    /// every sandbox-owned GL object, then the context itself closes.
    pub fn clear(&mut self, gl: &glow::Context) {
        self.canvas_shader.delete(gl);
        for mut s in self.buffer_shaders.drain(..) {
            s.delete(gl);
        }
        for mut b in self.buffers.drain(..) {
            b.delete(gl);
        }
        self.postprocessing_shader.delete(gl);
        self.billboard_shader.delete(gl);
        self.histogram_shader.delete(gl);
        self.wireframe_shader.delete(gl);
        self.scene_fbo.delete(gl);
        self.record_fbo.delete(gl);
        for (_, t) in std::mem::take(&mut self.textures) {
            t.delete(gl);
        }
        if let Some(cm) = self.cubemap.take() {
            cm.delete(gl);
        }
        if let Some(ht) = self.histogram_texture.take() {
            ht.delete(gl);
        }
        if let Some(mut scene) = self.scene.take() {
            scene.clear(gl);
        }
        self.billboard.delete(gl);
        self.cross.delete(gl);
    }
}

fn default_frag(scene_mode: bool) -> &'static str {
    if scene_mode { defaults::DEFAULT_SCENE_FRAG } else { defaults::DEFAULT_FRAG }
}

fn default_vert(scene_mode: bool) -> &'static str {
    if scene_mode { defaults::DEFAULT_SCENE_VERT } else { defaults::DEFAULT_VERT }
}

fn on_off(v: bool) -> &'static str {
    if v { "on" } else { "off" }
}

/// `frag`/`vert` console command body: print, extract lines, or save.
fn source_command(line: &str, token: &str, source: &str) -> bool {
    if line == token {
        println!("{}", source);
        return true;
    }
    let values: Vec<&str> = line.split(',').collect();
    // A longer first token (`frag_scale,1`) is somebody's uniform, not ours.
    if values[0] != token {
        return false;
    }
    if values.len() == 2 {
        if let Ok(n) = values[1].parse::<usize>() {
            if let Some(l) = source.lines().nth(n.saturating_sub(1)) {
                println!("{} {}", n, l);
            }
        } else if let Err(e) = std::fs::write(values[1], source) {
            loge!("CONSOLE", "write {}: {e}", values[1]);
        }
        return true;
    }
    if values.len() > 2 {
        for v in &values[1..] {
            if let Ok(n) = v.parse::<usize>() {
                if let Some(l) = source.lines().nth(n.saturating_sub(1)) {
                    println!("{} {}", n, l);
                }
            }
        }
    }
    false
}

/// Sandbox-scope console commands. Handlers run on the console (or OSC)
/// thread and only touch the shared handles; anything that needs the GL
/// context is queued as an `EngineOp` for the render thread.
pub fn declare_commands(set: &mut CommandSet, shared: &SharedState) {
    let s = shared.clone();
    set.push(Command::new(
        "frag",
        "frag[,<filename>|<line_nr>]    print or save the fragment shader source.",
        false,
        move |line| {
            let src = s.control.lock().unwrap().frag_source.clone();
            source_command(line, "frag", &src)
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "vert",
        "vert[,<filename>|<line_nr>]    print or save the vertex shader source.",
        false,
        move |line| {
            let src = s.control.lock().unwrap().vert_source.clone();
            source_command(line, "vert", &src)
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "dependencies",
        "dependencies[,vert|frag]       print the dependencies of one or both shaders.",
        false,
        move |line| match line {
            "dependencies" => {
                let w = s.watch.lock().unwrap();
                for e in w.registry.entries() {
                    if e.kind == FileKind::Dependency {
                        println!("{}", e.path.display());
                    }
                }
                true
            }
            "dependencies,frag" => {
                for d in &s.control.lock().unwrap().frag_dependencies {
                    println!("{}", d.display());
                }
                true
            }
            "dependencies,vert" => {
                for d in &s.control.lock().unwrap().vert_dependencies {
                    println!("{}", d.display());
                }
                true
            }
            _ => false,
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "uniforms",
        "uniforms[,all|active]          print all or active uniforms and their values.",
        false,
        move |line| {
            if line != "uniforms" && !line.starts_with("uniforms,") {
                return false;
            }
            let all = line == "uniforms,all";
            let sample = *s.sample.lock().unwrap();
            for l in s.uniforms.lock().unwrap().dump(&sample, all) {
                println!("{}", l);
            }
            true
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "textures",
        "textures[,on|off]              print the textures or toggle their overlay.",
        false,
        move |line| {
            if line == "textures" {
                for (name, path) in &s.control.lock().unwrap().textures {
                    println!("{},{}", name, path.display());
                }
                return true;
            }
            if let Some(v) = line.strip_prefix("textures,") {
                s.control.lock().unwrap().show_textures = v == "on";
            }
            false
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "buffers",
        "buffers[,on|off]               print the buffer passes or toggle their overlay.",
        false,
        move |line| {
            if line == "buffers" {
                let c = s.control.lock().unwrap();
                for name in &c.buffer_names {
                    println!("{}", name);
                }
                if let Some(label) = c.postprocessing {
                    println!("{} postProcessing pass", label);
                }
                return true;
            }
            if let Some(v) = line.strip_prefix("buffers,") {
                s.control.lock().unwrap().show_passes = v == "on";
            }
            false
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "defines",
        "defines                        print the active defines.",
        false,
        move |line| {
            if line != "defines" {
                return false;
            }
            for (name, value) in &s.control.lock().unwrap().defines {
                if value.is_empty() {
                    println!("{}", name);
                } else {
                    println!("{} {}", name, value);
                }
            }
            true
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "define,",
        "define,<KEYWORD>[,<value>]     add a define to every pass and recompile.",
        false,
        move |line| {
            let values: Vec<&str> = line.split(',').collect();
            let (name, value) = match values.as_slice() {
                [_, kv] => match kv.split_once(' ') {
                    Some((k, v)) => (k.to_string(), v.to_string()),
                    None => (kv.to_string(), String::new()),
                },
                [_, k, v] => (k.to_string(), v.to_string()),
                _ => return false,
            };
            if name.is_empty() {
                return false;
            }
            s.control.lock().unwrap().pending.push(EngineOp::Define(name, value));
            true
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "undefine,",
        "undefine,<KEYWORD>             remove a define and recompile.",
        false,
        move |line| {
            let values: Vec<&str> = line.split(',').collect();
            if let [_, name] = values.as_slice() {
                if !name.is_empty() {
                    s.control.lock().unwrap().pending.push(EngineOp::Undefine(name.to_string()));
                    return true;
                }
            }
            false
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "update",
        "update                         force all uniforms to re-upload.",
        false,
        move |line| {
            if line == "update" {
                s.control.lock().unwrap().pending.push(EngineOp::UpdateAll);
            }
            false
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "debug,",
        "debug[,on|off]                 toggle passes/textures overlays and scene helpers.",
        false,
        move |line| {
            if let Some(v) = line.strip_prefix("debug,") {
                let on = v == "on";
                let mut c = s.control.lock().unwrap();
                c.show_passes = on;
                c.show_textures = on;
                c.histogram = on;
                c.scene_debug = on;
                if c.has_scene {
                    c.pending.push(if on {
                        EngineOp::Define("DEBUG".to_string(), String::new())
                    } else {
                        EngineOp::Undefine("DEBUG".to_string())
                    });
                }
            }
            false
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "debug",
        "debug                          print the debug toggles.",
        false,
        move |line| {
            if line != "debug" {
                return false;
            }
            let c = s.control.lock().unwrap();
            println!("buffers,{}", on_off(c.show_passes));
            println!("textures,{}", on_off(c.show_textures));
            if c.has_scene {
                println!("grid,{}", on_off(c.scene_debug));
                println!("axis,{}", on_off(c.scene_debug));
            }
            true
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "histogram",
        "histogram[,on|off]             show/hide the histogram overlay.",
        false,
        move |line| {
            if line == "histogram" {
                println!("histogram,{}", on_off(s.control.lock().unwrap().histogram));
                return true;
            }
            if let Some(v) = line.strip_prefix("histogram,") {
                s.control.lock().unwrap().histogram = v == "on";
            }
            false
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "cursor",
        "cursor[,on|off]                show/hide the cursor crosshair.",
        false,
        move |line| {
            if line == "cursor" {
                println!("{}", on_off(s.control.lock().unwrap().cursor));
                return true;
            }
            if let Some(v) = line.strip_prefix("cursor,") {
                s.control.lock().unwrap().cursor = v == "on";
            }
            false
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "camera_distance",
        "camera_distance[,<dist>]       get or set the camera distance to the target.",
        true,
        move |line| {
            if line == "camera_distance" {
                println!("{}", s.scene_ctl.lock().unwrap().camera_distance);
                return true;
            }
            if let Some(v) = line.strip_prefix("camera_distance,") {
                if let Ok(d) = v.parse::<f32>() {
                    let mut sc = s.scene_ctl.lock().unwrap();
                    sc.camera_distance = d;
                    sc.changed = true;
                    return true;
                }
            }
            false
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "camera_fov",
        "camera_fov[,<field_of_view>]   get or set the camera field of view.",
        true,
        move |line| {
            if line == "camera_fov" {
                println!("{}", s.scene_ctl.lock().unwrap().camera_fov);
                return true;
            }
            if let Some(v) = line.strip_prefix("camera_fov,") {
                if let Ok(f) = v.parse::<f32>() {
                    let mut sc = s.scene_ctl.lock().unwrap();
                    sc.camera_fov = f;
                    sc.changed = true;
                    return true;
                }
            }
            false
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "camera_position",
        "camera_position[,<x>,<y>,<z>]  get or set the camera position.",
        true,
        move |line| {
            if line == "camera_position" {
                let sc = s.scene_ctl.lock().unwrap();
                let p = sc.camera_position.unwrap_or([0.0, 0.0, sc.camera_distance]);
                println!("{},{},{}", p[0], p[1], p[2]);
                return true;
            }
            if let Some(rest) = line.strip_prefix("camera_position,") {
                let v: Vec<f32> = rest.split(',').filter_map(|t| t.parse().ok()).collect();
                if v.len() == 3 {
                    let mut sc = s.scene_ctl.lock().unwrap();
                    sc.camera_position = Some([v[0], v[1], v[2]]);
                    sc.changed = true;
                    return true;
                }
            }
            false
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "light_position",
        "light_position[,<x>,<y>,<z>]   get or set the light position.",
        true,
        move |line| {
            if line == "light_position" {
                let p = s.scene_ctl.lock().unwrap().light_position;
                println!("{},{},{}", p[0], p[1], p[2]);
                return true;
            }
            if let Some(rest) = line.strip_prefix("light_position,") {
                let v: Vec<f32> = rest.split(',').filter_map(|t| t.parse().ok()).collect();
                if v.len() == 3 {
                    let mut sc = s.scene_ctl.lock().unwrap();
                    sc.light_position = [v[0], v[1], v[2]];
                    sc.changed = true;
                    return true;
                }
            }
            false
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "light_color",
        "light_color[,<r>,<g>,<b>]      get or set the light color.",
        true,
        move |line| {
            if line == "light_color" {
                let c = s.scene_ctl.lock().unwrap().light_color;
                println!("{},{},{}", c[0], c[1], c[2]);
                return true;
            }
            if let Some(rest) = line.strip_prefix("light_color,") {
                let v: Vec<f32> = rest.split(',').filter_map(|t| t.parse().ok()).collect();
                if v.len() == 3 {
                    let mut sc = s.scene_ctl.lock().unwrap();
                    sc.light_color = [v[0], v[1], v[2]];
                    sc.changed = true;
                    return true;
                }
            }
            false
        },
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_command_prints_whole_source() {
        assert!(source_command("frag", "frag", "void main() {}"));
    }

    #[test]
    fn source_command_line_queries() {
        // single line query handles the request
        assert!(source_command("frag,2", "frag", "a\nb\nc"));
        // multiple line numbers print but leave the line unhandled
        assert!(!source_command("frag,1,3", "frag", "a\nb\nc"));
        // a longer first token is a uniform assignment, not a source query
        assert!(!source_command("frag_scale,1", "frag", "a\nb\nc"));
    }

    #[test]
    fn on_off_labels() {
        assert_eq!(on_off(true), "on");
        assert_eq!(on_off(false), "off");
    }
}
