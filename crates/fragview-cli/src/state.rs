//! Shared state handed to the three concurrent tasks.
//!
//! One explicitly constructed context object, created before any thread
//! spawns and owned by `main`, instead of process-wide statics. The atomic
//! booleans are the only fields read without a lock; everything else sits
//! behind its own mutex with a fixed role:
//!
//! - `watch` — the registry + pending-change slot (watcher thread publishes,
//!   render thread consumes, reload command walks it).
//! - `console_lock` — serializes command executions (console vs. OSC).
//! - `uniforms` — written by the console fallback path, read per frame by
//!   the render thread.
//! - `control` — console-originated intents the render thread drains once
//!   per frame, plus render-thread snapshots the console queries read.
//! - `scene_ctl` — camera/light parameters shared with the scene.
//! - `sample` — the last rendered frame's live values for query commands.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use fragview_engine::uniforms::{FrameSample, UniformRegistry};
use fragview_engine::watch::WatchState;

/// Operations a console handler queues for the render thread; all of them
/// need the GL context, so handlers never run them directly.
#[derive(Debug, Clone)]
pub enum EngineOp {
    Define(String, String),
    Undefine(String),
    UpdateAll,
}

#[derive(Debug, Clone, Copy)]
pub struct RecordRequest {
    pub start: f32,
    pub end: f32,
    pub fps: f32,
}

/// Console-facing control surface. Console handlers write intents; the
/// render thread drains them each frame and refreshes the snapshots.
#[derive(Debug, Default)]
pub struct ControlState {
    pub screenshot_file: Option<PathBuf>,
    pub record_request: Option<RecordRequest>,
    pub record_progress: i32,
    pub pending: Vec<EngineOp>,

    pub cursor: bool,
    pub show_passes: bool,
    pub show_textures: bool,
    pub histogram: bool,
    pub scene_debug: bool,
    pub has_scene: bool,

    // Render-thread snapshots, refreshed on every reload, so source and
    // dependency queries never touch GL-owned state.
    pub frag_source: String,
    pub vert_source: String,
    pub frag_dependencies: Vec<PathBuf>,
    pub vert_dependencies: Vec<PathBuf>,
    pub defines: Vec<(String, String)>,
    pub textures: Vec<(String, PathBuf)>,
    pub buffer_names: Vec<String>,
    pub postprocessing: Option<&'static str>,
}

/// Camera and light parameters the console may set while the scene renders.
#[derive(Debug)]
pub struct SceneControl {
    pub camera_distance: f32,
    pub camera_fov: f32,
    pub camera_position: Option<[f32; 3]>,
    pub light_position: [f32; 3],
    pub light_color: [f32; 3],
    pub changed: bool,
}

impl Default for SceneControl {
    fn default() -> Self {
        Self {
            camera_distance: 3.0,
            camera_fov: 45.0,
            camera_position: None,
            light_position: [1.0, 3.0, 1.0],
            light_color: [1.0, 1.0, 1.0],
            changed: false,
        }
    }
}

#[derive(Clone)]
pub struct SharedState {
    /// Master "keep running" signal; checked by all three loops.
    pub running: Arc<AtomicBool>,
    /// Set once the first frame has rendered; gates the console reader.
    pub ready: Arc<AtomicBool>,
    /// Disables frame skipping.
    pub full_fps: Arc<AtomicBool>,
    /// "Finish after this frame": let an in-flight screenshot/recording
    /// complete, then stop. Distinct from clearing `running`.
    pub finish: Arc<AtomicBool>,

    pub watch: Arc<Mutex<WatchState>>,
    pub console_lock: Arc<Mutex<()>>,
    pub uniforms: Arc<Mutex<UniformRegistry>>,
    pub control: Arc<Mutex<ControlState>>,
    pub scene_ctl: Arc<Mutex<SceneControl>>,
    pub sample: Arc<Mutex<FrameSample>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            ready: Arc::new(AtomicBool::new(false)),
            full_fps: Arc::new(AtomicBool::new(false)),
            finish: Arc::new(AtomicBool::new(false)),
            watch: Arc::new(Mutex::new(WatchState::default())),
            console_lock: Arc::new(Mutex::new(())),
            uniforms: Arc::new(Mutex::new(UniformRegistry::new())),
            control: Arc::new(Mutex::new(ControlState::default())),
            scene_ctl: Arc::new(Mutex::new(SceneControl::default())),
            sample: Arc::new(Mutex::new(FrameSample::default())),
        }
    }
}
