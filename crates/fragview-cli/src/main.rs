//! fragview — live GLSL shader previewer.
//!
//! Loads fragment/vertex shaders, images and geometry, reloads them on
//! change without restarting, derives multi-buffer and post-processing
//! passes from the shader source, and takes commands on stdin (and
//! optionally OSC) while rendering.
//!
//! ## Threads
//! - **render** (main): owns the GL context, compiles shaders, draws,
//!   consumes one pending file change per frame.
//! - **watcher**: stat-polls the watch registry and publishes a single
//!   pending change through the shared slot.
//! - **console**: waits for the pipeline to come up, drains `-e`/`-E`
//!   commands, then dispatches interactive lines; stdin itself is read by a
//!   detached pump thread feeding a channel so shutdown never has to kill a
//!   thread mid-read.

mod args;
mod console;
mod defaults;
mod gfx;
mod logging;
mod osc;
mod sandbox;
mod scene;
mod state;
mod textures;
mod watcher;

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;

use glow::HasContext;

use glutin::config::ConfigTemplateBuilder;
use glutin::context::{ContextApi, ContextAttributesBuilder, NotCurrentContext, Version};
use glutin::display::GetGlDisplay;
use glutin::prelude::*;
use glutin::surface::{SurfaceAttributesBuilder, SwapInterval, WindowSurface};
use glutin_winit::DisplayBuilder;

use raw_window_handle::HasRawWindowHandle;

use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};

use fragview_engine::commands::{Command, CommandSet};
use fragview_engine::watch::{FileKind, WatchEntry};

use crate::args::{Resource, WindowStyle};
use crate::sandbox::{FrameOutcome, Sandbox, SandboxSettings};
use crate::state::{RecordRequest, SharedState};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const FRAME_REST: Duration = Duration::from_millis(16);

fn header() -> String {
    format!("fragview {}", VERSION)
}

fn print_usage() {
    eprintln!("// {}", header());
    eprintln!("//");
    eprintln!("// Live GLSL shader previewer. Loads frag/vert shaders, images and");
    eprintln!("// geometry, reloads them automatically on change, and derives");
    eprintln!("// multi-buffer and post-processing passes from the shader source.");
    eprintln!("// Commands go through POSIX standard console in/out (uniforms,");
    eprintln!("// camera, screenshots) so it composes with other programs.");
    eprintln!("//");
    eprintln!("// Usage: fragview [arguments]");
    eprintln!("//");
    eprintln!("// <shader>.frag [<shader>.vert]   load shaders");
    eprintln!("// [<mesh>.obj]                    load geometry");
    eprintln!("// [<texture>.(png/jpg/hdr)]       bind a texture to u_tex<N>");
    eprintln!("// [-<name> <texture>]             bind a texture to a named sampler");
    eprintln!("// [-vFlip]                        textures after this flag are not flipped");
    eprintln!("// [-C <map>] / [-c <map>]         environment map as visible/hidden cubemap");
    eprintln!("// [-sh <map>]                     environment map, hidden");
    eprintln!("// [-x/-y <px>] [-w/-h <px>]       window position and size");
    eprintln!("// [-f|--fullscreen]               fullscreen window");
    eprintln!("// [-l|--life-coding]              always-on-top window");
    eprintln!("// [--headless]                    render without a visible window");
    eprintln!("// [--fxaa]                        FXAA as the fallback post-processing pass");
    eprintln!("// [-I<folder>]                    add an include search folder");
    eprintln!("// [-D<define>[=<value>]]          add a preprocessor define");
    eprintln!("// [-p <port>]                     open an OSC listening port");
    eprintln!("// [-o <file>.png]                 save a screenshot on exit");
    eprintln!("// [-s/--sec <seconds>]            exit after the given time");
    eprintln!("// [-e/-E <command>]               run a command at startup (-E exits after)");
    eprintln!("// [--fullFps]                     never skip frames");
    eprintln!("// [--nocursor]                    hide the cursor crosshair");
    eprintln!("// [--log-file <path>]             append log lines to a file");
    eprintln!("// [--verbose]                     verbose reload/setup logging");
    eprintln!("// [-v/--version] [--help]");
}

fn publish_change(shared: &SharedState, index: usize) -> bool {
    loop {
        {
            let mut w = shared.watch.lock().unwrap();
            if w.mark_changed(index) {
                return true;
            }
        }
        if !shared.running.load(Ordering::Relaxed) {
            return false;
        }
        thread::sleep(Duration::from_millis(20));
    }
}

fn wait_consumed(shared: &SharedState, index: usize) -> bool {
    loop {
        {
            let w = shared.watch.lock().unwrap();
            if w.pending() != Some(index) {
                return true;
            }
        }
        if !shared.running.load(Ordering::Relaxed) {
            return false;
        }
        thread::sleep(Duration::from_millis(20));
    }
}

/// Global console commands. Sandbox-scope commands (sources, uniforms,
/// buffers, defines, camera) are declared in `sandbox::declare_commands`.
fn declare_commands(
    set: &mut CommandSet,
    shared: &SharedState,
    registry_ref: Arc<OnceLock<Arc<CommandSet>>>,
    output_file: Option<PathBuf>,
) {
    let hdr = header();
    let reg = registry_ref;
    set.push(Command::new(
        "help",
        "help[,<command>]               print help for one or all commands.",
        false,
        move |line| {
            let Some(all) = reg.get() else { return false };
            if line == "help" {
                println!("// {}", hdr);
                println!("//");
                for c in all.iter() {
                    println!("// {}", c.help);
                }
                return true;
            }
            if let Some(name) = line.strip_prefix("help,") {
                for h in all.help_for(name) {
                    println!("// {}", h);
                }
            }
            false
        },
    ));

    set.push(Command::new(
        "version",
        "version                        print the fragview version.",
        false,
        |line| {
            if line == "version" {
                println!("{}", VERSION);
                return true;
            }
            false
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "window_width",
        "window_width                   print the width of the window.",
        false,
        move |line| {
            if line == "window_width" {
                println!("{}", s.sample.lock().unwrap().resolution[0]);
                return true;
            }
            false
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "window_height",
        "window_height                  print the height of the window.",
        false,
        move |line| {
            if line == "window_height" {
                println!("{}", s.sample.lock().unwrap().resolution[1]);
                return true;
            }
            false
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "pixel_density",
        "pixel_density                  print the pixel density.",
        false,
        move |line| {
            if line == "pixel_density" {
                println!("{}", s.sample.lock().unwrap().pixel_density);
                return true;
            }
            false
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "viewport",
        "viewport                       print the viewport size.",
        false,
        move |line| {
            if line == "viewport" {
                let r = s.sample.lock().unwrap().resolution;
                println!("0,0,{},{}", r[0], r[1]);
                return true;
            }
            false
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "mouse",
        "mouse                          print the mouse position.",
        false,
        move |line| {
            if line == "mouse" {
                let m = s.sample.lock().unwrap().mouse;
                println!("{},{}", m[0], m[1]);
                return true;
            }
            false
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "fps",
        "fps                            print u_fps, the frames per second.",
        false,
        move |line| {
            if line == "fps" {
                println!("{}", s.sample.lock().unwrap().fps);
                return true;
            }
            false
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "delta",
        "delta                          print u_delta, the seconds between frames.",
        false,
        move |line| {
            if line == "delta" {
                println!("{}", s.sample.lock().unwrap().delta);
                return true;
            }
            false
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "time",
        "time                           print u_time, the elapsed time.",
        false,
        move |line| {
            if line == "time" {
                println!("{}", s.sample.lock().unwrap().time);
                return true;
            }
            false
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "date",
        "date                           print u_date as YYYY, M, D and seconds.",
        false,
        move |line| {
            if line == "date" {
                let d = s.sample.lock().unwrap().date;
                println!("{},{},{},{}", d[0], d[1], d[2], d[3]);
                return true;
            }
            false
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "files",
        "files                          print the watched files.",
        false,
        move |line| {
            if line != "files" {
                return false;
            }
            let w = s.watch.lock().unwrap();
            for (i, e) in w.registry.entries().iter().enumerate() {
                println!("{:2},{:>12},{}", i, e.kind.as_str(), e.path.display());
            }
            true
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "reload",
        "reload[,<filename>]            reload one or all files.",
        false,
        move |line| {
            if line == "reload" || line == "reload,all" {
                s.full_fps.store(true, Ordering::Relaxed);
                let len = s.watch.lock().unwrap().registry.len();
                for i in 0..len {
                    if !publish_change(&s, i) || !wait_consumed(&s, i) {
                        break;
                    }
                }
                s.full_fps.store(false, Ordering::Relaxed);
                return true;
            }
            if let Some(path) = line.strip_prefix("reload,") {
                let index = s.watch.lock().unwrap().registry.index_of_path(Path::new(path));
                if let Some(i) = index {
                    publish_change(&s, i);
                    return true;
                }
            }
            false
        },
    ));

    let s = shared.clone();
    let out = output_file;
    set.push(Command::new(
        "screenshot",
        "screenshot[,<filename>]        save a screenshot.",
        false,
        move |line| {
            if line == "screenshot" {
                if let Some(o) = &out {
                    s.control.lock().unwrap().screenshot_file = Some(o.clone());
                    return true;
                }
                return false;
            }
            if let Some(p) = line.strip_prefix("screenshot,") {
                if !p.is_empty() {
                    s.control.lock().unwrap().screenshot_file = Some(PathBuf::from(p));
                    return true;
                }
            }
            false
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "sequence",
        "sequence,<A_sec>,<B_sec>[,fps] save a PNG sequence from second A to B.",
        false,
        move |line| {
            let values: Vec<&str> = line.split(',').collect();
            if values.len() < 3 || values[0] != "sequence" {
                return false;
            }
            let (Ok(from), Ok(to)) = (values[1].parse::<f32>(), values[2].parse::<f32>()) else {
                return false;
            };
            let fps = values.get(3).and_then(|v| v.parse().ok()).unwrap_or(24.0);

            {
                let mut c = s.control.lock().unwrap();
                c.record_request = Some(RecordRequest { start: from, end: to, fps });
                c.record_progress = 0;
            }
            println!("//");

            // Block the console (not the render thread) until done.
            let mut pct = 0;
            while pct < 100 {
                if !s.running.load(Ordering::Relaxed) {
                    break;
                }
                print!("\r// [ ");
                for i in 0..50 {
                    print!("{}", if i < pct / 2 { '#' } else { '.' });
                }
                print!(" ] {:3}%", pct);
                use std::io::Write;
                let _ = std::io::stdout().flush();
                thread::sleep(Duration::from_millis(100));
                pct = s.control.lock().unwrap().record_progress;
            }
            println!();
            true
        },
    ));

    set.push(Command::new(
        "wait",
        "wait,<seconds>                 wait before running the next command.",
        true,
        |line| {
            if let Some(v) = line.strip_prefix("wait,") {
                if let Ok(secs) = v.parse::<f32>() {
                    thread::sleep(Duration::from_secs_f32(secs.max(0.0)));
                }
            }
            false
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "fullFps",
        "fullFps[,on|off]               render every frame, skipping none.",
        false,
        move |line| {
            if line == "fullFps" {
                let on = s.full_fps.load(Ordering::Relaxed);
                println!("{}", if on { "on" } else { "off" });
                return true;
            }
            if let Some(v) = line.strip_prefix("fullFps,") {
                s.full_fps.store(v == "on", Ordering::Relaxed);
            }
            false
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "q",
        "q                              quit immediately.",
        false,
        move |line| {
            if line == "q" {
                s.running.store(false, Ordering::Relaxed);
                return true;
            }
            false
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "quit",
        "quit                           finish pending captures, then quit.",
        false,
        move |line| {
            if line == "quit" {
                s.finish.store(true, Ordering::Relaxed);
                return true;
            }
            false
        },
    ));

    let s = shared.clone();
    set.push(Command::new(
        "exit",
        "exit                           finish pending captures, then quit.",
        false,
        move |line| {
            if line == "exit" {
                s.finish.store(true, Ordering::Relaxed);
                return true;
            }
            false
        },
    ));
}

fn main() {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let parsed = args::parse(&argv);

    if parsed.show_help {
        print_usage();
        return;
    }
    if parsed.show_version {
        println!("{}", VERSION);
        return;
    }

    let log_file = parsed.log_file.clone().or_else(|| {
        std::env::var("FRAGVIEW_LOG_FILE")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
    });
    let run_id = logging::init(log_file);
    logi!("INIT", "run_id={run_id}");

    let shared = SharedState::new();
    shared.full_fps.store(parsed.full_fps, Ordering::Relaxed);
    shared.control.lock().unwrap().cursor = parsed.cursor;

    // Register watched files; synthesize defaults for missing shader paths.
    let scene_mode = parsed.resources.iter().any(|r| matches!(r, Resource::Geometry(_)));
    let mut frag_index = None;
    let mut vert_index = None;
    let mut geom_index = None;
    let mut texture_bindings: Vec<(String, PathBuf, bool)> = Vec::new();
    let mut cubemap_cfg: Option<(PathBuf, bool)> = None;
    {
        let mut w = shared.watch.lock().unwrap();
        for res in &parsed.resources {
            match res {
                Resource::Frag(path) => {
                    if !path.exists() {
                        println!(
                            "// File {} not found. Creating a default fragment shader with that name.",
                            path.display()
                        );
                        let src = if scene_mode { defaults::DEFAULT_SCENE_FRAG } else { defaults::DEFAULT_FRAG };
                        if let Err(e) = std::fs::write(path, src) {
                            loge!("INIT", "could not write {}: {e}", path.display());
                        }
                    }
                    frag_index = Some(w.registry.register(WatchEntry::new(FileKind::FragShader, path)));
                }
                Resource::Vert(path) => {
                    if !path.exists() {
                        println!(
                            "// File {} not found. Creating a default vertex shader with that name.",
                            path.display()
                        );
                        let src = if scene_mode { defaults::DEFAULT_SCENE_VERT } else { defaults::DEFAULT_VERT };
                        if let Err(e) = std::fs::write(path, src) {
                            loge!("INIT", "could not write {}: {e}", path.display());
                        }
                    }
                    vert_index = Some(w.registry.register(WatchEntry::new(FileKind::VertShader, path)));
                }
                Resource::Geometry(path) => {
                    if path.exists() {
                        geom_index = Some(w.registry.register(WatchEntry::new(FileKind::Geometry, path)));
                    } else {
                        loge!("INIT", "cannot watch geometry {}", path.display());
                    }
                }
                Resource::Texture { name, path, v_flip } => {
                    if path.exists() {
                        w.registry.register(WatchEntry::new(FileKind::Image, path).with_v_flip(*v_flip));
                        texture_bindings.push((name.clone(), path.clone(), *v_flip));
                    } else {
                        logw!("INIT", "cannot watch texture {}", path.display());
                    }
                }
                Resource::Cubemap { path, visible } => {
                    if path.exists() {
                        w.registry.register(WatchEntry::new(FileKind::Cubemap, path));
                        cubemap_cfg = Some((path.clone(), *visible));
                    } else {
                        logw!("INIT", "cannot watch cubemap {}", path.display());
                    }
                }
            }
        }
    }

    if frag_index.is_none() && vert_index.is_none() && geom_index.is_none() {
        print_usage();
        std::process::exit(1);
    }

    if let Some(limit) = parsed.time_limit {
        println!("// Will exit in {} seconds.", limit);
    }
    if let Some(out) = &parsed.output_file {
        println!("// Will save screenshot to {} on exit.", out.display());
    }

    // The command table is built before any thread spawns and is immutable
    // afterwards; `help` resolves the finished table through a OnceLock.
    let registry_ref: Arc<OnceLock<Arc<CommandSet>>> = Arc::new(OnceLock::new());
    let mut command_set = CommandSet::new();
    declare_commands(&mut command_set, &shared, registry_ref.clone(), parsed.output_file.clone());
    sandbox::declare_commands(&mut command_set, &shared);
    let commands = Arc::new(command_set);
    let _ = registry_ref.set(commands.clone());

    // Window + GL context.
    let event_loop = EventLoop::new().expect("EventLoop::new failed");

    let mut window_builder = winit::window::WindowBuilder::new()
        .with_title("fragview")
        .with_inner_size(PhysicalSize::new(parsed.window.width, parsed.window.height));
    match parsed.window.style {
        WindowStyle::Fullscreen => {
            window_builder =
                window_builder.with_fullscreen(Some(winit::window::Fullscreen::Borderless(None)));
        }
        WindowStyle::AlwaysOnTop => {
            window_builder = window_builder.with_window_level(winit::window::WindowLevel::AlwaysOnTop);
        }
        _ => {}
    }

    let template = ConfigTemplateBuilder::new().with_alpha_size(8).with_depth_size(24);
    let display_builder = DisplayBuilder::new().with_window_builder(Some(window_builder));

    let (window, gl_config) = display_builder
        .build(&event_loop, template, |configs| {
            configs
                .reduce(|a, b| if a.num_samples() > b.num_samples() { a } else { b })
                .unwrap()
        })
        .expect("Failed to build display");

    let window = window.expect("No window created");
    if let (Some(x), Some(y)) = (parsed.window.x, parsed.window.y) {
        window.set_outer_position(PhysicalPosition::new(x, y));
    }
    // Headless runs keep a GL surface for portability; only the window is
    // hidden.
    if parsed.window.style == WindowStyle::Headless {
        window.set_visible(false);
    }

    let raw_window_handle = window.raw_window_handle();
    let gl_display = gl_config.display();

    let context_attributes = ContextAttributesBuilder::new()
        .with_context_api(ContextApi::OpenGl(Some(Version::new(3, 3))))
        .build(Some(raw_window_handle));

    let not_current_gl_context: NotCurrentContext = unsafe {
        gl_display
            .create_context(&gl_config, &context_attributes)
            .expect("create_context failed")
    };

    let size = window.inner_size();
    let attrs = SurfaceAttributesBuilder::<WindowSurface>::new().build(
        window.raw_window_handle(),
        NonZeroU32::new(size.width.max(1)).unwrap(),
        NonZeroU32::new(size.height.max(1)).unwrap(),
    );

    let gl_surface = unsafe {
        gl_display
            .create_window_surface(&gl_config, &attrs)
            .expect("create_window_surface failed")
    };

    let gl_context = not_current_gl_context
        .make_current(&gl_surface)
        .expect("make_current failed");

    gl_surface
        .set_swap_interval(&gl_context, SwapInterval::Wait(NonZeroU32::new(1).unwrap()))
        .ok();

    let gl = unsafe {
        glow::Context::from_loader_function(|s| {
            gl_display.get_proc_address(&std::ffi::CString::new(s).unwrap()) as *const _
        })
    };

    if parsed.verbose {
        unsafe {
            logi!("INIT", "OpenGL vendor: {}", gl.get_parameter_string(glow::VENDOR));
            logi!("INIT", "OpenGL renderer: {}", gl.get_parameter_string(glow::RENDERER));
            logi!("INIT", "OpenGL version: {}", gl.get_parameter_string(glow::VERSION));
        }
    }

    let settings = SandboxSettings {
        frag_index,
        vert_index,
        geom_index,
        include_folders: parsed.include_folders.clone(),
        texture_bindings,
        cubemap: cubemap_cfg,
        verbose: parsed.verbose,
        fxaa: parsed.fxaa,
        time_limit: parsed.time_limit,
        output_file: parsed.output_file.clone(),
        width: size.width.max(1) as i32,
        height: size.height.max(1) as i32,
        pixel_density: window.scale_factor() as f32,
    };
    let mut sandbox = Sandbox::new(&gl, shared.clone(), settings);
    sandbox.setup(&gl);
    logi!("INIT", "ready (run_id={})", logging::run_id());

    // Background tasks: spawned only after the shared context and the
    // frozen command table exist.
    let mut watcher_handle = Some(watcher::spawn(shared.clone()));
    let mut console_handle = Some(console::spawn(
        commands.clone(),
        shared.clone(),
        parsed.startup_commands.clone(),
        parsed.execute_exit,
    ));
    let mut osc_listener = parsed.osc_port.and_then(|p| osc::start(p, commands.clone(), shared.clone()));

    if parsed.verbose {
        logi!("INIT", "starting render loop");
    }

    let mut cursor: Option<(f32, f32)> = None;
    let mut left_down = false;
    let mut right_down = false;

    event_loop
        .run(move |event, target| {
            target.set_control_flow(ControlFlow::Poll);

            match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested => {
                        shared.running.store(false, Ordering::Relaxed);
                        target.exit();
                    }

                    WindowEvent::KeyboardInput { event, .. } => {
                        if event.state.is_pressed() {
                            if let PhysicalKey::Code(KeyCode::KeyQ) = event.physical_key {
                                shared.running.store(false, Ordering::Relaxed);
                            }
                        }
                    }

                    WindowEvent::Resized(new_size) => {
                        let w = new_size.width.max(1);
                        let h = new_size.height.max(1);
                        gl_surface.resize(
                            &gl_context,
                            NonZeroU32::new(w).unwrap(),
                            NonZeroU32::new(h).unwrap(),
                        );
                        sandbox.on_viewport_resize(&gl, w as i32, h as i32);
                    }

                    WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                        sandbox.set_pixel_density(scale_factor as f32);
                    }

                    WindowEvent::CursorMoved { position, .. } => {
                        let h = window.inner_size().height as f32;
                        let x = position.x as f32;
                        let y = h - position.y as f32;
                        if let Some((lx, ly)) = cursor {
                            let (vel_x, vel_y) = (x - lx, y - ly);
                            if left_down {
                                sandbox.on_mouse_drag(vel_x, vel_y, 1);
                            } else if right_down {
                                sandbox.on_mouse_drag(vel_x, vel_y, 2);
                            }
                        }
                        cursor = Some((x, y));
                        sandbox.set_mouse(x, y);
                    }

                    WindowEvent::MouseInput { state, button, .. } => {
                        let down = state == ElementState::Pressed;
                        match button {
                            MouseButton::Left => left_down = down,
                            MouseButton::Right => right_down = down,
                            _ => {}
                        }
                    }

                    WindowEvent::MouseWheel { delta, .. } => {
                        let y = match delta {
                            MouseScrollDelta::LineDelta(_, y) => y,
                            MouseScrollDelta::PixelDelta(p) => p.y as f32 / 40.0,
                        };
                        sandbox.on_scroll(y);
                    }

                    WindowEvent::RedrawRequested => match sandbox.frame(&gl) {
                        FrameOutcome::Rendered => {
                            gl_surface.swap_buffers(&gl_context).expect("swap_buffers failed");
                        }
                        FrameOutcome::Skipped => {
                            thread::sleep(FRAME_REST);
                        }
                        FrameOutcome::Finished => {
                            shared.running.store(false, Ordering::Relaxed);
                            target.exit();
                        }
                    },

                    _ => {}
                },

                Event::AboutToWait => {
                    if !shared.running.load(Ordering::Relaxed) {
                        target.exit();
                    } else {
                        window.request_redraw();
                    }
                }

                Event::LoopExiting => {
                    shared.running.store(false, Ordering::Relaxed);

                    // Teardown order matters: blank the context first, then
                    // release sandbox-owned GL objects, then the context
                    // itself goes down with the process.
                    unsafe {
                        gl.clear_color(0.0, 0.0, 0.0, 1.0);
                        gl.clear(glow::COLOR_BUFFER_BIT);
                    }
                    sandbox.clear(&gl);

                    osc_listener.take();
                    if let Some(h) = watcher_handle.take() {
                        let _ = h.join();
                    }
                    if let Some(h) = console_handle.take() {
                        let _ = h.join();
                    }
                }

                _ => {}
            }
        })
        .expect("event loop failed");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command_table(shared: &SharedState) -> Arc<CommandSet> {
        let registry_ref: Arc<OnceLock<Arc<CommandSet>>> = Arc::new(OnceLock::new());
        let mut set = CommandSet::new();
        declare_commands(&mut set, shared, registry_ref.clone(), None);
        sandbox::declare_commands(&mut set, shared);
        let set = Arc::new(set);
        let _ = registry_ref.set(set.clone());
        set
    }

    #[test]
    fn q_stops_immediately_quit_finishes_first() {
        let shared = SharedState::new();
        let commands = command_table(&shared);

        console::run_cmd(&commands, &shared, "quit");
        assert!(shared.running.load(Ordering::Relaxed));
        assert!(shared.finish.load(Ordering::Relaxed));

        console::run_cmd(&commands, &shared, "q");
        assert!(!shared.running.load(Ordering::Relaxed));
    }

    #[test]
    fn unknown_line_becomes_a_uniform_assignment() {
        let shared = SharedState::new();
        let commands = command_table(&shared);
        console::run_cmd(&commands, &shared, "u_myColor,1,0,0");
        let u = shared.uniforms.lock().unwrap();
        assert_eq!(
            u.value_of("u_myColor"),
            Some(&fragview_engine::uniforms::UniformValue::Vec3([1.0, 0.0, 0.0]))
        );
    }

    #[test]
    fn reload_by_path_publishes_the_entry_index() {
        let shared = SharedState::new();
        {
            let mut w = shared.watch.lock().unwrap();
            w.registry.register(WatchEntry::new(FileKind::FragShader, "shader.frag"));
        }
        let commands = command_table(&shared);
        console::run_cmd(&commands, &shared, "reload,shader.frag");
        assert_eq!(shared.watch.lock().unwrap().pending(), Some(0));
    }

    #[test]
    fn screenshot_command_queues_a_capture() {
        let shared = SharedState::new();
        let commands = command_table(&shared);
        console::run_cmd(&commands, &shared, "screenshot,frame.png");
        assert_eq!(
            shared.control.lock().unwrap().screenshot_file.as_deref(),
            Some(Path::new("frame.png"))
        );
    }
}
