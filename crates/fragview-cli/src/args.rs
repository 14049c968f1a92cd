//! Command-line parsing.
//!
//! Two passes over argv, because window geometry and style must be known
//! before the GL context exists while resources load after it: pass one
//! collects `-x/-y/-w/-h` and the style flags, pass two classifies the rest.
//! Positional paths are classified by extension (shader / geometry / image),
//! and an unrecognized `-<name> <file>` pair binds a texture to that sampler
//! name, so the grammar stays hand-parsed.

use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStyle {
    Regular,
    Headless,
    Fullscreen,
    AlwaysOnTop,
}

#[derive(Debug, Clone)]
pub struct WindowSettings {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: u32,
    pub height: u32,
    pub style: WindowStyle,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self { x: None, y: None, width: 500, height: 500, style: WindowStyle::Regular }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Frag(PathBuf),
    Vert(PathBuf),
    Geometry(PathBuf),
    Texture { name: String, path: PathBuf, v_flip: bool },
    Cubemap { path: PathBuf, visible: bool },
}

#[derive(Debug, Default)]
pub struct Args {
    pub window: WindowSettings,
    pub resources: Vec<Resource>,
    pub include_folders: Vec<PathBuf>,
    pub startup_commands: Vec<String>,
    pub execute_exit: bool,
    pub verbose: bool,
    pub cursor: bool,
    pub fxaa: bool,
    pub full_fps: bool,
    pub time_limit: Option<f32>,
    pub output_file: Option<PathBuf>,
    pub osc_port: Option<u16>,
    pub log_file: Option<PathBuf>,
    pub show_help: bool,
    pub show_version: bool,
}

impl Default for WindowStyle {
    fn default() -> Self {
        WindowStyle::Regular
    }
}

fn has_ext(arg: &str, exts: &[&str]) -> bool {
    PathBuf::from(arg)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            exts.iter().any(|x| *x == e)
        })
        .unwrap_or(false)
}

pub fn parse(argv: &[String]) -> Args {
    let mut args = Args { cursor: true, ..Args::default() };

    // Pass 1: window geometry and style.
    let mut it = argv.iter();
    while let Some(a) = it.next() {
        match a.as_str() {
            "-x" => args.window.x = it.next().and_then(|v| v.parse().ok()),
            "-y" => args.window.y = it.next().and_then(|v| v.parse().ok()),
            "-w" | "--width" => {
                if let Some(v) = it.next().and_then(|v| v.parse().ok()) {
                    args.window.width = v;
                }
            }
            "-h" | "--height" => {
                if let Some(v) = it.next().and_then(|v| v.parse().ok()) {
                    args.window.height = v;
                }
            }
            "--headless" => args.window.style = WindowStyle::Headless,
            "-f" | "--fullscreen" => args.window.style = WindowStyle::Fullscreen,
            "-l" | "--life-coding" => args.window.style = WindowStyle::AlwaysOnTop,
            "--help" => args.show_help = true,
            _ => {}
        }
    }

    // Pass 2: resources and the rest.
    let mut v_flip = true;
    let mut have_frag = false;
    let mut have_vert = false;
    let mut have_geom = false;
    let mut texture_counter = 0usize;

    let mut i = 0;
    while i < argv.len() {
        let a = argv[i].as_str();
        let mut next = |i: &mut usize| -> Option<&String> {
            *i += 1;
            argv.get(*i)
        };
        match a {
            "-x" | "-y" | "-w" | "--width" | "-h" | "--height" => {
                i += 1;
            }
            "--headless" | "-f" | "--fullscreen" | "-l" | "--life-coding" | "--help" => {}
            "--verbose" => args.verbose = true,
            "--nocursor" => args.cursor = false,
            "--fxaa" => args.fxaa = true,
            "--fullFps" => args.full_fps = true,
            "-s" | "--sec" => {
                args.time_limit = next(&mut i).and_then(|v| v.parse().ok());
            }
            "-o" => {
                if let Some(v) = next(&mut i) {
                    if has_ext(v, &["png"]) {
                        args.output_file = Some(PathBuf::from(v));
                    } else {
                        eprintln!("At the moment screenshots only support PNG format");
                    }
                }
            }
            "-p" | "--port" => {
                args.osc_port = next(&mut i).and_then(|v| v.parse().ok());
            }
            "--log-file" => {
                args.log_file = next(&mut i).map(PathBuf::from);
            }
            "-e" => {
                if let Some(v) = next(&mut i) {
                    args.startup_commands.push(v.clone());
                }
            }
            "-E" => {
                if let Some(v) = next(&mut i) {
                    args.startup_commands.push(v.clone());
                    args.execute_exit = true;
                }
            }
            "-vFlip" | "--vFlip" => v_flip = false,
            "-c" | "-sh" => {
                if let Some(v) = next(&mut i) {
                    args.resources.push(Resource::Cubemap { path: PathBuf::from(v), visible: false });
                }
            }
            "-C" => {
                if let Some(v) = next(&mut i) {
                    args.resources.push(Resource::Cubemap { path: PathBuf::from(v), visible: true });
                }
            }
            "-v" | "--version" => args.show_version = true,
            _ => {
                if let Some(define) = a.strip_prefix("-D") {
                    // Defines are applied post-setup as queued commands so
                    // they reach every compiled pass.
                    let cmd = match define.split_once('=') {
                        Some((k, v)) => format!("define,{},{}", k, v),
                        None => format!("define,{}", define),
                    };
                    args.startup_commands.push(cmd);
                } else if let Some(folder) = a.strip_prefix("-I") {
                    args.include_folders.push(PathBuf::from(folder));
                } else if !have_frag && has_ext(a, &["frag", "fs"]) {
                    args.resources.push(Resource::Frag(PathBuf::from(a)));
                    have_frag = true;
                } else if !have_vert && has_ext(a, &["vert", "vs"]) {
                    args.resources.push(Resource::Vert(PathBuf::from(a)));
                    have_vert = true;
                } else if !have_geom && has_ext(a, &["obj", "ply", "glb", "gltf"]) {
                    args.resources.push(Resource::Geometry(PathBuf::from(a)));
                    have_geom = true;
                } else if has_ext(a, &["png", "jpg", "jpeg", "hdr"]) {
                    args.resources.push(Resource::Texture {
                        name: format!("u_tex{}", texture_counter),
                        path: PathBuf::from(a),
                        v_flip,
                    });
                    texture_counter += 1;
                } else if let Some(name) = a.strip_prefix('-') {
                    // `-<uniformName> <texture>` binds a named sampler.
                    if let Some(v) = next(&mut i) {
                        args.resources.push(Resource::Texture {
                            name: name.to_string(),
                            path: PathBuf::from(v),
                            v_flip,
                        });
                    }
                }
            }
        }
        i += 1;
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn classifies_positionals_by_extension() {
        let a = parse(&argv(&["shader.frag", "shader.vert", "model.obj", "wall.png"]));
        assert_eq!(a.resources.len(), 4);
        assert_eq!(a.resources[0], Resource::Frag(PathBuf::from("shader.frag")));
        assert_eq!(a.resources[1], Resource::Vert(PathBuf::from("shader.vert")));
        assert_eq!(a.resources[2], Resource::Geometry(PathBuf::from("model.obj")));
        assert_eq!(
            a.resources[3],
            Resource::Texture {
                name: "u_tex0".to_string(),
                path: PathBuf::from("wall.png"),
                v_flip: true
            }
        );
    }

    #[test]
    fn window_geometry_and_style() {
        let a = parse(&argv(&["-w", "1280", "-h", "720", "--headless", "s.frag"]));
        assert_eq!(a.window.width, 1280);
        assert_eq!(a.window.height, 720);
        assert_eq!(a.window.style, WindowStyle::Headless);
    }

    #[test]
    fn vflip_applies_to_subsequent_textures_only() {
        let a = parse(&argv(&["one.png", "-vFlip", "two.png"]));
        match (&a.resources[0], &a.resources[1]) {
            (
                Resource::Texture { v_flip: first, .. },
                Resource::Texture { v_flip: second, .. },
            ) => {
                assert!(*first);
                assert!(!*second);
            }
            other => panic!("unexpected resources: {other:?}"),
        }
    }

    #[test]
    fn defines_become_startup_commands() {
        let a = parse(&argv(&["-DDEBUG", "-DPASSES=3", "-e", "camera_distance,5", "s.frag"]));
        assert_eq!(
            a.startup_commands,
            vec!["define,DEBUG", "define,PASSES,3", "camera_distance,5"]
        );
        assert!(!a.execute_exit);

        let b = parse(&argv(&["-E", "screenshot,out.png", "s.frag"]));
        assert!(b.execute_exit);
    }

    #[test]
    fn named_texture_flag_binds_a_sampler() {
        let a = parse(&argv(&["s.frag", "-u_bump", "bump.jpg"]));
        assert_eq!(
            a.resources[1],
            Resource::Texture {
                name: "u_bump".to_string(),
                path: PathBuf::from("bump.jpg"),
                v_flip: true
            }
        );
    }

    #[test]
    fn misc_flags() {
        let a = parse(&argv(&[
            "-s", "2.5", "-o", "out.png", "-p", "8000", "-Ilib", "--fxaa", "--nocursor",
            "s.frag",
        ]));
        assert_eq!(a.time_limit, Some(2.5));
        assert_eq!(a.output_file, Some(PathBuf::from("out.png")));
        assert_eq!(a.osc_port, Some(8000));
        assert_eq!(a.include_folders, vec![PathBuf::from("lib")]);
        assert!(a.fxaa);
        assert!(!a.cursor);
    }
}
