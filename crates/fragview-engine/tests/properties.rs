//! Cross-module behavior that the render runtime relies on, exercised
//! without a GL context.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use fragview_engine::commands::{Command, CommandSet};
use fragview_engine::glsl;
use fragview_engine::uniforms::{FrameSample, UniformRegistry, UniformValue};
use fragview_engine::watch::{FileKind, WatchEntry, WatchState};

#[test]
fn growing_the_pass_count_is_reflected_by_the_scan() {
    let two = "\
#ifdef BUFFER_0
#endif
#ifdef BUFFER_1
#endif
void main() {}
";
    let three = format!("{}#ifdef BUFFER_2\n#endif\n", two);

    assert_eq!(glsl::derive_topology(two).buffer_passes, 2);
    assert_eq!(glsl::derive_topology(&three).buffer_passes, 3);
    // Rescanning unchanged source yields an identical topology.
    assert_eq!(glsl::derive_topology(two), glsl::derive_topology(two));
}

#[test]
fn reload_by_path_marks_the_registered_entry() {
    let mut state = WatchState::default();
    state.registry.register(WatchEntry::new(FileKind::FragShader, "shader.frag"));
    state.registry.register(WatchEntry::new(FileKind::VertShader, "shader.vert"));

    // `reload,shader.frag` resolves the path to its index, then marks it.
    let idx = state.registry.index_of_path(std::path::Path::new("shader.frag")).unwrap();
    assert!(state.mark_changed(idx));
    assert_eq!(state.take_pending(), Some(0));
    assert_eq!(state.pending(), None);
}

#[test]
fn dependency_swap_preserves_primary_paths() {
    let mut state = WatchState::default();
    let frag = state.registry.register(WatchEntry::new(FileKind::FragShader, "a.frag"));
    let tex = state.registry.register(WatchEntry::new(FileKind::Image, "wall.png"));
    state
        .registry
        .replace_dependencies(&[PathBuf::from("one.glsl"), PathBuf::from("two.glsl")]);
    state.registry.replace_dependencies(&[PathBuf::from("three.glsl")]);

    let before: Vec<_> = [frag, tex]
        .iter()
        .map(|&i| state.registry.entry_at(i).unwrap().path.clone())
        .collect();
    assert_eq!(before, vec![PathBuf::from("a.frag"), PathBuf::from("wall.png")]);
    assert!(state
        .registry
        .entries()
        .iter()
        .filter(|e| e.kind == FileKind::Dependency)
        .all(|e| e.path == PathBuf::from("three.glsl")));
}

#[test]
fn unmatched_console_line_creates_a_vec3_uniform() {
    // A dispatcher with a couple of real commands, none of which match.
    let uniforms = Arc::new(Mutex::new(UniformRegistry::new()));
    let mut set = CommandSet::new();
    set.push(Command::new("help", "help", false, |line| line == "help"));
    set.push(Command::new("version", "version", false, |line| line == "version"));

    let lock = Mutex::new(());
    let line = "u_myColor,1,0,0";
    if !set.dispatch(line, &lock) {
        let _guard = lock.lock().unwrap();
        uniforms.lock().unwrap().parse_line(line);
    }

    let reg = uniforms.lock().unwrap();
    assert_eq!(reg.value_of("u_myColor"), Some(&UniformValue::Vec3([1.0, 0.0, 0.0])));
}

#[test]
fn uniform_dump_reports_assigned_values_verbatim() {
    let mut reg = UniformRegistry::new();
    assert!(reg.parse_line("u_test,1.5,2.5,3.5"));
    let lines = reg.dump(&FrameSample::default(), false);
    assert!(lines.iter().any(|l| l == "u_test,1.5,2.5,3.5"));
}

#[test]
fn scene_depth_requirement_follows_presence() {
    let mut reg = UniformRegistry::new();
    reg.check_presence("", "uniform sampler2D u_sceneDepth;\n#ifdef POSTPROCESSING\n#endif\n");
    assert!(reg.is_present("u_sceneDepth"));

    reg.check_presence("", "#ifdef POSTPROCESSING\n#endif\n");
    assert!(!reg.is_present("u_sceneDepth"));
}
