//! GLSL source utilities: include expansion and pass-topology derivation.
//!
//! The render-graph shape is not declared anywhere; it is re-derived from the
//! fragment source text on every reload by scanning for preprocessor marker
//! conventions (`BUFFER_<n>` and `POSTPROCESSING`). Keeping the scan a pure
//! function over the source string keeps it testable without a GL context.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::error::EngineError;

/// Derived shape of the render graph for one reload cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassTopology {
    /// Number of distinct `BUFFER_<n>` markers in the fragment source.
    pub buffer_passes: usize,
    /// Whether the fragment source carries a `POSTPROCESSING` block.
    pub postprocessing: bool,
}

pub fn derive_topology(frag_source: &str) -> PassTopology {
    PassTopology {
        buffer_passes: count_buffer_passes(frag_source),
        postprocessing: has_postprocessing_marker(frag_source),
    }
}

/// Read a shader source and recursively expand `#include "file"` directives
/// into a flat string, collecting every included file into `dependencies`.
///
/// Includes resolve against the including file's directory first, then each
/// search folder in order. A file already in `dependencies` is skipped, which
/// both de-duplicates shared includes and breaks include cycles.
pub fn load_source(
    path: &Path,
    include_folders: &[PathBuf],
    dependencies: &mut Vec<PathBuf>,
) -> Result<String, EngineError> {
    let src = crate::error::read_to_string_result(path)?;
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    expand(&src, &dir, include_folders, dependencies)
}

fn expand(
    src: &str,
    dir: &Path,
    include_folders: &[PathBuf],
    dependencies: &mut Vec<PathBuf>,
) -> Result<String, EngineError> {
    let mut out = String::with_capacity(src.len());
    for line in src.lines() {
        match include_target(line) {
            Some(name) => {
                let resolved = resolve_include(name, dir, include_folders).ok_or_else(|| {
                    EngineError::IncludeNotFound { name: name.to_string(), from: dir.to_path_buf() }
                })?;
                if dependencies.iter().any(|d| d == &resolved) {
                    continue;
                }
                dependencies.push(resolved.clone());
                let inner = crate::error::read_to_string_result(&resolved)?;
                let inner_dir =
                    resolved.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
                out.push_str(&expand(&inner, &inner_dir, include_folders, dependencies)?);
            }
            None => {
                out.push_str(line);
                out.push('\n');
            }
        }
    }
    Ok(out)
}

/// `#include "name"` -> `name`, or None for any other line.
fn include_target(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix("#include")?;
    let rest = rest.trim_start().strip_prefix('"')?;
    rest.split('"').next()
}

fn resolve_include(name: &str, dir: &Path, include_folders: &[PathBuf]) -> Option<PathBuf> {
    let local = dir.join(name);
    if local.is_file() {
        return Some(local);
    }
    for folder in include_folders {
        let cand = folder.join(name);
        if cand.is_file() {
            return Some(cand);
        }
    }
    None
}

/// Count the distinct `BUFFER_<n>` markers mentioned in preprocessor
/// conditionals (`#ifdef BUFFER_n`, `#if defined(BUFFER_n)`,
/// `#elif defined(BUFFER_n)`). Distinct indices, not occurrences: a source
/// that tests `BUFFER_0` in three places still declares one buffer pass.
pub fn count_buffer_passes(src: &str) -> usize {
    let mut seen: BTreeSet<usize> = BTreeSet::new();
    for line in src.lines() {
        if let Some(marker) = conditional_marker(line) {
            if let Some(n) = marker.strip_prefix("BUFFER_").and_then(|d| d.parse().ok()) {
                seen.insert(n);
            }
        }
    }
    seen.len()
}

/// True when the fragment source guards a `POSTPROCESSING` block.
pub fn has_postprocessing_marker(src: &str) -> bool {
    src.lines().any(|l| conditional_marker(l) == Some("POSTPROCESSING"))
}

/// Extract the macro name tested by a preprocessor conditional line.
fn conditional_marker(line: &str) -> Option<&str> {
    let t = line.trim_start();
    if let Some(rest) = t.strip_prefix("#ifdef") {
        return rest.split_whitespace().next();
    }
    let rest = t.strip_prefix("#if ").or_else(|| t.strip_prefix("#elif "))?;
    let rest = rest.trim_start().strip_prefix("defined")?;
    let rest = rest.trim_start().strip_prefix('(')?;
    Some(rest.split(')').next()?.trim())
}

/// Inject `#define` lines into a source, after the `#version` directive when
/// one is present, else at the top.
pub fn inject_defines(src: &str, defines: &BTreeMap<String, String>) -> String {
    if defines.is_empty() {
        return src.to_string();
    }

    let mut block = String::new();
    for (name, value) in defines {
        if value.is_empty() {
            block.push_str(&format!("#define {}\n", name));
        } else {
            block.push_str(&format!("#define {} {}\n", name, value));
        }
    }

    match src.lines().position(|l| l.trim_start().starts_with("#version")) {
        Some(i) => {
            let mut out = String::with_capacity(src.len() + block.len());
            for (n, line) in src.lines().enumerate() {
                out.push_str(line);
                out.push('\n');
                if n == i {
                    out.push_str(&block);
                }
            }
            out
        }
        None => format!("{}{}", block, src),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicU64, Ordering};

    static DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn scratch_dir() -> PathBuf {
        let n = DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!(
            "fragview-glsl-{}-{}",
            std::process::id(),
            n
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn counts_distinct_buffer_markers() {
        let src = "\
#ifdef BUFFER_0
vec3 a;
#elif defined(BUFFER_1)
vec3 b;
#endif
#if defined( BUFFER_1 )
vec3 c;
#endif
";
        assert_eq!(count_buffer_passes(src), 2);
        assert_eq!(count_buffer_passes("void main() {}"), 0);
    }

    #[test]
    fn detects_postprocessing_marker() {
        assert!(has_postprocessing_marker("#ifdef POSTPROCESSING\n"));
        assert!(has_postprocessing_marker("#elif defined(POSTPROCESSING)\n"));
        // A mention outside a conditional is not a marker.
        assert!(!has_postprocessing_marker("// POSTPROCESSING soon\n"));
    }

    #[test]
    fn topology_is_stable_across_rescans() {
        let src = "#ifdef BUFFER_0\n#endif\n#ifdef POSTPROCESSING\n#endif\n";
        let a = derive_topology(src);
        let b = derive_topology(src);
        assert_eq!(a, b);
        assert_eq!(a.buffer_passes, 1);
        assert!(a.postprocessing);
    }

    #[test]
    fn expands_includes_and_collects_dependencies() {
        let dir = scratch_dir();
        fs::write(dir.join("noise.glsl"), "float noise() { return 0.5; }\n").unwrap();
        fs::write(
            dir.join("common.glsl"),
            "#include \"noise.glsl\"\nfloat common_scale = 2.0;\n",
        )
        .unwrap();
        let main = dir.join("main.frag");
        fs::write(
            &main,
            "#include \"common.glsl\"\n#include \"noise.glsl\"\nvoid main() {}\n",
        )
        .unwrap();

        let mut deps = Vec::new();
        let out = load_source(&main, &[], &mut deps).unwrap();

        assert!(out.contains("float noise()"));
        assert!(out.contains("common_scale"));
        assert!(out.contains("void main()"));
        // noise.glsl appears once despite being included twice.
        assert_eq!(out.matches("float noise()").count(), 1);
        assert_eq!(deps, vec![dir.join("common.glsl"), dir.join("noise.glsl")]);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn includes_resolve_through_search_folders() {
        let dir = scratch_dir();
        let lib = dir.join("lib");
        fs::create_dir_all(&lib).unwrap();
        fs::write(lib.join("util.glsl"), "vec2 flip(vec2 v) { return v.yx; }\n").unwrap();
        let main = dir.join("main.frag");
        fs::write(&main, "#include \"util.glsl\"\nvoid main() {}\n").unwrap();

        let mut deps = Vec::new();
        let out = load_source(&main, &[lib.clone()], &mut deps).unwrap();
        assert!(out.contains("flip"));
        assert_eq!(deps, vec![lib.join("util.glsl")]);

        let mut deps = Vec::new();
        let err = load_source(&dir.join("main.frag"), &[], &mut deps);
        assert!(matches!(err, Err(EngineError::IncludeNotFound { .. })));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn defines_land_after_the_version_directive() {
        let mut defines = BTreeMap::new();
        defines.insert("PASSES".to_string(), "3".to_string());
        defines.insert("DEBUG".to_string(), String::new());

        let out = inject_defines("#version 330 core\nvoid main() {}\n", &defines);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "#version 330 core");
        assert_eq!(lines[1], "#define DEBUG");
        assert_eq!(lines[2], "#define PASSES 3");

        let out = inject_defines("void main() {}\n", &defines);
        assert!(out.starts_with("#define DEBUG\n"));
    }
}
