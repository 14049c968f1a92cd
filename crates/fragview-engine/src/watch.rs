//! Watched-file registry and the single pending-change slot.
//!
//! The watcher is a stat-polling sweep, not an inotify/FSEvents consumer:
//! change latency is bounded by the sweep interval, and at most one change is
//! pending at a time. When the slot is occupied, later detections leave the
//! stored mtime untouched so the next sweep after the consumer drains the
//! slot will find them again.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    FragShader,
    VertShader,
    Geometry,
    Image,
    Cubemap,
    Dependency,
}

impl FileKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FileKind::FragShader => "frag",
            FileKind::VertShader => "vert",
            FileKind::Geometry => "geometry",
            FileKind::Image => "image",
            FileKind::Cubemap => "cubemap",
            FileKind::Dependency => "dependency",
        }
    }
}

/// Best-effort modification time. Missing files report `None`, which still
/// compares unequal to a stored stamp once the file reappears.
pub fn file_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[derive(Debug, Clone)]
pub struct WatchEntry {
    pub kind: FileKind,
    pub path: PathBuf,
    pub mtime: Option<SystemTime>,
    pub v_flip: bool,
}

impl WatchEntry {
    pub fn new(kind: FileKind, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mtime = file_mtime(&path);
        Self { kind, path, mtime, v_flip: true }
    }

    pub fn with_v_flip(mut self, v_flip: bool) -> Self {
        self.v_flip = v_flip;
        self
    }
}

/// Ordered list of watched files.
///
/// Primary entries (shaders, geometry, textures) are registered at startup
/// and their indices are cached by the sandbox, so they must never move.
/// Dependency entries are always appended after them and are replaced
/// wholesale on every shader reload.
#[derive(Debug, Default)]
pub struct WatchRegistry {
    entries: Vec<WatchEntry>,
}

impl WatchRegistry {
    pub fn register(&mut self, entry: WatchEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry_at(&self, index: usize) -> Option<&WatchEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[WatchEntry] {
        &self.entries
    }

    pub fn index_of_path(&self, path: &Path) -> Option<usize> {
        self.entries.iter().position(|e| e.path == path)
    }

    /// Swap out all `Dependency` entries for a fresh set, stat-ing each new
    /// path. Non-dependency entries keep their relative order and indices.
    pub fn replace_dependencies(&mut self, paths: &[PathBuf]) {
        self.entries.retain(|e| e.kind != FileKind::Dependency);
        for p in paths {
            self.entries.push(WatchEntry::new(FileKind::Dependency, p.clone()));
        }
    }
}

/// Registry plus the pending-change slot, shared between the watcher thread
/// and the render thread under one mutex.
///
/// Invariant: only the render thread drains the slot (`take_pending`); only
/// the watcher sweep or an explicit reload command fills it (`mark_changed`).
#[derive(Debug, Default)]
pub struct WatchState {
    pub registry: WatchRegistry,
    changed: Option<usize>,
}

impl WatchState {
    pub fn pending(&self) -> Option<usize> {
        self.changed
    }

    /// Consume the pending change, if any. Render thread only.
    pub fn take_pending(&mut self) -> Option<usize> {
        self.changed.take()
    }

    /// Record `index` as changed. Returns false (dropped) when another change
    /// is already pending or the index is out of range.
    pub fn mark_changed(&mut self, index: usize) -> bool {
        if self.changed.is_some() || index >= self.registry.len() {
            return false;
        }
        self.changed = Some(index);
        true
    }

    /// One polling sweep over the registry: re-stat every entry and publish
    /// the first mtime difference found while the slot is free. Entries seen
    /// while the slot is occupied keep their stale stamp and are picked up by
    /// a later sweep. Returns the newly marked index, if any.
    pub fn sweep(&mut self) -> Option<usize> {
        let mut marked = None;
        for i in 0..self.registry.entries.len() {
            if self.changed.is_some() {
                break;
            }
            let now = file_mtime(&self.registry.entries[i].path);
            let entry = &mut self.registry.entries[i];
            if now != entry.mtime {
                entry.mtime = now;
                self.changed = Some(i);
                marked = Some(i);
            }
        }
        marked
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
            "fragview-watch-{}-{}",
            std::process::id(),
            n
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn touch(path: &Path, contents: &str) {
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn replace_dependencies_keeps_primary_indices() {
        let mut reg = WatchRegistry::default();
        let frag = reg.register(WatchEntry::new(FileKind::FragShader, "a.frag"));
        let vert = reg.register(WatchEntry::new(FileKind::VertShader, "a.vert"));
        reg.replace_dependencies(&[PathBuf::from("lib/one.glsl"), PathBuf::from("lib/two.glsl")]);

        assert_eq!(reg.entry_at(frag).unwrap().path, Path::new("a.frag"));
        assert_eq!(reg.entry_at(vert).unwrap().path, Path::new("a.vert"));
        assert_eq!(reg.len(), 4);

        reg.replace_dependencies(&[PathBuf::from("lib/three.glsl")]);
        assert_eq!(reg.entry_at(frag).unwrap().kind, FileKind::FragShader);
        assert_eq!(reg.entry_at(vert).unwrap().kind, FileKind::VertShader);
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.entry_at(2).unwrap().path, Path::new("lib/three.glsl"));
    }

    #[test]
    fn sweep_publishes_a_single_pending_index() {
        let dir = scratch_dir();
        let a = dir.join("a.frag");
        let b = dir.join("b.frag");
        touch(&a, "void main() {}");
        touch(&b, "void main() {}");

        let mut state = WatchState::default();
        state.registry.register(WatchEntry::new(FileKind::FragShader, &a));
        state.registry.register(WatchEntry::new(FileKind::Dependency, &b));

        assert_eq!(state.sweep(), None);

        // Force both stamps stale so both files look changed at once.
        for e in &mut state.registry.entries {
            e.mtime = Some(SystemTime::UNIX_EPOCH);
        }

        assert_eq!(state.sweep(), Some(0));
        // Second change is dropped while the first is pending.
        assert_eq!(state.sweep(), None);
        assert_eq!(state.pending(), Some(0));

        assert_eq!(state.take_pending(), Some(0));
        // The dropped change surfaces on the next sweep.
        assert_eq!(state.sweep(), Some(1));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn mark_changed_refuses_while_pending() {
        let mut state = WatchState::default();
        state.registry.register(WatchEntry::new(FileKind::FragShader, "a.frag"));
        state.registry.register(WatchEntry::new(FileKind::VertShader, "a.vert"));

        assert!(state.mark_changed(1));
        assert!(!state.mark_changed(0));
        assert_eq!(state.take_pending(), Some(1));
        assert!(state.mark_changed(0));
        assert!(!state.mark_changed(5));
    }
}
