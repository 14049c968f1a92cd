//! File watcher thread: a stat-polling sweep over the watch registry.
//!
//! Latency is bounded by the sweep interval, not instantaneous, and a single
//! pending change is surfaced per sweep; anything else waits for the render
//! thread to consume the slot. The loop observes the running flag and is
//! always joined at shutdown.

use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use crate::logi;
use crate::state::SharedState;

pub const SWEEP_INTERVAL: Duration = Duration::from_millis(500);

pub fn spawn(shared: SharedState) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("watcher".to_string())
        .spawn(move || {
            while shared.running.load(Ordering::Relaxed) {
                let marked = {
                    let mut w = shared.watch.lock().unwrap();
                    w.sweep().and_then(|i| w.registry.entry_at(i).map(|e| e.path.clone()))
                };
                if let Some(path) = marked {
                    logi!("WATCH", "change detected: {}", path.display());
                }
                thread::sleep(SWEEP_INTERVAL);
            }
        })
        .expect("spawn watcher thread")
}
