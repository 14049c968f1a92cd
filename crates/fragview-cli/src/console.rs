//! Console reader.
//!
//! Two threads: a detached stdin pump that blocks on `read_line` and feeds a
//! channel, and the console task that waits for the pipeline to report
//! ready, drains startup commands, then dispatches interactive lines. The
//! pump is the only blocking read in the process; the console task polls the
//! channel with a timeout so it can observe the running flag and exit
//! cooperatively instead of being force-killed mid-read.

use std::io::{BufRead, Write};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;

use fragview_engine::commands::CommandSet;

use crate::state::SharedState;

/// Run one command line: registered commands first, in registration order;
/// anything unhandled is treated as a uniform assignment.
pub fn run_cmd(commands: &CommandSet, shared: &SharedState, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    if commands.dispatch(line, &shared.console_lock) {
        return;
    }
    let _guard = shared.console_lock.lock().unwrap();
    shared.uniforms.lock().unwrap().parse_line(line);
}

pub fn prompt() {
    print!("// > ");
    let _ = std::io::stdout().flush();
}

pub fn spawn(
    commands: Arc<CommandSet>,
    shared: SharedState,
    startup_commands: Vec<String>,
    execute_exit: bool,
) -> thread::JoinHandle<()> {
    let (tx, rx) = crossbeam_channel::unbounded::<String>();

    // The pump may sit in a blocking read at shutdown; it is never joined,
    // process exit reaps it.
    let _ = thread::Builder::new().name("stdin".to_string()).spawn(move || {
        let stdin = std::io::stdin();
        loop {
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if tx.send(line.trim_end().to_string()).is_err() {
                        break;
                    }
                }
            }
        }
    });

    thread::Builder::new()
        .name("console".to_string())
        .spawn(move || {
            // Wait for the first rendered frame before running anything.
            while !shared.ready.load(Ordering::Relaxed) {
                if !shared.running.load(Ordering::Relaxed) {
                    return;
                }
                thread::sleep(Duration::from_millis(16));
            }

            for cmd in &startup_commands {
                run_cmd(&commands, &shared, cmd);
            }
            if execute_exit {
                // Let a queued screenshot/recording finish, then stop.
                shared.finish.store(true, Ordering::Relaxed);
            }

            prompt();
            loop {
                if !shared.running.load(Ordering::Relaxed) {
                    break;
                }
                match rx.recv_timeout(Duration::from_millis(200)) {
                    Ok(line) => {
                        run_cmd(&commands, &shared, &line);
                        prompt();
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        })
        .expect("spawn console thread")
}
