//! Console command table.
//!
//! Commands are matched in registration order by case-sensitive prefix; the
//! first handler that reports "handled" stops the search. A bare token and a
//! comma-suffixed token (`defines` vs `define,`) are distinct registrations
//! and both get tried. Anything no command handles falls through to the
//! caller, which treats the line as a uniform assignment — that fallback is
//! the console's only generic input channel, so handlers must return false
//! for lines they only partially recognize.

use std::sync::Mutex;

pub type Handler = Box<dyn Fn(&str) -> bool + Send + Sync>;

pub struct Command {
    token: String,
    pub help: String,
    /// Take the console's exclusive lock while the handler runs. Handlers
    /// that mutate shared render state set this; pure queries skip it.
    pub requires_lock: bool,
    exec: Handler,
}

impl Command {
    pub fn new(
        token: impl Into<String>,
        help: impl Into<String>,
        requires_lock: bool,
        exec: impl Fn(&str) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self { token: token.into(), help: help.into(), requires_lock, exec: Box::new(exec) }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Registration-ordered command list. Immutable once the threads spawn.
#[derive(Default)]
pub struct CommandSet {
    commands: Vec<Command>,
}

impl CommandSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    /// Try every command whose token prefixes `line`, in registration order,
    /// taking `lock` around handlers that ask for it. Returns true when some
    /// handler fully handled the line.
    pub fn dispatch(&self, line: &str, lock: &Mutex<()>) -> bool {
        for cmd in &self.commands {
            if line.starts_with(cmd.token.as_str()) {
                let _guard = if cmd.requires_lock { Some(lock.lock().unwrap()) } else { None };
                if (cmd.exec)(line) {
                    return true;
                }
            }
        }
        false
    }

    pub fn help_for(&self, name: &str) -> Vec<&str> {
        self.commands
            .iter()
            .filter(|c| c.token == name || c.token.trim_end_matches(',') == name)
            .map(|c| c.help.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn first_handled_match_wins() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut set = CommandSet::new();

        let h = hits.clone();
        set.push(Command::new("version", "version", false, move |line| {
            if line == "version" {
                h.fetch_add(1, Ordering::Relaxed);
                true
            } else {
                false
            }
        }));
        let h = hits.clone();
        set.push(Command::new("version", "shadowed", false, move |_| {
            h.fetch_add(100, Ordering::Relaxed);
            true
        }));

        let lock = Mutex::new(());
        assert!(set.dispatch("version", &lock));
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn unhandled_prefix_keeps_searching() {
        // `defines` (bare) refuses lines with arguments; `define,` takes them.
        let mut set = CommandSet::new();
        set.push(Command::new("defines", "defines", false, |line| line == "defines"));
        let taken = Arc::new(AtomicUsize::new(0));
        let t = taken.clone();
        set.push(Command::new("define,", "define,<K>", false, move |_| {
            t.fetch_add(1, Ordering::Relaxed);
            true
        }));

        let lock = Mutex::new(());
        assert!(set.dispatch("defines", &lock));
        assert!(set.dispatch("define,DEBUG", &lock));
        assert_eq!(taken.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn unmatched_lines_report_unhandled() {
        let mut set = CommandSet::new();
        set.push(Command::new("help", "help", false, |line| line == "help"));
        let lock = Mutex::new(());
        // The caller treats this as a uniform assignment.
        assert!(!set.dispatch("u_myColor,1,0,0", &lock));
    }

    #[test]
    fn lock_is_taken_for_marked_handlers() {
        let mut set = CommandSet::new();
        set.push(Command::new("mutate", "mutate", true, |_| true));
        let lock = Mutex::new(());
        assert!(set.dispatch("mutate", &lock));
        // Lock was released after dispatch.
        assert!(lock.try_lock().is_ok());
    }
}
