//! fragview engine crate
//!
//! Everything in here is pure logic the render runtime builds on: the watch
//! registry and its single pending-change slot, GLSL include expansion and
//! pass-topology scanning, the uniform function registry, and the console
//! command table. Nothing in this crate touches a GL context or spawns a
//! thread, so all of it is unit-testable on any machine.
//!
//! The `fragview` binary (crates/fragview-cli) owns the window, the GL
//! state, and the three-thread runtime (render / file watcher / console).

pub mod commands;
pub mod error;
pub mod glsl;
pub mod uniforms;
pub mod watch;
