//! Out-of-process control channel (OSC over UDP).
//!
//! Incoming messages are flattened into console-protocol lines — address
//! segments and arguments joined by commas, so `/camera_distance 5.0`
//! becomes `camera_distance,5` — and run through the same dispatcher as
//! typed input, under the same console lock. There is no second grammar.

use std::net::UdpSocket;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rosc::{OscPacket, OscType};

use fragview_engine::commands::CommandSet;

use crate::state::SharedState;
use crate::{console, loge, logi};

pub struct OscListener {
    stop_tx: crossbeam_channel::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl Drop for OscListener {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

pub fn start(port: u16, commands: Arc<CommandSet>, shared: SharedState) -> Option<OscListener> {
    let sock = match UdpSocket::bind(("0.0.0.0", port)) {
        Ok(s) => s,
        Err(e) => {
            loge!("OSC", "failed to bind port {port}: {e}");
            return None;
        }
    };
    let _ = sock.set_nonblocking(true);
    logi!("OSC", "listening on port {port}");

    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);

    let join = thread::Builder::new()
        .name("osc".to_string())
        .spawn(move || {
            let mut buf = [0u8; 2048];
            loop {
                if stop_rx.try_recv().is_ok() || !shared.running.load(Ordering::Relaxed) {
                    break;
                }
                match sock.recv_from(&mut buf) {
                    Ok((size, _from)) => {
                        if let Ok((_rest, pkt)) = rosc::decoder::decode_udp(&buf[..size]) {
                            handle_packet(pkt, &commands, &shared);
                        }
                    }
                    Err(_) => {
                        // no data
                        thread::sleep(Duration::from_millis(2));
                    }
                }
            }
            logi!("OSC", "stopped");
        })
        .expect("spawn osc thread");

    Some(OscListener { stop_tx, join: Some(join) })
}

fn handle_packet(pkt: OscPacket, commands: &CommandSet, shared: &SharedState) {
    match pkt {
        OscPacket::Message(msg) => {
            let line = message_to_line(&msg.addr, &msg.args);
            console::run_cmd(commands, shared, &line);
        }
        OscPacket::Bundle(bundle) => {
            for p in bundle.content {
                handle_packet(p, commands, shared);
            }
        }
    }
}

fn message_to_line(addr: &str, args: &[OscType]) -> String {
    let mut line = addr.trim_matches('/').replace('/', ",");
    for arg in args {
        let part = match arg {
            OscType::Float(f) => f.to_string(),
            OscType::Double(d) => d.to_string(),
            OscType::Int(i) => i.to_string(),
            OscType::Long(l) => l.to_string(),
            OscType::String(s) => s.clone(),
            OscType::Bool(b) => if *b { "on".to_string() } else { "off".to_string() },
            _ => continue,
        };
        line.push(',');
        line.push_str(&part);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_flatten_to_console_lines() {
        assert_eq!(
            message_to_line("/camera_distance", &[OscType::Float(5.0)]),
            "camera_distance,5"
        );
        assert_eq!(
            message_to_line("/u_color", &[OscType::Float(1.0), OscType::Float(0.0), OscType::Float(0.0)]),
            "u_color,1,0,0"
        );
        assert_eq!(
            message_to_line("/define/DEBUG", &[]),
            "define,DEBUG"
        );
        assert_eq!(message_to_line("/cursor", &[OscType::Bool(false)]), "cursor,off");
    }
}
