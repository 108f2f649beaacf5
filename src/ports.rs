//! MIDI port layer.
//!
//! Thin wrapper over midir exposing the four operations the core consumes:
//! enumerate, open input (with callback), open output, send. Ports are
//! matched by case-insensitive substring of their name, which is the only
//! stable way to find devices across hosts (Windows suffixes port names with
//! an index). Port identity beyond that is opaque to the rest of the crate.

use anyhow::{anyhow, Context, Result};
use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::midi::{format_hex, MidiMessage};

/// List available MIDI input port names
pub fn list_input_ports() -> Result<Vec<String>> {
    let midi_in = MidiInput::new("minilab-gw-scan").context("Failed to create MIDI input")?;
    Ok(midi_in
        .ports()
        .iter()
        .filter_map(|port| midi_in.port_name(port).ok())
        .collect())
}

/// List available MIDI output port names
pub fn list_output_ports() -> Result<Vec<String>> {
    let midi_out = MidiOutput::new("minilab-gw-scan").context("Failed to create MIDI output")?;
    Ok(midi_out
        .ports()
        .iter()
        .filter_map(|port| midi_out.port_name(port).ok())
        .collect())
}

/// Print enumerated ports for `--list-ports`.
pub fn print_ports() -> Result<()> {
    use colored::Colorize;

    println!("{}", "MIDI input ports".bold());
    for (i, name) in list_input_ports()?.iter().enumerate() {
        println!("  {}: {}", i, name);
    }
    println!("{}", "MIDI output ports".bold());
    for (i, name) in list_output_ports()?.iter().enumerate() {
        println!("  {}: {}", i, name);
    }
    Ok(())
}

/// Open the input port whose name contains `pattern` (case-insensitive) and
/// forward every classified message into `tx`. The returned connection must
/// be kept alive for the callback to keep firing.
pub fn open_input(
    client_name: &str,
    pattern: &str,
    tx: mpsc::UnboundedSender<MidiMessage>,
) -> Result<MidiInputConnection<()>> {
    let midi_in = MidiInput::new(client_name).context("Failed to create MIDI input")?;

    let (port, name) = find_port(
        midi_in.ports(),
        |p| midi_in.port_name(p).ok(),
        pattern,
    )
    .ok_or_else(|| anyhow!("No MIDI input port matching '{}'", pattern))?;

    info!("Connecting input '{}' (pattern '{}')", name, pattern);

    let conn = midi_in
        .connect(
            &port,
            client_name,
            move |_timestamp, data, _| match MidiMessage::parse(data) {
                Some(msg) => {
                    let _ = tx.send(msg);
                }
                None => debug!("Dropping truncated MIDI: {}", format_hex(data)),
            },
            (),
        )
        .map_err(|e| anyhow!("Failed to connect to input '{}': {}", name, e))?;

    Ok(conn)
}

/// Open the output port whose name contains `pattern` (case-insensitive).
pub fn open_output(client_name: &str, pattern: &str) -> Result<OutputHandle> {
    let midi_out = MidiOutput::new(client_name).context("Failed to create MIDI output")?;

    let (port, name) = find_port(
        midi_out.ports(),
        |p| midi_out.port_name(p).ok(),
        pattern,
    )
    .ok_or_else(|| anyhow!("No MIDI output port matching '{}'", pattern))?;

    info!("Connecting output '{}' (pattern '{}')", name, pattern);

    let conn = midi_out
        .connect(&port, client_name)
        .map_err(|e| anyhow!("Failed to connect to output '{}': {}", name, e))?;

    Ok(OutputHandle {
        name,
        conn: Arc::new(Mutex::new(conn)),
    })
}

fn find_port<P>(
    ports: Vec<P>,
    port_name: impl Fn(&P) -> Option<String>,
    pattern: &str,
) -> Option<(P, String)> {
    let pattern = pattern.to_lowercase();
    for port in ports {
        if let Some(name) = port_name(&port) {
            if name.to_lowercase().contains(&pattern) {
                debug!("Found port '{}' matching pattern '{}'", name, pattern);
                return Some((port, name));
            }
        }
    }
    None
}

/// Shareable handle to an open MIDI output connection.
#[derive(Clone)]
pub struct OutputHandle {
    name: String,
    conn: Arc<Mutex<MidiOutputConnection>>,
}

impl OutputHandle {
    pub fn send(&self, bytes: &[u8]) -> Result<()> {
        self.conn
            .lock()
            .send(bytes)
            .map_err(|e| anyhow!("Failed to send to '{}': {}", self.name, e))?;
        debug!("-> {}: {}", self.name, format_hex(bytes));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_port_is_case_insensitive_substring() {
        let ports = vec!["LoopBe Internal MIDI 1", "Arturia MiniLab mkII 0"];
        let found = find_port(ports, |p| Some(p.to_string()), "arturia");
        assert_eq!(found.map(|(_, name)| name), Some("Arturia MiniLab mkII 0".to_string()));
    }

    #[test]
    fn find_port_misses_cleanly() {
        let ports = vec!["LoopBe Internal MIDI 1"];
        assert!(find_port(ports, |p| Some(p.to_string()), "umc").is_none());
    }

    #[test]
    fn enumeration_does_not_panic() {
        let _ = list_input_ports();
        let _ = list_output_ports();
    }
}
