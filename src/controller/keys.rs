//! Performance keyboard ("keys" role).
//!
//! Mostly a pass-through to the DAW, with one transformation: in bass mode,
//! notes at or below the bass ceiling have their velocity scaled down by the
//! expression pedal, coupling the pedal and key streams through controller
//! state. The curve is linear and truncating, kept bit-for-bit compatible
//! with the rig this replaces.

use tracing::{debug, trace};

use super::{report, Outbound, Reject};
use crate::config::KeysConfig;
use crate::midi::{note_name, MidiMessage};

pub struct KeysController {
    cfg: KeysConfig,
    /// Velocity remap enabled (asked at startup).
    bass_mode: bool,
    /// Last seen expression pedal value. A note struck before any pedal
    /// motion sees 0, i.e. passes at full velocity.
    expression: u8,
}

impl KeysController {
    pub fn new(cfg: KeysConfig, bass_mode: bool) -> Self {
        Self {
            cfg,
            bass_mode,
            expression: 0,
        }
    }

    /// Process one inbound message, returning the outbound messages in
    /// emission order.
    pub fn handle(&mut self, msg: &MidiMessage) -> Vec<Outbound> {
        let channel = match msg.channel() {
            Some(channel) => channel,
            None => {
                if let MidiMessage::System { bytes } = msg {
                    report("keys", &Reject::UnexpectedSystemMessage(bytes.len()));
                }
                return Vec::new();
            }
        };

        let on_primary = channel == self.cfg.channel;
        if !on_primary && Some(channel) != self.cfg.alt_channel {
            report("keys", &Reject::UnexpectedChannel(channel));
            return Vec::new();
        }

        match *msg {
            MidiMessage::ControlChange { cc, value, .. }
                if on_primary && cc == self.cfg.expression_cc =>
            {
                trace!("Expression pedal -> {}", value);
                self.expression = value;
                vec![Outbound::Synth(msg.clone())]
            }
            MidiMessage::NoteOn { channel, note, velocity }
                if on_primary && self.bass_mode && note <= self.cfg.bass_ceiling =>
            {
                let scaled = scale_velocity(velocity, self.expression);
                debug!(
                    "Bass remap {}: v{} -> v{} (expression {})",
                    note_name(note),
                    velocity,
                    scaled,
                    self.expression
                );
                vec![Outbound::Synth(MidiMessage::NoteOn {
                    channel,
                    note,
                    velocity: scaled,
                })]
            }
            // The secondary channel carries the device's alternate velocity
            // curve and bypasses the remap entirely.
            _ => vec![Outbound::Synth(msg.clone())],
        }
    }
}

/// `floor(velocity * (127 - expression) / 127)`: expression 0 passes the
/// velocity through, expression 127 floors it to 0.
fn scale_velocity(velocity: u8, expression: u8) -> u8 {
    (u16::from(velocity) * u16::from(127 - expression.min(127)) / 127) as u8
}
