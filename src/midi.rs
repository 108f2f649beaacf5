//! MIDI message classification and encoding.
//!
//! Decodes raw wire bytes into a closed set of message kinds so the
//! controllers can match exhaustively. Channels are carried 1-based (1..=16),
//! the way the hardware manuals and the rest of this codebase talk about them.

use std::fmt;

/// A classified MIDI message.
///
/// Every status byte maps to exactly one variant: channel voice messages
/// (0x80..=0xEF) decode to their kind, and anything 0xF0..=0xFF (SysEx,
/// clock, active sensing) lands in [`MidiMessage::System`] with the raw
/// buffer kept intact. The controllers decide whether to log-and-drop or
/// pass system traffic through; this layer never inspects it further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note Off: channel (1-16), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Note On: channel (1-16), note (0-127), velocity (0-127).
    ///
    /// Velocity 0 is *not* rewritten to NoteOff: the pad surface sends
    /// NoteOn for both press and release and the toggle logic needs to see
    /// exactly what arrived.
    NoteOn { channel: u8, note: u8, velocity: u8 },

    /// Polyphonic Key Pressure: channel (1-16), note (0-127), pressure (0-127)
    PolyPressure { channel: u8, note: u8, pressure: u8 },

    /// Control Change: channel (1-16), cc (0-127), value (0-127)
    ControlChange { channel: u8, cc: u8, value: u8 },

    /// Program Change: channel (1-16), program (0-127)
    ProgramChange { channel: u8, program: u8 },

    /// Channel Pressure: channel (1-16), pressure (0-127)
    ChannelPressure { channel: u8, pressure: u8 },

    /// Pitch Bend: channel (1-16), value (0-16383, 14-bit)
    PitchBend { channel: u8, value: u16 },

    /// Any system message (0xF0..=0xFF), raw bytes retained undecoded.
    System { bytes: Vec<u8> },
}

impl MidiMessage {
    /// Parse a MIDI message from raw bytes.
    ///
    /// Total over status values: every leading byte classifies to exactly one
    /// kind. Returns `None` only for an empty or truncated buffer. A leading
    /// data byte (< 0x80, i.e. running status, which midir never delivers)
    /// is tagged `System` so the controllers can flag it as unexpected.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let status = *data.first()?;

        if !(0x80..0xF0).contains(&status) {
            return Some(MidiMessage::System {
                bytes: data.to_vec(),
            });
        }

        let channel = (status & 0x0F) + 1;

        match status & 0xF0 {
            0x80 => {
                if data.len() < 3 {
                    return None;
                }
                Some(MidiMessage::NoteOff {
                    channel,
                    note: data[1] & 0x7F,
                    velocity: data[2] & 0x7F,
                })
            }
            0x90 => {
                if data.len() < 3 {
                    return None;
                }
                Some(MidiMessage::NoteOn {
                    channel,
                    note: data[1] & 0x7F,
                    velocity: data[2] & 0x7F,
                })
            }
            0xA0 => {
                if data.len() < 3 {
                    return None;
                }
                Some(MidiMessage::PolyPressure {
                    channel,
                    note: data[1] & 0x7F,
                    pressure: data[2] & 0x7F,
                })
            }
            0xB0 => {
                if data.len() < 3 {
                    return None;
                }
                Some(MidiMessage::ControlChange {
                    channel,
                    cc: data[1] & 0x7F,
                    value: data[2] & 0x7F,
                })
            }
            0xC0 => {
                if data.len() < 2 {
                    return None;
                }
                Some(MidiMessage::ProgramChange {
                    channel,
                    program: data[1] & 0x7F,
                })
            }
            0xD0 => {
                if data.len() < 2 {
                    return None;
                }
                Some(MidiMessage::ChannelPressure {
                    channel,
                    pressure: data[1] & 0x7F,
                })
            }
            0xE0 => {
                if data.len() < 3 {
                    return None;
                }
                let lsb = (data[1] & 0x7F) as u16;
                let msb = (data[2] & 0x7F) as u16;
                Some(MidiMessage::PitchBend {
                    channel,
                    value: (msb << 7) | lsb,
                })
            }
            _ => unreachable!("status masked to channel-voice range"),
        }
    }

    /// Encode the message to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                vec![0x80 | ((channel - 1) & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                vec![0x90 | ((channel - 1) & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            MidiMessage::PolyPressure { channel, note, pressure } => {
                vec![0xA0 | ((channel - 1) & 0x0F), note & 0x7F, pressure & 0x7F]
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                vec![0xB0 | ((channel - 1) & 0x0F), cc & 0x7F, value & 0x7F]
            }
            MidiMessage::ProgramChange { channel, program } => {
                vec![0xC0 | ((channel - 1) & 0x0F), program & 0x7F]
            }
            MidiMessage::ChannelPressure { channel, pressure } => {
                vec![0xD0 | ((channel - 1) & 0x0F), pressure & 0x7F]
            }
            MidiMessage::PitchBend { channel, value } => {
                let lsb = (value & 0x7F) as u8;
                let msb = ((value >> 7) & 0x7F) as u8;
                vec![0xE0 | ((channel - 1) & 0x0F), lsb, msb]
            }
            MidiMessage::System { ref bytes } => bytes.clone(),
        }
    }

    /// Channel for channel-voice messages (1-16), `None` for system traffic.
    pub fn channel(&self) -> Option<u8> {
        match *self {
            MidiMessage::NoteOff { channel, .. }
            | MidiMessage::NoteOn { channel, .. }
            | MidiMessage::PolyPressure { channel, .. }
            | MidiMessage::ControlChange { channel, .. }
            | MidiMessage::ProgramChange { channel, .. }
            | MidiMessage::ChannelPressure { channel, .. }
            | MidiMessage::PitchBend { channel, .. } => Some(channel),
            MidiMessage::System { .. } => None,
        }
    }

    /// Check if this is a system message
    pub fn is_system(&self) -> bool {
        matches!(self, MidiMessage::System { .. })
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                write!(f, "NoteOff ch:{} n:{} v:{}", channel, note, velocity)
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                write!(f, "NoteOn ch:{} n:{} v:{}", channel, note, velocity)
            }
            MidiMessage::PolyPressure { channel, note, pressure } => {
                write!(f, "PolyPressure ch:{} n:{} p:{}", channel, note, pressure)
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                write!(f, "CC ch:{} cc:{} v:{}", channel, cc, value)
            }
            MidiMessage::ProgramChange { channel, program } => {
                write!(f, "ProgramChange ch:{} p:{}", channel, program)
            }
            MidiMessage::ChannelPressure { channel, pressure } => {
                write!(f, "ChannelPressure ch:{} p:{}", channel, pressure)
            }
            MidiMessage::PitchBend { channel, value } => {
                write!(f, "PitchBend ch:{} v:{}", channel, value)
            }
            MidiMessage::System { ref bytes } => {
                write!(f, "System {} bytes [{}]", bytes.len(), format_hex(bytes))
            }
        }
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// English note name for a MIDI note number, e.g. 60 -> "C4".
///
/// Octave numbering follows the convention where middle C (60) is C4.
pub fn note_name(note: u8) -> String {
    const NAMES: [&str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];
    let octave = (note as i16 / 12) - 1;
    format!("{}{}", NAMES[(note % 12) as usize], octave)
}
