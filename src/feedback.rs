//! MiniLab SysEx feedback encoding.
//!
//! The surface keeps no logical state of its own: whenever the router moves a
//! parameter or runs a sweep, it sends one of these frames back to the
//! device's *input* side so the on-screen knob positions and pad LEDs track
//! reality. Pure encode functions, no state.

use crate::ids::{PadId, ParamId};

/// Fixed envelope of every MiniLab feedback frame:
/// `F0 00 20 6B 7F 42 02 00` (Arturia manufacturer id + write command).
const ENVELOPE: [u8; 8] = [0xF0, 0x00, 0x20, 0x6B, 0x7F, 0x42, 0x02, 0x00];

/// Target selector for knob-position writes.
const TARGET_KNOB: u8 = 0x00;
/// Target selector for pad-color writes.
const TARGET_PAD: u8 = 0x10;

/// Pad LED color codes understood by the firmware.
pub mod color {
    pub const BLACK: u8 = 0;
    pub const RED: u8 = 1;
    pub const GREEN: u8 = 4;
    pub const YELLOW: u8 = 5;
    pub const BLUE: u8 = 16;
    pub const MAGENTA: u8 = 17;
    pub const CYAN: u8 = 20;
    pub const WHITE: u8 = 127;
}

/// Build the 12-byte frame that moves a knob's displayed position to `value`.
pub fn knob_position(param: ParamId, value: u8) -> Vec<u8> {
    frame(TARGET_KNOB, param.sysex_id(), value & 0x7F)
}

/// Build the 12-byte frame that sets a pad's LED to `color`.
pub fn pad_color(pad: PadId, color: u8) -> Vec<u8> {
    frame(TARGET_PAD, pad.sysex_id(), color & 0x7F)
}

/// Color for animation step `step` of a sweep: even steps show the pad's
/// resting color, odd steps the highlight (a black pad pulses green, any
/// other color pulses black). Step 0 therefore gives the resting color,
/// which is what cancel/refresh paths want.
pub fn pulse_color(resting: u8, step: u32) -> u8 {
    if step % 2 == 1 {
        if resting == color::BLACK {
            color::GREEN
        } else {
            color::BLACK
        }
    } else {
        resting
    }
}

fn frame(target: u8, id: u8, value: u8) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(12);
    bytes.extend_from_slice(&ENVELOPE);
    bytes.extend_from_slice(&[target, id, value, 0xF7]);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn knob_position_frame() {
        // Knob 2 has firmware id 0x01
        assert_eq!(
            knob_position(ParamId::Knob2, 64),
            vec![0xF0, 0x00, 0x20, 0x6B, 0x7F, 0x42, 0x02, 0x00, 0x00, 0x01, 64, 0xF7]
        );
    }

    #[test]
    fn pad_color_frame() {
        assert_eq!(
            pad_color(PadId::Pad1, color::GREEN),
            vec![0xF0, 0x00, 0x20, 0x6B, 0x7F, 0x42, 0x02, 0x00, 0x10, 0x70, 4, 0xF7]
        );
    }

    #[test]
    fn frames_are_twelve_bytes_and_terminated() {
        let f = knob_position(ParamId::Knob16, 127);
        assert_eq!(f.len(), 12);
        assert_eq!(f[0], 0xF0);
        assert_eq!(*f.last().unwrap(), 0xF7);
    }

    #[test]
    fn pulse_alternates() {
        // Resting cyan: odd steps go dark, even steps restore.
        assert_eq!(pulse_color(color::CYAN, 0), color::CYAN);
        assert_eq!(pulse_color(color::CYAN, 1), color::BLACK);
        assert_eq!(pulse_color(color::CYAN, 2), color::CYAN);
        // Resting black: odd steps flash green.
        assert_eq!(pulse_color(color::BLACK, 1), color::GREEN);
        assert_eq!(pulse_color(color::BLACK, 2), color::BLACK);
    }
}
