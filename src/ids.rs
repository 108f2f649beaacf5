//! Typed identifiers for the surface's knobs and pads.
//!
//! The MiniLab exposes 16 knobs and 16 pads. Keeping them as closed enums
//! (rather than raw integers) lets the router and sweep engine match
//! exhaustively and keeps the device constants (CC numbers, SysEx
//! identifiers, pad note values) in one place.

use std::fmt;

/// SysEx identifier for each knob, in knob order. These are fixed by the
/// device firmware and do not follow the CC numbering.
const KNOB_SYSEX_IDS: [u8; 16] = [
    0x30, 0x01, 0x02, 0x09, 0x0B, 0x0C, 0x0D, 0x0E, 0x33, 0x03, 0x04, 0x0A, 0x05, 0x06, 0x07, 0x08,
];

/// One of the surface's 16 knobs (a controllable parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ParamId {
    Knob1,
    Knob2,
    Knob3,
    Knob4,
    Knob5,
    Knob6,
    Knob7,
    Knob8,
    Knob9,
    Knob10,
    Knob11,
    Knob12,
    Knob13,
    Knob14,
    Knob15,
    Knob16,
}

impl ParamId {
    /// All knobs in panel order.
    pub const ALL: [ParamId; 16] = [
        ParamId::Knob1,
        ParamId::Knob2,
        ParamId::Knob3,
        ParamId::Knob4,
        ParamId::Knob5,
        ParamId::Knob6,
        ParamId::Knob7,
        ParamId::Knob8,
        ParamId::Knob9,
        ParamId::Knob10,
        ParamId::Knob11,
        ParamId::Knob12,
        ParamId::Knob13,
        ParamId::Knob14,
        ParamId::Knob15,
        ParamId::Knob16,
    ];

    /// Knob by zero-based index (0..=15).
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Zero-based index of this knob.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The CC number this knob emits when turned. Knobs occupy the
    /// contiguous CC range 102..=117, as programmed in the MIDI Control
    /// Center.
    pub fn cc(self) -> u8 {
        102 + self as u8
    }

    /// Knob for a given CC number, if it falls in the knob range.
    pub fn from_cc(cc: u8) -> Option<Self> {
        if (102..=117).contains(&cc) {
            Self::from_index(cc - 102)
        } else {
            None
        }
    }

    /// Firmware SysEx identifier used to move this knob's on-screen position.
    pub fn sysex_id(self) -> u8 {
        KNOB_SYSEX_IDS[self.index()]
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "knob{}", *self as u8 + 1)
    }
}

/// One of the surface's 16 pads. Doubles as the gesture key that identifies
/// a sweep in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PadId {
    Pad1,
    Pad2,
    Pad3,
    Pad4,
    Pad5,
    Pad6,
    Pad7,
    Pad8,
    Pad9,
    Pad10,
    Pad11,
    Pad12,
    Pad13,
    Pad14,
    Pad15,
    Pad16,
}

impl PadId {
    /// All pads in panel order.
    pub const ALL: [PadId; 16] = [
        PadId::Pad1,
        PadId::Pad2,
        PadId::Pad3,
        PadId::Pad4,
        PadId::Pad5,
        PadId::Pad6,
        PadId::Pad7,
        PadId::Pad8,
        PadId::Pad9,
        PadId::Pad10,
        PadId::Pad11,
        PadId::Pad12,
        PadId::Pad13,
        PadId::Pad14,
        PadId::Pad15,
        PadId::Pad16,
    ];

    /// Pad by zero-based index (0..=15).
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Zero-based index of this pad.
    pub fn index(self) -> usize {
        self as usize
    }

    /// The note number this pad emits when struck. The pads are programmed
    /// to the bottom of the note range (C-1 upward), so note value == index.
    pub fn note(self) -> u8 {
        self as u8
    }

    /// Pad for a given note number, if it falls in the pad range.
    pub fn from_note(note: u8) -> Option<Self> {
        Self::from_index(note)
    }

    /// Firmware SysEx identifier used to set this pad's LED color.
    pub fn sysex_id(self) -> u8 {
        0x70 + self as u8
    }
}

impl fmt::Display for PadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pad{}", self.note())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn knob_cc_range() {
        assert_eq!(ParamId::Knob1.cc(), 102);
        assert_eq!(ParamId::Knob16.cc(), 117);
        assert_eq!(ParamId::from_cc(102), Some(ParamId::Knob1));
        assert_eq!(ParamId::from_cc(117), Some(ParamId::Knob16));
        assert_eq!(ParamId::from_cc(101), None);
        assert_eq!(ParamId::from_cc(118), None);
    }

    #[test]
    fn knob_sysex_ids_match_firmware_table() {
        assert_eq!(ParamId::Knob1.sysex_id(), 0x30);
        assert_eq!(ParamId::Knob9.sysex_id(), 0x33);
        assert_eq!(ParamId::Knob16.sysex_id(), 0x08);
    }

    #[test]
    fn pad_notes_and_sysex_ids() {
        assert_eq!(PadId::Pad1.note(), 0);
        assert_eq!(PadId::Pad16.note(), 15);
        assert_eq!(PadId::from_note(5), Some(PadId::Pad6));
        assert_eq!(PadId::from_note(16), None);
        assert_eq!(PadId::Pad1.sysex_id(), 0x70);
        assert_eq!(PadId::Pad16.sysex_id(), 0x7F);
    }

    #[test]
    fn index_round_trip() {
        for (i, knob) in ParamId::ALL.iter().enumerate() {
            assert_eq!(ParamId::from_index(i as u8), Some(*knob));
            assert_eq!(knob.index(), i);
        }
        for (i, pad) in PadId::ALL.iter().enumerate() {
            assert_eq!(PadId::from_index(i as u8), Some(*pad));
            assert_eq!(pad.index(), i);
        }
    }
}
