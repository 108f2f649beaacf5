//! Pad/knob surface ("surface" role).
//!
//! Owns the per-device state: knob values, held toggle notes, the rotary
//! flag, the sweep target, and the dual-zone pitch remap. Drives the sweep
//! engine for pad gestures and keeps the device's LEDs and knob positions
//! honest through SysEx feedback.
//!
//! Zone layout on the mini keyboard, top of the note map down:
//! - notes 0..=15: the 16 pads (sweep gestures, two of them rotary switches)
//! - C3..B3 (48..=59): base-pitch select, flushes held notes
//! - C4..B4 (60..=71): octave zone, toggles `base_pitch + 12 * offset`

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::{report, Outbound, Reject};
use crate::config::{SurfaceConfig, SweepConfig};
use crate::feedback;
use crate::ids::{PadId, ParamId};
use crate::midi::{note_name, MidiMessage};
use crate::sweep::{self, ParamStore, SweepRegistry, SweepSpec};

/// Keys that select a new base pitch (C3..B3).
const BASE_WINDOW: RangeInclusive<u8> = 48..=59;
/// A key here maps to the pitch one octave-pair down (C3 selects C1).
const BASE_WINDOW_OFFSET: u8 = 24;
/// Keys that toggle a remapped note (C4..B4).
const OCTAVE_WINDOW: RangeInclusive<u8> = 60..=71;

pub struct SurfaceController {
    cfg: SurfaceConfig,
    sweep_cfg: SweepConfig,
    /// Knob values, shared with sweep tasks.
    params: ParamStore,
    /// Active sweeps, shared with sweep tasks.
    registry: SweepRegistry,
    /// Channel sweep tasks emit through.
    sweep_out: mpsc::UnboundedSender<Outbound>,
    /// Currently-sounding toggled notes. A note appears at most once;
    /// NoteOn for a present note means "turn it off".
    held_notes: BTreeSet<u8>,
    rotary_on: bool,
    /// Knob all sweeps converge toward.
    target: ParamId,
    base_pitch: u8,
    octave_offset: u8,
}

impl SurfaceController {
    pub fn new(
        cfg: SurfaceConfig,
        sweep_cfg: SweepConfig,
        registry: SweepRegistry,
        sweep_out: mpsc::UnboundedSender<Outbound>,
    ) -> Self {
        let mut initial = [0u8; 16];
        for (slot, value) in initial.iter_mut().zip(cfg.initial_values.iter()) {
            *slot = *value & 0x7F;
        }
        Self {
            params: ParamStore::new(initial),
            target: cfg.initial_target(),
            base_pitch: cfg.base_pitch,
            sweep_cfg,
            registry,
            sweep_out,
            held_notes: BTreeSet::new(),
            rotary_on: false,
            octave_offset: 0,
            cfg,
        }
    }

    /// Feedback bringing the device in line with the gateway's state: one
    /// value CC, one resting pad color, and one knob position per knob/pad
    /// pair. Sent to the device at startup.
    pub fn init_sync(&self) -> Vec<Outbound> {
        let mut out = Vec::with_capacity(48);
        let values = self.params.snapshot();
        for ((param, pad), value) in ParamId::ALL.iter().zip(PadId::ALL.iter()).zip(values) {
            out.push(Outbound::Feedback(
                MidiMessage::ControlChange {
                    channel: self.cfg.channel,
                    cc: param.cc(),
                    value,
                }
                .encode(),
            ));
            out.push(Outbound::Feedback(feedback::pad_color(
                *pad,
                self.cfg.resting_color(*pad),
            )));
            out.push(Outbound::Feedback(feedback::knob_position(*param, value)));
        }
        out
    }

    /// Process one inbound message, returning the outbound messages in
    /// emission order. Sweeps spawned here emit asynchronously through the
    /// channel handed to [`SurfaceController::new`].
    pub fn handle(&mut self, msg: &MidiMessage) -> Vec<Outbound> {
        let channel = match msg.channel() {
            Some(channel) => channel,
            None => {
                if let MidiMessage::System { bytes } = msg {
                    report("surface", &Reject::UnexpectedSystemMessage(bytes.len()));
                }
                return Vec::new();
            }
        };
        if channel != self.cfg.channel {
            report("surface", &Reject::UnexpectedChannel(channel));
            return Vec::new();
        }

        match *msg {
            // The pads send NoteOn for press and release both; releases are
            // untrustworthy, so the toggle logic owns note lifetime.
            MidiMessage::NoteOff { note, .. } => {
                trace!("Swallowing NoteOff for {}", note_name(note));
                Vec::new()
            }
            // The pad surface emits spurious pressure data.
            MidiMessage::ChannelPressure { .. } | MidiMessage::PolyPressure { .. } => {
                trace!("Ignoring pad aftertouch");
                Vec::new()
            }
            MidiMessage::ControlChange { cc, value, .. } => self.handle_cc(cc, value, msg),
            MidiMessage::NoteOn { note, velocity, .. } => self.handle_note_on(note, velocity),
            _ => {
                warn!("[surface] Forwarding unexpected message: {}", msg);
                vec![Outbound::Synth(msg.clone())]
            }
        }
    }

    fn handle_cc(&mut self, cc: u8, value: u8, msg: &MidiMessage) -> Vec<Outbound> {
        if cc == self.cfg.mod_wheel_cc {
            // Mod wheel edits the targeted knob in place; feedback only,
            // the DAW hears about it when something sweeps or forwards it.
            let target = self.target;
            self.params.set(target, value);
            debug!("Mod wheel sets {} = {}", target, value);
            return vec![Outbound::Feedback(feedback::knob_position(target, value))];
        }

        if cc == self.cfg.target_select_cc {
            if let Some(param) = ParamId::from_index(value / 8) {
                debug!("Sweep target -> {}", param);
                self.target = param;
            }
            return Vec::new();
        }

        if let Some(param) = ParamId::from_cc(cc) {
            let mut out = Vec::new();
            // A human turning the knob overrides any sweep driving it.
            for pad in self.cfg.pads_linked_to(param) {
                if self.registry.cancel(pad) {
                    debug!("Knob {} overrides active sweep for {}", param, pad);
                    out.push(Outbound::Feedback(feedback::pad_color(
                        pad,
                        self.cfg.resting_color(pad),
                    )));
                }
            }
            self.params.set(param, value);
            if !out.is_empty() {
                // Snap the display to the human's number, not the sweep's.
                out.push(Outbound::Feedback(feedback::knob_position(param, value)));
            }
            out.push(Outbound::Synth(msg.clone()));
            return out;
        }

        vec![Outbound::Synth(msg.clone())]
    }

    fn handle_note_on(&mut self, note: u8, velocity: u8) -> Vec<Outbound> {
        if self.cfg.is_rotary_pad(note) {
            self.rotary_on = !self.rotary_on;
            let value = if self.rotary_on { 127 } else { 0 };
            debug!(
                "Rotary toggle -> {}",
                if self.rotary_on { "on" } else { "off" }
            );
            return vec![Outbound::Synth(MidiMessage::ControlChange {
                channel: self.cfg.channel,
                cc: self.cfg.rotary_cc,
                value,
            })];
        }

        if let Some(pad) = PadId::from_note(note) {
            return self.start_or_cancel_sweep(pad, velocity);
        }

        if BASE_WINDOW.contains(&note) {
            self.base_pitch = note - BASE_WINDOW_OFFSET;
            debug!("Base pitch -> {}", note_name(self.base_pitch));
            return self.flush_held_notes();
        }

        if OCTAVE_WINDOW.contains(&note) {
            self.octave_offset = note - OCTAVE_WINDOW.start();
            let pitch = u16::from(self.base_pitch) + 12 * u16::from(self.octave_offset);
            if pitch > 127 {
                report(
                    "surface",
                    &Reject::UnmappedGesture(note, format!("remapped pitch {} out of range", pitch)),
                );
                return Vec::new();
            }
            return self.toggle_note(pitch as u8, velocity);
        }

        report("surface", &Reject::UnmappedGesture(note, note_name(note)));
        Vec::new()
    }

    /// Flip-flop a remapped note on the note output channel.
    fn toggle_note(&mut self, pitch: u8, velocity: u8) -> Vec<Outbound> {
        let channel = self.cfg.note_output_channel;
        if self.held_notes.remove(&pitch) {
            debug!("Toggle {} off", note_name(pitch));
            vec![Outbound::Synth(MidiMessage::NoteOff {
                channel,
                note: pitch,
                velocity: 0,
            })]
        } else {
            self.held_notes.insert(pitch);
            debug!("Toggle {} on", note_name(pitch));
            vec![Outbound::Synth(MidiMessage::NoteOn {
                channel,
                note: pitch,
                velocity,
            })]
        }
    }

    /// Explicit NoteOff for every held note, then clear. Run whenever the
    /// base pitch moves so nothing is left sounding at the old pitch.
    fn flush_held_notes(&mut self) -> Vec<Outbound> {
        let channel = self.cfg.note_output_channel;
        let out = self
            .held_notes
            .iter()
            .map(|&note| {
                Outbound::Synth(MidiMessage::NoteOff {
                    channel,
                    note,
                    velocity: 0,
                })
            })
            .collect();
        self.held_notes.clear();
        out
    }

    /// Toggle-to-cancel gesture semantics: a pad with a running sweep
    /// cancels it; otherwise a new sweep starts toward the current target.
    fn start_or_cancel_sweep(&mut self, pad: PadId, velocity: u8) -> Vec<Outbound> {
        if self.registry.cancel(pad) {
            // The dying task snaps the knob display; restore the LED here.
            debug!("Repeated gesture cancels sweep for {}", pad);
            return vec![Outbound::Feedback(feedback::pad_color(
                pad,
                self.cfg.resting_color(pad),
            ))];
        }

        let param = match self.cfg.pad_link(pad) {
            Some(param) => param,
            None => {
                report(
                    "surface",
                    &Reject::UnmappedGesture(pad.note(), format!("{} has no linked knob", pad)),
                );
                return Vec::new();
            }
        };

        let cancel = match self.registry.register(pad) {
            Some(cancel) => cancel,
            // Unreachable in practice: handle() runs on a single dispatch
            // context, so nothing can register between cancel() and here.
            None => return Vec::new(),
        };

        let spec = SweepSpec {
            pad,
            param,
            target: self.target,
            channel: self.cfg.channel,
            steps: self.sweep_cfg.steps,
            step_delay: sweep::step_delay(velocity, self.sweep_cfg.step_micros_factor),
            resting_color: self.cfg.resting_color(pad),
        };
        sweep::spawn(
            spec,
            self.registry.clone(),
            cancel,
            self.params.clone(),
            self.sweep_out.clone(),
        );
        Vec::new()
    }

    /// Shared knob value store (also read by sweep tasks).
    pub fn params(&self) -> &ParamStore {
        &self.params
    }

    /// Knob sweeps currently converge toward.
    pub fn target(&self) -> ParamId {
        self.target
    }

    /// Whether a remapped note is currently sounding.
    pub fn is_holding(&self, pitch: u8) -> bool {
        self.held_notes.contains(&pitch)
    }

    /// Number of currently-sounding remapped notes.
    pub fn held_count(&self) -> usize {
        self.held_notes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn make_surface(
        tweak: impl FnOnce(&mut SurfaceConfig, &mut SweepConfig),
    ) -> (
        SurfaceController,
        SweepRegistry,
        mpsc::UnboundedReceiver<Outbound>,
    ) {
        let mut cfg = SurfaceConfig::default();
        let mut sweep_cfg = SweepConfig::default();
        tweak(&mut cfg, &mut sweep_cfg);
        let registry = SweepRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let surface = SurfaceController::new(cfg, sweep_cfg, registry.clone(), tx);
        (surface, registry, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Outbound>) -> Vec<Outbound> {
        let mut all = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            all.push(msg);
        }
        all
    }

    fn synth_cc_values(outputs: &[Outbound], cc_wanted: u8) -> Vec<u8> {
        outputs
            .iter()
            .filter_map(|o| match o {
                Outbound::Synth(MidiMessage::ControlChange { cc, value, .. })
                    if *cc == cc_wanted =>
                {
                    Some(*value)
                }
                _ => None,
            })
            .collect()
    }

    // Sleeps before the first check so a task cancelled this tick still gets
    // polled to completion before the caller drains the channel.
    async fn wait_idle(registry: &SweepRegistry) {
        timeout(Duration::from_secs(5), async {
            loop {
                tokio::time::sleep(Duration::from_millis(1)).await;
                if registry.is_empty() {
                    break;
                }
            }
        })
        .await
        .expect("sweeps should settle");
    }

    #[test]
    fn channel_mismatch_is_dropped() {
        let (mut surface, _, _) = make_surface(|_, _| {});
        // NoteOn, channel 4, pitch 60, velocity 100; surface owns channel 3
        let msg = MidiMessage::parse(&[0x93, 60, 100]).unwrap();
        assert!(surface.handle(&msg).is_empty());
    }

    #[test]
    fn system_message_is_dropped() {
        let (mut surface, _, _) = make_surface(|_, _| {});
        let msg = MidiMessage::parse(&[0xF0, 0x7E, 0x00, 0xF7]).unwrap();
        assert!(surface.handle(&msg).is_empty());
    }

    #[test]
    fn note_off_and_aftertouch_are_swallowed() {
        let (mut surface, _, _) = make_surface(|_, _| {});
        for msg in [
            MidiMessage::NoteOff { channel: 3, note: 60, velocity: 0 },
            MidiMessage::ChannelPressure { channel: 3, pressure: 90 },
            MidiMessage::PolyPressure { channel: 3, note: 4, pressure: 90 },
        ] {
            assert!(surface.handle(&msg).is_empty(), "{}", msg);
        }
    }

    #[test]
    fn octave_key_toggles_note_on_output_channel() {
        let (mut surface, _, _) = make_surface(|_, _| {});
        let press = MidiMessage::NoteOn { channel: 3, note: 60, velocity: 100 };

        // First press: NoteOn at base pitch (C1 = 24) on the note channel.
        let out = surface.handle(&press);
        assert_eq!(
            out,
            vec![Outbound::Synth(MidiMessage::NoteOn {
                channel: 2,
                note: 24,
                velocity: 100,
            })]
        );
        assert!(surface.is_holding(24));

        // Second press: the flip-flop turns it off.
        let out = surface.handle(&press);
        assert_eq!(
            out,
            vec![Outbound::Synth(MidiMessage::NoteOff {
                channel: 2,
                note: 24,
                velocity: 0,
            })]
        );
        assert_eq!(surface.held_count(), 0);
    }

    #[test]
    fn octave_offset_multiplies_by_twelve() {
        let (mut surface, _, _) = make_surface(|_, _| {});
        // D4 (62) is two octave steps above the zone start
        let out = surface.handle(&MidiMessage::NoteOn { channel: 3, note: 62, velocity: 90 });
        assert_eq!(
            out,
            vec![Outbound::Synth(MidiMessage::NoteOn {
                channel: 2,
                note: 24 + 24,
                velocity: 90,
            })]
        );
    }

    #[test]
    fn base_key_moves_pitch_and_flushes_held_notes() {
        let (mut surface, _, _) = make_surface(|_, _| {});
        surface.handle(&MidiMessage::NoteOn { channel: 3, note: 60, velocity: 100 }); // holds 24
        surface.handle(&MidiMessage::NoteOn { channel: 3, note: 61, velocity: 100 }); // holds 36
        assert_eq!(surface.held_count(), 2);

        // D3 selects D1 (26) as the new base and everything held goes quiet.
        let out = surface.handle(&MidiMessage::NoteOn { channel: 3, note: 50, velocity: 100 });
        assert_eq!(
            out,
            vec![
                Outbound::Synth(MidiMessage::NoteOff { channel: 2, note: 24, velocity: 0 }),
                Outbound::Synth(MidiMessage::NoteOff { channel: 2, note: 36, velocity: 0 }),
            ]
        );
        assert_eq!(surface.held_count(), 0);

        let out = surface.handle(&MidiMessage::NoteOn { channel: 3, note: 60, velocity: 100 });
        assert_eq!(
            out,
            vec![Outbound::Synth(MidiMessage::NoteOn { channel: 2, note: 26, velocity: 100 })]
        );
    }

    #[test]
    fn rotary_pad_flips_toggle_cc() {
        let (mut surface, _, _) = make_surface(|_, _| {});
        let out = surface.handle(&MidiMessage::NoteOn { channel: 3, note: 5, velocity: 100 });
        assert_eq!(
            out,
            vec![Outbound::Synth(MidiMessage::ControlChange { channel: 3, cc: 1, value: 127 })]
        );
        // The other rotary pad flips the same flag back.
        let out = surface.handle(&MidiMessage::NoteOn { channel: 3, note: 13, velocity: 100 });
        assert_eq!(
            out,
            vec![Outbound::Synth(MidiMessage::ControlChange { channel: 3, cc: 1, value: 0 })]
        );
    }

    #[test]
    fn mod_wheel_edits_target_with_feedback_only() {
        let (mut surface, _, _) = make_surface(|_, _| {});
        let out = surface.handle(&MidiMessage::ControlChange { channel: 3, cc: 1, value: 80 });
        assert_eq!(
            out,
            vec![Outbound::Feedback(feedback::knob_position(ParamId::Knob16, 80))]
        );
        assert_eq!(surface.params().get(ParamId::Knob16), 80);
    }

    #[test]
    fn target_select_cc_reassigns_target() {
        let (mut surface, _, _) = make_surface(|_, _| {});
        assert_eq!(surface.target(), ParamId::Knob16);
        let out = surface.handle(&MidiMessage::ControlChange { channel: 3, cc: 2, value: 40 });
        assert!(out.is_empty());
        assert_eq!(surface.target(), ParamId::Knob6);

        // Mod wheel now edits the new target.
        let out = surface.handle(&MidiMessage::ControlChange { channel: 3, cc: 1, value: 10 });
        assert_eq!(
            out,
            vec![Outbound::Feedback(feedback::knob_position(ParamId::Knob6, 10))]
        );
    }

    #[test]
    fn knob_turn_stores_and_forwards() {
        let (mut surface, _, _) = make_surface(|_, _| {});
        let msg = MidiMessage::ControlChange { channel: 3, cc: 104, value: 20 };
        let out = surface.handle(&msg);
        assert_eq!(out, vec![Outbound::Synth(msg)]);
        assert_eq!(surface.params().get(ParamId::Knob3), 20);
    }

    #[test]
    fn unexpected_kind_is_forwarded() {
        let (mut surface, _, _) = make_surface(|_, _| {});
        let msg = MidiMessage::PitchBend { channel: 3, value: 8192 };
        assert_eq!(surface.handle(&msg), vec![Outbound::Synth(msg)]);
    }

    #[test]
    fn out_of_window_note_is_dropped() {
        let (mut surface, _, _) = make_surface(|_, _| {});
        // Between the pads and the base window
        let out = surface.handle(&MidiMessage::NoteOn { channel: 3, note: 40, velocity: 100 });
        assert!(out.is_empty());
    }

    #[test]
    fn init_sync_covers_every_knob_and_pad() {
        let (surface, _, _) = make_surface(|_, _| {});
        let out = surface.init_sync();
        assert_eq!(out.len(), 48);
        // First knob/pad triple: value CC, resting color, knob position.
        assert_eq!(
            out[0],
            Outbound::Feedback(vec![0xB2, 102, 127]) // CC ch3, knob1, initial 127
        );
        assert_eq!(
            out[1],
            Outbound::Feedback(feedback::pad_color(PadId::Pad1, 20))
        );
        assert_eq!(
            out[2],
            Outbound::Feedback(feedback::knob_position(ParamId::Knob1, 127))
        );
    }

    #[tokio::test]
    async fn pad_gesture_sweeps_to_target() {
        // Pad note 5 drives knob6 (value 127); target knob16 sits at 0.
        let (mut surface, registry, mut rx) = make_surface(|cfg, sweep_cfg| {
            cfg.rotary_pads = Vec::new();
            sweep_cfg.step_micros_factor = 0;
        });

        let msg = MidiMessage::parse(&[0x92, 5, 64]).unwrap();
        assert!(surface.handle(&msg).is_empty());
        wait_idle(&registry).await;

        let outputs = drain(&mut rx);
        let values = synth_cc_values(&outputs, ParamId::Knob6.cc());
        assert_eq!(values.len(), 60);
        assert!(values.windows(2).all(|w| w[0] > w[1]));
        assert_eq!(*values.last().unwrap(), 0);
        assert_eq!(surface.params().get(ParamId::Knob6), 0);

        // One knob-position and one pad-color frame per step, one final snap.
        let feedback_frames = outputs
            .iter()
            .filter(|o| matches!(o, Outbound::Feedback(_)))
            .count();
        assert_eq!(feedback_frames, 60 * 2 + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_gesture_cancels_sweep() {
        let (mut surface, registry, mut rx) = make_surface(|cfg, _| {
            cfg.rotary_pads = Vec::new();
        });

        // Soft tap: ~484ms per step, so the sweep parks in its delay.
        let press = MidiMessage::NoteOn { channel: 3, note: 5, velocity: 1 };
        surface.handle(&press);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(registry.contains(PadId::Pad6));

        let out = surface.handle(&press);
        assert_eq!(
            out,
            vec![Outbound::Feedback(feedback::pad_color(PadId::Pad6, 0))]
        );
        wait_idle(&registry).await;

        let values = synth_cc_values(&drain(&mut rx), ParamId::Knob6.cc());
        assert!(!values.is_empty());
        assert!(values.len() < 60, "cancelled sweep must not complete");
    }

    #[tokio::test(start_paused = true)]
    async fn knob_turn_cancels_sweep_and_snaps_to_new_value() {
        let (mut surface, registry, mut rx) = make_surface(|cfg, _| {
            cfg.rotary_pads = Vec::new();
        });

        // Pad note 0 drives knob1 (127 -> 0).
        surface.handle(&MidiMessage::NoteOn { channel: 3, note: 0, velocity: 1 });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(registry.contains(PadId::Pad1));

        // Human grabs knob1 mid-sweep.
        let turn = MidiMessage::ControlChange { channel: 3, cc: 102, value: 99 };
        let out = surface.handle(&turn);
        assert_eq!(
            out,
            vec![
                Outbound::Feedback(feedback::pad_color(PadId::Pad1, 20)),
                Outbound::Feedback(feedback::knob_position(ParamId::Knob1, 99)),
                Outbound::Synth(turn.clone()),
            ]
        );
        assert!(!registry.contains(PadId::Pad1));
        assert_eq!(surface.params().get(ParamId::Knob1), 99);

        wait_idle(&registry).await;
        let outputs = drain(&mut rx);
        // The dying task's final snap reflects the knob's value, not an
        // interpolated one.
        let last_feedback = outputs
            .iter()
            .rev()
            .find(|o| matches!(o, Outbound::Feedback(_)))
            .unwrap();
        assert_eq!(
            *last_feedback,
            Outbound::Feedback(feedback::knob_position(ParamId::Knob1, 99))
        );
    }
}
