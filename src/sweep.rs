//! Sweep engine - cancellable parameter transitions.
//!
//! A sweep is a per-gesture task that walks one knob's value toward the
//! target parameter over a fixed number of interpolated steps, emitting a CC
//! to the DAW plus SysEx feedback to the surface at every step. Sweeps are
//! keyed by the pad that spawned them; the [`SweepRegistry`] is the single
//! source of truth for which sweeps are still wanted, and repeating the
//! gesture (or turning the destination knob) cancels the sweep instead of
//! duplicating it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::controller::Outbound;
use crate::feedback;
use crate::ids::{PadId, ParamId};
use crate::midi::MidiMessage;

/// Shared last-known values of the 16 knobs.
///
/// Written by the dispatch path (knob turns, mod wheel) and by sweep tasks,
/// each of which owns exactly one knob at a time.
#[derive(Clone)]
pub struct ParamStore {
    inner: Arc<Mutex<[u8; 16]>>,
}

impl ParamStore {
    pub fn new(initial: [u8; 16]) -> Self {
        Self {
            inner: Arc::new(Mutex::new(initial)),
        }
    }

    pub fn get(&self, param: ParamId) -> u8 {
        self.inner.lock()[param.index()]
    }

    pub fn set(&self, param: ParamId, value: u8) {
        self.inner.lock()[param.index()] = value & 0x7F;
    }

    pub fn snapshot(&self) -> [u8; 16] {
        *self.inner.lock()
    }
}

/// Registry of active sweeps, shared by the dispatch path and every sweep
/// task. Each entry carries the cancellation signal for its task, so removal
/// both revokes the sweep's license to emit and wakes it out of the
/// inter-step delay.
#[derive(Clone, Default)]
pub struct SweepRegistry {
    active: Arc<Mutex<HashMap<PadId, Arc<Notify>>>>,
}

impl SweepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a pad for a new sweep. Returns the cancellation signal to hand
    /// to the task, or `None` if a sweep is already running for this pad.
    pub fn register(&self, pad: PadId) -> Option<Arc<Notify>> {
        let mut active = self.active.lock();
        if active.contains_key(&pad) {
            return None;
        }
        let signal = Arc::new(Notify::new());
        active.insert(pad, signal.clone());
        Some(signal)
    }

    /// Cancel the sweep for a pad, if any. Removes the entry and fires the
    /// signal. Returns whether a sweep was actually active.
    pub fn cancel(&self, pad: PadId) -> bool {
        let signal = self.active.lock().remove(&pad);
        match signal {
            Some(signal) => {
                signal.notify_one();
                true
            }
            None => false,
        }
    }

    /// Remove a pad on natural completion (no signal needed).
    pub fn finish(&self, pad: PadId) {
        self.active.lock().remove(&pad);
    }

    pub fn contains(&self, pad: PadId) -> bool {
        self.active.lock().contains_key(&pad)
    }

    pub fn is_empty(&self) -> bool {
        self.active.lock().is_empty()
    }
}

/// Everything a sweep task needs to know at spawn time.
#[derive(Debug, Clone)]
pub struct SweepSpec {
    /// Gesture key; also selects the pulsing LED.
    pub pad: PadId,
    /// Knob being swept.
    pub param: ParamId,
    /// Knob whose current value is the destination. Its value is read once,
    /// in [`spawn`] before the task starts; target drift between sweeps is
    /// expected, drift within one is not.
    pub target: ParamId,
    /// Output channel for the interpolated CCs.
    pub channel: u8,
    /// Interpolation step count.
    pub steps: u32,
    /// Delay between steps.
    pub step_delay: Duration,
    /// Pad LED color when not highlighted.
    pub resting_color: u8,
}

/// Inter-step delay for a gesture of the given velocity: harder taps sweep
/// faster, following `(128 - velocity)^2 * factor_micros`.
pub fn step_delay(velocity: u8, factor_micros: u64) -> Duration {
    let t = 128 - u64::from(velocity.min(127));
    Duration::from_micros(t * t * factor_micros)
}

/// Spawn a sweep task. The caller must already hold the pad's registry entry
/// (via [`SweepRegistry::register`]) and passes the signal it got back.
///
/// Per step: re-check registry membership (early exit, no rollback), emit one
/// CC at the truncated interpolated value, store it, emit knob-position and
/// pad-color feedback, then wait out the step delay unless cancelled. On
/// natural completion, snap the knob display to the stored value and
/// deregister.
pub fn spawn(
    spec: SweepSpec,
    registry: SweepRegistry,
    cancel: Arc<Notify>,
    params: ParamStore,
    out: mpsc::UnboundedSender<Outbound>,
) -> JoinHandle<()> {
    // Endpoints are fixed here, before the task is scheduled; later writes
    // to the target knob bend the next sweep, not this one.
    let start = f64::from(params.get(spec.param));
    let target = f64::from(params.get(spec.target));
    let increment = (target - start) / f64::from(spec.steps);

    tokio::spawn(async move {
        debug!(
            "Sweep {}: {} {} -> {} over {} steps ({:?}/step)",
            spec.pad, spec.param, start, target, spec.steps, spec.step_delay
        );

        for step in 1..=spec.steps {
            // Membership is the license to emit; it can vanish between steps
            // via a repeated gesture or a manual knob turn.
            if !registry.contains(spec.pad) {
                trace!("Sweep {} cancelled at step {}", spec.pad, step);
                break;
            }

            let value = (start + f64::from(step) * increment)
                .trunc()
                .clamp(0.0, 127.0) as u8;

            let _ = out.send(Outbound::Synth(MidiMessage::ControlChange {
                channel: spec.channel,
                cc: spec.param.cc(),
                value,
            }));
            params.set(spec.param, value);
            let _ = out.send(Outbound::Feedback(feedback::knob_position(
                spec.param, value,
            )));
            let _ = out.send(Outbound::Feedback(feedback::pad_color(
                spec.pad,
                feedback::pulse_color(spec.resting_color, step),
            )));

            tokio::select! {
                _ = tokio::time::sleep(spec.step_delay) => {}
                _ = cancel.notified() => {
                    trace!("Sweep {} cancelled during step {} delay", spec.pad, step);
                    break;
                }
            }
        }

        // Snap the device knob to wherever the parameter ended up. A
        // cancelling knob turn has already stored its own value, so this
        // reflects the human's number, not an interpolated one.
        let final_value = params.get(spec.param);
        let _ = out.send(Outbound::Feedback(feedback::knob_position(
            spec.param,
            final_value,
        )));
        registry.finish(spec.pad);
    })
}
