//! Controller state machines, one per physical role.
//!
//! Each controller consumes classified messages from its own device and
//! emits zero or more outbound messages: channel messages for the DAW,
//! SysEx feedback for the device itself. Handling is synchronous and never
//! blocks; anything that needs to wait (sweeps) runs as its own task and
//! emits through the shared outbound channel.

mod keys;
mod surface;

pub use keys::KeysController;
pub use surface::SurfaceController;

use thiserror::Error;
use tracing::warn;

use crate::midi::MidiMessage;

/// A message leaving the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Channel message bound for the virtual DAW port.
    Synth(MidiMessage),
    /// Raw bytes bound for the originating controller's own input side
    /// (SysEx feedback frames, startup sync).
    Feedback(Vec<u8>),
}

/// Why an inbound message was not routed normally. Every variant is
/// reported and survived; the gateway never terminates on a bad message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Reject {
    /// Message channel does not match any channel this controller owns.
    #[error("unexpected message on channel {0}")]
    UnexpectedChannel(u8),
    /// System/SysEx traffic arrived on a channel path.
    #[error("unexpected system message ({0} bytes)")]
    UnexpectedSystemMessage(usize),
    /// A note landed outside every configured window.
    #[error("unmapped gesture: note {0} ({1})")]
    UnmappedGesture(u8, String),
}

/// Report a rejected message for the named controller role.
pub(crate) fn report(role: &str, reject: &Reject) {
    warn!("[{}] {}", role, reject);
}
