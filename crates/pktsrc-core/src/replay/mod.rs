//! Pseudo-realtime replay of stored traces.
//!
//! [`PseudoRealtimeClock`] decides when a packet may be released so that
//! downstream timers see live-like arrival times; [`SyncPointCoordinator`]
//! pauses the replay at trace-time boundaries shared with a remote peer.

mod clock;
mod sync;

pub use clock::{PseudoRealtimeClock, ReplayTimingState};
pub use sync::{SyncDecision, SyncPointCoordinator};
