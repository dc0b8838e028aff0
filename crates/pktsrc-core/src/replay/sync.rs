use tracing::debug;

use crate::context::{RemoteLogLevel, RemoteSync};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    /// Pacing may decide whether the packet is released.
    Proceed,
    /// The packet is held until the sync point is released.
    Withhold,
}

/// Pauses a pseudo-realtime replay at fixed trace-time boundaries.
///
/// The first evaluation and every packet at or past the next threshold emit a
/// sync point; the threshold then moves to `first_timestamp + n * interval`,
/// `n` being the sequence number returned by the peer. The packet that
/// triggered the sync point is withheld until [`SyncPointCoordinator::release`].
#[derive(Debug, Clone)]
pub struct SyncPointCoordinator {
    interval: f64,
    next_sync_point: Option<f64>,
    awaiting_release: bool,
    sync_points: u64,
}

impl SyncPointCoordinator {
    /// `None` unless `interval` is positive.
    pub fn new(interval: f64) -> Option<Self> {
        (interval > 0.0).then_some(Self {
            interval,
            next_sync_point: None,
            awaiting_release: false,
            sync_points: 0,
        })
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn next_sync_point(&self) -> Option<f64> {
        self.next_sync_point
    }

    pub fn is_awaiting_release(&self) -> bool {
        self.awaiting_release
    }

    pub fn sync_points(&self) -> u64 {
        self.sync_points
    }

    pub fn evaluate(&mut self, ts: f64, first_timestamp: f64, peer: &dyn RemoteSync) -> SyncDecision {
        if self.awaiting_release {
            return SyncDecision::Withhold;
        }

        let due = self.next_sync_point.is_none_or(|next| ts >= next);
        if !due {
            return SyncDecision::Proceed;
        }

        let n = peer.send_sync_point();
        let next = first_timestamp + n as f64 * self.interval;
        self.next_sync_point = Some(next);
        self.awaiting_release = true;
        self.sync_points += 1;
        peer.log(
            RemoteLogLevel::Info,
            &format!("stopping at packet {ts:.6}, next sync-point at {next:.6}"),
        );
        debug!(ts, next_sync_point = next, sequence = n, "sync point");
        SyncDecision::Withhold
    }

    /// Let the withheld packet through.
    pub fn release(&mut self) {
        self.awaiting_release = false;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::{SyncDecision, SyncPointCoordinator};
    use crate::context::{RemoteLogLevel, RemoteSync};

    #[derive(Default)]
    struct RecordingPeer {
        sent: Cell<u64>,
        logs: RefCell<Vec<String>>,
    }

    impl RemoteSync for RecordingPeer {
        fn send_sync_point(&self) -> u64 {
            self.sent.set(self.sent.get() + 1);
            self.sent.get()
        }

        fn send_final_sync_point(&self) {}

        fn terminate(&self) {}

        fn log(&self, _level: RemoteLogLevel, msg: &str) {
            self.logs.borrow_mut().push(msg.to_string());
        }
    }

    fn release_at(
        sync: &mut SyncPointCoordinator,
        peer: &RecordingPeer,
        ts: f64,
    ) -> Vec<SyncDecision> {
        let mut decisions = vec![sync.evaluate(ts, 100.0, peer)];
        if decisions[0] == SyncDecision::Withhold {
            decisions.push(sync.evaluate(ts, 100.0, peer));
            sync.release();
            decisions.push(sync.evaluate(ts, 100.0, peer));
        }
        decisions
    }

    #[test]
    fn non_positive_interval_disables_sync() {
        assert!(SyncPointCoordinator::new(0.0).is_none());
        assert!(SyncPointCoordinator::new(-1.0).is_none());
    }

    #[test]
    fn syncs_at_interval_boundaries() {
        use SyncDecision::{Proceed, Withhold};

        let peer = RecordingPeer::default();
        let mut sync = SyncPointCoordinator::new(10.0).unwrap();

        assert_eq!(release_at(&mut sync, &peer, 100.0), [Withhold, Withhold, Proceed]);
        assert_eq!(sync.next_sync_point(), Some(110.0));
        assert_eq!(release_at(&mut sync, &peer, 105.0), [Proceed]);
        assert_eq!(release_at(&mut sync, &peer, 109.999), [Proceed]);
        assert_eq!(release_at(&mut sync, &peer, 110.0), [Withhold, Withhold, Proceed]);
        assert_eq!(sync.next_sync_point(), Some(120.0));
        assert_eq!(release_at(&mut sync, &peer, 120.0), [Withhold, Withhold, Proceed]);
        assert_eq!(sync.next_sync_point(), Some(130.0));

        assert_eq!(peer.sent.get(), 3);
        assert_eq!(sync.sync_points(), 3);
        assert_eq!(
            peer.logs.borrow()[0],
            "stopping at packet 100.000000, next sync-point at 110.000000"
        );
    }
}
