//! Collaborators shared by every source of one analysis run.
//!
//! The owning scheduler builds a [`ReplayContext`] once and hands an
//! `Rc<ReplayContext>` to each [`crate::PacketSourceController`]. Everything
//! here is single-threaded; collaborators that need to record state use
//! interior mutability.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{error, info, warn};

use crate::config::ReplayConfig;
use crate::source::{CapturedFrame, PacketArrival};

/// Source of real time, in seconds since the Unix epoch.
pub trait WallClock {
    fn now(&self) -> f64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemWallClock;

impl WallClock for SystemWallClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// Process-wide "processing suspended" query (e.g. while checkpointing).
pub trait Suspension {
    fn is_processing_suspended(&self) -> bool;
}

#[derive(Debug, Default)]
pub struct SuspendFlag {
    suspended: Cell<bool>,
}

impl SuspendFlag {
    pub fn suspend(&self) {
        self.suspended.set(true);
    }

    pub fn resume(&self) {
        self.suspended.set(false);
    }
}

impl Suspension for SuspendFlag {
    fn is_processing_suspended(&self) -> bool {
        self.suspended.get()
    }
}

/// Sink for anomalies and operator-facing messages.
pub trait Diagnostics {
    fn report_weird(&self, name: &str, frame: &CapturedFrame<'_>);
    fn report_info(&self, msg: &str);
    fn report_internal_error(&self, msg: &str);
}

/// Diagnostics that only log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn report_weird(&self, name: &str, frame: &CapturedFrame<'_>) {
        warn!(weird = name, ts = frame.ts(), caplen = frame.header.caplen, "weird frame");
    }

    fn report_info(&self, msg: &str) {
        info!("{msg}");
    }

    fn report_internal_error(&self, msg: &str) {
        error!("internal error: {msg}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteLogLevel {
    Info,
    Error,
}

/// Peer that keeps a distributed trace replay aligned.
pub trait RemoteSync {
    /// Announce a sync point; returns its sequence number, starting at 1.
    fn send_sync_point(&self) -> u64;
    /// Announce that the trace ended after the last sync point.
    fn send_final_sync_point(&self);
    /// Announce that replay is finished when no periodic sync was configured.
    fn terminate(&self);
    fn log(&self, level: RemoteLogLevel, msg: &str);
}

/// Peer used when the replay runs alone: sync points are numbered and logged.
#[derive(Debug, Default)]
pub struct LocalSyncPeer {
    sent: Cell<u64>,
    finished: Cell<bool>,
}

impl LocalSyncPeer {
    pub fn sync_points_sent(&self) -> u64 {
        self.sent.get()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.get()
    }
}

impl RemoteSync for LocalSyncPeer {
    fn send_sync_point(&self) -> u64 {
        let n = self.sent.get() + 1;
        self.sent.set(n);
        n
    }

    fn send_final_sync_point(&self) {
        self.finished.set(true);
        info!(sync_points = self.sent.get(), "final sync point");
    }

    fn terminate(&self) {
        self.finished.set(true);
        info!("replay terminated");
    }

    fn log(&self, level: RemoteLogLevel, msg: &str) {
        match level {
            RemoteLogLevel::Info => info!(target: "pktsrc::remote", "{msg}"),
            RemoteLogLevel::Error => error!(target: "pktsrc::remote", "{msg}"),
        }
    }
}

/// Consumer of decapsulated frames.
pub trait PacketSink {
    fn on_packet_arrival(&mut self, arrival: PacketArrival<'_>);
}

/// Read-mostly state shared by all sources of a run.
pub struct ReplayContext {
    pub config: ReplayConfig,
    /// Analyzer start time; pseudo timestamps are offsets from it.
    pub start_time: f64,
    pub clock: Rc<dyn WallClock>,
    pub suspension: Rc<dyn Suspension>,
    pub diagnostics: Rc<dyn Diagnostics>,
    /// Present when the replay cooperates with a remote peer.
    pub remote: Option<Rc<dyn RemoteSync>>,
}

impl ReplayContext {
    /// Context with system time, no suspension and log-only diagnostics.
    pub fn new(config: ReplayConfig) -> Self {
        let clock = Rc::new(SystemWallClock);
        Self {
            config,
            start_time: clock.now(),
            clock,
            suspension: Rc::new(SuspendFlag::default()),
            diagnostics: Rc::new(TracingDiagnostics),
            remote: None,
        }
    }

    pub fn with_clock(mut self, clock: Rc<dyn WallClock>) -> Self {
        self.start_time = clock.now();
        self.clock = clock;
        self
    }

    pub fn with_suspension(mut self, suspension: Rc<dyn Suspension>) -> Self {
        self.suspension = suspension;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Rc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_remote(mut self, remote: Rc<dyn RemoteSync>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn pseudo_realtime(&self) -> f64 {
        self.config.pseudo_realtime
    }

    /// Remote peer, when cooperation is enabled in the configuration.
    pub fn communication(&self) -> Option<&Rc<dyn RemoteSync>> {
        if self.config.using_communication {
            self.remote.as_ref()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LocalSyncPeer, RemoteSync, SuspendFlag, Suspension};

    #[test]
    fn suspend_flag_toggles() {
        let flag = SuspendFlag::default();
        assert!(!flag.is_processing_suspended());
        flag.suspend();
        assert!(flag.is_processing_suspended());
        flag.resume();
        assert!(!flag.is_processing_suspended());
    }

    #[test]
    fn local_peer_numbers_sync_points_from_one() {
        let peer = LocalSyncPeer::default();
        assert_eq!(peer.send_sync_point(), 1);
        assert_eq!(peer.send_sync_point(), 2);
        assert!(!peer.is_finished());
        peer.send_final_sync_point();
        assert!(peer.is_finished());
        assert_eq!(peer.sync_points_sent(), 2);
    }
}
