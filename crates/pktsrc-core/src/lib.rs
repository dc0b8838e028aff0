//! Packet source core: controlled delivery of captured frames to an analyzer.
//!
//! A capture binding (live device or trace file) yields raw frames. The
//! [`PacketSourceController`] buffers at most one of them, answers the
//! scheduler's readiness and next-timestamp queries without blocking, strips
//! the link-layer encapsulations and hands the network-layer payload to a
//! [`PacketSink`]. Stored traces can be replayed in pseudo-realtime, paced
//! against wallclock time and optionally kept in step with a remote peer
//! through periodic sync points.
//!
//! Invariants:
//! - A source holds at most one frame; it is released before the next one is
//!   pulled.
//! - Timing baselines (first capture time, first release wallclock) are set
//!   once per source.
//! - A closed source never reopens and answers queries with sentinels.
//!
//! The replay driver and the [`ReplayReport`] tie the pieces together for
//! offline use; scheduling several sources is up to the caller.
//!
//! # Examples
//! ```no_run
//! use std::path::Path;
//!
//! use pktsrc_core::{ReplayConfig, replay_pcap_file};
//!
//! let report = replay_pcap_file(Path::new("capture.pcap"), &ReplayConfig::default())?;
//! println!("accepted: {}", report.capture_summary.map_or(0, |s| s.packets_accepted));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use serde::{Deserialize, Serialize};

mod analysis;
pub mod config;
pub mod context;
pub mod decap;
pub mod replay;
pub mod source;

pub use analysis::{
    AnalysisError, ReplayOptions, ReportCollector, WeirdTally, replay_pcap_file, replay_source,
};
pub use config::{ConfigError, LogSettings, ReplayConfig};
pub use context::{
    Diagnostics, LocalSyncPeer, PacketSink, RemoteLogLevel, RemoteSync, ReplayContext,
    SuspendFlag, Suspension, SystemWallClock, TracingDiagnostics, WallClock,
};
pub use decap::{DecapError, Decapsulated, LinkLayers, decapsulate, link_header_size};
pub use replay::{PseudoRealtimeClock, ReplayTimingState, SyncDecision, SyncPointCoordinator};
pub use source::{
    CaptureBinding, CapturedFrame, ExtractOutcome, FrameSlot, PacketArrival, PacketHeader,
    PacketSourceController, PcapFileBinding, Readiness, SourceError, SourceProperties,
    SourceState,
};

/// Current report schema version.
pub const REPORT_VERSION: u32 = 1;
/// Default timestamp used when no capture time is available.
pub const DEFAULT_GENERATED_AT: &str = "1970-01-01T00:00:00Z";

/// Outcome of replaying one capture, with deterministic ordering.
///
/// # Examples
/// ```
/// use pktsrc_core::make_empty_report;
///
/// let report = make_empty_report("capture.pcap", 24);
/// assert_eq!(report.report_version, pktsrc_core::REPORT_VERSION);
/// assert!(report.weirds.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayReport {
    /// Report schema version (not the binary version).
    pub report_version: u32,
    pub tool: ToolInfo,
    /// RFC3339 time of the last captured packet, so reruns are identical.
    pub generated_at: String,
    pub input: InputInfo,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_summary: Option<CaptureSummary>,
    /// Absent when the source never opened far enough to learn its link type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<LinkSummary>,
    pub network: NetworkSummary,
    pub encapsulation: EncapsulationSummary,
    /// Diagnostics raised for dropped frames, sorted by name.
    pub weirds: Vec<WeirdCount>,
    /// Present for pseudo-realtime replays only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay: Option<ReplaySummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputInfo {
    /// Input path as provided to the replay.
    pub path: String,
    pub bytes: u64,
}

/// Packet counts and capture time bounds.
///
/// # Examples
/// ```
/// use pktsrc_core::CaptureSummary;
///
/// let summary = CaptureSummary {
///     packets_total: 3,
///     packets_accepted: 2,
///     packets_rejected: 1,
///     time_start: None,
///     time_end: None,
/// };
/// assert_eq!(summary.packets_accepted + summary.packets_rejected, summary.packets_total);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSummary {
    pub packets_total: u64,
    /// Frames handed downstream.
    pub packets_accepted: u64,
    /// Frames dropped with a diagnostic.
    pub packets_rejected: u64,
    /// RFC3339 capture time of the earliest packet (if known).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_start: Option<String>,
    /// RFC3339 capture time of the latest packet (if known).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_end: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSummary {
    pub link_type: i32,
    /// Short name such as "ethernet", or "unknown".
    pub link_type_name: String,
    pub hdr_size: usize,
}

/// Classification of accepted payloads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub ipv4: u64,
    pub ipv6: u64,
    /// Payloads that do not start with a valid IP header.
    pub undecodable: u64,
    pub tcp: u64,
    pub udp: u64,
    pub icmp: u64,
    pub other_transport: u64,
}

/// Encapsulations peeled off accepted frames.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncapsulationSummary {
    pub vlan: u64,
    /// Frames with two stacked VLAN tags.
    pub qinq: u64,
    pub pppoe: u64,
    pub mpls: u64,
    pub max_mpls_labels: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeirdCount {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaySummary {
    /// Pseudo-realtime multiplier.
    pub speed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_interval: Option<f64>,
    pub sync_points: u64,
}

/// Report with metadata filled in and no packets counted.
pub fn make_empty_report(input_path: &str, input_bytes: u64) -> ReplayReport {
    ReplayReport {
        report_version: REPORT_VERSION,
        tool: ToolInfo {
            name: "pktsrc".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        generated_at: DEFAULT_GENERATED_AT.to_string(),
        input: InputInfo {
            path: input_path.to_string(),
            bytes: input_bytes,
        },
        capture_summary: None,
        link: None,
        network: NetworkSummary::default(),
        encapsulation: EncapsulationSummary::default(),
        weirds: vec![],
        replay: None,
    }
}
