use std::path::Path;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::{debug, info, trace};

use crate::config::{ConfigError, ReplayConfig};
use crate::context::{LocalSyncPeer, PacketSink, ReplayContext};
use crate::source::{CaptureBinding, PacketSourceController, PcapFileBinding};
use crate::{ReplayReport, ReplaySummary};

mod collector;
mod tally;

pub use collector::ReportCollector;
pub use tally::WeirdTally;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("cannot open {path}: {message}")]
    Open { path: String, message: String },
    #[error("replay of {path} failed: {message}")]
    Replay { path: String, message: String },
}

/// Knobs of the single-source replay loop.
#[derive(Debug, Clone)]
pub struct ReplayOptions {
    /// Pause taken when the source has nothing to release.
    pub idle_backoff: Duration,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            idle_backoff: Duration::from_millis(1),
        }
    }
}

/// Replay a PCAP/PCAPNG file through a packet source and summarize it.
///
/// Frames are paced when `config.pseudo_realtime` is positive; sync points
/// are exchanged with a local peer that permits them right away.
pub fn replay_pcap_file(path: &Path, config: &ReplayConfig) -> Result<ReplayReport, AnalysisError> {
    config.validate()?;

    let tally = Rc::new(WeirdTally::default());
    let peer = Rc::new(LocalSyncPeer::default());
    let context = ReplayContext::new(config.clone())
        .with_diagnostics(tally.clone())
        .with_remote(peer.clone());
    let mut controller = PacketSourceController::new(PcapFileBinding::new(path), Rc::new(context));
    controller.init();
    info!(
        path = %path.display(),
        speed = config.pseudo_realtime,
        "replaying capture"
    );

    let mut collector = ReportCollector::new();
    replay_source(&mut controller, &mut collector, &ReplayOptions::default())?;

    let mut report =
        collector.build_report(&path.display().to_string(), path.metadata()?.len(), &tally);
    report.link = controller.properties().map(collector::link_summary);
    if controller.clock().is_active() {
        report.replay = Some(ReplaySummary {
            speed: controller.clock().speed(),
            sync_interval: controller.sync().map(|sync| sync.interval()),
            sync_points: peer.sync_points_sent(),
        });
    }
    Ok(report)
}

/// Drive one source until it closes, handing released frames to `sink`.
///
/// This is the scheduler's loop reduced to a single source: ask for
/// readiness, pull the next timestamp, process what is due. Sync points are
/// permitted as soon as they are raised.
pub fn replay_source<B: CaptureBinding>(
    controller: &mut PacketSourceController<B>,
    sink: &mut dyn PacketSink,
    options: &ReplayOptions,
) -> Result<(), AnalysisError> {
    if !controller.is_open() {
        return Err(AnalysisError::Open {
            path: source_path(controller),
            message: controller.error_msg().to_string(),
        });
    }

    let mut processed = 0u64;
    let mut idle_cycles = 0u64;
    while controller.is_open() {
        let readiness = controller.get_readiness();
        trace!(idle = readiness.idle, fd = ?readiness.selectable_fd, "cycle");
        if !controller.is_open() {
            break;
        }

        if controller.awaiting_sync_release() {
            controller.resume_after_sync_point();
            continue;
        }

        // Only the replay clock recomputes idleness on every query.
        if readiness.idle && controller.clock().is_active() {
            idle_cycles += 1;
            thread::sleep(options.idle_backoff);
            continue;
        }

        match controller.next_timestamp() {
            Some(_) => {
                controller.process(sink);
                processed += 1;
            }
            None if controller.awaiting_sync_release() => controller.resume_after_sync_point(),
            None if controller.is_open() => {
                idle_cycles += 1;
                thread::sleep(options.idle_backoff);
            }
            None => {}
        }
    }

    debug!(processed, idle_cycles, "source drained");
    if !controller.error_msg().is_empty() {
        return Err(AnalysisError::Replay {
            path: source_path(controller),
            message: controller.error_msg().to_string(),
        });
    }
    Ok(())
}

fn source_path<B: CaptureBinding>(controller: &PacketSourceController<B>) -> String {
    controller
        .properties()
        .map_or_else(|| "<unknown>".to_string(), |props| props.path.clone())
}

/// Earliest and latest capture time seen.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub(crate) struct TsBounds {
    pub first: Option<f64>,
    pub last: Option<f64>,
}

impl TsBounds {
    pub fn observe(&mut self, ts: f64) {
        self.first = Some(self.first.map_or(ts, |first| first.min(ts)));
        self.last = Some(self.last.map_or(ts, |last| last.max(ts)));
    }

    pub fn merge(mut self, other: TsBounds) -> TsBounds {
        for ts in [other.first, other.last].into_iter().flatten() {
            self.observe(ts);
        }
        self
    }
}

pub(crate) fn ts_to_rfc3339(ts: Option<f64>) -> Option<String> {
    let ts = ts?;
    let nanos = (ts * 1_000_000_000.0) as i128;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
}

#[cfg(test)]
mod tests {
    use super::{TsBounds, ts_to_rfc3339};

    #[test]
    fn bounds_track_min_and_max_in_any_order() {
        let mut bounds = TsBounds::default();
        for ts in [5.0, 2.0, 9.0, 3.0] {
            bounds.observe(ts);
        }
        assert_eq!(bounds.first, Some(2.0));
        assert_eq!(bounds.last, Some(9.0));

        let mut other = TsBounds::default();
        other.observe(1.0);
        let merged = bounds.merge(other);
        assert_eq!(merged.first, Some(1.0));
        assert_eq!(merged.last, Some(9.0));
    }

    #[test]
    fn rfc3339_formats_unix_seconds() {
        assert_eq!(ts_to_rfc3339(Some(0.0)).as_deref(), Some("1970-01-01T00:00:00Z"));
        assert_eq!(ts_to_rfc3339(None), None);
    }
}
