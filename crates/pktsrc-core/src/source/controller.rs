use std::rc::Rc;

use tracing::{debug, warn};

use crate::context::{PacketSink, ReplayContext};
use crate::decap::decapsulate;
use crate::replay::{PseudoRealtimeClock, SyncDecision, SyncPointCoordinator};

use super::{
    CaptureBinding, CapturedFrame, ExtractOutcome, FrameSlot, PacketArrival, SourceProperties,
};

const NOT_OPEN: &str = "not open";

/// Lifecycle of a source. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Pending,
    Open,
    Closed,
}

/// What the scheduler should wait on before the next cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    /// Descriptor to poll, when the source has one and polling is meaningful.
    pub selectable_fd: Option<i32>,
    /// The source has nothing to release right now.
    pub idle: bool,
}

/// Drives one capture binding through the scheduler's per-cycle operations.
///
/// None of the operations block: readiness is either delegated to the
/// binding's descriptor or, in pseudo-realtime mode, computed from the replay
/// clock. A closed source answers every query with its sentinel value.
pub struct PacketSourceController<B> {
    binding: B,
    context: Rc<ReplayContext>,
    state: SourceState,
    props: Option<SourceProperties>,
    slot: FrameSlot,
    clock: PseudoRealtimeClock,
    sync: Option<SyncPointCoordinator>,
    errbuf: String,
    idle: bool,
    current_pseudo: f64,
}

impl<B: CaptureBinding> PacketSourceController<B> {
    pub fn new(binding: B, context: Rc<ReplayContext>) -> Self {
        let clock = PseudoRealtimeClock::new(context.pseudo_realtime());
        let sync = context
            .communication()
            .and(context.config.sync_interval())
            .and_then(SyncPointCoordinator::new);
        Self {
            binding,
            context,
            state: SourceState::Pending,
            props: None,
            slot: FrameSlot::new(),
            clock,
            sync,
            errbuf: String::new(),
            idle: false,
            current_pseudo: 0.0,
        }
    }

    /// Open the binding; failures are kept for [`Self::error_msg`].
    pub fn init(&mut self) {
        match self.binding.open() {
            Ok(props) => self.opened(props),
            Err(err) => self.report_error(&err.to_string()),
        }
    }

    pub fn done(&mut self) {
        self.binding.close();
        self.closed();
    }

    pub fn opened(&mut self, props: SourceProperties) {
        if self.state == SourceState::Closed {
            warn!(path = %props.path, "ignoring open of a closed source");
            return;
        }
        debug!(path = %props.path, link_type = props.link_type.0, "opened source");
        self.props = Some(props);
        self.state = SourceState::Open;
    }

    pub fn closed(&mut self) {
        if self.state == SourceState::Closed {
            return;
        }
        self.state = SourceState::Closed;
        if self.slot.clear().is_some() {
            self.binding.done_with_packet();
        }
        debug!(path = self.props_path(), "closed source");
    }

    /// Keep `msg` until the scheduler notices the source is closed.
    pub fn report_error(&mut self, msg: &str) {
        self.errbuf = msg.to_string();
        let path = if self.is_open() { self.path() } else { "<not open>" };
        debug!(path, error = msg, "source error");
    }

    pub fn error_msg(&self) -> &str {
        &self.errbuf
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == SourceState::Open
    }

    pub fn is_idle(&self) -> bool {
        self.idle
    }

    pub fn path(&self) -> &str {
        match (&self.props, self.is_open()) {
            (Some(props), true) => &props.path,
            _ => NOT_OPEN,
        }
    }

    pub fn link_type(&self) -> i32 {
        match (&self.props, self.is_open()) {
            (Some(props), true) => props.link_type.0,
            _ => -1,
        }
    }

    pub fn hdr_size(&self) -> i32 {
        match (&self.props, self.is_open()) {
            (Some(props), true) => i32::try_from(props.hdr_size).unwrap_or(i32::MAX),
            _ => -1,
        }
    }

    pub fn snap_len(&self) -> u32 {
        self.context.config.snaplen
    }

    pub fn is_live(&self) -> bool {
        self.props.as_ref().is_some_and(|props| props.is_live)
    }

    pub fn properties(&self) -> Option<&SourceProperties> {
        self.props.as_ref()
    }

    pub fn tag(&self) -> &'static str {
        self.binding.tag()
    }

    pub fn clock(&self) -> &PseudoRealtimeClock {
        &self.clock
    }

    pub fn sync(&self) -> Option<&SyncPointCoordinator> {
        self.sync.as_ref()
    }

    pub fn has_buffered_frame(&self) -> bool {
        self.slot.is_full()
    }

    /// Pseudo timestamp of the last frame handed downstream.
    pub fn current_packet_timestamp(&self) -> f64 {
        self.current_pseudo
    }

    /// Wallclock of the current packet; time stands still while suspended.
    pub fn current_packet_wallclock(&mut self) -> f64 {
        if self.context.suspension.is_processing_suspended() {
            self.clock.set_current_wallclock(self.context.clock.now());
        }
        self.clock.current_wallclock()
    }

    pub fn continue_after_suspend(&mut self) {
        self.clock.set_current_wallclock(self.context.clock.now());
    }

    pub fn awaiting_sync_release(&self) -> bool {
        self.sync.as_ref().is_some_and(|sync| sync.is_awaiting_release())
    }

    /// Let the packet held at a sync point through.
    pub fn resume_after_sync_point(&mut self) {
        if let Some(sync) = self.sync.as_mut() {
            sync.release();
        }
    }

    pub fn get_readiness(&mut self) -> Readiness {
        if self.clock.is_active() {
            // Polling a file is meaningless; idleness follows the replay clock.
            self.idle = self.check_pseudo_time().is_none();
            return Readiness {
                selectable_fd: None,
                idle: self.idle,
            };
        }

        let selectable_fd = if self.is_open() {
            self.props.as_ref().and_then(|props| props.selectable_fd)
        } else {
            None
        };
        Readiness {
            selectable_fd,
            idle: self.idle,
        }
    }

    /// Timestamp of the buffered frame, pulling one if needed.
    ///
    /// In pseudo-realtime mode this is the release timestamp, or `None` while
    /// the frame must still be delayed.
    pub fn next_timestamp(&mut self) -> Option<f64> {
        if !self.is_open() || !self.extract_next_packet_internal() {
            return None;
        }

        if self.clock.is_active() {
            let released = self.check_pseudo_time();
            if released.is_none() {
                self.idle = true;
            }
            return released;
        }

        self.slot.header().map(|header| header.ts)
    }

    /// Decapsulate the buffered frame and hand it to `sink`.
    ///
    /// In pseudo-realtime mode call this only after `next_timestamp` returned
    /// a value for the same frame.
    pub fn process(&mut self, sink: &mut dyn PacketSink) {
        if !self.is_open() || !self.extract_next_packet_internal() {
            return;
        }
        let (Some(header), Some(props)) = (self.slot.header().copied(), self.props.as_ref()) else {
            return;
        };

        match decapsulate(props.link_type, props.hdr_size, self.binding.packet_data()) {
            Ok(decapsulated) => {
                let timestamp = if self.clock.is_active() {
                    let released = self.check_pseudo_time().unwrap_or_else(|| {
                        self.clock.pseudo_timestamp(header.ts, self.context.start_time)
                    });
                    self.current_pseudo = released;
                    released
                } else {
                    header.ts
                };

                if let Some(props) = self.props.as_ref() {
                    sink.on_packet_arrival(PacketArrival {
                        timestamp,
                        header: &header,
                        payload_offset: decapsulated.payload_offset(),
                        hdr_size: decapsulated.hdr_size,
                        frame: self.binding.packet_data(),
                        layers: decapsulated.layers,
                        source: props,
                    });
                }

                if self.clock.is_active() {
                    self.clock.observe_first_wallclock(self.context.clock.now());
                }
            }
            Err(err) => {
                debug!(ts = header.ts, error = %err, "dropping frame");
                let frame = CapturedFrame {
                    header: &header,
                    data: self.binding.packet_data(),
                };
                self.context.diagnostics.report_weird(err.weird_name(), &frame);
            }
        }

        self.slot.clear();
        self.binding.done_with_packet();
    }

    pub fn precompile_filter(&mut self, index: usize, filter: &str) -> bool {
        self.binding.precompile_filter(index, filter)
    }

    pub fn install_filter(&mut self, index: usize) -> bool {
        self.binding.install_filter(index)
    }

    pub fn info(&self, msg: &str) {
        self.context.diagnostics.report_info(msg);
    }

    pub fn internal_error(&self, msg: &str) {
        self.context.diagnostics.report_internal_error(msg);
    }

    /// Release timestamp of the buffered frame, or `None` while it is held
    /// back by pacing or a sync point.
    fn check_pseudo_time(&mut self) -> Option<f64> {
        if !self.is_open() || !self.extract_next_packet_internal() {
            return None;
        }
        let ts = self.slot.header()?.ts;
        let first_timestamp = self.clock.first_timestamp().unwrap_or(ts);

        if let (Some(sync), Some(peer)) = (self.sync.as_mut(), self.context.communication()) {
            if sync.evaluate(ts, first_timestamp, peer.as_ref()) == SyncDecision::Withhold {
                return None;
            }
        }

        self.clock
            .release_time(ts, self.context.clock.now(), self.context.start_time)
    }

    fn extract_next_packet_internal(&mut self) -> bool {
        if self.slot.is_full() {
            return true;
        }

        // The very first packet goes through even while suspended so the
        // timing baselines get established.
        if self.context.suspension.is_processing_suspended()
            && self.clock.first_timestamp().is_some()
        {
            self.idle = true;
            return false;
        }

        if self.clock.is_active() {
            self.clock.set_current_wallclock(self.context.clock.now());
        }

        match self.binding.extract_next_packet() {
            Ok(ExtractOutcome::Packet(header)) => {
                self.clock.observe_first_timestamp(header.ts);
                self.slot.fill(header);
                self.idle = false;
                return true;
            }
            Ok(ExtractOutcome::Idle) => {}
            Ok(ExtractOutcome::Exhausted) => self.closed(),
            Err(err) => {
                self.report_error(&err.to_string());
                self.binding.close();
                self.closed();
            }
        }

        if self.clock.is_active() && !self.is_open() {
            self.signal_replay_finished();
        }

        self.idle = true;
        false
    }

    /// Tell the remote peer that this trace has gone dry for good.
    fn signal_replay_finished(&self) {
        let Some(peer) = self.context.communication() else {
            return;
        };
        if self.sync.is_some() {
            peer.send_final_sync_point();
        } else {
            peer.terminate();
        }
    }

    fn props_path(&self) -> &str {
        self.props.as_ref().map_or(NOT_OPEN, |props| props.path.as_str())
    }
}
