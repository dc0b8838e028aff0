//! Packet sources.
//!
//! A [`CaptureBinding`] yields raw frames from a device or a trace file; the
//! [`PacketSourceController`] drives one binding through the per-cycle
//! operations used by the scheduler (readiness, next timestamp, process).
//! At most one frame is in flight per source: the binding owns its bytes and
//! the controller only borrows them for the duration of a cycle.

mod controller;
mod pcap;
mod slot;

pub use controller::{PacketSourceController, Readiness, SourceState};
pub use pcap::PcapFileBinding;
pub use slot::FrameSlot;

use pcap_parser::Linktype;
use thiserror::Error;

use crate::decap::LinkLayers;

/// Properties reported by a capture binding once it is open.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceProperties {
    pub path: String,
    pub link_type: Linktype,
    /// Fixed size of the outermost link-layer header.
    pub hdr_size: usize,
    pub is_live: bool,
    /// OS descriptor usable for readiness polling, when the source has one.
    pub selectable_fd: Option<i32>,
}

/// Per-frame capture metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketHeader {
    /// Capture time in seconds since the Unix epoch.
    pub ts: f64,
    pub caplen: u32,
    pub len: u32,
}

/// A captured frame borrowed from its binding for one processing cycle.
#[derive(Debug, Clone, Copy)]
pub struct CapturedFrame<'a> {
    pub header: &'a PacketHeader,
    pub data: &'a [u8],
}

impl CapturedFrame<'_> {
    pub fn ts(&self) -> f64 {
        self.header.ts
    }
}

/// Result of asking a binding for its next frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExtractOutcome {
    /// A frame is staged; its bytes are available through `packet_data`.
    Packet(PacketHeader),
    /// Nothing available right now.
    Idle,
    /// The source ran dry and is now closed.
    Exhausted,
}

/// Binding to a capture device or trace file.
pub trait CaptureBinding {
    fn open(&mut self) -> Result<SourceProperties, SourceError>;

    fn close(&mut self);

    fn extract_next_packet(&mut self) -> Result<ExtractOutcome, SourceError>;

    /// Bytes of the frame staged by the last successful extraction.
    fn packet_data(&self) -> &[u8];

    /// Release the staged frame and advance.
    fn done_with_packet(&mut self);

    fn precompile_filter(&mut self, _index: usize, _filter: &str) -> bool {
        true
    }

    fn install_filter(&mut self, _index: usize) -> bool {
        true
    }

    fn tag(&self) -> &'static str;
}

/// Everything the consumer receives for one accepted frame.
#[derive(Debug, Clone, Copy)]
pub struct PacketArrival<'a> {
    /// Capture time, or the pseudo timestamp when replaying in pseudo-realtime.
    pub timestamp: f64,
    pub header: &'a PacketHeader,
    /// Absolute offset of the network-layer payload within `frame`.
    pub payload_offset: usize,
    /// Fixed link header still to skip after the peeled encapsulations.
    pub hdr_size: usize,
    pub frame: &'a [u8],
    pub layers: LinkLayers,
    pub source: &'a SourceProperties,
}

impl<'a> PacketArrival<'a> {
    /// Network-layer payload, empty when the offset lies past the captured bytes.
    pub fn payload(&self) -> &'a [u8] {
        self.frame.get(self.payload_offset..).unwrap_or(&[])
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PCAP parse error: {0}")]
    Pcap(String),
    #[error("source is not open")]
    NotOpen,
}

impl From<pcap::error::PcapSourceError> for SourceError {
    fn from(value: pcap::error::PcapSourceError) -> Self {
        match value {
            pcap::error::PcapSourceError::Io(err) => SourceError::Io(err),
            pcap::error::PcapSourceError::Pcap { context, message } => {
                SourceError::Pcap(format!("{context}: {message}"))
            }
        }
    }
}
