//! PCAP/PCAPNG file binding.
//!
//! Replays a trace file as a capture source. File I/O and block parsing live
//! here; the staged frame is copied once into a buffer the binding reuses for
//! every cycle.

pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use parser::PcapFileBinding;
