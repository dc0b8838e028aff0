//! Link-layer decapsulation.
//!
//! Given the link type reported by a capture source and one captured frame,
//! compute where the network-layer payload begins. Nested VLAN (at most two
//! tags), PPPoE and MPLS label stacks are peeled off; frames that cannot carry
//! IP are rejected with a named diagnostic.
//!
//! Layering follows the protocol decoders: `layout` holds offsets and
//! constants, `reader` does bounds-checked byte access, `parser` walks the
//! encapsulations, `error` names the reasons a frame is dropped. Nothing here
//! keeps state between frames.

pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use error::DecapError;
pub use parser::{Decapsulated, LinkLayers, decapsulate, link_header_size};
