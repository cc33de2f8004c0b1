//! Protocol module - Defines the exchange message and its wire framing
//!
//! A frame on the stream is:
//! - varint payload length
//! - protobuf-encoded message payload

mod codec;
mod message;
pub mod wire;

pub use codec::*;
pub use message::*;

/// Default upper bound on a single frame's payload (4 MiB)
pub const MAX_FRAME_SIZE: usize = 1 << 22;
