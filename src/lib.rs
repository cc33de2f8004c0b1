//! Wantframe - want-list and block exchange messages
//!
//! Builds, encodes and frames the messages content-addressed peers trade
//! to request content and push blocks to each other.

pub mod config;
pub mod content;
pub mod protocol;

pub use content::{Block, ContentError, ContentId};
pub use protocol::{
    read_message, write_message, CodecError, Decoder, Encoder, Entry, Message, MessageError,
    MessageSummary, MAX_FRAME_SIZE,
};
