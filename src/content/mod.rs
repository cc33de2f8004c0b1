//! Content addressing
//!
//! Identifiers are derived from the content itself, so a receiver can
//! recompute the identity of every block it is sent.

mod block;
mod cid;

pub use block::*;
pub use cid::*;

use thiserror::Error;

/// Content addressing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    #[error("Invalid CID: {0}")]
    InvalidCid(String),

    #[error("Block integrity mismatch: expected {expected}, computed {actual}")]
    IntegrityMismatch {
        expected: ContentId,
        actual: ContentId,
    },
}
