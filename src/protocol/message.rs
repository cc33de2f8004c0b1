//! Exchange message
//!
//! A message carries a want-list (requests and cancellations keyed by
//! content identifier) and a set of blocks pushed to the receiver.

use std::collections::HashMap;

use prost::Message as _;
use serde::Serialize;
use thiserror::Error;

use super::wire;
use crate::content::{Block, ContentError, ContentId};

/// Message conversion errors
#[derive(Error, Debug)]
pub enum MessageError {
    #[error("Incorrectly formatted CID in wantlist: {0}")]
    MalformedKey(#[source] ContentError),

    #[error("Protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),
}

/// A want-list entry
///
/// `cancel == true` marks a tombstone withdrawing an earlier request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub cid: ContentId,
    pub priority: i64,
    pub cancel: bool,
}

/// Narrow an in-memory priority to the wire's `int32`, saturating at the bounds.
pub fn wire_priority(priority: i64) -> i32 {
    i32::try_from(priority).unwrap_or(if priority < 0 { i32::MIN } else { i32::MAX })
}

/// Diagnostic view of a message, suitable for structured logs
#[derive(Debug, Clone, Serialize)]
pub struct MessageSummary {
    pub full: bool,
    pub blocks: Vec<String>,
    pub wants: Vec<Entry>,
}

/// One exchange message
///
/// Not synchronized; a message has a single owner that mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    full: bool,
    wantlist: HashMap<ContentId, Entry>,
    blocks: HashMap<ContentId, Block>,
}

impl Message {
    /// Create an empty message. A full message carries the sender's complete
    /// want-list, otherwise the want-list is a patch against earlier state.
    pub fn new(full: bool) -> Self {
        Self {
            full,
            wantlist: HashMap::new(),
            blocks: HashMap::new(),
        }
    }

    pub fn full(&self) -> bool {
        self.full
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty() && self.wantlist.is_empty()
    }

    /// Snapshot of the want-list, in no particular order
    pub fn wantlist(&self) -> Vec<Entry> {
        self.wantlist.values().cloned().collect()
    }

    /// Snapshot of the blocks, in no particular order
    pub fn blocks(&self) -> Vec<Block> {
        self.blocks.values().cloned().collect()
    }

    pub fn entry(&self, cid: &ContentId) -> Option<&Entry> {
        self.wantlist.get(cid)
    }

    pub fn block(&self, cid: &ContentId) -> Option<&Block> {
        self.blocks.get(cid)
    }

    pub fn wantlist_len(&self) -> usize {
        self.wantlist.len()
    }

    pub fn blocks_len(&self) -> usize {
        self.blocks.len()
    }

    /// Request `cid`, replacing any existing entry for it.
    pub fn add_entry(&mut self, cid: ContentId, priority: i64) {
        self.add_entry_with(cid, priority, false);
    }

    /// Withdraw a request for `cid`.
    ///
    /// Always leaves a tombstone with priority 0, even when `cid` was never
    /// wanted, so an incremental receiver learns to drop it.
    pub fn cancel(&mut self, cid: ContentId) {
        self.wantlist.remove(&cid);
        self.add_entry_with(cid, 0, true);
    }

    pub fn add_block(&mut self, block: Block) {
        self.blocks.insert(block.cid().clone(), block);
    }

    fn add_entry_with(&mut self, cid: ContentId, priority: i64, cancel: bool) {
        match self.wantlist.get_mut(&cid) {
            Some(entry) => {
                entry.priority = priority;
                entry.cancel = cancel;
            }
            None => {
                self.wantlist.insert(
                    cid.clone(),
                    Entry {
                        cid,
                        priority,
                        cancel,
                    },
                );
            }
        }
    }

    /// Convert to the wire schema.
    ///
    /// Blocks are sent as raw data only; the receiver derives their ids.
    pub fn to_wire(&self) -> wire::Message {
        let entries = self
            .wantlist
            .values()
            .map(|e| wire::message::wantlist::Entry {
                block: e.cid.to_bytes(),
                priority: wire_priority(e.priority),
                cancel: e.cancel,
            })
            .collect();

        wire::Message {
            wantlist: Some(wire::message::Wantlist {
                entries,
                full: self.full,
            }),
            blocks: self.blocks.values().map(|b| b.data().clone()).collect(),
        }
    }

    /// Build a message from the wire schema.
    ///
    /// Entries are applied in wire order, so a repeated key keeps the last
    /// value. Any malformed key fails the whole message.
    pub fn from_wire(pb: wire::Message) -> Result<Self, MessageError> {
        let wantlist = pb.wantlist.unwrap_or_default();
        let mut m = Self::new(wantlist.full);

        for e in wantlist.entries {
            let cid = ContentId::from_raw_bytes(&e.block).map_err(MessageError::MalformedKey)?;
            m.add_entry_with(cid, i64::from(e.priority), e.cancel);
        }

        for data in pb.blocks {
            m.add_block(Block::new(data));
        }

        Ok(m)
    }

    /// Encode into the wire schema's binary form, without framing.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_wire().encode_to_vec()
    }

    /// Decode from the wire schema's binary form, without framing.
    pub fn from_bytes(data: &[u8]) -> Result<Self, MessageError> {
        let pb = wire::Message::decode(data)?;
        Self::from_wire(pb)
    }

    /// Diagnostic summary: block ids as strings and the want-list entries.
    pub fn summary(&self) -> MessageSummary {
        MessageSummary {
            full: self.full,
            blocks: self.blocks.keys().map(|c| c.to_string()).collect(),
            wants: self.wantlist(),
        }
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new(false)
    }
}
