//! Immutable content blocks

use bytes::Bytes;

use super::{ContentError, ContentId};

/// A block of raw content together with its derived identifier.
///
/// The identifier is always computed from the data, never taken on trust.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    cid: ContentId,
    data: Bytes,
}

impl Block {
    /// Create a block, deriving its identifier from `data`.
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let cid = ContentId::for_data(&data);
        Self { cid, data }
    }

    /// Rebuild a block from an identifier and data, checking they agree.
    pub fn from_parts(expected: ContentId, data: impl Into<Bytes>) -> Result<Self, ContentError> {
        let data = data.into();
        if !expected.verify(&data) {
            return Err(ContentError::IntegrityMismatch {
                expected,
                actual: ContentId::for_data(&data),
            });
        }
        Ok(Self {
            cid: expected,
            data,
        })
    }

    pub fn cid(&self) -> &ContentId {
        &self.cid
    }

    /// Raw payload bytes
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_id_derived_from_data() {
        let block = Block::new(b"block data".to_vec());
        assert_eq!(block.cid(), &ContentId::for_data(b"block data"));
        assert_eq!(block.size(), 10);
        assert_eq!(&block.data()[..], b"block data");
    }

    #[test]
    fn test_from_parts_checks_integrity() {
        let id = ContentId::for_data(b"one");
        assert!(Block::from_parts(id.clone(), Bytes::from_static(b"one")).is_ok());

        let err = Block::from_parts(id.clone(), Bytes::from_static(b"two")).unwrap_err();
        assert_eq!(
            err,
            ContentError::IntegrityMismatch {
                expected: id,
                actual: ContentId::for_data(b"two"),
            }
        );
    }
}
