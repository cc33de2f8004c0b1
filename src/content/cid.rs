//! Content identifiers
//!
//! Wraps a CIDv1 whose multihash is SHA2-256 over the raw content.

use cid::Cid;
use multihash::Multihash;
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io;
use std::str::FromStr;

use super::ContentError;

/// SHA2-256 multihash code
const SHA2_256_CODE: u64 = 0x12;

/// Raw binary multicodec
pub const RAW_CODEC: u64 = 0x55;

fn sha256_multihash(data: &[u8]) -> Multihash<64> {
    let digest = Sha256::digest(data);
    Multihash::wrap(SHA2_256_CODE, &digest).expect("SHA256 digest is always 32 bytes")
}

/// Identifier of a piece of content.
///
/// Two equal byte strings always derive the same `ContentId`. Equality,
/// ordering and hashing follow the canonical binary encoding, so the type
/// is used directly as a map key.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentId {
    inner: Cid,
}

impl ContentId {
    /// Derive the identifier of `data`.
    pub fn for_data(data: &[u8]) -> Self {
        Self {
            inner: Cid::new_v1(RAW_CODEC, sha256_multihash(data)),
        }
    }

    pub fn from_cid(cid: Cid) -> Self {
        Self { inner: cid }
    }

    /// Parse the canonical binary encoding (CIDv0 or CIDv1).
    ///
    /// The whole slice must be one CID; trailing bytes are rejected.
    pub fn from_raw_bytes(bytes: &[u8]) -> Result<Self, ContentError> {
        let mut cursor = io::Cursor::new(bytes);
        let cid =
            Cid::read_bytes(&mut cursor).map_err(|e| ContentError::InvalidCid(e.to_string()))?;

        let consumed = cursor.position() as usize;
        if consumed != bytes.len() {
            return Err(ContentError::InvalidCid(format!(
                "{} trailing bytes after CID",
                bytes.len() - consumed
            )));
        }
        Ok(Self { inner: cid })
    }

    /// Parse the multibase string form.
    pub fn parse(s: &str) -> Result<Self, ContentError> {
        let cid = Cid::from_str(s).map_err(|e| ContentError::InvalidCid(e.to_string()))?;
        Ok(Self { inner: cid })
    }

    /// Canonical binary encoding, as carried in want-list keys.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.inner.to_bytes()
    }

    pub fn as_cid(&self) -> &Cid {
        &self.inner
    }

    pub fn codec(&self) -> u64 {
        self.inner.codec()
    }

    /// Check that `data` derives this identifier.
    pub fn verify(&self, data: &[u8]) -> bool {
        *self == Self::for_data(data)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContentId").field(&self.to_string()).finish()
    }
}

impl FromStr for ContentId {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ContentId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_data_same_id() {
        let a = ContentId::for_data(b"hello world");
        let b = ContentId::for_data(b"hello world");
        let c = ContentId::for_data(b"hello world!");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.codec(), RAW_CODEC);
    }

    #[test]
    fn test_binary_encoding_roundtrip() {
        let id = ContentId::for_data(b"some block");
        let parsed = ContentId::from_raw_bytes(&id.to_bytes()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_string_form_roundtrip() {
        let id = ContentId::for_data(b"some block");
        let parsed: ContentId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!(id.to_string().starts_with('b'));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(ContentId::from_raw_bytes(b"definitely not a cid").is_err());
        assert!(ContentId::from_raw_bytes(&[]).is_err());
        assert!(ContentId::parse("not-a-cid").is_err());
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        let mut bytes = ContentId::for_data(b"k").to_bytes();
        bytes.extend_from_slice(b"junk");
        assert!(matches!(
            ContentId::from_raw_bytes(&bytes),
            Err(ContentError::InvalidCid(_))
        ));

        let mut v0 = ContentId::from_cid(Cid::new_v0(sha256_multihash(b"k")).unwrap()).to_bytes();
        v0.push(0);
        assert!(ContentId::from_raw_bytes(&v0).is_err());
    }

    #[test]
    fn test_accepts_v0() {
        let v0 = Cid::new_v0(sha256_multihash(b"legacy block")).unwrap();
        let id = ContentId::from_cid(v0);
        assert_eq!(ContentId::from_raw_bytes(&id.to_bytes()).unwrap(), id);
        assert_eq!(ContentId::parse(&id.to_string()).unwrap(), id);
        assert!(id.to_string().starts_with("Qm"));
    }

    #[test]
    fn test_verify() {
        let id = ContentId::for_data(b"payload");
        assert!(id.verify(b"payload"));
        assert!(!id.verify(b"other payload"));
    }

    #[test]
    fn test_serializes_as_string() {
        let id = ContentId::for_data(b"payload");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
    }
}
