//! Structured entry-list codec.
//!
//! The overlay frames an opaque serialized entry list with its own header.
//! Anything implementing [`EntryCodec`] can provide that serialization; the
//! default is [`BincodeCodec`].

use std::collections::BTreeMap;

use bincode::Options;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire form of a directory entry.
///
/// `inode_number == 0` means the entry is not materialized and `hash` holds
/// the source-control hash. Otherwise `hash` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEntry {
    pub mode: u32,
    pub inode_number: u64,
    pub hash: Vec<u8>,
}

/// Wire form of a directory record payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireDir {
    pub entries: BTreeMap<String, WireEntry>,
}

/// Errors produced by an [`EntryCodec`].
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("{0}")]
    Invalid(String),
}

/// Serializes directory entry lists.
pub trait EntryCodec: Send + Sync {
    /// Short name used in logs and configuration.
    fn name(&self) -> &'static str;

    fn encode(&self, dir: &WireDir) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<WireDir, CodecError>;
}

/// Default codec: bincode with fixed-width little-endian integers. Bytes
/// left over after the entry list are an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl BincodeCodec {
    fn options() -> impl Options {
        bincode::DefaultOptions::new()
            .with_fixint_encoding()
            .reject_trailing_bytes()
    }
}

impl EntryCodec for BincodeCodec {
    fn name(&self) -> &'static str {
        "bincode"
    }

    fn encode(&self, dir: &WireDir) -> Result<Vec<u8>, CodecError> {
        Ok(Self::options().serialize(dir)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<WireDir, CodecError> {
        let dir: WireDir = Self::options().deserialize(bytes)?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bincode_decode_rejects_garbage() {
        let codec = BincodeCodec;
        // Claims 2^64-1 entries.
        let bytes = [0xffu8; 8];
        assert!(codec.decode(&bytes).is_err());
    }

    #[test]
    fn test_bincode_rejects_trailing_bytes() {
        let codec = BincodeCodec;
        let mut bytes = codec.encode(&WireDir::default()).unwrap();
        assert_eq!(bytes, vec![0u8; 8]);
        bytes.extend_from_slice(b"GARBAGE-TAIL");
        assert!(codec.decode(&bytes).is_err());
    }
}
