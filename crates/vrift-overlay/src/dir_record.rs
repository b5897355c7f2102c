//! Directory record codec.
//!
//! A directory record is a directory-kind header followed by the entry list
//! serialized through an [`EntryCodec`]. The in-memory entry is a tagged
//! union; the zero-inode sentinel exists only on the wire.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::codec::{CodecError, EntryCodec, WireDir, WireEntry};
use crate::header::{current_header, validate_header, HeaderError, RecordKind, HEADER_LENGTH};
use crate::inode::{mode_is_dir, ContentHash, InodeNumber};

/// Where a child's data lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPayload {
    /// Child has its own overlay record.
    Materialized(InodeNumber),
    /// Child is unmodified source-control content.
    SourceControl(ContentHash),
}

/// One child of an overlay directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayEntry {
    pub mode: u32,
    pub payload: EntryPayload,
}

impl OverlayEntry {
    pub fn materialized(mode: u32, inode: InodeNumber) -> Self {
        Self {
            mode,
            payload: EntryPayload::Materialized(inode),
        }
    }

    pub fn source_control(mode: u32, hash: ContentHash) -> Self {
        Self {
            mode,
            payload: EntryPayload::SourceControl(hash),
        }
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        mode_is_dir(self.mode)
    }

    /// Inode number if the child is materialized.
    #[inline]
    pub fn inode(&self) -> Option<InodeNumber> {
        match self.payload {
            EntryPayload::Materialized(ino) => Some(ino),
            EntryPayload::SourceControl(_) => None,
        }
    }

    fn to_wire(self) -> WireEntry {
        match self.payload {
            EntryPayload::Materialized(ino) => WireEntry {
                mode: self.mode,
                inode_number: ino.get(),
                hash: Vec::new(),
            },
            EntryPayload::SourceControl(hash) => WireEntry {
                mode: self.mode,
                inode_number: 0,
                hash: hash.as_bytes().to_vec(),
            },
        }
    }

    fn from_wire(name: &str, wire: WireEntry) -> Result<Self, DecodeError> {
        let payload = match InodeNumber::new(wire.inode_number) {
            Some(ino) => EntryPayload::Materialized(ino),
            None => {
                if wire.hash.is_empty() {
                    return Err(DecodeError::InvalidEntry {
                        name: name.to_string(),
                        reason: "inode number 0 with empty hash".to_string(),
                    });
                }
                let hash = ContentHash::from_slice(&wire.hash).ok_or_else(|| {
                    DecodeError::InvalidEntry {
                        name: name.to_string(),
                        reason: format!("hash has {} bytes", wire.hash.len()),
                    }
                })?;
                EntryPayload::SourceControl(hash)
            }
        };
        Ok(Self {
            mode: wire.mode,
            payload,
        })
    }
}

/// Contents of a directory inode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirContents {
    pub entries: BTreeMap<String, OverlayEntry>,
    /// Source tree this directory still matches, if any.
    tree_hash: Option<ContentHash>,
}

impl DirContents {
    /// Empty materialized directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory that still matches a source-control tree.
    pub fn from_tree(tree_hash: ContentHash, entries: BTreeMap<String, OverlayEntry>) -> Self {
        Self {
            entries,
            tree_hash: Some(tree_hash),
        }
    }

    pub fn is_materialized(&self) -> bool {
        self.tree_hash.is_none()
    }

    pub fn tree_hash(&self) -> Option<&ContentHash> {
        self.tree_hash.as_ref()
    }

    /// Mark as diverged from source control.
    pub fn materialize(&mut self) {
        self.tree_hash = None;
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: OverlayEntry) -> Option<OverlayEntry> {
        self.entries.insert(name.into(), entry)
    }

    pub fn remove(&mut self, name: &str) -> Option<OverlayEntry> {
        self.entries.remove(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Errors decoding a directory record.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("invalid entry {name:?}: {reason}")]
    InvalidEntry { name: String, reason: String },
}

/// Serialize `dir` into a complete directory record.
///
/// # Panics
///
/// Panics if `dir` is not materialized. Only materialized directories are
/// stored in the overlay.
pub fn encode_dir(codec: &dyn EntryCodec, dir: &DirContents) -> Result<Vec<u8>, CodecError> {
    assert!(
        dir.is_materialized(),
        "encode_dir called on an unmaterialized directory"
    );

    let wire = WireDir {
        entries: dir
            .entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.to_wire()))
            .collect(),
    };
    let payload = codec.encode(&wire)?;

    let mut out = Vec::with_capacity(HEADER_LENGTH + payload.len());
    out.extend_from_slice(&current_header(RecordKind::Directory));
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Parse a complete directory record.
pub fn decode_dir(codec: &dyn EntryCodec, bytes: &[u8]) -> Result<DirContents, DecodeError> {
    validate_header(bytes, RecordKind::Directory)?;
    let wire = codec.decode(&bytes[HEADER_LENGTH..])?;

    let mut dir = DirContents::new();
    for (name, entry) in wire.entries {
        let entry = OverlayEntry::from_wire(&name, entry)?;
        dir.entries.insert(name, entry);
    }
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BincodeCodec;
    use crate::header::{build_header, Timespec};
    use crate::inode::{S_IFDIR, S_IFREG};

    fn ino(n: u64) -> InodeNumber {
        InodeNumber::new(n).unwrap()
    }

    fn hash(byte: u8) -> ContentHash {
        ContentHash::new([byte; 20])
    }

    fn mixed_dir() -> DirContents {
        let mut dir = DirContents::new();
        dir.insert("src", OverlayEntry::materialized(S_IFDIR | 0o755, ino(5)));
        dir.insert("README.md", OverlayEntry::source_control(S_IFREG | 0o644, hash(0xaa)));
        dir.insert("build.sh", OverlayEntry::materialized(S_IFREG | 0o755, ino(77)));
        dir.insert("vendor", OverlayEntry::source_control(S_IFDIR | 0o755, hash(0x01)));
        dir
    }

    #[test]
    fn test_encode_decode_mixed_entries() {
        let codec = BincodeCodec;
        let dir = mixed_dir();
        let bytes = encode_dir(&codec, &dir).unwrap();
        assert_eq!(&bytes[..4], b"OVDR");

        let decoded = decode_dir(&codec, &bytes).unwrap();
        assert_eq!(decoded, dir);
        assert!(decoded.is_materialized());
    }

    #[test]
    fn test_empty_dir() {
        let codec = BincodeCodec;
        let bytes = encode_dir(&codec, &DirContents::new()).unwrap();
        assert!(decode_dir(&codec, &bytes).unwrap().is_empty());
    }

    #[test]
    fn test_wire_sentinel() {
        let wire = OverlayEntry::source_control(S_IFREG, hash(3)).to_wire();
        assert_eq!(wire.inode_number, 0);
        assert_eq!(wire.hash, vec![3u8; 20]);

        let wire = OverlayEntry::materialized(S_IFREG, ino(9)).to_wire();
        assert_eq!(wire.inode_number, 9);
        assert!(wire.hash.is_empty());
    }

    fn record_with(entry: WireEntry) -> Vec<u8> {
        let mut wire = WireDir::default();
        wire.entries.insert("bad".to_string(), entry);
        let mut bytes = current_header(RecordKind::Directory).to_vec();
        bytes.extend(BincodeCodec.encode(&wire).unwrap());
        bytes
    }

    #[test]
    fn test_decode_rejects_zero_inode_without_hash() {
        let bytes = record_with(WireEntry {
            mode: S_IFREG,
            inode_number: 0,
            hash: Vec::new(),
        });
        match decode_dir(&BincodeCodec, &bytes) {
            Err(DecodeError::InvalidEntry { name, .. }) => assert_eq!(name, "bad"),
            other => panic!("expected InvalidEntry, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_short_hash() {
        let bytes = record_with(WireEntry {
            mode: S_IFREG,
            inode_number: 0,
            hash: vec![1, 2, 3],
        });
        assert!(matches!(
            decode_dir(&BincodeCodec, &bytes),
            Err(DecodeError::InvalidEntry { .. })
        ));
    }

    #[test]
    fn test_decode_checks_header_first() {
        let codec = BincodeCodec;
        let mut bytes = encode_dir(&codec, &mixed_dir()).unwrap();
        bytes[..4].copy_from_slice(b"OVFL");
        assert!(matches!(
            decode_dir(&codec, &bytes),
            Err(DecodeError::Header(HeaderError::BadIdentifier { .. }))
        ));

        let mut bytes = build_header(RecordKind::Directory, 7, &[Timespec::ZERO; 3]).to_vec();
        bytes.extend(codec.encode(&WireDir::default()).unwrap());
        assert!(matches!(
            decode_dir(&codec, &bytes),
            Err(DecodeError::Header(HeaderError::UnsupportedVersion { found: 7 }))
        ));

        assert!(matches!(
            decode_dir(&codec, b"OVDR"),
            Err(DecodeError::Header(HeaderError::Truncated { len: 4 }))
        ));
    }

    #[test]
    #[should_panic(expected = "unmaterialized")]
    fn test_encode_requires_materialized() {
        let dir = DirContents::from_tree(hash(7), BTreeMap::new());
        let _ = encode_dir(&BincodeCodec, &dir);
    }
}
