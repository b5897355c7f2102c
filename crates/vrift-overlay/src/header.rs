//! Fixed-length header prefixed to every per-inode overlay file.
//!
//! ## Layout (64 bytes, big-endian)
//!
//! ```text
//! 0       4        8                                  56        64
//! +-------+--------+----------------------------------+---------+
//! | ident | version| atime s/ns | ctime s/ns | mtime s/ns | zero  |
//! +-------+--------+----------------------------------+---------+
//! ```
//!
//! Timestamps are reserved and currently always written as zero.

use thiserror::Error;

/// Total header length in bytes.
pub const HEADER_LENGTH: usize = 64;

/// Record format version understood by this crate.
pub const HEADER_VERSION: u32 = 1;

const IDENT_LEN: usize = 4;
const VERSION_OFFSET: usize = IDENT_LEN;
const TIMES_OFFSET: usize = VERSION_OFFSET + 4;

/// Kind of record stored in an overlay file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Directory,
    File,
}

impl RecordKind {
    pub const fn identifier(self) -> &'static [u8; IDENT_LEN] {
        match self {
            RecordKind::Directory => b"OVDR",
            RecordKind::File => b"OVFL",
        }
    }
}

/// A (seconds, nanoseconds) pair as stored in the header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timespec {
    pub secs: u64,
    pub nanos: u64,
}

impl Timespec {
    pub const ZERO: Timespec = Timespec { secs: 0, nanos: 0 };
}

/// Errors raised while validating a header.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("too short for header: size={len}")]
    Truncated { len: usize },

    #[error("unexpected header identifier {found}")]
    BadIdentifier { found: String },

    #[error("unsupported overlay version {found}")]
    UnsupportedVersion { found: u32 },
}

/// Parsed header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub kind: RecordKind,
    pub version: u32,
    pub atime: Timespec,
    pub ctime: Timespec,
    pub mtime: Timespec,
}

/// Build a header. Timestamps are `[atime, ctime, mtime]`.
pub fn build_header(kind: RecordKind, version: u32, times: &[Timespec; 3]) -> [u8; HEADER_LENGTH] {
    let mut buf = [0u8; HEADER_LENGTH];
    buf[..IDENT_LEN].copy_from_slice(kind.identifier());
    buf[VERSION_OFFSET..TIMES_OFFSET].copy_from_slice(&version.to_be_bytes());
    let mut off = TIMES_OFFSET;
    for ts in times {
        buf[off..off + 8].copy_from_slice(&ts.secs.to_be_bytes());
        buf[off + 8..off + 16].copy_from_slice(&ts.nanos.to_be_bytes());
        off += 16;
    }
    buf
}

/// Header written for new records: current version, zero timestamps.
#[inline]
pub fn current_header(kind: RecordKind) -> [u8; HEADER_LENGTH] {
    build_header(kind, HEADER_VERSION, &[Timespec::ZERO; 3])
}

fn read_u64(buf: &[u8], off: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[off..off + 8]);
    u64::from_be_bytes(raw)
}

/// Validate the header at the start of `bytes` against `expected`.
///
/// Only the identifier and version are checked. Bytes past the header are
/// ignored.
pub fn validate_header(bytes: &[u8], expected: RecordKind) -> Result<RecordHeader, HeaderError> {
    if bytes.len() < HEADER_LENGTH {
        return Err(HeaderError::Truncated { len: bytes.len() });
    }

    let ident = &bytes[..IDENT_LEN];
    if ident != expected.identifier() {
        return Err(HeaderError::BadIdentifier {
            found: hex::encode(ident),
        });
    }

    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[VERSION_OFFSET..TIMES_OFFSET]);
    let version = u32::from_be_bytes(raw);
    if version != HEADER_VERSION {
        return Err(HeaderError::UnsupportedVersion { found: version });
    }

    let ts = |i: usize| {
        let off = TIMES_OFFSET + i * 16;
        Timespec {
            secs: read_u64(bytes, off),
            nanos: read_u64(bytes, off + 8),
        }
    };

    Ok(RecordHeader {
        kind: expected,
        version,
        atime: ts(0),
        ctime: ts(1),
        mtime: ts(2),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = current_header(RecordKind::Directory);
        assert_eq!(header.len(), HEADER_LENGTH);
        assert_eq!(&header[..4], b"OVDR");
        assert_eq!(&header[4..8], &[0, 0, 0, 1]);
        assert!(header[8..].iter().all(|&b| b == 0));

        let header = current_header(RecordKind::File);
        assert_eq!(&header[..4], b"OVFL");
    }

    #[test]
    fn test_timestamps_are_big_endian() {
        let times = [
            Timespec { secs: 1, nanos: 2 },
            Timespec { secs: 3, nanos: 4 },
            Timespec {
                secs: 0x0102030405060708,
                nanos: 999_999_999,
            },
        ];
        let header = build_header(RecordKind::File, HEADER_VERSION, &times);
        assert_eq!(header[15], 1);
        assert_eq!(header[23], 2);
        assert_eq!(&header[40..48], &[1, 2, 3, 4, 5, 6, 7, 8]);
        // Padding after the third pair stays zero.
        assert!(header[56..].iter().all(|&b| b == 0));

        let parsed = validate_header(&header, RecordKind::File).unwrap();
        assert_eq!(parsed.atime, times[0]);
        assert_eq!(parsed.ctime, times[1]);
        assert_eq!(parsed.mtime, times[2]);
    }

    #[test]
    fn test_validate_rejects_short_buffer() {
        let header = current_header(RecordKind::Directory);
        let err = validate_header(&header[..HEADER_LENGTH - 1], RecordKind::Directory).unwrap_err();
        assert_eq!(err, HeaderError::Truncated { len: 63 });
        assert!(validate_header(&[], RecordKind::Directory).is_err());
    }

    #[test]
    fn test_validate_rejects_wrong_kind() {
        let header = current_header(RecordKind::File);
        match validate_header(&header, RecordKind::Directory) {
            Err(HeaderError::BadIdentifier { found }) => assert_eq!(found, "4f56464c"),
            other => panic!("expected BadIdentifier, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_other_version() {
        let header = build_header(RecordKind::Directory, 2, &[Timespec::ZERO; 3]);
        assert_eq!(
            validate_header(&header, RecordKind::Directory),
            Err(HeaderError::UnsupportedVersion { found: 2 })
        );
    }

    #[test]
    fn test_validate_ignores_trailing_payload() {
        let mut buf = current_header(RecordKind::Directory).to_vec();
        buf.extend_from_slice(b"payload");
        let parsed = validate_header(&buf, RecordKind::Directory).unwrap();
        assert_eq!(parsed.version, HEADER_VERSION);
        assert_eq!(parsed.kind, RecordKind::Directory);
    }
}
