//! Identifiers stored in overlay records.

use std::fmt;
use std::num::NonZeroU64;
use std::str::FromStr;

use thiserror::Error;

/// 64-bit inode number. Zero is reserved as the on-disk "not materialized"
/// sentinel and can never name a real inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InodeNumber(NonZeroU64);

impl InodeNumber {
    /// Inode number of the checkout root.
    pub const ROOT: InodeNumber = match NonZeroU64::new(1) {
        Some(n) => InodeNumber(n),
        None => unreachable!(),
    };

    /// Returns `None` for zero.
    #[inline]
    pub const fn new(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(n) => Some(InodeNumber(n)),
            None => None,
        }
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for InodeNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A string that is not the canonical decimal form of an inode number.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid inode number {0:?}")]
pub struct ParseInodeError(String);

impl FromStr for InodeNumber {
    type Err = ParseInodeError;

    /// Parses the decimal form used for overlay file names. Only plain ASCII
    /// digits without a leading zero are accepted, so signs, padding and `"0"`
    /// are errors.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.starts_with('0') || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseInodeError(s.to_string()));
        }
        s.parse::<NonZeroU64>()
            .map(InodeNumber)
            .map_err(|_| ParseInodeError(s.to_string()))
    }
}

/// Length of a source-control content hash (SHA-1).
pub const CONTENT_HASH_LEN: usize = 20;

/// Reference to source-control-backed content for an unmaterialized entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; CONTENT_HASH_LEN]);

impl ContentHash {
    pub const fn new(bytes: [u8; CONTENT_HASH_LEN]) -> Self {
        ContentHash(bytes)
    }

    /// Build from a byte slice, failing if the length is wrong.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; CONTENT_HASH_LEN] = bytes.try_into().ok()?;
        Some(ContentHash(arr))
    }

    /// Parse a 40-char hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; CONTENT_HASH_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// File type mask and directory bit of a POSIX mode.
pub const S_IFMT: u32 = 0o170000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFREG: u32 = 0o100000;

/// True if `mode` designates a directory.
#[inline]
pub fn mode_is_dir(mode: u32) -> bool {
    mode & S_IFMT == S_IFDIR
}
