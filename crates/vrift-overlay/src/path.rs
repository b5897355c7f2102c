//! Sharded path mapping.
//!
//! ```text
//! <local_dir>/
//! ├── info
//! ├── 00/
//! ├── 01/
//! │   ├── 1
//! │   └── 257
//! ...
//! └── ff/
//! ```
//!
//! Inode numbers are allocated in increasing order, so the low byte spreads
//! records evenly across the 256 shards.

use std::path::{Path, PathBuf};

use crate::inode::InodeNumber;

/// Number of shard subdirectories under the overlay root.
pub const SHARD_COUNT: usize = 256;

/// Two lowercase hex digits naming the shard for a raw low byte.
#[inline]
pub fn shard_name_for_byte(byte: u8) -> String {
    format!("{:02x}", byte)
}

/// Shard directory name for an inode.
#[inline]
pub fn shard_name(inode: InodeNumber) -> String {
    shard_name_for_byte((inode.get() & 0xff) as u8)
}

/// All shard names, `00` through `ff`.
pub fn shard_names() -> impl Iterator<Item = String> {
    (0..SHARD_COUNT).map(|n| shard_name_for_byte(n as u8))
}

/// Path of the record file for `inode` under `local_dir`.
pub fn overlay_file_path(local_dir: &Path, inode: InodeNumber) -> PathBuf {
    local_dir.join(shard_name(inode)).join(inode.get().to_string())
}
