//! # vrift-overlay
//!
//! Durable on-disk storage for the materialized state of a Velo Rift
//! checkout, keyed by inode number.
//!
//! ## Directory Layout
//!
//! ```text
//! <local_dir>/
//! ├── info            # magic + format version, flock'd while mounted
//! ├── 00/ .. ff/      # shards by low byte of the inode number
//! │   └── <inode>     # 64-byte header + directory entries or file bytes
//! ```
//!
//! Directory records are replaced atomically (temp file + rename). File
//! records are created exclusively and written in place through the
//! returned handle. [`Overlay::max_recorded_inode`] rebuilds the inode
//! high-water mark after an unclean shutdown.

mod atomic;
pub mod codec;
pub mod dir_record;
mod error;
pub mod file_record;
pub mod header;
pub mod info;
pub mod inode;
mod lock;
mod overlay;
pub mod path;
pub mod recovery;

pub use codec::{BincodeCodec, CodecError, EntryCodec, WireDir, WireEntry};
pub use dir_record::{decode_dir, encode_dir, DecodeError, DirContents, EntryPayload, OverlayEntry};
pub use error::{OverlayError, Result};
pub use header::{build_header, validate_header, HeaderError, RecordHeader, RecordKind, Timespec, HEADER_LENGTH};
pub use inode::{mode_is_dir, ContentHash, InodeNumber, ParseInodeError};
pub use lock::OverlayLock;
pub use overlay::{Overlay, OverlayOptions};
