use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::codec::CodecError;
use crate::dir_record::DecodeError;
use crate::header::HeaderError;
use crate::inode::InodeNumber;

/// Errors that can occur during overlay operations.
///
/// A missing record is not an error: loads return `Ok(None)` and removal of
/// an absent record succeeds.
#[derive(Error, Debug)]
pub enum OverlayError {
    #[error(
        "the overlay format at {path} predates versioned overlays and cannot be used; \
         remove it and recreate the checkout"
    )]
    LegacyFormat { path: PathBuf },

    #[error("corrupt overlay header in {path}: {reason}")]
    CorruptHeader { path: PathBuf, reason: String },

    #[error("unsupported overlay version {version} in {path}")]
    UnsupportedVersion { path: PathBuf, version: u32 },

    #[error("corrupt overlay record {path}: {reason}")]
    CorruptRecord { path: PathBuf, reason: String },

    #[error("overlay at {path} is locked by another mount")]
    LockHeld { path: PathBuf },

    #[error("overlay record for inode {inode} already exists")]
    AlreadyExists { inode: InodeNumber },

    #[error("failed to encode directory for inode {inode}: {source}")]
    Encode {
        inode: InodeNumber,
        #[source]
        source: CodecError,
    },

    #[error("{op} {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, OverlayError>;

impl OverlayError {
    pub(crate) fn io(op: &'static str, path: &Path, source: io::Error) -> Self {
        OverlayError::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn header(path: &Path, err: HeaderError) -> Self {
        match err {
            HeaderError::UnsupportedVersion { found } => OverlayError::UnsupportedVersion {
                path: path.to_path_buf(),
                version: found,
            },
            other => OverlayError::CorruptHeader {
                path: path.to_path_buf(),
                reason: other.to_string(),
            },
        }
    }

    pub(crate) fn decode(path: &Path, err: DecodeError) -> Self {
        match err {
            DecodeError::Header(h) => Self::header(path, h),
            other => OverlayError::CorruptRecord {
                path: path.to_path_buf(),
                reason: other.to_string(),
            },
        }
    }
}

/// Attach an operation name and path to a raw I/O result.
pub(crate) trait IoContext<T> {
    fn io_context(self, op: &'static str, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context(self, op: &'static str, path: &Path) -> Result<T> {
        self.map_err(|e| OverlayError::io(op, path, e))
    }
}
