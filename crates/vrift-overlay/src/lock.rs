//! Mount-wide advisory lock held on the info file.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;
use vrift_config::log_overlay_warn;

use crate::error::{OverlayError, Result};

/// Exclusive `flock` on the overlay info file, released on drop.
#[derive(Debug)]
pub struct OverlayLock {
    file: File,
    path: PathBuf,
}

impl OverlayLock {
    /// Take the lock without blocking.
    ///
    /// Contention is reported as [`OverlayError::LockHeld`]; it is never
    /// retried.
    pub fn acquire(file: File, path: &Path) -> Result<Self> {
        match file.try_lock_exclusive() {
            Ok(()) => {
                debug!(path = %path.display(), "acquired overlay lock");
                Ok(Self {
                    file,
                    path: path.to_path_buf(),
                })
            }
            Err(e) if is_contended(&e) => Err(OverlayError::LockHeld {
                path: path.to_path_buf(),
            }),
            Err(e) => Err(OverlayError::io("failed to lock", path, e)),
        }
    }

    /// The locked info file.
    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.kind() == io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

impl Drop for OverlayLock {
    fn drop(&mut self) {
        // Closing the descriptor releases the lock anyway; unlock first so a
        // failure shows up in the logs.
        if let Err(e) = FileExt::unlock(&self.file) {
            log_overlay_warn!(
                "failed to release overlay lock",
                path = tracing::field::display(self.path.display()),
                error = tracing::field::display(&e)
            );
        } else {
            debug!(path = %self.path.display(), "released overlay lock");
        }
    }
}
