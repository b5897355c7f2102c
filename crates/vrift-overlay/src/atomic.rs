//! Whole-file atomic replacement.

use std::io::Write;
use std::path::Path;

use crate::error::{IoContext, OverlayError, Result};

/// Prefix of in-flight temp files. Never parses as an inode number.
pub const TEMP_PREFIX: &str = ".tmp";

/// Replace `path` with the concatenation of `chunks`.
///
/// Data is written to a temp file in the same directory and renamed over
/// `path`, so readers see either the old file or the new one. A crash before
/// the rename leaves only a stray temp file behind.
pub fn write_file_atomic(path: &Path, chunks: &[&[u8]], fsync: bool) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)
        .io_context("failed to create temp file in", dir)?;

    for chunk in chunks {
        tmp.write_all(chunk)
            .io_context("failed to write", tmp.path())?;
    }
    if fsync {
        tmp.as_file()
            .sync_all()
            .io_context("failed to sync", tmp.path())?;
    }

    // On failure the temp file is removed when the error is dropped.
    tmp.persist(path)
        .map_err(|e| OverlayError::io("failed to rename into", path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_replaces_whole_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("7");
        std::fs::write(&path, b"old contents that are longer").unwrap();

        write_file_atomic(&path, &[b"new", b"!"], false).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new!");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("7");
        assert!(matches!(
            write_file_atomic(&path, &[b"x"], true),
            Err(OverlayError::Io { .. })
        ));
    }
}
