//! Materialized regular files: a file-kind header followed by raw content.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

use vrift_config::log_overlay_warn;

use crate::error::{IoContext, OverlayError, Result};
use crate::header::{current_header, validate_header, RecordHeader, RecordKind, HEADER_LENGTH};
use crate::inode::InodeNumber;

/// Exclusively create the record file at `path` and write its header.
///
/// Fails with [`OverlayError::AlreadyExists`] if anything is already there;
/// the existing file is left untouched. If the header cannot be written the
/// new file is removed again. The returned handle is positioned after the
/// header.
pub fn create_file(path: &Path, inode: InodeNumber) -> Result<File> {
    let mut opts = OpenOptions::new();
    opts.read(true).write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }

    let file = match opts.open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(OverlayError::AlreadyExists { inode })
        }
        Err(e) => return Err(OverlayError::io("failed to create", path, e)),
    };

    write_new_header(file, path)
}

/// Write the file header to a freshly created record, removing the record
/// if the write fails.
fn write_new_header(mut file: File, path: &Path) -> Result<File> {
    if let Err(e) = file.write_all(&current_header(RecordKind::File)) {
        drop(file);
        if let Err(rm) = fs::remove_file(path) {
            log_overlay_warn!(
                "failed to remove headerless overlay file",
                path = tracing::field::display(path.display()),
                error = tracing::field::display(&rm)
            );
        }
        return Err(OverlayError::io("failed to write header to", path, e));
    }

    Ok(file)
}

/// Read and validate the file header from the current position of `file`.
fn read_header(file: &mut File, path: &Path) -> Result<RecordHeader> {
    let mut buf = Vec::with_capacity(HEADER_LENGTH);
    Read::by_ref(file)
        .take(HEADER_LENGTH as u64)
        .read_to_end(&mut buf)
        .io_context("failed to read", path)?;
    validate_header(&buf, RecordKind::File).map_err(|e| OverlayError::header(path, e))
}

/// Open an existing file record for reading and writing.
///
/// The header is validated and the handle is positioned immediately after
/// it.
pub fn open_file(path: &Path) -> Result<File> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .io_context("failed to open", path)?;
    read_header(&mut file, path)?;
    Ok(file)
}

/// Read the content of a file record, or `None` if there is no record.
pub fn read_file(path: &Path) -> Result<Option<Vec<u8>>> {
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(OverlayError::io("failed to open", path, e)),
    };
    read_header(&mut file, path)?;
    let mut data = Vec::new();
    file.read_to_end(&mut data)
        .io_context("failed to read", path)?;
    Ok(Some(data))
}
