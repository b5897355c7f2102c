//! The open, locked overlay handle.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};
use vrift_config::{log_overlay_debug, log_overlay_info, CodecKind, OverlayConfig};

use crate::atomic::write_file_atomic;
use crate::codec::{BincodeCodec, EntryCodec};
use crate::dir_record::{decode_dir, encode_dir, DirContents};
use crate::error::{IoContext, OverlayError, Result};
use crate::file_record;
use crate::info::{encode_info, validate_info, INFO_FILE, INFO_LENGTH, LEGACY_TREE_DIR, OVERLAY_VERSION};
use crate::inode::InodeNumber;
use crate::lock::OverlayLock;
use crate::path::{overlay_file_path, shard_names};
use crate::recovery;

/// Options for opening an overlay.
pub struct OverlayOptions {
    /// fsync record files before renaming them into place.
    pub fsync: bool,
    /// Serializer for directory entry lists.
    pub codec: Box<dyn EntryCodec>,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            fsync: true,
            codec: Box::new(BincodeCodec),
        }
    }
}

impl From<&OverlayConfig> for OverlayOptions {
    fn from(config: &OverlayConfig) -> Self {
        let codec: Box<dyn EntryCodec> = match config.codec {
            CodecKind::Bincode => Box::new(BincodeCodec),
        };
        Self {
            fsync: config.fsync,
            codec,
        }
    }
}

/// Overlay storage for one mount.
///
/// Holding an `Overlay` means the info record has been validated and the
/// mount lock is held; the lock is released when the handle is dropped.
/// Record operations on distinct inodes may run concurrently from multiple
/// threads. Writes to the same inode must be serialized by the caller.
pub struct Overlay {
    local_dir: PathBuf,
    codec: Box<dyn EntryCodec>,
    fsync: bool,
    lock: OverlayLock,
}

impl std::fmt::Debug for Overlay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Overlay")
            .field("local_dir", &self.local_dir)
            .field("codec", &self.codec.name())
            .field("fsync", &self.fsync)
            .finish()
    }
}

impl Overlay {
    /// Open the overlay at `local_dir`, initializing it if it does not exist.
    pub fn open<P: AsRef<Path>>(local_dir: P) -> Result<Self> {
        Self::open_with(local_dir, OverlayOptions::default())
    }

    /// Open using settings from configuration.
    pub fn open_from_config(config: &OverlayConfig) -> Result<Self> {
        Self::open_with(config.resolved_local_dir(), OverlayOptions::from(config))
    }

    #[instrument(skip_all, fields(local_dir = %local_dir.as_ref().display()), level = "debug")]
    pub fn open_with<P: AsRef<Path>>(local_dir: P, options: OverlayOptions) -> Result<Self> {
        let local_dir = local_dir.as_ref().to_path_buf();

        if is_legacy_format(&local_dir) {
            return Err(OverlayError::LegacyFormat { path: local_dir });
        }

        let info_path = local_dir.join(INFO_FILE);
        let info_file = match File::open(&info_path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                init_new_overlay(&local_dir, options.fsync)?;
                File::open(&info_path).io_context("failed to open", &info_path)?
            }
            Err(e) => return Err(OverlayError::io("failed to open", &info_path, e)),
        };
        read_info(&info_file, &info_path)?;

        let lock = OverlayLock::acquire(info_file, &info_path)?;
        log_overlay_info!(
            "overlay opened",
            local_dir = tracing::field::display(local_dir.display()),
            codec = options.codec.name()
        );

        Ok(Self {
            local_dir,
            codec: options.codec,
            fsync: options.fsync,
            lock,
        })
    }

    /// Release the mount lock.
    pub fn close(self) {
        log_overlay_debug!(
            "closing overlay",
            local_dir = tracing::field::display(self.local_dir.display())
        );
    }

    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    /// Path of the info file the mount lock is held on.
    pub fn info_path(&self) -> &Path {
        self.lock.path()
    }

    /// Path of the record file for `inode`.
    pub fn file_path(&self, inode: InodeNumber) -> PathBuf {
        overlay_file_path(&self.local_dir, inode)
    }

    /// Whether a record file exists for `inode`.
    pub fn has_data(&self, inode: InodeNumber) -> Result<bool> {
        let path = self.file_path(inode);
        match fs::symlink_metadata(&path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(OverlayError::io("failed to stat", &path, e)),
        }
    }

    /// Load a directory record. `Ok(None)` if the inode has no record.
    #[instrument(skip(self), level = "debug")]
    pub fn load_dir(&self, inode: InodeNumber) -> Result<Option<DirContents>> {
        let path = self.file_path(inode);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(OverlayError::io("failed to read", &path, e)),
        };
        decode_dir(self.codec.as_ref(), &bytes)
            .map(Some)
            .map_err(|e| OverlayError::decode(&path, e))
    }

    /// Atomically replace the directory record for `inode`.
    ///
    /// # Panics
    ///
    /// Panics if `dir` is not materialized.
    #[instrument(skip(self, dir), fields(entries = dir.len()), level = "debug")]
    pub fn save_dir(&self, inode: InodeNumber, dir: &DirContents) -> Result<()> {
        let bytes = encode_dir(self.codec.as_ref(), dir)
            .map_err(|source| OverlayError::Encode { inode, source })?;
        write_file_atomic(&self.file_path(inode), &[&bytes], self.fsync)
    }

    /// Delete the record for `inode`. Succeeds if there is none.
    #[instrument(skip(self), level = "debug")]
    pub fn remove(&self, inode: InodeNumber) -> Result<()> {
        let path = self.file_path(inode);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OverlayError::io("failed to unlink", &path, e)),
        }
    }

    /// Create the record for a newly materialized regular file.
    ///
    /// The returned handle is positioned after the header.
    #[instrument(skip(self), level = "debug")]
    pub fn create_file(&self, inode: InodeNumber) -> Result<File> {
        file_record::create_file(&self.file_path(inode), inode)
    }

    /// Open the record of a materialized regular file, positioned after the
    /// header.
    pub fn open_file(&self, inode: InodeNumber) -> Result<File> {
        file_record::open_file(&self.file_path(inode))
    }

    /// Content of a materialized regular file, or `None` if there is no
    /// record.
    pub fn read_file(&self, inode: InodeNumber) -> Result<Option<Vec<u8>>> {
        file_record::read_file(&self.file_path(inode))
    }

    /// Highest inode number referenced by any overlay data.
    ///
    /// Call once after opening, before allocating new inode numbers.
    pub fn max_recorded_inode(&self) -> Result<InodeNumber> {
        recovery::compute_max_inode(self)
    }
}

/// A `tree` directory marks an overlay from before the info file existed.
fn is_legacy_format(local_dir: &Path) -> bool {
    fs::symlink_metadata(local_dir.join(LEGACY_TREE_DIR)).is_ok()
}

/// Create the root, every shard, and the info file.
fn init_new_overlay(local_dir: &Path, fsync: bool) -> Result<()> {
    log_overlay_info!(
        "initializing overlay",
        local_dir = tracing::field::display(local_dir.display())
    );
    fs::create_dir_all(local_dir).io_context("failed to create overlay directory", local_dir)?;

    for shard in shard_names() {
        let shard_dir = local_dir.join(&shard);
        match fs::create_dir(&shard_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(OverlayError::io("failed to create overlay directory", &shard_dir, e)),
        }
    }

    let info_path = local_dir.join(INFO_FILE);
    write_file_atomic(&info_path, &[&encode_info(OVERLAY_VERSION)], fsync)?;
    debug!(path = %info_path.display(), version = OVERLAY_VERSION, "wrote overlay info");
    Ok(())
}

/// Validate the info file's magic and version.
fn read_info(file: &File, path: &Path) -> Result<u32> {
    let mut buf = Vec::with_capacity(INFO_LENGTH);
    file.take(INFO_LENGTH as u64)
        .read_to_end(&mut buf)
        .io_context("failed to read", path)?;
    validate_info(&buf).map_err(|e| OverlayError::header(path, e))
}
