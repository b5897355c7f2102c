//! Recovery of the inode allocation high-water mark.
//!
//! The overlay does not persist the highest allocated inode number, so every
//! open rediscovers it in two passes:
//!
//! 1. Walk directory records down from the root, folding in every
//!    materialized child.
//! 2. Enumerate all shards and fold in every numeric file name. This catches
//!    records no directory references any more, such as files that were
//!    unlinked while still open.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use rayon::prelude::*;
use tracing::instrument;
use vrift_config::{log_recovery_info, log_recovery_warn};

use crate::dir_record::EntryPayload;
use crate::error::{IoContext, Result};
use crate::inode::InodeNumber;
use crate::overlay::Overlay;
use crate::path::shard_names;

/// Highest inode number referenced by the overlay's data.
#[instrument(skip_all, level = "debug")]
pub fn compute_max_inode(overlay: &Overlay) -> Result<InodeNumber> {
    let from_tree = max_inode_in_tree(overlay)?;
    let from_shards = max_inode_in_shards(overlay)?;
    let max = from_tree.max(from_shards.unwrap_or(InodeNumber::ROOT));
    log_recovery_info!(
        "recovered max inode",
        max_inode = max.get(),
        from_tree = from_tree.get(),
        from_shards = from_shards.map_or(0, InodeNumber::get)
    );
    Ok(max)
}

/// Walk directory records from the root with an explicit stack.
pub fn max_inode_in_tree(overlay: &Overlay) -> Result<InodeNumber> {
    let mut max = InodeNumber::ROOT;
    let mut stack = vec![InodeNumber::ROOT];
    let mut visited = HashSet::new();

    while let Some(dir_inode) = stack.pop() {
        if !visited.insert(dir_inode) {
            log_recovery_warn!(
                "directory reached twice during recovery walk",
                inode = dir_inode.get()
            );
            continue;
        }

        let Some(dir) = overlay.load_dir(dir_inode)? else {
            continue;
        };

        for entry in dir.entries.values() {
            let EntryPayload::Materialized(child) = entry.payload else {
                continue;
            };
            max = max.max(child);
            if entry.is_dir() {
                stack.push(child);
            }
        }
    }

    Ok(max)
}

/// Largest numeric file name across all shards, or `None` if the shards are
/// empty.
pub fn max_inode_in_shards(overlay: &Overlay) -> Result<Option<InodeNumber>> {
    let local_dir = overlay.local_dir();
    let shards: Vec<String> = shard_names().collect();
    let per_shard = shards
        .par_iter()
        .map(|shard| max_inode_in_shard(&local_dir.join(shard)))
        .collect::<Result<Vec<_>>>()?;
    Ok(per_shard.into_iter().flatten().max())
}

fn max_inode_in_shard(shard_dir: &Path) -> Result<Option<InodeNumber>> {
    let mut max = None;
    for entry in fs::read_dir(shard_dir).io_context("failed to read shard", shard_dir)? {
        let entry = entry.io_context("failed to read shard", shard_dir)?;
        let parsed = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<InodeNumber>().ok());
        if let Some(inode) = parsed {
            max = max.max(Some(inode));
        }
    }
    Ok(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dir_record::{DirContents, OverlayEntry};
    use crate::inode::{ContentHash, S_IFDIR, S_IFREG};
    use crate::overlay::OverlayOptions;
    use crate::OverlayError;
    use tempfile::TempDir;

    fn ino(n: u64) -> InodeNumber {
        InodeNumber::new(n).unwrap()
    }

    fn open(dir: &Path) -> Overlay {
        Overlay::open_with(
            dir,
            OverlayOptions {
                fsync: false,
                ..OverlayOptions::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn test_empty_overlay_is_root() {
        let tmp = TempDir::new().unwrap();
        let overlay = open(tmp.path());
        assert_eq!(compute_max_inode(&overlay).unwrap(), InodeNumber::ROOT);
    }

    #[test]
    fn test_tree_walk_follows_directories_only() {
        let tmp = TempDir::new().unwrap();
        let overlay = open(tmp.path());

        let mut root = DirContents::new();
        root.insert("dir", OverlayEntry::materialized(S_IFDIR | 0o755, ino(3)));
        root.insert("file", OverlayEntry::materialized(S_IFREG | 0o644, ino(4)));
        root.insert(
            "pristine",
            OverlayEntry::source_control(S_IFDIR | 0o755, ContentHash::new([9; 20])),
        );
        overlay.save_dir(InodeNumber::ROOT, &root).unwrap();

        let mut sub = DirContents::new();
        sub.insert("deep", OverlayEntry::materialized(S_IFREG | 0o644, ino(17)));
        overlay.save_dir(ino(3), &sub).unwrap();

        // A regular file's inode is never loaded as a directory.
        assert_eq!(max_inode_in_tree(&overlay).unwrap(), ino(17));
    }

    #[test]
    fn test_unlinked_and_orphaned_records_are_counted() {
        let tmp = TempDir::new().unwrap();
        let overlay = open(tmp.path());

        let mut root = DirContents::new();
        root.insert("a", OverlayEntry::materialized(S_IFDIR | 0o755, ino(5)));
        overlay.save_dir(InodeNumber::ROOT, &root).unwrap();

        // B was unlinked from A but its record was kept.
        overlay.save_dir(ino(5), &DirContents::new()).unwrap();
        overlay.save_dir(ino(9), &DirContents::new()).unwrap();

        // Orphan only visible through its shard.
        drop(overlay.create_file(ino(42)).unwrap());

        assert_eq!(max_inode_in_tree(&overlay).unwrap(), ino(5));
        assert_eq!(max_inode_in_shards(&overlay).unwrap(), Some(ino(42)));
        assert_eq!(overlay.max_recorded_inode().unwrap(), ino(42));
    }

    #[test]
    fn test_non_numeric_names_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let overlay = open(tmp.path());
        fs::write(tmp.path().join("07").join(".tmpXyZ123"), b"partial").unwrap();
        fs::write(tmp.path().join("ff").join("notes"), b"").unwrap();
        fs::write(tmp.path().join("00").join("0"), b"").unwrap();
        fs::write(tmp.path().join("84").join("+900"), b"").unwrap();
        fs::write(tmp.path().join("84").join("0900"), b"").unwrap();
        assert_eq!(max_inode_in_shards(&overlay).unwrap(), None);
        assert_eq!(overlay.max_recorded_inode().unwrap(), InodeNumber::ROOT);
    }

    #[test]
    fn test_directory_cycle_terminates() {
        let tmp = TempDir::new().unwrap();
        let overlay = open(tmp.path());

        let mut root = DirContents::new();
        root.insert("loop", OverlayEntry::materialized(S_IFDIR | 0o755, ino(2)));
        overlay.save_dir(InodeNumber::ROOT, &root).unwrap();

        let mut looped = DirContents::new();
        looped.insert("up", OverlayEntry::materialized(S_IFDIR | 0o755, InodeNumber::ROOT));
        looped.insert("self", OverlayEntry::materialized(S_IFDIR | 0o755, ino(2)));
        overlay.save_dir(ino(2), &looped).unwrap();

        assert_eq!(max_inode_in_tree(&overlay).unwrap(), ino(2));
    }

    #[test]
    fn test_deep_tree_does_not_recurse() {
        let tmp = TempDir::new().unwrap();
        let overlay = open(tmp.path());

        let depth = 2_000u64;
        for n in 1..depth {
            let mut dir = DirContents::new();
            dir.insert("d", OverlayEntry::materialized(S_IFDIR | 0o755, ino(n + 1)));
            overlay.save_dir(ino(n), &dir).unwrap();
        }
        assert_eq!(max_inode_in_tree(&overlay).unwrap(), ino(depth));
    }

    #[test]
    fn test_corrupt_directory_aborts_scan() {
        let tmp = TempDir::new().unwrap();
        let overlay = open(tmp.path());
        fs::write(overlay.file_path(InodeNumber::ROOT), b"OVDR").unwrap();
        assert!(matches!(
            overlay.max_recorded_inode(),
            Err(OverlayError::CorruptHeader { .. })
        ));
    }

    #[test]
    fn test_missing_shard_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let overlay = open(tmp.path());
        fs::remove_dir(tmp.path().join("a3")).unwrap();
        assert!(matches!(
            overlay.max_recorded_inode(),
            Err(OverlayError::Io { .. })
        ));
    }
}
