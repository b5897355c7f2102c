//! Overlay summary for `vrift-overlay info`.

use std::fs;
use std::io::Write;

use anyhow::{Context, Result};
use vrift_overlay::info::OVERLAY_VERSION;
use vrift_overlay::path::shard_names;
use vrift_overlay::{InodeNumber, Overlay};

/// Record counts gathered from the shards.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub records: u64,
    pub total_bytes: u64,
    /// Leftover temp files from interrupted writes
    pub stray_files: u64,
    pub max_inode: Option<InodeNumber>,
}

pub fn summarize(overlay: &Overlay) -> Result<Summary> {
    let mut summary = Summary::default();
    for shard in shard_names() {
        let shard_dir = overlay.local_dir().join(&shard);
        let entries = fs::read_dir(&shard_dir)
            .with_context(|| format!("Failed to read shard {}", shard_dir.display()))?;
        for entry in entries {
            let entry = entry?;
            let parsed = entry
                .file_name()
                .to_str()
                .and_then(|n| n.parse::<InodeNumber>().ok());
            match parsed {
                Some(inode) => {
                    summary.records += 1;
                    summary.total_bytes += entry.metadata()?.len();
                    summary.max_inode = summary.max_inode.max(Some(inode));
                }
                None => summary.stray_files += 1,
            }
        }
    }
    Ok(summary)
}

pub fn print_summary(out: &mut impl Write, overlay: &Overlay, summary: &Summary) -> Result<()> {
    writeln!(out, "Overlay:        {}", overlay.local_dir().display())?;
    writeln!(out, "Format version: {}", OVERLAY_VERSION)?;
    writeln!(out, "Records:        {}", summary.records)?;
    writeln!(out, "Total bytes:    {}", summary.total_bytes)?;
    if summary.stray_files > 0 {
        writeln!(out, "Stray files:    {}", summary.stray_files)?;
    }
    match summary.max_inode {
        Some(max) => writeln!(out, "Highest record: {}", max)?,
        None => writeln!(out, "Highest record: (none)")?,
    }
    Ok(())
}
