//! # vrift-overlay
//!
//! Inspect and maintain the overlay storage of a Velo Rift checkout.
//! Opening the overlay takes the mount lock, so these commands fail with a
//! lock error while the checkout is mounted.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use vrift_config::logging::init_logging;
use vrift_config::{log_overlay_debug, Config};
use vrift_overlay::{EntryPayload, InodeNumber, Overlay, OverlayOptions};

mod inspect;

/// Velo Rift overlay storage tool
#[derive(Parser)]
#[command(name = "vrift-overlay")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Overlay root directory (overrides config and VRIFT_OVERLAY_DIR)
    #[arg(long = "overlay-dir", global = true)]
    overlay_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the overlay directory if it does not exist
    Init,

    /// Show overlay location, format and record counts
    Info,

    /// Print the highest inode number referenced by the overlay
    MaxInode,

    /// List the entries of a directory record
    Ls {
        #[arg(value_name = "INODE")]
        inode: InodeNumber,
    },

    /// Write the content of a file record to stdout
    Cat {
        #[arg(value_name = "INODE")]
        inode: InodeNumber,
    },

    /// Delete the record of an inode
    Rm {
        #[arg(value_name = "INODE")]
        inode: InodeNumber,
    },

    /// Configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
    /// Print config file locations
    Path,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load().context("Failed to load configuration")?;
    init_logging(config.log.level);

    if let Some(dir) = &cli.overlay_dir {
        config.overlay.local_dir = dir.clone();
    }

    match cli.command {
        Commands::Config { command } => cmd_config(&config, command),
        Commands::Init => with_overlay(&config, |overlay, out| {
            writeln!(out, "Overlay ready at {}", overlay.local_dir().display())?;
            Ok(())
        }),
        Commands::Info => with_overlay(&config, |overlay, out| {
            let summary = inspect::summarize(overlay)?;
            inspect::print_summary(out, overlay, &summary)
        }),
        Commands::MaxInode => with_overlay(&config, |overlay, out| {
            let max = overlay
                .max_recorded_inode()
                .context("Failed to scan overlay")?;
            writeln!(out, "{}", max)?;
            Ok(())
        }),
        Commands::Ls { inode } => with_overlay(&config, |overlay, out| {
            let dir = overlay
                .load_dir(inode)?
                .with_context(|| format!("No directory record for inode {}", inode))?;
            for (name, entry) in &dir.entries {
                let target = match entry.payload {
                    EntryPayload::Materialized(child) => format!("inode {}", child),
                    EntryPayload::SourceControl(hash) => format!("hash {}", hash),
                };
                writeln!(out, "{:06o}  {:<45}  {}", entry.mode, target, name)?;
            }
            Ok(())
        }),
        Commands::Cat { inode } => with_overlay(&config, |overlay, out| {
            let data = overlay
                .read_file(inode)?
                .with_context(|| format!("No file record for inode {}", inode))?;
            out.write_all(&data)?;
            Ok(())
        }),
        Commands::Rm { inode } => with_overlay(&config, |overlay, out| {
            overlay.remove(inode)?;
            writeln!(out, "Removed inode {}", inode)?;
            Ok(())
        }),
    }
}

/// Open the configured overlay, run `f`, then release the lock.
fn with_overlay<F>(config: &Config, f: F) -> Result<()>
where
    F: FnOnce(&Overlay, &mut io::StdoutLock<'static>) -> Result<()>,
{
    let local_dir = config.overlay.resolved_local_dir();
    log_overlay_debug!(
        "opening overlay",
        local_dir = tracing::field::display(local_dir.display())
    );
    let overlay = Overlay::open_with(&local_dir, OverlayOptions::from(&config.overlay))
        .with_context(|| format!("Failed to open overlay at {}", local_dir.display()))?;

    let mut out = io::stdout().lock();
    let result = f(&overlay, &mut out).and_then(|()| Ok(out.flush()?));
    overlay.close();
    result
}

fn cmd_config(config: &Config, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            print!("{}", config.to_toml()?);
        }
        ConfigCommands::Path => {
            match Config::global_config_path() {
                Some(p) => println!("Global:  {}", p.display()),
                None => println!("Global:  (no home directory)"),
            }
            println!("Project: .vrift/config.toml");
            println!("Overlay: {}", config.overlay.resolved_local_dir().display());
        }
    }
    Ok(())
}
