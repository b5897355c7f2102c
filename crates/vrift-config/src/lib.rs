//! # vrift-config
//!
//! Configuration management for the Velo Rift overlay.
//!
//! Loads configuration from:
//! 1. `~/.vrift/config.toml` (global)
//! 2. `.vrift/config.toml` (project-local, overrides global)
//! 3. Environment variables (highest priority)

pub mod logging;
pub mod path;
pub mod testing;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use logging::LogLevel;

/// Overrides the overlay root directory.
pub const ENV_OVERLAY_DIR: &str = "VRIFT_OVERLAY_DIR";
/// `0`/`false` disables fsync before rename.
pub const ENV_OVERLAY_FSYNC: &str = "VRIFT_OVERLAY_FSYNC";
/// Log level name.
pub const ENV_LOG_LEVEL: &str = "VRIFT_LOG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML render error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub overlay: OverlayConfig,
    pub log: LogConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        let global = Self::global_config_path();
        let mut config = Self::load_from(global.as_deref(), Some(Path::new(".vrift/config.toml")))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from explicit global and project files, without env overrides.
    /// Missing files are skipped.
    pub fn load_from(global: Option<&Path>, project: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(global_path) = global.filter(|p| p.exists()) {
            debug!("Loading global config from {:?}", global_path);
            let contents = std::fs::read_to_string(global_path)?;
            config = toml::from_str(&contents)?;
        }

        if let Some(project_path) = project.filter(|p| p.exists()) {
            debug!("Loading project config from {:?}", project_path);
            let contents = std::fs::read_to_string(project_path)?;
            let project_config: Config = toml::from_str(&contents)?;
            config.merge(project_config);
        }

        Ok(config)
    }

    /// Global config path: ~/.vrift/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".vrift/config.toml"))
    }

    /// Merge another config. Values the project file leaves at their
    /// defaults do not override the global file.
    fn merge(&mut self, other: Config) {
        let defaults = Config::default();
        if other.overlay.local_dir != defaults.overlay.local_dir {
            self.overlay.local_dir = other.overlay.local_dir;
        }
        if other.overlay.fsync != defaults.overlay.fsync {
            self.overlay.fsync = other.overlay.fsync;
        }
        if other.overlay.codec != defaults.overlay.codec {
            self.overlay.codec = other.overlay.codec;
        }
        if other.log.level != defaults.log.level {
            self.log.level = other.log.level;
        }
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(ENV_OVERLAY_DIR) {
            self.overlay.local_dir = PathBuf::from(dir);
        }
        if let Some(fsync) = lookup(ENV_OVERLAY_FSYNC) {
            self.overlay.fsync = !matches!(fsync.as_str(), "0" | "false" | "no");
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).and_then(|l| LogLevel::parse(&l)) {
            self.log.level = level;
        }
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Generate default config TOML string
    pub fn default_toml() -> Result<String, ConfigError> {
        Config::default().to_toml()
    }
}

/// Serializer used for directory entry lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    #[default]
    Bincode,
}

/// Overlay storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Overlay root; a leading `~` is expanded
    pub local_dir: PathBuf,
    /// fsync record files before they are renamed into place
    pub fsync: bool,
    /// Directory entry codec
    pub codec: CodecKind,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            local_dir: PathBuf::from("~/.vrift/overlay"),
            fsync: true,
            codec: CodecKind::Bincode,
        }
    }
}

impl OverlayConfig {
    /// `local_dir` with `~` expanded.
    pub fn resolved_local_dir(&self) -> PathBuf {
        path::expand_home(&self.local_dir)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
}
