//! Test environment for isolated overlay testing.
//!
//! ```ignore
//! use vrift_config::testing::TestEnvironment;
//!
//! let env = TestEnvironment::new()?;
//! let overlay = Overlay::open(&env.overlay_dir)?;
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use tempfile::TempDir;

use crate::Config;

/// Atomic counter for unique test IDs
static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Isolated test environment with a private overlay location.
pub struct TestEnvironment {
    /// Temporary directory (dropped on cleanup)
    _temp_dir: TempDir,
    /// Overlay root. Not created; opening the overlay initializes it.
    pub overlay_dir: PathBuf,
    /// Scratch space next to the overlay
    pub scratch_dir: PathBuf,
    /// Unique test ID
    pub test_id: u32,
}

impl TestEnvironment {
    /// Create a new isolated test environment
    pub fn new() -> anyhow::Result<Self> {
        let test_id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();

        let overlay_dir = root.join(format!("overlay-{}", test_id));
        let scratch_dir = root.join("scratch");
        std::fs::create_dir_all(&scratch_dir)?;

        Ok(Self {
            _temp_dir: temp_dir,
            overlay_dir,
            scratch_dir,
            test_id,
        })
    }

    /// Config pointing at this environment's overlay, fsync disabled.
    pub fn config(&self) -> Config {
        let mut cfg = Config::default();
        cfg.overlay.local_dir = self.overlay_dir.clone();
        cfg.overlay.fsync = false;
        cfg
    }

    /// Environment variables selecting this overlay for a spawned process.
    pub fn env_vars(&self) -> Vec<(String, String)> {
        vec![
            (
                crate::ENV_OVERLAY_DIR.to_string(),
                self.overlay_dir.display().to_string(),
            ),
            (crate::ENV_OVERLAY_FSYNC.to_string(), "0".to_string()),
        ]
    }
}
