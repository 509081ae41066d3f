//! Warm boot configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, WarmBootError};

/// Default snapshot location.
pub const DEFAULT_SNAPSHOT_PATH: &str = "/var/run/sonic/warmboot/host_table.json";

/// Configuration for warm boot capture and restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarmBootConfig {
    /// Where the snapshot is written before shutdown and read after restart
    pub snapshot_path: PathBuf,
    /// Abort reconciliation on the first entry error instead of dropping it
    pub strict: bool,
    /// Pretty-print the persisted snapshot
    pub pretty: bool,
    /// Remove an existing snapshot when capture fails, so the next boot is cold
    pub remove_stale_on_failure: bool,
}

impl Default for WarmBootConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
            strict: false,
            pretty: true,
            remove_stale_on_failure: true,
        }
    }
}

impl WarmBootConfig {
    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            WarmBootError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| WarmBootError::Config(e.to_string()))
    }

    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = path.into();
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}
