// src/config.rs
// File-backed configuration with serde defaults

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::error::{EngramError, Result};

/// Top-level configuration, loaded from `~/.engram/config.toml`.
///
/// A missing file means defaults; a file that exists but does not parse is
/// a startup error, because silently ignoring a half-written config is
/// worse than refusing to start.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngramConfig {
    pub store: StoreConfig,
    pub maintenance: MaintenanceConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_db_path().to_string_lossy().into_owned(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Whether the background scheduler runs at all.
    pub enabled: bool,
    /// Seconds between maintenance ticks.
    pub interval_secs: u64,
    /// A memory unaccessed for this many days is decayed.
    pub decay_after_days: i64,
    /// Multiplier applied to stale weights each tick.
    pub decay_factor: f64,
    /// Memories below this weight are deleted.
    pub eviction_floor: f64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 1800,
            decay_after_days: 7,
            decay_factor: 0.9,
            eviction_floor: 0.1,
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".engram")
}

fn default_db_path() -> PathBuf {
    config_dir().join("engram.db")
}

impl EngramConfig {
    /// Load from the default location, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(config_dir().join("config.toml"))
    }

    /// Load from an explicit path. Used directly by tests.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "[config] no file, using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| EngramError::Config(format!("{}: {e}", path.display())))
    }
}
