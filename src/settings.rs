use std::path::{Path, PathBuf};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::constants::{CATALOG_DB_FILE, NAMESPACE_DIR, SETTINGS_FILE_PATH};
use crate::helper::env_or_default;

fn default_data_dir() -> String {
    env_or_default("QUIZFORGE_DATA_DIR", "data")
}

fn default_pool_size() -> u32 {
    5
}

fn default_log_filter() -> String {
    env_or_default("QUIZFORGE_LOG", "info")
}

fn default_drain_window_secs() -> u64 {
    10
}

fn default_drain_poll_ms() -> u64 {
    50
}

/// Delete-time drain behavior: how long in-flight requests of a Deleting
/// tenant get to finish before the namespace is dropped.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DrainSettings {
    #[serde(default = "default_drain_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_drain_poll_ms")]
    pub poll_ms: u64,
}

impl Default for DrainSettings {
    fn default() -> Self {
        Self {
            window_secs: default_drain_window_secs(),
            poll_ms: default_drain_poll_ms(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding the catalog database and the namespace databases.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Size of the shared physical connection pool.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default)]
    pub drain: DrainSettings,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            pool_size: default_pool_size(),
            drain: DrainSettings::default(),
            log_filter: default_log_filter(),
        }
    }
}

impl Settings {
    /// Load settings from file, falling back to defaults if it is absent.
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let path = path.unwrap_or_else(|| Path::new(SETTINGS_FILE_PATH));
        if !path.exists() {
            debug!(path = %path.display(), "No settings file; using defaults");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn catalog_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(CATALOG_DB_FILE)
    }

    pub fn namespace_dir(&self) -> PathBuf {
        Path::new(&self.data_dir).join(NAMESPACE_DIR)
    }
}
