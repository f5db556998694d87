//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/dwdy/config.toml)
//! 3. Environment variables (DWDY_* prefix)
//!
//! Environment variables take precedence over config file values.
//! Settings that belong to the data (enabled features, default layout) live
//! in the database instead; see [`crate::storage::AppConfig`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::feature::DEFAULT_THUMBNAIL_WIDTH;

/// Environment variable prefix
const ENV_PREFIX: &str = "DWDY";

/// Default bound on empty entries skipped by a neighbour search
pub const DEFAULT_NEIGHBOR_SCAN_LIMIT: usize = 10_000;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the SQLite database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// `tracing` filter directive (e.g. "info", "dwdy_core=debug")
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Maximum entries visited when looking for a non-empty neighbour
    #[serde(default = "default_neighbor_scan_limit")]
    pub neighbor_scan_limit: usize,

    /// Thumbnail width for processed images, in pixels
    #[serde(default = "default_thumbnail_width")]
    pub thumbnail_width: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_filter: default_log_filter(),
            neighbor_scan_limit: DEFAULT_NEIGHBOR_SCAN_LIMIT,
            thumbnail_width: DEFAULT_THUMBNAIL_WIDTH,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (DWDY_DATA_DIR, DWDY_LOG, DWDY_NEIGHBOR_SCAN_LIMIT)
    /// 2. Config file (~/.config/dwdy/config.toml or DWDY_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Configuration rooted at `data_dir`, ignoring files and environment
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // DWDY_DATA_DIR
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        // DWDY_LOG
        if let Ok(val) = std::env::var(format!("{}_LOG", ENV_PREFIX)) {
            if !val.trim().is_empty() {
                self.log_filter = val;
            }
        }

        // DWDY_NEIGHBOR_SCAN_LIMIT
        if let Ok(val) = std::env::var(format!("{}_NEIGHBOR_SCAN_LIMIT", ENV_PREFIX)) {
            match val.parse::<usize>() {
                Ok(limit) if limit > 0 => self.neighbor_scan_limit = limit,
                _ => warn!("Ignoring invalid DWDY_NEIGHBOR_SCAN_LIMIT '{}'", val),
            }
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path())
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with DWDY_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dwdy")
            .join("config.toml")
    }

    /// Get the path to the SQLite database
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("dwdy.db")
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dwdy")
}

fn default_log_filter() -> String {
    "warn".to_string()
}

fn default_neighbor_scan_limit() -> usize {
    DEFAULT_NEIGHBOR_SCAN_LIMIT
}

fn default_thumbnail_width() -> u32 {
    DEFAULT_THUMBNAIL_WIDTH
}
