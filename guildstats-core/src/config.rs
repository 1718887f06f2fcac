//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/guildstats/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/guildstats/` (~/.config/guildstats/)
//! - Data (output artifacts): `$XDG_DATA_HOME/guildstats/` (~/.local/share/guildstats/)
//! - State/Logs: `$XDG_STATE_HOME/guildstats/` (~/.local/state/guildstats/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Ingestion pass configuration
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Query service configuration
    #[serde(default)]
    pub query: QueryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Ingestion pass configuration
#[derive(Debug, Deserialize)]
pub struct IngestConfig {
    /// Write a partial checkpoint of the in-progress maps every N records.
    /// 0 disables checkpointing.
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: u64,

    /// Override the output directory for artifacts (defaults to the XDG data dir)
    pub data_dir: Option<PathBuf>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            checkpoint_every: default_checkpoint_every(),
            data_dir: None,
        }
    }
}

fn default_checkpoint_every() -> u64 {
    100_000
}

/// Query service configuration
#[derive(Debug, Deserialize)]
pub struct QueryConfig {
    /// How long a loaded artifact snapshot stays fresh, in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

fn default_cache_ttl_secs() -> u64 {
    300
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/guildstats/config.toml` (~/.config/guildstats/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("guildstats").join("config.toml")
    }

    /// Returns the data directory for output artifacts, honoring the
    /// `ingest.data_dir` override.
    ///
    /// `$XDG_DATA_HOME/guildstats/` (~/.local/share/guildstats/)
    pub fn data_dir(&self) -> PathBuf {
        self.ingest
            .data_dir
            .clone()
            .unwrap_or_else(Self::default_data_dir)
    }

    /// Returns the default (XDG) data directory path
    pub fn default_data_dir() -> PathBuf {
        xdg_data_home().join("guildstats")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/guildstats/` (~/.local/state/guildstats/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("guildstats")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("guildstats.log")
    }
}
