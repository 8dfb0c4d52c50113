//! Configuration for the broker.
//!
//! TOML-based configuration with defaulted sections. The default path is
//! `~/.config/saf-broker/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// `log_level` is not a recognized tracing level.
    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),

    /// `data_dir` is empty.
    #[error("data_dir must not be empty")]
    EmptyDataDir,

    /// `cache_dir` is empty.
    #[error("cache_dir must not be empty")]
    EmptyCacheDir,
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the broker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Broker state and logging configuration.
    pub broker: BrokerConfig,

    /// Transfer destination configuration.
    pub transfer: TransferConfig,
}

/// Broker state and logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BrokerConfig {
    /// Directory for broker state (grant store, staging files).
    pub data_dir: PathBuf,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

/// Transfer destination configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransferConfig {
    /// Directory picked files are copied into when copy-to-cache is requested.
    pub cache_dir: PathBuf,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
        }
    }
}

/// Default data directory: `~/.local/share/saf-broker` (platform equivalent).
fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("saf-broker")
}

/// Default cache directory: `~/.cache/saf-broker` (platform equivalent).
fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("saf-broker")
}

impl Config {
    /// Default configuration file path: `~/.config/saf-broker/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("saf-broker")
            .join("config.toml")
    }

    /// Loads configuration from the given path.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads from the default path, falling back to defaults when absent.
    pub fn load_or_default() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Saves configuration to the given path.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create config directory: {}", parent.display())
            })?;
        }
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validates field values.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if !VALID_LOG_LEVELS.contains(&self.broker.log_level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.broker.log_level.clone()));
        }
        if self.broker.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDataDir);
        }
        if self.transfer.cache_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyCacheDir);
        }
        Ok(())
    }

    /// Path of the grant store file.
    pub fn store_path(&self) -> PathBuf {
        self.broker.data_dir.join("grants.json")
    }

    /// Directory for temporary save-source staging files.
    pub fn staging_dir(&self) -> PathBuf {
        self.broker.data_dir.join("staging")
    }

    /// Directory picked files are copied into.
    pub fn cache_dir(&self) -> &Path {
        &self.transfer.cache_dir
    }
}
