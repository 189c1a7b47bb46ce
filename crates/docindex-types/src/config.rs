//! Configuration loading for doc-index-sync.
//!
//! Layered config: defaults -> config file -> env vars. The config file
//! lives at the platform config directory under `doc-index-sync/config.toml`;
//! environment variables use the `DOCINDEX_` prefix.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::SyncError;

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Maximum time to wait for all storage collaborators to connect.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Delay before reconnecting after a fault.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Minimum interval between progress stream emissions.
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,

    /// Whether trashed documents are considered live when reading the
    /// root structure.
    #[serde(default)]
    pub include_trash: bool,
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_throttle_ms() -> u64 {
    1000
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            retry_delay_secs: default_retry_delay_secs(),
            throttle_ms: default_throttle_ms(),
            include_trash: false,
        }
    }
}

impl SyncConfig {
    /// Load configuration with layering: defaults -> file -> env vars.
    pub fn load() -> Result<Self, SyncError> {
        let mut builder = Config::builder();

        if let Some(path) = Self::config_file_path() {
            builder = builder.add_source(File::from(path).required(false));
        }

        let settings = builder
            .add_source(Environment::with_prefix("DOCINDEX"))
            .build()
            .map_err(|e| SyncError::Config(e.to_string()))?;

        let config: SyncConfig = settings
            .try_deserialize()
            .map_err(|e| SyncError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Default config file location, if a home directory is available.
    pub fn config_file_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "doc-index-sync")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.connect_timeout_secs == 0 {
            return Err(SyncError::Config(
                "connect_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.retry_delay_secs == 0 {
            return Err(SyncError::Config(
                "retry_delay_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}
