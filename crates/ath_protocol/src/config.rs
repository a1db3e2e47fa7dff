//! Process configuration.
//!
//! Resolved once at startup (defaults, then an optional TOML file, then CLI/env
//! overrides applied by the binary) and passed by value into every component.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::defaults::{
    DEFAULT_CHUNK_SIZE, DEFAULT_CSVS_BUCKET, DEFAULT_EXTERNAL_BASE_URL, DEFAULT_PLOTS_BUCKET,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_RENDERING_FORMAT, DEFAULT_WORKER_CONCURRENCY,
};
use crate::paths::{default_blob_root, default_config_path, default_database_path};
use crate::types::RenderingFormat;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Object store addressing. Used for bucket selection and URL construction only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Externally reachable base address, e.g. `http://localhost:9000`.
    pub external_base_url: String,
    pub csvs_bucket: String,
    pub plots_bucket: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            external_base_url: DEFAULT_EXTERNAL_BASE_URL.to_string(),
            csvs_bucket: DEFAULT_CSVS_BUCKET.to_string(),
            plots_bucket: DEFAULT_PLOTS_BUCKET.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AthConfig {
    pub database_path: PathBuf,
    pub blob_root: PathBuf,
    pub store: StoreConfig,
    pub rendering_format: RenderingFormat,
    /// Read buffer size for datasets, in bytes.
    pub chunk_size: usize,
    pub worker_concurrency: usize,
    pub poll_interval_ms: u64,
}

impl Default for AthConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            blob_root: default_blob_root(),
            store: StoreConfig::default(),
            rendering_format: DEFAULT_RENDERING_FORMAT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            worker_concurrency: DEFAULT_WORKER_CONCURRENCY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl AthConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Load configuration from `explicit`, or from `$ATH_HOME/config.toml` when it
    /// exists, falling back to defaults. An explicit path must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = default_config_path();
                if !path.exists() {
                    return Ok(Self::default());
                }
                path
            }
        };

        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be > 0".to_string()));
        }
        if self.worker_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "worker_concurrency must be > 0".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be > 0".to_string(),
            ));
        }
        if self.store.csvs_bucket.trim().is_empty() || self.store.plots_bucket.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "bucket names must not be empty".to_string(),
            ));
        }
        if self.store.external_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "store.external_base_url must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
