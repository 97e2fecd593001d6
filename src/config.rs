//! Worker configuration
//!
//! Embedders hand the worker a TOML file (or just `WorkerConfig::default()`).
//! Every field has a default that reproduces the stock Pulse worker
//! behavior, so an empty file is a valid configuration.

use crate::error::{WorkerError, WorkerResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Cache namespace settings
    pub cache: CacheConfig,

    /// Fetch interception settings
    pub fetch: FetchConfig,
}

/// Cache namespace configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Prefix for generation names (`{prefix}-{millis}`)
    pub prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: "pulse-cache".to_string(),
        }
    }
}

/// Fetch interception configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Query parameter name used to cache-bust navigation requests
    pub bust_param: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            bust_param: "t".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Load configuration from a TOML file
    pub async fn load_from_file(path: &Path) -> WorkerResult<Self> {
        if !path.exists() {
            return Err(WorkerError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| WorkerError::io(format!("reading config from {}", path.display()), e))?;

        let config: Self = toml::from_str(&content).map_err(|e| WorkerError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate().map_err(|reason| WorkerError::ConfigInvalid {
            path: path.to_path_buf(),
            reason,
        })?;

        debug!("Loaded worker config from {}", path.display());
        Ok(config)
    }

    /// Validate field constraints
    ///
    /// The prefix becomes part of every cache name and the bust parameter is
    /// spliced into URLs, so neither may contain separator characters.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache.prefix.is_empty() {
            return Err("cache.prefix must not be empty".to_string());
        }
        if self.cache.prefix.contains(['/', '?', '#']) {
            return Err(format!(
                "cache.prefix '{}' contains a reserved character",
                self.cache.prefix
            ));
        }
        if self.fetch.bust_param.is_empty() {
            return Err("fetch.bust_param must not be empty".to_string());
        }
        if self.fetch.bust_param.contains(['=', '&', '?', '#']) {
            return Err(format!(
                "fetch.bust_param '{}' contains a reserved character",
                self.fetch.bust_param
            ));
        }
        Ok(())
    }
}
