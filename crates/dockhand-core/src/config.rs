//! Configuration types for Dockhand.

use crate::{error::ServiceError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockhandConfig {
    /// Record storage configuration.
    pub storage: StorageConfig,

    /// Request handling configuration.
    pub service: ServiceConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl DockhandConfig {
    /// Loads a configuration from a JSON file. Missing keys take defaults.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Config` if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ServiceError::Config(format!("{}: {}", path.display(), e)))?;

        serde_json::from_str(&raw)
            .map_err(|e| ServiceError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Loads `path` if it exists, otherwise returns the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Record storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the registry database.
    pub db_path: PathBuf,

    /// Use an in-memory database that is discarded on exit.
    pub temporary: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./dockhand_registry.db"),
            temporary: false,
        }
    }
}

/// Request handling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Maximum time a request may take, in milliseconds. `0` disables it.
    pub request_timeout_ms: u64,
}

impl ServiceConfig {
    /// The request timeout, if one is configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5_000,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. `info` or `dockhand_registry=debug`.
    /// `RUST_LOG` takes precedence.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
