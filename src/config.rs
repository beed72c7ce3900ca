//! Storage configuration, loadable from TOML.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, StorageError};

/// Configuration for a [`Storage`](crate::Storage).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database file. `None` opens an in-memory database.
    pub path: Option<PathBuf>,
    /// Maximum number of database operations running at once.
    pub worker_threads: usize,
    /// How long SQLite waits on a locked database (milliseconds).
    pub busy_timeout_ms: u64,
    /// Use write-ahead logging for file databases.
    pub wal: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            worker_threads: 2,
            busy_timeout_ms: 5000,
            wal: true,
        }
    }
}

impl StorageConfig {
    /// A file-backed configuration with default settings.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// An in-memory configuration with default settings.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Sets the number of concurrent workers.
    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    /// Parses a configuration from TOML text.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| StorageError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StorageError::config(format!("read {}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    /// Checks the settings are usable.
    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(StorageError::config("worker_threads must be at least 1"));
        }
        Ok(())
    }
}
