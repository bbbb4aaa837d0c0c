//! Configuration loading for backports.
//!
//! Configuration is a single YAML file. Every section except `tracker.url`
//! has defaults, so the smallest useful file is:
//!
//! ```yaml
//! tracker:
//!   url: https://issues.example.com
//! ```
//!
//! The tracker token can be kept out of the file by setting
//! [`TOKEN_ENV`] instead.

use crate::error::{Error, Result, StorageError};
use crate::resolver::CustomFieldIds;
use crate::storage::StorageBackend;
use crate::sync::{DEFAULT_JQL, DEFAULT_PAGE_SIZE, DEFAULT_STORE_TIMEOUT, SyncOptions};
use crate::transport::{
    DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_RETRIES, DEFAULT_READ_TIMEOUT, RetryPolicy,
};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Default configuration file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

/// Environment variable overriding `tracker.token`.
pub const TOKEN_ENV: &str = "BACKPORTS_TRACKER_TOKEN";

/// Environment variable naming the configuration file for the server.
pub const CONFIG_ENV: &str = "BACKPORTS_CONFIG";

/// Default JSONL data file, relative to the configuration file.
pub const DEFAULT_DATA_FILE: &str = "backports.jsonl";

/// Top-level configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackportsConfig {
    /// Issue tracker connection
    pub tracker: TrackerConfig,

    /// Document store
    #[serde(default)]
    pub store: StoreConfig,

    /// Retry behaviour of tracker requests
    #[serde(default)]
    pub transport: TransportConfig,

    /// Sync run parameters
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Tracker configuration section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Base URL of the tracker
    pub url: String,

    /// Bearer token
    #[serde(default)]
    pub token: String,

    /// Query selecting the tracked issues
    #[serde(default = "default_jql")]
    pub jql: String,

    /// Custom field ids
    #[serde(default)]
    pub fields: CustomFieldIds,
}

fn default_jql() -> String {
    DEFAULT_JQL.to_string()
}

/// Store configuration section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend name: `jsonl` or `memory`
    pub backend: String,

    /// JSONL data file, relative to the configuration file's directory
    pub data_file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "jsonl".to_string(),
            data_file: DEFAULT_DATA_FILE.to_string(),
        }
    }
}

impl StoreConfig {
    /// Resolve the configured backend, anchoring relative paths at `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnknownBackend`] for an unrecognised backend.
    pub fn to_backend(&self, base_dir: &Path) -> Result<StorageBackend> {
        match self.backend.as_str() {
            "jsonl" => Ok(StorageBackend::Jsonl(base_dir.join(&self.data_file))),
            "memory" => Ok(StorageBackend::InMemory),
            other => Err(StorageError::UnknownBackend(other.to_string()).into()),
        }
    }
}

/// Transport configuration section
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TransportConfig {
    /// Retries after a rate-limited first attempt
    pub max_retries: u32,

    /// First exponential-backoff delay in milliseconds
    pub initial_backoff_ms: u64,

    /// Longest pause between two reads of a response, in seconds
    pub read_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff_ms: u64::try_from(DEFAULT_INITIAL_BACKOFF.as_millis())
                .unwrap_or(u64::MAX),
            read_timeout_secs: DEFAULT_READ_TIMEOUT.as_secs(),
        }
    }
}

impl TransportConfig {
    /// Read timeout for the HTTP client.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// Retry policy for the transport.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
        }
    }
}

/// Sync configuration section
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    /// Issues per page of the tracking query
    pub page_size: usize,

    /// Bound on each store call, in seconds
    pub store_timeout_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            store_timeout_secs: DEFAULT_STORE_TIMEOUT.as_secs(),
        }
    }
}

impl BackportsConfig {
    /// Create a configuration for the tracker at `url` with all defaults.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            tracker: TrackerConfig {
                url: url.into(),
                token: String::new(),
                jql: default_jql(),
                fields: CustomFieldIds::default(),
            },
            store: StoreConfig::default(),
            transport: TransportConfig::default(),
            sync: SyncConfig::default(),
        }
    }

    /// Load, override from the environment, and validate a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid YAML, or
    /// fails validation.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let mut config = Self::from_yaml(&content)?;
        config.apply_token_override(std::env::var(TOKEN_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration from YAML text without validating it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the text is not a valid configuration.
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Replace the token with `token` when it is set and non-empty.
    pub fn apply_token_override(&mut self, token: Option<String>) {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.tracker.token = token;
        }
    }

    /// Check the configuration for values that cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.tracker.url)
            .map_err(|e| Error::Config(format!("tracker.url '{}': {e}", self.tracker.url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "tracker.url must be http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.tracker.jql.trim().is_empty() {
            return Err(Error::Config("tracker.jql must not be empty".to_string()));
        }
        if self.sync.page_size == 0 {
            return Err(Error::Config("sync.page_size must be at least 1".to_string()));
        }
        if self.transport.read_timeout_secs == 0 {
            return Err(Error::Config(
                "transport.read_timeout_secs must be at least 1".to_string(),
            ));
        }
        if !matches!(self.store.backend.as_str(), "jsonl" | "memory") {
            return Err(Error::Config(format!(
                "store.backend must be 'jsonl' or 'memory', got '{}'",
                self.store.backend
            )));
        }
        Ok(())
    }

    /// Parameters for a sync run.
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            jql: self.tracker.jql.clone(),
            page_size: self.sync.page_size,
            store_timeout: self.store_timeout(),
            fields: self.tracker.fields.clone(),
        }
    }

    /// Bound on each store call.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.store_timeout_secs)
    }
}

/// Directory that relative paths in the file at `config_path` resolve against.
pub fn config_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
