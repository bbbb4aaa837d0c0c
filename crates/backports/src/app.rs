//! Application context for CLI command execution.
//!
//! [`App`] loads the configuration, opens the configured store and builds
//! tracker clients on demand.
//!
//! # Example
//!
//! ```no_run
//! use backports::app::App;
//! use std::path::Path;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let app = App::from_config_path(Path::new("config.yaml")).await?;
//!     println!("{} documents", app.storage().find_all().await?.len());
//!     Ok(())
//! }
//! ```

use crate::config::{BackportsConfig, config_dir};
use crate::error::{Error, Result};
use crate::storage::{DocumentStore, create_storage};
use crate::tracker::jira::JiraClient;
use crate::transport::{HttpTransport, RetryingTransport};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Application context for CLI operations.
pub struct App {
    config: BackportsConfig,
    storage: Box<dyn DocumentStore>,
    config_path: PathBuf,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("config_path", &self.config_path)
            .field("tracker", &self.config.tracker.url)
            .field("storage", &"<dyn DocumentStore>")
            .finish()
    }
}

impl App {
    /// Load the configuration at `config_path` and open its store.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or validated,
    /// or if the store cannot be opened.
    pub async fn from_config_path(config_path: &Path) -> Result<Self> {
        let config = BackportsConfig::load(config_path).await?;
        Self::with_config(config, config_path).await
    }

    /// Build an app from an already loaded configuration.
    ///
    /// Relative store paths resolve against the directory of `config_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened.
    pub async fn with_config(config: BackportsConfig, config_path: &Path) -> Result<Self> {
        let backend = config.store.to_backend(&config_dir(config_path))?;
        tracing::debug!(backend = ?backend, "Opening store");
        let storage = create_storage(backend).await?;
        Ok(Self {
            config,
            storage,
            config_path: config_path.to_path_buf(),
        })
    }

    /// The loaded configuration.
    pub fn config(&self) -> &BackportsConfig {
        &self.config
    }

    /// Get an immutable reference to the storage.
    pub fn storage(&self) -> &dyn DocumentStore {
        self.storage.as_ref()
    }

    /// Path of the configuration file.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Build a tracker client whose requests are bound to `cancel`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the tracker URL
    /// is unusable.
    pub fn tracker(&self, cancel: CancellationToken) -> Result<JiraClient> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("backports/", env!("CARGO_PKG_VERSION")))
            .read_timeout(self.config.transport.read_timeout())
            .build()
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {e}")))?;
        let transport = RetryingTransport::new(
            HttpTransport::new(client),
            self.config.transport.retry_policy(),
            cancel,
        );
        JiraClient::new(
            &self.config.tracker.url,
            self.config.tracker.token.as_str(),
            Arc::new(transport),
        )
        .map_err(|e| Error::Config(e.to_string()))
    }
}
