//! Error types for backports operations.
//!
//! Each layer has its own error enum so callers can tell a failed HTTP call
//! from a failed issue resolution from a failed store write. The crate-level
//! [`Error`] aggregates them for the application edge.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the retrying HTTP transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent or the connection failed.
    #[error("HTTP request failed: {0}")]
    Connection(#[from] reqwest::Error),

    /// The request body is a stream and cannot be replayed on retry.
    #[error("Request body cannot be replayed for a retry")]
    BodyNotReplayable,

    /// The operation was cancelled while a request or backoff wait was pending.
    #[error("Operation cancelled")]
    Cancelled,
}

impl TransportError {
    /// Returns `true` if this error came from cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Errors raised by the issue tracker client.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The underlying transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The tracker answered with a non-success status.
    #[error("Tracker returned {status} for {url}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// The requested URL.
        url: String,
        /// Response body (truncated).
        body: String,
    },

    /// The response body could not be decoded.
    #[error("Failed to decode tracker response: {0}")]
    Decode(String),

    /// A request URL could not be built from the configured base URL.
    #[error("Invalid tracker URL: {0}")]
    InvalidUrl(String),
}

impl TrackerError {
    /// Returns `true` if this error came from cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_cancelled())
    }
}

/// Errors raised while resolving an issue's clone chain.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Fetching the issue itself failed.
    #[error("Error getting issue {key}: {source}")]
    Fetch {
        /// The issue being fetched.
        key: String,
        /// The tracker failure.
        #[source]
        source: TrackerError,
    },

    /// Searching for the issue's clone failed.
    #[error("Error searching for clones of {key}: {source}")]
    CloneSearch {
        /// The issue whose clones were searched.
        key: String,
        /// The tracker failure.
        #[source]
        source: TrackerError,
    },

    /// Resolving a deeper level of the chain failed.
    #[error("Error resolving clone {key}: {source}")]
    Chain {
        /// The clone that failed to resolve.
        key: String,
        /// The failure at the deeper level.
        #[source]
        source: Box<ResolveError>,
    },
}

impl ResolveError {
    /// Returns `true` if this error, at any depth, came from cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Fetch { source, .. } | Self::CloneSearch { source, .. } => source.is_cancelled(),
            Self::Chain { source, .. } => source.is_cancelled(),
        }
    }
}

/// Errors raised by the document store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error while reading or writing the backing file.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A document could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The store call did not finish within the caller's timeout.
    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    /// The backing data could not be interpreted at all.
    #[error("Corrupt store data: {0}")]
    Corrupt(String),

    /// A store backend that is not available.
    #[error("Unknown store backend: {0}")]
    UnknownBackend(String),
}

/// Errors that abort a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A page of the tracking query could not be fetched.
    #[error("Error searching tracker issues at offset {start_at}: {source}")]
    Search {
        /// Offset of the failed page.
        start_at: usize,
        /// The tracker failure.
        #[source]
        source: TrackerError,
    },

    /// Removing stale documents failed.
    #[error("Error removing stale documents: {0}")]
    Reconcile(#[source] StorageError),

    /// The run was cancelled.
    #[error("Sync cancelled")]
    Cancelled,
}

/// The error type for backports application operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A sync run failed.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Document not found.
    #[error("Document not found: {0}")]
    DocumentNotFound(String),
}

/// A specialized Result type for backports operations.
pub type Result<T> = std::result::Result<T, Error>;
