//! Error types for the backports MCP server.

use thiserror::Error;

/// Errors that can occur in the backports MCP server.
#[derive(Debug, Error)]
pub enum Error {
    /// Loading the configuration or opening the store failed.
    #[error("Setup error: {0}")]
    Setup(#[from] backports::error::Error),

    /// An error from the document store.
    #[error("Storage error: {0}")]
    Storage(#[from] backports::error::StorageError),

    /// Invalid argument value provided.
    #[error("Invalid {field}: '{value}'")]
    InvalidArgument {
        /// The field name that had an invalid value.
        field: &'static str,
        /// The invalid value that was provided.
        value: String,
    },

    /// MCP protocol error.
    #[error("MCP error: {0}")]
    Mcp(String),
}

/// Result type for backports MCP operations.
pub type Result<T> = std::result::Result<T, Error>;
