//! MCP tool implementations.
//!
//! A sync run may rewrite the store from another process at any time, so
//! every tool re-reads persistent state before acting. Only the completed
//! flag is ever written here.

use crate::error::{Error, Result};
use crate::models::MarkCompletedResponse;
use backports::domain::{COMPLETED_FIELD, IssueId};
use backports::storage::{Document, DocumentStore, DocumentUpdate, with_timeout};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Tool implementations for the backports MCP server.
pub struct Tools {
    store: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl Tools {
    /// Create tools over `store`, bounding each store call by `timeout`.
    pub fn new(store: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Return every stored snapshot, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be reloaded or read.
    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        with_timeout(self.timeout, self.store.reload()).await?;
        Ok(with_timeout(self.timeout, self.store.find_all()).await?)
    }

    /// Set the completed flag of one stored snapshot.
    ///
    /// A missing snapshot is reported with `success: false` rather than an
    /// error; nothing is inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is blank or the store call fails.
    pub async fn mark_completed(&self, id: &str, completed: bool) -> Result<MarkCompletedResponse> {
        let id = id.trim();
        if id.is_empty() {
            return Err(Error::InvalidArgument {
                field: "id",
                value: id.to_string(),
            });
        }

        with_timeout(self.timeout, self.store.reload()).await?;
        let update = DocumentUpdate::new().set(COMPLETED_FIELD, Value::Bool(completed));
        let outcome = with_timeout(self.timeout, self.store.update(&IssueId::new(id), update)).await?;

        if outcome.matched == 0 {
            tracing::warn!(id, "mark_completed on unknown document");
        } else {
            tracing::info!(id, completed, modified = outcome.modified, "Updated completion flag");
        }

        Ok(MarkCompletedResponse {
            success: outcome.matched > 0,
            modified: outcome.modified,
            completed,
        })
    }
}
