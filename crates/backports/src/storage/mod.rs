//! Document store abstraction for backports.
//!
//! Snapshots are persisted as JSON documents in a single collection keyed by
//! the `id` field. Two backends are provided:
//!
//! - **In-memory**: ordered map behind a mutex, lost when the process exits
//! - **JSONL**: the same collection persisted as one document per line
//!
//! # Merge Semantics
//!
//! Writes never replace a whole document. A [`DocumentUpdate`] carries a set
//! of fields to overwrite and a list of fields to remove; every other field
//! of the stored document is preserved. This is what keeps the externally
//! owned `completed` flag alive across re-syncs.
//!
//! # Example
//!
//! ```no_run
//! use backports::domain::IssueId;
//! use backports::storage::{create_storage, DocumentUpdate, StorageBackend};
//! use serde_json::json;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let store = create_storage(StorageBackend::InMemory).await?;
//!
//!     let update = DocumentUpdate::new().set("status", json!("Verified"));
//!     store.upsert(&IssueId::new("OCPBUGS-1"), update).await?;
//!
//!     println!("{} documents", store.find_all().await?.len());
//!     Ok(())
//! }
//! ```

use crate::domain::{ID_FIELD, IssueId};
use crate::error::StorageError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

pub mod in_memory;
pub mod jsonl;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A stored JSON document.
pub type Document = serde_json::Map<String, Value>;

/// A field-level change to a document.
///
/// Keys in `set` overwrite the stored value, keys in `unset` are removed.
/// Fields named in neither are left as they are.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentUpdate {
    /// Fields to overwrite
    pub set: Document,
    /// Fields to remove
    pub unset: Vec<String>,
}

impl DocumentUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite `field` with `value`.
    #[must_use]
    pub fn set(mut self, field: impl Into<String>, value: Value) -> Self {
        self.set.insert(field.into(), value);
        self
    }

    /// Remove `field`.
    #[must_use]
    pub fn unset(mut self, field: impl Into<String>) -> Self {
        self.unset.push(field.into());
        self
    }

    /// Apply this update to `doc`, returning `true` if anything changed.
    ///
    /// The `id` field is never touched.
    pub fn apply(&self, doc: &mut Document) -> bool {
        let mut changed = false;
        for (field, value) in &self.set {
            if field == ID_FIELD {
                continue;
            }
            if doc.get(field) != Some(value) {
                doc.insert(field.clone(), value.clone());
                changed = true;
            }
        }
        for field in &self.unset {
            if field != ID_FIELD && doc.remove(field).is_some() {
                changed = true;
            }
        }
        changed
    }
}

/// What an update or upsert did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Number of documents matched by id (0 or 1)
    pub matched: u64,
    /// Number of documents whose content changed (0 or 1)
    pub modified: u64,
    /// Whether a new document was inserted
    pub upserted: bool,
}

/// Core document store trait.
///
/// Implementations must be `Send + Sync` and use interior mutability, so one
/// store can be shared between a sync run and concurrent readers. Each call
/// is atomic with respect to the collection; no cross-call locking is
/// offered.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert the document if absent, else merge `update` into it.
    async fn upsert(&self, id: &IssueId, update: DocumentUpdate) -> Result<UpdateOutcome>;

    /// Merge `update` into an existing document.
    ///
    /// Never inserts; `matched` is 0 when the document does not exist.
    async fn update(&self, id: &IssueId, update: DocumentUpdate) -> Result<UpdateOutcome>;

    /// Delete every document whose id is not in `keep`.
    ///
    /// Returns the number of documents removed.
    async fn delete_not_in(&self, keep: &HashSet<IssueId>) -> Result<u64>;

    /// Return all documents ordered by id.
    async fn find_all(&self) -> Result<Vec<Document>>;

    /// Re-read persistent state, discarding the in-memory view.
    ///
    /// A no-op for backends without persistent state.
    async fn reload(&self) -> Result<()>;
}

/// Store backend configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// In-memory storage (ephemeral)
    InMemory,

    /// JSONL file storage (persistent)
    Jsonl(PathBuf),
}

/// Create a store for the given backend.
///
/// # Errors
///
/// Returns an error if the JSONL file exists but cannot be read.
pub async fn create_storage(backend: StorageBackend) -> Result<Box<dyn DocumentStore>> {
    match backend {
        StorageBackend::InMemory => Ok(Box::new(in_memory::InMemoryStore::new())),
        StorageBackend::Jsonl(path) => {
            let (store, warnings) = jsonl::JsonlStore::open(path).await?;
            for warning in &warnings {
                tracing::warn!(warning = %warning, "JSONL load warning");
            }
            Ok(Box::new(store))
        }
    }
}

/// Bound a store call by `timeout`.
///
/// # Errors
///
/// Returns [`StorageError::Timeout`] if the call does not finish in time,
/// otherwise the call's own result.
pub async fn with_timeout<T, F>(timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(timeout, call)
        .await
        .map_err(|_| StorageError::Timeout(timeout))?
}

/// The collection shared by both backends.
///
/// Plain synchronous data; the backends wrap it for locking and persistence.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Collection {
    docs: BTreeMap<IssueId, Document>,
}

impl Collection {
    pub(crate) fn insert_document(&mut self, id: IssueId, mut doc: Document) {
        doc.insert(ID_FIELD.to_string(), Value::String(id.0.clone()));
        self.docs.insert(id, doc);
    }

    pub(crate) fn upsert(&mut self, id: &IssueId, update: &DocumentUpdate) -> UpdateOutcome {
        match self.docs.get_mut(id) {
            Some(doc) => UpdateOutcome {
                matched: 1,
                modified: u64::from(update.apply(doc)),
                upserted: false,
            },
            None => {
                let mut doc = Document::new();
                update.apply(&mut doc);
                self.insert_document(id.clone(), doc);
                UpdateOutcome {
                    matched: 0,
                    modified: 0,
                    upserted: true,
                }
            }
        }
    }

    pub(crate) fn update(&mut self, id: &IssueId, update: &DocumentUpdate) -> UpdateOutcome {
        match self.docs.get_mut(id) {
            Some(doc) => UpdateOutcome {
                matched: 1,
                modified: u64::from(update.apply(doc)),
                upserted: false,
            },
            None => UpdateOutcome::default(),
        }
    }

    pub(crate) fn delete_not_in(&mut self, keep: &HashSet<IssueId>) -> u64 {
        let before = self.docs.len();
        self.docs.retain(|id, _| keep.contains(id));
        (before - self.docs.len()) as u64
    }

    pub(crate) fn documents(&self) -> impl Iterator<Item = &Document> {
        self.docs.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.docs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_apply_sets_and_unsets() {
        let mut stored = doc(json!({"id": "A", "status": "New", "clone": {"id": "B"}}));
        let update = DocumentUpdate::new()
            .set("status", json!("Verified"))
            .unset("clone");

        assert!(update.apply(&mut stored));
        assert_eq!(stored, doc(json!({"id": "A", "status": "Verified"})));
    }

    #[test]
    fn test_apply_reports_no_change() {
        let mut stored = doc(json!({"id": "A", "status": "New"}));
        let update = DocumentUpdate::new()
            .set("status", json!("New"))
            .unset("clone");

        assert!(!update.apply(&mut stored));
    }

    #[test]
    fn test_apply_never_touches_id() {
        let mut stored = doc(json!({"id": "A"}));
        let update = DocumentUpdate::new().set("id", json!("B")).unset("id");

        assert!(!update.apply(&mut stored));
        assert_eq!(stored["id"], json!("A"));
    }

    #[test]
    fn test_collection_upsert_inserts_then_merges() {
        let mut collection = Collection::default();
        let id = IssueId::new("A");

        let first = collection.upsert(&id, &DocumentUpdate::new().set("status", json!("New")));
        assert!(first.upserted);

        collection.update(&id, &DocumentUpdate::new().set("completed", json!(true)));
        let second = collection.upsert(&id, &DocumentUpdate::new().set("status", json!("Done")));
        assert_eq!(second.matched, 1);
        assert_eq!(second.modified, 1);

        let docs: Vec<_> = collection.documents().cloned().collect();
        assert_eq!(
            docs,
            vec![doc(json!({"id": "A", "status": "Done", "completed": true}))]
        );
    }

    #[test]
    fn test_collection_update_missing_document() {
        let mut collection = Collection::default();
        let outcome = collection.update(
            &IssueId::new("missing"),
            &DocumentUpdate::new().set("completed", json!(true)),
        );
        assert_eq!(outcome, UpdateOutcome::default());
        assert_eq!(collection.len(), 0);
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result: Result<()> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(StorageError::Timeout(_))));
    }
}
