//! In-memory document store.
//!
//! All documents are held in RAM and **lost when the process exits**. Used in
//! tests and for dry runs where nothing should be persisted.

use super::{Collection, Document, DocumentStore, DocumentUpdate, Result, UpdateOutcome};
use crate::domain::IssueId;
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::Mutex;

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Collection>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `docs`.
    ///
    /// Documents without a string `id` field are ignored.
    pub fn with_documents(docs: impl IntoIterator<Item = Document>) -> Self {
        let mut collection = Collection::default();
        for doc in docs {
            if let Some(id) = doc.get(crate::domain::ID_FIELD).and_then(|v| v.as_str()) {
                collection.insert_document(IssueId::new(id), doc.clone());
            }
        }
        Self {
            inner: Mutex::new(collection),
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn upsert(&self, id: &IssueId, update: DocumentUpdate) -> Result<UpdateOutcome> {
        Ok(self.inner.lock().await.upsert(id, &update))
    }

    async fn update(&self, id: &IssueId, update: DocumentUpdate) -> Result<UpdateOutcome> {
        Ok(self.inner.lock().await.update(id, &update))
    }

    async fn delete_not_in(&self, keep: &HashSet<IssueId>) -> Result<u64> {
        Ok(self.inner.lock().await.delete_not_in(keep))
    }

    async fn find_all(&self) -> Result<Vec<Document>> {
        Ok(self.inner.lock().await.documents().cloned().collect())
    }

    async fn reload(&self) -> Result<()> {
        // Nothing to reload from
        Ok(())
    }
}
