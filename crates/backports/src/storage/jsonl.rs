//! JSONL-backed document store.
//!
//! The collection is kept in memory and persisted as one JSON document per
//! line. Several processes may share the file (a sync run and the MCP
//! server), so every mutation is a locked read-modify-write:
//!
//! 1. take an exclusive advisory lock on `<data file>.lock`
//! 2. re-read the data file
//! 3. apply the change to that fresh copy
//! 4. write it to a temporary file and rename it over the data file
//! 5. commit the fresh copy in memory and release the lock
//!
//! A write made by another process between two mutations is therefore never
//! overwritten by a stale in-memory copy. A crash or failed write leaves the
//! previous file and the previous in-memory state intact.
//!
//! Loading is resilient: lines that are not JSON objects with a string `id`
//! are skipped and reported as [`LoadWarning`]s instead of failing the load.

use super::{Collection, Document, DocumentStore, DocumentUpdate, Result, UpdateOutcome};
use crate::domain::{ID_FIELD, IssueId};
use async_trait::async_trait;
use fs2::FileExt;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Non-fatal problems found while loading a JSONL file.
///
/// The offending line is skipped; the rest of the file is still loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// Line could not be parsed as JSON
    MalformedJson {
        /// 1-based line number in the file
        line_number: usize,
        /// Parser error message
        error: String,
    },

    /// Line parsed but is not an object with a string `id`
    MissingId {
        /// 1-based line number in the file
        line_number: usize,
    },

    /// A later line reused an id; the later document wins
    DuplicateId {
        /// 1-based line number of the later document
        line_number: usize,
        /// The repeated id
        id: String,
    },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedJson { line_number, error } => {
                write!(f, "line {line_number}: malformed JSON: {error}")
            }
            Self::MissingId { line_number } => {
                write!(f, "line {line_number}: document has no string id")
            }
            Self::DuplicateId { line_number, id } => {
                write!(f, "line {line_number}: duplicate id {id}")
            }
        }
    }
}

/// Document store persisted to a JSONL file.
#[derive(Debug)]
pub struct JsonlStore {
    path: PathBuf,
    inner: Mutex<Collection>,
}

impl JsonlStore {
    /// Open the store at `path`.
    ///
    /// A missing file is treated as an empty collection; it is created on the
    /// first mutation.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub async fn open(path: impl Into<PathBuf>) -> Result<(Self, Vec<LoadWarning>)> {
        let path = path.into();
        let (collection, warnings) = load_collection(&path).await?;
        tracing::debug!(
            path = %path.display(),
            documents = collection.len(),
            "Opened JSONL store"
        );
        Ok((
            Self {
                path,
                inner: Mutex::new(collection),
            },
            warnings,
        ))
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `mutate` to the collection as currently stored on disk, persist
    /// it if it reports a change, and commit it in memory.
    async fn mutate<T>(
        &self,
        mutate: impl FnOnce(&mut Collection) -> (T, bool),
    ) -> Result<T> {
        let mut guard = self.inner.lock().await;
        let _lock = FileLock::acquire(&self.path).await?;

        let (mut next, warnings) = load_collection(&self.path).await?;
        for warning in &warnings {
            tracing::warn!(warning = %warning, "JSONL reload warning");
        }
        let (result, changed) = mutate(&mut next);
        if changed {
            save_collection(&self.path, &next).await?;
        }
        *guard = next;
        Ok(result)
    }
}

#[async_trait]
impl DocumentStore for JsonlStore {
    async fn upsert(&self, id: &IssueId, update: DocumentUpdate) -> Result<UpdateOutcome> {
        self.mutate(|c| {
            let outcome = c.upsert(id, &update);
            (outcome, outcome.upserted || outcome.modified > 0)
        })
        .await
    }

    async fn update(&self, id: &IssueId, update: DocumentUpdate) -> Result<UpdateOutcome> {
        self.mutate(|c| {
            let outcome = c.update(id, &update);
            (outcome, outcome.modified > 0)
        })
        .await
    }

    async fn delete_not_in(&self, keep: &HashSet<IssueId>) -> Result<u64> {
        self.mutate(|c| {
            let removed = c.delete_not_in(keep);
            (removed, removed > 0)
        })
        .await
    }

    async fn find_all(&self) -> Result<Vec<Document>> {
        Ok(self.inner.lock().await.documents().cloned().collect())
    }

    async fn reload(&self) -> Result<()> {
        let (collection, warnings) = load_collection(&self.path).await?;
        for warning in &warnings {
            tracing::warn!(warning = %warning, "JSONL reload warning");
        }
        *self.inner.lock().await = collection;
        Ok(())
    }
}

/// Read the collection from `path`, skipping unusable lines.
async fn load_collection(path: &Path) -> Result<(Collection, Vec<LoadWarning>)> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok((Collection::default(), Vec::new()));
        }
        Err(e) => return Err(e.into()),
    };

    let mut collection = Collection::default();
    let mut seen = HashSet::new();
    let mut warnings = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line_number = index + 1;
        if line.trim().is_empty() {
            continue;
        }

        let doc = match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(doc)) => doc,
            Ok(_) => {
                warnings.push(LoadWarning::MissingId { line_number });
                continue;
            }
            Err(e) => {
                warnings.push(LoadWarning::MalformedJson {
                    line_number,
                    error: e.to_string(),
                });
                continue;
            }
        };

        let Some(id) = doc.get(ID_FIELD).and_then(Value::as_str).map(IssueId::new) else {
            warnings.push(LoadWarning::MissingId { line_number });
            continue;
        };

        if !seen.insert(id.clone()) {
            warnings.push(LoadWarning::DuplicateId {
                line_number,
                id: id.0.clone(),
            });
        }
        collection.insert_document(id, doc);
    }

    Ok((collection, warnings))
}

/// Write the collection with the temp-file-then-rename pattern.
async fn save_collection(path: &Path, collection: &Collection) -> Result<()> {
    let mut buffer = Vec::new();
    for doc in collection.documents() {
        serde_json::to_writer(&mut buffer, doc)?;
        buffer.push(b'\n');
    }

    let tmp_path = temp_path_for(path);
    let mut file = fs::File::create(&tmp_path).await?;
    file.write_all(&buffer).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    fs::rename(&tmp_path, path).await?;
    Ok(())
}

/// Exclusive advisory lock on the file next to the data file.
///
/// Released when dropped.
struct FileLock(std::fs::File);

impl FileLock {
    async fn acquire(data_path: &Path) -> Result<Self> {
        let lock_path = sibling_path(data_path, ".lock");
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<std::fs::File> {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)?;
            file.lock_exclusive()?;
            Ok(file)
        })
        .await
        .map_err(std::io::Error::other)??;
        Ok(Self(file))
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.0) {
            tracing::debug!(error = %e, "Failed to release JSONL lock");
        }
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    sibling_path(path, ".tmp")
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}
