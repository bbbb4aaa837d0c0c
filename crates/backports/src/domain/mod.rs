//! Domain types for backport tracking.
//!
//! This module contains the snapshot persisted for every tracked issue and
//! the identifier type shared by the tracker, the resolver and the store.

use crate::storage::{Document, DocumentUpdate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the document field holding the issue key.
pub const ID_FIELD: &str = "id";

/// Name of the externally owned completion flag.
pub const COMPLETED_FIELD: &str = "completed";

/// Fields written by the sync path.
///
/// A re-sync sets the ones present in the new snapshot and removes the rest,
/// leaving every other field of the stored document untouched.
pub const SYNC_OWNED_FIELDS: [&str; 6] = [
    "status",
    "target_version",
    "assignee",
    "summary",
    "target_backport_versions",
    "clone",
];

/// Unique identifier for an issue (the tracker's project-scoped key)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueId(pub String);

impl IssueId {
    /// Create a new issue ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for IssueId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for IssueId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Nested snapshot of an issue and the issue that clones it.
///
/// `assignee`, `summary` and `target_backport_versions` are only populated
/// for the root of a chain. `clone` holds the next level down, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSnapshot {
    /// The issue key
    pub id: IssueId,

    /// Current workflow status name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// Display names of the target version field, descending, comma-joined
    #[serde(default)]
    pub target_version: String,

    /// Assignee display name (root only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,

    /// Issue summary (root only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Display names of the target backport versions field (root only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_backport_versions: Option<String>,

    /// Snapshot of the issue cloning this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone: Option<Box<IssueSnapshot>>,
}

impl IssueSnapshot {
    /// Create a snapshot with only the key and target version set.
    pub fn new(id: impl Into<IssueId>, target_version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: None,
            target_version: target_version.into(),
            assignee: None,
            summary: None,
            target_backport_versions: None,
            clone: None,
        }
    }

    /// Number of clone levels nested below this snapshot.
    pub fn chain_len(&self) -> usize {
        let mut len = 0;
        let mut current = self.clone.as_deref();
        while let Some(next) = current {
            len += 1;
            current = next.clone.as_deref();
        }
        len
    }

    /// Iterate over this snapshot followed by every clone in the chain.
    pub fn chain(&self) -> impl Iterator<Item = &IssueSnapshot> {
        std::iter::successors(Some(self), |s| s.clone.as_deref())
    }

    /// Build the store update for this snapshot.
    ///
    /// Present sync-owned fields are set and absent ones are unset; the id is
    /// the document key and is never part of the update body.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be serialized.
    pub fn to_update(&self) -> serde_json::Result<DocumentUpdate> {
        let mut set: Document = match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => map,
            _ => Document::new(),
        };
        set.remove(ID_FIELD);

        let unset = SYNC_OWNED_FIELDS
            .iter()
            .filter(|field| !set.contains_key(**field))
            .map(|field| (*field).to_string())
            .collect();

        Ok(DocumentUpdate { set, unset })
    }
}
