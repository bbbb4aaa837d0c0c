//! Clone-chain resolution.
//!
//! Starting from one issue, the resolver fetches its fields, looks up the
//! newest issue that clones it, and recurses into that clone. The result is
//! a nested [`IssueSnapshot`] whose depth is bounded by [`MAX_CLONE_DEPTH`].
//!
//! Links are followed by depth alone. A cyclic chain (`A` cloned by `B`
//! cloned by `A`) is walked until the bound is hit and then truncated, the
//! same as any other long chain.

use crate::custom_field::extract_names;
use crate::domain::IssueSnapshot;
use crate::error::ResolveError;
use crate::tracker::{IssueTracker, SearchQuery};
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};

/// Deepest level of the chain that is still fetched.
///
/// The root is level 0, so a snapshot nests at most this many clones.
pub const MAX_CLONE_DEPTH: usize = 6;

/// Tracker ids of the version custom fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomFieldIds {
    /// Field holding the target version
    pub target_version: String,
    /// Field holding the target backport versions
    pub target_backport_versions: String,
}

impl Default for CustomFieldIds {
    fn default() -> Self {
        Self {
            target_version: "customfield_12319940".to_string(),
            target_backport_versions: "customfield_12323940".to_string(),
        }
    }
}

/// Builds nested snapshots by following "is cloned by" links.
pub struct CloneChainResolver<'a> {
    tracker: &'a dyn IssueTracker,
    fields: &'a CustomFieldIds,
}

impl<'a> CloneChainResolver<'a> {
    /// Create a resolver over `tracker`.
    pub fn new(tracker: &'a dyn IssueTracker, fields: &'a CustomFieldIds) -> Self {
        Self { tracker, fields }
    }

    /// Fields requested for an issue at `depth`.
    ///
    /// Summary, assignee and backport versions are only surfaced for the
    /// root, so deeper levels skip them.
    pub fn fields_for_depth(&self, depth: usize) -> Vec<&str> {
        if depth == 0 {
            vec![
                "summary",
                "status",
                "assignee",
                self.fields.target_version.as_str(),
                self.fields.target_backport_versions.as_str(),
            ]
        } else {
            vec!["status", self.fields.target_version.as_str()]
        }
    }

    /// Resolve `key` and its clone chain, starting at `depth`.
    ///
    /// Returns `Ok(None)` without touching the tracker when `depth` exceeds
    /// [`MAX_CLONE_DEPTH`].
    ///
    /// # Errors
    ///
    /// Any failed fetch or clone search, at this level or deeper, fails the
    /// whole call.
    pub fn resolve<'k>(
        &'k self,
        key: &'k str,
        depth: usize,
    ) -> BoxFuture<'k, Result<Option<IssueSnapshot>, ResolveError>> {
        async move {
            if depth > MAX_CLONE_DEPTH {
                tracing::info!(key, depth, "Max clone depth reached, truncating chain");
                return Ok(None);
            }

            let fields = self.fields_for_depth(depth);
            tracing::debug!(key, depth, "Resolving issue");
            let issue = self
                .tracker
                .get_issue(key, &fields)
                .await
                .map_err(|source| ResolveError::Fetch {
                    key: key.to_string(),
                    source,
                })?;

            let mut snapshot = IssueSnapshot::new(
                issue.key.as_str(),
                extract_names(issue.field(&self.fields.target_version)),
            );
            snapshot.status = issue.status_name().map(str::to_string);
            if depth == 0 {
                snapshot.assignee = issue.assignee_name().map(str::to_string);
                snapshot.summary = Some(issue.summary().unwrap_or_default().to_string());
                snapshot.target_backport_versions = Some(extract_names(
                    issue.field(&self.fields.target_backport_versions),
                ));
            }

            let clones = self
                .tracker
                .search(&SearchQuery::clones_of(&issue.key))
                .await
                .map_err(|source| ResolveError::CloneSearch {
                    key: issue.key.clone(),
                    source,
                })?;

            if let Some(clone) = clones.first() {
                snapshot.clone = self
                    .resolve(&clone.key, depth + 1)
                    .await
                    .map_err(|source| ResolveError::Chain {
                        key: clone.key.clone(),
                        source: Box::new(source),
                    })?
                    .map(Box::new);
            }

            Ok(Some(snapshot))
        }
        .boxed()
    }
}
