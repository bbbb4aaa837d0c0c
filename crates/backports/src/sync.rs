//! Sync orchestration.
//!
//! A run pages through the tracking query, resolves every matched issue into
//! a snapshot, and merges each snapshot into the store. Keys that were
//! resolved and stored during the run are collected, and a single trailing
//! delete removes every stored document outside that set.
//!
//! # Failure Semantics
//!
//! - A failed page of the tracking query aborts the run.
//! - A failed resolve or upsert of one issue is logged and skipped. The
//!   issue's key is not recorded, so an existing document for it is removed
//!   during reconciliation.
//! - Cancellation, wherever it is observed, aborts the run.
//! - A failed reconciliation delete aborts the run.

use crate::domain::IssueId;
use crate::error::SyncError;
use crate::resolver::{CloneChainResolver, CustomFieldIds};
use crate::storage::{DocumentStore, with_timeout};
use crate::tracker::{IssueTracker, SearchQuery};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

/// Default number of issues per page of the tracking query.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Default bound on each store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default tracking query.
pub const DEFAULT_JQL: &str = r#"project = OCPBUGS AND component = Hypershift AND "Target Version" = 4.19.0 AND "Target Backport Versions" is not EMPTY"#;

/// Parameters of a sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Query selecting the issues to track
    pub jql: String,
    /// Page size for the tracking query
    pub page_size: usize,
    /// Bound on each store call
    pub store_timeout: Duration,
    /// Custom field ids used by the resolver
    pub fields: CustomFieldIds,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            jql: DEFAULT_JQL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            fields: CustomFieldIds::default(),
        }
    }
}

/// Counts from a completed sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Pages of the tracking query fetched
    pub pages: usize,
    /// Issues resolved and stored
    pub upserted: usize,
    /// Of those, issues stored for the first time
    pub inserted: usize,
    /// Issues skipped after a resolve or store failure
    pub failed: usize,
    /// Stale documents removed
    pub removed: u64,
}

/// Runs one sync between a tracker and a store.
pub struct Syncer<'a> {
    tracker: &'a dyn IssueTracker,
    store: &'a dyn DocumentStore,
    options: SyncOptions,
}

impl<'a> Syncer<'a> {
    /// Create a syncer.
    pub fn new(
        tracker: &'a dyn IssueTracker,
        store: &'a dyn DocumentStore,
        options: SyncOptions,
    ) -> Self {
        Self {
            tracker,
            store,
            options,
        }
    }

    /// Run the sync to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if a page of the tracking query fails, if the run is
    /// cancelled, or if stale documents cannot be removed. Failures of
    /// individual issues are counted in [`SyncReport::failed`] instead.
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let resolver = CloneChainResolver::new(self.tracker, &self.options.fields);
        let page_size = self.options.page_size.max(1);
        let mut query = SearchQuery::new(self.options.jql.as_str(), &["status"], page_size);
        let mut touched = HashSet::new();
        let mut report = SyncReport::default();

        loop {
            let page = self.tracker.search(&query).await.map_err(|source| {
                if source.is_cancelled() {
                    SyncError::Cancelled
                } else {
                    SyncError::Search {
                        start_at: query.start_at,
                        source,
                    }
                }
            })?;
            report.pages += 1;
            tracing::debug!(start_at = query.start_at, issues = page.len(), "Fetched page");

            for issue in &page {
                let id = IssueId::new(issue.key.as_str());
                match self.sync_issue(&resolver, &id).await? {
                    Some(inserted) => {
                        report.upserted += 1;
                        report.inserted += usize::from(inserted);
                        touched.insert(id);
                    }
                    None => report.failed += 1,
                }
            }

            if page.len() < page_size {
                break;
            }
            query.start_at += page.len();
        }

        report.removed = with_timeout(
            self.options.store_timeout,
            self.store.delete_not_in(&touched),
        )
        .await
        .map_err(SyncError::Reconcile)?;

        tracing::info!(
            upserted = report.upserted,
            inserted = report.inserted,
            failed = report.failed,
            removed = report.removed,
            "Sync complete"
        );
        Ok(report)
    }

    /// Resolve and store one issue.
    ///
    /// Returns `Some(inserted)` when the issue was stored, `None` when it was
    /// skipped.
    async fn sync_issue(
        &self,
        resolver: &CloneChainResolver<'_>,
        id: &IssueId,
    ) -> Result<Option<bool>, SyncError> {
        let snapshot = match resolver.resolve(id.as_str(), 0).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return Ok(None),
            Err(e) if e.is_cancelled() => return Err(SyncError::Cancelled),
            Err(e) => {
                tracing::warn!(issue = %id, error = %e, "Error resolving issue, skipping");
                return Ok(None);
            }
        };

        let update = match snapshot.to_update() {
            Ok(update) => update,
            Err(e) => {
                tracing::error!(issue = %id, error = %e, "Error encoding snapshot, skipping");
                return Ok(None);
            }
        };

        match with_timeout(self.options.store_timeout, self.store.upsert(id, update)).await {
            Ok(outcome) => {
                tracing::info!(issue = %id, clones = snapshot.chain_len(), "Upserted issue");
                Ok(Some(outcome.upserted))
            }
            Err(e) => {
                tracing::error!(issue = %id, error = %e, "Error upserting issue, skipping");
                Ok(None)
            }
        }
    }
}
