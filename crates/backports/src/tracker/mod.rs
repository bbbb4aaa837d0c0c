//! Issue tracker interface.
//!
//! The sync core needs exactly two calls from the tracker: fetch one issue
//! with a chosen set of fields, and run a query returning one page of
//! matching issues. [`IssueTracker`] captures those; [`jira::JiraClient`] is
//! the HTTP implementation.
//!
//! # Test Utilities
//!
//! [`FakeTracker`] is a scripted in-process tracker that records every call.
//! It is available in this crate's tests and, for downstream crates, behind
//! the `test-util` feature.

use crate::error::TrackerError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

pub mod jira;

/// An issue as returned by the tracker.
///
/// Fields are kept as raw JSON because the requested field set varies by
/// call and custom fields have no fixed shape.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Issue {
    /// The issue key (e.g. `OCPBUGS-1234`)
    pub key: String,

    /// The requested fields
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Issue {
    /// Create an issue from a key and a JSON object of fields.
    ///
    /// Non-object `fields` values are treated as empty.
    pub fn new(key: impl Into<String>, fields: Value) -> Self {
        Self {
            key: key.into(),
            fields: match fields {
                Value::Object(map) => map,
                _ => Map::new(),
            },
        }
    }

    /// Raw value of a field, if present and not null.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    /// Workflow status name (`fields.status.name`).
    pub fn status_name(&self) -> Option<&str> {
        self.field("status")?.get("name")?.as_str()
    }

    /// Issue summary (`fields.summary`).
    pub fn summary(&self) -> Option<&str> {
        self.field("summary")?.as_str()
    }

    /// Assignee display name (`fields.assignee.displayName`).
    pub fn assignee_name(&self) -> Option<&str> {
        self.field("assignee")?.get("displayName")?.as_str()
    }
}

/// One page of a tracker query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Query in the tracker's query language
    pub jql: String,
    /// Fields to return for each issue
    pub fields: Vec<String>,
    /// Offset of the first result
    pub start_at: usize,
    /// Page size
    pub max_results: usize,
}

impl SearchQuery {
    /// Create a query for the first page.
    pub fn new(jql: impl Into<String>, fields: &[&str], max_results: usize) -> Self {
        Self {
            jql: jql.into(),
            fields: fields.iter().map(|f| (*f).to_string()).collect(),
            start_at: 0,
            max_results,
        }
    }

    /// Query for issues that clone `key`, newest first.
    pub fn clones_of(key: &str) -> Self {
        Self::new(
            format!(r#"issue in linkedIssues("{key}", "is cloned by") ORDER BY created DESC"#),
            &["status"],
            1,
        )
    }
}

/// The tracker operations the sync core relies on.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Fetch one issue with the given fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the issue does not exist.
    async fn get_issue(&self, key: &str, fields: &[&str]) -> Result<Issue, TrackerError>;

    /// Run a query and return one page of results, in tracker order.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the query is rejected.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Issue>, TrackerError>;
}

// ========== Test Utilities ==========

#[cfg(any(test, feature = "test-util"))]
pub use fake::{FakeTracker, TrackerCall};

#[cfg(any(test, feature = "test-util"))]
mod fake {
    use super::{Issue, IssueTracker, SearchQuery};
    use crate::error::{TrackerError, TransportError};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    /// A call received by [`FakeTracker`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum TrackerCall {
        /// `get_issue(key, fields)`
        Get { key: String, fields: Vec<String> },
        /// `search(query)`
        Search(SearchQuery),
    }

    /// Scripted tracker for tests.
    ///
    /// - Issues registered with [`FakeTracker::with_issue`] are returned by
    ///   `get_issue`, filtered to the requested fields.
    /// - Clone links registered with [`FakeTracker::with_clone`] answer the
    ///   `linkedIssues(..., "is cloned by")` query.
    /// - Every other query pages through the tracked keys.
    /// - Keys marked with [`FakeTracker::failing_get`] return an error, as does
    ///   any page whose offset was marked with [`FakeTracker::failing_page`].
    /// - Keys marked with [`FakeTracker::cancelled_get`] return a cancellation.
    #[derive(Debug, Default)]
    pub struct FakeTracker {
        issues: HashMap<String, Value>,
        clones: HashMap<String, String>,
        tracked: Vec<String>,
        failing_gets: HashSet<String>,
        cancelled_gets: HashSet<String>,
        failing_pages: HashSet<usize>,
        calls: Mutex<Vec<TrackerCall>>,
    }

    impl FakeTracker {
        /// Create an empty tracker.
        pub fn new() -> Self {
            Self::default()
        }

        /// Register an issue with the given fields object.
        #[must_use]
        pub fn with_issue(mut self, key: &str, fields: Value) -> Self {
            self.issues.insert(key.to_string(), fields);
            self
        }

        /// Register a bare issue with a status and target version.
        #[must_use]
        pub fn with_simple_issue(self, key: &str, status: &str, version: &str) -> Self {
            self.with_issue(
                key,
                json!({
                    "status": {"name": status},
                    "summary": format!("Summary of {key}"),
                    "customfield_12319940": [{"name": version}],
                }),
            )
        }

        /// Declare that `clone` is the newest issue cloning `key`.
        #[must_use]
        pub fn with_clone(mut self, key: &str, clone: &str) -> Self {
            self.clones.insert(key.to_string(), clone.to_string());
            self
        }

        /// Add `key` to the results of the tracking query.
        #[must_use]
        pub fn tracking(mut self, key: &str) -> Self {
            self.tracked.push(key.to_string());
            self
        }

        /// Make `get_issue(key)` fail.
        #[must_use]
        pub fn failing_get(mut self, key: &str) -> Self {
            self.failing_gets.insert(key.to_string());
            self
        }

        /// Make `get_issue(key)` fail as if the run had been cancelled.
        #[must_use]
        pub fn cancelled_get(mut self, key: &str) -> Self {
            self.cancelled_gets.insert(key.to_string());
            self
        }

        /// Make the tracking-query page at `start_at` fail.
        #[must_use]
        pub fn failing_page(mut self, start_at: usize) -> Self {
            self.failing_pages.insert(start_at);
            self
        }

        /// All calls received so far.
        pub fn calls(&self) -> Vec<TrackerCall> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }

        /// Number of calls received so far.
        pub fn call_count(&self) -> usize {
            self.calls.lock().map(|c| c.len()).unwrap_or_default()
        }

        fn record(&self, call: TrackerCall) {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(call);
            }
        }

        fn error(url: String) -> TrackerError {
            TrackerError::Status {
                status: 500,
                url,
                body: "scripted failure".to_string(),
            }
        }

        fn clone_source(jql: &str) -> Option<&str> {
            let rest = jql.strip_prefix("issue in linkedIssues(\"")?;
            let (key, _) = rest.split_once('"')?;
            jql.contains("is cloned by").then_some(key)
        }
    }

    #[async_trait]
    impl IssueTracker for FakeTracker {
        async fn get_issue(&self, key: &str, fields: &[&str]) -> Result<Issue, TrackerError> {
            self.record(TrackerCall::Get {
                key: key.to_string(),
                fields: fields.iter().map(|f| (*f).to_string()).collect(),
            });

            if self.cancelled_gets.contains(key) {
                return Err(TrackerError::Transport(TransportError::Cancelled));
            }
            if self.failing_gets.contains(key) {
                return Err(Self::error(format!("issue/{key}")));
            }
            let stored = self.issues.get(key).ok_or_else(|| TrackerError::Status {
                status: 404,
                url: format!("issue/{key}"),
                body: "Issue Does Not Exist".to_string(),
            })?;

            let selected: serde_json::Map<String, Value> = stored
                .as_object()
                .into_iter()
                .flatten()
                .filter(|(name, _)| fields.contains(&name.as_str()))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            Ok(Issue {
                key: key.to_string(),
                fields: selected,
            })
        }

        async fn search(&self, query: &SearchQuery) -> Result<Vec<Issue>, TrackerError> {
            self.record(TrackerCall::Search(query.clone()));

            if let Some(source) = Self::clone_source(&query.jql) {
                return Ok(self
                    .clones
                    .get(source)
                    .map(|clone| vec![Issue::new(clone.clone(), json!({}))])
                    .unwrap_or_default());
            }

            if self.failing_pages.contains(&query.start_at) {
                return Err(Self::error(format!("search?startAt={}", query.start_at)));
            }
            Ok(self
                .tracked
                .iter()
                .skip(query.start_at)
                .take(query.max_results)
                .map(|key| Issue::new(key.clone(), json!({})))
                .collect())
        }
    }
}
