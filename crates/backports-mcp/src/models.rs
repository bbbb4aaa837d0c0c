//! MCP request and response models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `mark_completed` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MarkCompletedParams {
    /// Issue key of the stored snapshot (e.g. "OCPBUGS-1234").
    pub id: String,

    /// New value of the completed flag. Defaults to true.
    #[serde(default = "default_completed")]
    pub completed: bool,
}

fn default_completed() -> bool {
    true
}

/// Response from the `mark_completed` tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MarkCompletedResponse {
    /// Whether a stored snapshot with the given id exists.
    pub success: bool,

    /// Number of snapshots whose flag actually changed (0 or 1).
    pub modified: u64,

    /// The flag value that was requested.
    pub completed: bool,
}
