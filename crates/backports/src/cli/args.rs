//! CLI argument structs for all commands.

use clap::Parser;

use super::validators::{validate_deadline, validate_issue_key};

/// Arguments for the `sync` command
#[derive(Parser, Debug, Clone, Default)]
pub struct SyncArgs {
    /// Cancel the run after this many seconds
    ///
    /// In-flight requests and rate-limit waits are aborted when the deadline
    /// passes, and the run exits with an error without removing anything.
    #[arg(long, value_name = "SECS", value_parser = validate_deadline)]
    pub deadline: Option<u64>,
}

/// Arguments for the `list` command
#[derive(Parser, Debug, Clone, Default)]
pub struct ListArgs {
    /// Only show documents not yet marked completed
    #[arg(long)]
    pub pending: bool,
}

/// Arguments for the `complete` command
#[derive(Parser, Debug, Clone)]
pub struct CompleteArgs {
    /// Issue key of the stored document (e.g. OCPBUGS-1234)
    #[arg(value_parser = validate_issue_key)]
    pub id: String,

    /// Clear the completed flag instead of setting it
    #[arg(long)]
    pub undo: bool,
}
