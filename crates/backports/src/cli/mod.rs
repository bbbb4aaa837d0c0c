//! CLI argument parsing and command dispatch.
//!
//! # Commands
//!
//! - `sync`: Sync tracked issues and their clone chains into the store
//! - `list`: Show stored snapshots
//! - `complete`: Set or clear the completed flag of a stored snapshot
//!
//! # Global Flags
//!
//! - `--config <PATH>`: Configuration file (default `config.yaml`)
//! - `--json`: Output in JSON format (applies to all commands)
//!
//! # Example
//!
//! ```bash
//! backports sync --deadline 600
//! backports --json list
//! backports complete OCPBUGS-1234
//! ```

mod args;
mod execute;
mod validators;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use args::{CompleteArgs, ListArgs, SyncArgs};
pub use validators::{validate_deadline, validate_issue_key};

use crate::config::DEFAULT_CONFIG_FILE;

/// Backports - track backport clone chains of tracker issues
///
/// Mirrors the issues matched by a tracker query, together with the chain of
/// issues cloned from each, into a local document store.
#[derive(Parser, Debug)]
#[command(name = "backports")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file
    #[arg(long, global = true, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Output in JSON format for programmatic use
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Sync tracked issues into the store
    ///
    /// Resolves every issue matched by the configured query, stores its
    /// snapshot, and removes stored snapshots the query no longer matches.
    /// Ctrl-C cancels the run.
    Sync(SyncArgs),

    /// List stored snapshots
    List(ListArgs),

    /// Mark a stored snapshot as completed
    ///
    /// Only the completed flag is changed; synced fields are left alone.
    Complete(CompleteArgs),
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse CLI arguments from an iterator (for testing)
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        use crate::app::App;
        use crate::output::OutputMode;

        let output_mode = if self.json {
            OutputMode::Json
        } else {
            OutputMode::Text
        };

        match &self.command {
            Some(Commands::Sync(args)) => {
                let app = App::from_config_path(&self.config).await?;
                execute::execute_sync(&app, args, output_mode).await
            }
            Some(Commands::List(args)) => {
                let app = App::from_config_path(&self.config).await?;
                execute::execute_list(&app, args, output_mode).await
            }
            Some(Commands::Complete(args)) => {
                let app = App::from_config_path(&self.config).await?;
                execute::execute_complete(&app, args, output_mode).await
            }
            None => {
                println!("Backports clone-chain sync");
                println!("Use --help for more information");
                Ok(())
            }
        }
    }
}
