//! Command execution logic.

use anyhow::Result;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::args::{CompleteArgs, ListArgs, SyncArgs};
use crate::app::App;
use crate::domain::{COMPLETED_FIELD, IssueId};
use crate::error::Error;
use crate::output::{self, OutputMode};
use crate::storage::{DocumentUpdate, with_timeout};
use crate::sync::Syncer;

/// Execute the sync command
pub async fn execute_sync(app: &App, args: &SyncArgs, output_mode: OutputMode) -> Result<()> {
    let cancel = CancellationToken::new();
    let tracker = app.tracker(cancel.clone())?;
    let watcher = spawn_cancel_watcher(cancel.clone(), args.deadline.map(Duration::from_secs));

    tracing::info!(tracker = %app.config().tracker.url, "Starting sync");
    let result = Syncer::new(&tracker, app.storage(), app.config().sync_options())
        .run()
        .await;
    watcher.abort();

    match result {
        Ok(report) => {
            output::print_sync_report(&report, output_mode)?;
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Sync failed");
            Err(Error::from(e).into())
        }
    }
}

/// Cancel `cancel` on Ctrl-C or once `deadline` has passed.
fn spawn_cancel_watcher(cancel: CancellationToken, deadline: Option<Duration>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let deadline = async {
            match deadline {
                Some(deadline) => tokio::time::sleep(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => tracing::warn!("Interrupted, cancelling sync"),
                Err(e) => {
                    tracing::warn!(error = %e, "Cannot listen for Ctrl-C");
                    return;
                }
            },
            () = deadline => tracing::warn!("Deadline reached, cancelling sync"),
        }
        cancel.cancel();
    })
}

/// Execute the list command
pub async fn execute_list(app: &App, args: &ListArgs, output_mode: OutputMode) -> Result<()> {
    let mut docs = with_timeout(app.config().store_timeout(), app.storage().find_all()).await?;
    if args.pending {
        docs.retain(|doc| doc.get(COMPLETED_FIELD).and_then(|v| v.as_bool()) != Some(true));
    }
    output::print_documents(&docs, output_mode)?;
    Ok(())
}

/// Execute the complete command
pub async fn execute_complete(
    app: &App,
    args: &CompleteArgs,
    output_mode: OutputMode,
) -> Result<()> {
    let completed = !args.undo;
    let update = DocumentUpdate::new().set(COMPLETED_FIELD, serde_json::Value::Bool(completed));
    let outcome = with_timeout(
        app.config().store_timeout(),
        app.storage().update(&IssueId::new(args.id.as_str()), update),
    )
    .await?;

    if outcome.matched == 0 {
        return Err(Error::DocumentNotFound(args.id.clone()).into());
    }
    tracing::debug!(id = %args.id, completed, "Updated completion flag");
    output::print_completion(&args.id, completed, &outcome, output_mode)?;
    Ok(())
}
