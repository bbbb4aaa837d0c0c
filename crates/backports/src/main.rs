//! Backports CLI binary.

use anyhow::Result;
use backports::cli::Cli;
use tracing_subscriber::EnvFilter;

/// Main entry point for the backports CLI.
///
/// The sync path is sequential, so a current_thread runtime is enough.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Controlled via RUST_LOG, e.g. RUST_LOG=backports=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("backports=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse_args();
    cli.execute().await?;

    tracing::debug!("Backports CLI completed successfully");
    Ok(())
}
