//! Backports MCP server binary.
//!
//! This binary runs the MCP server using stdio transport.

use backports::config::{CONFIG_ENV, DEFAULT_CONFIG_FILE};
use backports_mcp::BackportsMcpServer;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("backports=info,backports_mcp=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = std::env::var_os(CONFIG_ENV)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from);
    tracing::info!(config = %config_path.display(), "Starting backports-mcp server");

    let server = BackportsMcpServer::from_config_path(&config_path).await?;
    server.run().await?;

    Ok(())
}
