//! MCP server implementation.
//!
//! This module contains the main server setup using rmcp.

use crate::error::Error;
use crate::models::MarkCompletedParams;
use crate::tools::Tools;
use backports::config::{BackportsConfig, config_dir};
use backports::storage::create_storage;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{
    ErrorData as McpError, ServiceExt, handler::server::ServerHandler, tool, tool_handler,
    tool_router,
};
use std::path::Path;
use std::sync::Arc;

/// The backports MCP server.
///
/// Provides MCP protocol handling over stdio transport.
#[derive(Clone)]
pub struct BackportsMcpServer {
    /// Tool implementations.
    tools: Arc<Tools>,
    /// Tool router for MCP dispatch.
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl BackportsMcpServer {
    /// List every stored snapshot.
    #[tool(
        description = "List every synced issue snapshot, including its nested clone chain and completed flag."
    )]
    async fn list_documents(&self) -> Result<CallToolResult, McpError> {
        match self.tools.list_documents().await {
            Ok(docs) => Ok(CallToolResult::success(vec![Content::json(docs)?])),
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }

    /// Set the completed flag of one snapshot.
    #[tool(
        description = "Mark a synced issue snapshot as completed (or not). Only the completed flag is changed."
    )]
    async fn mark_completed(
        &self,
        Parameters(params): Parameters<MarkCompletedParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.tools.mark_completed(&params.id, params.completed).await {
            Ok(response) => Ok(CallToolResult::success(vec![Content::json(response)?])),
            Err(e @ Error::InvalidArgument { .. }) => {
                Err(McpError::invalid_params(e.to_string(), None))
            }
            Err(e) => Err(McpError::internal_error(e.to_string(), None)),
        }
    }
}

impl BackportsMcpServer {
    /// Create a server over the given tools.
    #[must_use]
    pub fn new(tools: Tools) -> Self {
        Self {
            tools: Arc::new(tools),
            tool_router: Self::tool_router(),
        }
    }

    /// Create a server for the store named in the configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or the store
    /// cannot be opened.
    pub async fn from_config_path(config_path: &Path) -> crate::error::Result<Self> {
        let config = BackportsConfig::load(config_path).await?;
        let backend = config
            .store
            .to_backend(&config_dir(config_path))
            .map_err(Error::Setup)?;
        tracing::info!(backend = ?backend, "Opening store");
        let store = create_storage(backend).await?;
        Ok(Self::new(Tools::new(
            Arc::from(store),
            config.store_timeout(),
        )))
    }

    /// Serve MCP over stdin/stdout until the client disconnects.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails to start or terminates
    /// abnormally.
    pub async fn run(self) -> crate::error::Result<()> {
        let service = self
            .serve(rmcp::transport::stdio())
            .await
            .map_err(|e| Error::Mcp(e.to_string()))?;
        service
            .waiting()
            .await
            .map_err(|e| Error::Mcp(e.to_string()))?;
        Ok(())
    }
}

#[tool_handler]
impl ServerHandler for BackportsMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "backports-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Backports MCP server. Use list_documents to read synced issue snapshots and mark_completed to track backport progress."
                    .into(),
            ),
        }
    }
}
