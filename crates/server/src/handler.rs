//! MCP server handler implementation.
//!
//! Routes tool calls to the offline cache layer.

use std::path::PathBuf;
use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use stash_client::OfflineCache;

use crate::tools::cache::{CachePurgeParams, purge_impl, status_impl};
use crate::tools::fetch::{CacheFetchParams, fetch_impl};
use crate::tools::lifecycle::{CacheInstallParams, activate_impl, install_impl};

#[derive(Clone)]
pub struct StashServer {
    tool_router: ToolRouter<Self>,
    cache: Arc<OfflineCache>,
    manifest_path: Option<PathBuf>,
}

#[tool_router]
impl StashServer {
    /// Create a handler over `cache`. `manifest_path` is the manifest used
    /// when `cache_install` is called without one.
    pub fn new(cache: Arc<OfflineCache>, manifest_path: Option<PathBuf>) -> Self {
        Self { tool_router: Self::tool_router(), cache, manifest_path }
    }

    #[tool(description = "Run the install hook: precache every asset in the manifest into the current stores.")]
    async fn cache_install(&self, params: Parameters<CacheInstallParams>) -> Result<CallToolResult, McpError> {
        install_impl(&self.cache, self.manifest_path.as_deref(), params.0).await
    }

    #[tool(description = "Run the activate hook: delete stores left over from previous cache versions.")]
    async fn cache_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.cache).await
    }

    #[tool(description = "Run a request through the cache layer and return the response it would serve.")]
    async fn cache_fetch(&self, params: Parameters<CacheFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.cache, params.0).await
    }

    #[tool(description = "Report the cache version, lifecycle phase and entry count of each current store.")]
    async fn cache_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.cache).await
    }

    #[tool(description = "Delete entries from one store or all of them, optionally only expired ones.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.cache, params.0).await
    }
}

impl ServerHandler for StashServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "stash-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
