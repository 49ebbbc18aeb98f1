//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::cache::{CacheGetParams, CacheInvalidateParams, get_impl, invalidate_impl, stats_impl};
use crate::tools::{ImageLoadParams, load_impl};

use posterframe_client::{ImageCache, LoaderInterceptor};
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

/// The main MCP server handler for posterframe.
#[derive(Clone)]
pub struct PosterframeServer {
    cache: Arc<ImageCache>,
    loader: Arc<LoaderInterceptor>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl PosterframeServer {
    /// Create a new server handler around a shared cache and its interceptor.
    pub fn new(cache: Arc<ImageCache>, loader: Arc<LoaderInterceptor>) -> Self {
        Self { cache, loader, tool_router: Self::tool_router() }
    }

    /// Load an image through the disk cache.
    #[tool(
        description = "Load an image URL through the disk cache. Returns where the bytes came from (disk, network, pass_through), their size, and the cached file path."
    )]
    async fn image_load(&self, params: Parameters<ImageLoadParams>) -> Result<CallToolResult, McpError> {
        load_impl(&self.loader, params.0).await
    }

    #[tool(description = "List cached image entries by url, by entity_id (optionally with category), or by category.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(self.cache.index(), params.0).await
    }

    #[tool(description = "Delete all cached images for an entity_id, optionally restricted to one category.")]
    async fn cache_invalidate(&self, params: Parameters<CacheInvalidateParams>) -> Result<CallToolResult, McpError> {
        invalidate_impl(&self.cache, params.0).await
    }

    #[tool(description = "Report cache entry count, indexed size, size budget and bytes on disk.")]
    async fn cache_stats(&self) -> Result<CallToolResult, McpError> {
        stats_impl(&self.cache).await
    }
}

impl ServerHandler for PosterframeServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "posterframe".into(),
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
