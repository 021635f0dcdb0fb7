//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.

use std::sync::Arc;

use crate::context::WorkerContext;
use crate::tools::{
    ActivateParams, CacheGetParams, CachePurgeParams, FetchParams, InstallParams, NotificationClickParams,
    PostMessageParams, PushParams, StatusParams, SyncProcessParams, SyncRegisterParams, cache, fetch, lifecycle,
    message, notify, sync,
};

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

/// The main MCP server handler for ordo-sw.
#[derive(Clone)]
pub struct OrdoWorkerServer {
    ctx: Arc<WorkerContext>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl OrdoWorkerServer {
    /// Create a new server handler around a shared worker context.
    pub fn new(ctx: Arc<WorkerContext>) -> Self {
        Self { ctx, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Intercept a request: route it (cache-first, network-first, shell fallback or passthrough) and return status, headers, body and where the response came from."
    )]
    async fn fetch(&self, params: Parameters<FetchParams>) -> Result<CallToolResult, McpError> {
        fetch::fetch_impl(&self.ctx, params.0).await
    }

    #[tool(
        description = "Install a cache generation by prefetching every manifest URL. All-or-nothing; defaults to the configured version and manifest."
    )]
    async fn install(&self, params: Parameters<InstallParams>) -> Result<CallToolResult, McpError> {
        lifecycle::install_impl(&self.ctx, params.0).await
    }

    #[tool(description = "Promote the waiting generation to current and delete all others.")]
    async fn activate(&self, params: Parameters<ActivateParams>) -> Result<CallToolResult, McpError> {
        lifecycle::activate_impl(&self.ctx, params.0).await
    }

    #[tool(description = "List cache generations with their state and entry counts, plus pending sync tasks.")]
    async fn worker_status(&self, params: Parameters<StatusParams>) -> Result<CallToolResult, McpError> {
        lifecycle::status_impl(&self.ctx, params.0).await
    }

    #[tool(description = "Post a control message: SKIP_WAITING, CACHE_URLS {urls} or CLEAR_CACHE. Unknown messages are ignored.")]
    async fn post_message(&self, params: Parameters<PostMessageParams>) -> Result<CallToolResult, McpError> {
        message::post_message_impl(&self.ctx, params.0).await
    }

    #[tool(description = "Queue a deferred task under a sync tag for replay when connectivity returns.")]
    async fn sync_register(&self, params: Parameters<SyncRegisterParams>) -> Result<CallToolResult, McpError> {
        sync::register_impl(&self.ctx, params.0).await
    }

    #[tool(description = "Signal restored connectivity: run every due sync task once. Failed tasks stay queued.")]
    async fn sync_process(&self, params: Parameters<SyncProcessParams>) -> Result<CallToolResult, McpError> {
        sync::process_impl(&self.ctx, params.0).await
    }

    #[tool(description = "Deliver a push message and return the notification to display.")]
    async fn push(&self, params: Parameters<PushParams>) -> Result<CallToolResult, McpError> {
        notify::push_impl(&self.ctx, params.0).await
    }

    #[tool(description = "Handle a notification click and return the window to open.")]
    async fn notification_click(&self, params: Parameters<NotificationClickParams>) -> Result<CallToolResult, McpError> {
        notify::click_impl(&self.ctx, params.0).await
    }

    #[tool(description = "Read a stored response by request identity from the current or a named generation.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        cache::get_impl(&self.ctx, params.0).await
    }

    #[tool(description = "Delete entries whose URL matches a glob pattern from the current or a named generation.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        cache::purge_impl(&self.ctx, params.0).await
    }
}

impl ServerHandler for OrdoWorkerServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "ordo-sw".into(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedOrigin, test_context};

    #[tokio::test]
    async fn test_all_tools_listed() {
        let ctx = test_context(Arc::new(ScriptedOrigin::new())).await;
        let server = OrdoWorkerServer::new(ctx);

        let mut names: Vec<String> = server.tool_router.list_all().into_iter().map(|t| t.name.to_string()).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "activate",
                "cache_get",
                "cache_purge",
                "fetch",
                "install",
                "notification_click",
                "post_message",
                "push",
                "sync_process",
                "sync_register",
                "worker_status",
            ]
        );
    }

    #[tokio::test]
    async fn test_server_info() {
        let server = OrdoWorkerServer::new(test_context(Arc::new(ScriptedOrigin::new())).await);
        assert_eq!(server.get_info().server_info.name, "ordo-sw");
    }
}
