//! post_message tool: the front-end's control channel.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::dispatch_impl;
use crate::context::WorkerContext;
use crate::events::WorkerEvent;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PostMessageParams {
    /// Message object, e.g. `{"type": "SKIP_WAITING"}`,
    /// `{"type": "CACHE_URLS", "urls": ["/a.js"]}` or `{"type": "CLEAR_CACHE"}`.
    pub message: serde_json::Value,
}

pub async fn post_message_impl(ctx: &WorkerContext, params: PostMessageParams) -> Result<CallToolResult, McpError> {
    dispatch_impl(ctx, WorkerEvent::Message(params.message)).await
}
