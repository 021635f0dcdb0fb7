//! push and notification_click tools.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::dispatch_impl;
use crate::context::WorkerContext;
use crate::events::WorkerEvent;

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct PushParams {
    /// Push payload text; becomes the notification body.
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct NotificationClickParams {}

pub async fn push_impl(ctx: &WorkerContext, params: PushParams) -> Result<CallToolResult, McpError> {
    dispatch_impl(ctx, WorkerEvent::Push { data: params.data }).await
}

pub async fn click_impl(ctx: &WorkerContext, _params: NotificationClickParams) -> Result<CallToolResult, McpError> {
    dispatch_impl(ctx, WorkerEvent::NotificationClick).await
}
