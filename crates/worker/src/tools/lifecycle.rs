//! install, activate and worker_status tools.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{dispatch_impl, json_result};
use crate::context::WorkerContext;
use crate::events::WorkerEvent;

/// Parameters for the install tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct InstallParams {
    /// Generation name (default: the configured cache version).
    #[serde(default)]
    pub version: Option<String>,

    /// URLs to prefetch (default: the configured manifest).
    #[serde(default)]
    pub manifest: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ActivateParams {}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct StatusParams {}

pub async fn install_impl(ctx: &WorkerContext, params: InstallParams) -> Result<CallToolResult, McpError> {
    dispatch_impl(ctx, WorkerEvent::Install { version: params.version, manifest: params.manifest }).await
}

pub async fn activate_impl(ctx: &WorkerContext, _params: ActivateParams) -> Result<CallToolResult, McpError> {
    dispatch_impl(ctx, WorkerEvent::Activate).await
}

pub async fn status_impl(ctx: &WorkerContext, _params: StatusParams) -> Result<CallToolResult, McpError> {
    let status = ctx.status().await?;
    json_result(&status)
}
