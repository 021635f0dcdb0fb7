//! MCP tool implementations.
//!
//! Event tools translate their parameters into a [`WorkerEvent`] and return the
//! dispatched outcome as pretty-printed JSON; inspection tools read the store
//! directly.

pub mod cache;
pub mod fetch;
pub mod lifecycle;
pub mod message;
pub mod notify;
pub mod sync;

use ordo_core::Error;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

use crate::context::WorkerContext;
use crate::events::WorkerEvent;

pub use cache::{CacheGetParams, CachePurgeParams};
pub use fetch::FetchParams;
pub use lifecycle::{ActivateParams, InstallParams, StatusParams};
pub use message::PostMessageParams;
pub use notify::{NotificationClickParams, PushParams};
pub use sync::{SyncProcessParams, SyncRegisterParams};

pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

pub(crate) async fn dispatch_impl(ctx: &WorkerContext, event: WorkerEvent) -> Result<CallToolResult, McpError> {
    let outcome = ctx.dispatch(event).await?;
    json_result(&outcome)
}

/// Parse the JSON text of a tool result.
#[cfg(test)]
pub(crate) fn result_json(result: &CallToolResult) -> serde_json::Value {
    let content_val = serde_json::to_value(&result.content[0]).unwrap();
    let text = content_val
        .get("text")
        .and_then(|v| v.as_str())
        .expect("Expected text field in content");
    serde_json::from_str(text).unwrap()
}
