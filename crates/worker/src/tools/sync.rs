//! sync_register and sync_process tools.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::dispatch_impl;
use crate::context::WorkerContext;
use crate::events::WorkerEvent;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SyncRegisterParams {
    /// Sync tag, e.g. "sync-data".
    pub tag: String,

    /// Task payload. For "sync-data": `{"method", "url", "headers", "body"}`.
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SyncProcessParams {}

pub async fn register_impl(ctx: &WorkerContext, params: SyncRegisterParams) -> Result<CallToolResult, McpError> {
    dispatch_impl(ctx, WorkerEvent::SyncRegister { tag: params.tag, payload: params.payload }).await
}

/// Connectivity is back: run every due task.
pub async fn process_impl(ctx: &WorkerContext, _params: SyncProcessParams) -> Result<CallToolResult, McpError> {
    dispatch_impl(ctx, WorkerEvent::Sync).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedOrigin, test_context};
    use crate::tools::result_json;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_register_and_process() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/api/outbox", 202, "");
        let ctx = test_context(origin).await;

        let params = SyncRegisterParams { tag: "sync-data".into(), payload: json!({"url": "/api/outbox"}) };
        let queued = result_json(&register_impl(&ctx, params).await.unwrap());
        assert_eq!(queued["event"], "queued");
        assert_eq!(queued["result"]["attempts"], 0);

        let report = result_json(&process_impl(&ctx, SyncProcessParams {}).await.unwrap());
        assert_eq!(report["result"]["completed"].as_array().unwrap().len(), 1);
        assert_eq!(report["result"]["remaining"], 0);
    }

    #[tokio::test]
    async fn test_register_empty_tag() {
        let ctx = test_context(Arc::new(ScriptedOrigin::new())).await;
        let params = SyncRegisterParams { tag: "".into(), payload: json!({}) };
        let err = register_impl(&ctx, params).await.unwrap_err();
        assert!(err.message.starts_with("INVALID_INPUT"));
    }
}
