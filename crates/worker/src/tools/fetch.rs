//! fetch tool implementation.
//!
//! Runs one request through the policy router and the chosen strategy.

use std::collections::BTreeMap;

use bytes::Bytes;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::dispatch_impl;
use crate::context::WorkerContext;
use crate::events::WorkerEvent;

/// Input parameters for the fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchParams {
    /// Request URL, absolute or relative to the configured origin.
    pub url: String,

    /// HTTP method (default: GET). Only GET requests are cached.
    #[serde(default = "default_method")]
    pub method: String,

    /// Request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Request body, sent as-is.
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

pub async fn fetch_impl(ctx: &WorkerContext, params: FetchParams) -> Result<CallToolResult, McpError> {
    let request = ctx.request(&params.method, &params.url, params.headers, params.body.map(Bytes::from))?;
    dispatch_impl(ctx, WorkerEvent::Fetch(request)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedOrigin, test_context};
    use crate::tools::result_json;
    use std::sync::Arc;

    fn params(url: &str) -> FetchParams {
        FetchParams { url: url.into(), method: default_method(), headers: BTreeMap::new(), body: None }
    }

    #[tokio::test]
    async fn test_fetch_empty_url() {
        let ctx = test_context(Arc::new(ScriptedOrigin::new())).await;
        assert!(fetch_impl(&ctx, params("")).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_from_cache() {
        let origin = Arc::new(ScriptedOrigin::new());
        let ctx = test_context(origin.clone()).await;
        ctx.register().await.unwrap();
        origin.set_offline(true);

        let result = fetch_impl(&ctx, params("/index.html")).await.unwrap();
        let output = result_json(&result);
        assert_eq!(output["event"], "response");
        assert_eq!(output["result"]["status"], 200);
        assert_eq!(output["result"]["source"], "cache");
        assert_eq!(output["result"]["body"], "<html>shell</html>");
    }

    #[tokio::test]
    async fn test_fetch_miss_is_error() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.set_offline(true);
        let ctx = test_context(origin).await;

        let err = fetch_impl(&ctx, params("/app.js")).await.unwrap_err();
        assert!(err.message.starts_with("CACHE_MISS"));
    }
}
