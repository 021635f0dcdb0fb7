//! cache_get tool implementation.
//!
//! Looks up the stored response for a request identity.

use std::collections::BTreeMap;

use ordo_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::resolve_generation;
use crate::context::WorkerContext;
use crate::request::encode_body;
use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Request URL, absolute or relative to the configured origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request headers; only the configured vary headers affect the lookup.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Generation to read (default: the current one).
    #[serde(default)]
    pub generation: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub generation: String,
    pub key_hash: String,
    pub method: String,
    pub url: String,
    pub vary: String,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub stored_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_base64: Option<String>,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(ctx: &WorkerContext, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let request = ctx.request(&params.method, &params.url, params.headers, None)?;
    let generation = resolve_generation(&ctx.store, params.generation).await?;
    let (key_hash, _) = request.cache_identity(&ctx.config.vary_headers);

    let entry = ctx
        .store
        .get_entry(&generation, &key_hash)
        .await?
        .ok_or_else(|| Error::CacheMiss(format!("{} in {generation}", request.label())))?;

    let (body, body_base64) = encode_body(&entry.body);
    let output = CacheGetOutput {
        generation,
        key_hash: entry.key_hash,
        method: entry.method,
        url: entry.url,
        vary: entry.vary,
        status: entry.status,
        headers: entry.headers,
        stored_at: entry.stored_at,
        body,
        body_base64,
    };

    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedOrigin, test_context};
    use crate::tools::result_json;
    use std::sync::Arc;

    fn params(url: &str, generation: Option<&str>) -> CacheGetParams {
        CacheGetParams {
            url: url.into(),
            method: default_method(),
            headers: BTreeMap::new(),
            generation: generation.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_get_impl_missing() {
        let ctx = test_context(Arc::new(ScriptedOrigin::new())).await;
        ctx.register().await.unwrap();

        let err = get_impl(&ctx, params("/nope.js", None)).await.unwrap_err();
        assert!(err.message.starts_with("CACHE_MISS"));
    }

    #[tokio::test]
    async fn test_get_impl_no_generation() {
        let ctx = test_context(Arc::new(ScriptedOrigin::new())).await;
        let err = get_impl(&ctx, params("/", None)).await.unwrap_err();
        assert!(err.message.starts_with("INVALID_INPUT"));
    }

    #[tokio::test]
    async fn test_get_impl_found() {
        let ctx = test_context(Arc::new(ScriptedOrigin::new())).await;
        ctx.register().await.unwrap();

        let output = result_json(&get_impl(&ctx, params("/index.html", Some("v1"))).await.unwrap());
        assert_eq!(output["generation"], "v1");
        assert_eq!(output["url"], "https://app.test/index.html");
        assert_eq!(output["status"], 200);
        assert_eq!(output["body"], "<html>shell</html>");
        assert_eq!(output["headers"]["content-type"], "text/plain");
    }
}
