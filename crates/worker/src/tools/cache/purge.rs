//! cache_purge tool implementation.
//!
//! Deletes entries of one generation by URL pattern.

use ordo_core::Error;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::resolve_generation;
use crate::context::WorkerContext;
use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// SQLite GLOB over absolute URLs, e.g. `https://app.test/api/*`.
    pub url_pattern: String,

    /// Generation to prune (default: the current one).
    #[serde(default)]
    pub generation: Option<String>,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    pub generation: String,
    /// Number of entries deleted.
    pub deleted: u64,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(ctx: &WorkerContext, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    if params.url_pattern.trim().is_empty() {
        return Err(Error::InvalidInput("url_pattern cannot be empty".to_string()).into());
    }

    let generation = resolve_generation(&ctx.store, params.generation).await?;
    let deleted = ctx.store.delete_entries(&generation, params.url_pattern.trim()).await?;
    tracing::info!(%generation, pattern = %params.url_pattern, deleted, "cache entries purged");

    json_result(&CachePurgeOutput { generation, deleted })
}
