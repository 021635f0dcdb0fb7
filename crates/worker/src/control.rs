//! Control channel: one-way commands posted by the front-end.
//!
//! Messages are JSON objects tagged by `type`. Anything that doesn't parse is
//! logged and ignored; handling a message never fails the caller.

use futures::future::join_all;
use ordo_core::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::context::WorkerContext;
use crate::request::InterceptedRequest;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Promote the waiting generation now.
    SkipWaiting,
    /// Fetch and store these URLs into the current generation.
    CacheUrls { urls: Vec<String> },
    /// Delete every generation.
    ClearCache,
}

impl ControlMessage {
    pub fn parse(message: &serde_json::Value) -> Result<Self, Error> {
        serde_json::from_value(message.clone()).map_err(|e| Error::MalformedMessage(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ControlOutcome {
    Activated { version: String, removed: Vec<String> },
    NothingWaiting,
    Cached { stored: Vec<String>, failed: Vec<String> },
    Cleared { generations: u64 },
    Ignored { reason: String },
}

impl WorkerContext {
    pub async fn handle_message(&self, message: &serde_json::Value) -> ControlOutcome {
        let command = match ControlMessage::parse(message) {
            Ok(command) => command,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring control message");
                return ControlOutcome::Ignored { reason: e.to_string() };
            }
        };
        tracing::debug!(?command, "control message");

        match command {
            ControlMessage::SkipWaiting => match self.skip_waiting().await {
                Ok(Some(report)) => ControlOutcome::Activated { version: report.activated, removed: report.removed },
                Ok(None) => ControlOutcome::NothingWaiting,
                Err(e) => ignored("SKIP_WAITING", &e),
            },
            ControlMessage::CacheUrls { urls } => self.cache_urls(&urls).await,
            ControlMessage::ClearCache => match self.clear_all().await {
                Ok(generations) => ControlOutcome::Cleared { generations },
                Err(e) => ignored("CLEAR_CACHE", &e),
            },
        }
    }

    /// Best effort: each URL is fetched and stored independently.
    async fn cache_urls(&self, urls: &[String]) -> ControlOutcome {
        let attempts = urls.iter().map(|raw| async move {
            let request = match self.request("GET", raw, Default::default(), None) {
                Ok(request) => request,
                Err(e) => {
                    tracing::debug!(url = %raw, error = %e, "CACHE_URLS entry rejected");
                    return (raw.clone(), false);
                }
            };
            let stored = self.cache_one(&request).await;
            (request.url.to_string(), stored)
        });

        let mut stored = Vec::new();
        let mut failed = Vec::new();
        for (url, ok) in join_all(attempts).await {
            if ok { stored.push(url) } else { failed.push(url) }
        }
        tracing::info!(stored = stored.len(), failed = failed.len(), "CACHE_URLS handled");
        ControlOutcome::Cached { stored, failed }
    }

    async fn cache_one(&self, request: &InterceptedRequest) -> bool {
        let (_, vary) = request.cache_identity(&self.config.vary_headers);
        match self.fetch_origin(&request.to_origin_request()).await {
            Ok(response) if response.is_success() => self.store_current(request.entry_for(&vary, &response)).await,
            Ok(response) => {
                tracing::debug!(request = %request.label(), status = response.status.as_u16(), "CACHE_URLS skipped");
                false
            }
            Err(e) => {
                tracing::debug!(request = %request.label(), error = %e, "CACHE_URLS fetch failed");
                false
            }
        }
    }
}

fn ignored(command: &str, err: &Error) -> ControlOutcome {
    tracing::warn!(command, error = %err, "control command failed");
    ControlOutcome::Ignored { reason: err.to_string() }
}
