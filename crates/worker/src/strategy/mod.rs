//! Caching strategies and the fetch event entry point.
//!
//! Every origin call goes through [`fetch_with_timeout`] so a stalled origin
//! counts as a network failure. Cache writes on the request path run on the
//! worker's task tracker; a caller that goes away does not cancel them.

pub mod cache_first;
pub mod network_first;
pub mod shell_fallback;

use std::time::Duration;

use ordo_client::{FetchResponse, Origin, OriginRequest};
use ordo_core::{CacheEntry, Error};

use crate::context::WorkerContext;
use crate::request::{InterceptedRequest, WorkerResponse};
use crate::router::Strategy;

/// Fetch from the origin, turning a stall into `NetworkUnavailable`.
pub async fn fetch_with_timeout(
    origin: &dyn Origin, request: &OriginRequest, timeout: Duration,
) -> Result<FetchResponse, Error> {
    match tokio::time::timeout(timeout, origin.fetch(request)).await {
        Ok(result) => result,
        Err(_) => Err(Error::NetworkUnavailable(format!(
            "{} {} timed out after {}ms",
            request.method,
            request.url,
            timeout.as_millis()
        ))),
    }
}

impl WorkerContext {
    /// Answer an intercepted request according to its route.
    pub async fn handle_fetch(&self, request: &InterceptedRequest) -> Result<WorkerResponse, Error> {
        let route = self.router.classify(&request.method, &request.url);
        tracing::debug!(request = %request.label(), strategy = ?route.strategy, "fetch intercepted");

        match (route.strategy, route.fallback) {
            (Strategy::CacheFirst, _) => self.cache_first(request).await,
            (Strategy::NetworkFirst, _) => self.network_first(request).await,
            (Strategy::NetworkFirstShellFallback, Some(shell)) => self.network_first_with_shell(request, &shell).await,
            (Strategy::NetworkFirstShellFallback, None) => self.network_first(request).await,
            (Strategy::Passthrough, _) => self.passthrough(request).await,
        }
    }

    async fn passthrough(&self, request: &InterceptedRequest) -> Result<WorkerResponse, Error> {
        let response = self.fetch_origin(&request.to_origin_request()).await?;
        Ok(WorkerResponse::from_fetch(response))
    }

    pub(crate) async fn fetch_origin(&self, request: &OriginRequest) -> Result<FetchResponse, Error> {
        fetch_with_timeout(self.origin.as_ref(), request, self.config.timeout()).await
    }

    /// Look up the current generation; store errors read as a miss.
    /// Current entry for `request`, falling back to its header-less identity
    /// when the vary-keyed one is absent.
    pub(crate) async fn lookup_request(
        &self, request: &InterceptedRequest, key_hash: &str, vary: &str,
    ) -> Option<CacheEntry> {
        if let Some(entry) = self.lookup_current(key_hash).await {
            return Some(entry);
        }
        if vary.is_empty() {
            return None;
        }
        let entry = self.lookup_current(&request.base_identity()).await;
        if entry.is_some() {
            tracing::debug!(request = %request.label(), "served header-less entry for varied request");
        }
        entry
    }

    pub(crate) async fn lookup_current(&self, key_hash: &str) -> Option<CacheEntry> {
        match self.store.get_current_entry(key_hash).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "cache lookup failed; treating as miss");
                None
            }
        }
    }

    /// Write into the current generation. Returns whether the entry landed.
    ///
    /// A failed write is logged and never fails the request.
    pub(crate) async fn store_current(&self, entry: CacheEntry) -> bool {
        let store = self.store.clone();
        let url = entry.url.clone();
        let write = self.spawn(async move { store.put_current_entry(&entry).await });

        match write.await {
            Ok(Ok(true)) => true,
            Ok(Ok(false)) => {
                tracing::debug!(%url, "no current generation; response not cached");
                false
            }
            Ok(Err(e)) => {
                tracing::warn!(%url, error = %e, "cache write failed");
                false
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "cache write task did not complete");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ResponseSource;
    use crate::testing::{ScriptedOrigin, test_context};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_timeout_is_network_failure() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.hang("/api/slow");
        let ctx = test_context(origin.clone()).await;

        let request = ctx.request("GET", "/api/slow", BTreeMap::new(), None).unwrap();
        let err = ctx.handle_fetch(&request).await.unwrap_err();
        assert!(matches!(err, Error::NetworkUnavailable(msg) if msg.contains("timed out")));
    }

    #[tokio::test]
    async fn test_passthrough_is_never_cached() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/api/notes", 201, "created");
        let ctx = test_context(origin.clone()).await;
        ctx.register().await.unwrap();

        let request = ctx.request("POST", "/api/notes", BTreeMap::new(), None).unwrap();
        let response = ctx.handle_fetch(&request).await.unwrap();
        assert_eq!(response.status, 201);
        assert_eq!(response.source, ResponseSource::Network);

        let current = ctx.store.current_generation().await.unwrap().unwrap();
        assert_eq!(ctx.store.count_entries(&current).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_passthrough_failure_propagates() {
        let origin = Arc::new(ScriptedOrigin::new());
        let ctx = test_context(origin.clone()).await;
        ctx.register().await.unwrap();
        origin.set_offline(true);

        let request = ctx.request("DELETE", "/api/notes/1", BTreeMap::new(), None).unwrap();
        assert!(matches!(ctx.handle_fetch(&request).await, Err(Error::NetworkUnavailable(_))));
    }

    #[tokio::test]
    async fn test_store_current_without_generation() {
        let ctx = test_context(Arc::new(ScriptedOrigin::new())).await;
        let entry = CacheEntry::new("GET", "https://app.test/x", "", 200, BTreeMap::new(), b"x".to_vec());
        assert!(!ctx.store_current(entry).await);
    }
}
