//! CacheFirst with background revalidation.
//!
//! A hit is served immediately and refreshed from the origin behind the
//! caller's back; only a successful refresh overwrites the entry. A miss goes
//! to the origin and caches 2xx responses.

use std::sync::Arc;

use ordo_core::{CacheEntry, Error};

use super::fetch_with_timeout;
use crate::context::WorkerContext;
use crate::request::{InterceptedRequest, ResponseSource, WorkerResponse};

impl WorkerContext {
    pub(crate) async fn cache_first(&self, request: &InterceptedRequest) -> Result<WorkerResponse, Error> {
        let (key_hash, vary) = request.cache_identity(&self.config.vary_headers);

        if let Some(entry) = self.lookup_request(request, &key_hash, &vary).await {
            tracing::debug!(request = %request.label(), "cache hit");
            self.revalidate(request, vary);
            return Ok(WorkerResponse::from_entry(entry, ResponseSource::Cache));
        }

        let response = self
            .fetch_origin(&request.to_origin_request())
            .await
            .map_err(|e| Error::CacheMiss(format!("{}: {e}", request.label())))?;

        if response.is_success() {
            self.store_current(request.entry_for(&vary, &response)).await;
        }

        Ok(WorkerResponse::from_fetch(response))
    }

    /// Refresh a cached entry without holding up the response.
    fn revalidate(&self, request: &InterceptedRequest, vary: String) {
        let store = self.store.clone();
        let origin = Arc::clone(&self.origin);
        let timeout = self.config.timeout();
        let origin_request = request.to_origin_request();
        let method = request.method.to_string();
        let url = request.url.to_string();

        self.spawn(async move {
            match fetch_with_timeout(origin.as_ref(), &origin_request, timeout).await {
                Ok(response) if response.is_success() => {
                    let entry = CacheEntry::new(
                        &method,
                        &url,
                        &vary,
                        response.status.as_u16(),
                        response.header_pairs(),
                        response.bytes.to_vec(),
                    );
                    if let Err(e) = store.put_current_entry(&entry).await {
                        tracing::warn!(%url, error = %e, "revalidation write failed");
                    }
                }
                Ok(response) => {
                    tracing::debug!(%url, status = response.status.as_u16(), "revalidation kept cached entry");
                }
                Err(e) => tracing::debug!(%url, error = %e, "revalidation failed; cached entry kept"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::request::ResponseSource;
    use crate::testing::{ScriptedOrigin, test_context};
    use ordo_core::Error;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_hit_served_offline() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/", 200, "<html>v1</html>");
        let ctx = test_context(origin.clone()).await;
        ctx.register().await.unwrap();
        origin.set_offline(true);

        let request = ctx.request("GET", "/", BTreeMap::new(), None).unwrap();
        let response = ctx.handle_fetch(&request).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(&response.body[..], b"<html>v1</html>");
        assert_eq!(response.source, ResponseSource::Cache);
    }

    #[tokio::test]
    async fn test_hit_revalidates_in_background() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/", 200, "old");
        let ctx = test_context(origin.clone()).await;
        ctx.register().await.unwrap();

        origin.respond("/", 200, "new");
        let request = ctx.request("GET", "/", BTreeMap::new(), None).unwrap();
        let first = ctx.handle_fetch(&request).await.unwrap();
        assert_eq!(&first.body[..], b"old");

        ctx.drain_background().await;
        let second = ctx.handle_fetch(&request).await.unwrap();
        assert_eq!(&second.body[..], b"new");
        assert_eq!(second.source, ResponseSource::Cache);
    }

    #[tokio::test]
    async fn test_failed_revalidation_keeps_entry() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/", 200, "good");
        let ctx = test_context(origin.clone()).await;
        ctx.register().await.unwrap();

        origin.respond("/", 500, "boom");
        let request = ctx.request("GET", "/", BTreeMap::new(), None).unwrap();
        ctx.handle_fetch(&request).await.unwrap();
        ctx.drain_background().await;

        let again = ctx.handle_fetch(&request).await.unwrap();
        assert_eq!(again.status, 200);
        assert_eq!(&again.body[..], b"good");
    }

    #[tokio::test]
    async fn test_miss_caches_success_only() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/logo.png", 200, "png");
        origin.respond("/missing.js", 404, "nope");
        let ctx = test_context(origin.clone()).await;
        ctx.register().await.unwrap();

        let logo = ctx.request("GET", "/logo.png", BTreeMap::new(), None).unwrap();
        let missing = ctx.request("GET", "/missing.js", BTreeMap::new(), None).unwrap();
        assert_eq!(ctx.handle_fetch(&logo).await.unwrap().source, ResponseSource::Network);
        assert_eq!(ctx.handle_fetch(&missing).await.unwrap().status, 404);

        origin.set_offline(true);
        let cached = ctx.handle_fetch(&logo).await.unwrap();
        assert_eq!(cached.source, ResponseSource::Cache);
        assert!(matches!(ctx.handle_fetch(&missing).await, Err(Error::CacheMiss(_))));
    }

    #[tokio::test]
    async fn test_miss_while_offline() {
        let origin = Arc::new(ScriptedOrigin::new());
        let ctx = test_context(origin.clone()).await;
        ctx.register().await.unwrap();
        origin.set_offline(true);

        let request = ctx.request("GET", "/never-seen.css", BTreeMap::new(), None).unwrap();
        assert!(matches!(ctx.handle_fetch(&request).await, Err(Error::CacheMiss(_))));
    }

    #[tokio::test]
    async fn test_vary_headers_split_entries() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/styles.css", 200, "css");
        let mut config = crate::testing::test_config();
        config.vary_headers = vec!["accept-language".into()];
        let ctx = crate::testing::test_context_with(config, origin.clone()).await;
        ctx.register().await.unwrap();

        let mut fr = BTreeMap::new();
        fr.insert("Accept-Language".to_string(), "fr".to_string());
        let french = ctx.request("GET", "/styles.css", fr, None).unwrap();
        ctx.handle_fetch(&french).await.unwrap();

        origin.set_offline(true);
        assert_eq!(ctx.handle_fetch(&french).await.unwrap().source, ResponseSource::Cache);
        let plain = ctx.request("GET", "/styles.css", BTreeMap::new(), None).unwrap();
        assert!(matches!(ctx.handle_fetch(&plain).await, Err(Error::CacheMiss(_))));
    }

    #[tokio::test]
    async fn test_installed_shell_served_to_varied_request_offline() {
        let origin = Arc::new(ScriptedOrigin::new());
        let mut config = crate::testing::test_config();
        config.vary_headers = vec!["accept-language".into()];
        let ctx = crate::testing::test_context_with(config, origin.clone()).await;
        ctx.register().await.unwrap();
        origin.set_offline(true);

        let mut it = BTreeMap::new();
        it.insert("Accept-Language".to_string(), "it".to_string());
        let home = ctx.request("GET", "/", it.clone(), None).unwrap();
        let response = ctx.handle_fetch(&home).await.unwrap();
        assert_eq!(response.source, ResponseSource::Cache);
        assert_eq!(&response.body[..], b"<html>home</html>");

        let shell = ctx.request("GET", "/index.html", it, None).unwrap();
        assert_eq!(&ctx.handle_fetch(&shell).await.unwrap().body[..], b"<html>shell</html>");
    }
}
