//! NetworkFirst: the origin answers when it can, the cache when it can't.

use ordo_core::Error;

use crate::context::WorkerContext;
use crate::request::{InterceptedRequest, ResponseSource, WorkerResponse};

impl WorkerContext {
    /// Any origin response is stored, whatever its status.
    pub(crate) async fn network_first(&self, request: &InterceptedRequest) -> Result<WorkerResponse, Error> {
        let (key_hash, vary) = request.cache_identity(&self.config.vary_headers);

        match self.fetch_origin(&request.to_origin_request()).await {
            Ok(response) => {
                self.store_current(request.entry_for(&vary, &response)).await;
                Ok(WorkerResponse::from_fetch(response))
            }
            Err(err) if err.is_origin_failure() => match self.lookup_request(request, &key_hash, &vary).await {
                Some(entry) => {
                    tracing::debug!(request = %request.label(), error = %err, "origin unreachable; serving cached copy");
                    Ok(WorkerResponse::from_entry(entry, ResponseSource::Cache))
                }
                None => Err(err),
            },
            Err(err) => Err(err),
        }
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
    async fn test_network_response_is_stored_and_reused_offline() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/api/notes", 200, r#"[{"id":1}]"#);
        let ctx = test_context(origin.clone()).await;
        ctx.register().await.unwrap();

        let request = ctx.request("GET", "/api/notes", BTreeMap::new(), None).unwrap();
        let live = ctx.handle_fetch(&request).await.unwrap();
        assert_eq!(live.source, ResponseSource::Network);

        origin.set_offline(true);
        let offline = ctx.handle_fetch(&request).await.unwrap();
        assert_eq!(offline.source, ResponseSource::Cache);
        assert_eq!(&offline.body[..], br#"[{"id":1}]"#);
    }

    #[tokio::test]
    async fn test_error_statuses_are_stored() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/api/me", 401, "unauthorized");
        let ctx = test_context(origin.clone()).await;
        ctx.register().await.unwrap();

        let request = ctx.request("GET", "/api/me", BTreeMap::new(), None).unwrap();
        assert_eq!(ctx.handle_fetch(&request).await.unwrap().status, 401);

        origin.set_offline(true);
        let cached = ctx.handle_fetch(&request).await.unwrap();
        assert_eq!(cached.status, 401);
        assert_eq!(cached.source, ResponseSource::Cache);
    }

    #[tokio::test]
    async fn test_fresh_response_replaces_cached() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/api/count", 200, "1");
        let ctx = test_context(origin.clone()).await;
        ctx.register().await.unwrap();
        let request = ctx.request("GET", "/api/count", BTreeMap::new(), None).unwrap();
        ctx.handle_fetch(&request).await.unwrap();

        origin.respond("/api/count", 200, "2");
        assert_eq!(&ctx.handle_fetch(&request).await.unwrap().body[..], b"2");

        origin.set_offline(true);
        assert_eq!(&ctx.handle_fetch(&request).await.unwrap().body[..], b"2");
    }

    #[tokio::test]
    async fn test_offline_without_entry_fails() {
        let origin = Arc::new(ScriptedOrigin::new());
        let ctx = test_context(origin.clone()).await;
        ctx.register().await.unwrap();
        origin.set_offline(true);

        let request = ctx.request("GET", "/api/unknown", BTreeMap::new(), None).unwrap();
        assert!(matches!(ctx.handle_fetch(&request).await, Err(Error::NetworkUnavailable(_))));
    }

    #[tokio::test]
    async fn test_prefetched_api_entry_covers_varied_request() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/api/config", 200, r#"{"theme":"dark"}"#);
        let mut config = crate::testing::test_config();
        config.vary_headers = vec!["accept-language".into()];
        config.manifest.push("/api/config".into());
        let ctx = crate::testing::test_context_with(config, origin.clone()).await;
        ctx.register().await.unwrap();
        origin.set_offline(true);

        let mut de = BTreeMap::new();
        de.insert("Accept-Language".to_string(), "de".to_string());
        let request = ctx.request("GET", "/api/config", de, None).unwrap();
        let response = ctx.handle_fetch(&request).await.unwrap();
        assert_eq!(response.source, ResponseSource::Cache);
        assert_eq!(&response.body[..], br#"{"theme":"dark"}"#);
    }
}
