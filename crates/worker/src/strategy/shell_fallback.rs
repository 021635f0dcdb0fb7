//! NetworkFirst for client-side routes, with the cached shell as fallback.
//!
//! Route responses are not cached; offline navigation always lands on the
//! shell document so the front-end router can take over.

use ordo_core::Error;
use url::Url;

use crate::context::WorkerContext;
use crate::request::{InterceptedRequest, ResponseSource, WorkerResponse};

impl WorkerContext {
    pub(crate) async fn network_first_with_shell(
        &self, request: &InterceptedRequest, shell: &Url,
    ) -> Result<WorkerResponse, Error> {
        let err = match self.fetch_origin(&request.to_origin_request()).await {
            Ok(response) => return Ok(WorkerResponse::from_fetch(response)),
            Err(err) if err.is_origin_failure() => err,
            Err(err) => return Err(err),
        };

        let (shell_key, _) = InterceptedRequest::get(shell.clone()).cache_identity(&self.config.vary_headers);
        match self.lookup_current(&shell_key).await {
            Some(entry) => {
                tracing::debug!(request = %request.label(), %shell, "origin unreachable; serving shell");
                Ok(WorkerResponse::from_entry(entry, ResponseSource::Shell))
            }
            None => Err(err),
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
    async fn test_online_route_served_from_network() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/dashboard", 200, "dashboard page");
        let ctx = test_context(origin.clone()).await;
        ctx.register().await.unwrap();

        let request = ctx.request("GET", "/dashboard", BTreeMap::new(), None).unwrap();
        let response = ctx.handle_fetch(&request).await.unwrap();
        assert_eq!(response.source, ResponseSource::Network);
        assert_eq!(&response.body[..], b"dashboard page");
    }

    #[tokio::test]
    async fn test_offline_route_gets_shell() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/index.html", 200, "<html>shell</html>");
        let ctx = test_context(origin.clone()).await;
        ctx.register().await.unwrap();
        origin.set_offline(true);

        let request = ctx.request("GET", "/dashboard/stats", BTreeMap::new(), None).unwrap();
        let response = ctx.handle_fetch(&request).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.source, ResponseSource::Shell);
        assert_eq!(&response.body[..], b"<html>shell</html>");
    }

    #[tokio::test]
    async fn test_route_responses_are_not_cached() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/share", 200, "share page");
        origin.respond("/index.html", 200, "shell");
        let ctx = test_context(origin.clone()).await;
        ctx.register().await.unwrap();

        let request = ctx.request("GET", "/share", BTreeMap::new(), None).unwrap();
        ctx.handle_fetch(&request).await.unwrap();
        origin.set_offline(true);

        let response = ctx.handle_fetch(&request).await.unwrap();
        assert_eq!(response.source, ResponseSource::Shell);
        assert_eq!(&response.body[..], b"shell");
    }

    #[tokio::test]
    async fn test_offline_without_shell_fails() {
        let origin = Arc::new(ScriptedOrigin::new());
        let ctx = test_context(origin.clone()).await;
        origin.set_offline(true);

        let request = ctx.request("GET", "/lucy", BTreeMap::new(), None).unwrap();
        assert!(matches!(ctx.handle_fetch(&request).await, Err(Error::NetworkUnavailable(_))));
    }
}
