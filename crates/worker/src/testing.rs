//! Scripted origin and context builders shared by the worker's tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use ordo_client::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use ordo_client::{FetchResponse, Origin, OriginRequest, StatusCode};
use ordo_core::{AppConfig, CacheDb, Error};

use crate::context::WorkerContext;
use crate::sync::SyncQueue;

#[derive(Clone)]
enum Reply {
    Respond { status: u16, body: Bytes },
    Fail,
    Hang,
}

/// In-memory origin keyed by path (plus query).
///
/// `/` and `/index.html` answer 200 out of the box so the default test
/// manifest installs. Unknown paths answer 404.
pub struct ScriptedOrigin {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<(String, String)>>,
    offline: AtomicBool,
}

impl ScriptedOrigin {
    pub fn new() -> Self {
        let origin = Self { replies: Mutex::new(HashMap::new()), calls: Mutex::new(Vec::new()), offline: AtomicBool::new(false) };
        origin.respond("/", 200, "<html>home</html>");
        origin.respond("/index.html", 200, "<html>shell</html>");
        origin
    }

    pub fn respond(&self, path: &str, status: u16, body: &str) {
        let reply = Reply::Respond { status, body: Bytes::from(body.to_string()) };
        self.replies.lock().unwrap().insert(path.to_string(), reply);
    }

    pub fn fail(&self, path: &str) {
        self.replies.lock().unwrap().insert(path.to_string(), Reply::Fail);
    }

    pub fn hang(&self, path: &str) {
        self.replies.lock().unwrap().insert(path.to_string(), Reply::Hang);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// `(method, path)` of every request seen so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Origin for ScriptedOrigin {
    async fn fetch(&self, request: &OriginRequest) -> Result<FetchResponse, Error> {
        let mut path = request.url.path().to_string();
        if let Some(query) = request.url.query() {
            path = format!("{path}?{query}");
        }
        self.calls.lock().unwrap().push((request.method.to_string(), path.clone()));

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::NetworkUnavailable(format!("offline: {path}")));
        }

        let reply = self.replies.lock().unwrap().get(&path).cloned();
        let (status, body) = match reply {
            Some(Reply::Respond { status, body }) => (status, body),
            Some(Reply::Fail) => return Err(Error::NetworkUnavailable(format!("connection reset: {path}"))),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                return Err(Error::NetworkUnavailable(format!("hung: {path}")));
            }
            None => (404, Bytes::from_static(b"not found")),
        };

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        Ok(FetchResponse {
            url: request.url.clone(),
            final_url: request.url.clone(),
            status: StatusCode::from_u16(status).unwrap(),
            content_type: Some("text/plain".to_string()),
            bytes: body,
            headers,
            fetch_ms: 0,
        })
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        origin_url: "https://app.test".into(),
        timeout_ms: 200,
        cache_version: "v1".into(),
        manifest: vec!["/".into(), "/index.html".into()],
        ..Default::default()
    }
}

pub async fn test_context(origin: Arc<ScriptedOrigin>) -> Arc<WorkerContext> {
    test_context_with(test_config(), origin).await
}

pub async fn test_context_with(config: AppConfig, origin: Arc<ScriptedOrigin>) -> Arc<WorkerContext> {
    test_context_full(config, origin, SyncQueue::default()).await
}

pub async fn test_context_full(config: AppConfig, origin: Arc<ScriptedOrigin>, sync: SyncQueue) -> Arc<WorkerContext> {
    let store = CacheDb::open_in_memory().await.unwrap();
    WorkerContext::new(config, store, origin, sync).unwrap()
}
