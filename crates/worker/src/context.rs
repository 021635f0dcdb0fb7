//! Shared worker state.
//!
//! One `WorkerContext` owns the cache store, the origin client, the policy
//! router and the background task tracker. Every event handler borrows it;
//! behavior for each event lives in its own module (`strategy`, `lifecycle`,
//! `sync`, `control`, `push`) as an `impl WorkerContext` block.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use ordo_client::{FetchClient, FetchConfig, Origin};
use ordo_core::{AppConfig, CacheDb, Error};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use url::Url;

use crate::request::InterceptedRequest;
use crate::router::PolicyRouter;
use crate::sync::SyncQueue;

pub struct WorkerContext {
    pub config: AppConfig,
    pub store: CacheDb,
    pub origin: Arc<dyn Origin>,
    pub router: PolicyRouter,
    pub sync: SyncQueue,
    origin_base: Url,
    /// Serializes install, activate and clear.
    pub(crate) lifecycle_lock: Mutex<()>,
    tasks: TaskTracker,
}

impl WorkerContext {
    /// Open the configured store and build an HTTP origin client.
    pub async fn init(config: AppConfig) -> Result<Arc<Self>, Error> {
        if let Some(parent) = config.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::InvalidInput(format!("cannot create {}: {e}", parent.display())))?;
        }
        let store = CacheDb::open(&config.db_path).await?;

        let origin = FetchClient::new(FetchConfig {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        })?;

        Self::new(config, store, Arc::new(origin), SyncQueue::default())
    }

    /// Assemble a context from already-built parts.
    pub fn new(config: AppConfig, store: CacheDb, origin: Arc<dyn Origin>, sync: SyncQueue) -> Result<Arc<Self>, Error> {
        let origin_base = config.origin().map_err(|e| Error::InvalidInput(e.to_string()))?;
        let router = PolicyRouter::from_config(&config)?;

        Ok(Arc::new(Self {
            config,
            store,
            origin,
            router,
            sync,
            origin_base,
            lifecycle_lock: Mutex::new(()),
            tasks: TaskTracker::new(),
        }))
    }

    /// Base URL that relative request URLs resolve against.
    pub fn origin_base(&self) -> &Url {
        &self.origin_base
    }

    /// Normalize a raw request against the configured origin.
    pub fn request(
        &self, method: &str, url: &str, headers: BTreeMap<String, String>, body: Option<Bytes>,
    ) -> Result<InterceptedRequest, Error> {
        InterceptedRequest::parse(method, url, headers, body, &self.origin_base)
    }

    /// Run a task that must outlive the caller that started it.
    pub(crate) fn spawn<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tasks.spawn(task)
    }

    /// Wait for every background task started so far.
    #[cfg(test)]
    pub(crate) async fn drain_background(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    /// Let in-flight cache writes and revalidations finish.
    pub async fn shutdown(&self) {
        tracing::info!(pending = self.tasks.len(), "waiting for background tasks");
        self.tasks.close();
        self.tasks.wait().await;
    }
}
