//! Deferred sync queue.
//!
//! Work that needs the network is queued under a tag and replayed when
//! connectivity returns. Tasks live in the cache database so they survive a
//! restart. A failed task stays queued; with `sync_backoff_base_ms` set its
//! next attempt is pushed back exponentially, and with `sync_max_attempts`
//! set it is dropped once the limit is reached.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use ordo_core::{AppConfig, Error, MAX_SYNC_BACKOFF_MS, SyncTask};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::context::WorkerContext;

/// Tag replayed by the built-in request handler.
pub const SYNC_DATA_TAG: &str = "sync-data";

/// Runs queued tasks for one tag.
#[async_trait]
pub trait SyncHandler: Send + Sync {
    async fn run(&self, ctx: &WorkerContext, task: &SyncTask) -> Result<(), Error>;
}

/// A request captured while offline.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeferredRequest {
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "POST".into()
}

/// Replays a [`DeferredRequest`] against the origin; only 2xx counts as done.
pub struct ReplayRequestHandler;

#[async_trait]
impl SyncHandler for ReplayRequestHandler {
    async fn run(&self, ctx: &WorkerContext, task: &SyncTask) -> Result<(), Error> {
        let deferred: DeferredRequest = serde_json::from_value(task.payload.clone())?;
        let request = ctx.request(&deferred.method, &deferred.url, deferred.headers, deferred.body.map(Bytes::from))?;

        let response = ctx.fetch_origin(&request.to_origin_request()).await?;
        if !response.is_success() {
            return Err(Error::SyncTaskFailure {
                tag: task.tag.clone(),
                reason: format!("{} returned {}", request.label(), response.status.as_u16()),
            });
        }

        tracing::debug!(id = task.id, request = %request.label(), "deferred request replayed");
        Ok(())
    }
}

/// Handler registry plus a guard so only one drain runs at a time.
pub struct SyncQueue {
    handlers: HashMap<String, Arc<dyn SyncHandler>>,
    running: Mutex<()>,
}

impl SyncQueue {
    /// A queue with no handlers; every task fails until one is registered.
    pub fn empty() -> Self {
        Self { handlers: HashMap::new(), running: Mutex::new(()) }
    }

    pub fn register(mut self, tag: &str, handler: Arc<dyn SyncHandler>) -> Self {
        self.handlers.insert(tag.to_string(), handler);
        self
    }

    fn handler(&self, tag: &str) -> Option<Arc<dyn SyncHandler>> {
        self.handlers.get(tag).cloned()
    }
}

impl Default for SyncQueue {
    fn default() -> Self {
        Self::empty().register(SYNC_DATA_TAG, Arc::new(ReplayRequestHandler))
    }
}

/// Outcome of draining the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SyncReport {
    pub completed: Vec<i64>,
    pub failed: Vec<i64>,
    /// Tasks removed after reaching `sync_max_attempts`.
    pub dropped: Vec<i64>,
    pub remaining: usize,
}

/// When a task that has failed `attempts` times should next run.
///
/// `None` means "on the next drain". The delay never exceeds
/// [`MAX_SYNC_BACKOFF_MS`], even for configs that skipped validation.
fn next_attempt_at(config: &AppConfig, attempts: u32, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if config.sync_backoff_base_ms == 0 {
        return None;
    }
    let exponent = attempts.saturating_sub(1).min(20);
    let delay_ms = config
        .sync_backoff_base_ms
        .saturating_mul(1u64 << exponent)
        .min(config.sync_backoff_max_ms)
        .min(MAX_SYNC_BACKOFF_MS);
    let delay = i64::try_from(delay_ms).ok().and_then(chrono::Duration::try_milliseconds);
    Some(delay.and_then(|delay| now.checked_add_signed(delay)).unwrap_or(now))
}

impl WorkerContext {
    /// Queue work under `tag` for the next connectivity-restored event.
    pub async fn enqueue_sync(&self, tag: &str, payload: &serde_json::Value) -> Result<SyncTask, Error> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(Error::InvalidInput("sync tag cannot be empty".into()));
        }
        if self.sync.handler(tag).is_none() {
            tracing::warn!(tag, "no handler registered for sync tag; task will fail until one is");
        }

        let task = self.store.enqueue_sync_task(tag, payload).await?;
        tracing::info!(id = task.id, tag, "sync task queued");
        Ok(task)
    }

    /// Run every due task once, in queue order.
    pub async fn process_due_syncs(&self) -> Result<SyncReport, Error> {
        let _running = self.sync.running.lock().await;
        let now = Utc::now();
        let due = self.store.due_sync_tasks(now).await?;
        let mut report = SyncReport::default();

        for task in due {
            let outcome = match self.sync.handler(&task.tag) {
                Some(handler) => handler.run(self, &task).await,
                None => Err(Error::SyncTaskFailure { tag: task.tag.clone(), reason: "no handler registered".into() }),
            };

            match outcome {
                Ok(()) => {
                    self.store.remove_sync_task(task.id).await?;
                    report.completed.push(task.id);
                }
                Err(e) => {
                    let attempts = task.attempts.saturating_add(1);
                    let limit = self.config.sync_max_attempts;
                    if limit > 0 && attempts >= limit {
                        tracing::warn!(id = task.id, tag = %task.tag, attempts, error = %e, "sync task dropped");
                        self.store.remove_sync_task(task.id).await?;
                        report.dropped.push(task.id);
                    } else {
                        tracing::warn!(id = task.id, tag = %task.tag, attempts, error = %e, "sync task failed; kept");
                        let retry_at = next_attempt_at(&self.config, attempts, now);
                        self.store.record_sync_failure(task.id, &e.to_string(), retry_at).await?;
                        report.failed.push(task.id);
                    }
                }
            }
        }

        report.remaining = self.store.list_sync_tasks().await?.len();
        tracing::info!(
            completed = report.completed.len(),
            failed = report.failed.len(),
            dropped = report.dropped.len(),
            remaining = report.remaining,
            "sync run finished"
        );
        Ok(report)
    }
}
