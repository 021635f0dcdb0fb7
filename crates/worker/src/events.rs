//! Event dispatch.
//!
//! Hosts deliver lifecycle, fetch, sync, message and push events here; each
//! variant maps onto one handler on [`WorkerContext`].

use ordo_core::{Error, SyncTask};
use serde::Serialize;

use crate::context::WorkerContext;
use crate::control::ControlOutcome;
use crate::lifecycle::{ActivationReport, InstallReport};
use crate::push::{ClickAction, Notification};
use crate::request::{InterceptedRequest, WorkerResponse};
use crate::sync::SyncReport;

#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// Install a generation. `None` fields fall back to the configured version and manifest.
    Install { version: Option<String>, manifest: Option<Vec<String>> },
    Activate,
    Fetch(InterceptedRequest),
    /// Queue work for later replay.
    SyncRegister { tag: String, payload: serde_json::Value },
    /// Connectivity is back; drain due sync tasks.
    Sync,
    Message(serde_json::Value),
    Push { data: Option<String> },
    NotificationClick,
}

impl WorkerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WorkerEvent::Install { .. } => "install",
            WorkerEvent::Activate => "activate",
            WorkerEvent::Fetch(_) => "fetch",
            WorkerEvent::SyncRegister { .. } => "sync_register",
            WorkerEvent::Sync => "sync",
            WorkerEvent::Message(_) => "message",
            WorkerEvent::Push { .. } => "push",
            WorkerEvent::NotificationClick => "notification_click",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "result", rename_all = "snake_case")]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivationReport),
    Response(WorkerResponse),
    Queued(SyncTask),
    Synced(SyncReport),
    Message(ControlOutcome),
    Notification(Notification),
    Click(ClickAction),
}

impl WorkerContext {
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome, Error> {
        tracing::debug!(event = event.name(), "dispatching event");

        match event {
            WorkerEvent::Install { version, manifest } => {
                let version = version.unwrap_or_else(|| self.config.cache_version.clone());
                let manifest = manifest.unwrap_or_else(|| self.config.manifest.clone());
                self.install(&version, &manifest).await.map(EventOutcome::Installed)
            }
            WorkerEvent::Activate => self.activate().await.map(EventOutcome::Activated),
            WorkerEvent::Fetch(request) => self.handle_fetch(&request).await.map(EventOutcome::Response),
            WorkerEvent::SyncRegister { tag, payload } => self.enqueue_sync(&tag, &payload).await.map(EventOutcome::Queued),
            WorkerEvent::Sync => self.process_due_syncs().await.map(EventOutcome::Synced),
            WorkerEvent::Message(message) => Ok(EventOutcome::Message(self.handle_message(&message).await)),
            WorkerEvent::Push { data } => Ok(EventOutcome::Notification(self.on_push(data.as_deref()))),
            WorkerEvent::NotificationClick => Ok(EventOutcome::Click(self.on_notification_click())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ResponseSource;
    use crate::testing::{ScriptedOrigin, test_context};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_install_defaults_to_configured_version() {
        let ctx = test_context(Arc::new(ScriptedOrigin::new())).await;
        let outcome = ctx.dispatch(WorkerEvent::Install { version: None, manifest: None }).await.unwrap();
        assert!(matches!(outcome, EventOutcome::Installed(report) if report.version == "v1" && report.entries == 2));
    }

    #[tokio::test]
    async fn test_offline_journey() {
        let origin = Arc::new(ScriptedOrigin::new());
        origin.respond("/api/notes", 200, "[]");
        let ctx = test_context(origin.clone()).await;
        ctx.dispatch(WorkerEvent::Install { version: None, manifest: None }).await.unwrap();

        let api = ctx.request("GET", "/api/notes", BTreeMap::new(), None).unwrap();
        ctx.dispatch(WorkerEvent::Fetch(api.clone())).await.unwrap();
        origin.set_offline(true);

        let EventOutcome::Response(response) = ctx.dispatch(WorkerEvent::Fetch(api)).await.unwrap() else {
            panic!("expected a response");
        };
        assert_eq!(response.source, ResponseSource::Cache);

        let route = ctx.request("GET", "/copilot", BTreeMap::new(), None).unwrap();
        let EventOutcome::Response(shell) = ctx.dispatch(WorkerEvent::Fetch(route)).await.unwrap() else {
            panic!("expected a response");
        };
        assert_eq!(shell.source, ResponseSource::Shell);

        let queued = ctx
            .dispatch(WorkerEvent::SyncRegister { tag: "sync-data".into(), payload: json!({"url": "/api/notes"}) })
            .await
            .unwrap();
        assert!(matches!(queued, EventOutcome::Queued(_)));

        origin.set_offline(false);
        let EventOutcome::Synced(report) = ctx.dispatch(WorkerEvent::Sync).await.unwrap() else {
            panic!("expected a sync report");
        };
        assert_eq!(report.completed.len(), 1);
    }

    #[tokio::test]
    async fn test_message_and_push_never_fail() {
        let ctx = test_context(Arc::new(ScriptedOrigin::new())).await;
        assert!(matches!(
            ctx.dispatch(WorkerEvent::Message(json!(42))).await.unwrap(),
            EventOutcome::Message(ControlOutcome::Ignored { .. })
        ));
        assert!(matches!(
            ctx.dispatch(WorkerEvent::Push { data: None }).await.unwrap(),
            EventOutcome::Notification(_)
        ));
        assert!(matches!(ctx.dispatch(WorkerEvent::NotificationClick).await.unwrap(), EventOutcome::Click(_)));
    }

    #[tokio::test]
    async fn test_activate_event_without_waiting() {
        let ctx = test_context(Arc::new(ScriptedOrigin::new())).await;
        assert!(matches!(ctx.dispatch(WorkerEvent::Activate).await, Err(Error::NothingToActivate)));
    }
}
