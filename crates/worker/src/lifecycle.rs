//! Generation lifecycle: install, activate, clear.
//!
//! ```text
//! Installing ──prefetch ok──▶ Waiting ──activate──▶ Active ──superseded──▶ Redundant
//!      │
//!      └──prefetch failed──▶ discarded
//! ```
//!
//! Install is all-or-nothing: every manifest URL must come back 2xx before the
//! entries are committed in one transaction. Activation swaps the current
//! generation and deletes the rest in one transaction, so readers see either
//! the old generation or the new one and never a mix.

use futures::future::try_join_all;
use ordo_client::{OriginRequest, UrlError, canonicalize};
use ordo_core::{CacheEntry, Error, Generation, GenerationState};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::context::WorkerContext;

/// Result of an install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InstallReport {
    pub version: String,
    /// Entries committed by this install (0 when already active).
    pub entries: usize,
    pub state: GenerationState,
    /// Generations deleted by the activation that followed, if any.
    pub removed: Vec<String>,
}

/// Result of an activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActivationReport {
    pub activated: String,
    pub removed: Vec<String>,
}

/// Snapshot of the worker's generations.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerStatus {
    pub current: Option<String>,
    pub waiting: Option<String>,
    pub generations: Vec<Generation>,
    pub pending_sync_tasks: usize,
}

impl WorkerContext {
    /// Install the configured cache version with the configured manifest.
    pub async fn register(&self) -> Result<InstallReport, Error> {
        let version = self.config.cache_version.clone();
        let manifest = self.config.manifest.clone();
        self.install(&version, &manifest).await
    }

    /// Prefetch `manifest` into a new generation named `version`.
    ///
    /// With `auto_activate` set the new generation is promoted right away.
    /// Installing the version that is already current does nothing.
    pub async fn install(&self, version: &str, manifest: &[String]) -> Result<InstallReport, Error> {
        let version = version.trim();
        if version.is_empty() {
            return Err(Error::InvalidInput("version cannot be empty".into()));
        }

        let _guard = self.lifecycle_lock.lock().await;

        if self.store.generation_state(version).await? == Some(GenerationState::Active) {
            tracing::info!(version, "generation already active; install skipped");
            return Ok(InstallReport {
                version: version.to_string(),
                entries: 0,
                state: GenerationState::Active,
                removed: Vec::new(),
            });
        }

        self.store.create_generation(version).await?;
        tracing::info!(version, urls = manifest.len(), state = %GenerationState::Installing, "installing generation");

        let committed = match self.prefetch_manifest(manifest).await {
            Ok(entries) => {
                let count = entries.len();
                self.store.commit_install(version, entries).await.map(|_| count)
            }
            Err(e) => Err(e),
        };
        let entries = match committed {
            Ok(count) => count,
            Err(e) => {
                tracing::warn!(version, error = %e, "install failed; discarding generation");
                if let Err(drop_err) = self.store.drop_generation(version).await {
                    tracing::warn!(version, error = %drop_err, "could not discard failed generation");
                }
                return Err(e);
            }
        };
        tracing::info!(version, entries, state = %GenerationState::Waiting, "generation installed");

        if !self.config.auto_activate {
            return Ok(InstallReport { version: version.to_string(), entries, state: GenerationState::Waiting, removed: Vec::new() });
        }

        let activation = self.activate_locked(version).await?;
        Ok(InstallReport { version: version.to_string(), entries, state: GenerationState::Active, removed: activation.removed })
    }

    /// Promote the most recent waiting generation.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        let _guard = self.lifecycle_lock.lock().await;
        let waiting = self.store.waiting_generation().await?.ok_or(Error::NothingToActivate)?;
        self.activate_locked(&waiting).await
    }

    /// Like [`activate`](Self::activate), but having nothing waiting is not an error.
    pub async fn skip_waiting(&self) -> Result<Option<ActivationReport>, Error> {
        match self.activate().await {
            Ok(report) => Ok(Some(report)),
            Err(Error::NothingToActivate) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete every generation. Requests go to the origin until the next install.
    pub async fn clear_all(&self) -> Result<u64, Error> {
        let _guard = self.lifecycle_lock.lock().await;
        let dropped = self.store.drop_all_generations().await?;
        tracing::info!(generations = dropped, "cache cleared");
        Ok(dropped)
    }

    pub async fn status(&self) -> Result<WorkerStatus, Error> {
        let generations = self.store.list_generations().await?;
        let current = generations.iter().find(|g| g.state == GenerationState::Active).map(|g| g.name.clone());
        let waiting = self.store.waiting_generation().await?;
        let pending_sync_tasks = self.store.list_sync_tasks().await?.len();
        Ok(WorkerStatus { current, waiting, generations, pending_sync_tasks })
    }

    /// Caller must hold `lifecycle_lock`.
    async fn activate_locked(&self, version: &str) -> Result<ActivationReport, Error> {
        let removed = self.store.activate_generation(version).await?;
        for name in &removed {
            tracing::info!(generation = %name, state = %GenerationState::Redundant, "generation superseded and deleted");
        }
        tracing::info!(version, state = %GenerationState::Active, "generation activated");
        Ok(ActivationReport { activated: version.to_string(), removed })
    }

    /// Fetch every manifest URL concurrently. The first failure aborts the lot.
    async fn prefetch_manifest(&self, manifest: &[String]) -> Result<Vec<CacheEntry>, Error> {
        let fetches = manifest.iter().map(|raw| async move {
            let url = canonicalize(raw, self.origin_base()).map_err(|e| Error::ManifestPrefetchFailure {
                url: raw.clone(),
                reason: match e {
                    UrlError::Empty => "empty URL".to_string(),
                    other => other.to_string(),
                },
            })?;

            let response = self
                .fetch_origin(&OriginRequest::get(url.clone()))
                .await
                .map_err(|e| Error::ManifestPrefetchFailure { url: url.to_string(), reason: e.to_string() })?;

            if !response.is_success() {
                return Err(Error::ManifestPrefetchFailure {
                    url: url.to_string(),
                    reason: format!("status {}", response.status.as_u16()),
                });
            }

            Ok(CacheEntry::new(
                "GET",
                url.as_str(),
                "",
                response.status.as_u16(),
                response.header_pairs(),
                response.bytes.to_vec(),
            ))
        });

        try_join_all(fetches).await
    }
}
