//! Deferred sync task storage.
//!
//! Tasks are queued while offline and replayed when connectivity returns.
//! Storage only; retry policy lives with the queue in the worker.

use super::connection::CacheDb;
use crate::Error;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, types::Type};

/// A queued background task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SyncTask {
    pub id: i64,
    pub tag: String,
    pub payload: serde_json::Value,
    pub attempts: u32,
    pub created_at: String,
    pub next_attempt_at: Option<String>,
    pub last_error: Option<String>,
}

/// Timestamp format used for due-time comparisons (fixed width, UTC).
pub fn sync_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

const TASK_COLUMNS: &str = "id, tag, payload_json, attempts, created_at, next_attempt_at, last_error";

fn task_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncTask> {
    let payload_json: String = row.get(2)?;
    let payload = serde_json::from_str(&payload_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;
    Ok(SyncTask {
        id: row.get(0)?,
        tag: row.get(1)?,
        payload,
        attempts: row.get(3)?,
        created_at: row.get(4)?,
        next_attempt_at: row.get(5)?,
        last_error: row.get(6)?,
    })
}

impl CacheDb {
    /// Queue a task for the next connectivity restoration.
    pub async fn enqueue_sync_task(&self, tag: &str, payload: &serde_json::Value) -> Result<SyncTask, Error> {
        let tag = tag.to_string();
        let payload_json = serde_json::to_string(payload)?;
        let created_at = sync_timestamp(Utc::now());
        self.conn
            .call(move |conn| -> Result<SyncTask, Error> {
                conn.execute(
                    "INSERT INTO sync_tasks (tag, payload_json, attempts, created_at) VALUES (?1, ?2, 0, ?3)",
                    params![tag, payload_json, created_at],
                )?;
                let id = conn.last_insert_rowid();
                let task = conn.query_row(
                    &format!("SELECT {TASK_COLUMNS} FROM sync_tasks WHERE id = ?1"),
                    params![id],
                    task_from_row,
                )?;
                Ok(task)
            })
            .await
            .map_err(Error::from)
    }

    /// Tasks whose next attempt is due at `now`, in queue order.
    pub async fn due_sync_tasks(&self, now: DateTime<Utc>) -> Result<Vec<SyncTask>, Error> {
        let now = sync_timestamp(now);
        self.conn
            .call(move |conn| -> Result<Vec<SyncTask>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {TASK_COLUMNS} FROM sync_tasks
                     WHERE next_attempt_at IS NULL OR next_attempt_at <= ?1
                     ORDER BY id"
                ))?;
                let rows = stmt.query_map(params![now], task_from_row)?;
                Ok(rows.collect::<Result<_, _>>()?)
            })
            .await
            .map_err(Error::from)
    }

    /// Every queued task, in queue order.
    pub async fn list_sync_tasks(&self) -> Result<Vec<SyncTask>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<SyncTask>, Error> {
                let mut stmt = conn.prepare(&format!("SELECT {TASK_COLUMNS} FROM sync_tasks ORDER BY id"))?;
                let rows = stmt.query_map([], task_from_row)?;
                Ok(rows.collect::<Result<_, _>>()?)
            })
            .await
            .map_err(Error::from)
    }

    /// Remove a task (completed or given up on).
    ///
    /// Returns false if the task was already gone.
    pub async fn remove_sync_task(&self, id: i64) -> Result<bool, Error> {
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM sync_tasks WHERE id = ?1", params![id])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Record a failed attempt and schedule the next one.
    ///
    /// `next_attempt_at = None` makes the task due on the next run.
    pub async fn record_sync_failure(
        &self, id: i64, error: &str, next_attempt_at: Option<DateTime<Utc>>,
    ) -> Result<(), Error> {
        let error = error.to_string();
        let next_attempt_at = next_attempt_at.map(sync_timestamp);
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "UPDATE sync_tasks
                     SET attempts = attempts + 1, last_error = ?2, next_attempt_at = ?3
                     WHERE id = ?1",
                    params![id, error, next_attempt_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }
}
