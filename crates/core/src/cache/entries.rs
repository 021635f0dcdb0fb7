//! Cache entry CRUD operations.
//!
//! Entries are keyed by `(generation, key_hash)` and owned by their
//! generation: dropping a generation cascades to its entries.

use std::collections::BTreeMap;

use super::connection::CacheDb;
use super::hash::compute_cache_key;
use crate::Error;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, types::Type};

/// A stored response snapshot for one request identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key_hash: String,
    pub method: String,
    pub url: String,
    pub vary: String,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
    pub stored_at: String,
}

impl CacheEntry {
    /// Build an entry for a response, deriving the key from the request identity.
    pub fn new(
        method: &str, url: &str, vary: &str, status: u16, headers: BTreeMap<String, String>, body: Vec<u8>,
    ) -> Self {
        Self {
            key_hash: compute_cache_key(method, url, vary),
            method: method.to_ascii_uppercase(),
            url: url.to_string(),
            vary: vary.to_string(),
            status,
            headers,
            body,
            stored_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

const ENTRY_COLUMNS: &str = "key_hash, method, url, vary, status, headers_json, body, stored_at";

const UPSERT_CONFLICT: &str = "ON CONFLICT(generation, key_hash) DO UPDATE SET
    method = excluded.method,
    url = excluded.url,
    vary = excluded.vary,
    status = excluded.status,
    headers_json = excluded.headers_json,
    body = excluded.body,
    stored_at = excluded.stored_at";

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CacheEntry> {
    let headers_json: String = row.get(5)?;
    let headers = serde_json::from_str(&headers_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;
    Ok(CacheEntry {
        key_hash: row.get(0)?,
        method: row.get(1)?,
        url: row.get(2)?,
        vary: row.get(3)?,
        status: row.get(4)?,
        headers,
        body: row.get(6)?,
        stored_at: row.get(7)?,
    })
}

fn headers_to_json(entry: &CacheEntry) -> Result<String, Error> {
    serde_json::to_string(&entry.headers).map_err(Error::from)
}

/// Upsert one entry into a named generation.
///
/// Shared by single puts and the install commit transaction.
pub(crate) fn insert_entry(conn: &rusqlite::Connection, generation: &str, entry: &CacheEntry) -> Result<(), Error> {
    let headers_json = headers_to_json(entry)?;
    conn.execute(
        &format!(
            "INSERT INTO entries (generation, {ENTRY_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             {UPSERT_CONFLICT}"
        ),
        params![
            generation,
            &entry.key_hash,
            &entry.method,
            &entry.url,
            &entry.vary,
            entry.status,
            headers_json,
            &entry.body,
            &entry.stored_at,
        ],
    )?;
    Ok(())
}

impl CacheDb {
    /// Get an entry from a named generation.
    ///
    /// Returns None if the generation or the key doesn't exist.
    pub async fn get_entry(&self, generation: &str, key_hash: &str) -> Result<Option<CacheEntry>, Error> {
        let generation = generation.to_string();
        let key_hash = key_hash.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries WHERE generation = ?1 AND key_hash = ?2"
                ))?;

                match stmt.query_row(params![generation, key_hash], entry_from_row) {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Get an entry from whichever generation is current.
    ///
    /// The current generation is resolved inside the same statement, so the
    /// read sees either the state before a cutover or the state after it.
    pub async fn get_current_entry(&self, key_hash: &str) -> Result<Option<CacheEntry>, Error> {
        let key_hash = key_hash.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CacheEntry>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT e.key_hash, e.method, e.url, e.vary, e.status, e.headers_json, e.body, e.stored_at
                     FROM entries e
                     JOIN generations g ON g.name = e.generation
                     WHERE g.state = 'active' AND e.key_hash = ?1",
                )?;

                match stmt.query_row(params![key_hash], entry_from_row) {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace an entry in a named generation.
    ///
    /// A single UPSERT statement, so concurrent readers see either the old or
    /// the new entry.
    pub async fn put_entry(&self, generation: &str, entry: &CacheEntry) -> Result<(), Error> {
        let generation = generation.to_string();
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> { insert_entry(conn, &generation, &entry) })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace an entry in the current generation.
    ///
    /// Returns false when no generation is current and nothing was stored.
    pub async fn put_current_entry(&self, entry: &CacheEntry) -> Result<bool, Error> {
        let entry = entry.clone();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let headers_json = headers_to_json(&entry)?;
                let count = conn.execute(
                    &format!(
                        "INSERT INTO entries (generation, {ENTRY_COLUMNS})
                         SELECT name, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8
                         FROM generations WHERE state = 'active'
                         {UPSERT_CONFLICT}"
                    ),
                    params![
                        &entry.key_hash,
                        &entry.method,
                        &entry.url,
                        &entry.vary,
                        entry.status,
                        headers_json,
                        &entry.body,
                        &entry.stored_at,
                    ],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete entries of a generation whose URL matches a GLOB pattern.
    ///
    /// Returns the number of deleted entries.
    pub async fn delete_entries(&self, generation: &str, url_glob: &str) -> Result<u64, Error> {
        let generation = generation.to_string();
        let url_glob = url_glob.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute(
                    "DELETE FROM entries WHERE generation = ?1 AND url GLOB ?2",
                    params![generation, url_glob],
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Count the entries owned by a generation.
    pub async fn count_entries(&self, generation: &str) -> Result<u64, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE generation = ?1", params![generation], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
