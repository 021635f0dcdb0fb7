//! Cache generation bookkeeping.
//!
//! A generation is a named, versioned set of entries. At most one generation
//! is `active` (current); the schema enforces that with a partial unique index.
//! Install commits and cutovers each run in a single transaction so readers
//! never observe a half-populated or half-deleted state.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::connection::CacheDb;
use super::entries::{CacheEntry, insert_entry};
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{
    self,
    types::{FromSql, FromSqlError, FromSqlResult, ValueRef},
};

/// Lifecycle state of a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum GenerationState {
    Installing,
    Waiting,
    Active,
    Redundant,
}

impl GenerationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationState::Installing => "installing",
            GenerationState::Waiting => "waiting",
            GenerationState::Active => "active",
            GenerationState::Redundant => "redundant",
        }
    }
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "installing" => Ok(GenerationState::Installing),
            "waiting" => Ok(GenerationState::Waiting),
            "active" => Ok(GenerationState::Active),
            "redundant" => Ok(GenerationState::Redundant),
            other => Err(Error::InvalidInput(format!("unknown generation state: {other}"))),
        }
    }
}

impl FromSql for GenerationState {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str()?.parse().map_err(|_| FromSqlError::InvalidType)
    }
}

/// A generation row with its entry count.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Generation {
    pub name: String,
    pub state: GenerationState,
    pub created_at: String,
    pub activated_at: Option<String>,
    pub entry_count: u64,
}

fn state_of(conn: &rusqlite::Connection, name: &str) -> Result<Option<GenerationState>, Error> {
    match conn.query_row("SELECT state FROM generations WHERE name = ?1", params![name], |row| row.get(0)) {
        Ok(state) => Ok(Some(state)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl CacheDb {
    /// Create an empty generation in the `installing` state.
    ///
    /// A leftover non-active generation with the same name (an aborted or
    /// superseded install) is discarded first. Refuses to touch the active one.
    pub async fn create_generation(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                if state_of(&tx, &name)? == Some(GenerationState::Active) {
                    return Err(Error::InvalidInput(format!("generation {name} is already active")));
                }
                tx.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                tx.execute(
                    "INSERT INTO generations (name, state, created_at) VALUES (?1, ?2, ?3)",
                    params![name, GenerationState::Installing.as_str(), created_at],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Store all prefetched entries and move the generation to `waiting`.
    ///
    /// All-or-nothing: either every entry and the state change land, or none do.
    pub async fn commit_install(&self, name: &str, entries: Vec<CacheEntry>) -> Result<(), Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                match state_of(&tx, &name)? {
                    Some(GenerationState::Installing) => {}
                    Some(state) => {
                        return Err(Error::InvalidInput(format!("generation {name} is {state}, not installing")));
                    }
                    None => return Err(Error::InvalidInput(format!("generation {name} does not exist"))),
                }
                for entry in &entries {
                    insert_entry(&tx, &name, entry)?;
                }
                tx.execute(
                    "UPDATE generations SET state = ?2 WHERE name = ?1",
                    params![name, GenerationState::Waiting.as_str()],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Promote a generation to current and delete every other generation.
    ///
    /// Runs as one transaction: stale generations are marked redundant and
    /// deleted (cascading to their entries) before the new one is marked
    /// active. Returns the names of the deleted generations.
    pub async fn activate_generation(&self, name: &str) -> Result<Vec<String>, Error> {
        let name = name.to_string();
        let activated_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let tx = conn.transaction()?;
                match state_of(&tx, &name)? {
                    Some(GenerationState::Waiting) | Some(GenerationState::Active) => {}
                    _ => return Err(Error::NothingToActivate),
                }

                let stale: Vec<String> = {
                    let mut stmt = tx.prepare("SELECT name FROM generations WHERE name != ?1 ORDER BY created_at")?;
                    let rows = stmt.query_map(params![name], |row| row.get(0))?;
                    rows.collect::<Result<_, _>>()?
                };

                tx.execute(
                    "UPDATE generations SET state = ?2 WHERE name != ?1",
                    params![name, GenerationState::Redundant.as_str()],
                )?;
                tx.execute("DELETE FROM generations WHERE name != ?1", params![name])?;
                tx.execute(
                    "UPDATE generations SET state = ?2, activated_at = COALESCE(activated_at, ?3) WHERE name = ?1",
                    params![name, GenerationState::Active.as_str(), activated_at],
                )?;
                tx.commit()?;
                Ok(stale)
            })
            .await
            .map_err(Error::from)
    }

    /// Remove a generation and all its entries.
    ///
    /// Returns false if the generation did not exist.
    pub async fn drop_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Remove every generation. Returns how many were dropped.
    pub async fn drop_all_generations(&self) -> Result<u64, Error> {
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM generations", [])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of all known generations.
    pub async fn generation_names(&self) -> Result<BTreeSet<String>, Error> {
        self.conn
            .call(move |conn| -> Result<BTreeSet<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations")?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                Ok(rows.collect::<Result<_, _>>()?)
            })
            .await
            .map_err(Error::from)
    }

    /// All generations with their state and entry count, oldest first.
    pub async fn list_generations(&self) -> Result<Vec<Generation>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<Generation>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT g.name, g.state, g.created_at, g.activated_at, COUNT(e.key_hash)
                     FROM generations g
                     LEFT JOIN entries e ON e.generation = g.name
                     GROUP BY g.name
                     ORDER BY g.created_at, g.name",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok(Generation {
                        name: row.get(0)?,
                        state: row.get(1)?,
                        created_at: row.get(2)?,
                        activated_at: row.get(3)?,
                        entry_count: row.get::<_, i64>(4)? as u64,
                    })
                })?;
                Ok(rows.collect::<Result<_, _>>()?)
            })
            .await
            .map_err(Error::from)
    }

    /// Name of the current generation, if any.
    pub async fn current_generation(&self) -> Result<Option<String>, Error> {
        self.first_name_in_state(GenerationState::Active).await
    }

    /// Name of the most recently installed generation awaiting activation.
    pub async fn waiting_generation(&self) -> Result<Option<String>, Error> {
        self.first_name_in_state(GenerationState::Waiting).await
    }

    /// State of a named generation.
    pub async fn generation_state(&self, name: &str) -> Result<Option<GenerationState>, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<Option<GenerationState>, Error> { state_of(conn, &name) })
            .await
            .map_err(Error::from)
    }

    async fn first_name_in_state(&self, state: GenerationState) -> Result<Option<String>, Error> {
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let result = conn.query_row(
                    "SELECT name FROM generations WHERE state = ?1 ORDER BY created_at DESC LIMIT 1",
                    params![state.as_str()],
                    |row| row.get(0),
                );
                match result {
                    Ok(name) => Ok(Some(name)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }
}
