//! SQLite-backed resource cache and deferred sync storage.
//!
//! This module provides a persistent, generation-aware cache using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Named cache generations with a single current generation
//! - Request-identity keys hashed with SHA-256
//! - Atomic install commits and generation cutover (one transaction each)
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - A durable queue of deferred sync tasks

pub mod connection;
pub mod entries;
pub mod generations;
pub mod hash;
pub mod migrations;
pub mod sync;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CacheEntry;
pub use generations::{Generation, GenerationState};
pub use sync::SyncTask;
