//! Core types and shared functionality for ordo-sw.
//!
//! This crate provides:
//! - Generation-aware resource cache with SQLite backend
//! - Persistent deferred sync queue storage
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheEntry, Generation, GenerationState, SyncTask};
pub use config::{AppConfig, ConfigError, MAX_SYNC_BACKOFF_MS};
pub use error::Error;
