//! Cache inspection tools.
//!
//! These read and prune the store directly, bypassing the strategies.

pub mod get;
pub mod purge;

pub use get::{CacheGetParams, get_impl};
pub use purge::{CachePurgeParams, purge_impl};

use ordo_core::{CacheDb, Error};

/// The named generation, or the current one.
pub(crate) async fn resolve_generation(store: &CacheDb, generation: Option<String>) -> Result<String, Error> {
    match generation {
        Some(name) => Ok(name),
        None => store
            .current_generation()
            .await?
            .ok_or_else(|| Error::InvalidInput("no current generation".into())),
    }
}
