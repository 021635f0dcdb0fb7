//! Unified error types for ordo-sw.
//!
//! Every variant renders with a stable upper-case code prefix so callers on the
//! other side of the tool surface can match on it.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Unified error types for the ordo-sw worker.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty URL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// URL could not be parsed or resolved against the origin.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Origin fetch failed or timed out.
    #[error("NETWORK_UNAVAILABLE: {0}")]
    NetworkUnavailable(String),

    /// Origin response exceeded the configured body limit.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// No cache entry and no usable origin response.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// A manifest URL could not be prefetched; the pending install was aborted.
    #[error("MANIFEST_PREFETCH_FAILURE: {url}: {reason}")]
    ManifestPrefetchFailure { url: String, reason: String },

    /// Control message could not be understood.
    #[error("MALFORMED_MESSAGE: {0}")]
    MalformedMessage(String),

    /// A deferred sync task failed and stays queued.
    #[error("SYNC_TASK_FAILURE: {tag}: {reason}")]
    SyncTaskFailure { tag: String, reason: String },

    /// Activation requested while no generation is waiting.
    #[error("NOTHING_TO_ACTIVATE")]
    NothingToActivate,

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),
}

impl Error {
    /// Whether this error came from talking to the origin.
    ///
    /// Strategies only fall back to the cache for these.
    pub fn is_origin_failure(&self) -> bool {
        matches!(self, Error::NetworkUnavailable(_) | Error::FetchTooLarge(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidInput(err.to_string())
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidInput(_) | Error::InvalidUrl(_) => -32602,
            Error::NetworkUnavailable(_) => -32006,
            Error::FetchTooLarge(_) => -32007,
            Error::CacheMiss(_) => -32001,
            Error::ManifestPrefetchFailure { .. } => -32013,
            Error::MalformedMessage(_) => -32014,
            Error::SyncTaskFailure { .. } => -32015,
            Error::NothingToActivate => -32016,
            Error::Database(_) | Error::MigrationFailed(_) => -32002,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
