//! Request-identity cache key generation.

use sha2::{Digest, Sha256};

/// Compute the cache key for a request identity.
///
/// `url` must already be normalized; `vary` is the canonical rendering of the
/// request headers that take part in the key (see [`vary_string`]).
pub fn compute_cache_key(method: &str, url: &str, vary: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_bytes());
    hasher.update(b"\n");
    hasher.update(vary.as_bytes());
    hex::encode(hasher.finalize())
}

/// Render the varying request headers as sorted `name=value` lines.
///
/// Only headers named in `vary_on` are kept; names compare case-insensitively.
pub fn vary_string<'a>(headers: impl IntoIterator<Item = (&'a str, &'a str)>, vary_on: &[String]) -> String {
    let mut pairs: Vec<(String, &str)> = headers
        .into_iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim()))
        .filter(|(name, _)| vary_on.iter().any(|v| v.eq_ignore_ascii_case(name)))
        .collect();
    pairs.sort();
    pairs
        .into_iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("\n")
}
