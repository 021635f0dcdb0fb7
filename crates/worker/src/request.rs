//! Intercepted requests and the responses handed back to the caller.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use ordo_client::header::{HeaderMap, HeaderName, HeaderValue};
use ordo_client::{FetchResponse, Method, OriginRequest, UrlError, canonicalize};
use ordo_core::cache::hash::{compute_cache_key, vary_string};
use ordo_core::{CacheEntry, Error};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize, Serializer};
use url::Url;

/// Headers that describe the connection rather than the resource.
const HOP_BY_HOP: &[&str] = &["host", "connection", "content-length", "transfer-encoding", "keep-alive", "upgrade"];

/// A request captured from the front-end, with its URL normalized.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Bytes>,
}

impl InterceptedRequest {
    /// Parse and normalize a raw (method, URL, headers) tuple.
    ///
    /// Relative URLs resolve against `base`, the configured origin.
    pub fn parse(
        method: &str, url: &str, headers: BTreeMap<String, String>, body: Option<Bytes>, base: &Url,
    ) -> Result<Self, Error> {
        let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| Error::InvalidInput(format!("invalid method: {method}")))?;
        let url = canonicalize(url, base).map_err(|e| match e {
            UrlError::Empty => Error::InvalidInput("url cannot be empty".into()),
            other => Error::InvalidUrl(other.to_string()),
        })?;
        let headers = headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();
        Ok(Self { method, url, headers, body })
    }

    /// A header-less GET, as issued for manifest and shell lookups.
    pub fn get(url: Url) -> Self {
        Self { method: Method::GET, url, headers: BTreeMap::new(), body: None }
    }

    /// The request identity: `(key_hash, vary)`.
    pub fn cache_identity(&self, vary_on: &[String]) -> (String, String) {
        let vary = vary_string(self.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())), vary_on);
        let key = compute_cache_key(self.method.as_str(), self.url.as_str(), &vary);
        (key, vary)
    }

    /// Identity of the same request with no vary headers, as manifest entries are keyed.
    pub fn base_identity(&self) -> String {
        compute_cache_key(self.method.as_str(), self.url.as_str(), "")
    }

    /// Snapshot an origin response under this request's identity.
    pub fn entry_for(&self, vary: &str, response: &FetchResponse) -> CacheEntry {
        CacheEntry::new(
            self.method.as_str(),
            self.url.as_str(),
            vary,
            response.status.as_u16(),
            response.header_pairs(),
            response.bytes.to_vec(),
        )
    }

    /// The request as forwarded to the origin, without hop-by-hop headers.
    pub fn to_origin_request(&self) -> OriginRequest {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            if HOP_BY_HOP.contains(&name.as_str()) {
                continue;
            }
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => tracing::debug!(header = %name, "dropping unrepresentable request header"),
            }
        }
        OriginRequest { method: self.method.clone(), url: self.url.clone(), headers, body: self.body.clone() }
    }

    /// Short `METHOD url` label for logs and errors.
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.url)
    }
}

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
    /// The cached shell document served in place of an unreachable route.
    Shell,
}

/// The (status, headers, body) triple returned to the intercepted caller.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
    pub source: ResponseSource,
}

impl WorkerResponse {
    pub fn from_fetch(response: FetchResponse) -> Self {
        let headers = response.header_pairs();
        Self { status: response.status.as_u16(), headers, body: response.bytes, source: ResponseSource::Network }
    }

    pub fn from_entry(entry: CacheEntry, source: ResponseSource) -> Self {
        Self { status: entry.status, headers: entry.headers, body: Bytes::from(entry.body), source }
    }
}

/// Body as `(text, base64)`: UTF-8 bodies come back as text, anything else as base64.
pub fn encode_body(body: &[u8]) -> (Option<String>, Option<String>) {
    match std::str::from_utf8(body) {
        Ok(text) => (Some(text.to_string()), None),
        Err(_) => (None, Some(STANDARD.encode(body))),
    }
}

#[derive(Serialize)]
struct ResponseView<'a> {
    status: u16,
    source: ResponseSource,
    headers: &'a BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body_base64: Option<String>,
}

impl Serialize for WorkerResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (body, body_base64) = encode_body(&self.body);
        ResponseView { status: self.status, source: self.source, headers: &self.headers, body, body_base64 }
            .serialize(serializer)
    }
}
