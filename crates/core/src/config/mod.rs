//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (ORDO_SW_*)
//! 2. TOML config file (if ORDO_SW_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::{ConfigError, MAX_SYNC_BACKOFF_MS};

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (ORDO_SW_*)
/// 2. TOML config file (if ORDO_SW_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to SQLite cache database.
    ///
    /// Set via ORDO_SW_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin that intercepted and manifest URLs are resolved against.
    ///
    /// Set via ORDO_SW_ORIGIN_URL environment variable.
    #[serde(default = "default_origin_url")]
    pub origin_url: String,

    /// User-Agent string for origin requests.
    ///
    /// Set via ORDO_SW_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per origin request.
    ///
    /// Set via ORDO_SW_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Origin request timeout in milliseconds. A timed-out fetch counts as a
    /// network failure for fallback purposes.
    ///
    /// Set via ORDO_SW_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Version string of the generation this deployment installs.
    ///
    /// Set via ORDO_SW_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// URLs that must prefetch successfully before the generation is valid.
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// Activate a freshly installed generation without waiting for SKIP_WAITING.
    ///
    /// Set via ORDO_SW_AUTO_ACTIVATE environment variable.
    #[serde(default = "default_true")]
    pub auto_activate: bool,

    /// Path prefix routed NetworkFirst.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Client-side routes served NetworkFirst with the shell as fallback.
    ///
    /// Entries starting with `^` are treated as path regexes, everything else
    /// as a path prefix.
    #[serde(default = "default_dynamic_routes")]
    pub dynamic_routes: Vec<String>,

    /// The single-page application shell document.
    #[serde(default = "default_shell_url")]
    pub shell_url: String,

    /// Request headers that take part in the cache key.
    #[serde(default)]
    pub vary_headers: Vec<String>,

    /// Base delay for sync retry backoff in milliseconds; 0 retries on every
    /// reconnection.
    #[serde(default)]
    pub sync_backoff_base_ms: u64,

    /// Upper bound for the sync retry delay in milliseconds.
    #[serde(default = "default_sync_backoff_max_ms")]
    pub sync_backoff_max_ms: u64,

    /// Drop a sync task after this many failed attempts; 0 never drops.
    #[serde(default)]
    pub sync_max_attempts: u32,

    /// Notification defaults used when a push arrives.
    #[serde(default)]
    pub notification: NotificationConfig,
}

/// Defaults applied to notifications built from push events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_notification_title")]
    pub title: String,
    #[serde(default = "default_notification_body")]
    pub body: String,
    #[serde(default = "default_notification_icon")]
    pub icon: String,
    #[serde(default = "default_notification_badge")]
    pub badge: String,
    #[serde(default = "default_notification_tag")]
    pub tag: String,
    #[serde(default = "default_vibrate")]
    pub vibrate: Vec<u32>,
    /// Window opened when the notification is clicked.
    #[serde(default = "default_click_url")]
    pub click_url: String,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./ordo-sw-cache.sqlite")
}

fn default_origin_url() -> String {
    "http://localhost:8080".into()
}

fn default_user_agent() -> String {
    "ordo-sw/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_cache_version() -> String {
    "ordo-ab-chao-v1.0.0".into()
}

fn default_manifest() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/manifest.json",
        "/icon-72.png",
        "/icon-96.png",
        "/icon-128.png",
        "/icon-144.png",
        "/icon-152.png",
        "/icon-192.png",
        "/icon-384.png",
        "/icon-512.png",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_true() -> bool {
    true
}

fn default_api_prefix() -> String {
    "/api/".into()
}

fn default_dynamic_routes() -> Vec<String> {
    ["/tauros", "/lucy", "/copilot", "/dashboard", "/share"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_shell_url() -> String {
    "/index.html".into()
}

fn default_sync_backoff_max_ms() -> u64 {
    300_000
}

fn default_notification_title() -> String {
    "Ordo ab Chao".into()
}

fn default_notification_body() -> String {
    "New notification from Ordo ab Chao".into()
}

fn default_notification_icon() -> String {
    "/icon-192.png".into()
}

fn default_notification_badge() -> String {
    "/icon-72.png".into()
}

fn default_notification_tag() -> String {
    "ordo-notification".into()
}

fn default_vibrate() -> Vec<u32> {
    vec![200, 100, 200]
}

fn default_click_url() -> String {
    "/".into()
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            title: default_notification_title(),
            body: default_notification_body(),
            icon: default_notification_icon(),
            badge: default_notification_badge(),
            tag: default_notification_tag(),
            vibrate: default_vibrate(),
            click_url: default_click_url(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin_url: default_origin_url(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            cache_version: default_cache_version(),
            manifest: default_manifest(),
            auto_activate: true,
            api_prefix: default_api_prefix(),
            dynamic_routes: default_dynamic_routes(),
            shell_url: default_shell_url(),
            vary_headers: Vec::new(),
            sync_backoff_base_ms: 0,
            sync_backoff_max_ms: default_sync_backoff_max_ms(),
            sync_max_attempts: 0,
            notification: NotificationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed origin URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin_url` is not an absolute URL.
    pub fn origin(&self) -> Result<url::Url, ConfigError> {
        url::Url::parse(&self.origin_url)
            .map_err(|e| ConfigError::Invalid { field: "origin_url".into(), reason: e.to_string() })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `ORDO_SW_`
    /// 2. TOML file from `ORDO_SW_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("ORDO_SW_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("ORDO_SW_")
                .ignore(&["config_file"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
