//! Configuration data structures for llm-router.
//!
//! This module defines the schema for the application settings: the cache
//! backend and its TTL, the usage ledger paths, and logging output.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use serde::{Deserialize, Serialize};

/// Longest accepted cache TTL: one hundred years.
pub const MAX_TTL_SECONDS: u64 = 100 * 365 * 24 * 60 * 60;

/// The root configuration object for the application.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Response cache settings (backend, TTL, locations).
    #[serde(default)]
    pub cache: CacheSettings,

    /// Per-call log and daily rollup locations.
    #[serde(default)]
    pub usage: UsageConfig,

    /// Logging and observability settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which storage backend the response cache should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Networked key-value service (Redis).
    Remote,
    /// In-process table mirrored to a file on disk.
    #[default]
    Local,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Remote => "remote",
            BackendKind::Local => "local",
        }
    }
}

/// Settings for the response cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Backend selector.
    /// Default: `local`
    #[serde(default)]
    pub backend: BackendKind,

    /// Lifetime of every entry written by this cache instance, in seconds.
    /// `0` disables time-based expiry. At most [`MAX_TTL_SECONDS`].
    /// Default: `86400` (one day)
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,

    /// Connection URL for the remote backend, e.g. `redis://127.0.0.1:6379/0`.
    /// Only consulted when `backend = "remote"`.
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Durable file for the local backend. `None` keeps the cache in memory only.
    /// Default: `~/.llm-router/cache.json`
    #[serde(default = "default_cache_path")]
    pub local_path: Option<String>,

    /// Connect timeout for the remote backend in milliseconds.
    /// Default: `2000`
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Tag mixed into every cache key; bump it to invalidate old entries.
    /// Default: `v1`
    #[serde(default = "default_version_tag")]
    pub version_tag: String,
}

/// Settings for usage accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageConfig {
    /// Append-only JSON Lines log, one record per call.
    /// Default: `~/.llm-router/logs/calls.jsonl`
    #[serde(default = "default_per_call_path")]
    pub per_call_path: String,

    /// Daily rollup document.
    /// Default: `~/.llm-router/logs/daily.json`
    #[serde(default = "default_daily_path")]
    pub daily_path: String,
}

/// Settings for application logging and output format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum log level (`trace`, `debug`, `info`, `warn`, `error`).
    /// Default: `info`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format for logs (`pretty`, `json`).
    /// Default: `pretty`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            ttl_seconds: default_ttl(),
            remote_url: None,
            local_path: default_cache_path(),
            connect_timeout_ms: default_connect_timeout(),
            version_tag: default_version_tag(),
        }
    }
}

impl CacheSettings {
    /// Local backend persisted at `path`.
    pub fn local(path: impl Into<String>, ttl_seconds: u64) -> Self {
        Self {
            backend: BackendKind::Local,
            ttl_seconds,
            local_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Local backend with no durable mirror.
    pub fn in_memory(ttl_seconds: u64) -> Self {
        Self {
            backend: BackendKind::Local,
            ttl_seconds,
            local_path: None,
            ..Self::default()
        }
    }

    /// Remote backend at `url`, falling back to `local_path` if unreachable.
    pub fn remote(url: impl Into<String>, ttl_seconds: u64) -> Self {
        Self {
            backend: BackendKind::Remote,
            ttl_seconds,
            remote_url: Some(url.into()),
            ..Self::default()
        }
    }
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            per_call_path: default_per_call_path(),
            daily_path: default_daily_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Helper functions for serde defaults
fn data_dir() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".llm-router")
}

fn default_ttl() -> u64 {
    86_400
}

fn default_cache_path() -> Option<String> {
    Some(data_dir().join("cache.json").to_string_lossy().to_string())
}

fn default_connect_timeout() -> u64 {
    2_000
}

fn default_version_tag() -> String {
    "v1".to_string()
}

fn default_per_call_path() -> String {
    data_dir()
        .join("logs")
        .join("calls.jsonl")
        .to_string_lossy()
        .to_string()
}

fn default_daily_path() -> String {
    data_dir()
        .join("logs")
        .join("daily.json")
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}
