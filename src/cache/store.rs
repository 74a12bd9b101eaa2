// Response cache facade over the remote and local backends
// Author: kelexine (https://github.com/kelexine)

use super::codec::{CacheEntry, Metadata};
use super::local::LocalStore;
use super::remote::{RedisService, RemoteStore};
use crate::config::{BackendKind, CacheSettings};
use crate::error::{ErrorKind, Result, RouterError};
use crate::utils::clock::Clock;
use crate::utils::logging::redact_url;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Storage capability behind [`Cache`].
///
/// Backends store and return raw entries; expiry policy lives in [`Cache`]
/// except for the eager eviction each backend performs on its own storage.
pub trait CacheBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Fetch the entry under `key`. Expired entries are evicted and reported
    /// as `None`.
    fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>>;

    /// Store `entry`, replacing any previous value. `ttl` is the lifetime the
    /// entry's `expire_at` was derived from, for backends with native expiry.
    fn set(&self, key: &str, entry: CacheEntry, ttl: Option<std::time::Duration>) -> Result<()>;

    fn remove(&self, key: &str) -> Result<bool>;

    /// Drop every expired entry, returning how many were removed.
    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;

    /// Number of entries held locally, when the backend can tell.
    fn len(&self) -> Option<usize>;
}

/// TTL cache for model responses.
///
/// The backend is chosen once by [`Cache::open`]; every `set` applies the
/// same TTL.
pub struct Cache {
    backend: Box<dyn CacheBackend>,
    ttl: Option<std::time::Duration>,
    clock: Arc<dyn Clock>,
}

impl Cache {
    /// Build a cache from settings.
    ///
    /// A remote backend that is unconfigured or unreachable falls back to the
    /// local backend with a single warning. Only local-file I/O errors that
    /// prevent even an empty cache from being created are returned.
    pub fn open(settings: &CacheSettings, clock: Arc<dyn Clock>) -> Result<Self> {
        let backend: Box<dyn CacheBackend> = match settings.backend {
            BackendKind::Remote => match Self::connect_remote(settings) {
                Ok(remote) => Box::new(remote),
                Err((reason, detail)) => {
                    warn!(
                        "Remote cache backend {}: {}; falling back to local cache",
                        reason, detail
                    );
                    crate::metrics::record_backend_fallback(reason);
                    Box::new(LocalStore::open(settings.local_path.as_deref())?)
                }
            },
            BackendKind::Local => Box::new(LocalStore::open(settings.local_path.as_deref())?),
        };

        debug!(
            "Response cache using {} backend (ttl {}s)",
            backend.kind().as_str(),
            settings.ttl_seconds
        );
        Ok(Self::with_backend(backend, settings.ttl_seconds, clock))
    }

    /// Wrap an already constructed backend.
    pub fn with_backend(
        backend: Box<dyn CacheBackend>,
        ttl_seconds: u64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ttl = (ttl_seconds > 0).then(|| std::time::Duration::from_secs(ttl_seconds));
        Self {
            backend,
            ttl,
            clock,
        }
    }

    fn connect_remote(
        settings: &CacheSettings,
    ) -> std::result::Result<RemoteStore, (&'static str, String)> {
        let url = settings
            .remote_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or(("unconfigured", "no remote_url set".to_string()))?;

        let timeout = std::time::Duration::from_millis(settings.connect_timeout_ms);
        let service = RedisService::connect(url, timeout)
            .map_err(|e| ("unreachable", format!("{} ({})", e, redact_url(url))))?;
        Ok(RemoteStore::new(Box::new(service)))
    }

    pub fn backend(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn ttl(&self) -> Option<std::time::Duration> {
        self.ttl
    }

    /// Look up `key`, returning the value and metadata on a hit.
    ///
    /// Expired entries and payloads that fail to decode are misses. Backend
    /// connectivity errors are returned so the caller can decide.
    pub fn get(&self, key: &str) -> Result<Option<(Value, Metadata)>> {
        let backend = self.backend.kind().as_str();
        match self.backend.get(key, self.clock.now()) {
            Ok(Some(entry)) => {
                crate::metrics::record_cache_op(backend, "hit");
                Ok(Some((entry.value, entry.metadata)))
            }
            Ok(None) => {
                crate::metrics::record_cache_op(backend, "miss");
                Ok(None)
            }
            Err(e) if e.kind() == ErrorKind::Serialization => {
                warn!("Discarding undecodable cache entry: {}", e);
                crate::metrics::record_cache_op(backend, "decode_error");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Store `value` under `key` with this cache's TTL.
    ///
    /// Fails with a configuration error when the TTL cannot be represented
    /// as an expiry instant.
    pub fn set(&self, key: &str, value: Value, metadata: Metadata) -> Result<()> {
        let expire_at = match self.ttl {
            Some(ttl) => Some(self.expiry_after(ttl)?),
            None => None,
        };
        self.backend
            .set(key, CacheEntry::new(value, metadata, expire_at), self.ttl)?;
        crate::metrics::record_cache_op(self.backend.kind().as_str(), "set");
        Ok(())
    }

    fn expiry_after(&self, ttl: std::time::Duration) -> Result<DateTime<Utc>> {
        Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| self.clock.now().checked_add_signed(ttl))
            .ok_or_else(|| {
                RouterError::Config(format!("cache ttl of {}s is out of range", ttl.as_secs()))
            })
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        self.backend.remove(key)
    }

    pub fn purge_expired(&self) -> Result<usize> {
        self.backend.purge_expired(self.clock.now())
    }

    pub fn len(&self) -> Option<usize> {
        self.backend.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }
}
