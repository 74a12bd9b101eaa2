// Remote cache backend
// Author: kelexine (https://github.com/kelexine)

use super::codec::{self, CacheEntry};
use super::store::CacheBackend;
use crate::config::BackendKind;
use crate::error::{ErrorKind, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use redis::Commands;
use std::time::Duration;
use tracing::{debug, warn};

/// Minimal key-value surface the remote backend needs.
///
/// Implemented for Redis; tests substitute an in-process map.
pub trait KeyValueService: Send + Sync {
    fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `bytes`, using native expiry when `ttl` is set.
    fn store(&self, key: &str, bytes: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    fn delete(&self, key: &str) -> Result<bool>;
}

/// Redis over a single synchronous connection.
pub struct RedisService {
    conn: Mutex<redis::Connection>,
}

impl RedisService {
    /// Connect and verify the server answers `PING`.
    pub fn connect(url: &str, timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let mut conn = client.get_connection_with_timeout(timeout)?;
        conn.set_read_timeout(Some(timeout))?;
        conn.set_write_timeout(Some(timeout))?;
        redis::cmd("PING").query::<String>(&mut conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl KeyValueService for RedisService {
    fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.lock();
        Ok(conn.get(key)?)
    }

    fn store(&self, key: &str, bytes: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn.lock();
        match ttl {
            // EX has whole-second resolution; round up so native expiry never precedes ours
            Some(ttl) => {
                let seconds = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
                conn.set_ex::<_, _, ()>(key, bytes, seconds.max(1))?
            }
            None => conn.set::<_, _, ()>(key, bytes)?,
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.lock();
        let removed: u64 = conn.del(key)?;
        Ok(removed > 0)
    }
}

/// Cache backend storing one encoded envelope per key.
///
/// The embedded `expire_at` is checked on every read as well as the
/// service's own TTL, so a skewed or misconfigured server cannot serve
/// stale entries.
pub struct RemoteStore {
    service: Box<dyn KeyValueService>,
}

impl RemoteStore {
    pub fn new(service: Box<dyn KeyValueService>) -> Self {
        Self { service }
    }
}

impl CacheBackend for RemoteStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>> {
        let Some(bytes) = self.service.fetch(key)? else {
            return Ok(None);
        };

        let entry = match codec::decode_entry(&bytes) {
            Ok(entry) => entry,
            Err(e) if e.kind() == ErrorKind::Serialization => {
                // Drop the payload so every later read doesn't trip on it
                if let Err(del) = self.service.delete(key) {
                    warn!("Failed to delete undecodable remote entry: {}", del);
                }
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        if entry.is_expired(now) {
            debug!("Remote entry past embedded expiry; deleting");
            crate::metrics::record_cache_op("remote", "expired");
            self.service.delete(key)?;
            return Ok(None);
        }
        Ok(Some(entry))
    }

    fn set(&self, key: &str, entry: CacheEntry, ttl: Option<Duration>) -> Result<()> {
        let bytes = codec::encode_entry(&entry)?;
        self.service.store(key, bytes, ttl)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        self.service.delete(key)
    }

    fn purge_expired(&self, _now: DateTime<Utc>) -> Result<usize> {
        // Native expiry reclaims keys server-side
        Ok(0)
    }

    fn len(&self) -> Option<usize> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::codec::Metadata;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Map-backed service that ignores native TTL, like a misconfigured server.
    #[derive(Default, Clone)]
    struct MapService {
        data: Arc<Mutex<HashMap<String, Vec<u8>>>>,
        ttls: Arc<Mutex<HashMap<String, Option<Duration>>>>,
    }

    impl KeyValueService for MapService {
        fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>> {
            Ok(self.data.lock().get(key).cloned())
        }

        fn store(&self, key: &str, bytes: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
            self.data.lock().insert(key.to_string(), bytes);
            self.ttls.lock().insert(key.to_string(), ttl);
            Ok(())
        }

        fn delete(&self, key: &str) -> Result<bool> {
            Ok(self.data.lock().remove(key).is_some())
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_embedded_expiry_is_enforced() {
        let service = MapService::default();
        let store = RemoteStore::new(Box::new(service.clone()));
        let entry = CacheEntry::new(json!("hello"), Metadata::new(), Some(t0() + ChronoDuration::seconds(60)));

        store.set("k1", entry, Some(Duration::from_secs(60))).unwrap();
        assert_eq!(
            service.ttls.lock().get("k1").cloned().flatten(),
            Some(Duration::from_secs(60))
        );
        assert!(store.get("k1", t0()).unwrap().is_some());

        assert!(store.get("k1", t0() + ChronoDuration::seconds(61)).unwrap().is_none());
        assert!(service.data.lock().get("k1").is_none());
    }

    #[test]
    fn test_undecodable_payload_is_serialization_error() {
        let service = MapService::default();
        service.data.lock().insert("k".to_string(), b"garbage".to_vec());
        let store = RemoteStore::new(Box::new(service.clone()));

        let err = store.get("k", t0()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Serialization);
        assert!(service.data.lock().is_empty());
    }
}
