// Local-persistent cache backend
// Author: kelexine (https://github.com/kelexine)
//
// An in-process table mirrored to a JSON document on disk. Every mutation
// rewrites the document while the table lock is still held, so the file never
// lags the table outside a single critical section.

use super::codec::{self, CacheEntry};
use super::store::CacheBackend;
use crate::config::BackendKind;
use crate::error::Result;
use crate::utils::persist::write_atomic;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct LocalStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
    /// `None` keeps the table in memory only
    path: Option<PathBuf>,
}

impl LocalStore {
    /// Open the store, loading `path` if it exists.
    ///
    /// A file that cannot be read or decoded is logged and ignored; the store
    /// starts empty and the next write replaces it.
    pub fn open(path: Option<&str>) -> Result<Self> {
        let path = path.filter(|p| !p.trim().is_empty()).map(PathBuf::from);
        let entries = match &path {
            Some(p) => Self::load(p),
            None => HashMap::new(),
        };

        Ok(Self {
            entries: Mutex::new(entries),
            path,
        })
    }

    fn load(path: &Path) -> HashMap<String, CacheEntry> {
        if !path.exists() {
            return HashMap::new();
        }

        let loaded = fs::read(path)
            .map_err(crate::error::RouterError::from)
            .and_then(|bytes| codec::decode_snapshot(&bytes));

        match loaded {
            Ok(snapshot) => {
                debug!(
                    "Loaded {} cache entries from {}",
                    snapshot.entries.len(),
                    path.display()
                );
                snapshot.entries
            }
            Err(e) => {
                warn!(
                    "Cache file {} is unreadable, starting empty: {}",
                    path.display(),
                    e
                );
                HashMap::new()
            }
        }
    }

    /// Rewrite the durable copy. Caller must hold the table lock and must not
    /// keep a change to the table if this fails.
    fn persist(&self, entries: &HashMap<String, CacheEntry>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = codec::encode_snapshot(entries)?;
        write_atomic(path, &bytes)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl CacheBackend for LocalStore {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            None => return Ok(None),
            Some(entry) => entry.is_expired(now),
        };

        if !expired {
            return Ok(entries.get(key).cloned());
        }

        entries.remove(key);
        crate::metrics::record_cache_op("local", "expired");
        debug!("Evicted expired cache entry");
        if let Err(e) = self.persist(&entries) {
            // The miss stands; the stale row is rewritten away on the next write
            warn!("Failed to persist cache eviction: {}", e);
        }
        Ok(None)
    }

    fn set(&self, key: &str, entry: CacheEntry, _ttl: Option<std::time::Duration>) -> Result<()> {
        let mut entries = self.entries.lock();
        let previous = entries.insert(key.to_string(), entry);
        if let Err(e) = self.persist(&entries) {
            // Undo so the table never holds what the file did not receive
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let mut entries = self.entries.lock();
        let Some(old) = entries.remove(key) else {
            return Ok(false);
        };
        if let Err(e) = self.persist(&entries) {
            entries.insert(key.to_string(), old);
            return Err(e);
        }
        crate::metrics::record_cache_op("local", "evict");
        Ok(true)
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut entries = self.entries.lock();
        let mut kept = entries.clone();
        kept.retain(|_, entry| !entry.is_expired(now));
        let removed = entries.len() - kept.len();
        if removed > 0 {
            self.persist(&kept)?;
            *entries = kept;
            debug!("Purged {} expired cache entries", removed);
        }
        Ok(removed)
    }

    fn len(&self) -> Option<usize> {
        Some(self.entries.lock().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::codec::Metadata;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn entry(value: serde_json::Value, expire_at: Option<DateTime<Utc>>) -> CacheEntry {
        CacheEntry::new(value, Metadata::new(), expire_at)
    }

    #[test]
    fn test_memory_only_store() {
        let store = LocalStore::open(None).unwrap();
        assert!(store.path().is_none());

        store.set("k", entry(json!(42), None), None).unwrap();
        assert_eq!(store.get("k", t0()).unwrap().unwrap().value, json!(42));
        assert_eq!(store.len(), Some(1));
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, b"\x80\x04not json").unwrap();

        let store = LocalStore::open(path.to_str()).unwrap();
        assert_eq!(store.len(), Some(0));

        // The next write replaces the corrupt document
        store.set("k", entry(json!("v"), None), None).unwrap();
        let reopened = LocalStore::open(path.to_str()).unwrap();
        assert_eq!(reopened.len(), Some(1));
    }

    #[test]
    fn test_version_mismatch_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, br#"{"version": 99, "entries": {}}"#).unwrap();

        let store = LocalStore::open(path.to_str()).unwrap();
        assert_eq!(store.len(), Some(0));
    }

    #[test]
    fn test_purge_expired_rewrites_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let store = LocalStore::open(path.to_str()).unwrap();

        store.set("old", entry(json!(1), Some(t0())), None).unwrap();
        store.set("new", entry(json!(2), Some(t0() + Duration::hours(1))), None).unwrap();
        store.set("forever", entry(json!(3), None), None).unwrap();

        let removed = store.purge_expired(t0() + Duration::minutes(1)).unwrap();
        assert_eq!(removed, 1);

        let reopened = LocalStore::open(path.to_str()).unwrap();
        assert_eq!(reopened.len(), Some(2));
        assert!(reopened.get("old", t0()).unwrap().is_none());
    }

    #[test]
    fn test_failed_persist_leaves_table_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let store = LocalStore::open(path.to_str()).unwrap();
        store.set("k1", entry(json!("old"), None), None).unwrap();
        store.set("stale", entry(json!(0), Some(t0())), None).unwrap();

        // A non-empty directory cannot be renamed over
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();
        fs::write(path.join("occupied"), b"x").unwrap();

        assert!(store.set("k1", entry(json!("new"), None), None).is_err());
        assert_eq!(store.get("k1", t0()).unwrap().unwrap().value, json!("old"));

        assert!(store.set("k2", entry(json!("hello"), None), None).is_err());
        assert!(store.get("k2", t0()).unwrap().is_none());

        assert!(store.remove("k1").is_err());
        assert!(store.get("k1", t0()).unwrap().is_some());

        assert!(store.purge_expired(t0() + Duration::minutes(1)).is_err());
        assert_eq!(store.len(), Some(2));
    }

    #[test]
    fn test_remove() {
        let store = LocalStore::open(None).unwrap();
        store.set("k", entry(json!(1), None), None).unwrap();
        assert!(store.remove("k").unwrap());
        assert!(!store.remove("k").unwrap());
    }
}
