//! Encode/decode boundary for cached values.
//!
//! Both backends store the same [`CacheEntry`] shape. The remote backend
//! writes one [`Envelope`] per key; the local backend writes one
//! [`Snapshot`] holding every entry. Both carry [`FORMAT_VERSION`] so a
//! reader can refuse data written by an incompatible build.

// Author: kelexine (https://github.com/kelexine)

use crate::error::{Result, RouterError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Version stamped into every payload this build writes.
pub const FORMAT_VERSION: u32 = 1;

/// Free-form annotations stored next to a cached value.
pub type Metadata = Map<String, Value>;

/// A cached value with its metadata and absolute expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: Value,
    #[serde(default)]
    pub metadata: Metadata,
    /// `None` means the entry never expires by time.
    #[serde(default)]
    pub expire_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    pub fn new(value: Value, metadata: Metadata, expire_at: Option<DateTime<Utc>>) -> Self {
        Self {
            value,
            metadata,
            expire_at,
        }
    }

    /// An entry is expired once its expiry lies strictly in the past.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expire_at, Some(at) if at < now)
    }
}

/// Single-entry payload stored under one remote key.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u32,
    #[serde(flatten)]
    entry: CacheEntry,
}

/// Whole-cache document written by the local backend.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub entries: HashMap<String, CacheEntry>,
}

pub fn encode_entry(entry: &CacheEntry) -> Result<Vec<u8>> {
    let envelope = Envelope {
        version: FORMAT_VERSION,
        entry: entry.clone(),
    };
    Ok(serde_json::to_vec(&envelope)?)
}

pub fn decode_entry(bytes: &[u8]) -> Result<CacheEntry> {
    let envelope: Envelope = serde_json::from_slice(bytes)?;
    check_version(envelope.version)?;
    Ok(envelope.entry)
}

pub fn encode_snapshot(entries: &HashMap<String, CacheEntry>) -> Result<Vec<u8>> {
    #[derive(Serialize)]
    struct SnapshotRef<'a> {
        version: u32,
        entries: &'a HashMap<String, CacheEntry>,
    }

    Ok(serde_json::to_vec(&SnapshotRef {
        version: FORMAT_VERSION,
        entries,
    })?)
}

pub fn decode_snapshot(bytes: &[u8]) -> Result<Snapshot> {
    let snapshot: Snapshot = serde_json::from_slice(bytes)?;
    check_version(snapshot.version)?;
    Ok(snapshot)
}

fn check_version(found: u32) -> Result<()> {
    if found != FORMAT_VERSION {
        return Err(RouterError::Serialization(format!(
            "unsupported cache format version {} (expected {})",
            found, FORMAT_VERSION
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_envelope_layout() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 0).unwrap();
        let mut metadata = Metadata::new();
        metadata.insert("provider".to_string(), json!("openai"));
        let entry = CacheEntry::new(json!("hello"), metadata, Some(at));

        let bytes = encode_entry(&entry).unwrap();
        let raw: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(raw["version"], json!(1));
        assert_eq!(raw["value"], json!("hello"));
        assert_eq!(raw["metadata"]["provider"], json!("openai"));
        assert_eq!(raw["expire_at"], json!("2024-01-01T00:01:00Z"));

        assert_eq!(decode_entry(&bytes).unwrap(), entry);
    }

    #[test]
    fn test_rejects_unknown_version() {
        let bytes = br#"{"version": 7, "value": 1, "metadata": {}, "expire_at": null}"#;
        let err = decode_entry(bytes).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Serialization);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(decode_entry(b"\x80\x04pickle").is_err());
        assert!(decode_snapshot(b"{\"entries\": 3}").is_err());
    }

    #[test]
    fn test_expiry_is_strict() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let entry = CacheEntry::new(json!(null), Metadata::new(), Some(at));
        assert!(!entry.is_expired(at));
        assert!(entry.is_expired(at + chrono::Duration::milliseconds(1)));

        let forever = CacheEntry::new(json!(null), Metadata::new(), None);
        assert!(!forever.is_expired(at + chrono::Duration::days(10_000)));
    }
}
