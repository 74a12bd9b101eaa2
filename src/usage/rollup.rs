//! Daily usage rollup.
//!
//! The rollup document maps `YYYY-MM-DD` to running totals, overall and per
//! model. [`RollupAggregator::update`] folds one [`CallRecord`] in with a
//! locked read-modify-write. The unlocked pieces ([`load_rollup`],
//! [`DailyRollup::apply`], [`save_rollup`]) are public for tooling that
//! already holds the lock.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use super::record::CallRecord;
use crate::error::{Result, RouterError};
use crate::utils::path_lock;
use crate::utils::persist::write_atomic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::Path;
use tracing::{debug, warn};

/// Counters accumulated over a set of call records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageCounters {
    pub calls: u64,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cost_usd: f64,
    pub latency_ms_sum: u64,
    pub cache_hits: u64,
}

impl UsageCounters {
    pub fn add(&mut self, record: &CallRecord) {
        self.calls += 1;
        self.tokens_in += record.tokens_in;
        self.tokens_out += record.tokens_out;
        self.cost_usd += record.cost_usd;
        self.latency_ms_sum += record.latency_ms;
        if record.cache_hit {
            self.cache_hits += 1;
        }
    }

    /// Mean latency per call, or `None` before the first call.
    pub fn mean_latency_ms(&self) -> Option<f64> {
        (self.calls > 0).then(|| self.latency_ms_sum as f64 / self.calls as f64)
    }

    /// Fraction of calls served from cache.
    pub fn hit_rate(&self) -> Option<f64> {
        (self.calls > 0).then(|| self.cache_hits as f64 / self.calls as f64)
    }
}

/// Totals for one calendar day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DayRollup {
    pub totals: UsageCounters,
    pub by_model: BTreeMap<String, UsageCounters>,
}

/// The whole rollup document, keyed by `YYYY-MM-DD`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DailyRollup {
    pub days: BTreeMap<String, DayRollup>,
}

impl DailyRollup {
    /// Add `record` into its day's totals and its model's entry.
    pub fn apply(&mut self, record: &CallRecord) {
        let day = self.days.entry(record.day()).or_default();
        day.totals.add(record);
        day.by_model
            .entry(record.model.clone())
            .or_default()
            .add(record);
    }

    pub fn day(&self, date: &str) -> Option<&DayRollup> {
        self.days.get(date)
    }
}

/// Read the rollup at `path`.
///
/// A missing file is an empty rollup. An unreadable or malformed file is
/// also treated as empty, with a warning; its contents are replaced on the
/// next save.
pub fn load_rollup(path: &Path) -> DailyRollup {
    match try_load(path) {
        Ok(rollup) => rollup,
        Err(e) => {
            warn!(
                "Daily rollup {} is unreadable, starting from empty: {}",
                path.display(),
                e
            );
            crate::metrics::record_rollup_update("recovered");
            DailyRollup::default()
        }
    }
}

fn try_load(path: &Path) -> Result<DailyRollup> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(DailyRollup::default()),
        Err(e) => return Err(e.into()),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(DailyRollup::default());
    }
    serde_json::from_slice(&bytes).map_err(|e| RouterError::CorruptData {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Replace the rollup at `path` with `rollup`.
pub fn save_rollup(path: &Path, rollup: &DailyRollup) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(rollup)?;
    bytes.push(b'\n');
    write_atomic(path, &bytes)
}

/// Applies call records to rollup files, one locked update at a time per path.
#[derive(Debug, Default, Clone, Copy)]
pub struct RollupAggregator;

impl RollupAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Fold `record` into the rollup at `daily_path`.
    ///
    /// Updates to the same path are linearized through the process-wide path
    /// lock; updates to different paths proceed in parallel.
    pub fn update(&self, daily_path: impl AsRef<Path>, record: &CallRecord) -> Result<()> {
        let path = daily_path.as_ref();
        let lock = path_lock::lock_for(path);
        let _guard = lock.lock();

        let mut rollup = load_rollup(path);
        rollup.apply(record);

        match save_rollup(path, &rollup) {
            Ok(()) => {
                debug!("Rollup {} updated for {}", record.day(), record.model);
                crate::metrics::record_rollup_update("ok");
                Ok(())
            }
            Err(e) => {
                crate::metrics::record_rollup_update("error");
                Err(e)
            }
        }
    }

    /// Current totals for `date`, read under the same lock as updates.
    pub fn day(&self, daily_path: impl AsRef<Path>, date: &str) -> Option<DayRollup> {
        let path = daily_path.as_ref();
        let lock = path_lock::lock_for(path);
        let _guard = lock.lock();
        load_rollup(path).days.remove(date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::record::CallParams;
    use chrono::{TimeZone, Utc};

    fn record(model: &str, day: u32, tokens_in: u64, cache_hit: bool) -> CallRecord {
        let mut params = CallParams::new("prompt", model, "fast");
        params.tokens_in = tokens_in;
        params.tokens_out = 2 * tokens_in;
        params.cost_usd = 0.25;
        params.latency_ms = 100;
        params.cache_hit = cache_hit;
        CallRecord::build(params, Utc.with_ymd_and_hms(2024, 1, day, 23, 59, 59).unwrap()).unwrap()
    }

    #[test]
    fn test_apply_partitions_by_model_and_day() {
        let mut rollup = DailyRollup::default();
        rollup.apply(&record("gpt-4o-mini", 1, 5, true));
        rollup.apply(&record("claude-3-haiku", 1, 10, false));
        rollup.apply(&record("gpt-4o-mini", 2, 7, false));

        let day1 = rollup.day("2024-01-01").unwrap();
        assert_eq!(day1.totals.calls, 2);
        assert_eq!(day1.totals.tokens_in, 15);
        assert_eq!(day1.totals.cache_hits, 1);
        let model_calls: u64 = day1.by_model.values().map(|c| c.calls).sum();
        assert_eq!(model_calls, day1.totals.calls);

        let day2 = rollup.day("2024-01-02").unwrap();
        assert_eq!(day2.totals.calls, 1);
        assert_eq!(day2.by_model["gpt-4o-mini"].tokens_out, 14);
    }

    #[test]
    fn test_document_layout() {
        let mut rollup = DailyRollup::default();
        rollup.apply(&record("gpt-4o-mini", 1, 5, true));
        let value = serde_json::to_value(&rollup).unwrap();

        let totals = &value["2024-01-01"]["totals"];
        assert_eq!(totals["calls"], 1);
        assert_eq!(totals["latency_ms_sum"], 100);
        assert_eq!(totals["cost_usd"], 0.25);
        assert_eq!(value["2024-01-01"]["by_model"]["gpt-4o-mini"]["cache_hits"], 1);
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily.json");
        fs::write(&path, b"{ not json").unwrap();
        assert_eq!(load_rollup(&path), DailyRollup::default());

        RollupAggregator::new().update(&path, &record("m", 1, 3, false)).unwrap();
        let reloaded = load_rollup(&path);
        assert_eq!(reloaded.day("2024-01-01").unwrap().totals.tokens_in, 3);
    }

    #[test]
    fn test_missing_and_blank_files_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_rollup(&dir.path().join("absent.json")), DailyRollup::default());

        let blank = dir.path().join("blank.json");
        fs::write(&blank, b"\n").unwrap();
        assert_eq!(try_load(&blank).unwrap(), DailyRollup::default());
    }

    #[test]
    fn test_counter_ratios() {
        let mut counters = UsageCounters::default();
        assert!(counters.hit_rate().is_none());
        counters.add(&record("m", 1, 1, true));
        counters.add(&record("m", 1, 1, false));
        assert_eq!(counters.hit_rate(), Some(0.5));
        assert_eq!(counters.mean_latency_ms(), Some(100.0));
    }
}
