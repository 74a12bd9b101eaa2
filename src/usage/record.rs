//! Call records: the immutable unit of usage accounting.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::error::{Result, RouterError};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::warn;

/// Model name used when a caller leaves it blank.
pub const UNKNOWN_MODEL: &str = "unknown";

/// Field names owned by [`CallRecord`]; extension fields may not shadow them.
pub const RESERVED_FIELDS: &[&str] = &[
    "timestamp",
    "request_id",
    "prompt_hash",
    "model",
    "mode",
    "tokens_in",
    "tokens_out",
    "cost_usd",
    "latency_ms",
    "cache_hit",
    "eval",
];

/// Quality scores attached to a call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub auto_score: Option<f64>,
    pub human_score: Option<f64>,
}

/// One line of the per-call log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    /// SHA-256 hex of the prompt; the prompt itself is never stored.
    pub prompt_hash: String,
    pub model: String,
    pub mode: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cost_usd: f64,
    pub latency_ms: u64,
    pub cache_hit: bool,
    pub eval: Evaluation,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Inputs for [`CallRecord::build`].
#[derive(Debug, Clone, Default)]
pub struct CallParams {
    pub prompt: String,
    pub model: String,
    pub mode: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cost_usd: f64,
    pub latency_ms: u64,
    pub cache_hit: bool,
    pub auto_score: Option<f64>,
    pub human_score: Option<f64>,
    /// Generated when absent.
    pub request_id: Option<String>,
    /// Extra fields merged into the record.
    pub extra: Map<String, Value>,
}

impl CallParams {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>, mode: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            mode: mode.into(),
            ..Self::default()
        }
    }
}

impl CallRecord {
    /// Build a record stamped at `now`.
    ///
    /// Rejects negative or non-finite costs. Cost is rounded to six decimal
    /// places. Extension keys that collide with a core field are dropped.
    pub fn build(params: CallParams, now: DateTime<Utc>) -> Result<Self> {
        if !params.cost_usd.is_finite() || params.cost_usd < 0.0 {
            return Err(RouterError::InvalidRecord(format!(
                "cost_usd must be a non-negative number, got {}",
                params.cost_usd
            )));
        }

        let mut extra = params.extra;
        extra.retain(|k, _| {
            let reserved = RESERVED_FIELDS.contains(&k.as_str());
            if reserved {
                warn!("Ignoring extension field '{}' that shadows a core field", k);
            }
            !reserved
        });

        let model = if params.model.trim().is_empty() {
            UNKNOWN_MODEL.to_string()
        } else {
            params.model
        };

        Ok(Self {
            timestamp: now,
            request_id: params
                .request_id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            prompt_hash: fingerprint(&params.prompt),
            model,
            mode: params.mode,
            tokens_in: params.tokens_in,
            tokens_out: params.tokens_out,
            cost_usd: round_cost(params.cost_usd),
            latency_ms: params.latency_ms,
            cache_hit: params.cache_hit,
            eval: Evaluation {
                auto_score: params.auto_score,
                human_score: params.human_score,
            },
            extra,
        })
    }

    /// Calendar day (`YYYY-MM-DD`) this record rolls up into.
    pub fn day(&self) -> String {
        let stamp = self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
        stamp[..10].to_string()
    }
}

/// One-way SHA-256 fingerprint of a prompt.
pub fn fingerprint(prompt: &str) -> String {
    hex::encode(Sha256::digest(prompt.as_bytes()))
}

fn round_cost(cost: f64) -> f64 {
    (cost * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_build_hashes_prompt() {
        let record = CallRecord::build(CallParams::new("hello", "gpt-4o-mini", "balanced"), noon()).unwrap();
        assert_eq!(
            record.prompt_hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(record.day(), "2024-01-01");
        assert_eq!(record.request_id.len(), 36);
        assert!(!serde_json::to_string(&record).unwrap().contains("\"hello\""));
    }

    #[test]
    fn test_build_rounds_and_validates_cost() {
        let mut params = CallParams::new("p", "m", "fast");
        params.cost_usd = 0.000_123_456_7;
        assert_eq!(CallRecord::build(params.clone(), noon()).unwrap().cost_usd, 0.000_123);

        params.cost_usd = -0.01;
        assert!(CallRecord::build(params.clone(), noon()).is_err());

        params.cost_usd = f64::NAN;
        assert!(CallRecord::build(params, noon()).is_err());
    }

    #[test]
    fn test_extension_fields_cannot_shadow_core_fields() {
        let mut params = CallParams::new("p", "gpt-4o-mini", "fast");
        params.request_id = Some("req-1".to_string());
        params.extra.insert("model".to_string(), json!("spoofed"));
        params.extra.insert("region".to_string(), json!("eu-west"));

        let record = CallRecord::build(params, noon()).unwrap();
        let line: Value = serde_json::to_value(&record).unwrap();
        assert_eq!(line["model"], json!("gpt-4o-mini"));
        assert_eq!(line["region"], json!("eu-west"));
        assert_eq!(line["request_id"], json!("req-1"));
        assert_eq!(line["eval"], json!({"auto_score": null, "human_score": null}));
        assert_eq!(line["timestamp"], json!("2024-01-01T12:30:00Z"));
    }

    #[test]
    fn test_blank_model_is_unknown() {
        let record = CallRecord::build(CallParams::new("p", " ", ""), noon()).unwrap();
        assert_eq!(record.model, UNKNOWN_MODEL);
    }
}
