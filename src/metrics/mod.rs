// Metrics module for Prometheus observability
// Author: kelexine (https://github.com/kelexine)

mod registry;

pub use registry::{
    gather_metrics,
    CACHE_OPERATIONS,
    CACHE_BACKEND_FALLBACKS,
    CALLS_RECORDED,
    TOKENS_TOTAL,
    COST_TOTAL,
    ROLLUP_UPDATES,
};

/// Helper to record a cache operation against a backend
pub fn record_cache_op(backend: &str, operation: &str) {
    CACHE_OPERATIONS.with_label_values(&[backend, operation]).inc();
}

pub fn record_backend_fallback(reason: &str) {
    CACHE_BACKEND_FALLBACKS.with_label_values(&[reason]).inc();
}

/// Helper to record an appended call record
pub fn record_call(model: &str, cache_hit: bool, tokens_in: u64, tokens_out: u64, cost_usd: f64) {
    CALLS_RECORDED
        .with_label_values(&[model, &cache_hit.to_string()])
        .inc();

    if tokens_in > 0 {
        TOKENS_TOTAL
            .with_label_values(&[model, "input"])
            .inc_by(tokens_in as f64);
    }
    if tokens_out > 0 {
        TOKENS_TOTAL
            .with_label_values(&[model, "output"])
            .inc_by(tokens_out as f64);
    }
    if cost_usd > 0.0 {
        COST_TOTAL.with_label_values(&[model]).inc_by(cost_usd);
    }
}

pub fn record_rollup_update(status: &str) {
    ROLLUP_UPDATES.with_label_values(&[status]).inc();
}
