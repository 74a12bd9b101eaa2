// Prometheus metrics registry and collectors
// Author: kelexine (https://github.com/kelexine)

use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Opts, Registry, TextEncoder, Encoder,
    register_counter_vec_with_registry,
};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // ============================================================================
    // CACHE METRICS
    // ============================================================================

    /// Cache operations by backend
    pub static ref CACHE_OPERATIONS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("cache_operations_total", "Total response cache operations"),
        &["backend", "operation"], // operation: hit, miss, set, expired, evict, decode_error
        REGISTRY
    ).unwrap();

    /// Remote backend requested but local used instead
    pub static ref CACHE_BACKEND_FALLBACKS: CounterVec = register_counter_vec_with_registry!(
        Opts::new("cache_backend_fallbacks_total", "Remote cache backend fallbacks to local"),
        &["reason"], // reason: unconfigured, unreachable
        REGISTRY
    ).unwrap();

    // ============================================================================
    // USAGE METRICS
    // ============================================================================

    /// Call records appended to the per-call log
    pub static ref CALLS_RECORDED: CounterVec = register_counter_vec_with_registry!(
        Opts::new("calls_recorded_total", "Total call records appended"),
        &["model", "cache_hit"],
        REGISTRY
    ).unwrap();

    /// Total tokens accounted
    pub static ref TOKENS_TOTAL: CounterVec = register_counter_vec_with_registry!(
        Opts::new("tokens_total", "Total tokens accounted"),
        &["model", "type"], // type: input, output
        REGISTRY
    ).unwrap();

    /// Total spend accounted
    pub static ref COST_TOTAL: CounterVec = register_counter_vec_with_registry!(
        Opts::new("cost_usd_total", "Total accounted spend in USD"),
        &["model"],
        REGISTRY
    ).unwrap();

    /// Daily rollup read-modify-write cycles
    pub static ref ROLLUP_UPDATES: CounterVec = register_counter_vec_with_registry!(
        Opts::new("rollup_updates_total", "Total daily rollup updates"),
        &["status"], // status: ok, recovered, error
        REGISTRY
    ).unwrap();
}

/// Gather all metrics and return as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
