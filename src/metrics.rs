//! Process metrics via the `metrics` facade and a Prometheus exporter,
//! installed once at startup the way `metrics-exporter-prometheus` expects;
//! individual modules call the free-standing `metrics::counter!`/`gauge!`
//! macros directly rather than going through a bespoke wrapper.

pub use metrics_exporter_prometheus::PrometheusHandle;
use metrics_exporter_prometheus::PrometheusBuilder;

pub const INGEST_DROPPED_MISSING_LOG_INDEX_TOTAL: &str = "ingest_dropped_missing_log_index_total";
pub const LIQUIDATION_ATTEMPTS_TOTAL: &str = "liquidation_attempts_total";
pub const LIQUIDATION_RETRIES_TOTAL: &str = "liquidation_retries_total";
pub const LIQUIDATION_QUEUE_DEPTH: &str = "liquidation_queue_depth";
pub const GATEWAY_RATE_LIMIT_REJECTED_TOTAL: &str = "gateway_rate_limit_rejected_total";
pub const DISPATCH_NONCE_FATAL_TOTAL: &str = "dispatch_nonce_fatal_total";
pub const POSITION_DRIFT_DETECTED_TOTAL: &str = "position_drift_detected_total";

/// Installs the process-wide Prometheus recorder and registers the fixed
/// set of named metrics this crate emits. Returns a handle whose
/// `render()` backs the `/metrics` HTTP endpoint.
pub fn install() -> PrometheusHandle {
    let builder = PrometheusBuilder::new();
    let handle = builder.install_recorder().expect("install prometheus recorder");

    metrics::describe_counter!(
        INGEST_DROPPED_MISSING_LOG_INDEX_TOTAL,
        "Chain events dropped because no log index could be extracted"
    );
    metrics::describe_counter!(LIQUIDATION_ATTEMPTS_TOTAL, "Liquidation attempts started");
    metrics::describe_counter!(LIQUIDATION_RETRIES_TOTAL, "Liquidation attempts retried after a transient failure");
    metrics::describe_gauge!(LIQUIDATION_QUEUE_DEPTH, "Current size of the liquidation priority queue");
    metrics::describe_counter!(GATEWAY_RATE_LIMIT_REJECTED_TOTAL, "Gateway requests rejected by rate limiting");
    metrics::describe_counter!(DISPATCH_NONCE_FATAL_TOTAL, "Fatal nonce uniqueness collisions in the dispatcher");
    metrics::describe_counter!(POSITION_DRIFT_DETECTED_TOTAL, "Ledger/on-chain position drift detected during reconciliation");

    handle
}
