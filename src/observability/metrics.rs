//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define manager metrics (reconciliation passes, index size, mutations)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `rules_sync_total` (counter): reconciliation passes by outcome
//! - `rules_sync_duration_seconds` (histogram): reconciliation latency
//! - `rules_indexed` (gauge): rules in the index after the last pass
//! - `rules_parse_failures_total` (counter): files skipped during discovery
//! - `rules_mutations_total` (counter): API writes by operation and outcome
//! - `rules_watch_events_total` (counter): relevant filesystem events seen
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Exporter is optional and off by default

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

fn outcome(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
}

/// Record one reconciliation pass.
pub fn record_sync(success: bool, rules: usize, failures: usize, elapsed: Duration) {
    counter!("rules_sync_total", "outcome" => outcome(success)).increment(1);
    histogram!("rules_sync_duration_seconds").record(elapsed.as_secs_f64());
    if success {
        gauge!("rules_indexed").set(rules as f64);
        counter!("rules_parse_failures_total").increment(failures as u64);
    }
}

/// Record an API create/update/delete.
pub fn record_mutation(op: &'static str, success: bool) {
    counter!("rules_mutations_total", "op" => op, "outcome" => outcome(success)).increment(1);
}

/// Record a filesystem event that will feed the debouncer.
pub fn record_watch_event() {
    counter!("rules_watch_events_total").increment(1);
}
