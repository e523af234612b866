//! Metrics collection and exposition.
//!
//! # Metrics
//! - `rpc_attempts_total` (counter): dispatched attempts by endpoint, outcome
//! - `rpc_attempt_duration_seconds` (histogram): attempt latency by endpoint
//! - `rpc_throttled_total` (counter): throttle spins by reason
//! - `rpc_cooldowns_total` (counter): cooldowns by endpoint, failure class
//! - `rpc_pending_requests` (gauge): in-flight attempts
//! - `rpc_probe_total` (counter): health probes by endpoint, result
//!
//! Without an installed recorder every call is a no-op.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus exporter on `addr`. Must run inside a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_attempt(endpoint: &str, success: bool, elapsed: Duration) {
    let outcome = if success { "success" } else { "failure" };
    counter!("rpc_attempts_total", "endpoint" => endpoint.to_string(), "outcome" => outcome)
        .increment(1);
    histogram!("rpc_attempt_duration_seconds", "endpoint" => endpoint.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_throttle(reason: &'static str) {
    counter!("rpc_throttled_total", "reason" => reason).increment(1);
}

pub fn record_cooldown(endpoint: &str, class: &'static str) {
    counter!("rpc_cooldowns_total", "endpoint" => endpoint.to_string(), "class" => class)
        .increment(1);
}

pub fn set_pending(pending: usize) {
    gauge!("rpc_pending_requests").set(pending as f64);
}

pub fn record_probe(endpoint: &str, healthy: bool) {
    let result = if healthy { "ok" } else { "failed" };
    counter!("rpc_probe_total", "endpoint" => endpoint.to_string(), "result" => result)
        .increment(1);
}
