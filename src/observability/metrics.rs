//! Metrics collection and exposition.
//!
//! # Metrics
//! - `substrate_context_transitions_total` (counter): applied transitions by tracker, state
//! - `substrate_context_accounts` (gauge): size of the current account collection
//! - `substrate_context_dropped_actions_total` (counter): milestones arriving after unmount
//! - `substrate_context_reconnect_attempts_total` (counter): WebSocket reconnects by endpoint
//! - `substrate_context_rpc_requests_total` (counter): RPC calls by method, outcome

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}

pub fn record_transition(tracker: &'static str, state: &'static str) {
    metrics::counter!(
        "substrate_context_transitions_total",
        "tracker" => tracker,
        "state" => state
    )
    .increment(1);
}

pub fn record_account_count(count: usize) {
    metrics::gauge!("substrate_context_accounts").set(count as f64);
}

pub fn record_dropped_action(tracker: &'static str) {
    metrics::counter!("substrate_context_dropped_actions_total", "tracker" => tracker).increment(1);
}

pub fn record_reconnect_attempt(endpoint: &str) {
    metrics::counter!(
        "substrate_context_reconnect_attempts_total",
        "endpoint" => endpoint.to_string()
    )
    .increment(1);
}

pub fn record_rpc_request(method: &str, success: bool) {
    let outcome = if success { "ok" } else { "error" };
    metrics::counter!(
        "substrate_context_rpc_requests_total",
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}
