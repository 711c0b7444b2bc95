//! Metrics collection.
//!
//! # Metrics
//! - `ledger_channel_connect_attempts_total` (counter): by endpoint, outcome
//! - `ledger_channel_live_connections` (gauge): live connections in the pool
//! - `ledger_requests_total` (counter): by JSON-RPC method, outcome
//! - `ledger_request_duration_seconds` (histogram): by JSON-RPC method
//! - `ledger_transactions_total` (counter): by outcome
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; the embedding application installs
//!   the exporter, so without one these calls are no-ops

use std::time::Duration;

use crate::channel::endpoint::Endpoint;

pub fn record_connect_attempt(endpoint: &Endpoint, success: bool) {
    let outcome = if success { "connected" } else { "failed" };
    metrics::counter!(
        "ledger_channel_connect_attempts_total",
        "endpoint" => endpoint.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_live_connections(count: usize) {
    metrics::gauge!("ledger_channel_live_connections").set(count as f64);
}

pub fn record_request(method: &'static str, success: bool, elapsed: Duration) {
    let outcome = if success { "ok" } else { "error" };
    metrics::counter!("ledger_requests_total", "method" => method, "outcome" => outcome).increment(1);
    metrics::histogram!("ledger_request_duration_seconds", "method" => method)
        .record(elapsed.as_secs_f64());
}

pub fn record_transaction(outcome: &'static str) {
    metrics::counter!("ledger_transactions_total", "outcome" => outcome).increment(1);
}
