//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method and outcome
//! - `proxy_request_duration_seconds` (histogram): latency by outcome
//! - `proxy_cache_lookups_total` (counter): cache lookups by result
//! - `proxy_cache_entries` (gauge): entries currently stored
//! - `proxy_origin_errors_total` (counter): forwarding failures by kind
//! - `proxy_active_connections` (gauge): open client connections
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder with its own scrape listener.
/// Must run inside a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, outcome: &'static str, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_cache_lookup(result: &'static str) {
    counter!("proxy_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_cache_entries(count: usize) {
    gauge!("proxy_cache_entries").set(count as f64);
}

pub fn record_origin_error(kind: &'static str) {
    counter!("proxy_origin_errors_total", "kind" => kind).increment(1);
}

pub fn record_active_connections(count: u64) {
    gauge!("proxy_active_connections").set(count as f64);
}
