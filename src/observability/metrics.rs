//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status
//! - `proxy_request_duration_seconds` (histogram): latency distribution
//! - `proxy_dispatch_errors_total` (counter): failures by kind
//! - `proxy_workers_alive` (gauge): workers currently in the pool
//! - `proxy_worker_exits_total` (counter): workers removed from the pool
//! - `proxy_late_replies_total` (counter): replies with no waiting request
//!
//! Recording is a no-op until [`init_metrics`] installs an exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_dispatch_error(kind: &'static str) {
    counter!("proxy_dispatch_errors_total", "kind" => kind).increment(1);
}

pub fn record_workers_alive(count: usize) {
    gauge!("proxy_workers_alive").set(count as f64);
}

pub fn record_worker_exit() {
    counter!("proxy_worker_exits_total").increment(1);
}

pub fn record_late_reply() {
    counter!("proxy_late_replies_total").increment(1);
}
