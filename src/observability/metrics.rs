//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define dispatcher metrics (requests, latency, no-match, errors, timeouts)
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `controller_requests_total` (counter): requests by controller, method, status
//! - `controller_request_duration_seconds` (histogram): dispatch latency by controller
//! - `controller_no_match_total` (counter): requests no route matched
//! - `controller_errors_total` (counter): requests that reached error handling
//! - `controller_middleware_timeouts_total` (counter): middlewares cut off by the deadline
//!
//! # Design Decisions
//! - Labels for controller, method and status code only (bounded cardinality)
//! - Recording without an installed recorder is a no-op

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(controller: &'static str, method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "controller_requests_total",
        "controller" => controller,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("controller_request_duration_seconds", "controller" => controller)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_no_match(controller: &'static str) {
    metrics::counter!("controller_no_match_total", "controller" => controller).increment(1);
}

pub fn record_error(controller: &'static str) {
    metrics::counter!("controller_errors_total", "controller" => controller).increment(1);
}

pub fn record_middleware_timeout(controller: &'static str) {
    metrics::counter!("controller_middleware_timeouts_total", "controller" => controller)
        .increment(1);
}
