//! Metrics collection and exposition.
//!
//! # Metrics
//! - `bob_deployments_total` (counter): deployments by outcome
//! - `bob_queue_healthy` (gauge): 1=healthy, 0=unhealthy
//! - `bob_http_requests_total` (counter): requests by route and status
//! - `bob_http_request_duration_seconds` (histogram): time spent in the router
//!   and handler, by route
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_deployment(deployed: bool) {
    let outcome = if deployed { "deployed" } else { "failed" };
    counter!("bob_deployments_total", "outcome" => outcome).increment(1);
}

pub fn record_queue_health(healthy: bool) {
    gauge!("bob_queue_healthy").set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_request(route: &str, status: u16, elapsed: Duration) {
    counter!(
        "bob_http_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("bob_http_request_duration_seconds", "route" => route.to_string())
        .record(elapsed.as_secs_f64());
}
