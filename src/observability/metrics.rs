//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, upstream
//! - `gateway_request_duration_seconds` (histogram): latency by method, upstream
//! - `gateway_upstream_failures_total` (counter): transport failures by upstream
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Unrouted requests are labelled `upstream="none"`

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Label used when a request never reached a route.
pub const NO_UPSTREAM: &str = "none";

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, upstream: &str, duration: Duration) {
    metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "upstream" => upstream.to_string()
    )
    .increment(1);

    metrics::histogram!(
        "gateway_request_duration_seconds",
        "method" => method.to_string(),
        "upstream" => upstream.to_string()
    )
    .record(duration.as_secs_f64());
}

pub fn record_upstream_failure(upstream: &str) {
    metrics::counter!("gateway_upstream_failures_total", "upstream" => upstream.to_string())
        .increment(1);
}
