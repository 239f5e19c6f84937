//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by branch, status
//! - `gateway_request_duration_seconds` (histogram): latency by branch
//! - `gateway_fragment_fetch_total` (counter): fragment fetches by fragment, outcome
//!
//! Branch is one of `passthrough`, `iframe-probe`, `fragment-asset`, `document`.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

pub fn record_request(branch: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "branch" => branch,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "branch" => branch)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_fragment_fetch(fragment_id: &str, outcome: &'static str) {
    metrics::counter!(
        "gateway_fragment_fetch_total",
        "fragment" => fragment_id.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}
