//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status and
//!   resolver stage ("client", "prerender", "renderer", "upgrade", "error")
//! - `gateway_request_duration_seconds` (histogram): dispatch latency

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    if let Err(error) = PrometheusBuilder::new().with_http_listener(addr).install() {
        tracing::error!(%error, "failed to install metrics exporter");
    } else {
        tracing::info!(address = %addr, "metrics exporter listening");
    }
}

/// Record one dispatched request.
pub fn record_request(method: &str, status: u16, source: &str, start_time: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "source" => source.to_string(),
    )
    .increment(1);
    histogram!(
        "gateway_request_duration_seconds",
        "method" => method.to_string(),
        "source" => source.to_string(),
    )
    .record(start_time.elapsed().as_secs_f64());
}
