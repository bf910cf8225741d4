//! Prometheus metrics.
//!
//! Recording is always on and costs nothing when no recorder is
//! installed. The exporter runs on its own listener so the relay's route
//! table stays `/manifest`, `/segment` and `/health` only.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::info;

/// Install the global Prometheus recorder and its HTTP listener.
///
/// Must be called from within a tokio runtime.
pub fn install_exporter(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    info!("📈 Metrics listening on http://{}/metrics", addr);
    Ok(())
}

/// Count a finished request by route and status
pub fn record_request(route: &'static str, status: u16) {
    counter!("relay_requests_total", "route" => route, "status" => status.to_string())
        .increment(1);
}

/// Record time from `start` until now for `route`
pub fn record_duration(route: &'static str, start: Instant) {
    histogram!("relay_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

/// Count a failed origin fetch by failure kind
pub fn record_origin_error(kind: &'static str) {
    counter!("relay_origin_errors_total", "kind" => kind).increment(1);
}
