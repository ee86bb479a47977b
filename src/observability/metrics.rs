//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lume_requests_total` (counter): requests by method and status
//! - `lume_request_duration_seconds` (histogram): latency distribution
//! - `lume_rate_limited_total` (counter): requests rejected by the limiter
//! - `lume_origin_rejected_total` (counter): requests from disallowed origins
//! - `lume_sanitized_total` (counter): values rewritten or removed, by kind

use std::net::SocketAddr;
use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let status = status.to_string();
    metrics::counter!("lume_requests_total", "method" => method.to_string(), "status" => status.clone())
        .increment(1);
    metrics::histogram!("lume_request_duration_seconds", "method" => method.to_string(), "status" => status)
        .record(start.elapsed().as_secs_f64());
}

/// Middleware counting every response, including origin rejections and
/// CORS preflights answered by outer layers.
pub async fn track_requests(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let response = next.run(request).await;
    record_request(&method, response.status().as_u16(), start);
    response
}

/// Record a rate-limited request.
pub fn record_rate_limited() {
    metrics::counter!("lume_rate_limited_total").increment(1);
}

/// Record a request rejected for its origin.
pub fn record_origin_rejected() {
    metrics::counter!("lume_origin_rejected_total").increment(1);
}

/// Record values neutralized by a sanitizer (`xss` or `injection`).
pub fn record_sanitized(kind: &'static str, count: usize) {
    if count > 0 {
        metrics::counter!("lume_sanitized_total", "kind" => kind).increment(count as u64);
    }
}
