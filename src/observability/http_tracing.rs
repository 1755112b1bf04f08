//! # HTTP Request Tracing Middleware
//!
//! Axum middleware that wraps every request of the export server in a
//! tracing span and logs its status and latency.

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::Instrument;

/// Axum middleware that records method, route, status and latency.
pub async fn trace_http_requests(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let uri = request.uri().path().to_string();
    let start = Instant::now();

    let span = crate::request_span!(method, uri);
    let response = next.run(request).instrument(span.clone()).await;

    let status_code = response.status().as_u16();
    let elapsed = start.elapsed();
    span.record("status_code", status_code);

    if status_code >= 500 {
        tracing::error!(parent: &span, elapsed_ms = elapsed.as_millis() as u64, "Request failed");
    } else if status_code >= 400 {
        tracing::warn!(parent: &span, elapsed_ms = elapsed.as_millis() as u64, "Request rejected");
    } else {
        tracing::info!(parent: &span, elapsed_ms = elapsed.as_millis() as u64, "Request served");
    }

    response
}
