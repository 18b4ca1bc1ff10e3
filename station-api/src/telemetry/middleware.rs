//! Axum middleware that counts every HTTP request and logs its completion.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info_span, Instrument};

use super::metrics::metrics;
use crate::routes::KNOWN_PATHS;

/// Label for the `path` dimension. Unknown paths collapse to one value so
/// scanners cannot blow up label cardinality.
fn path_label(path: &str) -> &'static str {
    KNOWN_PATHS
        .iter()
        .copied()
        .find(|known| *known == path)
        .unwrap_or("other")
}

/// Observability middleware for Axum.
pub async fn observability_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    let method = request.method().clone();
    let path = path_label(request.uri().path());

    let span = info_span!("http_request", http.method = %method, http.route = path);
    let response = next.run(request).instrument(span).await;

    let status = response.status();
    if let Some(m) = metrics() {
        m.record_http_request(method.as_str(), path, status.as_u16());
    }

    tracing::info!(
        method = %method,
        path = path,
        status = status.as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );

    response
}
