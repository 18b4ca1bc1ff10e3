//! Health Check Endpoint
//!
//! No authentication. 200 when the store answers its probe, 503 otherwise.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::state::AppState;
use crate::types::HealthResponse;

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let (status_code, status, store) = match state.store.health_check().await {
        Ok(()) => (StatusCode::OK, "healthy", "ok"),
        Err(e) => {
            tracing::warn!(error = %e, "store health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded", "unavailable")
        }
    };

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            store: store.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}
