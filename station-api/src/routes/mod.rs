//! REST API Routes
//!
//! - `POST /api/logbook/register`: provision a logbook (password auth)
//! - `POST /api/qso/insert`: write a QSO (API-key auth)
//! - `GET /health`: liveness and store readiness
//! - `GET /metrics`: Prometheus exposition
//!
//! Only the `/api` routes run the authorization pipeline.

pub mod health;
pub mod logbook;
pub mod qso;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ApiConfig;
use crate::middleware::request_auth_middleware;
use crate::state::AppState;
use crate::telemetry::{metrics_handler, observability_middleware};

pub const REGISTER_LOGBOOK_PATH: &str = "/api/logbook/register";
pub const INSERT_QSO_PATH: &str = "/api/qso/insert";
pub const HEALTH_PATH: &str = "/health";
pub const METRICS_PATH: &str = "/metrics";

/// Every path this server routes. Used to bound metric labels.
pub const KNOWN_PATHS: &[&str] = &[REGISTER_LOGBOOK_PATH, INSERT_QSO_PATH, HEALTH_PATH, METRICS_PATH];

/// Build CORS layer from configuration.
///
/// Empty origins allow any origin (development mode).
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(3600));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!(
            "CORS: Production mode - allowing origins: {:?}",
            config.cors_origins
        );
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

/// Create the complete router.
pub fn create_router(state: AppState) -> Router {
    // route_layer: unmatched paths 404 without touching the pipeline.
    let api_routes = Router::new()
        .route("/logbook/register", post(logbook::register_logbook))
        .route("/qso/insert", post(qso::insert_qso))
        .route_layer(from_fn_with_state(state.clone(), request_auth_middleware));

    Router::new()
        .nest("/api", api_routes)
        .route(HEALTH_PATH, get(health::health))
        .route(METRICS_PATH, get(metrics_handler))
        .layer(from_fn(observability_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .layer(build_cors_layer(&state.config))
        .with_state(state)
}
