//! Station API Server Entry Point
//!
//! Bootstraps telemetry and configuration, builds the Postgres store and
//! starts the Axum HTTP server.

use std::sync::Arc;

use station_api::telemetry::{init_tracer, TelemetryConfig};
use station_api::{create_router, ApiConfig, ApiError, ApiResult, AppState, DbConfig, PgStore};
use station_core::StationError;

#[tokio::main]
async fn main() -> ApiResult<()> {
    let telemetry_config = TelemetryConfig::default();
    init_tracer(&telemetry_config)?;

    let api_config = ApiConfig::from_env();
    let validation = if telemetry_config.is_production() {
        api_config.validate_for_production()
    } else {
        api_config.validate()
    };
    validation.map_err(StationError::from)?;

    let db_config = DbConfig::from_env();
    let store = PgStore::from_config(&db_config)?;

    let bind_addr = api_config.bind_addr();
    let state = AppState::new(Arc::new(store), api_config)?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| {
            tracing::error!(addr = %bind_addr, error = %e, "failed to bind");
            ApiError::internal_error()
        })?;
    tracing::info!(addr = %bind_addr, "Starting Station API server");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "server error");
            ApiError::internal_error()
        })?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
