//! Station API - HTTP Layer for the Logbook Server
//!
//! An axum server in front of a [`station_storage::LogbookStore`]. Every
//! write request carries a JSON envelope that the authorization pipeline
//! ([`middleware`]) decodes and authenticates before a handler runs:
//! password credentials for provisioning a logbook, per-logbook API keys for
//! writing QSOs.
//!
//! Logbook lookups on the API-key path go through a bounded LRU cache held in
//! [`state::AppState`]. Provisioning ([`provisioning`]) creates a logbook and
//! its first key atomically.

pub mod config;
pub mod db;
pub mod error;
pub mod macros;
pub mod middleware;
pub mod provisioning;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod timed_store;
pub mod types;

// Re-export commonly used types
pub use config::ApiConfig;
pub use db::{DbConfig, PgStore};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{request_auth_middleware, AuthorizedRequest, Principal, RequestAuthorization};
pub use provisioning::{provision_logbook, ProvisionedLogbook};
pub use routes::create_router;
pub use state::AppState;
pub use timed_store::TimedStore;
pub use types::*;
