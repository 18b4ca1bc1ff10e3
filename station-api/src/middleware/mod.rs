//! Middleware modules for the Station API
//!
//! - `auth`: the request authorization pipeline and its extractor
//!
//! Telemetry middleware lives in [`crate::telemetry`].

mod auth;

pub use auth::{
    authorize, request_auth_middleware, AuthorizedRequest, Principal, RequestAuthorization,
};
