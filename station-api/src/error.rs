//! Error Types for the Station API
//!
//! This module defines error handling for the API layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum for categorizing errors
//! - IntoResponse implementation for Axum HTTP responses
//!
//! Credential failures and server faults carry fixed messages so that no
//! response reveals which check failed. The specific cause is logged.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use station_core::{AuthError, KeyError, StationError, ValidationError};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Client Errors (400)
    // ========================================================================
    /// Envelope missing, oversized, not JSON, or routed to the wrong path
    BadRequest,

    /// The envelope names an action this server does not know
    UnknownAction,

    /// Payload failed structural validation
    ValidationFailed,

    // ========================================================================
    // Authentication Errors (401)
    // ========================================================================
    /// Any credential or lookup failure
    Unauthorized,

    // ========================================================================
    // Server Errors (500)
    // ========================================================================
    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::BadRequest | ErrorCode::UnknownAction | ErrorCode::ValidationFailed => {
                StatusCode::BAD_REQUEST
            }

            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,


            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "Bad request",
            ErrorCode::UnknownAction => "Unknown action",
            ErrorCode::ValidationFailed => "Request validation failed",
            ErrorCode::Unauthorized => "Unauthorized",
            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details, only ever set on client errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors
    // ========================================================================

    /// Create a BadRequest error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// Create an UnknownAction error naming the rejected action.
    pub fn unknown_action(action: &str) -> Self {
        Self::new(
            ErrorCode::UnknownAction,
            format!("Unknown action '{}'", action),
        )
    }

    /// Create a ValidationFailed error.
    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    /// The one unauthorized response. Takes no message on purpose.
    pub fn unauthorized() -> Self {
        Self::from_code(ErrorCode::Unauthorized)
    }

    /// The one internal error response. Log the cause before calling.
    pub fn internal_error() -> Self {
        Self::from_code(ErrorCode::InternalError)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MalformedRequest { reason } => ApiError::bad_request(reason),
            AuthError::UnknownAction { action } => ApiError::unknown_action(&action),
            AuthError::Unauthorized { reason } => {
                tracing::debug!(reason = %reason, "request unauthorized");
                ApiError::unauthorized()
            }
            AuthError::TransactionIntegrityViolation { reason } => {
                tracing::error!(reason = %reason, "transaction integrity violation");
                ApiError::internal_error()
            }
        }
    }
}

impl From<KeyError> for ApiError {
    fn from(err: KeyError) -> Self {
        match err {
            KeyError::Malformed { .. } | KeyError::PasswordHash { .. } => {
                tracing::debug!(error = %err, "credential rejected");
                ApiError::unauthorized()
            }
            KeyError::EntropySource { .. }
            | KeyError::InvalidPrefixLength { .. }
            | KeyError::InvalidDigest { .. } => {
                tracing::error!(error = %err, "key material error");
                ApiError::internal_error()
            }
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation_failed(err.to_string())
    }
}

impl From<StationError> for ApiError {
    fn from(err: StationError) -> Self {
        match err {
            StationError::Auth(e) => e.into(),
            StationError::Key(e) => e.into(),
            StationError::Validation(e) => e.into(),
            StationError::Storage(e) => {
                tracing::error!(error = %e, "storage error");
                ApiError::internal_error()
            }
            StationError::Config(e) => {
                tracing::error!(error = %e, "configuration error");
                ApiError::internal_error()
            }
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        tracing::debug!("JSON decode error: {:?}", err);
        ApiError::bad_request(format!("Invalid JSON: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
