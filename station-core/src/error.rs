//! Error types for Station operations

use crate::EntityType;
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity_type:?} with key {key}")]
    NotFound { entity_type: EntityType, key: String },

    #[error("Insert failed for {entity_type:?}: {reason}")]
    InsertFailed { entity_type: EntityType, reason: String },

    #[error("Unique constraint violated on {entity_type:?}.{field}: {value}")]
    UniqueViolation {
        entity_type: EntityType,
        field: String,
        value: String,
    },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Storage unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Storage operation '{operation}' timed out")]
    Timeout { operation: String },
}

/// API key and credential errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("Malformed API key: {reason}")]
    Malformed { reason: String },

    #[error("Invalid prefix length {len}: must be between {min} and {max}")]
    InvalidPrefixLength { len: usize, min: usize, max: usize },

    #[error("Entropy source failed: {reason}")]
    EntropySource { reason: String },

    #[error("Invalid digest key: {reason}")]
    InvalidDigest { reason: String },

    #[error("Password hash error: {reason}")]
    PasswordHash { reason: String },
}

/// Request authorization errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Malformed request: {reason}")]
    MalformedRequest { reason: String },

    #[error("Unknown action: {action}")]
    UnknownAction { action: String },

    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    #[error("Transaction integrity violation: {reason}")]
    TransactionIntegrityViolation { reason: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Station errors.
#[derive(Debug, Clone, Error)]
pub enum StationError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl StationError {
    /// Whether the caller may reasonably retry. Nothing in this workspace
    /// retries on its own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StationError::Storage(StorageError::Unavailable { .. })
                | StationError::Storage(StorageError::Timeout { .. })
        )
    }

    /// Whether this error is a lookup miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StationError::Storage(StorageError::NotFound { .. }))
    }
}

/// Result type alias for Station operations.
pub type StationResult<T> = Result<T, StationError>;

// =============================================================================
// TESTS
// =============================================================================
