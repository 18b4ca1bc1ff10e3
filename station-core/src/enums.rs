//! Enum types for Station entities and requests

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::AuthError;

// ============================================================================
// CORE ENUMS
// ============================================================================

/// Entity type discriminator used in error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    User,
    Logbook,
    ApiKey,
    Qso,
}

/// Actions a client may request through the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestAction {
    /// Provision a new logbook and its first API key. Password authenticated.
    RegisterLogbook,
    /// Write a QSO into the logbook owning the presented API key.
    InsertQso,
}

/// How a request must prove its identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    Password,
    ApiKey,
}

impl RequestAction {
    pub const ALL: [RequestAction; 2] = [RequestAction::RegisterLogbook, RequestAction::InsertQso];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestAction::RegisterLogbook => "register_logbook",
            RequestAction::InsertQso => "insert_qso",
        }
    }

    /// Credential kind required for this action. Provisioning is the only
    /// password-authenticated action since API keys are per logbook.
    pub fn auth_mode(&self) -> AuthMode {
        match self {
            RequestAction::RegisterLogbook => AuthMode::Password,
            RequestAction::InsertQso => AuthMode::ApiKey,
        }
    }
}

impl fmt::Display for RequestAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestAction {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "register_logbook" => Ok(RequestAction::RegisterLogbook),
            "insert_qso" => Ok(RequestAction::InsertQso),
            other => Err(AuthError::UnknownAction {
                action: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::Password => f.write_str("password"),
            AuthMode::ApiKey => f.write_str("api_key"),
        }
    }
}
