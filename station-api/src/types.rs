//! Request and response types for the wire contract.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use station_core::{LogbookDraft, QsoDraft, QsoId};
use std::fmt;

// ============================================================================
// REQUEST ENVELOPE
// ============================================================================

/// The JSON body every write request carries.
///
/// `key` is a password for `register_logbook` and a `prefix.secret` API key
/// for `insert_qso`.
#[derive(Clone, Deserialize)]
pub struct RequestEnvelope {
    pub callsign: String,
    pub key: String,
    pub action: String,
    #[serde(default)]
    pub logbook: Option<LogbookDraft>,
    #[serde(default)]
    pub qso: Option<QsoDraft>,
}

impl fmt::Debug for RequestEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestEnvelope")
            .field("callsign", &self.callsign)
            .field("key", &"[REDACTED]")
            .field("action", &self.action)
            .field("logbook", &self.logbook)
            .field("qso", &self.qso)
            .finish()
    }
}

impl RequestEnvelope {
    /// Split off the credential. What remains is safe to keep around.
    pub fn into_parts(self) -> (SecretString, EnvelopeBody) {
        let credential = SecretString::new(self.key.into());
        let body = EnvelopeBody {
            callsign: self.callsign,
            action: self.action,
            logbook: self.logbook,
            qso: self.qso,
        };
        (credential, body)
    }
}

/// The envelope without its credential.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeBody {
    pub callsign: String,
    pub action: String,
    pub logbook: Option<LogbookDraft>,
    pub qso: Option<QsoDraft>,
}

// ============================================================================
// RESPONSES
// ============================================================================

/// Single-message response. For provisioning, `message` is the one-time
/// full API key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Response to a successful QSO insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QsoInsertResponse {
    pub message: String,
    pub qso_id: QsoId,
}

/// Health check response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: String,
    /// "ok" or "unavailable"
    pub store: String,
    pub version: String,
}
