//! Core entity structures

use crate::{LogbookId, QsoId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Registered station operator.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub callsign: String,
    pub email: String,
    /// Argon2 PHC string. Never serialized.
    pub pass_hash: String,
    pub email_confirmed: bool,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("callsign", &self.callsign)
            .field("email", &self.email)
            .field("pass_hash", &"[REDACTED]")
            .field("email_confirmed", &self.email_confirmed)
            .finish()
    }
}

/// Logbook - the unit of tenancy. Every QSO belongs to exactly one logbook
/// and every API key authorizes exactly one logbook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Logbook {
    pub id: LogbookId,
    /// Stable external identifier, never reused.
    pub uid: Uuid,
    pub callsign: String,
    pub name: String,
    pub description: Option<String>,
    pub user_id: UserId,
}

/// Client-supplied logbook payload for provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogbookDraft {
    pub name: String,
    pub callsign: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Logbook row about to be inserted. The owner always comes from the
/// authenticated user, never from the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLogbook {
    pub uid: Uuid,
    pub user_id: UserId,
    pub name: String,
    pub callsign: String,
    pub description: Option<String>,
}

impl NewLogbook {
    pub fn from_draft(draft: LogbookDraft, user_id: UserId) -> Self {
        Self {
            uid: crate::new_logbook_uid(),
            user_id,
            name: draft.name,
            callsign: draft.callsign.to_ascii_uppercase(),
            description: draft.description,
        }
    }

    /// Materialize the row once the store has assigned an id.
    pub fn into_logbook(self, id: LogbookId) -> Logbook {
        Logbook {
            id,
            uid: self.uid,
            callsign: self.callsign,
            name: self.name,
            description: self.description,
            user_id: self.user_id,
        }
    }
}

/// Persisted API key. Only the prefix and the digest of the secret are
/// stored; the plaintext secret never reaches storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub prefix: String,
    /// Hex digest of the secret half.
    pub digest: String,
    pub logbook_id: LogbookId,
    pub created_at: Timestamp,
    pub revoked_at: Option<Timestamp>,
    pub expires_at: Option<Timestamp>,
}

impl ApiKeyRecord {
    /// A key is active iff it is not revoked and has not expired.
    pub fn is_active(&self, now: Timestamp) -> bool {
        if self.revoked_at.is_some() {
            return false;
        }
        match self.expires_at {
            Some(expires_at) => expires_at > now,
            None => true,
        }
    }
}

/// Client-supplied QSO payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QsoDraft {
    /// Callsign of the contacted station.
    pub call: String,
    /// Callsign of the logging station. Must match the logbook callsign.
    pub station_callsign: String,
    pub band: String,
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freq_mhz: Option<f64>,
    /// ADIF date, YYYYMMDD.
    pub qso_date: String,
    /// ADIF time, HHMM or HHMMSS.
    pub time_on: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rst_sent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rst_rcvd: Option<String>,
}

/// A contact bound to its logbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Qso {
    pub id: QsoId,
    pub logbook_id: LogbookId,
    pub call: String,
    pub station_callsign: String,
    pub band: String,
    pub mode: String,
    pub freq_mhz: Option<f64>,
    pub qso_date: String,
    pub time_on: String,
    pub rst_sent: Option<String>,
    pub rst_rcvd: Option<String>,
}

impl Qso {
    /// Bind a draft to a logbook. The id is assigned by the store.
    pub fn from_draft(draft: QsoDraft, logbook_id: LogbookId) -> Self {
        Self {
            id: 0,
            logbook_id,
            call: draft.call.to_ascii_uppercase(),
            station_callsign: draft.station_callsign.to_ascii_uppercase(),
            band: draft.band.to_ascii_lowercase(),
            mode: draft.mode.to_ascii_uppercase(),
            freq_mhz: draft.freq_mhz,
            qso_date: draft.qso_date,
            time_on: draft.time_on,
            rst_sent: draft.rst_sent,
            rst_rcvd: draft.rst_rcvd,
        }
    }
}
