//! Identity types for Station entities

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Sequential internal logbook identifier, used for joins and cache keys.
/// Zero is never a valid id.
pub type LogbookId = i64;

/// Sequential internal user identifier.
pub type UserId = i64;

/// Sequential internal QSO identifier.
pub type QsoId = i64;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new external logbook uid.
/// UUIDv7 embeds a Unix timestamp, making uids naturally sortable by creation time.
pub fn new_logbook_uid() -> Uuid {
    Uuid::now_v7()
}
