//! Store traits for Station entities.
//!
//! Reads go straight through [`LogbookStore`]. Every row mutation that must
//! be atomic goes through a [`StoreTransaction`] obtained from
//! [`LogbookStore::begin`]; the transaction owns its connection, so each of
//! its steps runs on the same one.

use async_trait::async_trait;
use station_core::{
    ApiKeyRecord, Logbook, LogbookId, NewLogbook, Qso, StationResult, Timestamp, User,
};

/// Async store for users, logbooks, API keys and QSOs.
#[async_trait]
pub trait LogbookStore: Send + Sync {
    // ========================================================================
    // LOOKUPS
    // ========================================================================

    /// Fetch a user by callsign. Callsigns compare case-insensitively.
    async fn fetch_user_by_callsign(&self, callsign: &str) -> StationResult<Option<User>>;

    /// Fetch an API key record by its prefix.
    async fn fetch_api_key_by_prefix(&self, prefix: &str) -> StationResult<Option<ApiKeyRecord>>;

    /// Fetch a logbook by internal id.
    async fn fetch_logbook_by_id(&self, id: LogbookId) -> StationResult<Option<Logbook>>;

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Open a transaction bound to a single connection.
    async fn begin(&self) -> StationResult<Box<dyn StoreTransaction>>;

    /// Persist a QSO and return it with its assigned id.
    async fn insert_qso(&self, qso: &Qso) -> StationResult<Qso>;

    /// Mark a key revoked. Returns false when no active key has this prefix.
    async fn revoke_api_key(&self, prefix: &str, at: Timestamp) -> StationResult<bool>;

    /// Cheap readiness probe.
    async fn health_check(&self) -> StationResult<()>;
}

/// A unit of work on one connection.
///
/// Dropping a transaction without calling [`commit`](Self::commit) or
/// [`rollback`](Self::rollback) must discard its writes.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Insert a logbook row and return it with the id the store assigned.
    async fn insert_logbook(&mut self, logbook: &NewLogbook) -> StationResult<Logbook>;

    /// Insert a key record. Only the prefix and the digest are stored.
    async fn insert_api_key(
        &mut self,
        prefix: &str,
        digest_hex: &str,
        logbook_id: LogbookId,
    ) -> StationResult<()>;

    async fn commit(self: Box<Self>) -> StationResult<()>;

    async fn rollback(self: Box<Self>) -> StationResult<()>;
}
