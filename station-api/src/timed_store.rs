//! Per-call deadlines for the store.
//!
//! [`TimedStore`] wraps any [`LogbookStore`] and runs every call, including
//! each step of a transaction it hands out, under `tokio::time::timeout`.
//! An elapsed deadline is `StorageError::Timeout`; the inner future is
//! dropped, which cancels its work.

use async_trait::async_trait;
use station_core::{
    ApiKeyRecord, Logbook, LogbookId, NewLogbook, Qso, StationResult, StorageError, Timestamp,
    User,
};
use station_storage::{LogbookStore, StoreTransaction};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

async fn timed<T, F>(limit: Duration, operation: &'static str, fut: F) -> StationResult<T>
where
    F: Future<Output = StationResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, timeout_ms = limit.as_millis() as u64, "store call timed out");
            Err(StorageError::Timeout {
                operation: operation.to_string(),
            }
            .into())
        }
    }
}

/// A [`LogbookStore`] whose calls each get the same deadline.
#[derive(Clone)]
pub struct TimedStore {
    inner: Arc<dyn LogbookStore>,
    limit: Duration,
}

impl TimedStore {
    pub fn new(inner: Arc<dyn LogbookStore>, limit: Duration) -> Self {
        Self { inner, limit }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }
}

#[async_trait]
impl LogbookStore for TimedStore {
    async fn fetch_user_by_callsign(&self, callsign: &str) -> StationResult<Option<User>> {
        timed(
            self.limit,
            "fetch_user_by_callsign",
            self.inner.fetch_user_by_callsign(callsign),
        )
        .await
    }

    async fn fetch_api_key_by_prefix(&self, prefix: &str) -> StationResult<Option<ApiKeyRecord>> {
        timed(
            self.limit,
            "fetch_api_key_by_prefix",
            self.inner.fetch_api_key_by_prefix(prefix),
        )
        .await
    }

    async fn fetch_logbook_by_id(&self, id: LogbookId) -> StationResult<Option<Logbook>> {
        timed(
            self.limit,
            "fetch_logbook_by_id",
            self.inner.fetch_logbook_by_id(id),
        )
        .await
    }

    async fn begin(&self) -> StationResult<Box<dyn StoreTransaction>> {
        let inner = timed(self.limit, "begin", self.inner.begin()).await?;
        Ok(Box::new(TimedTransaction {
            inner,
            limit: self.limit,
        }))
    }

    async fn insert_qso(&self, qso: &Qso) -> StationResult<Qso> {
        timed(self.limit, "insert_qso", self.inner.insert_qso(qso)).await
    }

    async fn revoke_api_key(&self, prefix: &str, at: Timestamp) -> StationResult<bool> {
        timed(
            self.limit,
            "revoke_api_key",
            self.inner.revoke_api_key(prefix, at),
        )
        .await
    }

    async fn health_check(&self) -> StationResult<()> {
        timed(self.limit, "health_check", self.inner.health_check()).await
    }
}

struct TimedTransaction {
    inner: Box<dyn StoreTransaction>,
    limit: Duration,
}

#[async_trait]
impl StoreTransaction for TimedTransaction {
    async fn insert_logbook(&mut self, logbook: &NewLogbook) -> StationResult<Logbook> {
        timed(
            self.limit,
            "insert_logbook",
            self.inner.insert_logbook(logbook),
        )
        .await
    }

    async fn insert_api_key(
        &mut self,
        prefix: &str,
        digest_hex: &str,
        logbook_id: LogbookId,
    ) -> StationResult<()> {
        timed(
            self.limit,
            "insert_api_key",
            self.inner.insert_api_key(prefix, digest_hex, logbook_id),
        )
        .await
    }

    async fn commit(self: Box<Self>) -> StationResult<()> {
        let limit = self.limit;
        timed(limit, "commit", self.inner.commit()).await
    }

    async fn rollback(self: Box<Self>) -> StationResult<()> {
        let limit = self.limit;
        timed(limit, "rollback", self.inner.rollback()).await
    }
}
