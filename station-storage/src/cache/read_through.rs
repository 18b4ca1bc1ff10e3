//! Read-through access to logbooks.
//!
//! Serves lookups from [`LogbookCache`] and falls back to a
//! [`StorageFetcher`] on a miss, filling the cache with the default TTL.
//! The cache lock is released before the storage call is awaited.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use station_core::{EntityType, Logbook, LogbookId, StationResult, StorageError};
use tracing::debug;

use super::lru::LogbookCache;
use super::traits::{CacheEvent, CacheObserver};
use crate::store::LogbookStore;

/// Configuration for the logbook cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Whether caching is enabled at all.
    pub enabled: bool,
    /// Maximum number of cached logbooks.
    pub max_entries: usize,
    /// TTL applied when callers pass a zero TTL.
    pub entry_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 1024,
            entry_ttl: Duration::from_secs(300), // 5 minutes
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the cache.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the max entries.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = ttl;
        self
    }
}

/// Storage fetcher trait for retrieving logbooks on a cache miss.
#[async_trait]
pub trait StorageFetcher: Send + Sync {
    async fn fetch_logbook(&self, id: LogbookId) -> StationResult<Option<Logbook>>;
}

#[async_trait]
impl<T: LogbookStore + ?Sized> StorageFetcher for T {
    async fn fetch_logbook(&self, id: LogbookId) -> StationResult<Option<Logbook>> {
        self.fetch_logbook_by_id(id).await
    }
}

/// Cache-first logbook resolution.
#[derive(Clone)]
pub struct ReadThroughCache {
    cache: Arc<LogbookCache>,
    observer: Option<Arc<dyn CacheObserver>>,
}

impl std::fmt::Debug for ReadThroughCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadThroughCache")
            .field("cache", &self.cache)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

fn not_found(id: LogbookId) -> StorageError {
    StorageError::NotFound {
        entity_type: EntityType::Logbook,
        key: id.to_string(),
    }
}

impl ReadThroughCache {
    pub fn new(cache: Arc<LogbookCache>) -> Self {
        Self {
            cache,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn CacheObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get a reference to the underlying cache.
    pub fn cache(&self) -> &LogbookCache {
        &self.cache
    }

    fn emit(&self, event: CacheEvent) {
        if let Some(observer) = &self.observer {
            observer.on_event(event);
        }
    }

    /// Resolve a logbook, from cache if present, else from storage.
    ///
    /// Id 0 is never looked up. A logbook missing from storage is
    /// `StorageError::NotFound`.
    pub async fn get_logbook<F>(&self, id: LogbookId, fetcher: &F) -> StationResult<Logbook>
    where
        F: StorageFetcher + ?Sized,
    {
        if id == 0 {
            return Err(not_found(id).into());
        }

        if let Some(logbook) = self.cache.get(id) {
            self.emit(CacheEvent::Hit);
            return Ok(logbook);
        }
        self.emit(CacheEvent::Miss);

        match fetcher.fetch_logbook(id).await? {
            Some(logbook) => {
                self.cache.set(id, logbook.clone(), chrono::Duration::zero());
                self.emit(CacheEvent::Fill);
                debug!(logbook_id = id, "logbook cached");
                Ok(logbook)
            }
            None => Err(not_found(id).into()),
        }
    }

    /// Put a logbook into the cache, e.g. right after creating it.
    pub fn put(&self, logbook: &Logbook) {
        self.cache
            .set(logbook.id, logbook.clone(), chrono::Duration::zero());
    }

    /// Invalidate a single logbook.
    pub fn invalidate(&self, id: LogbookId) {
        self.cache.invalidate(id);
        self.emit(CacheEvent::Invalidate);
    }
}
