//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use station_core::{KeyDigester, StationResult};
use station_storage::{LogbookCache, LogbookStore, ReadThroughCache};

use crate::config::ApiConfig;
use crate::telemetry::CacheMetricsObserver;
use crate::timed_store::TimedStore;

/// Application-wide state shared across all routes.
///
/// The logbook cache is built here from [`ApiConfig::cache`] and injected;
/// nothing else holds one.
#[derive(Clone)]
pub struct AppState {
    /// Store with the per-call storage deadline applied.
    pub store: Arc<dyn LogbookStore>,
    /// Cache-first logbook resolution for the API-key path.
    pub logbooks: ReadThroughCache,
    pub digester: KeyDigester,
    pub config: Arc<ApiConfig>,
    pub start_time: Instant,
}

impl AppState {
    /// Build state around `store`. Fails only if the pepper is unusable.
    pub fn new(store: Arc<dyn LogbookStore>, config: ApiConfig) -> StationResult<Self> {
        let digester = KeyDigester::new(config.api_key_pepper.clone())?;
        let cache = Arc::new(LogbookCache::new(&config.cache));
        let logbooks = ReadThroughCache::new(cache).with_observer(Arc::new(CacheMetricsObserver));
        let store: Arc<dyn LogbookStore> =
            Arc::new(TimedStore::new(store, config.storage_timeout));

        tracing::info!(
            cache_enabled = config.cache.enabled,
            cache_capacity = logbooks.cache().capacity(),
            peppered = digester.is_peppered(),
            "application state ready"
        );

        Ok(Self {
            store,
            logbooks,
            digester,
            config: Arc::new(config),
            start_time: Instant::now(),
        })
    }
}

crate::impl_from_ref!(Arc<dyn LogbookStore>, store);
crate::impl_from_ref!(ReadThroughCache, logbooks);
crate::impl_from_ref!(KeyDigester, digester);
crate::impl_from_ref!(Arc<ApiConfig>, config);
