//! Logbook cache for the authorization hot path.
//!
//! [`LogbookCache`] is a bounded, TTL-aware LRU keyed by logbook id.
//! [`ReadThroughCache`] puts it in front of any [`StorageFetcher`] (every
//! [`LogbookStore`](crate::LogbookStore) is one) and reports what happened to
//! an optional [`CacheObserver`].
//!
//! # Example
//!
//! ```ignore
//! let cache = Arc::new(LogbookCache::new(&CacheConfig::default()));
//! let read_through = ReadThroughCache::new(cache);
//! let logbook = read_through.get_logbook(id, &store).await?;
//! ```

pub mod lru;
pub mod read_through;
pub mod traits;

pub use lru::LogbookCache;
pub use read_through::{CacheConfig, ReadThroughCache, StorageFetcher};
pub use traits::{CacheEvent, CacheObserver, CacheStats};
