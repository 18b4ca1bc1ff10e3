//! Station Storage - Store Traits, In-Memory Store and Logbook Cache
//!
//! Defines the storage abstraction used by the request pipeline and the
//! provisioning transaction. The Postgres implementation lives in
//! station-api.

pub mod cache;
pub mod memory;
pub mod store;

pub use cache::{
    CacheConfig, CacheEvent, CacheObserver, CacheStats, LogbookCache, ReadThroughCache,
    StorageFetcher,
};
pub use memory::{FaultPlan, InMemoryStore};
pub use store::{LogbookStore, StoreTransaction};
