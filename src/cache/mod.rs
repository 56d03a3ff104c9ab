//! Cache Module
//!
//! Bounded LRU map with eviction callbacks, and a TTL store layered on a
//! plain or bounded map.

mod bounded;
mod entry;
mod lru;
mod shards;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use bounded::{BoundedEvictingMap, DropEvicted, EvictionListener};
pub use entry::{Entry, Ttl};
pub use lru::LruTracker;
pub use shards::SHARD_COUNT;
pub use stats::CacheStats;
pub use store::TtlStore;
