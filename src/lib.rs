//! Scope Cache - bounded scope registry and TTL output caches
//!
//! Keeps per-view object scopes under a least-recently-used capacity bound,
//! destroying the objects of every scope that is evicted or ended, and
//! provides application and session output caches with per-key expiry.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod provider;
pub mod scope;
pub mod tasks;

pub use cache::{BoundedEvictingMap, CacheStats, EvictionListener, Ttl, TtlStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{CacheError, Result};
pub use provider::{
    Cache, CacheProvider, DefaultCacheProvider, ProviderRegistry, ScopeContext, ScopeKind,
};
pub use scope::{Destroyer, DropOnly, ScopeRegistry, ScopeStats};
pub use tasks::spawn_purge_task;
