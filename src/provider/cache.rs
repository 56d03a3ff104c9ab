//! Object-safe output cache surface handed out by cache providers.

use std::fmt::Debug;

use serde_json::Value;

use crate::cache::{CacheStats, Ttl, TtlStore};

/// Output cache over string keys and JSON values.
///
/// Misses and expired keys read as `None`; nothing here fails.
pub trait Cache: Send + Sync + Debug {
    fn get(&self, key: &str) -> Option<Value>;

    fn put(&self, key: &str, value: Value, ttl: Ttl);

    /// Sets an attribute, creating a value-less entry with `ttl` if the key
    /// has no valid entry. An existing entry keeps its expiry.
    fn put_attribute(&self, key: &str, name: &str, value: Value, ttl: Ttl);

    fn get_attribute(&self, key: &str, name: &str) -> Option<Value>;

    /// Returns true if an entry was present.
    fn remove(&self, key: &str) -> bool;

    /// TTL used by [`Cache::put_default`].
    fn default_ttl(&self) -> Ttl {
        Ttl::Forever
    }

    fn put_default(&self, key: &str, value: Value) {
        self.put(key, value, self.default_ttl());
    }

    /// Drops every expired entry, returning how many were removed.
    fn purge_expired(&self) -> usize {
        0
    }

    fn stats(&self) -> CacheStats;
}

impl Cache for TtlStore<String, Value> {
    fn get(&self, key: &str) -> Option<Value> {
        TtlStore::get(self, key)
    }

    fn put(&self, key: &str, value: Value, ttl: Ttl) {
        TtlStore::put(self, key, value, ttl);
    }

    fn put_attribute(&self, key: &str, name: &str, value: Value, ttl: Ttl) {
        TtlStore::put_attribute(self, key, name, value, ttl);
    }

    fn get_attribute(&self, key: &str, name: &str) -> Option<Value> {
        TtlStore::get_attribute(self, key, name)
    }

    fn remove(&self, key: &str) -> bool {
        TtlStore::remove(self, key)
    }

    fn default_ttl(&self) -> Ttl {
        TtlStore::default_ttl(self)
    }

    fn purge_expired(&self) -> usize {
        TtlStore::purge_expired(self)
    }

    fn stats(&self) -> CacheStats {
        TtlStore::stats(self)
    }
}
