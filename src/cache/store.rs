//! TTL Store Module
//!
//! Key to entry store with per-key time-to-live. Expired entries read as
//! absent and are deleted by whichever operation finds them.

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::cache::shards::Shards;
use crate::cache::stats::StatsRecorder;
use crate::cache::{BoundedEvictingMap, CacheStats, DropEvicted, Entry, Ttl};
use crate::clock::Clock;

// == Entry Table ==
/// Backing map: plain, or capacity-bounded with LRU eviction.
///
/// Both variants are striped; a plain slot holds `Some` while it is mapped.
enum Table<K, V> {
    Plain(Shards<K, Option<Entry<V>>>),
    Bounded(BoundedEvictingMap<K, Entry<V>>),
}

impl<K, V> Table<K, V>
where
    K: Hash + Eq + Clone,
{
    fn compute<Q, R, F>(&self, key: &Q, f: F) -> R
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
        F: FnOnce(&mut Option<Entry<V>>) -> R,
    {
        match self {
            Table::Plain(shards) => {
                let mut slots = shards.shard_for(key).lock();
                match slots.get_mut(key) {
                    Some(slot) => {
                        let result = f(&mut *slot);
                        if slot.is_none() {
                            slots.remove(key);
                        }
                        result
                    }
                    None => {
                        let mut slot = None;
                        let result = f(&mut slot);
                        if slot.is_some() {
                            slots.insert(key.to_owned(), slot);
                        }
                        result
                    }
                }
            }
            Table::Bounded(map) => map.compute(key, f),
        }
    }

    fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&K, &mut Entry<V>) -> bool,
    {
        match self {
            Table::Plain(shards) => shards
                .iter()
                .map(|shard| {
                    let mut slots = shard.lock();
                    let before = slots.len();
                    slots.retain(|key, slot| slot.as_mut().is_some_and(|entry| keep(key, entry)));
                    before - slots.len()
                })
                .sum(),
            Table::Bounded(map) => map.retain(keep),
        }
    }

    fn len(&self) -> usize {
        match self {
            Table::Plain(shards) => shards.len(),
            Table::Bounded(map) => map.len(),
        }
    }

    fn evictions(&self) -> u64 {
        match self {
            Table::Plain(_) => 0,
            Table::Bounded(map) => map.evictions(),
        }
    }

    fn capacity(&self) -> Option<usize> {
        match self {
            Table::Plain(_) => None,
            Table::Bounded(map) => Some(map.capacity()),
        }
    }
}

/// Empties `slot` if it holds an entry that is no longer valid at `now`.
fn drop_expired<V>(slot: &mut Option<Entry<V>>, now: DateTime<Utc>) -> bool {
    if slot.as_ref().is_some_and(|entry| !entry.is_valid(now)) {
        *slot = None;
        true
    } else {
        false
    }
}

// == TTL Store ==
/// Thread-safe store with per-entry TTL and named attributes.
///
/// Misses are never errors: absent and expired keys both read as `None`.
pub struct TtlStore<K, V> {
    /// Entry storage
    table: Table<K, V>,
    /// Time source for expiry
    clock: Arc<dyn Clock>,
    /// TTL applied by `put_default`
    default_ttl: Ttl,
    /// Performance statistics
    stats: StatsRecorder,
}

impl<K, V> TtlStore<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates an unbounded store.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_table(Table::Plain(Shards::new()), clock)
    }

    /// Creates a store holding at most `capacity` entries, evicting the least
    /// recently used one on overflow.
    pub fn bounded(capacity: NonZeroUsize, clock: Arc<dyn Clock>) -> Self {
        Self::with_table(
            Table::Bounded(BoundedEvictingMap::new(capacity, DropEvicted)),
            clock,
        )
    }

    fn with_table(table: Table<K, V>, clock: Arc<dyn Clock>) -> Self {
        Self {
            table,
            clock,
            default_ttl: Ttl::Forever,
            stats: StatsRecorder::default(),
        }
    }

    /// Sets the TTL used by [`TtlStore::put_default`].
    pub fn with_default_ttl(mut self, ttl: Ttl) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn default_ttl(&self) -> Ttl {
        self.default_ttl
    }

    fn record_expired(&self, expired: bool) {
        if expired {
            self.stats.record_expirations(1);
            trace!("Dropped expired entry on access");
        }
    }

    // == Get ==
    /// Retrieves the value for `key`.
    ///
    /// Returns None if the key is absent, expired (and now deleted), or only
    /// carries attributes.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        let now = self.clock.now();
        let (value, expired) = self.table.compute(key, |slot| {
            let expired = drop_expired(slot, now);
            (slot.as_ref().and_then(|entry| entry.value().cloned()), expired)
        });

        self.record_expired(expired);
        if value.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        value
    }

    // == Put ==
    /// Stores `value` under `key` for `ttl`.
    ///
    /// A still-valid entry is updated in place and keeps its attributes; an
    /// absent or expired one is replaced wholesale.
    pub fn put<Q>(&self, key: &Q, value: V, ttl: Ttl)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        let now = self.clock.now();
        let expires_at = ttl.expires_at(now);
        let expired = self.table.compute(key, |slot| {
            let expired = drop_expired(slot, now);
            if let Some(entry) = slot.as_mut() {
                entry.update(Some(value), expires_at);
            } else {
                *slot = Some(Entry::new(Some(value), expires_at));
            }
            expired
        });
        self.record_expired(expired);
    }

    /// Stores `value` under `key` for the store's default TTL.
    pub fn put_default<Q>(&self, key: &Q, value: V)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        self.put(key, value, self.default_ttl);
    }

    // == Put Attribute ==
    /// Sets attribute `name` on the entry for `key`.
    ///
    /// If no valid entry exists, one is created with no value and the given
    /// `ttl`. The `ttl` is only used in that case: an existing valid entry
    /// keeps its current expiry.
    pub fn put_attribute<Q>(&self, key: &Q, name: &str, value: V, ttl: Ttl)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        let now = self.clock.now();
        let expired = self.table.compute(key, |slot| {
            let expired = drop_expired(slot, now);
            slot.get_or_insert_with(|| Entry::new(None, ttl.expires_at(now)))
                .attributes_mut()
                .insert(name.to_string(), value);
            expired
        });
        self.record_expired(expired);
    }

    // == Get Attribute ==
    /// Retrieves attribute `name` of the entry for `key`.
    ///
    /// An expired entry is deleted, value side included.
    pub fn get_attribute<Q>(&self, key: &Q, name: &str) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        let now = self.clock.now();
        let (value, expired) = self.table.compute(key, |slot| {
            let expired = drop_expired(slot, now);
            (
                slot.as_ref().and_then(|entry| entry.attribute(name).cloned()),
                expired,
            )
        });

        self.record_expired(expired);
        if value.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        value
    }

    // == Remove ==
    /// Deletes the entry for `key`, expired or not.
    ///
    /// Returns true if an entry was present.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        self.table.compute(key, |slot| slot.take()).is_some()
    }

    // == Purge Expired ==
    /// Removes all expired entries.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let removed = self.table.retain(|_, entry| entry.is_valid(now));
        if removed > 0 {
            self.stats.record_expirations(removed as u64);
            debug!(removed, "Purged expired entries");
        }
        removed
    }

    // == Stats ==
    /// Returns current store statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats
            .snapshot(self.table.evictions(), self.table.len())
    }

    // == Length ==
    /// Returns the number of stored entries, expired ones not yet purged
    /// included.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries, None when unbounded.
    pub fn capacity(&self) -> Option<usize> {
        self.table.capacity()
    }
}

impl<K, V> fmt::Debug for TtlStore<K, V>
where
    K: Hash + Eq + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlStore")
            .field("len", &self.table.len())
            .field("capacity", &self.table.capacity())
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}
