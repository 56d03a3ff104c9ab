//! Bounded Evicting Map Module
//!
//! Fixed-capacity concurrent map that evicts the least recently used entry
//! and hands it to an eviction listener.
//!
//! Locking is split in two levels:
//! - one mutex per bucket guards the entries hashed into it
//! - one mutex guards the recency ordering, held only for stamp bookkeeping
//!
//! Locks are always taken bucket first, ordering second. Eviction detaches
//! the victim from the ordering, releases it, then removes the victim from its
//! bucket and calls the listener with no lock held. A reader that touches the
//! victim in between wins: the stamp no longer matches and the victim stays.

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::trace;

use crate::cache::shards::Shards;
use crate::cache::LruTracker;

// == Eviction Listener ==
/// Receives entries removed because the map exceeded its capacity.
///
/// Never called for explicit removals.
pub trait EvictionListener<K, V>: Send + Sync {
    fn on_evict(&self, key: &K, value: V);
}

impl<K, V, F> EvictionListener<K, V> for F
where
    F: Fn(&K, V) + Send + Sync,
{
    fn on_evict(&self, key: &K, value: V) {
        self(key, value)
    }
}

/// Listener that drops evicted entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct DropEvicted;

impl<K, V> EvictionListener<K, V> for DropEvicted {
    fn on_evict(&self, _key: &K, _value: V) {}
}

/// A mapped value and its recency stamp. `value` is always `Some` while the
/// slot sits in a bucket.
struct Slot<V> {
    value: Option<V>,
    stamp: u64,
}

// == Bounded Evicting Map ==
/// Concurrent LRU map holding at most `capacity` entries.
pub struct BoundedEvictingMap<K, V> {
    shards: Shards<K, Slot<V>>,
    order: Mutex<LruTracker<K>>,
    capacity: NonZeroUsize,
    evictions: AtomicU64,
    listener: Box<dyn EvictionListener<K, V>>,
}

impl<K, V> BoundedEvictingMap<K, V>
where
    K: Hash + Eq + Clone,
{
    // == Constructor ==
    /// Creates an empty map that calls `listener` for every evicted entry.
    pub fn new(capacity: NonZeroUsize, listener: impl EvictionListener<K, V> + 'static) -> Self {
        Self {
            shards: Shards::new(),
            order: Mutex::new(LruTracker::new()),
            capacity,
            evictions: AtomicU64::new(0),
            listener: Box::new(listener),
        }
    }

    // == Compute ==
    /// Runs `f` on the slot for `key` under the bucket lock.
    ///
    /// `f` sees `Some(value)` if the key is present and may replace, update or
    /// take it. Leaving `Some` marks the key most recently used; leaving `None`
    /// removes it without notifying the listener. If the call adds a key and
    /// the map grows past capacity, the least recently used other key is
    /// evicted and the listener has run by the time this returns.
    pub fn compute<Q, R, F>(&self, key: &Q, f: F) -> R
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
        F: FnOnce(&mut Option<V>) -> R,
    {
        let mut over_capacity = false;

        let result = {
            let mut slots = self.shards.shard_for(key).lock();
            match slots.get_mut(key) {
                Some(slot) => {
                    let result = f(&mut slot.value);
                    if slot.value.is_some() {
                        let mut order = self.order.lock();
                        slot.stamp = order.touch_with(Some(slot.stamp), || key.to_owned());
                        over_capacity = order.len() > self.capacity.get();
                    } else {
                        let stamp = slot.stamp;
                        slots.remove(key);
                        self.order.lock().forget(stamp);
                    }
                    result
                }
                None => {
                    let mut value = None;
                    let result = f(&mut value);
                    if value.is_some() {
                        let owned_key = key.to_owned();
                        let stamp = {
                            let mut order = self.order.lock();
                            let stamp = order.touch(None, &owned_key);
                            over_capacity = order.len() > self.capacity.get();
                            stamp
                        };
                        slots.insert(owned_key, Slot { value, stamp });
                    }
                    result
                }
            }
        };

        if over_capacity {
            self.evict_overflow(key);
        }
        result
    }

    // == Evict Overflow ==
    fn evict_overflow<Q>(&self, protect: &Q)
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        loop {
            let (stamp, victim) = {
                let mut order = self.order.lock();
                if order.len() <= self.capacity.get() {
                    return;
                }
                match order.evict_oldest_except(protect) {
                    Some(detached) => detached,
                    None => return,
                }
            };

            let evicted = {
                let mut slots = self.shards.shard_for::<K>(&victim).lock();
                match slots.get::<K>(&victim) {
                    Some(slot) if slot.stamp == stamp => {
                        slots.remove::<K>(&victim).and_then(|slot| slot.value)
                    }
                    // Touched or removed since it was detached
                    _ => None,
                }
            };

            if let Some(value) = evicted {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                trace!(stamp, "Evicting least recently used entry");
                self.listener.on_evict(&victim, value);
            }
        }
    }

    // == Get Or Create ==
    /// Returns the value for `key`, building and inserting it if absent.
    ///
    /// `factory` runs under the bucket lock, so concurrent callers for the
    /// same key never build two values. It must not call back into this map.
    pub fn get_or_create<Q, F>(&self, key: &Q, factory: F) -> V
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
        V: Clone,
        F: FnOnce() -> V,
    {
        self.compute(key, |slot| slot.get_or_insert_with(factory).clone())
    }

    // == Get ==
    /// Returns the value for `key` and marks it most recently used.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
        V: Clone,
    {
        self.compute(key, |slot| slot.clone())
    }

    // == Peek ==
    /// Returns the value for `key` without touching its recency.
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.shards
            .shard_for(key)
            .lock()
            .get(key)
            .and_then(|slot| slot.value.clone())
    }

    /// Checks presence without touching recency.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shards.shard_for(key).lock().contains_key(key)
    }

    // == Insert ==
    /// Stores `value` under `key`, returning the previous value.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.compute(&key, |slot| slot.replace(value))
    }

    // == Remove ==
    /// Removes `key` explicitly. The eviction listener is not called.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
    {
        self.compute(key, Option::take)
    }

    // == Retain ==
    /// Keeps only entries for which `keep` returns true; returns how many
    /// were removed. Removals are explicit, the listener is not called.
    pub fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        let mut removed = 0;
        for shard in self.shards.iter() {
            let mut slots = shard.lock();
            let mut order = self.order.lock();
            slots.retain(|key, slot| {
                let kept = slot.value.as_mut().is_some_and(|value| keep(key, value));
                if !kept {
                    order.forget(slot.stamp);
                    removed += 1;
                }
                kept
            });
        }
        removed
    }

    // == Drain ==
    /// Removes and returns every entry. The listener is not called.
    pub fn drain(&self) -> Vec<(K, V)> {
        let mut drained = Vec::new();
        for shard in self.shards.iter() {
            let mut slots = shard.lock();
            let mut order = self.order.lock();
            for (key, slot) in slots.drain() {
                order.forget(slot.stamp);
                drained.extend(slot.value.map(|value| (key, value)));
            }
        }
        drained
    }

    // == Keys ==
    /// Keys from least to most recently used.
    pub fn keys(&self) -> Vec<K> {
        self.order.lock().keys().cloned().collect()
    }

    // == Length ==
    /// Number of entries taking part in recency ordering.
    pub fn len(&self) -> usize {
        self.order.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Total number of capacity-driven evictions so far.
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}

impl<K, V> fmt::Debug for BoundedEvictingMap<K, V>
where
    K: Hash + Eq + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedEvictingMap")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("evictions", &self.evictions())
            .finish_non_exhaustive()
    }
}
