//! LRU Tracker Module
//!
//! Implements Least Recently Used ordering for bounded eviction.

use std::borrow::Borrow;
use std::collections::BTreeMap;

// == LRU Tracker ==
/// Tracks access order for LRU eviction.
///
/// Every touch hands out a fresh stamp from a monotonic counter, so two
/// touches never tie regardless of clock resolution. The caller stores the
/// stamp next to the value and passes it back on the next touch.
///
/// - Lowest stamp = least recently used
/// - Highest stamp = most recently used
#[derive(Debug)]
pub struct LruTracker<K> {
    /// Keys by access stamp
    order: BTreeMap<u64, K>,
    /// Next stamp to hand out
    next_stamp: u64,
}

impl<K: Clone> LruTracker<K> {
    // == Constructor ==
    /// Creates a new empty LRU tracker.
    pub fn new() -> Self {
        Self {
            order: BTreeMap::new(),
            next_stamp: 0,
        }
    }

    // == Touch ==
    /// Marks a key as most recently used and returns its new stamp.
    ///
    /// `previous` is the stamp from the key's last touch. If that stamp is no
    /// longer tracked (new key, or detached by an eviction in flight) the key
    /// is simply added again.
    pub fn touch(&mut self, previous: Option<u64>, key: &K) -> u64 {
        self.touch_with(previous, || key.clone())
    }

    /// Like [`LruTracker::touch`], but only builds the key when `previous`
    /// is not tracked.
    pub fn touch_with<F>(&mut self, previous: Option<u64>, make_key: F) -> u64
    where
        F: FnOnce() -> K,
    {
        let key = previous
            .and_then(|stamp| self.order.remove(&stamp))
            .unwrap_or_else(make_key);
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        self.order.insert(stamp, key);
        stamp
    }

    // == Forget ==
    /// Stops tracking the key touched with `stamp`.
    pub fn forget(&mut self, stamp: u64) -> Option<K> {
        self.order.remove(&stamp)
    }

    // == Evict Oldest ==
    /// Detaches and returns the least recently used key other than `protect`.
    ///
    /// Returns None if no such key is tracked.
    pub fn evict_oldest_except<Q>(&mut self, protect: &Q) -> Option<(u64, K)>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let stamp = self
            .order
            .iter()
            .find(|(_, key)| <K as Borrow<Q>>::borrow(key) != protect)
            .map(|(stamp, _)| *stamp)?;
        self.order.remove(&stamp).map(|key| (stamp, key))
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    pub fn peek_oldest(&self) -> Option<&K> {
        self.order.values().next()
    }

    // == Keys ==
    /// Tracked keys from least to most recently used.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.order.values()
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Stops tracking every key.
    pub fn clear(&mut self) {
        self.order.clear();
    }
}

impl<K: Clone> Default for LruTracker<K> {
    fn default() -> Self {
        Self::new()
    }
}
