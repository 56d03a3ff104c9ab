//! Shard Array Module
//!
//! Fixed set of independently locked hash buckets shared by the plain and the
//! bounded tables. A key always hashes to the same bucket for the life of the
//! array, so operations on keys in different buckets never contend.

use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

use parking_lot::Mutex;

// == Public Constants ==
/// Number of independently locked buckets (power of two)
pub const SHARD_COUNT: usize = 16;

pub(crate) struct Shards<K, S> {
    shards: Box<[Mutex<HashMap<K, S>>]>,
    hasher: RandomState,
}

impl<K, S> Shards<K, S>
where
    K: Hash + Eq,
{
    pub(crate) fn new() -> Self {
        let shards = (0..SHARD_COUNT)
            .map(|_| Mutex::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            shards,
            hasher: RandomState::new(),
        }
    }

    /// Bucket holding `key`.
    pub(crate) fn shard_for<Q>(&self, key: &Q) -> &Mutex<HashMap<K, S>>
    where
        K: Borrow<Q>,
        Q: Hash + ?Sized,
    {
        let index = self.hasher.hash_one(key) as usize & (SHARD_COUNT - 1);
        &self.shards[index]
    }

    /// Every bucket, locked one at a time by the caller.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Mutex<HashMap<K, S>>> {
        self.shards.iter()
    }

    /// Total entries, summed bucket by bucket.
    pub(crate) fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }
}
