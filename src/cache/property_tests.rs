//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the bounded map and the TTL store against simple
//! sequential reference models.

use proptest::prelude::*;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::{BoundedEvictingMap, Ttl, TtlStore};
use crate::clock::ManualClock;

// == Strategies ==
/// Keys drawn from a small space so operations collide often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-f]".prop_map(|s| s)
}

fn ttl_strategy() -> impl Strategy<Value = Ttl> {
    prop_oneof![Just(Ttl::Forever), (0u32..5).prop_map(Ttl::Seconds)]
}

#[derive(Debug, Clone)]
enum MapOp {
    Get { key: String },
    Insert { key: String, value: u32 },
    Remove { key: String },
}

fn map_op_strategy() -> impl Strategy<Value = MapOp> {
    prop_oneof![
        key_strategy().prop_map(|key| MapOp::Get { key }),
        (key_strategy(), any::<u32>()).prop_map(|(key, value)| MapOp::Insert { key, value }),
        key_strategy().prop_map(|key| MapOp::Remove { key }),
    ]
}

#[derive(Debug, Clone)]
enum StoreOp {
    Put { key: String, value: u32, ttl: Ttl },
    Get { key: String },
    PutAttribute { key: String, name: String, value: u32, ttl: Ttl },
    GetAttribute { key: String, name: String },
    Remove { key: String },
    Advance { secs: u64 },
}

fn store_op_strategy() -> impl Strategy<Value = StoreOp> {
    let name = "[xy]".prop_map(|s| s);
    prop_oneof![
        (key_strategy(), any::<u32>(), ttl_strategy())
            .prop_map(|(key, value, ttl)| StoreOp::Put { key, value, ttl }),
        key_strategy().prop_map(|key| StoreOp::Get { key }),
        (key_strategy(), name.clone(), any::<u32>(), ttl_strategy()).prop_map(
            |(key, name, value, ttl)| StoreOp::PutAttribute { key, name, value, ttl }
        ),
        (key_strategy(), name).prop_map(|(key, name)| StoreOp::GetAttribute { key, name }),
        key_strategy().prop_map(|key| StoreOp::Remove { key }),
        (0u64..4).prop_map(|secs| StoreOp::Advance { secs }),
    ]
}

// == Reference Models ==
/// Sequential LRU list, oldest first.
struct LruModel {
    capacity: usize,
    entries: Vec<(String, u32)>,
    evicted: Vec<(String, u32)>,
}

impl LruModel {
    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    fn get(&mut self, key: &str) -> Option<u32> {
        let index = self.position(key)?;
        let entry = self.entries.remove(index);
        let value = entry.1;
        self.entries.push(entry);
        Some(value)
    }

    fn insert(&mut self, key: &str, value: u32) -> Option<u32> {
        let previous = self.position(key).map(|index| self.entries.remove(index).1);
        self.entries.push((key.to_string(), value));
        if self.entries.len() > self.capacity {
            let oldest = self.entries.remove(0);
            self.evicted.push(oldest);
        }
        previous
    }

    fn remove(&mut self, key: &str) -> Option<u32> {
        let index = self.position(key)?;
        Some(self.entries.remove(index).1)
    }
}

struct ModelEntry {
    value: Option<u32>,
    expires_at: Option<u64>,
    attributes: HashMap<String, u32>,
}

/// Sequential TTL store over a seconds counter.
#[derive(Default)]
struct TtlModel {
    now: u64,
    entries: HashMap<String, ModelEntry>,
}

impl TtlModel {
    fn expires_at(&self, ttl: Ttl) -> Option<u64> {
        match ttl {
            Ttl::Forever => None,
            Ttl::Seconds(secs) => Some(self.now + u64::from(secs)),
        }
    }

    /// Drops `key` if expired and returns the live entry, if any.
    fn live(&mut self, key: &str) -> Option<&mut ModelEntry> {
        let now = self.now;
        if self
            .entries
            .get(key)
            .is_some_and(|entry| entry.expires_at.is_some_and(|at| now >= at))
        {
            self.entries.remove(key);
        }
        self.entries.get_mut(key)
    }

    fn put(&mut self, key: &str, value: u32, ttl: Ttl) {
        let expires_at = self.expires_at(ttl);
        match self.live(key) {
            Some(entry) => {
                entry.value = Some(value);
                entry.expires_at = expires_at;
            }
            None => {
                self.entries.insert(
                    key.to_string(),
                    ModelEntry {
                        value: Some(value),
                        expires_at,
                        attributes: HashMap::new(),
                    },
                );
            }
        }
    }

    fn put_attribute(&mut self, key: &str, name: &str, value: u32, ttl: Ttl) {
        let expires_at = self.expires_at(ttl);
        if self.live(key).is_none() {
            self.entries.insert(
                key.to_string(),
                ModelEntry {
                    value: None,
                    expires_at,
                    attributes: HashMap::new(),
                },
            );
        }
        if let Some(entry) = self.entries.get_mut(key) {
            entry.attributes.insert(name.to_string(), value);
        }
    }
}

fn recording_map(capacity: usize) -> (BoundedEvictingMap<String, u32>, Arc<Mutex<Vec<(String, u32)>>>) {
    let evicted = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&evicted);
    let map = BoundedEvictingMap::new(
        NonZeroUsize::new(capacity).unwrap(),
        move |key: &String, value: u32| sink.lock().push((key.clone(), value)),
    );
    (map, evicted)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    // The map never holds more than its capacity after an operation returns
    #[test]
    fn prop_capacity_invariant(
        capacity in 1usize..5,
        ops in prop::collection::vec(map_op_strategy(), 1..80),
    ) {
        let (map, evicted) = recording_map(capacity);
        let mut inserted = 0usize;

        for op in ops {
            match op {
                MapOp::Get { key } => { map.get(key.as_str()); }
                MapOp::Insert { key, value } => {
                    if map.insert(key, value).is_none() {
                        inserted += 1;
                    }
                }
                MapOp::Remove { key } => {
                    if map.remove(key.as_str()).is_some() {
                        inserted -= 1;
                    }
                }
            }
            prop_assert!(map.len() <= capacity);
            prop_assert_eq!(inserted - evicted.lock().len(), map.len());
        }
    }

    // Reads, writes, removals and evictions match a sequential LRU list
    #[test]
    fn prop_lru_matches_reference_model(
        capacity in 1usize..5,
        ops in prop::collection::vec(map_op_strategy(), 1..80),
    ) {
        let (map, evicted) = recording_map(capacity);
        let mut model = LruModel { capacity, entries: Vec::new(), evicted: Vec::new() };

        for op in ops {
            match op {
                MapOp::Get { key } => {
                    prop_assert_eq!(map.get(key.as_str()), model.get(&key));
                }
                MapOp::Insert { key, value } => {
                    let expected = model.insert(&key, value);
                    prop_assert_eq!(map.insert(key, value), expected);
                }
                MapOp::Remove { key } => {
                    prop_assert_eq!(map.remove(key.as_str()), model.remove(&key));
                }
            }
        }

        let expected_keys: Vec<String> = model.entries.iter().map(|(k, _)| k.clone()).collect();
        prop_assert_eq!(map.keys(), expected_keys);
        prop_assert_eq!(evicted.lock().clone(), model.evicted);
    }

    // Values, attributes and lazy expiry match a sequential model under a
    // simulated clock
    #[test]
    fn prop_ttl_store_matches_reference_model(
        ops in prop::collection::vec(store_op_strategy(), 1..80),
    ) {
        let clock = Arc::new(ManualClock::new());
        let store: TtlStore<String, u32> = TtlStore::new(clock.clone());
        let mut model = TtlModel::default();
        let (mut hits, mut misses) = (0u64, 0u64);

        for op in ops {
            match op {
                StoreOp::Put { key, value, ttl } => {
                    store.put(key.as_str(), value, ttl);
                    model.put(&key, value, ttl);
                }
                StoreOp::Get { key } => {
                    let expected = model.live(&key).and_then(|entry| entry.value);
                    let actual = store.get(key.as_str());
                    if actual.is_some() { hits += 1 } else { misses += 1 }
                    prop_assert_eq!(actual, expected);
                }
                StoreOp::PutAttribute { key, name, value, ttl } => {
                    store.put_attribute(key.as_str(), &name, value, ttl);
                    model.put_attribute(&key, &name, value, ttl);
                }
                StoreOp::GetAttribute { key, name } => {
                    let expected = model
                        .live(&key)
                        .and_then(|entry| entry.attributes.get(&name).copied());
                    let actual = store.get_attribute(key.as_str(), &name);
                    if actual.is_some() { hits += 1 } else { misses += 1 }
                    prop_assert_eq!(actual, expected);
                }
                StoreOp::Remove { key } => {
                    let expected = model.entries.remove(&key).is_some();
                    prop_assert_eq!(store.remove(key.as_str()), expected);
                }
                StoreOp::Advance { secs } => {
                    clock.advance_secs(secs);
                    model.now += secs;
                }
            }
        }

        let stats = store.stats();
        prop_assert_eq!(stats.hits, hits);
        prop_assert_eq!(stats.misses, misses);

        // Purging leaves exactly the entries the model still considers live
        store.purge_expired();
        let now = model.now;
        let live = model
            .entries
            .values()
            .filter(|entry| entry.expires_at.map_or(true, |at| now < at))
            .count();
        prop_assert_eq!(store.len(), live);
    }

    // A forever entry survives any amount of simulated time
    #[test]
    fn prop_forever_survives_clock_advance(advances in prop::collection::vec(0u64..1_000_000_000, 1..10)) {
        let clock = Arc::new(ManualClock::new());
        let store: TtlStore<String, u32> = TtlStore::new(clock.clone());
        store.put("k", 7, Ttl::Forever);

        for secs in advances {
            clock.advance_secs(secs);
            prop_assert_eq!(store.get("k"), Some(7));
        }
    }
}
