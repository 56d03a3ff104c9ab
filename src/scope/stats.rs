//! Scope Statistics Module
//!
//! Tracks scope lifecycle counts for a registry.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Scope Stats ==
/// Snapshot of scope registry metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScopeStats {
    /// Scopes currently tracked
    pub active_scopes: usize,
    /// Bound on concurrently tracked scopes
    pub max_active_scopes: usize,
    /// Child stores created
    pub scopes_created: u64,
    /// Scopes destroyed by the capacity bound
    pub scopes_evicted: u64,
    /// Scopes destroyed by an end-of-scope or container-end signal
    pub scopes_ended: u64,
    /// Objects that received their destroy callback
    pub objects_destroyed: u64,
    /// Destroy callbacks that returned an error or panicked
    pub destroy_failures: u64,
}

// == Scope Counters ==
#[derive(Debug, Default)]
pub(crate) struct ScopeCounters {
    created: AtomicU64,
    evicted: AtomicU64,
    ended: AtomicU64,
    objects_destroyed: AtomicU64,
    destroy_failures: AtomicU64,
}

impl ScopeCounters {
    pub(crate) fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_evicted(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ended(&self) {
        self.ended.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a destroy callback; failures still count as destroyed.
    pub(crate) fn record_destroyed(&self, succeeded: bool) {
        self.objects_destroyed.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.destroy_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn snapshot(&self, active_scopes: usize, max_active_scopes: usize) -> ScopeStats {
        ScopeStats {
            active_scopes,
            max_active_scopes,
            scopes_created: self.created.load(Ordering::Relaxed),
            scopes_evicted: self.evicted.load(Ordering::Relaxed),
            scopes_ended: self.ended.load(Ordering::Relaxed),
            objects_destroyed: self.objects_destroyed.load(Ordering::Relaxed),
            destroy_failures: self.destroy_failures.load(Ordering::Relaxed),
        }
    }
}
