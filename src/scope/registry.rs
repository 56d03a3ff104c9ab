//! Scope Registry Module
//!
//! Bounds the number of live scope holders and destroys the objects of every
//! holder that is evicted or ended.

use std::borrow::Borrow;
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::cache::BoundedEvictingMap;
use crate::config::Config;
use crate::scope::stats::ScopeCounters;
use crate::scope::{ChildStore, Destroyer, ScopeStats};

/// Consecutive failed attempts after which `create_object` logs a warning.
const RETRY_WARN_THRESHOLD: u32 = 16;

// == Scope Registry ==
/// One [`ChildStore`] per scope holder, at most `max_active_scopes` at once.
///
/// Each holder goes `UNSEEN -> ACTIVE -> DESTROYED`. A destroyed store is
/// never reused: the next `create_object` for the same holder starts over
/// with a fresh store.
pub struct ScopeRegistry<H, T> {
    scopes: BoundedEvictingMap<H, Arc<ChildStore<T>>>,
    destroyer: Arc<dyn Destroyer<T>>,
    counters: Arc<ScopeCounters>,
}

impl<H, T> ScopeRegistry<H, T>
where
    H: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a registry tracking at most `max_active_scopes` holders.
    pub fn new(max_active_scopes: NonZeroUsize, destroyer: impl Destroyer<T> + 'static) -> Self {
        let counters = Arc::new(ScopeCounters::default());
        let evicted = Arc::clone(&counters);

        let scopes = BoundedEvictingMap::new(
            max_active_scopes,
            move |holder: &H, store: Arc<ChildStore<T>>| {
                evicted.record_evicted();
                debug!(scope = ?holder, objects = store.len(), "Evicting least recently used scope");
                store.destroy_all();
            },
        );

        Self {
            scopes,
            destroyer: Arc::new(destroyer),
            counters,
        }
    }

    /// Creates a registry bounded by the configured scope limit.
    pub fn from_config(config: &Config, destroyer: impl Destroyer<T> + 'static) -> Self {
        Self::new(config.max_active_scopes, destroyer)
    }

    // == Get Object ==
    /// Returns an existing object. Never creates a store for an unseen holder.
    pub fn get_object<Q>(&self, holder: &Q, object_id: &str) -> Option<T>
    where
        H: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = H> + ?Sized,
    {
        self.scopes.get(holder)?.get(object_id)
    }

    // == Create Object ==
    /// Returns the object for `(holder, object_id)`, building it on first use.
    ///
    /// Creating the store for a new holder may evict the least recently used
    /// holder; its objects are destroyed before this returns. `factory` runs at
    /// most once per object unless the holder is destroyed while the object
    /// is being built, in which case the build is retried on a fresh store.
    ///
    /// # Reentrancy
    /// `factory` may create objects under other holders, but only while the
    /// registry has room for them next to this holder. If such a call evicts
    /// this holder (for example with a scope limit of one), every attempt is
    /// destroyed the same way and the retry never finishes.
    pub fn create_object<Q, F>(&self, holder: &Q, object_id: &str, mut factory: F) -> T
    where
        H: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = H> + Debug + ?Sized,
        F: FnMut() -> T,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            let store = self.scopes.get_or_create(holder, || {
                self.counters.record_created();
                trace!(scope = ?holder, "Creating scope");
                Arc::new(ChildStore::new(
                    Arc::clone(&self.destroyer),
                    Arc::clone(&self.counters),
                ))
            });

            if let Some(object) = store.get_or_create(object_id, &mut factory) {
                return object;
            }
            if attempt == RETRY_WARN_THRESHOLD {
                warn!(
                    scope = ?holder,
                    object_id,
                    attempt,
                    "Scope keeps ending during creation; does the factory evict its own holder?"
                );
            } else {
                trace!(
                    scope = ?holder,
                    object_id,
                    attempt,
                    "Scope ended during creation, retrying"
                );
            }
        }
    }

    // == End Scope ==
    /// Ends one holder's scope and destroys its objects.
    ///
    /// Returns false if the holder had no active scope.
    pub fn end_scope<Q>(&self, holder: &Q) -> bool
    where
        H: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = H> + Debug + ?Sized,
    {
        match self.scopes.remove(holder) {
            Some(store) => {
                self.counters.record_ended();
                let destroyed = store.destroy_all();
                debug!(scope = ?holder, destroyed, "Scope ended");
                true
            }
            None => false,
        }
    }

    // == End All Scopes ==
    /// Ends every tracked scope, e.g. when the owning session ends.
    ///
    /// Returns the number of scopes ended.
    pub fn end_all_scopes(&self) -> usize {
        let scopes = self.scopes.drain();
        for (_, store) in &scopes {
            self.counters.record_ended();
            store.destroy_all();
        }
        if !scopes.is_empty() {
            debug!(count = scopes.len(), "Ended all scopes");
        }
        scopes.len()
    }

    /// Checks whether a holder has an active scope, without touching recency.
    pub fn is_active<Q>(&self, holder: &Q) -> bool
    where
        H: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.scopes.contains_key(holder)
    }

    /// Active holders from least to most recently used.
    pub fn active_holders(&self) -> Vec<H> {
        self.scopes.keys()
    }

    pub fn active_scopes(&self) -> usize {
        self.scopes.len()
    }

    pub fn max_active_scopes(&self) -> usize {
        self.scopes.capacity()
    }

    // == Stats ==
    pub fn stats(&self) -> ScopeStats {
        self.counters
            .snapshot(self.scopes.len(), self.scopes.capacity())
    }
}

impl<H, T> fmt::Debug for ScopeRegistry<H, T>
where
    H: Hash + Eq + Clone,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeRegistry")
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}
