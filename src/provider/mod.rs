//! Cache Provider Module
//!
//! Output caches per scope kind, the scope singleton that holds them, and
//! selection of the configured provider by name.

mod cache;
mod context;
mod default;
mod selection;

use std::fmt::Debug;
use std::sync::Arc;

use crate::error::Result;

pub use cache::Cache;
pub use context::{ScopeContext, ScopeKind};
pub use default::DefaultCacheProvider;
pub use selection::{ProviderFactory, ProviderRegistry, DEFAULT_PROVIDER};

/// Scope attribute holding a scope's output cache.
pub const CACHE_ATTRIBUTE: &str = "scope_cache.output_cache";

/// Wrapper giving the output cache a concrete type in the attribute store.
struct CacheSlot(Arc<dyn Cache>);

// == Cache Provider ==
/// Builds output caches for application and session scopes.
pub trait CacheProvider: Send + Sync + Debug {
    /// Name the provider is registered under.
    fn name(&self) -> &str;

    /// Builds a new, empty cache for a scope of `kind`.
    fn create_cache(&self, kind: ScopeKind) -> Result<Arc<dyn Cache>>;

    /// Returns the output cache of `scope`, creating it on first use.
    ///
    /// Every caller for the same scope gets the same cache, even when the
    /// first calls race.
    fn get_cache(&self, scope: &ScopeContext) -> Result<Arc<dyn Cache>> {
        let slot = scope.get_or_create(CACHE_ATTRIBUTE, || {
            self.create_cache(scope.kind())
                .map(|cache| Arc::new(CacheSlot(cache)))
        })?;
        Ok(Arc::clone(&slot.0))
    }
}
