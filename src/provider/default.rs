//! Built-in cache provider backed by [`TtlStore`].

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::cache::TtlStore;
use crate::clock::Clock;
use crate::config::{CacheSettings, Config};
use crate::error::Result;
use crate::provider::{Cache, CacheProvider, ScopeKind, DEFAULT_PROVIDER};

/// Creates in-memory TTL stores, bounded when the scope kind has a
/// configured maximum capacity.
#[derive(Debug, Clone)]
pub struct DefaultCacheProvider {
    application: CacheSettings,
    session: CacheSettings,
    clock: Arc<dyn Clock>,
}

impl DefaultCacheProvider {
    pub fn new(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            application: config.application,
            session: config.session,
            clock,
        }
    }

    pub fn settings(&self, kind: ScopeKind) -> CacheSettings {
        match kind {
            ScopeKind::Application => self.application,
            ScopeKind::Session => self.session,
        }
    }
}

impl CacheProvider for DefaultCacheProvider {
    fn name(&self) -> &str {
        DEFAULT_PROVIDER
    }

    fn create_cache(&self, kind: ScopeKind) -> Result<Arc<dyn Cache>> {
        let settings = self.settings(kind);
        let clock = Arc::clone(&self.clock);

        let store = match settings.max_capacity {
            Some(capacity) => TtlStore::<String, Value>::bounded(capacity, clock),
            None => TtlStore::new(clock),
        }
        .with_default_ttl(settings.default_ttl);

        debug!(
            scope = %kind,
            capacity = ?settings.max_capacity,
            default_ttl = ?settings.default_ttl,
            "Created output cache"
        );
        Ok(Arc::new(store))
    }
}
