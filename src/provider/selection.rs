//! Provider Selection Module
//!
//! Maps provider names from configuration to the factories that build them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::provider::{CacheProvider, DefaultCacheProvider};

/// Name of the built-in provider, used when none is configured.
pub const DEFAULT_PROVIDER: &str = "default";

/// Builds a provider from the loaded configuration.
pub type ProviderFactory =
    Arc<dyn Fn(&Config, Arc<dyn Clock>) -> anyhow::Result<Arc<dyn CacheProvider>> + Send + Sync>;

/// Named provider factories.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in provider.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(DEFAULT_PROVIDER, |config, clock| {
            Ok(Arc::new(DefaultCacheProvider::new(config, clock)) as Arc<dyn CacheProvider>)
        });
        registry
    }

    /// Registers a provider factory.
    ///
    /// If a factory with the same name already exists, it will be replaced.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Config, Arc<dyn Clock>) -> anyhow::Result<Arc<dyn CacheProvider>>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered provider names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    // == Select ==
    /// Builds the provider registered as `name`, or the built-in provider
    /// when no name is given.
    ///
    /// Unknown names and factory failures are configuration errors and are
    /// never retried.
    pub fn select(
        &self,
        name: Option<&str>,
        config: &Config,
        clock: Arc<dyn Clock>,
    ) -> Result<Arc<dyn CacheProvider>> {
        let name = name.unwrap_or(DEFAULT_PROVIDER);
        let factory = self.factories.get(name).ok_or_else(|| {
            warn!(provider = name, known = ?self.names(), "Unknown cache provider");
            CacheError::UnknownProvider(name.to_string())
        })?;

        let provider = factory(config, clock).map_err(|err| CacheError::ProviderInit {
            name: name.to_string(),
            reason: format!("{err:#}"),
        })?;

        info!(provider = name, "Cache provider selected");
        Ok(provider)
    }

    /// Selects the provider named by `config.provider`.
    pub fn select_configured(
        &self,
        config: &Config,
        clock: Arc<dyn Clock>,
    ) -> Result<Arc<dyn CacheProvider>> {
        self.select(config.provider.as_deref(), config, clock)
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}
