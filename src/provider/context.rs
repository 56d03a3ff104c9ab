//! Scope Context Module
//!
//! The identity object of one application or session scope, carrying the
//! scope's attributes and the lock that publishes scope-level singletons.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::error::{CacheError, Result};

type Attribute = Arc<dyn Any + Send + Sync>;

/// Kind of scope an output cache is created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// Shared by the whole application
    Application,
    /// One per user session
    Session,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKind::Application => write!(f, "application"),
            ScopeKind::Session => write!(f, "session"),
        }
    }
}

// == Scope Context ==
/// Attribute store of one scope.
///
/// Readers never take the publish lock; it only serializes the construction
/// of values published through [`ScopeContext::get_or_create`].
pub struct ScopeContext {
    kind: ScopeKind,
    attributes: RwLock<HashMap<String, Attribute>>,
    publish: Mutex<()>,
}

impl ScopeContext {
    pub fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            attributes: RwLock::new(HashMap::new()),
            publish: Mutex::new(()),
        }
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    /// Reads attribute `name` as a `T`.
    ///
    /// Fails if the attribute exists with another type.
    pub fn attribute<T>(&self, name: &str) -> Result<Option<Arc<T>>>
    where
        T: Any + Send + Sync,
    {
        let attribute = match self.attributes.read().get(name) {
            Some(attribute) => Arc::clone(attribute),
            None => return Ok(None),
        };
        attribute
            .downcast::<T>()
            .map(Some)
            .map_err(|_| CacheError::AttributeType(name.to_string()))
    }

    /// Stores attribute `name`, replacing any previous value.
    pub fn set_attribute<T>(&self, name: &str, value: Arc<T>)
    where
        T: Any + Send + Sync,
    {
        self.attributes.write().insert(name.to_string(), value);
    }

    pub fn remove_attribute(&self, name: &str) -> bool {
        self.attributes.write().remove(name).is_some()
    }

    // == Get Or Create ==
    /// Returns the scope-level singleton stored under `name`, building it with
    /// `init` if absent.
    ///
    /// Concurrent first callers construct exactly one value and all observe
    /// it. `init` runs under the publish lock and must not publish into this
    /// same scope. An `init` error is returned and nothing is stored.
    pub fn get_or_create<T, F>(&self, name: &str, init: F) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Result<Arc<T>>,
    {
        if let Some(existing) = self.attribute::<T>(name)? {
            return Ok(existing);
        }

        let _publish = self.publish.lock();
        if let Some(existing) = self.attribute::<T>(name)? {
            return Ok(existing);
        }

        let created = init()?;
        self.set_attribute(name, Arc::clone(&created));
        trace!(scope = %self.kind, attribute = name, "Published scope singleton");
        Ok(created)
    }
}

impl fmt::Debug for ScopeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeContext")
            .field("kind", &self.kind)
            .field("attributes", &self.attributes.read().len())
            .finish()
    }
}
