//! Error types for the scope cache engine
//!
//! Only configuration problems are errors. Cache misses and expired entries
//! are reported as `None`, and destroy-callback failures are logged and
//! swallowed where they happen.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the scope cache engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// A configuration setting could not be parsed or is out of range
    #[error("Invalid setting {key}={value:?}: {reason}")]
    InvalidSetting {
        key: String,
        value: String,
        reason: String,
    },

    /// The configured cache provider is not registered
    #[error("Unknown cache provider: {0}")]
    UnknownProvider(String),

    /// The configured cache provider failed to construct
    #[error("Cache provider {name} failed to initialize: {reason}")]
    ProviderInit { name: String, reason: String },

    /// A scope attribute holds a value of an unexpected type
    #[error("Scope attribute {0} holds a value of an unexpected type")]
    AttributeType(String),
}

impl CacheError {
    /// Shorthand for an [`CacheError::InvalidSetting`].
    pub fn invalid_setting(key: &str, value: &str, reason: impl Into<String>) -> Self {
        CacheError::InvalidSetting {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the scope cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
