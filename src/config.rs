//! Configuration Module
//!
//! Loads engine settings from a flat string-keyed settings map or from
//! environment variables.

use std::collections::HashMap;
use std::env;
use std::num::NonZeroUsize;
use std::time::Duration;

use crate::cache::Ttl;
use crate::error::{CacheError, Result};
use crate::scope::DEFAULT_MAX_ACTIVE_SCOPES;

// == Setting Keys ==
pub const MAX_ACTIVE_SCOPES_KEY: &str = "scope_cache.max_active_scopes";
pub const PROVIDER_KEY: &str = "scope_cache.provider";
pub const APPLICATION_TTL_KEY: &str = "scope_cache.application.ttl";
pub const APPLICATION_MAX_CAPACITY_KEY: &str = "scope_cache.application.max_capacity";
pub const SESSION_TTL_KEY: &str = "scope_cache.session.ttl";
pub const SESSION_MAX_CAPACITY_KEY: &str = "scope_cache.session.max_capacity";
pub const PURGE_INTERVAL_KEY: &str = "scope_cache.purge_interval";

/// Environment variable for each setting key.
const ENV_KEYS: [(&str, &str); 7] = [
    ("MAX_ACTIVE_SCOPES", MAX_ACTIVE_SCOPES_KEY),
    ("CACHE_PROVIDER", PROVIDER_KEY),
    ("APPLICATION_TTL", APPLICATION_TTL_KEY),
    ("APPLICATION_MAX_CAPACITY", APPLICATION_MAX_CAPACITY_KEY),
    ("SESSION_TTL", SESSION_TTL_KEY),
    ("SESSION_MAX_CAPACITY", SESSION_MAX_CAPACITY_KEY),
    ("PURGE_INTERVAL", PURGE_INTERVAL_KEY),
];

const DEFAULT_PURGE_INTERVAL_SECS: u64 = 60;

/// Settings for the output cache of one scope kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheSettings {
    /// TTL applied by `put_default`
    pub default_ttl: Ttl,
    /// Bound on stored entries, None when unbounded
    pub max_capacity: Option<NonZeroUsize>,
}

/// Engine configuration.
///
/// Read once at startup; nothing reloads it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of concurrently active scopes per registry
    pub max_active_scopes: NonZeroUsize,
    /// Named cache provider, None for the default provider
    pub provider: Option<String>,
    /// Application-wide output cache
    pub application: CacheSettings,
    /// Per-session output cache
    pub session: CacheSettings,
    /// Interval of the optional expired-entry purge task
    pub purge_interval: Duration,
}

impl Config {
    /// Builds a Config from a settings map.
    ///
    /// Missing keys take their defaults and unknown keys are ignored, but a
    /// present key with a malformed value is an error.
    ///
    /// # Arguments
    /// * `settings` - flat map of `scope_cache.*` keys to raw values
    pub fn from_settings(settings: &HashMap<String, String>) -> Result<Self> {
        let defaults = Config::default();
        let lookup = |key: &str| settings.get(key).map(|value| value.trim());

        let max_active_scopes = match lookup(MAX_ACTIVE_SCOPES_KEY) {
            Some(raw) => parse_capacity(MAX_ACTIVE_SCOPES_KEY, raw)?,
            None => defaults.max_active_scopes,
        };

        let provider = match lookup(PROVIDER_KEY) {
            Some("") | None => None,
            Some(name) => Some(name.to_string()),
        };

        let application = CacheSettings {
            default_ttl: parse_ttl(APPLICATION_TTL_KEY, lookup(APPLICATION_TTL_KEY))?,
            max_capacity: lookup(APPLICATION_MAX_CAPACITY_KEY)
                .map(|raw| parse_capacity(APPLICATION_MAX_CAPACITY_KEY, raw))
                .transpose()?,
        };

        let session = CacheSettings {
            default_ttl: parse_ttl(SESSION_TTL_KEY, lookup(SESSION_TTL_KEY))?,
            max_capacity: lookup(SESSION_MAX_CAPACITY_KEY)
                .map(|raw| parse_capacity(SESSION_MAX_CAPACITY_KEY, raw))
                .transpose()?,
        };

        let purge_interval = match lookup(PURGE_INTERVAL_KEY) {
            Some(raw) => {
                let secs: u64 = raw.parse().map_err(|_| {
                    CacheError::invalid_setting(PURGE_INTERVAL_KEY, raw, "expected whole seconds")
                })?;
                if secs == 0 {
                    return Err(CacheError::invalid_setting(
                        PURGE_INTERVAL_KEY,
                        raw,
                        "must be at least one second",
                    ));
                }
                Duration::from_secs(secs)
            }
            None => defaults.purge_interval,
        };

        Ok(Self {
            max_active_scopes,
            provider,
            application,
            session,
            purge_interval,
        })
    }

    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_ACTIVE_SCOPES` - Active scopes per registry (default: 25)
    /// - `CACHE_PROVIDER` - Named cache provider (default: built-in provider)
    /// - `APPLICATION_TTL` / `SESSION_TTL` - Default TTL in seconds, -1 for forever (default: -1)
    /// - `APPLICATION_MAX_CAPACITY` / `SESSION_MAX_CAPACITY` - Entry bound (default: unbounded)
    /// - `PURGE_INTERVAL` - Purge task frequency in seconds (default: 60)
    pub fn from_env() -> Result<Self> {
        let settings = ENV_KEYS
            .iter()
            .filter_map(|(var, key)| env::var(var).ok().map(|value| (key.to_string(), value)))
            .collect::<HashMap<_, _>>();
        Self::from_settings(&settings)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_active_scopes: NonZeroUsize::new(DEFAULT_MAX_ACTIVE_SCOPES)
                .unwrap_or(NonZeroUsize::MIN),
            provider: None,
            application: CacheSettings::default(),
            session: CacheSettings::default(),
            purge_interval: Duration::from_secs(DEFAULT_PURGE_INTERVAL_SECS),
        }
    }
}

fn parse_capacity(key: &str, raw: &str) -> Result<NonZeroUsize> {
    raw.parse::<NonZeroUsize>()
        .map_err(|_| CacheError::invalid_setting(key, raw, "expected a positive integer"))
}

fn parse_ttl(key: &str, raw: Option<&str>) -> Result<Ttl> {
    match raw {
        Some(raw) => raw
            .parse::<i64>()
            .map(Ttl::from_seconds)
            .map_err(|_| CacheError::invalid_setting(key, raw, "expected seconds, -1 for forever")),
        None => Ok(Ttl::Forever),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_active_scopes.get(), 25);
        assert_eq!(config.provider, None);
        assert_eq!(config.application.default_ttl, Ttl::Forever);
        assert_eq!(config.session.max_capacity, None);
        assert_eq!(config.purge_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_empty_settings_match_defaults() {
        let config = Config::from_settings(&HashMap::new()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_from_settings_reads_every_key() {
        let config = Config::from_settings(&settings(&[
            (MAX_ACTIVE_SCOPES_KEY, "10"),
            (PROVIDER_KEY, "default"),
            (APPLICATION_TTL_KEY, "300"),
            (APPLICATION_MAX_CAPACITY_KEY, "1000"),
            (SESSION_TTL_KEY, "-1"),
            (SESSION_MAX_CAPACITY_KEY, " 50 "),
            (PURGE_INTERVAL_KEY, "5"),
            ("unrelated.setting", "whatever"),
        ]))
        .unwrap();

        assert_eq!(config.max_active_scopes.get(), 10);
        assert_eq!(config.provider.as_deref(), Some("default"));
        assert_eq!(config.application.default_ttl, Ttl::Seconds(300));
        assert_eq!(config.application.max_capacity.map(NonZeroUsize::get), Some(1000));
        assert_eq!(config.session.default_ttl, Ttl::Forever);
        assert_eq!(config.session.max_capacity.map(NonZeroUsize::get), Some(50));
        assert_eq!(config.purge_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_blank_provider_means_default() {
        let config = Config::from_settings(&settings(&[(PROVIDER_KEY, "  ")])).unwrap();
        assert_eq!(config.provider, None);
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        for (key, value) in [
            (MAX_ACTIVE_SCOPES_KEY, "0"),
            (MAX_ACTIVE_SCOPES_KEY, "many"),
            (APPLICATION_TTL_KEY, "1.5"),
            (SESSION_MAX_CAPACITY_KEY, "-3"),
            (PURGE_INTERVAL_KEY, "0"),
        ] {
            let err = Config::from_settings(&settings(&[(key, value)])).unwrap_err();
            assert!(
                matches!(&err, CacheError::InvalidSetting { key: k, .. } if k == key),
                "unexpected error for {key}={value}: {err}"
            );
        }
    }

    #[test]
    fn test_config_from_env_reads_mapped_variables() {
        env::set_var("MAX_ACTIVE_SCOPES", "7");
        env::set_var("SESSION_TTL", "30");
        let config = Config::from_env();
        env::remove_var("MAX_ACTIVE_SCOPES");
        env::remove_var("SESSION_TTL");

        let config = config.unwrap();
        assert_eq!(config.max_active_scopes.get(), 7);
        assert_eq!(config.session.default_ttl, Ttl::Seconds(30));
    }
}
