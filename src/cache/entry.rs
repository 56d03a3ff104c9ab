//! Cache Entry Module
//!
//! Defines individual TTL store entries and the time-to-live type.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

// == Time To Live ==
/// How long a stored value stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ttl {
    /// The entry never expires
    #[default]
    Forever,
    /// The entry expires this many seconds after it was stored
    Seconds(u32),
}

impl Ttl {
    /// Seconds value meaning "never expires" in settings and caller APIs.
    pub const FOREVER_SECONDS: i64 = -1;

    /// Converts a signed seconds count, where `-1` means [`Ttl::Forever`].
    ///
    /// Any other negative count yields an entry that is already expired when
    /// stored. Counts beyond `u32::MAX` are clamped.
    pub fn from_seconds(seconds: i64) -> Self {
        if seconds == Self::FOREVER_SECONDS {
            Ttl::Forever
        } else {
            Ttl::Seconds(seconds.clamp(0, i64::from(u32::MAX)) as u32)
        }
    }

    /// Expiry timestamp for an entry stored at `now`.
    pub fn expires_at(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Ttl::Forever => None,
            Ttl::Seconds(secs) => Some(
                now.checked_add_signed(chrono::Duration::seconds(i64::from(secs)))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            ),
        }
    }
}

// == Entry ==
/// A stored value with an optional expiry and named attributes.
///
/// The value side is optional: an entry created through an attribute write
/// holds attributes only.
#[derive(Debug, Clone)]
pub struct Entry<V> {
    value: Option<V>,
    expires_at: Option<DateTime<Utc>>,
    attributes: Option<HashMap<String, V>>,
}

impl<V> Entry<V> {
    // == Constructor ==
    /// Creates an entry that expires at `expires_at` (`None` = never).
    pub fn new(value: Option<V>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            value,
            expires_at,
            attributes: None,
        }
    }

    // == Is Valid ==
    /// Checks whether the entry is still live at `now`.
    ///
    /// An entry stops being valid the instant `now` reaches its expiry.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires) => now < expires,
            None => true,
        }
    }

    /// The stored value, if any.
    pub fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    /// The expiry timestamp, `None` when the entry never expires.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Replaces value and expiry in place, keeping the attributes.
    pub fn update(&mut self, value: Option<V>, expires_at: Option<DateTime<Utc>>) {
        self.value = value;
        self.expires_at = expires_at;
    }

    /// Looks up a named attribute without allocating the attribute map.
    pub fn attribute(&self, name: &str) -> Option<&V> {
        self.attributes.as_ref().and_then(|attrs| attrs.get(name))
    }

    /// Returns the attribute map, allocating it on first use.
    ///
    /// Attributes are derived data, not authoritative state: they are dropped
    /// whenever the entry is replaced wholesale after expiring, and callers
    /// must be able to recompute them. Entries are only reachable through
    /// `&mut` while the owning table's lock is held, so the lazy allocation
    /// itself cannot lose a concurrent write.
    pub fn attributes_mut(&mut self) -> &mut HashMap<String, V> {
        self.attributes.get_or_insert_with(HashMap::new)
    }

    /// Number of attributes currently set.
    pub fn attribute_count(&self) -> usize {
        self.attributes.as_ref().map_or(0, HashMap::len)
    }
}
