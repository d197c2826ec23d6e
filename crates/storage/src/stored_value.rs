//! Storage-layer value wrapper with expiry support
//!
//! The contract type `Entry` doesn't include expiry because expiry is a
//! storage concern, not a contract concern. `StoredValue` combines the
//! value and its versionstamp with an optional deadline.

use std::time::{Duration, Instant};

use kvtoolbox_core::{Entry, Key, Value, Versionstamp};

/// A stored value with optional expiry deadline
#[derive(Debug, Clone, PartialEq)]
pub struct StoredValue {
    value: Value,
    versionstamp: Versionstamp,
    expires_at: Option<Instant>,
}

impl StoredValue {
    /// Create a stored value written at `now`
    pub fn new(
        value: Value,
        versionstamp: Versionstamp,
        now: Instant,
        expire_in: Option<Duration>,
    ) -> Self {
        StoredValue {
            value,
            versionstamp,
            expires_at: expire_in.map(|ttl| now + ttl),
        }
    }

    /// Get the value
    #[inline]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Get the versionstamp
    #[inline]
    pub fn versionstamp(&self) -> Versionstamp {
        self.versionstamp
    }

    /// Get the expiry deadline
    #[inline]
    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    /// Check if this value has expired at `now`
    pub fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(deadline) if deadline <= now)
    }

    /// Convert to a contract entry
    pub fn to_entry(&self, key: &Key) -> Entry {
        Entry {
            key: key.clone(),
            value: self.value.clone(),
            versionstamp: self.versionstamp,
        }
    }
}
