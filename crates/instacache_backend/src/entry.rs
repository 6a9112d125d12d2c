// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::{ops::Deref, time::Duration};

/// A stored value together with the time-to-live it was written with.
///
/// Backends that need to remember how long an entry may live (the in-memory
/// backend feeds this into its expiry policy) keep values wrapped in `CacheEntry`.
///
/// # Examples
///
/// ```
/// use instacache_backend::CacheEntry;
/// use std::time::Duration;
///
/// let entry = CacheEntry::new(42);
/// assert_eq!(*entry.value(), 42);
/// assert!(entry.ttl().is_none());
///
/// let entry = CacheEntry::with_ttl("data".to_string(), Duration::from_secs(60));
/// assert_eq!(entry.ttl(), Some(Duration::from_secs(60)));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry<V> {
    value: V,
    ttl: Option<Duration>,
}

impl<V> CacheEntry<V> {
    /// Creates an entry that never expires.
    pub fn new(value: V) -> Self {
        Self { value, ttl: None }
    }

    /// Creates an entry that expires `ttl` after being written.
    pub fn with_ttl(value: V, ttl: Duration) -> Self {
        Self { value, ttl: Some(ttl) }
    }

    /// Creates an entry from a value and an optional TTL, as passed to
    /// [`CacheBackend::set`](crate::CacheBackend::set).
    pub fn from_parts(value: V, ttl: Option<Duration>) -> Self {
        Self { value, ttl }
    }

    /// Returns the TTL the entry was written with.
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Returns a reference to the stored value.
    #[must_use]
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Consumes the entry and returns the stored value.
    #[must_use]
    pub fn into_value(self) -> V {
        self.value
    }
}

impl<V> Deref for CacheEntry<V> {
    type Target = V;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<V> From<V> for CacheEntry<V> {
    fn from(value: V) -> Self {
        Self::new(value)
    }
}
