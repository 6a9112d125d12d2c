// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Capacity and idle-expiry configuration for in-memory backends.

use std::hash::Hash;
use std::marker::PhantomData;
use std::time::Duration;

use moka::future::Cache;

use crate::backend::{EntryTtl, InMemoryBackend};

/// Configures an [`InMemoryBackend`] before it is created.
///
/// Entry lifetimes come from the TTL each value is written with; the builder
/// only bounds how many entries are kept and how long unused ones linger.
///
/// # Examples
///
/// ```
/// use instacache_memory::InMemoryBackend;
/// use std::time::Duration;
///
/// let backend = InMemoryBackend::<String, i32>::builder()
///     .max_capacity(1000)
///     .time_to_idle(Duration::from_secs(60))
///     .initial_capacity(100)
///     .name("instances")
///     .build();
/// ```
pub struct InMemoryBackendBuilder<K, V> {
    bounds: Bounds,
    name: Option<String>,
    _types: PhantomData<fn() -> (K, V)>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Bounds {
    max_entries: Option<u64>,
    preallocate: Option<usize>,
    idle: Option<Duration>,
}

impl<K, V> std::fmt::Debug for InMemoryBackendBuilder<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackendBuilder")
            .field("bounds", &self.bounds)
            .field("name", &self.name)
            .finish()
    }
}

impl<K, V> Default for InMemoryBackendBuilder<K, V> {
    fn default() -> Self {
        Self {
            bounds: Bounds::default(),
            name: None,
            _types: PhantomData,
        }
    }
}

impl<K, V> InMemoryBackendBuilder<K, V> {
    /// Starts from an unbounded backend with no idle expiry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps the number of entries; past the cap, moka evicts by its `TinyLFU` policy.
    #[must_use]
    pub fn max_capacity(mut self, capacity: u64) -> Self {
        self.bounds.max_entries = Some(capacity);
        self
    }

    /// Pre-allocates room for `capacity` entries.
    #[must_use]
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.bounds.preallocate = Some(capacity);
        self
    }

    /// Drops entries that were neither read nor written for `duration`, even if
    /// their TTL has not run out.
    #[must_use]
    pub fn time_to_idle(mut self, duration: Duration) -> Self {
        self.bounds.idle = Some(duration);
        self
    }

    /// Names the underlying moka cache.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Creates the backend.
    #[must_use]
    pub fn build(self) -> InMemoryBackend<K, V>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let Bounds {
            max_entries,
            preallocate,
            idle,
        } = self.bounds;

        let mut cache = Cache::builder().expire_after(EntryTtl);
        if let Some(max_entries) = max_entries {
            cache = cache.max_capacity(max_entries);
        }
        if let Some(preallocate) = preallocate {
            cache = cache.initial_capacity(preallocate);
        }
        if let Some(idle) = idle {
            cache = cache.time_to_idle(idle);
        }
        if let Some(name) = self.name.as_deref() {
            cache = cache.name(name);
        }

        InMemoryBackend::from_cache(cache.build())
    }
}
