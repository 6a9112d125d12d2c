// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-memory backend implementation using moka.

use std::{
    collections::HashMap,
    hash::Hash,
    time::{Duration, Instant},
};

use instacache_backend::{CacheBackend, CacheEntry, Error};
use moka::{Expiry, future::Cache};
use thread_aware::{Arc, PerProcess, ThreadAware};

use crate::builder::InMemoryBackendBuilder;

/// Expiry policy that honours the TTL each entry was written with.
pub(crate) struct EntryTtl;

impl<K, V> Expiry<K, CacheEntry<V>> for EntryTtl {
    fn expire_after_create(&self, _key: &K, value: &CacheEntry<V>, _created_at: Instant) -> Option<Duration> {
        value.ttl()
    }

    fn expire_after_update(
        &self,
        _key: &K,
        value: &CacheEntry<V>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl()
    }
}

/// An in-memory cache backend backed by moka.
///
/// Clones share the same storage, so one backend can serve several instance caches.
///
/// # Examples
///
/// ```
/// use instacache_backend::CacheBackend;
/// use instacache_memory::InMemoryBackend;
/// # futures::executor::block_on(async {
///
/// let backend = InMemoryBackend::<String, i32>::new();
///
/// backend.set(&"key".to_string(), 42, None).await?;
/// assert_eq!(backend.get(&"key".to_string()).await?, Some(42));
/// # Ok::<(), instacache_backend::Error>(())
/// # });
/// ```
#[derive(Debug, Clone, ThreadAware)]
pub struct InMemoryBackend<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Arc<Cache<K, CacheEntry<V>>, PerProcess>,
}

impl<K, V> Default for InMemoryBackend<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> InMemoryBackend<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a new unbounded in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a new in-memory backend holding at most `max_capacity` entries.
    #[must_use]
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self::builder().max_capacity(max_capacity).build()
    }

    /// Creates a new builder for configuring an in-memory backend.
    #[must_use]
    pub fn builder() -> InMemoryBackendBuilder<K, V> {
        InMemoryBackendBuilder::new()
    }

    pub(crate) fn from_cache(cache: Cache<K, CacheEntry<V>>) -> Self {
        Self {
            inner: Arc::from_unaware(cache),
        }
    }
}

impl<K, V> CacheBackend<K, V> for InMemoryBackend<K, V>
where
    K: Clone + Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &K) -> Result<Option<V>, Error> {
        Ok(self.inner.get(key).await.map(CacheEntry::into_value))
    }

    async fn get_many(&self, keys: &[K]) -> Result<HashMap<K, V>, Error> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = self.inner.get(key).await {
                found.insert(key.clone(), entry.into_value());
            }
        }
        Ok(found)
    }

    async fn set(&self, key: &K, value: V, ttl: Option<Duration>) -> Result<(), Error> {
        self.inner.insert(key.clone(), CacheEntry::from_parts(value, ttl)).await;
        Ok(())
    }

    async fn set_many(&self, entries: HashMap<K, V>, ttl: Option<Duration>) -> Result<(), Error> {
        for (key, value) in entries {
            self.inner.insert(key, CacheEntry::from_parts(value, ttl)).await;
        }
        Ok(())
    }

    async fn delete(&self, key: &K) -> Result<(), Error> {
        self.inner.invalidate(key).await;
        Ok(())
    }

    fn len(&self) -> Option<u64> {
        Some(self.inner.entry_count())
    }
}
