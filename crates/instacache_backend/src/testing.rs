// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock backend implementation for testing.
//!
//! [`MockBackend`] keeps values in memory, records every operation it receives
//! and supports failure injection, which makes it possible to assert how many
//! round trips a caller made and how it reacts to backend faults.

use std::{collections::HashMap, hash::Hash, sync::Arc, time::Duration};

use parking_lot::Mutex;

use crate::{CacheBackend, CacheEntry, Error};

/// Recorded backend operation with full context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOp<K, V> {
    /// A single-key read.
    Get(K),
    /// A bulk read of the given keys, in the order they were requested.
    GetMany(Vec<K>),
    /// A single-key write.
    Set {
        /// The key that was written.
        key: K,
        /// The value and TTL that were written.
        entry: CacheEntry<V>,
    },
    /// A bulk write of the given entries.
    SetMany(Vec<(K, CacheEntry<V>)>),
    /// A single-key delete.
    Delete(K),
}

type FailPredicate<K, V> = Box<dyn Fn(&BackendOp<K, V>) -> bool + Send + Sync>;

/// A configurable mock backend for testing.
///
/// Clones share the same storage and operation log.
///
/// # Examples
///
/// ```
/// use instacache_backend::{CacheBackend, testing::{BackendOp, MockBackend}};
///
/// # futures::executor::block_on(async {
/// let backend = MockBackend::<String, i32>::new();
///
/// backend.set(&"key".to_string(), 42, None).await.unwrap();
/// assert_eq!(backend.get(&"key".to_string()).await.unwrap(), Some(42));
///
/// backend.fail_when(|op| matches!(op, BackendOp::Delete(_)));
/// assert!(backend.delete(&"key".to_string()).await.is_err());
/// # });
/// ```
pub struct MockBackend<K, V> {
    data: Arc<Mutex<HashMap<K, CacheEntry<V>>>>,
    operations: Arc<Mutex<Vec<BackendOp<K, V>>>>,
    fail_when: Arc<Mutex<Option<FailPredicate<K, V>>>>,
}

impl<K, V> std::fmt::Debug for MockBackend<K, V>
where
    K: std::fmt::Debug,
    V: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockBackend")
            .field("data", &self.data)
            .field("operations", &self.operations)
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish()
    }
}

impl<K, V> Clone for MockBackend<K, V> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            operations: Arc::clone(&self.operations),
            fail_when: Arc::clone(&self.fail_when),
        }
    }
}

impl<K, V> Default for MockBackend<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> MockBackend<K, V> {
    /// Creates a new empty mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(Mutex::new(HashMap::new())),
            operations: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
        }
    }
}

impl<K, V> MockBackend<K, V>
where
    K: Eq + Hash,
{
    /// Creates a mock backend with pre-populated values that never expire.
    #[must_use]
    pub fn with_data(data: impl IntoIterator<Item = (K, V)>) -> Self {
        let data = data.into_iter().map(|(k, v)| (k, CacheEntry::new(v))).collect();
        Self {
            data: Arc::new(Mutex::new(data)),
            operations: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.data.lock().len()
    }

    /// Returns true if the backend holds the given key.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.data.lock().contains_key(key)
    }
}

impl<K, V> MockBackend<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// Returns the stored entry for `key`, including the TTL it was written with.
    ///
    /// This does not record an operation.
    #[must_use]
    pub fn entry(&self, key: &K) -> Option<CacheEntry<V>> {
        self.data.lock().get(key).cloned()
    }

    /// Sets a predicate that decides which operations fail.
    ///
    /// Failed operations are still recorded but do not touch the stored data.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&BackendOp<K, V>) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Clears the failure predicate, allowing all operations to succeed.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Returns a clone of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<BackendOp<K, V>> {
        self.operations.lock().clone()
    }

    /// Counts the recorded operations matching `predicate`.
    #[must_use]
    pub fn count(&self, predicate: impl Fn(&BackendOp<K, V>) -> bool) -> usize {
        self.operations.lock().iter().filter(|op| predicate(op)).count()
    }

    /// Clears all recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    fn record(&self, op: BackendOp<K, V>) -> Result<(), Error> {
        let fail = self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(&op));
        let label = match &op {
            BackendOp::Get(_) => "get",
            BackendOp::GetMany(_) => "get_many",
            BackendOp::Set { .. } => "set",
            BackendOp::SetMany(_) => "set_many",
            BackendOp::Delete(_) => "delete",
        };
        self.operations.lock().push(op);
        if fail {
            return Err(Error::caused_by(format!("mock: {label} failed")));
        }
        Ok(())
    }
}

impl<K, V> CacheBackend<K, V> for MockBackend<K, V>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &K) -> Result<Option<V>, Error> {
        self.record(BackendOp::Get(key.clone()))?;
        Ok(self.data.lock().get(key).map(|entry| entry.value().clone()))
    }

    async fn get_many(&self, keys: &[K]) -> Result<HashMap<K, V>, Error> {
        self.record(BackendOp::GetMany(keys.to_vec()))?;
        let data = self.data.lock();
        Ok(keys
            .iter()
            .filter_map(|key| data.get(key).map(|entry| (key.clone(), entry.value().clone())))
            .collect())
    }

    async fn set(&self, key: &K, value: V, ttl: Option<Duration>) -> Result<(), Error> {
        let entry = CacheEntry::from_parts(value, ttl);
        self.record(BackendOp::Set {
            key: key.clone(),
            entry: entry.clone(),
        })?;
        self.data.lock().insert(key.clone(), entry);
        Ok(())
    }

    async fn set_many(&self, entries: HashMap<K, V>, ttl: Option<Duration>) -> Result<(), Error> {
        let entries: Vec<_> = entries
            .into_iter()
            .map(|(key, value)| (key, CacheEntry::from_parts(value, ttl)))
            .collect();
        self.record(BackendOp::SetMany(entries.clone()))?;
        self.data.lock().extend(entries);
        Ok(())
    }

    async fn delete(&self, key: &K) -> Result<(), Error> {
        self.record(BackendOp::Delete(key.clone()))?;
        self.data.lock().remove(key);
        Ok(())
    }

    fn len(&self) -> Option<u64> {
        Some(self.data.lock().len() as u64)
    }
}
