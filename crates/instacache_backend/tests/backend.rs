// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the `CacheBackend` contract and its default methods.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use instacache_backend::{CacheBackend, CacheEntry, Error};

/// Minimal implementation that only provides required methods.
struct MinimalBackend<K, V> {
    data: Mutex<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> MinimalBackend<K, V> {
    fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> CacheBackend<K, V> for MinimalBackend<K, V>
where
    K: Clone + Eq + std::hash::Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn get(&self, key: &K) -> Result<Option<V>, Error> {
        Ok(self.data.lock().expect("lock poisoned").get(key).map(|e| e.value().clone()))
    }

    async fn get_many(&self, keys: &[K]) -> Result<HashMap<K, V>, Error> {
        let data = self.data.lock().expect("lock poisoned");
        Ok(keys
            .iter()
            .filter_map(|k| data.get(k).map(|e| (k.clone(), e.value().clone())))
            .collect())
    }

    async fn set(&self, key: &K, value: V, ttl: Option<Duration>) -> Result<(), Error> {
        self.data
            .lock()
            .expect("lock poisoned")
            .insert(key.clone(), CacheEntry::from_parts(value, ttl));
        Ok(())
    }

    async fn set_many(&self, entries: HashMap<K, V>, ttl: Option<Duration>) -> Result<(), Error> {
        let mut data = self.data.lock().expect("lock poisoned");
        for (key, value) in entries {
            data.insert(key, CacheEntry::from_parts(value, ttl));
        }
        Ok(())
    }

    async fn delete(&self, key: &K) -> Result<(), Error> {
        self.data.lock().expect("lock poisoned").remove(key);
        Ok(())
    }
}

#[tokio::test]
async fn get_many_omits_missing_keys() {
    let backend = MinimalBackend::<String, i32>::new();
    backend.set(&"present".to_string(), 1, None).await.expect("error on set");

    let found = backend
        .get_many(&["present".to_string(), "absent".to_string()])
        .await
        .expect("error on get_many");

    assert_eq!(found.len(), 1);
    assert_eq!(found.get("present"), Some(&1));
}

#[tokio::test]
async fn set_many_then_get_round_trips() {
    let backend = MinimalBackend::<String, i32>::new();
    let entries = HashMap::from([("a".to_string(), 1), ("b".to_string(), 2)]);
    backend.set_many(entries, None).await.expect("error on set_many");

    assert_eq!(backend.get(&"b".to_string()).await.expect("error on get"), Some(2));
}

#[tokio::test]
async fn delete_missing_key_is_not_an_error() {
    let backend = MinimalBackend::<String, i32>::new();
    backend.delete(&"nothing".to_string()).await.expect("error on delete");
}

#[test]
fn default_len_is_none() {
    let backend = MinimalBackend::<String, i32>::new();
    assert_eq!(backend.len(), None);
    assert_eq!(backend.is_empty(), None);
}
