// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for `InMemoryBackend`.

use std::collections::HashMap;
use std::time::Duration;

use instacache_backend::CacheBackend;
use instacache_memory::InMemoryBackend;

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

#[test]
fn new_backend_is_empty() {
    let backend = InMemoryBackend::<String, i32>::new();
    assert_eq!(backend.len(), Some(0));
    assert_eq!(backend.is_empty(), Some(true));
}

#[test]
fn get_many_returns_only_present_keys() {
    block_on(async {
        let backend = InMemoryBackend::<String, i32>::new();
        backend.set(&"a".to_string(), 1, None).await.unwrap();
        backend.set(&"b".to_string(), 2, None).await.unwrap();

        let found = backend
            .get_many(&["a".to_string(), "b".to_string(), "c".to_string()])
            .await
            .unwrap();

        assert_eq!(found, HashMap::from([("a".to_string(), 1), ("b".to_string(), 2)]));
    });
}

#[test]
fn set_many_overwrites_existing_values() {
    block_on(async {
        let backend = InMemoryBackend::<String, i32>::new();
        backend.set(&"a".to_string(), 1, None).await.unwrap();
        backend
            .set_many(HashMap::from([("a".to_string(), 10), ("b".to_string(), 20)]), None)
            .await
            .unwrap();

        assert_eq!(backend.get(&"a".to_string()).await.unwrap(), Some(10));
        assert_eq!(backend.get(&"b".to_string()).await.unwrap(), Some(20));
    });
}

#[test]
fn delete_removes_value() {
    block_on(async {
        let backend = InMemoryBackend::<String, i32>::new();
        backend.set(&"a".to_string(), 1, None).await.unwrap();
        backend.delete(&"a".to_string()).await.unwrap();
        assert_eq!(backend.get(&"a".to_string()).await.unwrap(), None);
    });
}

#[test]
fn clones_share_storage() {
    block_on(async {
        let backend = InMemoryBackend::<String, i32>::new();
        let other = backend.clone();
        backend.set(&"shared".to_string(), 5, None).await.unwrap();
        assert_eq!(other.get(&"shared".to_string()).await.unwrap(), Some(5));
    });
}

#[tokio::test]
async fn entries_expire_after_their_ttl() {
    let backend = InMemoryBackend::<String, i32>::new();
    backend
        .set(&"short".to_string(), 1, Some(Duration::from_millis(50)))
        .await
        .unwrap();
    backend.set(&"forever".to_string(), 2, None).await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(backend.get(&"short".to_string()).await.unwrap(), None);
    assert_eq!(backend.get(&"forever".to_string()).await.unwrap(), Some(2));
}

#[tokio::test]
async fn rewriting_without_ttl_clears_previous_expiry() {
    let backend = InMemoryBackend::<String, i32>::new();
    backend
        .set(&"k".to_string(), 1, Some(Duration::from_millis(50)))
        .await
        .unwrap();
    backend.set(&"k".to_string(), 2, None).await.unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(backend.get(&"k".to_string()).await.unwrap(), Some(2));
}
