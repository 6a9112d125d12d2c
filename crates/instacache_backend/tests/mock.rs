// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg(feature = "test-util")]

//! Integration tests for `MockBackend`.

use std::collections::HashMap;
use std::time::Duration;

use instacache_backend::CacheBackend;
use instacache_backend::testing::{BackendOp, MockBackend};

fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures::executor::block_on(f)
}

#[test]
fn records_operations_in_order() {
    block_on(async {
        let backend = MockBackend::<String, i32>::new();
        backend.set(&"a".to_string(), 1, None).await.unwrap();
        let _ = backend.get(&"a".to_string()).await.unwrap();
        backend.delete(&"a".to_string()).await.unwrap();

        assert_eq!(
            backend.operations(),
            vec![
                BackendOp::Set {
                    key: "a".to_string(),
                    entry: 1.into()
                },
                BackendOp::Get("a".to_string()),
                BackendOp::Delete("a".to_string()),
            ]
        );
    });
}

#[test]
fn set_many_stores_ttl_on_every_entry() {
    block_on(async {
        let backend = MockBackend::<String, i32>::new();
        let ttl = Some(Duration::from_secs(30));
        backend
            .set_many(HashMap::from([("a".to_string(), 1), ("b".to_string(), 2)]), ttl)
            .await
            .unwrap();

        assert_eq!(backend.entry(&"a".to_string()).unwrap().ttl(), ttl);
        assert_eq!(backend.entry(&"b".to_string()).unwrap().ttl(), ttl);
        assert_eq!(backend.count(|op| matches!(op, BackendOp::SetMany(_))), 1);
    });
}

#[test]
fn failing_operations_are_recorded_and_leave_data_untouched() {
    block_on(async {
        let backend = MockBackend::with_data([("a".to_string(), 1)]);
        backend.fail_when(|op| matches!(op, BackendOp::Delete(_)));

        assert!(backend.delete(&"a".to_string()).await.is_err());
        assert!(backend.contains_key(&"a".to_string()));
        assert_eq!(backend.count(|op| matches!(op, BackendOp::Delete(_))), 1);

        backend.clear_failures();
        backend.delete(&"a".to_string()).await.unwrap();
        assert_eq!(backend.entry_count(), 0);
    });
}

#[test]
fn clear_operations_resets_the_log() {
    block_on(async {
        let backend = MockBackend::<String, i32>::new();
        let _ = backend.get_many(&["x".to_string()]).await.unwrap();
        backend.clear_operations();
        assert!(backend.operations().is_empty());
    });
}
