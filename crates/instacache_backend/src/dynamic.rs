// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Type-erased backend wrapper.

use std::{collections::HashMap, fmt::Debug, sync::Arc, time::Duration};

use crate::{CacheBackend, Error, backend::DynCacheBackend};

/// Extension trait for converting any `CacheBackend` into a `DynamicBackend`.
///
/// This trait is automatically implemented for all types that implement `CacheBackend`.
///
/// # Examples
///
/// ```
/// use instacache_backend::{CacheBackend, DynamicBackend, DynamicBackendExt};
///
/// fn erase<T>(backend: T) -> DynamicBackend<String, String>
/// where
///     T: CacheBackend<String, String> + 'static,
/// {
///     backend.into_dynamic()
/// }
/// ```
pub trait DynamicBackendExt<K, V>: Sized {
    /// Converts this backend into a `DynamicBackend`.
    fn into_dynamic(self) -> DynamicBackend<K, V>;
}

impl<K, V, T> DynamicBackendExt<K, V> for T
where
    T: CacheBackend<K, V> + 'static,
{
    fn into_dynamic(self) -> DynamicBackend<K, V> {
        DynamicBackend::new(self)
    }
}

/// A clonable backend with the concrete store type erased.
///
/// The instance cache holds its backend as a `DynamicBackend` so that facades and
/// caches can be passed around without carrying the store type parameter.
pub struct DynamicBackend<K, V>(Arc<DynCacheBackend<'static, K, V>>);

impl<K, V> DynamicBackend<K, V> {
    /// Creates a new dynamic backend from any `CacheBackend` implementation.
    pub(crate) fn new<T>(backend: T) -> Self
    where
        T: CacheBackend<K, V> + Send + Sync + 'static,
    {
        Self(DynCacheBackend::new_arc(backend))
    }
}

impl<K, V> Debug for DynamicBackend<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicBackend").finish()
    }
}

impl<K, V> Clone for DynamicBackend<K, V> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<K, V> CacheBackend<K, V> for DynamicBackend<K, V>
where
    K: Send + Sync,
    V: Send,
{
    async fn get(&self, key: &K) -> Result<Option<V>, Error> {
        self.0.get(key).await
    }

    async fn get_many(&self, keys: &[K]) -> Result<HashMap<K, V>, Error> {
        self.0.get_many(keys).await
    }

    async fn set(&self, key: &K, value: V, ttl: Option<Duration>) -> Result<(), Error> {
        self.0.set(key, value, ttl).await
    }

    async fn set_many(&self, entries: HashMap<K, V>, ttl: Option<Duration>) -> Result<(), Error> {
        self.0.set_many(entries, ttl).await
    }

    async fn delete(&self, key: &K) -> Result<(), Error> {
        self.0.delete(key).await
    }

    fn len(&self) -> Option<u64> {
        self.0.len()
    }

    fn is_empty(&self) -> Option<bool> {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BackendOp, MockBackend};

    #[tokio::test]
    async fn dynamic_backend_forwards_every_operation() {
        let mock = MockBackend::<String, i32>::new();
        let dynamic = mock.clone().into_dynamic();

        dynamic.set(&"a".to_string(), 1, None).await.unwrap();
        dynamic
            .set_many(HashMap::from([("b".to_string(), 2)]), Some(Duration::from_secs(5)))
            .await
            .unwrap();
        let found = dynamic.get_many(&["a".to_string(), "b".to_string(), "c".to_string()]).await.unwrap();
        dynamic.delete(&"a".to_string()).await.unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(dynamic.get(&"a".to_string()).await.unwrap(), None);
        assert_eq!(dynamic.len(), Some(1));
        assert_eq!(mock.count(|op| matches!(op, BackendOp::GetMany(_))), 1);
        assert_eq!(mock.count(|op| matches!(op, BackendOp::SetMany(_))), 1);
    }

    #[test]
    fn clone_shares_storage() {
        let mock = MockBackend::<String, i32>::new();
        let first = mock.clone().into_dynamic();
        let second = first.clone();

        futures::executor::block_on(first.set(&"k".to_string(), 7, None)).unwrap();
        assert_eq!(futures::executor::block_on(second.get(&"k".to_string())).unwrap(), Some(7));
        assert!(format!("{second:?}").contains("DynamicBackend"));
    }
}
