// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The core trait for shared cache stores.

use std::{collections::HashMap, time::Duration};

use crate::Error;

/// Trait for cache backend implementations.
///
/// A backend is a shared, possibly remote store that is safe for concurrent bulk
/// reads and writes from many callers. The instance cache never locks around it.
///
/// `get_many` and `set_many` must each be a single operation against the store,
/// regardless of how many keys they carry. Keys absent from the store are simply
/// missing from the `get_many` result.
///
/// Only `len` and `is_empty` have default implementations:
/// - `len`: Returns `None` (not all backends track size)
/// - `is_empty`: Delegates to `len`
#[cfg_attr(
    any(test, feature = "dynamic-backend"),
    dynosaur::dynosaur(pub(crate) DynCacheBackend = dyn(box) CacheBackend, bridge(none))
)]
pub trait CacheBackend<K, V>: Send + Sync {
    /// Reads one value.
    fn get(&self, key: &K) -> impl Future<Output = Result<Option<V>, Error>> + Send;

    /// Reads every present key in one round trip.
    fn get_many(&self, keys: &[K]) -> impl Future<Output = Result<HashMap<K, V>, Error>> + Send;

    /// Writes one value, expiring after `ttl` if given.
    fn set(&self, key: &K, value: V, ttl: Option<Duration>) -> impl Future<Output = Result<(), Error>> + Send;

    /// Writes every entry in one round trip, all sharing the same `ttl`.
    fn set_many(&self, entries: HashMap<K, V>, ttl: Option<Duration>) -> impl Future<Output = Result<(), Error>> + Send;

    /// Removes one value. Removing a missing key is not an error.
    fn delete(&self, key: &K) -> impl Future<Output = Result<(), Error>> + Send;

    /// Returns the number of entries, if supported.
    fn len(&self) -> Option<u64> {
        None
    }

    /// Returns `true` if the backend holds no entries.
    ///
    /// Returns `None` for implementations that don't track size.
    fn is_empty(&self) -> Option<bool> {
        self.len().map(|len| len == 0)
    }
}
