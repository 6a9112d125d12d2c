// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Cache backend abstractions for the instance cache.
//!
//! This crate defines the [`CacheBackend`] trait that every shared cache store
//! consumed by `instacache` must satisfy, along with [`CacheEntry`] for backends
//! that keep per-entry metadata and the opaque [`Error`] type for backend faults.
//!
//! # Overview
//!
//! The instance cache issues exactly one bulk read and at most one bulk write per
//! batch, so the backend contract is built around [`CacheBackend::get_many`] and
//! [`CacheBackend::set_many`]. Single-key operations are used by the write-through
//! path, which touches one entry at a time.
//!
//! # Implementing a Backend
//!
//! ```
//! use instacache_backend::{CacheBackend, CacheEntry, Error};
//! use std::collections::HashMap;
//! use std::sync::RwLock;
//! use std::time::Duration;
//!
//! struct SimpleBackend(RwLock<HashMap<String, CacheEntry<String>>>);
//!
//! impl CacheBackend<String, String> for SimpleBackend {
//!     async fn get(&self, key: &String) -> Result<Option<String>, Error> {
//!         Ok(self.0.read().unwrap().get(key).map(|e| e.value().clone()))
//!     }
//!
//!     async fn get_many(&self, keys: &[String]) -> Result<HashMap<String, String>, Error> {
//!         let data = self.0.read().unwrap();
//!         Ok(keys
//!             .iter()
//!             .filter_map(|k| data.get(k).map(|e| (k.clone(), e.value().clone())))
//!             .collect())
//!     }
//!
//!     async fn set(&self, key: &String, value: String, ttl: Option<Duration>) -> Result<(), Error> {
//!         self.0.write().unwrap().insert(key.clone(), CacheEntry::from_parts(value, ttl));
//!         Ok(())
//!     }
//!
//!     async fn set_many(&self, entries: HashMap<String, String>, ttl: Option<Duration>) -> Result<(), Error> {
//!         let mut data = self.0.write().unwrap();
//!         for (key, value) in entries {
//!             data.insert(key, CacheEntry::from_parts(value, ttl));
//!         }
//!         Ok(())
//!     }
//!
//!     async fn delete(&self, key: &String) -> Result<(), Error> {
//!         self.0.write().unwrap().remove(key);
//!         Ok(())
//!     }
//! }
//! ```
//!
//! # Dynamic Dispatch
//!
//! Enable the `dynamic-backend` feature (on by default) for [`DynamicBackend`], which
//! wraps any `CacheBackend` in a clonable, type-erased container.

mod backend;
mod entry;
pub mod error;
#[cfg(any(feature = "test-util", test))]
pub mod testing;

#[cfg(any(test, feature = "dynamic-backend"))]
mod dynamic;

#[doc(inline)]
pub use backend::CacheBackend;
#[cfg(any(test, feature = "dynamic-backend"))]
#[doc(inline)]
pub use dynamic::{DynamicBackend, DynamicBackendExt};
#[doc(inline)]
pub use entry::CacheEntry;
#[doc(inline)]
pub use error::{Error, Result};
