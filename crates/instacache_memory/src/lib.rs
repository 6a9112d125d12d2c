// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! In-process cache backend backed by moka.
//!
//! This crate provides [`InMemoryBackend`], a concurrent in-memory implementation of
//! [`CacheBackend`](instacache_backend::CacheBackend). Entries written with a TTL
//! expire individually; entries written without one live until evicted or deleted.
//! Use [`InMemoryBackendBuilder`] to configure capacity and idle expiry without
//! exposing moka types.
//!
//! # Quick Start
//!
//! ```
//! use instacache_backend::CacheBackend;
//! use instacache_memory::InMemoryBackend;
//! use std::time::Duration;
//!
//! # futures::executor::block_on(async {
//! let backend = InMemoryBackend::<String, i32>::builder()
//!     .max_capacity(1000)
//!     .build();
//!
//! backend.set(&"key".to_string(), 42, Some(Duration::from_secs(300))).await?;
//! assert_eq!(backend.get(&"key".to_string()).await?, Some(42));
//! # Ok::<(), instacache_backend::Error>(())
//! # });
//! ```

pub mod backend;
pub mod builder;

#[doc(inline)]
pub use backend::InMemoryBackend;
#[doc(inline)]
pub use builder::InMemoryBackendBuilder;
