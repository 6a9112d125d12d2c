// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Object-instance caching with bulk loading, write-through invalidation and a
//! lazy collection facade.
//!
//! This crate caches the serialized form of entities, keyed by their type and
//! primary key, in a shared [`CacheBackend`](instacache_backend::CacheBackend):
//! - [`InstanceCache::get_instances`] reads any number of instances with one bulk
//!   backend read, loads the misses through per-type [`Strategies`] and writes
//!   them back with one bulk write
//! - [`InstanceCache::update_instance`] refreshes one entry and runs a single hop
//!   of invalidation, handing further dependents back to the caller
//! - [`CachedCollection`] and [`CachedEntity`] present cached data with the same
//!   filter, get, slice and iterate patterns as a direct backing-store query
//!
//! # Examples
//!
//! ## Registering a Type
//!
//! ```
//! use instacache::{Entity, EntityType, InstanceCache, InvalidationTarget, InvalidateFn, LoadFn, ObjectSpec, PrimaryKey, Strategies};
//! use serde::{Deserialize, Serialize};
//! use tick::Clock;
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Widget {
//!     id: i64,
//!     name: String,
//!     order_id: i64,
//! }
//!
//! impl Entity for Widget {
//!     fn pk(&self) -> PrimaryKey {
//!         self.id.into()
//!     }
//!
//!     fn attribute(&self, name: &str) -> Option<serde_json::Value> {
//!         instacache::serde_attribute(self, name)
//!     }
//! }
//!
//! # futures::executor::block_on(async {
//! let strategies = Strategies::serde::<Widget>(LoadFn::<_, Widget>::new(|_pk: PrimaryKey| async move {
//!     Ok::<_, instacache::Error>(Some(Widget { id: 7, name: "Bolt".into(), order_id: 42 }))
//! }))
//! .with_invalidator(InvalidateFn::<_, Widget>::new(|w: &Widget| {
//!     vec![InvalidationTarget::dependent("Order", w.order_id, false)]
//! }));
//!
//! let cache = InstanceCache::in_memory(Clock::new_frozen())
//!     .key_prefix("C")
//!     .register(
//!         EntityType::builder("shop", "Widget").field("id").field("name").build::<Widget>(),
//!         strategies,
//!     )
//!     .build()?;
//!
//! assert_eq!(cache.key_for("Widget", &7.into())?.as_str(), "C_shop.widget_7");
//!
//! let found = cache.get_instances([ObjectSpec::new("Widget", 7)]).await?;
//! assert_eq!(found.len(), 1);
//! # Ok::<(), instacache::Error>(())
//! # });
//! ```
//!
//! ## Reading Through a Collection
//!
//! A [`CachedCollection`] wraps any [`BackingQuery`]. It resolves primary keys
//! from the store once and reads every member with one batched cache call:
//!
//! ```no_run
//! # async fn run<Q: instacache::BackingQuery>(cache: instacache::InstanceCache, query: Q) -> Result<(), instacache::Error> {
//! use instacache::{CachedCollection, Criteria};
//!
//! let widgets = CachedCollection::new(cache, query).filter(&Criteria::new().eq("color", "red"));
//! for widget in widgets.entities().await? {
//!     println!("{:?} {}", widget, widget.get("name")?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `memory` (default): [`InstanceCache::in_memory`] over `instacache_memory`
//! - `metrics`: OpenTelemetry instruments, enabled per cache with
//!   [`InstanceCacheBuilder::metrics`]
//! - `test-util`: the [`testing`] module and the backend's `MockBackend`

mod action;
pub mod builder;
mod collection;
mod engine;
mod entity;
mod error;
mod key;
mod model;
mod propagate;
mod registry;
mod settings;
mod strategy;
mod telemetry;

#[cfg(any(feature = "test-util", test))]
pub mod testing;

/// The cached representation of one entity: a flat map from field names to values.
pub type CachedData = serde_json::Map<String, serde_json::Value>;

#[doc(inline)]
pub use action::{Action, Object, Queryset};
#[doc(inline)]
pub use builder::InstanceCacheBuilder;
#[doc(inline)]
pub use collection::{BackingQuery, CachedCollection, Criteria};
#[doc(inline)]
pub use engine::{Instance, InstanceCache};
#[doc(inline)]
pub use entity::CachedEntity;
#[doc(inline)]
pub use error::{Error, ErrorKind};
#[doc(inline)]
pub use key::{CacheKey, KeyBuilder, ObjectSpec, PrimaryKey};
#[doc(inline)]
pub use model::{Entity, EntityRef, EntityType, EntityTypeBuilder, Field, FieldKind, serde_attribute};
#[doc(inline)]
pub use propagate::{DrainReport, InvalidationQueue};
#[doc(inline)]
pub use registry::TypeRegistry;
#[doc(inline)]
pub use settings::{BackendFailure, DEFAULT_KEY_PREFIX, Settings};
#[doc(inline)]
pub use strategy::{Dependent, InvalidateFn, InvalidationTarget, Invalidator, LoadFn, Loader, NoInvalidation, SerdeSerializer, SerializeFn, Serializer, Strategies};

#[cfg(any(feature = "test-util", test))]
#[doc(inline)]
pub use instacache_backend::testing::{BackendOp, MockBackend};
