// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The instance cache engine: bulk get-or-load and write-through updates.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::try_join_all;
use instacache_backend::{CacheBackend, DynamicBackend};
use tick::Clock;

use crate::builder::InstanceCacheBuilder;
use crate::strategy::{Dependent, InvalidationTarget, Strategies};
use crate::telemetry::ext::ClockExt;
use crate::telemetry::{CacheActivity, CacheName, CacheOperation, CacheTelemetry};
use crate::{
    BackendFailure, CacheKey, CachedData, EntityRef, EntityType, Error, KeyBuilder, ObjectSpec, PrimaryKey, Settings, TypeRegistry,
};

/// One entry of a [`InstanceCache::get_instances`] result.
#[derive(Debug, Clone)]
pub struct Instance {
    data: CachedData,
    key: CacheKey,
    entity: Option<EntityRef>,
}

impl Instance {
    /// Returns the cached representation.
    #[must_use]
    pub fn data(&self) -> &CachedData {
        &self.data
    }

    /// Returns the key the representation is stored under.
    #[must_use]
    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Returns the live entity if it was loaded by this call.
    ///
    /// Cache hits never carry an entity.
    #[must_use]
    pub fn entity(&self) -> Option<&EntityRef> {
        self.entity.as_ref()
    }

    /// Splits the instance into its parts.
    #[must_use]
    pub fn into_parts(self) -> (CachedData, CacheKey, Option<EntityRef>) {
        (self.data, self.key, self.entity)
    }
}

/// Caches serialized entity instances in a shared backend.
///
/// Reads are batched: [`get_instances`](Self::get_instances) issues one bulk read
/// for all requested instances and at most one bulk write for those it had to
/// load. Writes go through [`update_instance`](Self::update_instance), which
/// refreshes one entry and runs a single hop of invalidation.
///
/// Clones share the backend, the registered types and the telemetry.
///
/// # Example
///
/// ```
/// use instacache::{Entity, EntityType, InstanceCache, LoadFn, ObjectSpec, PrimaryKey, Strategies};
/// use serde::{Deserialize, Serialize};
/// use tick::Clock;
///
/// #[derive(Debug, Serialize, Deserialize)]
/// struct Widget {
///     id: i64,
///     name: String,
/// }
///
/// impl Entity for Widget {
///     fn pk(&self) -> PrimaryKey {
///         self.id.into()
///     }
///
///     fn attribute(&self, name: &str) -> Option<serde_json::Value> {
///         instacache::serde_attribute(self, name)
///     }
/// }
///
/// # futures::executor::block_on(async {
/// let cache = InstanceCache::builder(instacache_memory::InMemoryBackend::new(), Clock::new_frozen())
///     .key_prefix("C")
///     .register(
///         EntityType::builder("shop", "Widget").field("id").field("name").build::<Widget>(),
///         Strategies::serde::<Widget>(LoadFn::<_, Widget>::new(|pk: PrimaryKey| async move {
///             Ok::<_, instacache::Error>(Some(Widget { id: 7, name: format!("Bolt {pk}") }))
///         })),
///     )
///     .build()?;
///
/// let spec = ObjectSpec::new("Widget", 7);
/// let found = cache.get_instances([spec.clone()]).await?;
/// assert_eq!(found[&spec].key().as_str(), "C_shop.widget_7");
/// assert!(found[&spec].entity().is_some());
///
/// let again = cache.get_instances([spec.clone()]).await?;
/// assert!(again[&spec].entity().is_none());
/// # Ok::<(), instacache::Error>(())
/// # });
/// ```
#[derive(Clone, Debug)]
pub struct InstanceCache {
    inner: Arc<CacheInner>,
}

#[derive(Debug)]
struct CacheInner {
    name: CacheName,
    backend: DynamicBackend<CacheKey, CachedData>,
    registry: TypeRegistry,
    strategies: HashMap<String, Strategies>,
    keys: KeyBuilder,
    settings: Settings,
    telemetry: CacheTelemetry,
    clock: Clock,
}

/// Specs sharing one cache key, with the type they resolved to.
struct Pending {
    entity_type: Arc<EntityType>,
    pk: PrimaryKey,
    specs: Vec<ObjectSpec>,
}

#[derive(Debug, Default)]
struct BatchStats {
    hits: u64,
    misses: u64,
    absent: u64,
}

enum UpdateOutcome {
    Skipped,
    Unchanged,
    Written(u64, Vec<Dependent>),
    Deleted(u64, Vec<Dependent>),
}

impl InstanceCache {
    /// Starts building a cache over `backend`, timing operations with `clock`.
    pub fn builder<B>(backend: B, clock: Clock) -> InstanceCacheBuilder<B>
    where
        B: CacheBackend<CacheKey, CachedData> + 'static,
    {
        InstanceCacheBuilder::new(backend, clock)
    }

    pub(crate) fn from_parts(
        name: CacheName,
        backend: DynamicBackend<CacheKey, CachedData>,
        registry: TypeRegistry,
        strategies: HashMap<String, Strategies>,
        settings: Settings,
        telemetry: CacheTelemetry,
        clock: Clock,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                name,
                backend,
                registry,
                strategies,
                keys: KeyBuilder::new(settings.key_prefix.clone()),
                settings,
                telemetry,
                clock,
            }),
        }
    }

    /// Returns the name this cache reports in telemetry.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Returns the active settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Returns the registered entity types.
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.inner.registry
    }

    /// Resolves a bare or qualified type name.
    ///
    /// # Errors
    ///
    /// Returns `UnknownType` or `AmbiguousType` if the name does not pick exactly one type.
    pub fn resolve(&self, type_name: &str) -> Result<Arc<EntityType>, Error> {
        self.inner.registry.resolve(type_name)
    }

    /// Returns the cache key for `(type_name, pk)`.
    ///
    /// Bare and qualified spellings of the same type produce the same key.
    ///
    /// # Errors
    ///
    /// Returns a type resolution error if `type_name` does not pick exactly one type.
    pub fn key_for(&self, type_name: &str, pk: &PrimaryKey) -> Result<CacheKey, Error> {
        let entity_type = self.resolve(type_name)?;
        Ok(self.inner.keys.key_for(&entity_type, pk))
    }

    /// Loads an entity straight from its loader, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Returns a type resolution error, `Unregistered` if the type has no
    /// strategies, or whatever the loader fails with.
    pub async fn load(&self, type_name: &str, pk: &PrimaryKey) -> Result<Option<EntityRef>, Error> {
        let entity_type = self.resolve(type_name)?;
        self.strategies_for(&entity_type)?.load(pk).await
    }

    /// Returns cached data for every spec, loading and caching the misses.
    ///
    /// Specs whose loader reports no entity are left out of the result. Loaded
    /// entities are returned alongside their data; hits carry no entity.
    ///
    /// # Errors
    ///
    /// Fails if a type does not resolve or has no strategies, if a loader or
    /// serializer fails, or if the backend fails under [`BackendFailure::Propagate`].
    pub async fn get_instances(&self, specs: impl IntoIterator<Item = ObjectSpec>) -> Result<HashMap<ObjectSpec, Instance>, Error> {
        let specs: Vec<ObjectSpec> = specs.into_iter().collect();
        let timed = self.inner.clock.timed(self.fetch(specs)).await;
        let telemetry = &self.inner.telemetry;
        let name = self.inner.name;
        let op = CacheOperation::GetInstances;

        match timed.result {
            Ok((found, stats)) => {
                telemetry.record(name, op, CacheActivity::Hit, stats.hits, None);
                telemetry.record(name, op, CacheActivity::Miss, stats.misses, None);
                telemetry.record(name, op, CacheActivity::Absent, stats.absent, None);
                telemetry.record(name, op, CacheActivity::Ok, 1, Some(timed.duration));
                Ok(found)
            }
            Err(e) => {
                telemetry.record(name, op, CacheActivity::Error, 1, Some(timed.duration));
                Err(e)
            }
        }
    }

    async fn fetch(&self, specs: Vec<ObjectSpec>) -> Result<(HashMap<ObjectSpec, Instance>, BatchStats), Error> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut pending: HashMap<CacheKey, Pending> = HashMap::new();

        for spec in specs {
            if !seen.insert(spec.clone()) {
                continue;
            }
            let entity_type = self.resolve(spec.type_name())?;
            let key = self.inner.keys.key_for(&entity_type, spec.pk());
            pending
                .entry(key)
                .or_insert_with_key(|key| {
                    order.push(key.clone());
                    Pending {
                        entity_type,
                        pk: spec.pk().clone(),
                        specs: Vec::new(),
                    }
                })
                .specs
                .push(spec);
        }

        let mut stats = BatchStats::default();
        let mut found = HashMap::with_capacity(seen.len());
        if order.is_empty() {
            return Ok((found, stats));
        }
        self.inner.telemetry.record_batch_size(self.inner.name, order.len() as u64);

        let mut cached = if self.inner.settings.enabled {
            self.read_many(&order).await?
        } else {
            HashMap::new()
        };

        let mut misses = Vec::new();
        for key in order {
            let Some(slot) = pending.remove(&key) else { continue };
            match cached.remove(&key) {
                Some(data) => {
                    stats.hits += 1;
                    for spec in slot.specs {
                        found.insert(
                            spec,
                            Instance {
                                data: data.clone(),
                                key: key.clone(),
                                entity: None,
                            },
                        );
                    }
                }
                None => misses.push((key, slot)),
            }
        }
        stats.misses = misses.len() as u64;

        let loaded = try_join_all(misses.iter().map(|(_, slot)| self.load_missing(slot))).await?;

        let mut staged = HashMap::new();
        for ((key, slot), loaded) in misses.into_iter().zip(loaded) {
            let Some((data, entity)) = loaded else {
                stats.absent += 1;
                continue;
            };
            for spec in slot.specs {
                found.insert(
                    spec,
                    Instance {
                        data: data.clone(),
                        key: key.clone(),
                        entity: Some(Arc::clone(&entity)),
                    },
                );
            }
            staged.insert(key, data);
        }

        if self.inner.settings.enabled && !staged.is_empty() {
            self.write_many(staged).await?;
        }

        Ok((found, stats))
    }

    async fn load_missing(&self, slot: &Pending) -> Result<Option<(CachedData, EntityRef)>, Error> {
        let strategies = self.strategies_for(&slot.entity_type)?;
        let Some(entity) = strategies.load(&slot.pk).await? else {
            return Ok(None);
        };
        let data = strategies.serialize(entity.as_ref())?;
        Ok(Some((data, entity)))
    }

    /// Refreshes the cached entry for `(type_name, pk)` and runs one hop of invalidation.
    ///
    /// When `entity` is `None` it is loaded first; a loader reporting no entity
    /// means the entity was deleted and its entry is removed. An entity whose
    /// serialized form equals the cached one causes no write and no cascade. With
    /// `update_only` set, entries that are not already cached are never created.
    ///
    /// Before a write or delete is committed the type's invalidator runs: literal
    /// keys and immediate dependents are deleted right away, and every dependent
    /// is returned for the caller to process (see [`InvalidationQueue`](crate::InvalidationQueue)).
    /// If one of those deletes fails the entry is left as it was, so calling
    /// again repeats the cascade.
    /// Deletions only cascade when [`Settings::cascade_on_delete`] is set.
    ///
    /// Types without registered strategies are skipped, as is every call while
    /// the cache is disabled.
    ///
    /// # Errors
    ///
    /// Fails if a type does not resolve, if the loader or serializer fails, or if
    /// the backend fails.
    pub async fn update_instance(
        &self,
        type_name: &str,
        pk: &PrimaryKey,
        entity: Option<EntityRef>,
        update_only: bool,
    ) -> Result<Vec<Dependent>, Error> {
        let timed = self
            .inner
            .clock
            .timed(self.refresh(type_name, pk, entity, update_only))
            .await;
        let telemetry = &self.inner.telemetry;
        let name = self.inner.name;
        let op = CacheOperation::UpdateInstance;
        let duration = Some(timed.duration);

        match timed.result {
            Ok(UpdateOutcome::Skipped) => {
                telemetry.record(name, op, CacheActivity::Skipped, 1, duration);
                Ok(Vec::new())
            }
            Ok(UpdateOutcome::Unchanged) => {
                telemetry.record(name, op, CacheActivity::Unchanged, 1, duration);
                Ok(Vec::new())
            }
            Ok(UpdateOutcome::Written(invalidated, deferred)) => {
                telemetry.record(name, op, CacheActivity::Written, 1, duration);
                telemetry.record(name, op, CacheActivity::Invalidated, invalidated, None);
                telemetry.record(name, op, CacheActivity::Deferred, deferred.len() as u64, None);
                Ok(deferred)
            }
            Ok(UpdateOutcome::Deleted(invalidated, deferred)) => {
                telemetry.record(name, op, CacheActivity::Deleted, 1, duration);
                telemetry.record(name, op, CacheActivity::Invalidated, invalidated, None);
                telemetry.record(name, op, CacheActivity::Deferred, deferred.len() as u64, None);
                Ok(deferred)
            }
            Err(e) => {
                telemetry.record(name, op, CacheActivity::Error, 1, duration);
                Err(e)
            }
        }
    }

    async fn refresh(&self, type_name: &str, pk: &PrimaryKey, entity: Option<EntityRef>, update_only: bool) -> Result<UpdateOutcome, Error> {
        if !self.inner.settings.enabled {
            return Ok(UpdateOutcome::Skipped);
        }

        let entity_type = self.resolve(type_name)?;
        let Some(strategies) = self.inner.strategies.get(&entity_type.label()) else {
            return Ok(UpdateOutcome::Skipped);
        };

        let entity = match entity {
            Some(entity) => Some(entity),
            None => strategies.load(pk).await?,
        };
        let key = self.inner.keys.key_for(&entity_type, pk);
        let current = self.inner.backend.get(&key).await?;

        match entity {
            None => {
                let Some(current) = current else {
                    return Ok(UpdateOutcome::Skipped);
                };
                let (invalidated, deferred) = if self.inner.settings.cascade_on_delete {
                    let last_known = entity_type.construct(&current)?;
                    self.cascade(strategies, last_known.as_ref()).await?
                } else {
                    (0, Vec::new())
                };
                self.inner.backend.delete(&key).await?;
                Ok(UpdateOutcome::Deleted(invalidated, deferred))
            }
            Some(entity) => {
                let data = strategies.serialize(entity.as_ref())?;
                if current.as_ref() == Some(&data) {
                    return Ok(UpdateOutcome::Unchanged);
                }
                if update_only && current.is_none() {
                    return Ok(UpdateOutcome::Skipped);
                }
                let (invalidated, deferred) = self.cascade(strategies, entity.as_ref()).await?;
                self.inner.backend.set(&key, data, self.inner.settings.ttl).await?;
                Ok(UpdateOutcome::Written(invalidated, deferred))
            }
        }
    }

    /// Applies the invalidator's targets for `entity`; returns how many entries
    /// were deleted and the dependents to hand back.
    async fn cascade(&self, strategies: &Strategies, entity: &dyn crate::Entity) -> Result<(u64, Vec<Dependent>), Error> {
        let mut invalidated = 0;
        let mut deferred = Vec::new();

        for target in strategies.invalidate(entity) {
            match target {
                InvalidationTarget::Key(key) => {
                    self.inner.backend.delete(&key).await?;
                    invalidated += 1;
                }
                InvalidationTarget::Dependent(dependent) => {
                    if dependent.immediate {
                        let key = self.key_for(&dependent.type_name, &dependent.pk)?;
                        self.inner.backend.delete(&key).await?;
                        invalidated += 1;
                    }
                    deferred.push(dependent);
                }
            }
        }

        Ok((invalidated, deferred))
    }

    /// Removes the cached entry for `(type_name, pk)` without loading or cascading.
    ///
    /// Does nothing while the cache is disabled.
    ///
    /// # Errors
    ///
    /// Fails if the type does not resolve or the backend fails.
    pub async fn delete(&self, type_name: &str, pk: &PrimaryKey) -> Result<(), Error> {
        if !self.inner.settings.enabled {
            return Ok(());
        }

        let key = self.key_for(type_name, pk)?;
        let timed = self.inner.clock.timed(self.inner.backend.delete(&key)).await;
        let activity = if timed.result.is_ok() {
            CacheActivity::Deleted
        } else {
            CacheActivity::Error
        };
        self.inner
            .telemetry
            .record(self.inner.name, CacheOperation::Delete, activity, 1, Some(timed.duration));
        Ok(timed.result?)
    }

    fn strategies_for(&self, entity_type: &EntityType) -> Result<&Strategies, Error> {
        let label = entity_type.label();
        self.inner.strategies.get(&label).ok_or_else(|| Error::unregistered(&label))
    }

    async fn read_many(&self, keys: &[CacheKey]) -> Result<HashMap<CacheKey, CachedData>, Error> {
        match self.inner.backend.get_many(keys).await {
            Ok(found) => Ok(found),
            Err(e) if self.inner.settings.backend_failure == BackendFailure::TreatAsMiss => {
                tracing::warn!(cache.name = self.inner.name, error = %e, "bulk read failed, treating every key as a miss");
                self.inner
                    .telemetry
                    .record(self.inner.name, CacheOperation::GetInstances, CacheActivity::Fallback, 1, None);
                Ok(HashMap::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write_many(&self, entries: HashMap<CacheKey, CachedData>) -> Result<(), Error> {
        match self.inner.backend.set_many(entries, self.inner.settings.ttl).await {
            Ok(()) => Ok(()),
            Err(e) if self.inner.settings.backend_failure == BackendFailure::TreatAsMiss => {
                tracing::warn!(cache.name = self.inner.name, error = %e, "bulk write failed, entries were not cached");
                self.inner
                    .telemetry
                    .record(self.inner.name, CacheOperation::GetInstances, CacheActivity::Fallback, 1, None);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
