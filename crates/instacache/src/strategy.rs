// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-type strategies: loading, serializing and invalidating entities.

use std::fmt::{self, Debug};
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;

use crate::{CacheKey, CachedData, Entity, EntityRef, Error, PrimaryKey};

/// Resolves a primary key to a live entity, or to nothing if it does not exist.
///
/// Absence is a normal outcome and must be reported as `Ok(None)`, not as an error.
#[dynosaur::dynosaur(pub(crate) DynLoader = dyn(box) Loader, bridge(none))]
pub trait Loader: Send + Sync {
    /// Loads the entity with the given primary key.
    fn load(&self, pk: &PrimaryKey) -> impl Future<Output = Result<Option<EntityRef>, Error>> + Send;
}

/// Produces the cached representation of a live entity.
///
/// The output must be a pure function of the entity's state; the engine compares
/// representations to decide whether an update changed anything.
pub trait Serializer: Send + Sync {
    /// Serializes the entity.
    ///
    /// # Errors
    ///
    /// Returns a `Serialization` error if the entity cannot be represented.
    fn serialize(&self, entity: &dyn Entity) -> Result<CachedData, Error>;
}

/// Lists what else must be invalidated when an entity changes.
pub trait Invalidator: Send + Sync {
    /// Returns the invalidation targets for the entity.
    fn invalidate(&self, entity: &dyn Entity) -> Vec<InvalidationTarget>;
}

/// A dependent entity whose cached entry may be stale after a change.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependent {
    /// Type name of the dependent entity, bare or qualified.
    pub type_name: String,
    /// Primary key of the dependent entity.
    pub pk: PrimaryKey,
    /// Delete the dependent's own entry right away instead of waiting for a refresh.
    pub immediate: bool,
}

/// One instruction produced by an [`Invalidator`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InvalidationTarget {
    /// A literal key to delete immediately.
    Key(CacheKey),
    /// A dependent entity, handed back to the caller for the next hop.
    Dependent(Dependent),
}

impl InvalidationTarget {
    /// Creates a literal-key target.
    pub fn key(key: impl Into<String>) -> Self {
        Self::Key(CacheKey::new(key))
    }

    /// Creates a dependent-entity target.
    pub fn dependent(type_name: impl Into<String>, pk: impl Into<PrimaryKey>, immediate: bool) -> Self {
        Self::Dependent(Dependent {
            type_name: type_name.into(),
            pk: pk.into(),
            immediate,
        })
    }
}

/// An invalidator that never invalidates anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInvalidation;

impl Invalidator for NoInvalidation {
    fn invalidate(&self, _entity: &dyn Entity) -> Vec<InvalidationTarget> {
        Vec::new()
    }
}

/// Adapts an async closure into a [`Loader`] for entities of type `T`.
///
/// # Example
///
/// ```
/// use instacache::{Entity, LoadFn, PrimaryKey};
///
/// #[derive(Debug)]
/// struct Widget {
///     id: i64,
/// }
///
/// impl Entity for Widget {
///     fn pk(&self) -> PrimaryKey {
///         self.id.into()
///     }
///
///     fn attribute(&self, _name: &str) -> Option<serde_json::Value> {
///         None
///     }
/// }
///
/// let loader = LoadFn::<_, Widget>::new(|pk: PrimaryKey| async move {
///     Ok::<_, instacache::Error>(match pk {
///         PrimaryKey::Int(id) if id > 0 => Some(Widget { id }),
///         _ => None,
///     })
/// });
/// # let _ = loader;
/// ```
pub struct LoadFn<F, T> {
    f: F,
    _entity: PhantomData<fn() -> T>,
}

impl<F, T> LoadFn<F, T> {
    /// Wraps the closure.
    pub fn new(f: F) -> Self {
        Self { f, _entity: PhantomData }
    }
}

impl<F, T> Debug for LoadFn<F, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadFn").field("entity", &std::any::type_name::<T>()).finish()
    }
}

impl<F, Fut, T> Loader for LoadFn<F, T>
where
    F: Fn(PrimaryKey) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<T>, Error>> + Send,
    T: Entity,
{
    fn load(&self, pk: &PrimaryKey) -> impl Future<Output = Result<Option<EntityRef>, Error>> + Send {
        let loading = (self.f)(pk.clone());
        async move { Ok(loading.await?.map(|entity| Arc::new(entity) as EntityRef)) }
    }
}

/// Serializes entities of type `T` through their `serde` representation.
///
/// The representation must be a JSON object.
pub struct SerdeSerializer<T> {
    _entity: PhantomData<fn(&T)>,
}

impl<T> SerdeSerializer<T> {
    /// Creates the serializer.
    #[must_use]
    pub fn new() -> Self {
        Self { _entity: PhantomData }
    }
}

impl<T> Default for SerdeSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debug for SerdeSerializer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerdeSerializer")
            .field("entity", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T> Serializer for SerdeSerializer<T>
where
    T: Entity + Serialize,
{
    fn serialize(&self, entity: &dyn Entity) -> Result<CachedData, Error> {
        let entity = downcast::<T>(entity)?;
        match serde_json::to_value(entity) {
            Ok(serde_json::Value::Object(data)) => Ok(data),
            Ok(other) => Err(Error::serialization(format!(
                "{} serialized to a non-object value: {other}",
                std::any::type_name::<T>()
            ))),
            Err(e) => Err(Error::serialization_caused_by(
                format!("cannot serialize {}", std::any::type_name::<T>()),
                e,
            )),
        }
    }
}

/// Adapts a closure into a [`Serializer`] for entities of type `T`.
pub struct SerializeFn<F, T> {
    f: F,
    _entity: PhantomData<fn(&T)>,
}

impl<F, T> SerializeFn<F, T> {
    /// Wraps the closure.
    pub fn new(f: F) -> Self {
        Self { f, _entity: PhantomData }
    }
}

impl<F, T> Debug for SerializeFn<F, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializeFn").field("entity", &std::any::type_name::<T>()).finish()
    }
}

impl<F, T> Serializer for SerializeFn<F, T>
where
    F: Fn(&T) -> CachedData + Send + Sync,
    T: Entity,
{
    fn serialize(&self, entity: &dyn Entity) -> Result<CachedData, Error> {
        downcast::<T>(entity).map(&self.f)
    }
}

/// Adapts a closure into an [`Invalidator`] for entities of type `T`.
///
/// Entities of any other type produce no targets.
pub struct InvalidateFn<F, T> {
    f: F,
    _entity: PhantomData<fn(&T)>,
}

impl<F, T> InvalidateFn<F, T> {
    /// Wraps the closure.
    pub fn new(f: F) -> Self {
        Self { f, _entity: PhantomData }
    }
}

impl<F, T> Debug for InvalidateFn<F, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvalidateFn")
            .field("entity", &std::any::type_name::<T>())
            .finish()
    }
}

impl<F, T> Invalidator for InvalidateFn<F, T>
where
    F: Fn(&T) -> Vec<InvalidationTarget> + Send + Sync,
    T: Entity,
{
    fn invalidate(&self, entity: &dyn Entity) -> Vec<InvalidationTarget> {
        entity.downcast_ref::<T>().map(&self.f).unwrap_or_default()
    }
}

fn downcast<T: Entity>(entity: &dyn Entity) -> Result<&T, Error> {
    entity
        .downcast_ref::<T>()
        .ok_or_else(|| Error::serialization(format!("entity {entity:?} is not a {}", std::any::type_name::<T>())))
}

/// The loader, serializer and invalidator registered for one entity type.
///
/// # Example
///
/// ```
/// use instacache::{Entity, LoadFn, PrimaryKey, Strategies};
/// use serde::Serialize;
///
/// #[derive(Debug, Serialize)]
/// struct Widget {
///     id: i64,
/// }
///
/// impl Entity for Widget {
///     fn pk(&self) -> PrimaryKey {
///         self.id.into()
///     }
///
///     fn attribute(&self, _name: &str) -> Option<serde_json::Value> {
///         None
///     }
/// }
///
/// let strategies = Strategies::serde::<Widget>(LoadFn::<_, Widget>::new(|pk: PrimaryKey| async move {
///     Ok::<_, instacache::Error>(matches!(pk, PrimaryKey::Int(1)).then(|| Widget { id: 1 }))
/// }));
/// # let _ = strategies;
/// ```
#[derive(Clone)]
pub struct Strategies {
    loader: Arc<DynLoader<'static>>,
    serializer: Arc<dyn Serializer>,
    invalidator: Arc<dyn Invalidator>,
}

impl Strategies {
    /// Combines a loader and a serializer; nothing is invalidated on change.
    pub fn new(loader: impl Loader + 'static, serializer: impl Serializer + 'static) -> Self {
        Self {
            loader: DynLoader::new_arc(loader),
            serializer: Arc::new(serializer),
            invalidator: Arc::new(NoInvalidation),
        }
    }

    /// Combines a loader with the `serde` representation of `T`.
    pub fn serde<T>(loader: impl Loader + 'static) -> Self
    where
        T: Entity + Serialize,
    {
        Self::new(loader, SerdeSerializer::<T>::new())
    }

    /// Replaces the invalidator.
    #[must_use]
    pub fn with_invalidator(mut self, invalidator: impl Invalidator + 'static) -> Self {
        self.invalidator = Arc::new(invalidator);
        self
    }

    pub(crate) async fn load(&self, pk: &PrimaryKey) -> Result<Option<EntityRef>, Error> {
        self.loader.load(pk).await
    }

    pub(crate) fn serialize(&self, entity: &dyn Entity) -> Result<CachedData, Error> {
        self.serializer.serialize(entity)
    }

    pub(crate) fn invalidate(&self, entity: &dyn Entity) -> Vec<InvalidationTarget> {
        self.invalidator.invalidate(entity)
    }
}

impl Debug for Strategies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strategies").finish_non_exhaustive()
    }
}
