// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Routing of request actions between cached and direct reads.

use std::sync::Arc;

use serde_json::Value;

use crate::{BackingQuery, CachedCollection, CachedEntity, Criteria, EntityRef, EntityType, Error, InstanceCache};

/// The kind of request an API endpoint is serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Listing a collection.
    List,
    /// Reading one object.
    Retrieve,
    /// Creating an object.
    Create,
    /// Replacing an object.
    Update,
    /// Changing some fields of an object.
    PartialUpdate,
    /// Deleting an object.
    Destroy,
}

impl Action {
    /// Returns true for read-only actions, which are served from the cache.
    ///
    /// Writes always go to the backing store so they act on live entities.
    #[must_use]
    pub fn uses_cache(self) -> bool {
        matches!(self, Self::List | Self::Retrieve)
    }
}

/// A query routed for one action: through the cache for reads, straight to the
/// backing store otherwise.
#[derive(Debug, Clone)]
pub enum Queryset<Q> {
    /// Reads are resolved through the instance cache.
    Cached(CachedCollection<Q>),
    /// Reads go directly to the backing store.
    Direct(Q),
}

impl<Q: BackingQuery> Queryset<Q> {
    /// Picks the cached collection or the direct query for `action`.
    pub fn for_action(action: Action, cache: &InstanceCache, query: Q) -> Self {
        if action.uses_cache() {
            Self::Cached(CachedCollection::new(cache.clone(), query))
        } else {
            Self::Direct(query)
        }
    }

    /// Returns true if reads go through the cache.
    pub fn is_cached(&self) -> bool {
        matches!(self, Self::Cached(_))
    }

    /// Looks up the single object matching `criteria`.
    ///
    /// The direct path loads the live entity through the type's loader with the
    /// cache bypassed.
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error on either path when no object matches, and
    /// `MultipleFound` when several do.
    pub async fn get_object(&self, cache: &InstanceCache, criteria: &Criteria) -> Result<Object, Error> {
        match self {
            Self::Cached(collection) => collection.get(criteria).await.map(Object::Cached),
            Self::Direct(query) => {
                let pk = query.get_pk(criteria).await?;
                let entity_type = cache.resolve(query.type_name())?;
                match cache.load(query.type_name(), &pk).await? {
                    Some(entity) => Ok(Object::Direct { entity_type, entity }),
                    None => Err(Error::not_found(format!("{} {pk} does not exist", entity_type.label()))),
                }
            }
        }
    }
}

/// An object returned by [`Queryset::get_object`].
#[derive(Debug)]
pub enum Object {
    /// Cached data presented as an entity.
    Cached(CachedEntity),
    /// A live entity from the backing store.
    Direct {
        /// The entity's type.
        entity_type: Arc<EntityType>,
        /// The live entity.
        entity: EntityRef,
    },
}

impl Object {
    /// Returns the named attribute of the object.
    ///
    /// # Errors
    ///
    /// Returns `AttributeNotFound` if the object has no such attribute.
    pub fn get(&self, name: &str) -> Result<Value, Error> {
        match self {
            Self::Cached(entity) => entity.get(name),
            Self::Direct { entity, .. } if name == "pk" => Ok(entity.pk().to_value()),
            Self::Direct { entity_type, entity } => entity
                .attribute(name)
                .ok_or_else(|| Error::attribute_not_found(&entity_type.label(), name)),
        }
    }
}
