// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Entity-like access to cached data.

use std::fmt::{self, Debug};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use serde_json::Value;

use crate::{CachedData, EntityRef, EntityType, Error, PrimaryKey};

/// A cached representation presented as an entity.
///
/// Attribute lookup is two-tier. Fields the entity type declares are read from
/// the real entity, which is rebuilt from the cached fields on first use so
/// declared fields follow the entity's own typing. Anything else is looked up
/// directly in the cached data, which covers computed or denormalized values the
/// serializer adds. `pk` always comes from the real entity.
pub struct CachedEntity {
    entity_type: Arc<EntityType>,
    data: CachedData,
    real: OnceCell<EntityRef>,
}

impl CachedEntity {
    /// Wraps `data` cached for an entity of `entity_type`.
    #[must_use]
    pub fn new(entity_type: Arc<EntityType>, data: CachedData) -> Self {
        Self {
            entity_type,
            data,
            real: OnceCell::new(),
        }
    }

    /// Wraps `data`, reusing `entity` as the real entity when one was loaded already.
    #[must_use]
    pub fn with_entity(entity_type: Arc<EntityType>, data: CachedData, entity: Option<EntityRef>) -> Self {
        Self {
            entity_type,
            data,
            real: entity.map_or_else(OnceCell::new, OnceCell::with_value),
        }
    }

    /// Returns the type of the wrapped entity.
    #[must_use]
    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.entity_type
    }

    /// Returns the cached representation.
    #[must_use]
    pub fn data(&self) -> &CachedData {
        &self.data
    }

    /// Consumes the wrapper and returns the cached representation.
    #[must_use]
    pub fn into_data(self) -> CachedData {
        self.data
    }

    /// Returns the real entity, rebuilding it from the cached data on first use.
    ///
    /// # Errors
    ///
    /// Returns a `Serialization` error if the entity cannot be rebuilt.
    pub fn entity(&self) -> Result<&EntityRef, Error> {
        self.real.get_or_try_init(|| self.entity_type.construct(&self.data))
    }

    /// Returns the primary key of the real entity.
    ///
    /// # Errors
    ///
    /// Returns a `Serialization` error if the entity cannot be rebuilt.
    pub fn pk(&self) -> Result<PrimaryKey, Error> {
        Ok(self.entity()?.pk())
    }

    /// Returns the named attribute.
    ///
    /// # Errors
    ///
    /// Returns `AttributeNotFound` if neither the real entity nor the cached data
    /// has the attribute, or a `Serialization` error if a declared field is
    /// requested and the real entity cannot be rebuilt.
    pub fn get(&self, name: &str) -> Result<Value, Error> {
        if name == "pk" {
            return Ok(self.pk()?.to_value());
        }

        let value = if self.entity_type.declares(name) {
            self.entity()?.attribute(name)
        } else {
            self.data.get(name).cloned()
        };

        value.ok_or_else(|| Error::attribute_not_found(&self.entity_type.label(), name))
    }
}

impl Debug for CachedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.entity() {
            Ok(entity) => write!(f, "<CachedEntity {} {}>", self.entity_type.label(), entity.pk()),
            Err(_) => write!(f, "<CachedEntity {} ?>", self.entity_type.label()),
        }
    }
}
