// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Entities and the type descriptors the cache resolves them through.

use std::any::Any;
use std::fmt::{self, Debug};
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{CachedData, Error, PrimaryKey};

/// A live entity as returned by a loader.
///
/// `attribute` exposes field values by name; the cached entity wrapper uses it
/// for every field the entity's type declares.
pub trait Entity: Any + Debug + Send + Sync {
    /// Returns the entity's primary key.
    fn pk(&self) -> PrimaryKey;

    /// Returns the value of the named attribute, if the entity has one.
    fn attribute(&self, name: &str) -> Option<Value>;
}

impl dyn Entity {
    /// Returns the entity as a `T` if that is its concrete type.
    #[must_use]
    pub fn downcast_ref<T: Entity>(&self) -> Option<&T> {
        let any: &dyn Any = self;
        any.downcast_ref::<T>()
    }
}

/// A shared, type-erased entity.
pub type EntityRef = Arc<dyn Entity>;

/// Looks an attribute up in the `serde` representation of `entity`.
///
/// Handy for implementing [`Entity::attribute`] on serializable types.
#[must_use]
pub fn serde_attribute<T: Serialize>(entity: &T, name: &str) -> Option<Value> {
    match serde_json::to_value(entity) {
        Ok(Value::Object(mut fields)) => fields.remove(name),
        _ => None,
    }
}

/// How a declared field is stored on the real entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// A plain value stored under the field name.
    Value,
    /// A reference to another entity, stored on the real entity as `{name}_id`.
    Reference,
}

/// A field declared by an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    name: String,
    kind: FieldKind,
}

impl Field {
    /// Returns the field name as it appears in cached data.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns how the field is stored on the real entity.
    #[must_use]
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Returns the name the field has on the real entity.
    #[must_use]
    pub fn attname(&self) -> String {
        match self.kind {
            FieldKind::Value => self.name.clone(),
            FieldKind::Reference => format!("{}_id", self.name),
        }
    }
}

type Constructor = fn(CachedData) -> Result<EntityRef, serde_json::Error>;

/// Describes one entity type: where it lives, what it declares, and how to
/// rebuild a real entity from cached data.
pub struct EntityType {
    namespace: String,
    name: String,
    model_name: String,
    fields: Vec<Field>,
    construct: Constructor,
}

impl EntityType {
    /// Starts describing the type `name` in `namespace`.
    pub fn builder(namespace: impl Into<String>, name: impl Into<String>) -> EntityTypeBuilder {
        EntityTypeBuilder {
            namespace: namespace.into(),
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Returns the namespace the type is registered under.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the type name as declared.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the canonical lowercase type name used in keys and lookups.
    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Returns `namespace.model_name`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}.{}", self.namespace, self.model_name)
    }

    /// Returns the declared fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns the declared field called `name`.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Returns true if the type declares a field called `name`.
    #[must_use]
    pub fn declares(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Rebuilds a real entity from its cached representation.
    ///
    /// Only declared fields are passed on; reference fields are renamed to their
    /// `{name}_id` form. Undeclared keys in `data` are ignored.
    ///
    /// # Errors
    ///
    /// Returns a `Serialization` error if the entity cannot be built from the fields.
    pub fn construct(&self, data: &CachedData) -> Result<EntityRef, Error> {
        let fields = self
            .fields
            .iter()
            .filter_map(|field| data.get(&field.name).map(|value| (field.attname(), value.clone())))
            .collect();

        (self.construct)(fields)
            .map_err(|e| Error::serialization_caused_by(format!("cannot build {} from cached data", self.label()), e))
    }
}

impl Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityType")
            .field("namespace", &self.namespace)
            .field("name", &self.name)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// Builder for [`EntityType`].
#[derive(Debug)]
pub struct EntityTypeBuilder {
    namespace: String,
    name: String,
    fields: Vec<Field>,
}

impl EntityTypeBuilder {
    /// Declares a plain value field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(Field {
            name: name.into(),
            kind: FieldKind::Value,
        });
        self
    }

    /// Declares a reference field, stored on the real entity as `{name}_id`.
    #[must_use]
    pub fn reference(mut self, name: impl Into<String>) -> Self {
        self.fields.push(Field {
            name: name.into(),
            kind: FieldKind::Reference,
        });
        self
    }

    /// Finishes the descriptor; real entities are rebuilt by deserializing into `T`.
    #[must_use]
    pub fn build<T>(self) -> EntityType
    where
        T: Entity + DeserializeOwned,
    {
        let model_name = self.name.to_lowercase();
        EntityType {
            namespace: self.namespace,
            name: self.name,
            model_name,
            fields: self.fields,
            construct: construct_via_serde::<T>,
        }
    }
}

fn construct_via_serde<T>(fields: CachedData) -> Result<EntityRef, serde_json::Error>
where
    T: Entity + DeserializeOwned,
{
    let entity: T = serde_json::from_value(Value::Object(fields))?;
    Ok(Arc::new(entity))
}
