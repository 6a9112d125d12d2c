// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Instance identity: primary keys, object specs and cache keys.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::EntityType;

/// The primary key of one entity instance.
///
/// Integer and string keys are both supported; the `Display` form is what ends
/// up in the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKey {
    /// An integer key.
    Int(i64),
    /// A string key.
    Str(String),
}

impl PrimaryKey {
    /// Returns the key as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(pk) => Value::from(*pk),
            Self::Str(pk) => Value::from(pk.as_str()),
        }
    }

    /// Extracts a primary key from a JSON value.
    ///
    /// Returns `None` for values that cannot identify an entity (null, floats, objects, ...).
    #[must_use]
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number.as_i64().map(Self::Int),
            Value::String(pk) => Some(Self::Str(pk.clone())),
            _ => None,
        }
    }
}

impl Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(pk) => write!(f, "{pk}"),
            Self::Str(pk) => f.write_str(pk),
        }
    }
}

impl From<i64> for PrimaryKey {
    fn from(pk: i64) -> Self {
        Self::Int(pk)
    }
}

impl From<i32> for PrimaryKey {
    fn from(pk: i32) -> Self {
        Self::Int(i64::from(pk))
    }
}

impl From<u32> for PrimaryKey {
    fn from(pk: u32) -> Self {
        Self::Int(i64::from(pk))
    }
}

impl From<&str> for PrimaryKey {
    fn from(pk: &str) -> Self {
        Self::Str(pk.to_owned())
    }
}

impl From<String> for PrimaryKey {
    fn from(pk: String) -> Self {
        Self::Str(pk)
    }
}

/// Identifies one entity instance by the type name the caller used and its primary key.
///
/// The type name may be bare (`"Widget"`) or qualified (`"shop.Widget"`); results
/// of [`InstanceCache::get_instances`](crate::InstanceCache::get_instances) are
/// keyed by the spec exactly as the caller supplied it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectSpec {
    type_name: String,
    pk: PrimaryKey,
}

impl ObjectSpec {
    /// Creates a new object spec.
    pub fn new(type_name: impl Into<String>, pk: impl Into<PrimaryKey>) -> Self {
        Self {
            type_name: type_name.into(),
            pk: pk.into(),
        }
    }

    /// Returns the type name as supplied by the caller.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the primary key.
    #[must_use]
    pub fn pk(&self) -> &PrimaryKey {
        &self.pk
    }
}

/// The key one cached entry is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Wraps a literal key, e.g. one produced by an invalidator.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Builds cache keys as `{prefix}_{namespace}.{type}_{pk}`.
///
/// The type part is the canonical lowercase name of the resolved type, so bare
/// and qualified spellings of the same type share one key.
///
/// # Example
///
/// ```
/// use instacache::{Entity, EntityType, KeyBuilder, PrimaryKey};
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// struct Widget {
///     id: i64,
/// }
///
/// impl Entity for Widget {
///     fn pk(&self) -> PrimaryKey {
///         self.id.into()
///     }
///
///     fn attribute(&self, name: &str) -> Option<serde_json::Value> {
///         (name == "id").then(|| self.id.into())
///     }
/// }
///
/// let widget = EntityType::builder("shop", "Widget").field("id").build::<Widget>();
/// let keys = KeyBuilder::new("C");
/// assert_eq!(keys.key_for(&widget, &7.into()).as_str(), "C_shop.widget_7");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBuilder {
    prefix: String,
}

impl KeyBuilder {
    /// Creates a key builder using `prefix` as the first key segment.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    /// Returns the configured prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the cache key for the given type and primary key.
    #[must_use]
    pub fn key_for(&self, entity_type: &EntityType, pk: &PrimaryKey) -> CacheKey {
        CacheKey(format!(
            "{}_{}.{}_{}",
            self.prefix,
            entity_type.namespace(),
            entity_type.model_name(),
            pk
        ))
    }
}
