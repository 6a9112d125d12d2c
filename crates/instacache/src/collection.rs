// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A lazy collection view that resolves members through the instance cache.

use std::ops::Range;

use serde_json::Value;
use tokio::sync::OnceCell;

use crate::{CachedData, CachedEntity, Error, InstanceCache, ObjectSpec, PrimaryKey};

/// Equality lookups used to filter a backing-store query.
///
/// ```
/// use instacache::Criteria;
///
/// let criteria = Criteria::new().eq("color", "red").eq("size", 3);
/// assert_eq!(criteria.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
    lookups: Vec<(String, Value)>,
}

impl Criteria {
    /// Creates empty criteria, matching everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Criteria matching a single primary key.
    #[must_use]
    pub fn pk(pk: impl Into<PrimaryKey>) -> Self {
        Self::new().eq("pk", pk.into().to_value())
    }

    /// Adds a `field == value` lookup.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.lookups.push((field.into(), value.into()));
        self
    }

    /// Iterates over the `(field, value)` lookups in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.lookups.iter().map(|(field, value)| (field.as_str(), value))
    }

    /// Returns the number of lookups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lookups.len()
    }

    /// Returns true if there are no lookups.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lookups.is_empty()
    }
}

/// A query against the backing object store.
///
/// Transformations return new queries; the asynchronous methods each cost one
/// round trip to the store. Implementations decide what a field name means and
/// how ordering is expressed (a leading `-` conventionally means descending).
pub trait BackingQuery: Clone + Send + Sync {
    /// Returns the type name of the entities this query yields.
    fn type_name(&self) -> &str;

    /// Narrows the query to entities matching `criteria`.
    #[must_use]
    fn filter(&self, criteria: &Criteria) -> Self;

    /// Orders the query by `fields`.
    #[must_use]
    fn order_by(&self, fields: &[&str]) -> Self;

    /// Returns a query that matches nothing.
    #[must_use]
    fn none(&self) -> Self;

    /// Counts the matching entities.
    fn count(&self) -> impl Future<Output = Result<usize, Error>> + Send;

    /// Returns the primary keys of all matching entities, in query order.
    fn primary_keys(&self) -> impl Future<Output = Result<Vec<PrimaryKey>, Error>> + Send;

    /// Returns the primary keys at positions `range` of the query order.
    ///
    /// Ranges past the end yield fewer keys, never an error.
    fn primary_keys_in(&self, range: Range<usize>) -> impl Future<Output = Result<Vec<PrimaryKey>, Error>> + Send;

    /// Returns the primary key of the single entity matching `criteria`.
    ///
    /// Fails with `NotFound` if nothing matches and `MultipleFound` if several do.
    fn get_pk(&self, criteria: &Criteria) -> impl Future<Output = Result<PrimaryKey, Error>> + Send;
}

/// A lazy, filterable and sliceable view over a backing-store query whose
/// members are read from the instance cache.
///
/// Primary keys are resolved at most once per collection and then memoized.
/// `filter`, `order_by`, `slice` and friends never touch that memo; they return
/// fresh collections, so one collection can be shared by concurrent readers.
///
/// Iterating with [`entities`](Self::entities) costs one key resolution and one
/// batched cache read, however many members there are.
#[derive(Debug)]
pub struct CachedCollection<Q> {
    cache: InstanceCache,
    query: Q,
    primary_keys: OnceCell<Vec<PrimaryKey>>,
    partial: bool,
}

impl<Q: Clone> Clone for CachedCollection<Q> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            query: self.query.clone(),
            primary_keys: OnceCell::new_with(self.primary_keys.get().cloned()),
            partial: self.partial,
        }
    }
}

impl<Q: BackingQuery> CachedCollection<Q> {
    /// Wraps `query`; no store or cache access happens until data is needed.
    pub fn new(cache: InstanceCache, query: Q) -> Self {
        Self {
            cache,
            query,
            primary_keys: OnceCell::new(),
            partial: false,
        }
    }

    fn with_keys(&self, query: Q, primary_keys: Vec<PrimaryKey>, partial: bool) -> Self {
        Self {
            cache: self.cache.clone(),
            query,
            primary_keys: OnceCell::new_with(Some(primary_keys)),
            partial,
        }
    }

    /// Returns the wrapped query.
    pub fn query(&self) -> &Q {
        &self.query
    }

    /// Returns the cache members are read from.
    pub fn cache(&self) -> &InstanceCache {
        &self.cache
    }

    /// Returns true if this collection holds a slice of its query's keys.
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    /// Returns the memoized primary keys, if they were resolved already.
    pub fn resolved_primary_keys(&self) -> Option<&[PrimaryKey]> {
        self.primary_keys.get().map(Vec::as_slice)
    }

    /// Returns the member primary keys, resolving them from the store on first use.
    ///
    /// # Errors
    ///
    /// Fails if the store query fails.
    pub async fn primary_keys(&self) -> Result<&[PrimaryKey], Error> {
        self.primary_keys
            .get_or_try_init(|| self.query.primary_keys())
            .await
            .map(Vec::as_slice)
    }

    /// Returns a collection over the entities matching `criteria`.
    #[must_use]
    pub fn filter(&self, criteria: &Criteria) -> Self {
        Self::new(self.cache.clone(), self.query.filter(criteria))
    }

    /// Returns a collection ordered by `fields`.
    #[must_use]
    pub fn order_by(&self, fields: &[&str]) -> Self {
        Self::new(self.cache.clone(), self.query.order_by(fields))
    }

    /// Returns an equivalent collection.
    #[must_use]
    pub fn all(&self) -> Self {
        self.clone()
    }

    /// Returns an empty collection.
    #[must_use]
    pub fn none(&self) -> Self {
        self.with_keys(self.query.none(), Vec::new(), false)
    }

    /// Counts the members.
    ///
    /// Uses the memoized keys when present and asks the store otherwise.
    ///
    /// # Errors
    ///
    /// Fails if the store query fails.
    pub async fn count(&self) -> Result<usize, Error> {
        match self.primary_keys.get() {
            Some(keys) => Ok(keys.len()),
            None => self.query.count().await,
        }
    }

    /// Same as [`count`](Self::count).
    ///
    /// # Errors
    ///
    /// Fails if the store query fails.
    pub async fn len(&self) -> Result<usize, Error> {
        self.count().await
    }

    /// Returns true if the collection has no members.
    ///
    /// # Errors
    ///
    /// Fails if the store query fails.
    pub async fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.count().await? == 0)
    }

    /// Returns the single member matching `criteria`, read through the cache.
    ///
    /// # Errors
    ///
    /// Fails with `NotFound` if no entity matches or the matched entity vanished
    /// before its data could be loaded, and with `MultipleFound` if several match.
    pub async fn get(&self, criteria: &Criteria) -> Result<CachedEntity, Error> {
        let pk = self.query.get_pk(criteria).await?;
        let type_name = self.query.type_name();
        let entity_type = self.cache.resolve(type_name)?;
        let spec = ObjectSpec::new(type_name, pk);

        let mut found = self.cache.get_instances([spec.clone()]).await?;
        match found.remove(&spec) {
            Some(instance) => {
                let (data, _, entity) = instance.into_parts();
                Ok(CachedEntity::with_entity(entity_type, data, entity))
            }
            None => Err(Error::not_found(format!("{} {} does not exist", entity_type.label(), spec.pk()))),
        }
    }

    /// Returns every member in key order, read with one batched cache call.
    ///
    /// Members deleted between key resolution and the cache read come back with
    /// empty data rather than failing the whole read.
    ///
    /// # Errors
    ///
    /// Fails if key resolution, type resolution or the cache read fails.
    pub async fn entities(&self) -> Result<Vec<CachedEntity>, Error> {
        let primary_keys = self.primary_keys().await?;
        let type_name = self.query.type_name();
        let entity_type = self.cache.resolve(type_name)?;

        let specs: Vec<ObjectSpec> = primary_keys.iter().map(|pk| ObjectSpec::new(type_name, pk.clone())).collect();
        let mut found = self.cache.get_instances(specs.iter().cloned()).await?;

        Ok(specs
            .iter()
            .map(|spec| {
                let (data, entity) = match found.remove(spec) {
                    Some(instance) => {
                        let (data, _, entity) = instance.into_parts();
                        (data, entity)
                    }
                    None => (CachedData::new(), None),
                };
                CachedEntity::with_entity(std::sync::Arc::clone(&entity_type), data, entity)
            })
            .collect())
    }

    /// Returns the members at positions `range`.
    ///
    /// With memoized keys the slice is taken in memory; otherwise only the keys
    /// in `range` are fetched from the store. The result is a partial collection.
    ///
    /// # Errors
    ///
    /// Fails if the store query fails.
    pub async fn slice(&self, range: Range<usize>) -> Result<Self, Error> {
        let keys = match self.primary_keys.get() {
            Some(keys) => {
                let end = range.end.min(keys.len());
                let start = range.start.min(end);
                keys[start..end].to_vec()
            }
            None => self.query.primary_keys_in(range).await?,
        };
        Ok(self.with_keys(self.query.clone(), keys, true))
    }

    /// Returns the member at position `index` as a one-element collection.
    ///
    /// # Errors
    ///
    /// Fails with `IndexOutOfRange` if there is no such member.
    pub async fn nth(&self, index: usize) -> Result<Self, Error> {
        let single = self.slice(index..index.saturating_add(1)).await?;
        if single.resolved_primary_keys().is_none_or(<[PrimaryKey]>::is_empty) {
            return Err(Error::index_out_of_range(index));
        }
        Ok(single)
    }

    /// Returns the member at position `index`, read through the cache.
    ///
    /// # Errors
    ///
    /// Fails with `IndexOutOfRange` if there is no such member.
    pub async fn entity_at(&self, index: usize) -> Result<CachedEntity, Error> {
        self.nth(index)
            .await?
            .entities()
            .await?
            .pop()
            .ok_or_else(|| Error::index_out_of_range(index))
    }
}
