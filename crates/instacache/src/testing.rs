// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! An in-memory backing store for testing.
//!
//! [`MemoryStore`] holds rows as plain field maps and records every call made
//! against it, so tests can assert how many store round trips a cache operation
//! cost. [`MemoryQuery`] implements [`BackingQuery`] over it, and
//! [`MemoryStore::loader`] provides a matching [`Loader`].

use std::cmp::Ordering;
use std::fmt::{self, Debug};
use std::marker::PhantomData;
use std::ops::Range;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{BackingQuery, CachedData, Criteria, Entity, EntityRef, Error, Loader, PrimaryKey};

/// A recorded call against a [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    /// A count query.
    Count,
    /// A full primary-key enumeration.
    PrimaryKeys,
    /// A primary-key enumeration limited to a range of positions.
    PrimaryKeysIn(Range<usize>),
    /// A single-object primary-key lookup.
    GetPk,
    /// A loader call for one primary key.
    Load(PrimaryKey),
}

#[derive(Debug, Default)]
struct StoreState {
    rows: Vec<CachedData>,
    calls: Vec<StoreCall>,
}

/// Rows kept in insertion order and keyed by one primary-key field.
///
/// Clones share the same rows and call log.
///
/// # Examples
///
/// ```
/// use instacache::BackingQuery;
/// use instacache::testing::{MemoryStore, StoreCall};
/// use serde_json::json;
///
/// # futures::executor::block_on(async {
/// let store = MemoryStore::new("id");
/// store.insert(json!({"id": 1, "color": "red"}));
/// store.insert(json!({"id": 2, "color": "blue"}));
///
/// let query = store.query("Widget");
/// assert_eq!(query.count().await.unwrap(), 2);
/// assert_eq!(store.calls(), vec![StoreCall::Count]);
/// # });
/// ```
#[derive(Clone)]
pub struct MemoryStore {
    pk_field: Arc<str>,
    state: Arc<Mutex<StoreState>>,
}

impl Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryStore")
            .field("pk_field", &self.pk_field)
            .field("rows", &state.rows.len())
            .field("calls", &state.calls.len())
            .finish()
    }
}

impl MemoryStore {
    /// Creates an empty store whose rows are identified by `pk_field`.
    #[must_use]
    pub fn new(pk_field: &str) -> Self {
        Self {
            pk_field: Arc::from(pk_field),
            state: Arc::default(),
        }
    }

    /// Adds a row, replacing any row with the same primary key.
    ///
    /// # Panics
    ///
    /// Panics if `row` is not an object or has no usable primary key.
    #[expect(clippy::panic, reason = "malformed fixture rows are a test bug")]
    pub fn insert(&self, row: Value) {
        let Value::Object(row) = row else {
            panic!("rows must be JSON objects");
        };
        let Some(pk) = self.pk_of(&row) else {
            panic!("rows must carry a '{}' primary key", self.pk_field);
        };

        let mut state = self.state.lock();
        match state.rows.iter_mut().find(|existing| self.pk_of(existing).as_ref() == Some(&pk)) {
            Some(existing) => *existing = row,
            None => state.rows.push(row),
        }
    }

    /// Sets one field of an existing row; returns false if there is no such row.
    pub fn update(&self, pk: impl Into<PrimaryKey>, field: &str, value: impl Into<Value>) -> bool {
        let pk = pk.into();
        let mut state = self.state.lock();
        match state.rows.iter_mut().find(|row| self.pk_of(row).as_ref() == Some(&pk)) {
            Some(row) => {
                row.insert(field.to_owned(), value.into());
                true
            }
            None => false,
        }
    }

    /// Removes a row; returns false if there is no such row.
    pub fn remove(&self, pk: impl Into<PrimaryKey>) -> bool {
        let pk = pk.into();
        let mut state = self.state.lock();
        let before = state.rows.len();
        state.rows.retain(|row| self.pk_of(row).as_ref() != Some(&pk));
        state.rows.len() != before
    }

    /// Returns the row with the given primary key.
    #[must_use]
    pub fn row(&self, pk: &PrimaryKey) -> Option<CachedData> {
        self.state.lock().rows.iter().find(|row| self.pk_of(row).as_ref() == Some(pk)).cloned()
    }

    /// Returns every recorded call in order.
    #[must_use]
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().calls.clone()
    }

    /// Counts the recorded calls matching `predicate`.
    pub fn count_calls(&self, predicate: impl Fn(&StoreCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|call| predicate(call)).count()
    }

    /// Forgets the recorded calls.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Returns a query over all rows, yielding entities of `type_name`.
    #[must_use]
    pub fn query(&self, type_name: &str) -> MemoryQuery {
        MemoryQuery {
            store: self.clone(),
            type_name: Arc::from(type_name),
            criteria: Vec::new(),
            ordering: Vec::new(),
            empty: false,
        }
    }

    /// Returns a loader that deserializes rows into `T`.
    #[must_use]
    pub fn loader<T>(&self) -> StoreLoader<T>
    where
        T: Entity + DeserializeOwned,
    {
        StoreLoader {
            store: self.clone(),
            _entity: PhantomData,
        }
    }

    fn pk_of(&self, row: &CachedData) -> Option<PrimaryKey> {
        row.get(&*self.pk_field).and_then(PrimaryKey::from_value)
    }

    fn record(&self, call: StoreCall) {
        self.state.lock().calls.push(call);
    }
}

/// A [`Loader`] reading rows of a [`MemoryStore`].
pub struct StoreLoader<T> {
    store: MemoryStore,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Debug for StoreLoader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreLoader").field("store", &self.store).finish()
    }
}

impl<T> Loader for StoreLoader<T>
where
    T: Entity + DeserializeOwned,
{
    async fn load(&self, pk: &PrimaryKey) -> Result<Option<EntityRef>, Error> {
        self.store.record(StoreCall::Load(pk.clone()));
        let Some(row) = self.store.row(pk) else {
            return Ok(None);
        };
        let entity: T = serde_json::from_value(Value::Object(row))
            .map_err(|e| Error::serialization_caused_by(format!("cannot load row {pk}"), e))?;
        Ok(Some(Arc::new(entity)))
    }
}

/// A [`BackingQuery`] over a [`MemoryStore`].
///
/// Criteria match by JSON equality; the field `pk` means the store's primary-key
/// field. Ordering fields may carry a leading `-` for descending order. Without
/// ordering, rows come back in insertion order.
#[derive(Debug, Clone)]
pub struct MemoryQuery {
    store: MemoryStore,
    type_name: Arc<str>,
    criteria: Vec<Criteria>,
    ordering: Vec<String>,
    empty: bool,
}

impl MemoryQuery {
    /// Returns the store this query reads.
    #[must_use]
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    fn matches(&self, row: &CachedData) -> bool {
        self.criteria.iter().flat_map(Criteria::iter).all(|(field, expected)| {
            let field = if field == "pk" { &*self.store.pk_field } else { field };
            row.get(field) == Some(expected)
        })
    }

    fn compare(&self, a: &CachedData, b: &CachedData) -> Ordering {
        for field in &self.ordering {
            let (name, descending) = match field.strip_prefix('-') {
                Some(name) => (name, true),
                None => (field.as_str(), false),
            };
            let name = if name == "pk" { &*self.store.pk_field } else { name };
            let ordering = compare_values(a.get(name), b.get(name));
            let ordering = if descending { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    fn select(&self) -> Vec<PrimaryKey> {
        if self.empty {
            return Vec::new();
        }
        let state = self.store.state.lock();
        let mut rows: Vec<&CachedData> = state.rows.iter().filter(|row| self.matches(row)).collect();
        rows.sort_by(|a, b| self.compare(a, b));
        rows.into_iter().filter_map(|row| self.store.pk_of(row)).collect()
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a.as_f64().partial_cmp(&b.as_f64()).unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.to_string().cmp(&b.to_string()),
        (None, None) => Ordering::Equal,
    }
}

impl BackingQuery for MemoryQuery {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn filter(&self, criteria: &Criteria) -> Self {
        let mut query = self.clone();
        query.criteria.push(criteria.clone());
        query
    }

    fn order_by(&self, fields: &[&str]) -> Self {
        let mut query = self.clone();
        query.ordering = fields.iter().map(|&field| field.to_owned()).collect();
        query
    }

    fn none(&self) -> Self {
        let mut query = self.clone();
        query.empty = true;
        query
    }

    async fn count(&self) -> Result<usize, Error> {
        self.store.record(StoreCall::Count);
        Ok(self.select().len())
    }

    async fn primary_keys(&self) -> Result<Vec<PrimaryKey>, Error> {
        self.store.record(StoreCall::PrimaryKeys);
        Ok(self.select())
    }

    async fn primary_keys_in(&self, range: Range<usize>) -> Result<Vec<PrimaryKey>, Error> {
        self.store.record(StoreCall::PrimaryKeysIn(range.clone()));
        Ok(self.select().into_iter().skip(range.start).take(range.len()).collect())
    }

    async fn get_pk(&self, criteria: &Criteria) -> Result<PrimaryKey, Error> {
        self.store.record(StoreCall::GetPk);
        let mut found = self.filter(criteria).select();
        match found.len() {
            0 => Err(Error::not_found(format!("no {} matches the lookup", self.type_name))),
            1 => Ok(found.remove(0)),
            n => Err(Error::multiple_found(format!("{n} {} rows match the lookup", self.type_name))),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn store() -> MemoryStore {
        let store = MemoryStore::new("id");
        store.insert(json!({"id": 1, "color": "red", "size": 3}));
        store.insert(json!({"id": 2, "color": "blue", "size": 1}));
        store.insert(json!({"id": 3, "color": "red", "size": 2}));
        store
    }

    #[tokio::test]
    async fn filter_and_order() {
        let query = store().query("Widget").filter(&Criteria::new().eq("color", "red"));

        assert_eq!(query.primary_keys().await.unwrap(), vec![1.into(), 3.into()]);
        assert_eq!(query.order_by(&["size"]).primary_keys().await.unwrap(), vec![3.into(), 1.into()]);
        assert_eq!(
            store().query("Widget").order_by(&["-size"]).primary_keys().await.unwrap(),
            vec![1.into(), 3.into(), 2.into()]
        );
    }

    #[tokio::test]
    async fn ranges_past_the_end_are_truncated() {
        let query = store().query("Widget");
        assert_eq!(query.primary_keys_in(1..10).await.unwrap(), vec![2.into(), 3.into()]);
        assert!(query.primary_keys_in(5..7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_pk_outcomes() {
        let query = store().query("Widget");
        assert_eq!(query.get_pk(&Criteria::pk(2)).await.unwrap(), 2.into());
        assert!(query.get_pk(&Criteria::pk(9)).await.unwrap_err().is_not_found());
        assert_eq!(
            query.get_pk(&Criteria::new().eq("color", "red")).await.unwrap_err().kind(),
            crate::ErrorKind::MultipleFound
        );
    }

    #[tokio::test]
    async fn none_matches_nothing() {
        let query = store().query("Widget").none();
        assert_eq!(query.count().await.unwrap(), 0);
    }

    #[test]
    fn insert_replaces_update_and_remove() {
        let store = store();
        store.insert(json!({"id": 2, "color": "green"}));
        assert_eq!(store.row(&2.into()).unwrap().get("color"), Some(&json!("green")));

        assert!(store.update(2, "size", 8));
        assert!(!store.update(7, "size", 8));
        assert_eq!(store.row(&2.into()).unwrap().get("size"), Some(&json!(8)));

        assert!(store.remove(2));
        assert!(!store.remove(2));
        assert!(store.row(&2.into()).is_none());
    }

    #[tokio::test]
    async fn calls_are_recorded() {
        let store = store();
        let query = store.query("Widget");
        query.count().await.unwrap();
        query.primary_keys_in(0..1).await.unwrap();

        assert_eq!(store.calls(), vec![StoreCall::Count, StoreCall::PrimaryKeysIn(0..1)]);
        assert_eq!(store.count_calls(|call| *call == StoreCall::Count), 1);
        store.clear_calls();
        assert!(store.calls().is_empty());
    }
}
