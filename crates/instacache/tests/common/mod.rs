// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(dead_code, reason = "This is a test module")]

//! A small shop domain shared by the integration tests.
//!
//! Widgets belong to orders, orders belong to customers, and customers list
//! their orders, so invalidation can travel Widget -> Order -> Customer -> Order.

use instacache::testing::{MemoryQuery, MemoryStore};
use instacache::{
    CacheKey, CachedData, Entity, EntityType, InstanceCache, InstanceCacheBuilder, InvalidateFn, InvalidationTarget, MockBackend,
    PrimaryKey, SerializeFn, Strategies,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tick::Clock;

pub type Backend = MockBackend<CacheKey, CachedData>;

pub const PREFIX: &str = "T";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Widget {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub order_id: Option<i64>,
}

impl Entity for Widget {
    fn pk(&self) -> PrimaryKey {
        self.id.into()
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "order" => self.order_id.map(Value::from),
            _ => instacache::serde_attribute(self, name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub customer_id: Option<i64>,
}

impl Entity for Order {
    fn pk(&self) -> PrimaryKey {
        self.id.into()
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        instacache::serde_attribute(self, name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub order_ids: Vec<i64>,
}

impl Entity for Customer {
    fn pk(&self) -> PrimaryKey {
        self.id.into()
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        instacache::serde_attribute(self, name)
    }
}

pub fn widget_type() -> EntityType {
    EntityType::builder("shop", "Widget")
        .field("id")
        .field("name")
        .field("color")
        .reference("order")
        .build::<Widget>()
}

pub fn order_type() -> EntityType {
    EntityType::builder("shop", "Order").field("id").field("total").build::<Order>()
}

pub fn customer_type() -> EntityType {
    EntityType::builder("crm", "Customer").field("id").field("name").build::<Customer>()
}

/// Widgets cache their reference under `order` and a denormalized `label`.
pub fn serialize_widget(widget: &Widget) -> CachedData {
    let data = json!({
        "id": widget.id,
        "name": widget.name,
        "color": widget.color,
        "order": widget.order_id,
        "label": format!("{} ({})", widget.name, widget.color),
    });
    data.as_object().cloned().unwrap_or_default()
}

pub fn widget_strategies(store: &MemoryStore) -> Strategies {
    Strategies::new(store.loader::<Widget>(), SerializeFn::<_, Widget>::new(serialize_widget)).with_invalidator(
        InvalidateFn::<_, Widget>::new(|w: &Widget| {
            w.order_id
                .map(|order| InvalidationTarget::dependent("Order", order, false))
                .into_iter()
                .collect()
        }),
    )
}

pub fn order_strategies(store: &MemoryStore) -> Strategies {
    Strategies::serde::<Order>(store.loader::<Order>()).with_invalidator(InvalidateFn::<_, Order>::new(|o: &Order| {
        o.customer_id
            .map(|customer| InvalidationTarget::dependent("crm.Customer", customer, true))
            .into_iter()
            .collect()
    }))
}

pub fn customer_strategies(store: &MemoryStore) -> Strategies {
    Strategies::serde::<Customer>(store.loader::<Customer>()).with_invalidator(InvalidateFn::<_, Customer>::new(|c: &Customer| {
        let mut targets: Vec<_> = c
            .order_ids
            .iter()
            .map(|&order| InvalidationTarget::dependent("Order", order, false))
            .collect();
        targets.push(InvalidationTarget::key(format!("{PREFIX}_report.customers")));
        targets
    }))
}

pub fn key(model: &str, pk: i64) -> CacheKey {
    CacheKey::new(format!("{PREFIX}_{model}_{pk}"))
}

pub fn data(value: Value) -> CachedData {
    value.as_object().cloned().unwrap_or_default()
}

#[derive(Debug)]
pub struct Shop {
    pub widgets: MemoryStore,
    pub orders: MemoryStore,
    pub customers: MemoryStore,
    pub backend: Backend,
    pub cache: InstanceCache,
}

impl Shop {
    pub fn new() -> Self {
        Self::with(|builder| builder)
    }

    pub fn with(configure: impl FnOnce(InstanceCacheBuilder<Backend>) -> InstanceCacheBuilder<Backend>) -> Self {
        Self::with_backend(MockBackend::new(), configure)
    }

    pub fn with_backend(
        backend: Backend,
        configure: impl FnOnce(InstanceCacheBuilder<Backend>) -> InstanceCacheBuilder<Backend>,
    ) -> Self {
        let widgets = MemoryStore::new("id");
        widgets.insert(json!({"id": 1, "name": "Bolt", "color": "red", "order_id": 42}));
        widgets.insert(json!({"id": 2, "name": "Nut", "color": "blue", "order_id": 42}));
        widgets.insert(json!({"id": 3, "name": "Screw", "color": "red", "order_id": 43}));
        widgets.insert(json!({"id": 4, "name": "Washer", "color": "green"}));

        let orders = MemoryStore::new("id");
        orders.insert(json!({"id": 42, "total": 10, "customer_id": 7}));
        orders.insert(json!({"id": 43, "total": 5, "customer_id": 7}));

        let customers = MemoryStore::new("id");
        customers.insert(json!({"id": 7, "name": "Ada", "order_ids": [42, 43]}));

        let builder = InstanceCache::builder(backend.clone(), Clock::new_frozen())
            .key_prefix(PREFIX)
            .register(widget_type(), widget_strategies(&widgets))
            .register(order_type(), order_strategies(&orders))
            .register(customer_type(), customer_strategies(&customers));
        let cache = configure(builder).build().unwrap();

        Self {
            widgets,
            orders,
            customers,
            backend,
            cache,
        }
    }

    pub fn widget_query(&self) -> MemoryQuery {
        self.widgets.query("Widget")
    }
}
