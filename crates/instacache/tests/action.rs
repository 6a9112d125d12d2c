// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for routing actions between cached and direct reads.

mod common;

use common::{Shop, key};
use instacache::testing::StoreCall;
use instacache::{Action, Criteria, ErrorKind, Object, Queryset};
use serde_json::json;

#[test]
fn reads_are_routed_through_the_cache() {
    let shop = Shop::new();

    assert!(Queryset::for_action(Action::List, &shop.cache, shop.widget_query()).is_cached());
    assert!(Queryset::for_action(Action::Retrieve, &shop.cache, shop.widget_query()).is_cached());
    assert!(!Queryset::for_action(Action::PartialUpdate, &shop.cache, shop.widget_query()).is_cached());
    assert!(!Queryset::for_action(Action::Destroy, &shop.cache, shop.widget_query()).is_cached());
}

#[tokio::test]
async fn retrieve_returns_a_cached_object() {
    let shop = Shop::new();
    let queryset = Queryset::for_action(Action::Retrieve, &shop.cache, shop.widget_query());

    let object = queryset.get_object(&shop.cache, &Criteria::pk(2)).await.unwrap();

    assert!(matches!(object, Object::Cached(_)));
    assert_eq!(object.get("name").unwrap(), json!("Nut"));
    assert_eq!(object.get("label").unwrap(), json!("Nut (blue)"));
    assert!(shop.backend.contains_key(&key("shop.widget", 2)));
}

#[tokio::test]
async fn updates_read_the_live_entity() {
    let shop = Shop::new();
    let queryset = Queryset::for_action(Action::Update, &shop.cache, shop.widget_query());

    let object = queryset.get_object(&shop.cache, &Criteria::new().eq("name", "Screw")).await.unwrap();

    assert!(matches!(object, Object::Direct { .. }));
    assert_eq!(object.get("pk").unwrap(), json!(3));
    assert_eq!(object.get("order").unwrap(), json!(43));
    assert_eq!(object.get("label").unwrap_err().kind(), ErrorKind::AttributeNotFound);
    assert!(shop.backend.operations().is_empty());
    assert_eq!(shop.widgets.count_calls(|call| matches!(call, StoreCall::Load(_))), 1);
}

#[tokio::test]
async fn missing_objects_are_not_found_on_both_paths() {
    let shop = Shop::new();

    for action in [Action::Retrieve, Action::Destroy] {
        let queryset = Queryset::for_action(action, &shop.cache, shop.widget_query());
        let error = queryset.get_object(&shop.cache, &Criteria::pk(99)).await.unwrap_err();
        assert!(error.is_not_found(), "{action:?}: {error}");
    }
}

#[tokio::test]
async fn ambiguous_lookups_fail_on_both_paths() {
    let shop = Shop::new();
    let red = Criteria::new().eq("color", "red");

    for action in [Action::List, Action::Create] {
        let queryset = Queryset::for_action(action, &shop.cache, shop.widget_query());
        let error = queryset.get_object(&shop.cache, &red).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::MultipleFound, "{action:?}");
    }
}
