//! Integration tests for manifest graph resolution

use cubedbt_core::DiagnosticCode;
use cubedbt_dbt::{EntityKind, GraphError, Join, Manifest, ManifestGraph, ModelFilter, Relationship};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn model_node(name: &str, path: &str, tags: &[&str], columns: Value) -> Value {
    json!({
        "unique_id": format!("model.shop.{}", name),
        "name": name,
        "resource_type": "model",
        "path": path,
        "database": "analytics",
        "schema": "public",
        "config": { "materialized": "table", "tags": tags },
        "columns": columns,
        "meta": {}
    })
}

fn relationship_test(name: &str, tags: &[&str], depends_on: &[&str], target: &str, kwargs: Value) -> Value {
    json!({
        "name": name,
        "resource_type": "test",
        "tags": tags,
        "config": { "severity": "ERROR" },
        "meta": {},
        "raw_code": "{{ test_relationships(**_dbt_generic_test_kwargs) }}",
        "depends_on": { "nodes": depends_on },
        "refs": [{ "name": target }],
        "test_metadata": { "name": "relationships", "kwargs": kwargs }
    })
}

/// Manifest with `orders`, `customers`, an ephemeral model, a seed and tests
fn shop_manifest() -> Manifest {
    let mut nodes = serde_json::Map::new();

    nodes.insert(
        "model.shop.orders".into(),
        model_node(
            "orders",
            "models/core/orders.sql",
            &["finance"],
            json!({
                "id": { "name": "id", "data_type": "integer", "meta": { "primary_key": true } },
                "customer_id": { "name": "customer_id", "data_type": "integer" }
            }),
        ),
    );
    nodes.insert(
        "model.shop.customers".into(),
        model_node(
            "customers",
            "models/core/customers.sql",
            &["crm"],
            json!({ "id": { "name": "id", "data_type": "integer", "tags": ["primary_key"] } }),
        ),
    );
    nodes.insert(
        "model.shop.stg_orders".into(),
        json!({
            "name": "stg_orders",
            "resource_type": "model",
            "path": "models/staging/stg_orders.sql",
            "config": { "materialized": "ephemeral", "tags": ["finance"] }
        }),
    );
    nodes.insert(
        "seed.shop.countries".into(),
        json!({ "name": "countries", "resource_type": "seed", "path": "countries.csv" }),
    );
    nodes.insert(
        "test.shop.relationships_orders_customer_id".into(),
        relationship_test(
            "relationships_orders_customer_id",
            &["many_to_one"],
            &["model.shop.customers", "model.shop.orders"],
            "customers",
            json!({ "column_name": "customer_id", "field": "id" }),
        ),
    );
    nodes.insert(
        "test.shop.unique_orders_id".into(),
        json!({
            "name": "unique_orders_id",
            "resource_type": "test",
            "tags": [],
            "depends_on": { "nodes": ["model.shop.orders"] },
            "refs": [{ "name": "orders" }],
            "test_metadata": { "name": "unique", "kwargs": { "column_name": "id" } }
        }),
    );
    nodes.insert(
        "test.shop.not_null_stg_orders_id".into(),
        json!({
            "name": "not_null_stg_orders_id",
            "resource_type": "test",
            "depends_on": { "nodes": ["model.shop.stg_orders"] }
        }),
    );

    Manifest::from_value(json!({ "nodes": nodes })).unwrap()
}

fn names(graph: &ManifestGraph) -> Vec<&str> {
    graph.models().iter().map(|m| m.name()).collect()
}

#[test]
fn no_filter_yields_all_non_ephemeral_models() {
    let graph = ManifestGraph::new(shop_manifest());
    assert_eq!(names(&graph), vec!["orders", "customers"]);
}

#[test]
fn filter_by_path_prefix() {
    let mut graph = ManifestGraph::new(shop_manifest());
    graph
        .filter(["models/core/cust"], Vec::<String>::new(), Vec::<String>::new())
        .unwrap();

    assert_eq!(names(&graph), vec!["customers"]);
}

#[test]
fn filter_by_tags_requires_all() {
    let mut graph = ManifestGraph::new(shop_manifest());
    graph
        .configure(ModelFilter { tags: vec!["finance".into()], ..Default::default() })
        .unwrap();
    assert_eq!(names(&graph), vec!["orders"]);

    let mut graph = ManifestGraph::new(shop_manifest());
    graph
        .configure(ModelFilter { tags: vec!["finance".into(), "crm".into()], ..Default::default() })
        .unwrap();
    assert!(graph.models().is_empty());
}

#[test]
fn filter_by_names_never_includes_ephemeral() {
    let mut graph = ManifestGraph::new(shop_manifest());
    graph
        .configure(ModelFilter {
            names: vec!["stg_orders".into(), "customers".into()],
            ..Default::default()
        })
        .unwrap();

    assert_eq!(names(&graph), vec!["customers"]);
}

#[test]
fn models_are_built_once() {
    let graph = ManifestGraph::new(shop_manifest());
    let first = graph.models();
    let second = graph.models();

    assert!(std::ptr::eq(first, second));
    assert_eq!(first.len(), second.len());
}

#[test]
fn tests_attach_to_every_in_scope_dependency() {
    let graph = ManifestGraph::new(shop_manifest());

    let orders = graph.model("orders").unwrap();
    let order_tests: Vec<&str> = orders.tests().iter().map(|t| t.name()).collect();
    assert_eq!(order_tests, vec!["relationships_orders_customer_id", "unique_orders_id"]);

    let customers = graph.model("customers").unwrap();
    let customer_tests: Vec<&str> = customers.tests().iter().map(|t| t.name()).collect();
    assert_eq!(customer_tests, vec!["relationships_orders_customer_id"]);
}

#[test]
fn tests_skip_out_of_scope_models() {
    let mut graph = ManifestGraph::new(shop_manifest());
    graph
        .configure(ModelFilter { names: vec!["customers".into()], ..Default::default() })
        .unwrap();

    let customers = graph.model("customers").unwrap();
    assert_eq!(customers.tests().len(), 1);
    assert!(matches!(
        graph.model("orders"),
        Err(GraphError::NotFound { kind: EntityKind::Model, .. })
    ));
}

#[test]
fn end_to_end_finance_scenario() {
    let mut graph = ManifestGraph::new(shop_manifest());
    graph
        .filter(Vec::<String>::new(), ["finance"], Vec::<String>::new())
        .unwrap();

    let models = graph.models();
    assert_eq!(models.len(), 1);

    let orders = &models[0];
    assert_eq!(orders.name(), "orders");
    assert_eq!(orders.primary_key().unwrap().map(|c| c.name()), Some("id"));
    assert!(orders.to_measure_list().is_empty());
    assert_eq!(
        orders.to_join_list(),
        vec![Join {
            name: "customers".to_string(),
            sql: "{CUBE}.customer_id = {customers}.id".to_string(),
            relationship: Relationship::ManyToOne,
        }]
    );
    assert!(graph.diagnostics().is_empty());
}

#[test]
fn malformed_relationship_test_is_isolated() {
    let mut nodes = serde_json::Map::new();
    nodes.insert(
        "model.shop.orders".into(),
        model_node("orders", "models/core/orders.sql", &[], json!({ "customer_id": { "name": "customer_id" } })),
    );
    nodes.insert(
        "test.shop.broken".into(),
        relationship_test(
            "relationships_orders_customer_id",
            &["one_to_one"],
            &["model.shop.orders"],
            "customers",
            json!({ "column_name": "customer_id" }),
        ),
    );
    nodes.insert(
        "test.shop.ok".into(),
        relationship_test(
            "relationships_orders_store_id",
            &["many_to_one"],
            &["model.shop.orders"],
            "stores",
            json!({ "column_name": "store_id", "field": "id" }),
        ),
    );
    let graph = ManifestGraph::new(Manifest::from_value(json!({ "nodes": nodes })).unwrap());

    let orders = graph.model("orders").unwrap();
    let joins = orders.to_join_list();
    assert_eq!(joins.len(), 1);
    assert_eq!(joins[0].name, "stores");

    assert_eq!(
        orders.join_errors(),
        vec![GraphError::MissingArgument {
            test: "relationships_orders_customer_id".to_string(),
            argument: "field".to_string(),
        }]
    );

    let diagnostics = graph.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, DiagnosticCode::JoinMissingArgument);
    assert_eq!(diagnostics[0].model.as_deref(), Some("orders"));
    assert_eq!(diagnostics[0].test.as_deref(), Some("relationships_orders_customer_id"));
}

#[test]
fn primary_key_conflict_only_affects_its_model() {
    let mut nodes = serde_json::Map::new();
    nodes.insert(
        "model.shop.orders".into(),
        model_node(
            "orders",
            "models/core/orders.sql",
            &[],
            json!({
                "id": { "name": "id", "meta": { "primary_key": true } },
                "order_key": { "name": "order_key", "meta": { "primary_key": true } }
            }),
        ),
    );
    nodes.insert(
        "model.shop.customers".into(),
        model_node("customers", "models/core/customers.sql", &[], json!({ "id": { "name": "id", "meta": { "primary_key": true } } })),
    );
    let graph = ManifestGraph::new(Manifest::from_value(json!({ "nodes": nodes })).unwrap());

    assert!(matches!(
        graph.model("orders").unwrap().primary_key(),
        Err(GraphError::InvariantViolation { .. })
    ));
    assert_eq!(
        graph.model("customers").unwrap().primary_key().unwrap().map(|c| c.name()),
        Some("id")
    );
}

#[test]
fn model_lookup_returns_first_of_duplicate_names() {
    let mut legacy = model_node("orders", "models/legacy/orders.sql", &[], json!({}));
    legacy["unique_id"] = json!("model.legacy.orders");

    let mut nodes = serde_json::Map::new();
    nodes.insert(
        "model.shop.orders".into(),
        model_node("orders", "models/core/orders.sql", &[], json!({})),
    );
    nodes.insert("model.legacy.orders".into(), legacy);
    let graph = ManifestGraph::new(Manifest::from_value(json!({ "nodes": nodes })).unwrap());

    assert_eq!(graph.models().len(), 2);
    let orders = graph.model("orders").unwrap();
    assert_eq!(orders.unique_id(), "model.shop.orders");
    assert_eq!(orders.path(), "models/core/orders.sql");
}
