use chrono::{TimeZone, Utc};
use colmodel_core::types::{column_type_for, TypeError, TypeRegistry};
use colmodel_core::{LogicalType, Model, Schema, Value};
use serde_json::json;
use std::sync::Arc;

const V1: &str = "d2177dd0-eaa2-11de-a572-001b779c76e3";
const V4: &str = "3f2504e0-4f89-41d3-9a0c-0305e82c3301";

fn logical(name: &str) -> LogicalType {
    TypeRegistry::with_builtins()
        .resolve(name)
        .unwrap_or_else(|err| panic!("{name} should resolve: {err}"))
}

#[test]
fn builtins_cover_scalars_collections_and_blobs() {
    let registry = TypeRegistry::with_builtins();
    for name in ["string", "number", "boolean", "date", "uuid", "timeuuid"] {
        assert!(registry.contains(name), "{name}");
        assert!(registry.contains(&format!("list:{name}")), "list:{name}");
        assert!(registry.contains(&format!("map:{name}")), "map:{name}");
    }
    for name in ["set:string", "set:number", "set:date", "set:uuid", "set:timeuuid"] {
        assert!(registry.contains(name), "{name}");
    }
    for name in ["array", "hash", "reference", "untyped"] {
        assert!(registry.contains(name), "{name}");
    }
    assert!(!registry.contains("set:boolean"));
    assert_eq!(registry.len(), 27);
}

#[test]
fn custom_types_register_once() {
    let mut registry = TypeRegistry::with_builtins();
    let email = registry
        .register(
            "email",
            || Value::from(""),
            |value| value.as_str().is_some_and(|text| text.contains('@')),
        )
        .expect("custom type registers");
    assert_eq!(email.name(), "email");
    assert!(registry.validate(&email, &Value::from("a@b.c")));
    assert!(!registry.validate(&email, &Value::from("nope")));
    assert_eq!(column_type_for(&email).to_string(), "text");

    let duplicate = registry.register("email", || Value::Null, |_| true);
    assert_eq!(duplicate, Err(TypeError::DuplicateType("email".to_string())));
    assert!(matches!(
        registry.register("Bad Name", || Value::Null, |_| true),
        Err(TypeError::InvalidTypeName(_))
    ));
}

#[test]
fn isolated_registries_do_not_leak_types() {
    let mut first = TypeRegistry::with_builtins();
    let second = TypeRegistry::with_builtins();
    first.register("money", || Value::from(0), |_| true).unwrap();
    assert!(first.contains("money"));
    assert!(!second.contains("money"));
}

#[test]
fn uuid_validators_follow_version_rules() {
    let registry = TypeRegistry::with_builtins();
    let uuid = logical("uuid");
    let timeuuid = logical("timeuuid");

    assert!(registry.validate(&uuid, &Value::from(V1)));
    assert!(registry.validate(&uuid, &Value::from(V4)));
    assert!(registry.validate(&uuid, &Value::from(V4.to_uppercase())));
    assert!(registry.validate(&uuid, &Value::Null));
    assert!(!registry.validate(&uuid, &Value::from("3f2504e0-4f89-51d3-9a0c-0305e82c3301")));

    assert!(registry.validate(&timeuuid, &Value::from(V1)));
    assert!(registry.validate(&timeuuid, &Value::Null));
    assert!(!registry.validate(&timeuuid, &Value::from(V4)));
}

#[test]
fn set_validator_rejects_duplicates() {
    let registry = TypeRegistry::with_builtins();
    let pets = logical("set:string");
    assert!(!registry.validate(&pets, &Value::from(vec!["cat", "dog", "cat"])));
    assert!(registry.validate(&pets, &Value::from(vec!["cat", "dog"])));
    assert!(registry.validate(&pets, &Value::Null));
    assert!(!registry.validate(&pets, &Value::from(vec![Value::from(1)])));
}

#[test]
fn map_validator_checks_values_not_keys() {
    let registry = TypeRegistry::with_builtins();
    let counts = logical("map:number");
    assert!(registry.validate(&counts, &Value::from(json!({ "1": 2, "dog": 3 }))));
    assert!(!registry.validate(&counts, &Value::from(json!({ "dog": "three" }))));
    assert!(registry.validate(&counts, &Value::Null));
}

#[test]
fn date_validator_accepts_every_date_form() {
    let registry = TypeRegistry::with_builtins();
    let date = logical("date");
    let instant = Utc.with_ymd_and_hms(2013, 7, 10, 0, 0, 0).unwrap();

    assert!(registry.validate(&date, &Value::Date(instant)));
    assert!(registry.validate(&date, &Value::Number(1_373_414_400_000.0)));
    assert!(registry.validate(&date, &Value::from("2013-07-10T00:00:00Z")));
    assert!(!registry.validate(&date, &Value::from("Invalid Date")));
    assert!(!registry.validate(&date, &Value::Bool(true)));
}

#[test]
fn column_mapping_table() {
    let cases = [
        ("string", "text"),
        ("number", "double"),
        ("boolean", "boolean"),
        ("date", "timestamp"),
        ("uuid", "uuid"),
        ("timeuuid", "timeuuid"),
        ("list:string", "list<text>"),
        ("list:boolean", "list<boolean>"),
        ("list:date", "list<timestamp>"),
        ("set:uuid", "set<uuid>"),
        ("set:timeuuid", "set<timeuuid>"),
        ("map:number", "map<text, double>"),
        ("map:date", "map<text, timestamp>"),
        ("array", "text"),
        ("hash", "text"),
        ("reference", "text"),
        ("untyped", "text"),
    ];
    for (logical_name, column) in cases {
        assert_eq!(
            column_type_for(&logical(logical_name)).to_string(),
            column,
            "{logical_name}"
        );
    }
}

#[test]
fn instance_defaults_come_from_fresh_default_functions() {
    let registry = Arc::new(TypeRegistry::with_builtins());
    let schema = Schema::builder(registry, "pet", "pets")
        .property("id", "uuid")
        .property("toys", "array")
        .property("owner", "reference")
        .property("flags", "list:boolean")
        .property("anything", "untyped")
        .build()
        .unwrap();

    let model = Model::new(schema);
    assert_eq!(model.get("toys"), Some(&Value::List(Vec::new())));
    assert_eq!(model.get("owner"), Some(&Value::from(json!({}))));
    assert_eq!(model.get("flags"), Some(&Value::List(Vec::new())));
    assert_eq!(model.get("anything"), Some(&Value::Null));
    assert!(model.is_valid());
}
