mod common;

use chrono::{DateTime, TimeZone, Utc};
use colmodel_core::{Adapter, AdapterError, Model, SqliteConnector, Value};
use common::{fixture_schema, options, OTHER_TIME_ID, TIME_ID};
use serde_json::json;
use std::collections::BTreeMap;
use uuid::Uuid;

async fn provisioned_adapter() -> Adapter {
    let adapter = Adapter::configure(options(), fixture_schema(), &SqliteConnector::in_memory())
        .await
        .expect("adapter should configure");
    adapter.provision().await.expect("provision should succeed");
    adapter
}

fn instant(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).unwrap()
}

fn date_map(entries: &[(&str, i64)]) -> Value {
    Value::Map(
        entries
            .iter()
            .map(|(key, millis)| (key.to_string(), Value::Date(instant(*millis))))
            .collect(),
    )
}

fn populated(adapter: &Adapter) -> Model {
    let id_a = Uuid::new_v4().to_string();
    let id_b = Uuid::new_v4().to_string();
    let mut model = Model::new(adapter.schema().clone());
    model.set_key(Uuid::new_v4().to_string()).unwrap();
    model.set("name", "test").unwrap();
    model.set("time_id", TIME_ID).unwrap();
    model.set("id_list", vec![id_a.clone(), id_b.clone()]).unwrap();
    model.set("time_id_list", vec![TIME_ID, OTHER_TIME_ID]).unwrap();
    model.set("id_set", vec![id_a.clone(), id_b.clone()]).unwrap();
    model.set("time_id_set", vec![TIME_ID, OTHER_TIME_ID]).unwrap();
    model
        .set("id_map", json!({ "first": id_a, "second": id_b }))
        .unwrap();
    model.set("time_id_map", json!({ "one": TIME_ID })).unwrap();
    model
        .set("emails_list", vec!["ceejbot@example.com", "ceejceej@example.com"])
        .unwrap();
    model.set("created", instant(1_373_414_400_123)).unwrap();
    model.set("foozles", json!(["three", 20, "blind mice"])).unwrap();
    model.set("snozzers", json!({ "qux": "fnord", "nested": [1, 2] })).unwrap();
    model
        .set("owner", json!({ "table": "owners", "id": 42, "tags": ["a"] }))
        .unwrap();
    model.set("anything", "plain text, not json").unwrap();
    model.set("is_valid", true).unwrap();
    model.set("count", 3).unwrap();
    model.set("floating", 12.375).unwrap();
    model.set("primes", vec![3, 5, 7, 11]).unwrap();
    model.set("pet_types", vec!["dog", "cat", "bird"]).unwrap();
    model
        .set(
            "expiries",
            vec![instant(1_400_000_000_000), instant(1_300_000_000_000)],
        )
        .unwrap();
    model
        .set(
            "timestamps",
            vec![instant(1_300_000_000_000), instant(1_200_000_000_000)],
        )
        .unwrap();
    model.set("scores", vec![2.5, -1.0, 2.5]).unwrap();
    model.set("checks", vec![true, false, true]).unwrap();
    model.set("vaccinated", json!({ "dog": true, "cat": false })).unwrap();
    model
        .set("birthdays", date_map(&[("dog", 1_000_000_000_000)]))
        .unwrap();
    model.set("pet_names", json!({ "dog": "Rex", "cat": "Tom" })).unwrap();
    model.set("pet_counts", json!({ "dog": 2, "cat": 1 })).unwrap();
    model
}

fn sorted(value: &Value) -> Vec<Value> {
    let mut items = value.as_list().expect("sequence").to_vec();
    items.sort_by(|left, right| format!("{left:?}").cmp(&format!("{right:?}")));
    items
}

#[tokio::test]
async fn configure_attaches_failure_observer_to_owned_transport() {
    let adapter = Adapter::configure(options(), fixture_schema(), &SqliteConnector::in_memory())
        .await
        .unwrap();
    assert!(adapter.transport().has_failure_observer());
    assert_eq!(adapter.keyspace(), common::KEYSPACE);
}

#[tokio::test]
async fn provision_is_idempotent() {
    let adapter = provisioned_adapter().await;
    adapter
        .provision()
        .await
        .expect("second provision should swallow already-exists failures");
    assert!(adapter.all().await.unwrap().models.is_empty());
}

#[tokio::test]
async fn saved_instance_reads_back_with_every_type_intact() {
    let adapter = provisioned_adapter().await;
    let mut model = populated(&adapter);
    adapter.save(&mut model).await.expect("save should succeed");
    assert!(!model.is_dirty());

    let key = model.key().unwrap();
    let loaded = adapter.get(&key).await.unwrap().expect("row should exist");
    assert!(!loaded.is_dirty());

    for field in [
        "id",
        "name",
        "time_id",
        "id_list",
        "time_id_list",
        "id_map",
        "time_id_map",
        "emails_list",
        "created",
        "foozles",
        "snozzers",
        "owner",
        "anything",
        "is_valid",
        "count",
        "floating",
        "timestamps",
        "scores",
        "checks",
        "vaccinated",
        "birthdays",
        "pet_names",
        "pet_counts",
    ] {
        assert_eq!(loaded.get(field), model.get(field), "field {field} changed");
    }
    for field in ["id_set", "time_id_set", "primes", "pet_types", "expiries"] {
        assert_eq!(
            sorted(loaded.get(field).unwrap()),
            sorted(model.get(field).unwrap()),
            "set {field} changed"
        );
    }
    assert!(loaded.is_valid());
}

#[tokio::test]
async fn empty_sets_and_maps_read_back_as_empty_containers() {
    let adapter = provisioned_adapter().await;
    let mut model = Model::new(adapter.schema().clone());
    model.set_key(Uuid::new_v4().to_string()).unwrap();
    model.set("pet_types", Vec::<Value>::new()).unwrap();
    model.set("pet_names", Value::Map(BTreeMap::new())).unwrap();
    adapter.save(&mut model).await.unwrap();

    let loaded = adapter.get(&model.key().unwrap()).await.unwrap().unwrap();
    assert_eq!(loaded.get("pet_types"), Some(&Value::List(Vec::new())));
    assert_eq!(loaded.get("expiries"), Some(&Value::List(Vec::new())));
    assert_eq!(loaded.get("timestamps"), Some(&Value::List(Vec::new())));
    assert_eq!(loaded.get("pet_names"), Some(&Value::Map(BTreeMap::new())));
    assert_eq!(loaded.get("birthdays"), Some(&Value::Map(BTreeMap::new())));
}

#[tokio::test]
async fn emptied_collections_clear_on_resave() {
    let adapter = provisioned_adapter().await;
    let mut model = populated(&adapter);
    adapter.save(&mut model).await.unwrap();
    assert!(model.is_persisted());

    model.set("pet_types", Vec::<Value>::new()).unwrap();
    model.set("pet_names", Value::Map(BTreeMap::new())).unwrap();
    adapter.save(&mut model).await.unwrap();

    let key = model.key().unwrap();
    let loaded = adapter.get(&key).await.unwrap().unwrap();
    assert_eq!(loaded.get("pet_types"), Some(&Value::List(Vec::new())));
    assert_eq!(loaded.get("pet_names"), Some(&Value::Map(BTreeMap::new())));
    assert_eq!(loaded.get("name"), Some(&Value::from("test")));

    let mut reloaded = loaded;
    reloaded.set("primes", Vec::<Value>::new()).unwrap();
    adapter.save(&mut reloaded).await.unwrap();
    let again = adapter.get(&key).await.unwrap().unwrap();
    assert_eq!(again.get("primes"), Some(&Value::List(Vec::new())));
}

#[tokio::test]
async fn date_forms_round_trip_to_the_same_instant() {
    let adapter = provisioned_adapter().await;
    let expected = Value::Date(instant(1_373_414_400_000));
    let inputs = [
        Value::Date(instant(1_373_414_400_000)),
        Value::Number(1_373_414_400_000.0),
        Value::from("2013-07-10T00:00:00.000Z"),
    ];

    for input in inputs {
        let mut model = Model::new(adapter.schema().clone());
        model.set_key(Uuid::new_v4().to_string()).unwrap();
        model.set("created", input).unwrap();
        adapter.save(&mut model).await.unwrap();

        let loaded = adapter.get(&model.key().unwrap()).await.unwrap().unwrap();
        assert_eq!(loaded.get("created"), Some(&expected));
    }
}

#[tokio::test]
async fn missing_rows_are_not_errors() {
    let adapter = provisioned_adapter().await;
    let missing = adapter.get(&Uuid::new_v4().to_string()).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn merge_updates_only_named_properties() {
    let adapter = provisioned_adapter().await;
    let mut model = populated(&adapter);
    adapter.save(&mut model).await.unwrap();
    let key = model.key().unwrap();

    adapter
        .merge(
            &key,
            vec![
                ("is_valid", Value::from(false)),
                ("count", Value::from(1023)),
                ("pet_types", Value::List(Vec::new())),
            ],
        )
        .await
        .expect("merge should succeed");

    let loaded = adapter.get(&key).await.unwrap().unwrap();
    assert_eq!(loaded.get("is_valid"), Some(&Value::Bool(false)));
    assert_eq!(loaded.get("count"), Some(&Value::Number(1023.0)));
    assert_eq!(loaded.get("pet_types"), Some(&Value::List(Vec::new())));
    assert_eq!(loaded.get("name"), Some(&Value::from("test")));
}

#[tokio::test]
async fn merge_rejects_invalid_values() {
    let adapter = provisioned_adapter().await;
    let err = adapter
        .merge("irrelevant", vec![("count", Value::from("many"))])
        .await
        .unwrap_err();
    assert!(err.is_caller_error());
}

#[tokio::test]
async fn batch_reads_and_full_listing() {
    let adapter = provisioned_adapter().await;
    let mut first = populated(&adapter);
    let mut second = populated(&adapter);
    adapter.save(&mut first).await.unwrap();
    adapter.save(&mut second).await.unwrap();

    let keys = vec![first.key().unwrap(), second.key().unwrap()];
    let batch = adapter.get_batch(keys.as_slice()).await.unwrap();
    assert_eq!(batch.len(), 2);

    let listing = adapter.all().await.unwrap();
    assert!(listing.fully_materialized);
    assert_eq!(listing.models.len(), 2);
}

#[tokio::test]
async fn removed_instances_are_gone_and_reject_a_second_removal() {
    let adapter = provisioned_adapter().await;
    let mut model = populated(&adapter);
    adapter.save(&mut model).await.unwrap();
    let key = model.key().unwrap();

    adapter.remove(&mut model).await.expect("remove should succeed");
    assert!(model.is_destroyed());
    assert!(adapter.get(&key).await.unwrap().is_none());

    let err = adapter.remove(&mut model).await.unwrap_err();
    assert!(matches!(err, AdapterError::AlreadyDestroyed));
    assert_eq!(err.to_string(), "object already destroyed");
}

#[tokio::test]
async fn destroy_many_deletes_every_listed_instance() {
    let adapter = provisioned_adapter().await;
    let mut models = vec![populated(&adapter), populated(&adapter)];
    for model in models.iter_mut() {
        adapter.save(model).await.unwrap();
    }
    let mut survivor = populated(&adapter);
    adapter.save(&mut survivor).await.unwrap();

    adapter
        .destroy_many(Some(models.as_mut_slice()))
        .await
        .expect("destroy_many should succeed");

    assert!(models.iter().all(Model::is_destroyed));
    let remaining = adapter.all().await.unwrap().models;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].key(), survivor.key());
}

#[tokio::test]
async fn file_backed_store_survives_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let connector = SqliteConnector::file(dir.path().join("models.db"));

    let adapter = Adapter::configure(options(), fixture_schema(), &connector)
        .await
        .unwrap();
    adapter.provision().await.unwrap();
    let mut model = populated(&adapter);
    adapter.save(&mut model).await.unwrap();
    adapter.shutdown().await.unwrap();
    drop(adapter);

    let reopened = Adapter::configure(options(), fixture_schema(), &connector)
        .await
        .unwrap();
    reopened.provision().await.unwrap();
    let loaded = reopened.get(&model.key().unwrap()).await.unwrap();
    assert_eq!(loaded.and_then(|found| found.get("name").cloned()), Some(Value::from("test")));
}
