use std::sync::Arc;

use serde_json::json;
use tabula_store::sdk::Client;
use tabula_store::server::{app, AppState, Registry};
use tabula_store::{Error, Record};
use tempfile::TempDir;

async fn start_gateway() -> (Client, Arc<Registry>, TempDir) {
    let registry = Arc::new(Registry::new());
    let data_dir = TempDir::new().unwrap();
    let router = app(AppState::new(registry.clone(), data_dir.path()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let client = Client::from_url(&format!("http://{addr}"));
    (client, registry, data_dir)
}

fn record(value: serde_json::Value) -> Record {
    Record::from_value(value).unwrap()
}

#[tokio::test]
async fn test_full_rest_workflow() {
    let (client, _registry, _data_dir) = start_gateway().await;

    assert!(client.collections().await.unwrap().is_empty());
    client.create_collection("users").await.unwrap();
    assert_eq!(client.collections().await.unwrap(), vec!["users"]);

    let alice = client
        .add_record("users", &record(json!({"name": "alice", "age": 30})))
        .await
        .unwrap();
    assert!(alice.id().is_some());
    client
        .add_record("users", &record(json!({"name": "bob", "age": 25})))
        .await
        .unwrap();

    let found = client
        .find_records("users", &[("name", "alice")])
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["age"], json!(30));

    // numeric query values match numeric fields
    let found = client.find_records("users", &[("age", "25")]).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["name"], json!("bob"));

    let everyone = client.find_records("users", &[]).await.unwrap();
    assert_eq!(everyone.len(), 2);

    let removed = client
        .delete_record("users", &[("name", "bob")])
        .await
        .unwrap();
    assert_eq!(removed["name"], json!("bob"));
    assert_eq!(client.find_records("users", &[]).await.unwrap().len(), 1);

    let dropped = client.delete_collection("users").await.unwrap();
    assert_eq!(dropped.len(), 1);
    assert!(client.collections().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ambiguous_delete_is_rejected_with_conflict() {
    let (client, _registry, _data_dir) = start_gateway().await;
    client.create_collection("users").await.unwrap();
    for name in ["alice", "bob"] {
        client
            .add_record("users", &record(json!({"name": name, "team": "blue"})))
            .await
            .unwrap();
    }

    let err = client
        .delete_record("users", &[("team", "blue")])
        .await
        .unwrap_err();
    match err {
        Error::Remote { status, .. } => assert_eq!(status, 409),
        other => panic!("unexpected error: {other}"),
    }
    // nothing was removed
    assert_eq!(client.find_records("users", &[]).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_update_merges_fields_and_keeps_the_id() {
    let (client, _registry, _data_dir) = start_gateway().await;
    client.create_collection("users").await.unwrap();

    let alice = client
        .add_record("users", &record(json!({"name": "alice", "age": 30})))
        .await
        .unwrap();
    let id = alice.id().unwrap().to_string();

    let updated = client
        .update_record("users", &id, &json!({"age": 31, "_id": "hijack"}))
        .await
        .unwrap();
    assert_eq!(updated.id(), Some(id.as_str()));
    assert_eq!(updated["age"], json!(31));
    assert_eq!(updated["name"], json!("alice"));

    let err = client
        .update_record("users", "missing-id", &json!({"age": 1}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Remote { status: 404, .. }));
}

#[tokio::test]
async fn test_unknown_collection_is_not_found() {
    let (client, _registry, _data_dir) = start_gateway().await;

    let err = client.find_records("ghost", &[]).await.unwrap_err();
    assert!(matches!(err, Error::Remote { status: 404, .. }));

    let err = client.delete_collection("ghost").await.unwrap_err();
    assert!(matches!(err, Error::Remote { status: 404, .. }));
}

#[tokio::test]
async fn test_persist_endpoint_snapshots_every_collection() {
    let (client, _registry, data_dir) = start_gateway().await;
    client.create_collection("users").await.unwrap();
    client
        .add_record("users", &record(json!({"name": "alice"})))
        .await
        .unwrap();

    client
        .persist(Some("snapshot"), Some("password"))
        .await
        .unwrap();

    let path = data_dir.path().join("snapshot");
    let restored = Registry::load_snapshot(&path, Some("password")).unwrap();
    assert_eq!(restored.names(), vec!["users"]);

    let users = restored.get("users").unwrap();
    let users = users.read().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["name"], json!("alice"));
}
