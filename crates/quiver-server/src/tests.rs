use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use quiver_rpc::Handler;

use crate::config::GlobalConfig;
use crate::service;
use crate::state::{AppState, ServiceState};

fn test_state() -> (Arc<AppState>, ServiceState, Handler<ServiceState>) {
    let app = Arc::new(AppState::new(GlobalConfig {
        repack_percent: 10,
        audio_buf_size: 2 * 1024 * 1024,
    }));
    let session = app.session();
    (app, session, service::handler())
}

async fn call(
    handler: &Handler<ServiceState>,
    state: &ServiceState,
    request: Value,
) -> Option<Value> {
    let bytes = serde_json::to_vec(&request).unwrap();
    handler
        .handle(state.clone(), &bytes)
        .await
        .map(|bytes| serde_json::from_slice(&bytes).unwrap())
}

fn result(response: Option<Value>) -> Value {
    let response = response.expect("expected a response");
    assert!(
        response.get("error").is_none(),
        "unexpected error: {response}"
    );
    response["result"].clone()
}

fn error(response: Option<Value>) -> Value {
    let response = response.expect("expected a response");
    response["error"].clone()
}

async fn create_database(
    handler: &Handler<ServiceState>,
    state: &ServiceState,
    id: &str,
    vector_length: usize,
) {
    result(
        call(
            handler,
            state,
            json!({
                "jsonrpc": "2.0",
                "method": "createDatabase",
                "params": {"database_id": id, "vector_length": vector_length},
                "id": 1,
            }),
        )
        .await,
    );
}

#[tokio::test]
async fn create_add_search() {
    let (_, state, handler) = test_state();

    create_database(&handler, &state, "d", 3).await;

    let added = result(
        call(
            &handler,
            &state,
            json!({
                "jsonrpc": "2.0",
                "method": "addVectorsBatch",
                "params": {
                    "database_id": "d",
                    "records": [
                        {"vector": [1.0, 0.0, 0.0], "data": "x"},
                        {"vector": [0.0, 1.0, 0.0], "data": "y"},
                        {"vector": [0.0, 0.0, 1.0], "data": "z"},
                    ],
                },
                "id": 2,
            }),
        )
        .await,
    );

    let ids: Vec<i64> = added["records"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![0, 1, 2]);

    let found = result(
        call(
            &handler,
            &state,
            json!({
                "jsonrpc": "2.0",
                "method": "searchVectors",
                "params": {"database_id": "d", "vectors": [[1.0, 1.0, 0.0]], "k": 2},
                "id": 3,
            }),
        )
        .await,
    );

    let records = found["records"].as_array().unwrap();
    assert_eq!(records.len(), 2);

    let mut data: Vec<&str> = records.iter().map(|r| r["data"].as_str().unwrap()).collect();
    data.sort_unstable();
    assert_eq!(data, vec!["x", "y"]);
}

#[tokio::test]
async fn vectors_are_normalised_to_database_length() {
    let (_, state, handler) = test_state();

    create_database(&handler, &state, "d", 4).await;

    let added = result(
        call(
            &handler,
            &state,
            json!({
                "jsonrpc": "2.0",
                "method": "addVector",
                "params": {
                    "database_id": "d",
                    "record": {"vector": [1.0, 2.0, 3.0], "data": "padded"},
                },
                "id": 1,
            }),
        )
        .await,
    );
    let id = added["id"].as_i64().unwrap();

    let found = result(
        call(
            &handler,
            &state,
            json!({
                "jsonrpc": "2.0",
                "method": "searchVectors",
                "params": {"database_id": "d", "vectors": [[1.0, 2.0, 3.0, 0.0]], "k": 1},
                "id": 2,
            }),
        )
        .await,
    );

    let records = found["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["id"].as_i64().unwrap(), id);
    assert_eq!(records[0]["data"], "padded");
}

#[tokio::test]
async fn database_persistence_round_trip() {
    let (_, state, handler) = test_state();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.gz");
    let path = path.to_str().unwrap();

    create_database(&handler, &state, "d", 2).await;

    let records: Vec<Value> = (0..10)
        .map(|i| json!({"vector": [i as f64 + 1.0, 1.0], "data": format!("r{i}")}))
        .collect();

    let added = result(
        call(
            &handler,
            &state,
            json!({
                "jsonrpc": "2.0",
                "method": "addVectorsBatch",
                "params": {"database_id": "d", "records": records},
                "id": 1,
            }),
        )
        .await,
    );
    let doomed = added["records"][0]["id"].as_i64().unwrap();

    result(
        call(
            &handler,
            &state,
            json!({
                "jsonrpc": "2.0",
                "method": "deleteVector",
                "params": {"database_id": "d", "record_id": doomed},
                "id": 2,
            }),
        )
        .await,
    );

    result(
        call(
            &handler,
            &state,
            json!({
                "jsonrpc": "2.0",
                "method": "writeDatabase",
                "params": {"database_id": "d", "file_path": path},
                "id": 3,
            }),
        )
        .await,
    );

    result(
        call(
            &handler,
            &state,
            json!({
                "jsonrpc": "2.0",
                "method": "deleteDatabase",
                "params": {"database_id": "d"},
                "id": 4,
            }),
        )
        .await,
    );

    // Searching the deleted database reports it as missing.
    let err = error(
        call(
            &handler,
            &state,
            json!({
                "jsonrpc": "2.0",
                "method": "searchVectors",
                "params": {"database_id": "d", "vectors": [[1.0, 1.0]], "k": 1},
                "id": 5,
            }),
        )
        .await,
    );
    assert_eq!(err["code"], -32000);
    assert_eq!(err["message"], "Database not found");

    result(
        call(
            &handler,
            &state,
            json!({
                "jsonrpc": "2.0",
                "method": "readDatabase",
                "params": {"database_id": "d", "file_path": path},
                "id": 6,
            }),
        )
        .await,
    );

    let found = result(
        call(
            &handler,
            &state,
            json!({
                "jsonrpc": "2.0",
                "method": "searchVectors",
                "params": {"database_id": "d", "vectors": [[1.0, 1.0]], "k": 20},
                "id": 7,
            }),
        )
        .await,
    );

    let records = found["records"].as_array().unwrap();
    assert_eq!(records.len(), 9);
    assert!(records
        .iter()
        .all(|r| r["id"].as_i64().unwrap() != doomed));
    assert!(records
        .iter()
        .all(|r| r["data"].as_str().unwrap().starts_with('r')));
}

#[tokio::test]
async fn repack_folds_counters_in_bounded_time() {
    let (app, state, handler) = test_state();

    create_database(&handler, &state, "d", 2).await;

    let records: Vec<Value> = (0..100)
        .map(|i| json!({"vector": [i as f64 + 1.0, 1.0], "data": i}))
        .collect();

    let added = result(
        call(
            &handler,
            &state,
            json!({
                "jsonrpc": "2.0",
                "method": "addVectorsBatch",
                "params": {"database_id": "d", "records": records},
                "id": 1,
            }),
        )
        .await,
    );

    let doomed: Vec<i64> = added["records"]
        .as_array()
        .unwrap()
        .iter()
        .take(15)
        .map(|r| r["id"].as_i64().unwrap())
        .collect();

    result(
        call(
            &handler,
            &state,
            json!({
                "jsonrpc": "2.0",
                "method": "deleteVectorsBatch",
                "params": {"database_id": "d", "record_ids": doomed},
                "id": 2,
            }),
        )
        .await,
    );

    let database = app.databases.get("d").map(|db| Arc::clone(&db)).unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if database.items_count() == 85 && database.deletes_count() == 0 {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "repack did not complete in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn duplicate_database_is_rejected() {
    let (_, state, handler) = test_state();

    create_database(&handler, &state, "d", 2).await;

    let err = error(
        call(
            &handler,
            &state,
            json!({
                "jsonrpc": "2.0",
                "method": "createDatabase",
                "params": {"database_id": "d", "vector_length": 2},
                "id": 1,
            }),
        )
        .await,
    );
    assert_eq!(err["code"], -32000);
    assert_eq!(err["message"], "Database already exists");
}

#[tokio::test]
async fn similarity_of_known_vectors() {
    let (_, state, handler) = test_state();

    let res = result(
        call(
            &handler,
            &state,
            json!({
                "jsonrpc": "2.0",
                "method": "getSimilarity",
                "params": {"vector1": [1.0, 2.0, 3.0], "vector2": [4.0, 5.0, 6.0]},
                "id": 1,
            }),
        )
        .await,
    );

    let similarity = res["similarity"].as_f64().unwrap();
    assert!((similarity - 0.974_631_8).abs() < 1e-6);
}

#[tokio::test]
async fn similarity_length_mismatch_is_an_application_error() {
    let (_, state, handler) = test_state();

    let err = error(
        call(
            &handler,
            &state,
            json!({
                "jsonrpc": "2.0",
                "method": "getSimilarity",
                "params": {"vector1": [1.0, 2.0, 3.0], "vector2": [1.0, 2.0]},
                "id": 1,
            }),
        )
        .await,
    );

    assert_eq!(err["code"], -32000);
    assert_eq!(err["message"], "Vectors must have the same length");
}

#[tokio::test]
async fn notifications_are_silent_even_for_unknown_methods() {
    let (_, state, handler) = test_state();

    let response = call(
        &handler,
        &state,
        json!({"jsonrpc": "2.0", "method": "nonexistentNoOp"}),
    )
    .await;
    assert!(response.is_none());

    let err = error(
        call(
            &handler,
            &state,
            json!({"jsonrpc": "2.0", "method": "nonexistentNoOp", "id": 1}),
        )
        .await,
    );
    assert_eq!(err["code"], -32601);
}

#[tokio::test]
async fn set_client_and_statistics() {
    let (_, state, handler) = test_state();

    // Unknown client id.
    let err = error(
        call(
            &handler,
            &state,
            json!({
                "jsonrpc": "2.0",
                "method": "getStatistics",
                "params": {"client_id": "nope"},
                "id": 1,
            }),
        )
        .await,
    );
    assert_eq!(err["code"], -32000);
    assert_eq!(err["message"], "Client not found");

    result(
        call(
            &handler,
            &state,
            json!({
                "jsonrpc": "2.0",
                "method": "setClient",
                "params": {
                    "client_id": "local",
                    "config": {"preset": "ollama", "model": "llama3"},
                },
                "id": 2,
            }),
        )
        .await,
    );

    let stats = result(
        call(
            &handler,
            &state,
            json!({
                "jsonrpc": "2.0",
                "method": "getStatistics",
                "params": {"client_id": "local"},
                "id": 3,
            }),
        )
        .await,
    );

    // No traffic yet: the default bytes-per-token estimate.
    let bytes_per_tok = stats["bytes_per_tok"].as_f64().unwrap();
    assert!((bytes_per_tok - 3.25).abs() < 1e-6);
}

#[tokio::test]
async fn set_client_with_invalid_config_is_rejected() {
    let (_, state, handler) = test_state();

    let err = error(
        call(
            &handler,
            &state,
            json!({
                "jsonrpc": "2.0",
                "method": "setClient",
                "params": {"client_id": "bad", "config": {"concurrency": 0}},
                "id": 1,
            }),
        )
        .await,
    );

    assert_eq!(err["code"], -32602);
}

#[tokio::test]
async fn session_clients_do_not_leak_across_sessions() {
    let (app, state, handler) = test_state();

    result(
        call(
            &handler,
            &state,
            json!({
                "jsonrpc": "2.0",
                "method": "setClient",
                "params": {"client_id": "mine", "config": {"preset": "ollama"}},
                "id": 1,
            }),
        )
        .await,
    );

    // A second session sees global clients only.
    let other = app.session();
    let err = error(
        call(
            &handler,
            &other,
            json!({
                "jsonrpc": "2.0",
                "method": "getStatistics",
                "params": {"client_id": "mine"},
                "id": 2,
            }),
        )
        .await,
    );
    assert_eq!(err["message"], "Client not found");
}

#[tokio::test]
async fn missing_params_are_invalid_params() {
    let (_, state, handler) = test_state();

    let err = error(
        call(
            &handler,
            &state,
            json!({"jsonrpc": "2.0", "method": "createDatabase", "id": 1}),
        )
        .await,
    );
    assert_eq!(err["code"], -32602);
}
