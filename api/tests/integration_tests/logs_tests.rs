//! Integration tests for log ingestion.
//!
//! Tests cover:
//! - Single and batch ingestion, and the ids the store assigns
//! - Rejection of invalid batches as a whole
//! - Entries without a timestamp landing inside recent time windows

use axum::http::StatusCode;
use serde_json::json;

use super::common::{post_json, query_ids, sample_entries, test_app};

#[tokio::test]
async fn test_ingest_and_query_single_log() {
    let (app, _state) = test_app();

    let log = json!({
        "severity": "error",
        "node": "rabbit@node-1",
        "erlang_pid": "<0.999.0>",
        "subsystem": "connections",
        "message": "Error on AMQP connection: client unexpectedly closed TCP connection",
        "labels": ["connections"]
    });

    let (status, response) = post_json(app.clone(), "/api/v1/logs", log).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(response["accepted"], 1);

    let (status, response) =
        post_json(app, "/api/v1/query", json!({ "query": ":connection_churn" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["total"], 1);

    let entry = &response["entries"][0];
    assert_eq!(entry["id"], 1);
    assert_eq!(entry["severity"], "error");
    assert_eq!(entry["node"], "rabbit@node-1");
    assert_eq!(entry["erlang_pid"], "<0.999.0>");
    assert_eq!(entry["labels"], json!(["connections"]));
}

#[tokio::test]
async fn test_batches_continue_the_id_sequence() {
    let (app, state) = test_app();

    let (status, response) = post_json(app.clone(), "/api/v1/logs", sample_entries()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(response["accepted"], 6);

    let (status, _) = post_json(
        app.clone(),
        "/api/v1/logs",
        json!([
            {"node": "rabbit@node-4", "message": "a"},
            {"node": "rabbit@node-4", "message": "b"}
        ]),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    assert_eq!(state.log_store().count().unwrap(), 8);
    assert_eq!(
        query_ids(app, r#"node == "rabbit@node-4""#).await,
        vec![7, 8]
    );
}

#[tokio::test]
async fn test_invalid_entry_rejects_the_whole_batch() {
    let (app, state) = test_app();

    let (status, response) = post_json(
        app,
        "/api/v1/logs",
        json!([
            {"node": "rabbit@node-1", "message": "ok"},
            {"node": "", "message": "missing node"},
            {"node": "", "message": "also missing"}
        ]),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "validation_failed");
    assert_eq!(response["details"].as_array().unwrap().len(), 2);
    assert_eq!(response["details"][0]["index"], 1);
    assert_eq!(state.log_store().count().unwrap(), 0);
}

#[tokio::test]
async fn test_missing_required_field_is_rejected() {
    let (app, _state) = test_app();

    let (status, response) =
        post_json(app, "/api/v1/logs", json!({"message": "no node at all"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "invalid_json");
}

#[tokio::test]
async fn test_entries_without_timestamp_are_recent() {
    let (app, _state) = test_app();

    post_json(app.clone(), "/api/v1/logs", sample_entries()).await;
    post_json(
        app.clone(),
        "/api/v1/logs",
        json!({"node": "rabbit@node-1", "message": "just now", "labels": ["timeouts"]}),
    )
    .await;

    assert_eq!(query_ids(app.clone(), "@5m").await, vec![7]);
    assert_eq!(query_ids(app, "@5m :timeouts").await, vec![7]);
}
