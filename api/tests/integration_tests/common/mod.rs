//! Common test utilities and helpers for integration tests.

use api::{create_router, AppState};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use lql::engine::Engine;
use serde_json::{json, Value};

/// Creates a test router over the built-in engine and a fresh in-memory store.
pub fn test_app() -> (Router, AppState) {
    let state = AppState::with_in_memory_store(Engine::builtin().unwrap());
    let router = create_router(state.clone());
    (router, state)
}

/// A small cluster's worth of entries, ids 1 through 6 once ingested.
pub fn sample_entries() -> Value {
    json!([
        {
            "timestamp": "2025-03-01T10:00:00Z",
            "severity": "info",
            "node": "rabbit@node-1",
            "erlang_pid": "<0.100.0>",
            "subsystem": "boot",
            "message": "Starting RabbitMQ 4.0.5",
            "labels": ["startup"]
        },
        {
            "timestamp": "2025-03-01T10:05:00Z",
            "severity": "warning",
            "node": "rabbit@node-1",
            "erlang_pid": "<0.230.0>",
            "subsystem": "connections",
            "message": "closing AMQP connection <0.230.0> (10.0.0.5:51234 -> 10.0.0.1:5672)",
            "labels": ["connections"]
        },
        {
            "timestamp": "2025-03-01T10:06:00Z",
            "severity": "error",
            "node": "rabbit@node-2",
            "erlang_pid": "<0.301.0>",
            "message": "TLS server: In state certify received CLIENT ALERT: Fatal - Unknown CA",
            "labels": ["tls", "connections"],
            "doc_url": "https://www.rabbitmq.com/docs/ssl"
        },
        {
            "timestamp": "2025-03-01T10:07:00Z",
            "severity": "error",
            "node": "rabbit@node-2",
            "erlang_pid": "<0.402.0>",
            "subsystem": "queues",
            "message": "** Generic server <0.402.0> terminating",
            "labels": ["erl_process_crash", "queues"]
        },
        {
            "timestamp": "2025-03-01T10:08:00Z",
            "severity": "notice",
            "node": "rabbit@node-3",
            "erlang_pid": "<0.500.0>",
            "subsystem": "raft",
            "message": "queue 'orders' in vhost '/': leader election",
            "labels": ["raft", "elections", "quorum_queues"]
        },
        {
            "timestamp": "2025-03-01T10:09:00Z",
            "severity": "critical",
            "node": "rabbit@node-3",
            "erlang_pid": "<0.1.0>",
            "message": "Stopping RabbitMQ applications and their dependencies",
            "labels": ["shutdown"]
        }
    ])
}

/// Ingests `sample_entries` and returns the router.
pub async fn seeded_app() -> Router {
    let (app, _state) = test_app();
    let (status, _) = post_json(app.clone(), "/api/v1/logs", sample_entries()).await;
    assert_eq!(status, StatusCode::CREATED);
    app
}

/// Runs `query` through the query endpoint and returns the matched ids.
pub async fn query_ids(app: Router, query: &str) -> Vec<u64> {
    let (status, response) = post_json(app, "/api/v1/query", json!({ "query": query })).await;
    assert_eq!(status, StatusCode::OK, "query {query:?} failed: {response}");

    response["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["id"].as_u64().unwrap())
        .collect()
}

/// Helper to make a POST request with JSON body.
pub async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = tower::ServiceExt::oneshot(
        app,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
    )
    .await
    .unwrap();

    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    (status, json)
}

/// Helper to make a GET request.
pub async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = tower::ServiceExt::oneshot(
        app,
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    (status, json)
}
