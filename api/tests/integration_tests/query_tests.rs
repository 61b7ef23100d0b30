//! Integration tests for LQL over HTTP.
//!
//! Tests cover:
//! - Every built-in preset against a known data set
//! - Field comparisons, label filters, boolean structure and pipelines
//! - Error positions and suggestions
//! - Validation and autocomplete endpoints

use axum::http::StatusCode;
use serde_json::json;

use super::common::{get, post_json, query_ids, seeded_app};

#[tokio::test]
async fn test_presets() {
    let cases: &[(&str, &[u64])] = &[
        (":errors", &[3, 4]),
        (":crashes", &[4]),
        (":errors_or_crashes", &[3, 4]),
        (":warnings", &[2]),
        (":warnings_and_above", &[2, 3, 4, 6]),
        (":tls_issues", &[3]),
        (":timeouts", &[]),
        (":connection_churn", &[2]),
        (":raft", &[5]),
        (":startup_and_shutdown", &[1, 6]),
    ];

    for (query, expected) in cases {
        let app = seeded_app().await;
        assert_eq!(query_ids(app, query).await, *expected, "query {query}");
    }
}

#[tokio::test]
async fn test_field_comparisons() {
    let cases: &[(&str, &[u64])] = &[
        (r#"subsystem == "queues""#, &[4]),
        (r#"doc_url contains "ssl""#, &[3]),
        (r#"message contains "RabbitMQ""#, &[1, 6]),
        (r#"message contains "rabbitmq""#, &[]),
        (r#"severity > "notice" and node != "rabbit@node-1""#, &[3, 4, 6]),
        (r#"timestamp < "2025-03-01 10:05:00""#, &[1]),
        (r#"erlang_pid == "<0.1.0>""#, &[6]),
    ];

    for (query, expected) in cases {
        let app = seeded_app().await;
        assert_eq!(query_ids(app, query).await, *expected, "query {query}");
    }
}

#[tokio::test]
async fn test_labels_and_boolean_structure() {
    let cases: &[(&str, &[u64])] = &[
        ("#connections", &[2, 3]),
        ("#connections -#tls", &[2]),
        (r#"node == "rabbit@node-2" and -#tls"#, &[4]),
        ("not (#connections or #raft)", &[1, 4, 6]),
        ("#raft or #shutdown and #startup", &[5]),
        ("(#raft or #shutdown) and -#startup", &[5, 6]),
    ];

    for (query, expected) in cases {
        let app = seeded_app().await;
        assert_eq!(query_ids(app, query).await, *expected, "query {query}");
    }
}

#[tokio::test]
async fn test_pipelines() {
    let app = seeded_app().await;
    assert_eq!(
        query_ids(
            app,
            r#"timestamp >= "2025-03-01 10:06:00" | sort timestamp desc | limit 2"#
        )
        .await,
        vec![6, 5]
    );

    let app = seeded_app().await;
    assert_eq!(
        query_ids(app, "| sort node desc").await,
        vec![5, 6, 3, 4, 1, 2]
    );

    let app = seeded_app().await;
    assert_eq!(query_ids(app, "| limit 2 | sort id desc").await, vec![2, 1]);
}

#[tokio::test]
async fn test_old_entries_fall_outside_time_window() {
    let app = seeded_app().await;
    assert!(query_ids(app, "@1h").await.is_empty());
}

#[tokio::test]
async fn test_request_limit_is_applied_after_the_query() {
    let app = seeded_app().await;

    let (status, response) = post_json(
        app,
        "/api/v1/query",
        json!({ "query": "| sort id desc", "limit": 2 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["total"], 6);
    assert_eq!(response["returned_count"], 2);
    assert_eq!(response["entries"][0]["id"], 6);
}

#[tokio::test]
async fn test_query_errors_carry_position_and_suggestions() {
    let app = seeded_app().await;

    let (status, response) = post_json(
        app.clone(),
        "/api/v1/query",
        json!({ "query": "@1h :erors" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "validation_error");
    assert_eq!(response["position"], 4);
    assert_eq!(response["suggestions"][0], ":errors");

    let (status, response) = post_json(
        app.clone(),
        "/api/v1/query",
        json!({ "query": "sevrity == \"error\"" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["position"], 0);
    assert_eq!(response["suggestions"][0], "severity");

    let (status, response) =
        post_json(app, "/api/v1/query", json!({ "query": "| limit 20000" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["position"], 8);
}

#[tokio::test]
async fn test_validate_endpoint() {
    let app = seeded_app().await;

    let (status, response) = post_json(
        app.clone(),
        "/api/v1/query/validate",
        json!({ "query": "@24h :errors #tls | sort timestamp desc | limit 20" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["valid"], true);
    assert!(response["error_message"].is_null());

    let (status, response) = post_json(
        app,
        "/api/v1/query/validate",
        json!({ "query": "severity ===  \"error\"" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["valid"], false);
    assert_eq!(response["error_position"], 9);
    assert_eq!(response["suggestions"][0], "==");
}

#[tokio::test]
async fn test_autocomplete_endpoint() {
    let app = seeded_app().await;

    let (status, response) = get(app, "/api/v1/query/autocomplete").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["max_limit"], 10_000);
    assert_eq!(response["presets"].as_array().unwrap().len(), 10);
    assert!(response["fields"]
        .as_array()
        .unwrap()
        .iter()
        .any(|f| f["name"] == "severity" && f["type"] == "enum"));
    assert!(response["labels"]
        .as_array()
        .unwrap()
        .iter()
        .any(|l| l == "quorum_queues"));
}
