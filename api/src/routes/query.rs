//! LQL query endpoints.
//!
//! `POST /api/v1/query` runs a query against the log store.
//! `POST /api/v1/query/validate` checks query text without running it.
//! `GET /api/v1/query/autocomplete` serves the vocabulary clients complete from.
//!
//! The server always re-validates; a client whose own check was skipped or
//! is out of date still gets a precise error here.

use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lql::catalogue::Metadata;
use lql::models::LogEntry;
use lql::query::ValidationResult;
use serde::{Deserialize, Serialize};

/// Request body for running a query.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    /// LQL text.
    pub query: String,
    /// Maximum entries to return; capped by the server's configured maximum.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Request body for validation.
#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    /// LQL text.
    pub query: String,
}

/// Response for successful query execution.
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    /// The matching entries, in pipeline order.
    pub entries: Vec<LogEntry>,
    /// Entries the query produced before the response cap.
    pub total: usize,
    /// Number of entries in this response.
    pub returned_count: usize,
}

/// Error response for query operations.
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryError {
    /// Error type.
    pub error: String,
    /// Detailed error message.
    pub message: String,
    /// Byte offset of the problem in the query text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    /// Replacement candidates for the offending token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

impl QueryError {
    fn plain(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
            position: None,
            suggestions: None,
        }
    }
}

impl From<&lql::query::QueryError> for QueryError {
    fn from(e: &lql::query::QueryError) -> Self {
        let error = match e {
            lql::query::QueryError::Parse(_) => "parse_error",
            lql::query::QueryError::Semantic(_) => "validation_error",
        };
        let suggestions = e.suggestions();

        Self {
            error: error.to_string(),
            message: e.to_string(),
            position: Some(e.position()),
            suggestions: (!suggestions.is_empty()).then(|| suggestions.to_vec()),
        }
    }
}

type ApiError = (StatusCode, Json<QueryError>);

fn bad_json(rejection: &JsonRejection) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(QueryError::plain("invalid_json", rejection.body_text())),
    )
}

/// Creates the query routes with application state.
pub fn query_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/query", post(run_query))
        .route("/api/v1/query/validate", post(validate_query))
        .route("/api/v1/query/autocomplete", get(autocomplete))
        .with_state(state)
}

async fn run_query(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| bad_json(&rejection))?;

    let entries = state.log_store().snapshot().map_err(|e| {
        tracing::error!(error = %e, "Failed to read log store");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(QueryError::plain("storage_error", e.to_string())),
        )
    })?;

    let output = state
        .engine()
        .query(&request.query, entries, state.limits().cap(request.limit))
        .map_err(|e| {
            tracing::debug!(query = %request.query, error = %e, "Rejected query");
            (StatusCode::BAD_REQUEST, Json(QueryError::from(&e)))
        })?;

    tracing::debug!(
        query = %request.query,
        total = output.total,
        returned = output.entries.len(),
        "Query executed successfully"
    );

    Ok(Json(QueryResponse {
        returned_count: output.entries.len(),
        entries: output.entries,
        total: output.total,
    }))
}

async fn validate_query(
    State(state): State<AppState>,
    payload: Result<Json<ValidateRequest>, JsonRejection>,
) -> Result<Json<ValidationResult>, ApiError> {
    let Json(request) = payload.map_err(|rejection| bad_json(&rejection))?;
    Ok(Json(state.engine().validate(&request.query)))
}

async fn autocomplete(State(state): State<AppState>) -> Json<Metadata> {
    Json(state.engine().autocomplete_data())
}
