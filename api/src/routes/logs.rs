//! Log ingestion endpoint.
//!
//! Accepts parsed RabbitMQ log entries, one at a time or in batches, and
//! appends them to the store the query endpoint reads from.

use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use lql::models::{LogEntry, LogValidationError, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Request body for log ingestion - can be a single log or a batch.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum LogIngestRequest {
    /// A single log entry.
    Single(LogEntryRequest),
    /// A batch of log entries.
    Batch(Vec<LogEntryRequest>),
}

/// A log entry as received from the API.
///
/// Like `LogEntry` without the `id`, which the store assigns, and with an
/// optional timestamp that defaults to now.
#[derive(Debug, Deserialize)]
pub struct LogEntryRequest {
    /// Timestamp (optional, defaults to current time).
    #[serde(default = "chrono::Utc::now")]
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Severity (optional, defaults to info).
    #[serde(default)]
    pub severity: Severity,

    /// Erlang node name (required).
    pub node: String,

    /// Erlang process identifier.
    #[serde(default)]
    pub erlang_pid: String,

    /// Broker subsystem.
    #[serde(default)]
    pub subsystem: Option<String>,

    /// Log message (required).
    pub message: String,

    /// Classification labels.
    #[serde(default)]
    pub labels: BTreeSet<String>,

    /// Related documentation link.
    #[serde(default)]
    pub doc_url: Option<String>,

    /// Known resolution or discussion link.
    #[serde(default)]
    pub resolution_or_discussion_url: Option<String>,
}

impl From<LogEntryRequest> for LogEntry {
    fn from(req: LogEntryRequest) -> Self {
        Self {
            id: 0,
            timestamp: req.timestamp,
            severity: req.severity,
            node: req.node,
            erlang_pid: req.erlang_pid,
            subsystem: req.subsystem,
            message: req.message,
            labels: req.labels,
            doc_url: req.doc_url,
            resolution_or_discussion_url: req.resolution_or_discussion_url,
        }
    }
}

/// Response for successful log ingestion.
#[derive(Debug, Serialize, Deserialize)]
pub struct LogIngestResponse {
    /// Number of logs accepted.
    pub accepted: usize,
    /// Message describing the result.
    pub message: String,
}

/// Error response for failed log ingestion.
#[derive(Debug, Serialize, Deserialize)]
pub struct LogIngestError {
    /// Error type.
    pub error: String,
    /// Detailed error message.
    pub message: String,
    /// Validation errors by index (for batch requests).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl LogIngestError {
    fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

/// Validation error detail for a specific log entry.
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Index in the batch (0 for single requests).
    pub index: usize,
    /// Field that failed validation.
    pub field: String,
    /// Error message.
    pub message: String,
}

/// Creates the log ingestion routes.
pub fn logs_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/logs", post(ingest_logs))
        .with_state(state)
}

/// Returns 201 Created on success and 400 Bad Request if any entry is
/// invalid, in which case nothing is stored.
async fn ingest_logs(
    State(state): State<AppState>,
    payload: Result<Json<LogIngestRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<LogIngestResponse>), (StatusCode, Json<LogIngestError>)> {
    let Json(request) = payload.map_err(|rejection| {
        (
            StatusCode::BAD_REQUEST,
            Json(LogIngestError::new("invalid_json", rejection.body_text())),
        )
    })?;

    let requests = match request {
        LogIngestRequest::Single(entry) => vec![entry],
        LogIngestRequest::Batch(entries) => entries,
    };

    if requests.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(LogIngestError::new(
                "empty_batch",
                "At least one log entry is required",
            )),
        ));
    }

    let mut validation_errors = Vec::new();
    let mut entries = Vec::with_capacity(requests.len());

    for (index, request) in requests.into_iter().enumerate() {
        let entry = LogEntry::from(request);
        match entry.validate_entry() {
            Ok(()) => entries.push(entry),
            Err(e) => validation_errors.push(ValidationErrorDetail {
                index,
                field: match e {
                    LogValidationError::EmptyNode => "node".to_string(),
                    LogValidationError::ValidationError(_) => "unknown".to_string(),
                },
                message: e.to_string(),
            }),
        }
    }

    if !validation_errors.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(LogIngestError {
                error: "validation_failed".to_string(),
                message: format!(
                    "{} log entry/entries failed validation",
                    validation_errors.len()
                ),
                details: Some(validation_errors),
            }),
        ));
    }

    let count = entries.len();
    state.log_store().insert_batch(entries).map_err(|e| {
        tracing::error!(error = %e, "Failed to store log entries");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(LogIngestError::new("storage_error", e.to_string())),
        )
    })?;

    tracing::debug!(count, "Accepted log entries");

    Ok((
        StatusCode::CREATED,
        Json(LogIngestResponse {
            accepted: count,
            message: format!(
                "Successfully ingested {} log {}",
                count,
                if count == 1 { "entry" } else { "entries" }
            ),
        }),
    ))
}
