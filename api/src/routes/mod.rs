//! HTTP route handlers.

mod health;
mod logs;
mod query;

pub use health::{health_routes, HealthResponse};
pub use logs::{logs_routes, LogEntryRequest, LogIngestError, LogIngestResponse};
pub use query::{query_routes, QueryError, QueryRequest, QueryResponse, ValidateRequest};
