//! Health check endpoint.
//!
//! Reports liveness plus the catalogue version the server validates against,
//! so clients can tell whether their embedded vocabulary is out of date.

use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status (always "healthy" if reachable).
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
    /// Version of the query catalogue in use.
    pub catalogue_version: String,
}

/// Creates the health check routes.
pub fn health_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "rlqt-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        catalogue_version: state.engine().catalogue().version().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use lql::engine::Engine;
    use tower::ServiceExt;

    fn app() -> Router {
        health_routes(AppState::with_in_memory_store(Engine::builtin().unwrap()))
    }

    #[tokio::test]
    async fn test_health_check_status() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_check_body() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let health: HealthResponse = serde_json::from_slice(&body).unwrap();

        assert_eq!(health.status, "healthy");
        assert_eq!(health.service, "rlqt-api");
        assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(health.catalogue_version, lql::catalogue::CATALOGUE_VERSION);
    }

    #[tokio::test]
    async fn test_health_check_rejects_post() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
