//! Observations HTTP API
//!
//! Axum server exposing the observations query over HTTP.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a pure
//! inner function. The inner functions take an `ObservationSource` directly, so
//! they can be tested without a database or axum dispatch.
//!
//! Endpoints:
//! - POST /, POST /observations: observations for one sequence, or all sequences
//!   (GET on the same paths behaves like an empty body)
//! - GET  /health: database status
//! - GET  /version: server version info

use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use observations_core::config::HttpConfig;
use observations_core::{ObservationSource, ObservationsEnvelope, ObservationsError};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub source: Arc<dyn ObservationSource>,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route(
            "/",
            get(observations_handler).post(observations_handler),
        )
        .route(
            "/observations",
            get(observations_handler).post(observations_handler),
        )
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    source: Arc<dyn ObservationSource>,
    config: HttpConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(HttpState { source });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Observations HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }

    fn into_value(self) -> serde_json::Value {
        serde_json::json!({
            "error": self.error,
            "status": self.status,
        })
    }
}

/// Pull the optional `sequence_id` out of a raw request body.
///
/// Anything that is not a JSON object, and a missing, `null` or empty
/// `sequence_id`, means "no filter". Only a `sequence_id` of the wrong JSON
/// type is rejected.
pub fn parse_sequence_id(body: &[u8]) -> std::result::Result<Option<String>, String> {
    let value: serde_json::Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };

    match value.get("sequence_id") {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) if s.is_empty() => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(format!("sequence_id must be a string, got {}", other)),
    }
}

/// HTTP status for a failed observations call.
pub fn error_status(err: &ObservationsError) -> StatusCode {
    match err {
        ObservationsError::ExhaustedCandidates(_) => StatusCode::SERVICE_UNAVAILABLE,
        ObservationsError::Database(_)
        | ObservationsError::RowShape(_)
        | ObservationsError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner observations: parse the body, run the query, wrap the rows.
pub async fn observations_inner(
    source: &dyn ObservationSource,
    body: &[u8],
) -> (StatusCode, serde_json::Value) {
    let sequence_id = match parse_sequence_id(body) {
        Ok(id) => id,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new(e).into_value(),
            );
        }
    };

    match source.get_observations(sequence_id.as_deref()).await {
        Ok(rows) => match serde_json::to_value(ObservationsEnvelope::from(rows)) {
            Ok(body) => (StatusCode::OK, body),
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new(format!("Failed to serialize observations: {}", e))
                    .into_value(),
            ),
        },
        Err(e) => {
            tracing::error!(
                sequence_id = sequence_id.as_deref().unwrap_or(""),
                error = %e,
                "Observations query failed"
            );
            (error_status(&e), ErrorResponse::new(e.to_string()).into_value())
        }
    }
}

/// Inner health check. Connects the pool if it is not up yet.
pub async fn health_inner(source: &dyn ObservationSource) -> (StatusCode, serde_json::Value) {
    match source.health().await {
        Ok(version) => (
            StatusCode::OK,
            serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "postgresql": version,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse::new(e.to_string()).into_value(),
            )
        }
    }
}

/// Inner version (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "service": "observations-data",
    })
}

// ============================================================================
// Axum handler wrappers (thin, delegate to inner functions)
// ============================================================================

pub async fn observations_handler(
    State(state): State<Arc<HttpState>>,
    body: Bytes,
) -> impl IntoResponse {
    let (status, body) = observations_inner(state.source.as_ref(), &body).await;
    (status, Json(body))
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(state.source.as_ref()).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use observations_core::Observations;

    /// Source that always fails the same way.
    struct FailingSource;

    #[async_trait]
    impl ObservationSource for FailingSource {
        async fn get_observations(
            &self,
            _sequence_id: Option<&str>,
        ) -> std::result::Result<Observations, ObservationsError> {
            Err(ObservationsError::ExhaustedCandidates(Vec::new()))
        }

        async fn health(&self) -> std::result::Result<String, ObservationsError> {
            Err(ObservationsError::ExhaustedCandidates(Vec::new()))
        }
    }

    /// Source with no rows at all.
    struct EmptySource;

    #[async_trait]
    impl ObservationSource for EmptySource {
        async fn get_observations(
            &self,
            sequence_id: Option<&str>,
        ) -> std::result::Result<Observations, ObservationsError> {
            Ok(match sequence_id {
                Some(_) => Observations::Images(Vec::new()),
                None => Observations::Sequences(Vec::new()),
            })
        }

        async fn health(&self) -> std::result::Result<String, ObservationsError> {
            Ok("PostgreSQL 15.4".to_string())
        }
    }

    // ========================================================================
    // parse_sequence_id
    // ========================================================================
    #[test]
    fn test_parse_sequence_id_present() {
        let id = parse_sequence_id(br#"{"sequence_id": "seq-042"}"#).unwrap();
        assert_eq!(id.as_deref(), Some("seq-042"));
    }

    #[test]
    fn test_parse_sequence_id_absent_forms_mean_no_filter() {
        let bodies: [&[u8]; 9] = [
            b"",
            b"not json",
            b"{",
            b"[]",
            b"\"seq-042\"",
            b"{}",
            br#"{"sequence_id": null}"#,
            br#"{"sequence_id": ""}"#,
            br#"{"other": "x"}"#,
        ];
        for body in bodies {
            assert_eq!(
                parse_sequence_id(body).unwrap(),
                None,
                "body {:?}",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[test]
    fn test_parse_sequence_id_wrong_type_rejected() {
        assert!(parse_sequence_id(br#"{"sequence_id": 42}"#).is_err());
        assert!(parse_sequence_id(br#"{"sequence_id": ["a"]}"#).is_err());
    }

    // ========================================================================
    // error_status
    // ========================================================================
    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            error_status(&ObservationsError::ExhaustedCandidates(Vec::new())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            error_status(&ObservationsError::Database(sqlx::Error::RowNotFound)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            error_status(&ObservationsError::RowShape("bad".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    // ========================================================================
    // observations_inner
    // ========================================================================
    #[tokio::test]
    async fn test_observations_inner_empty_result() {
        let (status, body) = observations_inner(&EmptySource, b"{}").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "data": [], "count": 0 }));
    }

    #[tokio::test]
    async fn test_observations_inner_bad_type_is_400() {
        let (status, body) = observations_inner(&EmptySource, br#"{"sequence_id": 1}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_observations_inner_unreachable_db_is_503() {
        let (status, body) = observations_inner(&FailingSource, b"").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "error");
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("No database candidate reachable"));
    }

    // ========================================================================
    // health_inner / version_inner
    // ========================================================================
    #[tokio::test]
    async fn test_health_inner_ok() {
        let (status, body) = health_inner(&EmptySource).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["postgresql"], "PostgreSQL 15.4");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_health_inner_unavailable() {
        let (status, body) = health_inner(&FailingSource).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            body,
            serde_json::json!({
                "error": "No database candidate reachable: no candidates configured",
                "status": "error",
            })
        );
    }

    #[test]
    fn test_version_inner_pure() {
        let v = version_inner();
        assert!(v["version"].is_string(), "version must be string");
        assert_eq!(v["service"], "observations-data");
    }
}
