//! Operational endpoints and the shared error body.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use std::time::Instant;
use tier_core::TierError;
use tracing::error;
use utoipa::ToSchema;

/// Shared state for operational endpoints.
#[derive(Clone)]
pub struct AppState {
    pub node_id: String,
    pub start_time: Instant,
}

/// GET /health — Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Operations",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready — Readiness probe for Kubernetes.
#[utoipa::path(
    get,
    path = "/ready",
    tag = "Operations",
    responses(
        (status = 200, description = "Ready to accept traffic"),
    )
)]
pub async fn readiness() -> StatusCode {
    // Reference data is loaded before the router is built.
    StatusCode::OK
}

/// GET /live — Liveness probe for Kubernetes.
#[utoipa::path(
    get,
    path = "/live",
    tag = "Operations",
    responses(
        (status = 200, description = "Process is alive"),
    )
)]
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
}

/// A domain error mapped onto an HTTP status.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl From<TierError> for ApiError {
    fn from(err: TierError) -> Self {
        let (status, code) = match &err {
            TierError::DuplicateTransaction(_) => (StatusCode::CONFLICT, "duplicate_transaction"),
            TierError::OutOfOrderTransaction { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, "out_of_order_transaction")
            }
            e if e.is_data_integrity() => {
                (StatusCode::INTERNAL_SERVER_ERROR, "data_integrity_error")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %err, code, "Loyalty request failed");
            metrics::counter!("api.errors").increment(1);
            "Internal processing error".to_string()
        } else {
            err.to_string()
        };

        Self {
            status,
            body: ErrorResponse {
                error: code.to_string(),
                message,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_status_mapping() {
        let dup: ApiError = TierError::DuplicateTransaction(Uuid::new_v4()).into();
        assert_eq!(dup.status, StatusCode::CONFLICT);
        assert_eq!(dup.body.error, "duplicate_transaction");

        let missing: ApiError = TierError::TierNotFound("level 1".to_string()).into();
        assert_eq!(missing.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(missing.body.error, "data_integrity_error");
        assert_eq!(missing.body.message, "Internal processing error");
    }
}
