//! Health check endpoints.
//!
//! Used by load balancers and orchestrators. Neither endpoint requires a
//! bearer token.

use crate::error::AppError;
use crate::response::ApiResponse;
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

/// Liveness payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `ok`
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
}

/// Liveness check. Does not touch the store.
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"success":true,"data":{"status":"ok","version":"0.1.0"}}
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<ApiResponse<HealthResponse>>) {
    (
        StatusCode::OK,
        Json(ApiResponse::ok(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        })),
    )
}

/// Readiness payload.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    /// Whether the instance should receive traffic
    pub ready: bool,
    /// Whether the store answered
    pub database: bool,
}

/// Readiness check: one store round trip.
///
/// # Errors
///
/// 503 `SERVICE_UNAVAILABLE` when the store does not answer.
///
/// ```bash
/// curl http://localhost:8080/ready
/// # {"success":true,"data":{"ready":true,"database":true}}
/// ```
pub async fn readiness_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ReadinessResponse>>, AppError> {
    if let Err(error) = state.engine.ready().await {
        tracing::warn!(error = %error, "Readiness check failed");
        return Err(AppError::unavailable("Database is not reachable"));
    }

    Ok(Json(ApiResponse::ok(ReadinessResponse {
        ready: true,
        database: true,
    })))
}
