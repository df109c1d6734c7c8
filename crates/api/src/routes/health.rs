//! Health check endpoint.

use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /health: liveness only, no upstream calls.
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
