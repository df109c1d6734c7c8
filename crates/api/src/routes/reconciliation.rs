//! Scheduled reconciliation trigger.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, header};
use serde::Serialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct CheckOrdersResponse {
    pub checked: usize,
    pub mismatches: usize,
}

/// GET /api/check-orders: audits recent payments against the ledger.
///
/// Requires `Authorization: Bearer <CRON_SECRET>`.
#[tracing::instrument(skip_all)]
pub async fn check_orders(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<CheckOrdersResponse>, ApiError> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    state.reconciliation.authorize(authorization)?;

    let report = state.reconciliation.run().await?;
    Ok(Json(CheckOrdersResponse {
        checked: report.checked,
        mismatches: report.mismatches.len(),
    }))
}
