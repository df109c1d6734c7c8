//! Stock lookup for the storefront.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use common::ProductId;
use fulfillment::StockStatus;
use serde::Deserialize;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckStockRequest {
    pub product_id: Option<String>,
}

/// POST /api/check-stock: current stock and sale state of one product.
#[tracing::instrument(skip_all)]
pub async fn check(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CheckStockRequest>, JsonRejection>,
) -> Result<Json<StockStatus>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let product_id = req
        .product_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("productId is required".to_string()))?;

    let status = state
        .checkout
        .stock_status(&ProductId::new(product_id))
        .await?;
    Ok(Json(status))
}
