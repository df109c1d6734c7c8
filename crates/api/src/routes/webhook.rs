//! Payment provider webhook.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use fulfillment::{FulfillmentOutcome, SIGNATURE_HEADER};
use serde::Serialize;

use crate::AppState;
use crate::error::WebhookError;

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// POST /api/webhook: verifies and fulfills a provider event.
///
/// The body is taken as raw bytes; the signature covers them exactly.
#[tracing::instrument(skip_all, fields(bytes = body.len()))]
pub async fn receive(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, WebhookError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    // Detached: a dropped connection must not stop a run mid-adjustment.
    let outcome = state
        .workflow
        .clone()
        .handle_detached(body.to_vec(), signature)
        .await
        .map_err(|e| {
            let err = WebhookError::from(e);
            metrics::counter!("webhook_failures_total", "reason" => err.reason()).increment(1);
            err
        })?;

    match &outcome {
        FulfillmentOutcome::Ignored { event_type } => {
            tracing::debug!(%event_type, "event ignored");
        }
        FulfillmentOutcome::AlreadyRecorded { order_id } => {
            tracing::info!(%order_id, "order already recorded");
        }
        FulfillmentOutcome::Fulfilled(report) => {
            tracing::info!(
                order_id = %report.order_id,
                inventory_updated = report.inventory_updated,
                recorded = report.recorded,
                "order fulfilled"
            );
        }
    }

    Ok(Json(WebhookAck { received: true }))
}
