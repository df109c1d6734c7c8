//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fulfillment::{
    CatalogError, CheckoutError, FulfillmentError, ReconciliationError, SignatureError,
};

/// API-level error type that maps to JSON `{"error": ...}` responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Missing or wrong credentials.
    Unauthorized,
    /// Internal server error; the detail is logged, not returned.
    Internal { detail: String, message: String },
}

impl ApiError {
    /// Internal error answered with `message` and logged with `detail`.
    pub fn internal(detail: impl ToString, message: &str) -> Self {
        ApiError::Internal {
            detail: detail.to_string(),
            message: message.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::Internal { detail, message } => {
                tracing::error!(error = %detail, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        if err.is_validation() {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::internal(err, "Failed to create checkout session")
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(_) => ApiError::NotFound("Product not found".to_string()),
            other => ApiError::internal(other, "Failed to check stock"),
        }
    }
}

impl From<ReconciliationError> for ApiError {
    fn from(err: ReconciliationError) -> Self {
        match err {
            ReconciliationError::Unauthorized => ApiError::Unauthorized,
            other => ApiError::internal(other, "Failed to check orders"),
        }
    }
}

/// Webhook failure, answered in plain text for the payment provider.
///
/// Client errors tell the provider not to retry; server errors ask it to
/// redeliver.
#[derive(Debug)]
pub struct WebhookError(FulfillmentError);

impl WebhookError {
    /// Status and body sent back to the provider.
    pub fn response_parts(&self) -> (StatusCode, String) {
        match &self.0 {
            FulfillmentError::Signature(SignatureError::MissingHeader) => {
                (StatusCode::BAD_REQUEST, "No signature".to_string())
            }
            FulfillmentError::Signature(_) => {
                (StatusCode::BAD_REQUEST, "Invalid signature".to_string())
            }
            FulfillmentError::MalformedEvent(e) => {
                (StatusCode::BAD_REQUEST, format!("Invalid payload: {e}"))
            }
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Processing error".to_string(),
            ),
        }
    }

    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match &self.0 {
            FulfillmentError::Signature(_) => "signature",
            FulfillmentError::MalformedEvent(_) => "payload",
            _ => "processing",
        }
    }
}

impl From<FulfillmentError> for WebhookError {
    fn from(err: FulfillmentError) -> Self {
        WebhookError(err)
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, body) = self.response_parts();
        if self.0.is_rejection() {
            tracing::warn!(error = %self.0, "webhook rejected");
        } else {
            tracing::error!(error = %self.0, "webhook processing failed");
        }
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ProductId, SessionId};
    use fulfillment::PaymentError;

    #[test]
    fn test_webhook_error_statuses() {
        let missing = WebhookError::from(FulfillmentError::from(SignatureError::MissingHeader));
        assert_eq!(
            missing.response_parts(),
            (StatusCode::BAD_REQUEST, "No signature".to_string())
        );

        let mismatch = WebhookError::from(FulfillmentError::from(SignatureError::Mismatch));
        assert_eq!(mismatch.response_parts().0, StatusCode::BAD_REQUEST);
        assert_eq!(mismatch.reason(), "signature");

        let fetch = WebhookError::from(FulfillmentError::SessionFetch {
            session_id: SessionId::new("cs_1"),
            source: PaymentError::Transport("timeout".to_string()),
        });
        assert_eq!(
            fetch.response_parts(),
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Processing error".to_string()
            )
        );

        let interrupted = WebhookError::from(FulfillmentError::Interrupted("panicked".to_string()));
        assert_eq!(interrupted.response_parts().0, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(interrupted.reason(), "processing");
    }

    #[test]
    fn test_checkout_error_mapping() {
        let err = ApiError::from(CheckoutError::EmptyCart);
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err = ApiError::from(CheckoutError::Catalog(CatalogError::Read("503".to_string())));
        assert!(matches!(err, ApiError::Internal { .. }));
    }

    #[test]
    fn test_catalog_error_mapping() {
        let err = ApiError::from(CatalogError::NotFound(ProductId::new("x")));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);

        let err = ApiError::from(CatalogError::Read("503".to_string()));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
