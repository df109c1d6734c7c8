//! Fulfillment error types.

use common::{OrderId, ProductId, SessionId};
use domain::DomainError;
use thiserror::Error;

use crate::state::FulfillmentState;

/// Errors returned by a catalog client.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The product id is unknown to the catalog.
    #[error("Product not found: {0}")]
    NotFound(ProductId),

    /// The catalog could not be read.
    #[error("Catalog read failed: {0}")]
    Read(String),

    /// A stock write was rejected or did not complete.
    #[error("Catalog write failed for {product_id}: {reason}")]
    Write {
        product_id: ProductId,
        reason: String,
    },
}

/// Errors returned by a ledger client.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Appending a row failed.
    #[error("Ledger write failed: {0}")]
    Write(String),

    /// Reading rows failed.
    #[error("Ledger read failed: {0}")]
    Read(String),

    /// A row exists for the order but could not be decoded.
    #[error("Ledger row malformed: {0}")]
    Malformed(#[from] DomainError),
}

/// Errors returned by a payment provider client.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The session id is unknown to the provider.
    #[error("Checkout session not found: {0}")]
    SessionNotFound(SessionId),

    /// The provider answered with an error status.
    #[error("Payment provider returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The provider could not be reached or timed out.
    #[error("Payment provider unreachable: {0}")]
    Transport(String),

    /// The provider's response could not be decoded.
    #[error("Unexpected payment provider response: {0}")]
    Decode(String),
}

/// Reasons a webhook signature is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// No signature header was sent.
    #[error("No signature")]
    MissingHeader,

    /// The header does not follow the `t=...,v1=...` scheme.
    #[error("Malformed signature header: {0}")]
    Malformed(String),

    /// The signed timestamp is outside the accepted tolerance.
    #[error("Signature timestamp outside tolerance ({age_secs}s)")]
    StaleTimestamp { age_secs: i64 },

    /// No signature in the header matches the payload.
    #[error("Invalid signature")]
    Mismatch,
}

/// Errors that end a fulfillment run before the order is recorded.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// The webhook could not be authenticated.
    #[error("Webhook signature rejected: {0}")]
    Signature(#[from] SignatureError),

    /// The authenticated payload is not a provider event.
    #[error("Webhook payload is not a valid event: {0}")]
    MalformedEvent(#[from] serde_json::Error),

    /// The authoritative session could not be retrieved.
    #[error("Failed to retrieve session {session_id}: {source}")]
    SessionFetch {
        session_id: SessionId,
        #[source]
        source: PaymentError,
    },

    /// The session cannot be turned into an order record.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// The ledger could not be checked for an existing record.
    #[error("Failed to look up order {order_id} in ledger: {source}")]
    LedgerLookup {
        order_id: OrderId,
        #[source]
        source: LedgerError,
    },

    /// The run's task panicked or was cancelled before it finished.
    #[error("Fulfillment task did not complete: {0}")]
    Interrupted(String),

    /// The workflow attempted an out-of-order state change.
    #[error("Invalid fulfillment transition from {from} to {to}")]
    InvalidTransition {
        from: FulfillmentState,
        to: FulfillmentState,
    },
}

impl FulfillmentError {
    /// Returns true if the request was rejected before anything was trusted.
    ///
    /// Rejections are answered with a client error; everything else asks the
    /// provider to redeliver.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            FulfillmentError::Signature(_) | FulfillmentError::MalformedEvent(_)
        )
    }
}

/// Errors from the reconciliation job.
#[derive(Debug, Error)]
pub enum ReconciliationError {
    /// The scheduled-job secret was missing or wrong.
    #[error("Unauthorized")]
    Unauthorized,

    /// Listing sessions failed.
    #[error("Payment provider error: {0}")]
    Payment(#[from] PaymentError),

    /// Looking up an order failed.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Errors from checkout session creation.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart has no items.
    #[error("Cart is empty")]
    EmptyCart,

    /// A cart line asks for zero units.
    #[error("Invalid quantity for {0}")]
    InvalidQuantity(ProductId),

    /// A cart line references an unknown product.
    #[error("Product {0} does not exist")]
    ProductNotFound(ProductId),

    /// A cart line references a product that is not for sale.
    #[error("\"{name}\" is currently not for sale")]
    Inactive { name: String },

    /// A cart line asks for more units than are in stock.
    #[error("\"{name}\" has insufficient stock ({available} left)")]
    InsufficientStock { name: String, available: u32 },

    /// The catalog could not be read.
    #[error("Catalog error: {0}")]
    Catalog(CatalogError),

    /// The payment session could not be created.
    #[error("Payment provider error: {0}")]
    Payment(#[from] PaymentError),
}

impl CheckoutError {
    /// Returns true if the error is the buyer's to fix.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CheckoutError::EmptyCart
                | CheckoutError::InvalidQuantity(_)
                | CheckoutError::ProductNotFound(_)
                | CheckoutError::Inactive { .. }
                | CheckoutError::InsufficientStock { .. }
        )
    }
}

impl From<CatalogError> for CheckoutError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotFound(id) => CheckoutError::ProductNotFound(id),
            other => CheckoutError::Catalog(other),
        }
    }
}

/// Convenience type alias for fulfillment results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_and_payload_errors_are_rejections() {
        assert!(FulfillmentError::from(SignatureError::Mismatch).is_rejection());
        let bad_json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(FulfillmentError::from(bad_json).is_rejection());

        let fetch = FulfillmentError::SessionFetch {
            session_id: SessionId::new("cs_1"),
            source: PaymentError::Transport("timeout".to_string()),
        };
        assert!(!fetch.is_rejection());
        assert!(!FulfillmentError::Interrupted("task cancelled".to_string()).is_rejection());
    }

    #[test]
    fn unknown_products_become_validation_errors() {
        let err = CheckoutError::from(CatalogError::NotFound(ProductId::new("x")));
        assert!(err.is_validation());

        let err = CheckoutError::from(CatalogError::Read("503".to_string()));
        assert!(!err.is_validation());
    }
}
