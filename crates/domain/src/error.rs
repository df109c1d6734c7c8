//! Domain error types.

use common::{OrderId, SessionId};
use thiserror::Error;

/// Errors raised while building or decoding domain records.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A completed session carried no payment reference, so no order id can be derived.
    #[error("Session {0} has no payment reference")]
    MissingPaymentReference(SessionId),

    /// A ledger row could not be decoded into an order record.
    #[error("Malformed ledger row for order {order_id}: {reason}")]
    MalformedRow { order_id: OrderId, reason: String },

    /// The configured ledger schema version is not known.
    #[error("Unknown ledger schema version: {0}")]
    UnknownSchemaVersion(String),

    /// An order status string is not recognised.
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),
}
