//! Domain model for the checkout fulfillment backend.
//!
//! This crate holds the data that flows between the payment provider, the
//! catalog, the order ledger and the operations channel:
//! - `Session`, `LineItem` and `PaymentEvent` as observed from the provider
//! - `Product` as read from the catalog
//! - `OrderRecord` and the `LedgerSchema` that maps it to ledger rows
//! - operator-facing message formatting

pub mod error;
pub mod messages;
pub mod money;
pub mod order;
pub mod product;
pub mod session;

pub use common::{OrderId, ProductId, SessionId};
pub use error::DomainError;
pub use money::Money;
pub use order::{LedgerSchema, OrderItem, OrderRecord, OrderStatus};
pub use product::Product;
pub use session::{
    Address, CHECKOUT_SESSION_COMPLETED, CustomerDetails, LineItem, PaymentEvent, Session,
    ShippingDetails,
};
