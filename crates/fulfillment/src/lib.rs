//! Order fulfillment for completed payments.
//!
//! This crate orchestrates what happens after the payment provider reports a
//! paid checkout session:
//! 1. Verify the webhook signature
//! 2. Re-fetch the session and extract its line items
//! 3. Decrement catalog stock per item (best-effort)
//! 4. Record the order in the ledger (at most once per order id)
//! 5. Announce the order on the operations channel
//!
//! It also provides the reconciliation job that audits recent payments
//! against the ledger, and the checkout service that validates carts before
//! a payment session is created.

pub mod checkout;
pub mod error;
pub mod locks;
pub mod reconciliation;
pub mod services;
pub mod signature;
pub mod state;
pub mod workflow;

pub use checkout::{CartItem, CheckoutService, CheckoutSettings, StockStatus};
pub use error::{
    CatalogError, CheckoutError, FulfillmentError, LedgerError, PaymentError,
    ReconciliationError, SignatureError,
};
pub use locks::KeyedLocks;
pub use reconciliation::{Mismatch, ReconciliationJob, ReconciliationReport, ReconciliationSettings};
pub use services::{
    AppendOutcome, CatalogClient, CheckoutLineItem, CheckoutRequest, CheckoutSession,
    InMemoryCatalog, InMemoryLedger, InMemoryPaymentProvider, LedgerClient, Notifier,
    PaymentProvider, RecordingNotifier, Services, StockChange, append_if_absent, read_modify_write,
};
pub use signature::{SIGNATURE_HEADER, SignatureVerifier};
pub use state::FulfillmentState;
pub use workflow::{
    FulfillmentOutcome, FulfillmentReport, FulfillmentWorkflow, StockAdjustment, WorkflowSettings,
};
