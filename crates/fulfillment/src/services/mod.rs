//! Collaborator traits and in-memory implementations for the fulfillment workflow.

pub mod catalog;
pub mod ledger;
pub mod notifier;
pub mod payment;

use std::sync::Arc;

pub use catalog::{CatalogClient, InMemoryCatalog, StockChange, read_modify_write};
pub use ledger::{AppendOutcome, InMemoryLedger, LedgerClient, append_if_absent};
pub use notifier::{Notifier, RecordingNotifier};
pub use payment::{
    CheckoutLineItem, CheckoutRequest, CheckoutSession, InMemoryPaymentProvider, PaymentProvider,
};

/// The external systems one request talks to.
///
/// Built once at startup and shared by every handler.
#[derive(Clone)]
pub struct Services {
    pub catalog: Arc<dyn CatalogClient>,
    pub ledger: Arc<dyn LedgerClient>,
    pub payments: Arc<dyn PaymentProvider>,
    pub notifier: Arc<dyn Notifier>,
}
