//! Order records and their ledger representation.

mod record;
mod schema;

pub use record::{OrderItem, OrderRecord, OrderStatus};
pub use schema::LedgerSchema;
