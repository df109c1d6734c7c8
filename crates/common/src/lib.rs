//! Shared identifier types used across the checkout fulfillment crates.

pub mod types;

pub use types::{OrderId, ProductId, SessionId};
