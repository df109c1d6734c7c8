//! HTTP handlers.

pub mod checkout;
pub mod health;
pub mod metrics;
pub mod reconciliation;
pub mod stock;
pub mod webhook;
