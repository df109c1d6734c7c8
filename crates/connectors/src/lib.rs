//! HTTP implementations of the fulfillment collaborators.
//!
//! - `StripeClient`: checkout sessions on the payment provider
//! - `MicroCmsCatalog`: products and stock in the headless CMS
//! - `SheetsLedger`: order rows in a spreadsheet
//! - `SlackNotifier`: messages to an incoming webhook
//!
//! Every client is built with a request timeout; a timed-out call fails like
//! any other transport error.

pub mod error;
mod http;
pub mod microcms;
pub mod sheets;
pub mod slack;
pub mod stripe;

pub use error::{ConnectorError, Result};
pub use microcms::{MicroCmsCatalog, MicroCmsConfig};
pub use sheets::{SheetsConfig, SheetsLedger};
pub use slack::SlackNotifier;
pub use stripe::{StripeClient, StripeConfig};
