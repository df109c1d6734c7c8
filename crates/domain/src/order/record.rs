//! The durable fulfillment record written once per paid order.

use chrono::{DateTime, FixedOffset};
use common::OrderId;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::money::Money;
use crate::session::{LineItem, Session};

/// Shipping status of a recorded order.
///
/// The fulfillment workflow always writes `Unshipped`; operators move rows
/// forward by editing the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    #[default]
    Unshipped,
    Shipped,
    Cancelled,
}

impl OrderStatus {
    /// Returns the status as stored in the ledger.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Unshipped => "unshipped",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unshipped" => Ok(OrderStatus::Unshipped),
            "shipped" => Ok(OrderStatus::Shipped),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

/// One purchased line as recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl From<&LineItem> for OrderItem {
    fn from(item: &LineItem) -> Self {
        Self {
            name: item.name.clone(),
            quantity: item.quantity,
            unit_price: item.unit_price,
        }
    }
}

/// The ledger's record of one paid order.
///
/// Written once by the fulfillment workflow and never mutated by it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: OrderId,
    pub created_at: DateTime<FixedOffset>,
    pub items: Vec<OrderItem>,
    pub total: Money,
    pub customer_email: String,
    pub postal_code: String,
    pub shipping_address: String,
    pub customer_name: String,
    pub phone: String,
    pub status: OrderStatus,
    /// True only if every line item's stock decrement succeeded.
    pub inventory_updated: bool,
    pub notes: String,
    pub dashboard_url: String,
}

impl OrderRecord {
    /// Builds the record for a paid session.
    ///
    /// The order id is the session's payment reference; `offset` is the zone
    /// the creation time is recorded in and `dashboard_base` the provider
    /// dashboard root used to link the payment.
    pub fn for_session(
        session: &Session,
        inventory_updated: bool,
        offset: FixedOffset,
        dashboard_base: &str,
    ) -> Result<Self, DomainError> {
        let order_id = session
            .order_id()
            .ok_or_else(|| DomainError::MissingPaymentReference(session.id.clone()))?;

        let address = session.shipping.as_ref().and_then(|s| s.address.as_ref());

        Ok(Self {
            dashboard_url: format!(
                "{}/payments/{}",
                dashboard_base.trim_end_matches('/'),
                order_id
            ),
            order_id,
            created_at: session.created.with_timezone(&offset),
            items: session.line_items.iter().map(OrderItem::from).collect(),
            total: session.amount_total,
            customer_email: session.customer.email.clone().unwrap_or_default(),
            postal_code: address
                .and_then(|a| a.postal_code.clone())
                .unwrap_or_default(),
            shipping_address: address.map(|a| a.one_line()).unwrap_or_default(),
            customer_name: session.recipient_name().to_string(),
            phone: session.customer.phone.clone().unwrap_or_default(),
            status: OrderStatus::Unshipped,
            inventory_updated,
            notes: String::new(),
        })
    }
}
