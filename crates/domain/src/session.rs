//! Payment provider records: checkout sessions and webhook events.

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, SessionId};
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Event type emitted by the provider when a checkout session is paid.
pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";

/// A webhook notification from the payment provider.
///
/// Only the fields needed to locate the authoritative session are decoded;
/// the embedded object is never trusted beyond its id.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: PaymentEventData,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentEventData {
    pub object: EventObject,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EventObject {
    pub id: String,
}

impl PaymentEvent {
    /// Returns true if this event reports a completed checkout session.
    pub fn is_checkout_completed(&self) -> bool {
        self.event_type == CHECKOUT_SESSION_COMPLETED
    }

    /// Returns the id of the object embedded in the event.
    pub fn session_id(&self) -> SessionId {
        SessionId::new(self.data.object.id.clone())
    }
}

/// The provider's authoritative record of one checkout attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    /// Payment reference; present once the session has been paid.
    pub payment_reference: Option<String>,
    pub amount_total: Money,
    pub currency: String,
    pub customer: CustomerDetails,
    pub shipping: Option<ShippingDetails>,
    pub line_items: Vec<LineItem>,
    pub created: DateTime<Utc>,
}

impl Session {
    /// Returns the order id derived from the payment reference, if any.
    pub fn order_id(&self) -> Option<OrderId> {
        self.payment_reference
            .as_deref()
            .filter(|r| !r.is_empty())
            .map(OrderId::new)
    }

    /// Name to ship to: the shipping name, falling back to the customer name.
    pub fn recipient_name(&self) -> &str {
        self.shipping
            .as_ref()
            .and_then(|s| s.name.as_deref())
            .or(self.customer.name.as_deref())
            .unwrap_or_default()
    }
}

/// Buyer contact details collected by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// Shipping recipient and address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDetails {
    pub name: Option<String>,
    pub address: Option<Address>,
}

/// Structured postal address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub postal_code: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub country: Option<String>,
}

impl Address {
    /// Single-line address, largest region first, empty parts skipped.
    pub fn one_line(&self) -> String {
        [&self.state, &self.city, &self.line1, &self.line2]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One purchased product within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Catalog product reference; `None` when the provider-side link is missing.
    pub product_id: Option<ProductId>,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
}

impl LineItem {
    /// Returns the catalog product to adjust, if the item is linked and non-empty.
    pub fn stock_target(&self) -> Option<&ProductId> {
        self.product_id
            .as_ref()
            .filter(|id| !id.is_empty() && self.quantity > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_completed_event() {
        let raw = r#"{
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": { "id": "cs_test_1", "amount_total": 2000 } }
        }"#;
        let event: PaymentEvent = serde_json::from_str(raw).unwrap();
        assert!(event.is_checkout_completed());
        assert_eq!(event.session_id(), SessionId::new("cs_test_1"));
    }

    #[test]
    fn other_event_types_are_not_completions() {
        let raw = r#"{"id":"evt_2","type":"payment_intent.created","data":{"object":{"id":"pi_1"}}}"#;
        let event: PaymentEvent = serde_json::from_str(raw).unwrap();
        assert!(!event.is_checkout_completed());
    }

    #[test]
    fn address_one_line_skips_missing_parts() {
        let address = Address {
            postal_code: Some("150-0001".to_string()),
            state: Some("Tokyo".to_string()),
            city: Some("Shibuya".to_string()),
            line1: Some("1-2-3".to_string()),
            line2: None,
            country: Some("JP".to_string()),
        };
        assert_eq!(address.one_line(), "Tokyo Shibuya 1-2-3");
        assert_eq!(Address::default().one_line(), "");
    }

    #[test]
    fn stock_target_requires_reference_and_quantity() {
        let mut item = LineItem {
            product_id: Some(ProductId::new("A")),
            name: "Vase".to_string(),
            unit_price: Money::from_minor(1000),
            quantity: 2,
        };
        assert_eq!(item.stock_target(), Some(&ProductId::new("A")));

        item.quantity = 0;
        assert!(item.stock_target().is_none());

        item.quantity = 1;
        item.product_id = Some(ProductId::new(""));
        assert!(item.stock_target().is_none());

        item.product_id = None;
        assert!(item.stock_target().is_none());
    }
}
