//! Operator-facing messages for the operations channel.

use crate::order::OrderRecord;

/// Formats the new-order announcement for a recorded order.
///
/// Amounts are printed in minor units followed by the upper-cased currency.
pub fn order_summary(record: &OrderRecord, currency: &str) -> String {
    let currency = currency.to_ascii_uppercase();
    let items = record
        .items
        .iter()
        .map(|item| {
            format!(
                "  - {} x{} ({} {})",
                item.name, item.quantity, item.unit_price, currency
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    [
        "New order received".to_string(),
        format!("Order ID: {}", record.order_id),
        format!(
            "Customer: {} ({})",
            record.customer_name, record.customer_email
        ),
        format!(
            "Ship to: {} {}",
            record.postal_code, record.shipping_address
        ),
        String::new(),
        "Items:".to_string(),
        items,
        String::new(),
        format!("Total: {} {}", record.total, currency),
        format!(
            "Inventory: {}",
            if record.inventory_updated {
                "updated"
            } else {
                "update failed for at least one item"
            }
        ),
        format!("Ordered at: {}", record.created_at.to_rfc3339()),
        format!("Payment: {}", record.dashboard_url),
    ]
    .join("\n")
}

/// Formats an error report with the context it happened in.
pub fn error_report(context: &str, error: &str) -> String {
    format!("Error in checkout backend\n\nContext: {context}\nError: {error}")
}
