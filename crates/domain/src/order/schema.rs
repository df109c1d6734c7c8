//! Column layout of the order ledger sheet.

use chrono::DateTime;
use common::OrderId;
use serde_json::Value;

use super::record::{OrderItem, OrderRecord, OrderStatus};
use crate::error::DomainError;
use crate::money::Money;

/// Versioned row layout of the order ledger.
///
/// Version 1 is a fixed 15-column row (A–O). Multi-item fields hold one
/// line per item, joined with `\n`, in the same order across the name,
/// quantity and price columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LedgerSchema {
    #[default]
    V1,
}

const V1_HEADER: [&str; 15] = [
    "order_id",
    "created_at",
    "item_names",
    "quantities",
    "unit_prices",
    "total",
    "email",
    "postal_code",
    "address",
    "name",
    "phone",
    "status",
    "inventory_updated",
    "notes",
    "dashboard_url",
];

impl LedgerSchema {
    /// Returns the version tag as used in configuration.
    pub fn version(&self) -> &'static str {
        match self {
            LedgerSchema::V1 => "1",
        }
    }

    /// Column headers, in row order.
    pub fn header(&self) -> &'static [&'static str] {
        match self {
            LedgerSchema::V1 => &V1_HEADER,
        }
    }

    /// Number of columns in a row.
    pub fn width(&self) -> usize {
        self.header().len()
    }

    /// Encodes a record as one ledger row.
    pub fn to_row(&self, record: &OrderRecord) -> Vec<Value> {
        match self {
            LedgerSchema::V1 => {
                let names = join_items(&record.items, |i| i.name.clone());
                let quantities = join_items(&record.items, |i| i.quantity.to_string());
                let prices = join_items(&record.items, |i| i.unit_price.to_string());

                vec![
                    Value::from(record.order_id.as_str()),
                    Value::from(record.created_at.to_rfc3339()),
                    Value::from(names),
                    Value::from(quantities),
                    Value::from(prices),
                    Value::from(record.total.minor_units()),
                    Value::from(record.customer_email.as_str()),
                    Value::from(record.postal_code.as_str()),
                    Value::from(record.shipping_address.as_str()),
                    Value::from(record.customer_name.as_str()),
                    Value::from(record.phone.as_str()),
                    Value::from(record.status.as_str()),
                    Value::Bool(record.inventory_updated),
                    Value::from(record.notes.as_str()),
                    Value::from(record.dashboard_url.as_str()),
                ]
            }
        }
    }

    /// Returns the order id cell of a row, if present and non-empty.
    pub fn order_id_of<'a>(&self, row: &'a [String]) -> Option<&'a str> {
        row.first().map(|s| s.trim()).filter(|s| !s.is_empty())
    }

    /// Decodes a ledger row.
    ///
    /// Trailing empty cells may be absent, as the sheet API omits them.
    pub fn from_row(&self, row: &[String]) -> Result<OrderRecord, DomainError> {
        let order_id = self
            .order_id_of(row)
            .map(OrderId::new)
            .ok_or_else(|| DomainError::MalformedRow {
                order_id: OrderId::new(""),
                reason: "missing order id".to_string(),
            })?;
        let cell = |i: usize| row.get(i).map(|s| s.as_str()).unwrap_or_default();
        let malformed = |reason: String| DomainError::MalformedRow {
            order_id: order_id.clone(),
            reason,
        };

        let created_at = DateTime::parse_from_rfc3339(cell(1).trim())
            .map_err(|e| malformed(format!("created_at: {e}")))?;

        let names = split_items(cell(2));
        let quantities = split_items(cell(3))
            .into_iter()
            .map(|q| q.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| malformed(format!("quantities: {e}")))?;
        let prices = split_items(cell(4))
            .into_iter()
            .map(parse_amount)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| malformed(format!("unit_prices: {e}")))?;

        if names.len() != quantities.len() || names.len() != prices.len() {
            return Err(malformed(format!(
                "item columns disagree: {} names, {} quantities, {} prices",
                names.len(),
                quantities.len(),
                prices.len()
            )));
        }

        let items = names
            .into_iter()
            .zip(quantities)
            .zip(prices)
            .map(|((name, quantity), unit_price)| OrderItem {
                name: name.to_string(),
                quantity,
                unit_price,
            })
            .collect();

        let total = parse_amount(cell(5)).map_err(|e| malformed(format!("total: {e}")))?;
        let status = if cell(11).trim().is_empty() {
            OrderStatus::default()
        } else {
            cell(11).parse::<OrderStatus>()?
        };

        Ok(OrderRecord {
            created_at,
            items,
            total,
            customer_email: cell(6).to_string(),
            postal_code: cell(7).to_string(),
            shipping_address: cell(8).to_string(),
            customer_name: cell(9).to_string(),
            phone: cell(10).to_string(),
            status,
            inventory_updated: cell(12).trim().eq_ignore_ascii_case("true"),
            notes: cell(13).to_string(),
            dashboard_url: cell(14).to_string(),
            order_id,
        })
    }
}

impl std::str::FromStr for LedgerSchema {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "v1" => Ok(LedgerSchema::V1),
            other => Err(DomainError::UnknownSchemaVersion(other.to_string())),
        }
    }
}

fn join_items(items: &[OrderItem], f: impl Fn(&OrderItem) -> String) -> String {
    items.iter().map(f).collect::<Vec<_>>().join("\n")
}

fn split_items(cell: &str) -> Vec<&str> {
    if cell.is_empty() {
        Vec::new()
    } else {
        cell.split('\n').collect()
    }
}

// Formatted sheet values may carry thousands separators.
fn parse_amount(cell: &str) -> Result<Money, std::num::ParseIntError> {
    let digits: String = cell.trim().chars().filter(|c| *c != ',').collect();
    digits.parse::<i64>().map(Money::from_minor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn record() -> OrderRecord {
        OrderRecord {
            order_id: OrderId::new("pi_1"),
            created_at: DateTime::parse_from_rfc3339("2026-01-05T12:00:00+09:00").unwrap(),
            items: vec![
                OrderItem {
                    name: "Vase".to_string(),
                    quantity: 2,
                    unit_price: Money::from_minor(1000),
                },
                OrderItem {
                    name: "Cup".to_string(),
                    quantity: 1,
                    unit_price: Money::from_minor(500),
                },
            ],
            total: Money::from_minor(2500),
            customer_email: "buyer@example.com".to_string(),
            postal_code: "150-0001".to_string(),
            shipping_address: "Tokyo Shibuya 1-2-3".to_string(),
            customer_name: "Recipient".to_string(),
            phone: "090".to_string(),
            status: OrderStatus::Unshipped,
            inventory_updated: false,
            notes: String::new(),
            dashboard_url: "https://dash/payments/pi_1".to_string(),
        }
    }

    fn as_cells(row: &[Value]) -> Vec<String> {
        row.iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect()
    }

    #[test]
    fn v1_row_has_fifteen_columns_in_order() {
        let row = LedgerSchema::V1.to_row(&record());
        assert_eq!(row.len(), LedgerSchema::V1.width());
        assert_eq!(row[0], "pi_1");
        assert_eq!(row[2], "Vase\nCup");
        assert_eq!(row[3], "2\n1");
        assert_eq!(row[4], "1000\n500");
        assert_eq!(row[5], 2500);
        assert_eq!(row[11], "unshipped");
        assert_eq!(row[12], false);
        assert_eq!(row[14], "https://dash/payments/pi_1");
    }

    #[test]
    fn decodes_an_encoded_row() {
        let cells = as_cells(&LedgerSchema::V1.to_row(&record()));
        let decoded = LedgerSchema::V1.from_row(&cells).unwrap();
        assert_eq!(decoded, record());
    }

    #[test]
    fn tolerates_omitted_trailing_cells_and_formatted_totals() {
        let cells: Vec<String> = [
            "pi_9",
            "2026-01-05T12:00:00+09:00",
            "Vase",
            "1",
            "1,000",
            "1,000",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let decoded = LedgerSchema::V1.from_row(&cells).unwrap();
        assert_eq!(decoded.total, Money::from_minor(1000));
        assert_eq!(decoded.items[0].unit_price, Money::from_minor(1000));
        assert_eq!(decoded.status, OrderStatus::Unshipped);
        assert!(!decoded.inventory_updated);
        assert_eq!(
            decoded.created_at.offset(),
            &FixedOffset::east_opt(9 * 3600).unwrap()
        );
    }

    #[test]
    fn mismatched_item_columns_are_malformed() {
        let cells: Vec<String> = ["pi_9", "2026-01-05T12:00:00+09:00", "Vase\nCup", "1", "1", "1"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert!(matches!(
            LedgerSchema::V1.from_row(&cells),
            Err(DomainError::MalformedRow { .. })
        ));
    }

    #[test]
    fn order_id_of_ignores_blank_rows() {
        assert_eq!(LedgerSchema::V1.order_id_of(&[]), None);
        assert_eq!(LedgerSchema::V1.order_id_of(&[" ".to_string()]), None);
        assert_eq!(
            LedgerSchema::V1.order_id_of(&["pi_1".to_string()]),
            Some("pi_1")
        );
    }

    #[test]
    fn parses_schema_versions() {
        assert_eq!("1".parse::<LedgerSchema>().unwrap(), LedgerSchema::V1);
        assert_eq!("V1".parse::<LedgerSchema>().unwrap(), LedgerSchema::V1);
        assert!("2".parse::<LedgerSchema>().is_err());
    }
}
