//! Catalog product as seen by checkout and fulfillment.

use common::ProductId;
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// A catalog product with its sellable state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Unit price in minor units.
    pub price: Money,
    /// Units on hand; never negative.
    pub stock: u32,
    pub is_active: bool,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

impl Product {
    /// Returns true if `quantity` units can be sold right now.
    pub fn can_fulfill(&self, quantity: u32) -> bool {
        self.is_active && self.stock >= quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: u32, is_active: bool) -> Product {
        Product {
            id: ProductId::new("A"),
            name: "Vase".to_string(),
            price: Money::from_minor(1000),
            stock,
            is_active,
            description: None,
            image_url: None,
        }
    }

    #[test]
    fn can_fulfill_requires_active_and_stock() {
        assert!(product(5, true).can_fulfill(5));
        assert!(!product(4, true).can_fulfill(5));
        assert!(!product(5, false).can_fulfill(1));
    }
}
