//! Cart validation and checkout session creation.

use common::ProductId;
use domain::Product;
use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, CheckoutError};
use crate::services::{CheckoutLineItem, CheckoutRequest, CheckoutSession, Services};

/// Placeholder the provider replaces with the session id on redirect.
const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

/// One line of a buyer's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Current availability of one product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockStatus {
    pub stock: u32,
    pub is_active: bool,
}

/// Settings for checkout session creation.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// Lower-case ISO currency code for every price.
    pub currency: String,
    /// Countries the buyer may ship to.
    pub allowed_countries: Vec<String>,
    /// Origin of the storefront; redirect URLs are built from it.
    pub public_origin: String,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            currency: "jpy".to_string(),
            allowed_countries: vec!["JP".to_string()],
            public_origin: "http://localhost:3000".to_string(),
        }
    }
}

/// Validates carts against the catalog and opens provider sessions.
pub struct CheckoutService {
    services: Services,
    settings: CheckoutSettings,
}

impl CheckoutService {
    /// Creates a checkout service over the given collaborators.
    pub fn new(services: Services, settings: CheckoutSettings) -> Self {
        Self { services, settings }
    }

    /// Validates `items` and creates a checkout session for them.
    ///
    /// Stops at the first invalid line, before the provider is called.
    #[tracing::instrument(skip(self, items), fields(lines = items.len()))]
    pub async fn create_session(&self, items: &[CartItem]) -> Result<CheckoutSession, CheckoutError> {
        let products = match self.validate(items).await {
            Ok(products) => products,
            Err(e) => {
                if e.is_validation() {
                    tracing::info!(error = %e, "cart rejected");
                    metrics::counter!("checkout_rejections_total").increment(1);
                }
                return Err(e);
            }
        };

        let origin = self.settings.public_origin.trim_end_matches('/');
        let request = CheckoutRequest {
            line_items: items
                .iter()
                .zip(products)
                .map(|(item, product)| CheckoutLineItem {
                    product_id: product.id,
                    name: product.name,
                    description: product.description,
                    image_url: product.image_url,
                    unit_amount: product.price,
                    quantity: item.quantity,
                })
                .collect(),
            currency: self.settings.currency.clone(),
            success_url: format!("{origin}/checkout/success?session_id={SESSION_ID_PLACEHOLDER}"),
            cancel_url: format!("{origin}/checkout/cancel"),
            allowed_countries: self.settings.allowed_countries.clone(),
        };

        let session = self.services.payments.create_checkout_session(request).await?;
        metrics::counter!("checkout_sessions_created_total").increment(1);
        tracing::info!(session_id = %session.id, "checkout session created");
        Ok(session)
    }

    /// Returns the stock and sale state of one product.
    pub async fn stock_status(&self, id: &ProductId) -> Result<StockStatus, CatalogError> {
        let product = self.services.catalog.get_product(id).await?;
        Ok(StockStatus {
            stock: product.stock,
            is_active: product.is_active,
        })
    }

    async fn validate(&self, items: &[CartItem]) -> Result<Vec<Product>, CheckoutError> {
        if items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        if let Some(item) = items.iter().find(|i| i.quantity == 0) {
            return Err(CheckoutError::InvalidQuantity(item.product_id.clone()));
        }

        let catalog = &self.services.catalog;
        let products = try_join_all(items.iter().map(|i| catalog.get_product(&i.product_id))).await?;

        for (item, product) in items.iter().zip(&products) {
            if !product.is_active {
                return Err(CheckoutError::Inactive {
                    name: product.name.clone(),
                });
            }
            if !product.can_fulfill(item.quantity) {
                return Err(CheckoutError::InsufficientStock {
                    name: product.name.clone(),
                    available: product.stock,
                });
            }
        }

        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{
        InMemoryCatalog, InMemoryLedger, InMemoryPaymentProvider, RecordingNotifier,
    };
    use domain::Money;
    use std::sync::Arc;

    struct Fixture {
        service: CheckoutService,
        catalog: InMemoryCatalog,
        payments: InMemoryPaymentProvider,
    }

    async fn setup() -> Fixture {
        let catalog = InMemoryCatalog::new();
        let payments = InMemoryPaymentProvider::new();
        for (id, stock, is_active) in [("A", 5, true), ("B", 1, true), ("C", 10, false)] {
            catalog
                .insert(Product {
                    id: ProductId::new(id),
                    name: format!("Product {id}"),
                    price: Money::from_minor(1000),
                    stock,
                    is_active,
                    description: Some("Hand-made".to_string()),
                    image_url: None,
                })
                .await;
        }

        let services = Services {
            catalog: Arc::new(catalog.clone()),
            ledger: Arc::new(InMemoryLedger::new()),
            payments: Arc::new(payments.clone()),
            notifier: Arc::new(RecordingNotifier::new()),
        };
        let settings = CheckoutSettings {
            public_origin: "https://shop.test/".to_string(),
            ..Default::default()
        };
        Fixture {
            service: CheckoutService::new(services, settings),
            catalog,
            payments,
        }
    }

    fn cart(lines: &[(&str, u32)]) -> Vec<CartItem> {
        lines
            .iter()
            .map(|(id, quantity)| CartItem {
                product_id: ProductId::new(*id),
                quantity: *quantity,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_creates_session_with_price_data() {
        let f = setup().await;
        let session = f
            .service
            .create_session(&cart(&[("A", 2), ("B", 1)]))
            .await
            .unwrap();
        assert!(!session.url.is_empty());

        let requests = f.payments.created_requests().await;
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.currency, "jpy");
        assert_eq!(request.allowed_countries, vec!["JP".to_string()]);
        assert_eq!(
            request.success_url,
            "https://shop.test/checkout/success?session_id={CHECKOUT_SESSION_ID}"
        );
        assert_eq!(request.cancel_url, "https://shop.test/checkout/cancel");
        assert_eq!(request.line_items.len(), 2);
        assert_eq!(request.line_items[0].product_id, ProductId::new("A"));
        assert_eq!(request.line_items[0].quantity, 2);
        assert_eq!(request.line_items[0].unit_amount, Money::from_minor(1000));
        assert_eq!(request.line_items[0].description.as_deref(), Some("Hand-made"));
    }

    #[tokio::test]
    async fn test_insufficient_stock_names_item() {
        let f = setup().await;
        let err = f
            .service
            .create_session(&cart(&[("A", 1), ("B", 2)]))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("Product B"));
        assert!(f.payments.created_requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_invalid_carts() {
        let f = setup().await;
        assert!(matches!(
            f.service.create_session(&[]).await,
            Err(CheckoutError::EmptyCart)
        ));
        assert!(matches!(
            f.service.create_session(&cart(&[("A", 0)])).await,
            Err(CheckoutError::InvalidQuantity(_))
        ));
        assert!(matches!(
            f.service.create_session(&cart(&[("C", 1)])).await,
            Err(CheckoutError::Inactive { .. })
        ));
        assert!(matches!(
            f.service.create_session(&cart(&[("missing", 1)])).await,
            Err(CheckoutError::ProductNotFound(_))
        ));
        assert!(f.payments.created_requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_backend_failures_are_not_validation() {
        let f = setup().await;
        f.catalog.set_fail_on_read(true).await;
        let err = f.service.create_session(&cart(&[("A", 1)])).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Catalog(_)));
        assert!(!err.is_validation());

        f.catalog.set_fail_on_read(false).await;
        f.payments.set_fail_on_create(true).await;
        let err = f.service.create_session(&cart(&[("A", 1)])).await.unwrap_err();
        assert!(matches!(err, CheckoutError::Payment(_)));
    }

    #[tokio::test]
    async fn test_stock_status() {
        let f = setup().await;
        let status = f.service.stock_status(&ProductId::new("C")).await.unwrap();
        assert_eq!(
            status,
            StockStatus {
                stock: 10,
                is_active: false
            }
        );
        assert!(matches!(
            f.service.stock_status(&ProductId::new("missing")).await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[test]
    fn test_cart_item_uses_camel_case() {
        let item: CartItem = serde_json::from_str(r#"{"productId":"A","quantity":2}"#).unwrap();
        assert_eq!(item, cart(&[("A", 2)])[0]);
    }
}
