//! Product catalog backed by the headless CMS content API.

use std::time::Duration;

use async_trait::async_trait;
use common::ProductId;
use domain::{Money, Product};
use fulfillment::{CatalogClient, CatalogError, KeyedLocks, StockChange, read_modify_write};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::http;

const API_KEY_HEADER: &str = "X-MICROCMS-API-KEY";

/// Connection settings for the content API.
#[derive(Clone)]
pub struct MicroCmsConfig {
    pub api_base: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl MicroCmsConfig {
    /// Settings for the hosted service of `service_domain`.
    pub fn for_service(service_domain: &str, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            api_base: format!("https://{service_domain}.microcms.io"),
            api_key: api_key.into(),
            timeout,
        }
    }
}

impl std::fmt::Debug for MicroCmsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MicroCmsConfig")
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Catalog client for the `products` endpoint.
///
/// The API has no conditional update, so stock decrements are serialised
/// per product inside this process.
pub struct MicroCmsCatalog {
    client: Client,
    base: Url,
    api_key: String,
    product_locks: KeyedLocks,
}

impl MicroCmsCatalog {
    /// Creates a catalog client for the given settings.
    pub fn new(config: MicroCmsConfig) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout)?,
            base: http::base_url(&config.api_base)?,
            api_key: config.api_key,
            product_locks: KeyedLocks::new(),
        })
    }

    fn product_url(&self, id: &ProductId) -> Url {
        http::endpoint(&self.base, &["api", "v1", "products", id.as_str()])
    }
}

#[async_trait]
impl CatalogClient for MicroCmsCatalog {
    #[tracing::instrument(skip(self))]
    async fn get_product(&self, id: &ProductId) -> std::result::Result<Product, CatalogError> {
        let response = self
            .client
            .get(self.product_url(id))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| CatalogError::Read(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(id.clone()));
        }
        if !response.status().is_success() {
            let (status, body) = http::failure(response).await;
            tracing::warn!(status, %body, "catalog read failed");
            return Err(CatalogError::Read(format!("HTTP {status}")));
        }

        let wire: WireProduct = response
            .json()
            .await
            .map_err(|e| CatalogError::Read(format!("undecodable product: {e}")))?;
        Ok(wire.into_product())
    }

    #[tracing::instrument(skip(self))]
    async fn set_stock(&self, id: &ProductId, stock: u32) -> std::result::Result<(), CatalogError> {
        let write_error = |reason: String| CatalogError::Write {
            product_id: id.clone(),
            reason,
        };

        let response = self
            .client
            .patch(self.product_url(id))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&StockPatch { stock })
            .send()
            .await
            .map_err(|e| write_error(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(CatalogError::NotFound(id.clone()));
        }
        if !response.status().is_success() {
            let (status, body) = http::failure(response).await;
            tracing::warn!(status, %body, "catalog write failed");
            return Err(write_error(format!("HTTP {status}")));
        }
        Ok(())
    }

    async fn decrement_stock(
        &self,
        id: &ProductId,
        quantity: u32,
    ) -> std::result::Result<StockChange, CatalogError> {
        let _guard = self.product_locks.lock(id.as_str()).await;
        read_modify_write(self, id, quantity).await
    }
}

#[derive(Debug, Serialize)]
struct StockPatch {
    stock: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireProduct {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    price: i64,
    #[serde(default)]
    stock: i64,
    #[serde(default)]
    is_active: bool,
    size: Option<String>,
    #[serde(default)]
    text: Vec<WireText>,
    #[serde(default)]
    images: Vec<WireImage>,
}

#[derive(Debug, Deserialize)]
struct WireText {
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireImage {
    url: String,
}

impl WireProduct {
    fn into_product(self) -> Product {
        let description = self
            .text
            .into_iter()
            .next()
            .and_then(|t| t.description)
            .filter(|d| !d.is_empty())
            .or(self.size.filter(|s| !s.is_empty()));

        Product {
            id: ProductId::new(self.id),
            name: self.name,
            price: Money::from_minor(self.price),
            stock: u32::try_from(self.stock.max(0)).unwrap_or(u32::MAX),
            is_active: self.is_active,
            description,
            image_url: self.images.into_iter().next().map(|i| i.url),
        }
    }
}
