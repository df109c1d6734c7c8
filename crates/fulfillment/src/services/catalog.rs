//! Catalog client trait and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use common::ProductId;
use domain::Product;
use tokio::sync::RwLock;

use crate::error::CatalogError;

/// Stock level before and after a decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockChange {
    pub previous: u32,
    pub current: u32,
}

/// Trait for reading products and adjusting their stock.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Reads a product by id.
    async fn get_product(&self, id: &ProductId) -> Result<Product, CatalogError>;

    /// Overwrites a product's stock.
    async fn set_stock(&self, id: &ProductId, stock: u32) -> Result<(), CatalogError>;

    /// Removes `quantity` units, flooring the stock at zero.
    ///
    /// Implementations must make this behave as one step for concurrent
    /// callers in this process. The default is an unguarded read-modify-write.
    async fn decrement_stock(
        &self,
        id: &ProductId,
        quantity: u32,
    ) -> Result<StockChange, CatalogError> {
        read_modify_write(self, id, quantity).await
    }
}

/// Reads the current stock, subtracts `quantity` (floored at zero) and writes it back.
pub async fn read_modify_write<C: CatalogClient + ?Sized>(
    catalog: &C,
    id: &ProductId,
    quantity: u32,
) -> Result<StockChange, CatalogError> {
    let product = catalog.get_product(id).await?;
    let current = product.stock.saturating_sub(quantity);
    catalog.set_stock(id, current).await?;
    Ok(StockChange {
        previous: product.stock,
        current,
    })
}

#[derive(Debug, Default)]
struct InMemoryCatalogState {
    products: HashMap<ProductId, Product>,
    fail_on_read: bool,
    fail_on_write: HashSet<ProductId>,
    reads: usize,
    writes: usize,
}

/// In-memory catalog for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<InMemoryCatalogState>>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a product.
    pub async fn insert(&self, product: Product) {
        self.state
            .write()
            .await
            .products
            .insert(product.id.clone(), product);
    }

    /// Returns the stock of a product, if it exists.
    pub async fn stock(&self, id: &ProductId) -> Option<u32> {
        self.state.read().await.products.get(id).map(|p| p.stock)
    }

    /// Configures every read to fail.
    pub async fn set_fail_on_read(&self, fail: bool) {
        self.state.write().await.fail_on_read = fail;
    }

    /// Configures stock writes for one product to fail.
    pub async fn set_fail_on_write(&self, id: &ProductId, fail: bool) {
        let mut state = self.state.write().await;
        if fail {
            state.fail_on_write.insert(id.clone());
        } else {
            state.fail_on_write.remove(id);
        }
    }

    /// Returns the number of read and write calls served (including failed ones).
    pub async fn call_count(&self) -> usize {
        let state = self.state.read().await;
        state.reads + state.writes
    }
}

impl InMemoryCatalogState {
    fn read(&mut self, id: &ProductId) -> Result<Product, CatalogError> {
        self.reads += 1;
        if self.fail_on_read {
            return Err(CatalogError::Read("catalog unavailable".to_string()));
        }
        self.products
            .get(id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(id.clone()))
    }

    fn write(&mut self, id: &ProductId, stock: u32) -> Result<(), CatalogError> {
        self.writes += 1;
        if self.fail_on_write.contains(id) {
            return Err(CatalogError::Write {
                product_id: id.clone(),
                reason: "write rejected".to_string(),
            });
        }
        let product = self
            .products
            .get_mut(id)
            .ok_or_else(|| CatalogError::NotFound(id.clone()))?;
        product.stock = stock;
        Ok(())
    }
}

#[async_trait]
impl CatalogClient for InMemoryCatalog {
    async fn get_product(&self, id: &ProductId) -> Result<Product, CatalogError> {
        self.state.write().await.read(id)
    }

    async fn set_stock(&self, id: &ProductId, stock: u32) -> Result<(), CatalogError> {
        self.state.write().await.write(id, stock)
    }

    async fn decrement_stock(
        &self,
        id: &ProductId,
        quantity: u32,
    ) -> Result<StockChange, CatalogError> {
        let mut state = self.state.write().await;
        let previous = state.read(id)?.stock;
        let current = previous.saturating_sub(quantity);
        state.write(id, current)?;
        Ok(StockChange { previous, current })
    }
}
