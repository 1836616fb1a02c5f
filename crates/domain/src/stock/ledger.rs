use common::{Money, ProductId};
use serde::{Deserialize, Serialize};
use store::{NewProduct, Product, ProductStore, StockRecord};

use super::StockError;
use crate::cart::QuantityMethod;

/// What the cart and checkout flows need to know about a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartProduct {
    #[serde(rename = "id")]
    pub product_id: ProductId,
    pub product_name: String,
    pub description: String,
    pub price: Money,
    pub quantity: i64,
    pub discount: f64,
}

impl From<Product> for CartProduct {
    fn from(p: Product) -> Self {
        Self {
            product_id: p.product_id,
            product_name: p.name,
            description: p.description,
            price: p.price,
            quantity: p.quantity,
            discount: p.discount,
        }
    }
}

/// Guarded access to product stock.
///
/// Quantity only ever changes through [`StockLedger::adjust_quantity`],
/// which relies on the store's single-statement conditional update.
pub struct StockLedger<S: ProductStore> {
    store: S,
}

impl<S: ProductStore> StockLedger<S> {
    /// Creates a new ledger over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Adds `delta` to the product's quantity. Negative deltas reserve
    /// stock, positive deltas release it.
    #[tracing::instrument(skip(self))]
    pub async fn adjust_quantity(
        &self,
        product_id: ProductId,
        delta: i64,
    ) -> Result<StockRecord, StockError> {
        match self.store.adjust_quantity(product_id, delta).await {
            Ok(record) => {
                metrics::counter!("stock_adjustments_total", "outcome" => "applied").increment(1);
                tracing::debug!(
                    quantity = record.quantity,
                    in_stock = record.in_stock,
                    "stock adjusted"
                );
                Ok(record)
            }
            Err(e) => {
                let err = StockError::from(e);
                if matches!(err, StockError::OutOfStock { .. }) {
                    metrics::counter!("stock_adjustments_total", "outcome" => "rejected")
                        .increment(1);
                }
                tracing::warn!(error = %err, "stock adjustment failed");
                Err(err)
            }
        }
    }

    /// Applies an add or subtract request of `quantity` units.
    pub async fn apply(
        &self,
        product_id: ProductId,
        method: QuantityMethod,
        quantity: u32,
    ) -> Result<StockRecord, StockError> {
        if quantity == 0 {
            return Err(StockError::ZeroQuantity);
        }
        let delta = match method {
            QuantityMethod::Add => i64::from(quantity),
            QuantityMethod::Subtract => -i64::from(quantity),
        };
        self.adjust_quantity(product_id, delta).await
    }

    /// Reads the current stock without reserving anything.
    #[tracing::instrument(skip(self))]
    pub async fn check_stock(&self, product_id: ProductId) -> Result<StockRecord, StockError> {
        Ok(self.load(product_id).await?.stock())
    }

    /// Returns the product's cart-facing view.
    #[tracing::instrument(skip(self))]
    pub async fn product_for_cart(&self, product_id: ProductId) -> Result<CartProduct, StockError> {
        Ok(self.load(product_id).await?.into())
    }

    /// Adds a product to the catalogue.
    #[tracing::instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create_product(&self, product: NewProduct) -> Result<Product, StockError> {
        Ok(self.store.insert_product(product).await?)
    }

    /// Soft-deletes a product. Its stock can no longer be adjusted.
    #[tracing::instrument(skip(self))]
    pub async fn delete_product(&self, product_id: ProductId) -> Result<(), StockError> {
        Ok(self.store.soft_delete_product(product_id).await?)
    }

    async fn load(&self, product_id: ProductId) -> Result<Product, StockError> {
        self.store
            .get_product(product_id)
            .await?
            .ok_or(StockError::ProductNotFound(product_id))
    }
}
