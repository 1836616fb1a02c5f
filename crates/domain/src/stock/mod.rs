//! Stock Ledger Guard.

mod ledger;

pub use ledger::{CartProduct, StockLedger};

use common::ProductId;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during stock operations.
#[derive(Debug, Error)]
pub enum StockError {
    /// The product does not exist or has been soft-deleted.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// A decrement would take the quantity below zero.
    #[error("Product {product_id} is out of stock: available {available}, requested {requested}")]
    OutOfStock {
        product_id: ProductId,
        available: i64,
        requested: i64,
    },

    /// The quantity in a request was zero.
    #[error("Quantity must be greater than 0")]
    ZeroQuantity,

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for StockError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { id, .. } => StockError::ProductNotFound(ProductId::new(id)),
            StoreError::InsufficientStock {
                product_id,
                available,
                requested,
            } => StockError::OutOfStock {
                product_id,
                available,
                requested,
            },
            other => StockError::Store(other),
        }
    }
}
