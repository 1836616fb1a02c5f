//! Cart Mutation Guard.

mod lock;
mod service;

pub use lock::{KeyGuard, KeyedLock};
pub use service::{CartService, RemoveOutcome};

use common::{CartId, ProductId};
use serde::{Deserialize, Serialize};
use store::StoreError;
use thiserror::Error;

/// Direction of a quantity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantityMethod {
    Add,
    Subtract,
}

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The line is absent, processed, or owned by another user.
    #[error("Cart item not found: {0}")]
    CartItemNotFound(CartId),

    /// The product to add is absent or deleted.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The line would hold more units than the product has in stock.
    #[error("Product {product_id} has {available} in stock, cart would hold {requested}")]
    OutOfStock {
        product_id: ProductId,
        available: i64,
        requested: u32,
    },

    /// The requested quantity cannot be taken from the line.
    #[error("Invalid quantity: requested {requested}, line holds {available}")]
    InvalidQuantity { requested: u32, available: u32 },

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
