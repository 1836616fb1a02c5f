//! Domain error types.

use store::StoreError;
use thiserror::Error;

use crate::cart::CartError;
use crate::order::OrderError;
use crate::stock::StockError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the cart service.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// An error occurred in the stock ledger.
    #[error(transparent)]
    Stock(#[from] StockError),

    /// An error occurred in the order service.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
