//! Checkout error types.

use common::{CartId, ProductId};
use domain::OrderError;
use thiserror::Error;

use crate::clients::ClientError;

/// Errors that abort a checkout. Every variant is raised before the order
/// exists, except [`CheckoutError::Persistence`] which reports the order
/// write itself.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// No bearer token was supplied.
    #[error("Unauthorized: missing bearer token")]
    Unauthorized,

    /// The request named no cart lines.
    #[error("At least one cart line is required")]
    NoCartLines,

    /// The request named the same cart line twice.
    #[error("Duplicate cart line: {0}")]
    DuplicateCartLine(CartId),

    /// A cart line is absent, processed, or owned by another user.
    #[error("Cart item not found: {0}")]
    CartItemNotFound(CartId),

    /// A line references a product the product service does not know.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// A line asks for more than the product has in stock.
    #[error("Product {product_id} is out of stock: available {available}, requested {requested}")]
    OutOfStock {
        product_id: ProductId,
        available: i64,
        requested: u32,
    },

    /// A required remote call failed.
    #[error("Checkout step '{step}' failed: {source}")]
    Downstream {
        step: &'static str,
        #[source]
        source: ClientError,
    },

    /// The order could not be written.
    #[error("Failed to persist order: {0}")]
    Persistence(#[from] OrderError),
}

/// Classification of checkout failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Stock,
    Downstream,
    Persistence,
    Unauthorized,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Stock => "stock",
            ErrorKind::Downstream => "downstream",
            ErrorKind::Persistence => "persistence",
            ErrorKind::Unauthorized => "unauthorized",
        }
    }
}

impl CheckoutError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CheckoutError::Unauthorized => ErrorKind::Unauthorized,
            CheckoutError::NoCartLines | CheckoutError::DuplicateCartLine(_) => {
                ErrorKind::Validation
            }
            CheckoutError::CartItemNotFound(_) | CheckoutError::ProductNotFound(_) => {
                ErrorKind::NotFound
            }
            CheckoutError::OutOfStock { .. } => ErrorKind::Stock,
            CheckoutError::Downstream { .. } => ErrorKind::Downstream,
            CheckoutError::Persistence(_) => ErrorKind::Persistence,
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(CheckoutError::Unauthorized.kind(), ErrorKind::Unauthorized);
        assert_eq!(CheckoutError::NoCartLines.kind(), ErrorKind::Validation);
        assert_eq!(
            CheckoutError::DuplicateCartLine(CartId::new(1)).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            CheckoutError::ProductNotFound(ProductId::new(1)).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            CheckoutError::OutOfStock {
                product_id: ProductId::new(1),
                available: 1,
                requested: 2
            }
            .kind(),
            ErrorKind::Stock
        );
        assert_eq!(
            CheckoutError::Downstream {
                step: crate::steps::STEP_FETCH_CART,
                source: ClientError::Status {
                    service: "cart",
                    status: 500
                }
            }
            .kind(),
            ErrorKind::Downstream
        );
        assert_eq!(
            CheckoutError::Persistence(OrderError::NoCartLines).kind(),
            ErrorKind::Persistence
        );
    }
}
