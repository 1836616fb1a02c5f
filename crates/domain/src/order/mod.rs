//! Orders and their payment state.

mod service;
mod state;

pub use service::OrderService;
pub use state::OrderState;

use common::OrderId;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Order not found, or owned by another customer.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Order is not in the expected state.
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: OrderState,
        action: &'static str,
    },

    /// Order has no cart lines.
    #[error("Order has no cart lines")]
    NoCartLines,

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
