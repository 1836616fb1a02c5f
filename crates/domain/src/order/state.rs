//! Order state machine.

use serde::{Deserialize, Serialize};
use store::Order;

/// The state of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// Created ──► Paid
/// ```
/// An order whose payment never succeeds stays `Created`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderState {
    /// Order is persisted and unpaid.
    #[default]
    Created,

    /// Payment confirmed (terminal state).
    Paid,
}

impl OrderState {
    /// Derives the state of a stored order.
    pub fn of(order: &Order) -> Self {
        if order.is_paid {
            OrderState::Paid
        } else {
            OrderState::Created
        }
    }

    /// Returns true if the order can be marked paid in this state.
    pub fn can_mark_paid(&self) -> bool {
        matches!(self, OrderState::Created)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderState::Paid)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Created => "Created",
            OrderState::Paid => "Paid",
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
