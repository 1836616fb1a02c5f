//! Shared types used across the cart, product and order services.

mod money;
mod types;

pub use money::Money;
pub use types::{CartId, OrderId, ProductId, UserId};
