//! Persisted record types.

use chrono::{DateTime, Utc};
use common::{CartId, Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

/// A line in a user's cart.
///
/// Once consumed by a checkout the line is marked `processed` and no
/// longer shows up in cart reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub cart_id: CartId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub processed: bool,
}

/// A product as owned by the product service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub product_id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    /// Discount percentage in `0.0..=100.0`.
    pub discount: f64,
    pub quantity: i64,
    /// Cached `quantity > 0`, recomputed on every quantity change.
    pub in_stock: bool,
}

impl Product {
    /// Returns the stock view of this product.
    pub fn stock(&self) -> StockRecord {
        StockRecord {
            product_id: self.product_id,
            quantity: self.quantity,
            in_stock: self.in_stock,
        }
    }
}

/// Fields for inserting a product.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub discount: f64,
    pub quantity: i64,
}

impl NewProduct {
    /// Creates a product definition with no description.
    pub fn new(name: impl Into<String>, price: Money, discount: f64, quantity: i64) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            price,
            discount,
            quantity,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Available quantity of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub product_id: ProductId,
    pub quantity: i64,
    pub in_stock: bool,
}

/// Fields for inserting an order. Orders always start unpaid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub customer_id: UserId,
    pub cart_line_ids: Vec<CartId>,
    pub sub_total: Money,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
}

/// A persisted order.
///
/// `cart_line_ids` is a frozen copy: the referenced cart lines may later be
/// processed or deleted, the order's own totals stay authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub customer_id: UserId,
    pub cart_line_ids: Vec<CartId>,
    pub sub_total: Money,
    pub discount_amount: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
