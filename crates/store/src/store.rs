use async_trait::async_trait;
use common::{CartId, OrderId, ProductId, UserId};

use crate::{CartLine, NewOrder, NewProduct, Order, Product, Result, StockRecord};

/// Storage for cart lines.
///
/// Implementations do not serialize mutations; callers that need
/// read-modify-write consistency hold a lock around the sequence.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Inserts a new, non-processed line.
    async fn insert_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartLine>;

    /// Loads a line by id, processed or not.
    async fn get_line(&self, cart_id: CartId) -> Result<Option<CartLine>>;

    /// Finds the non-processed line for `(user_id, product_id)`, if any.
    async fn find_open_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<CartLine>>;

    /// Returns the user's non-processed lines ordered by cart id.
    async fn open_lines_for_user(&self, user_id: UserId) -> Result<Vec<CartLine>>;

    /// Overwrites the quantity of a line.
    async fn set_quantity(&self, cart_id: CartId, quantity: u32) -> Result<CartLine>;

    /// Deletes a line.
    async fn delete_line(&self, cart_id: CartId) -> Result<()>;

    /// Marks the given non-processed lines of `user_id` as processed.
    ///
    /// Returns the number of lines flipped. Ids that are unknown, already
    /// processed, or owned by another user are skipped.
    async fn mark_processed(&self, user_id: UserId, cart_ids: &[CartId]) -> Result<u64>;
}

/// Storage for products and their stock.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Inserts a product. `in_stock` is derived from the quantity.
    async fn insert_product(&self, product: NewProduct) -> Result<Product>;

    /// Loads a product. Soft-deleted products are reported as absent.
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>>;

    /// Soft-deletes a product.
    async fn soft_delete_product(&self, product_id: ProductId) -> Result<()>;

    /// Atomically adds `delta` to the product's quantity and recomputes
    /// `in_stock` in the same update.
    ///
    /// Fails with `NotFound` for absent or soft-deleted products and with
    /// `InsufficientStock` if the result would be negative, in which case
    /// nothing is written.
    async fn adjust_quantity(&self, product_id: ProductId, delta: i64) -> Result<StockRecord>;
}

/// Storage for orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new unpaid order and assigns its id.
    async fn create_order(&self, order: NewOrder) -> Result<Order>;

    /// Sets `is_paid` and bumps `updated_at`.
    async fn mark_paid(&self, order_id: OrderId) -> Result<Order>;

    /// Loads an order by id.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Returns a customer's orders, oldest first.
    async fn orders_for_customer(&self, customer_id: UserId) -> Result<Vec<Order>>;
}
