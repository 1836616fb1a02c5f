//! Order service over an order store.

use common::{CartId, OrderId, UserId};
use store::{NewOrder, Order, OrderStore};

use super::{OrderError, OrderState};
use crate::pricing::OrderTotals;

/// Service for creating and reading orders.
///
/// Orders are created unpaid and change at most once more, when payment
/// is confirmed.
pub struct OrderService<S: OrderStore> {
    store: S,
}

impl<S: OrderStore> OrderService<S> {
    /// Creates a new order service with the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persists a new unpaid order with a frozen copy of the cart line ids.
    #[tracing::instrument(skip(self, cart_line_ids, totals), fields(lines = cart_line_ids.len()))]
    pub async fn create_order(
        &self,
        customer_id: UserId,
        cart_line_ids: Vec<CartId>,
        totals: OrderTotals,
    ) -> Result<Order, OrderError> {
        if cart_line_ids.is_empty() {
            return Err(OrderError::NoCartLines);
        }

        let order = self
            .store
            .create_order(NewOrder {
                customer_id,
                cart_line_ids,
                sub_total: totals.sub_total,
                discount_amount: totals.discount_amount,
                tax_amount: totals.tax_amount,
                total_amount: totals.total_amount,
            })
            .await?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %order.order_id, total = %order.total_amount, "order created");
        Ok(order)
    }

    /// Marks an unpaid order as paid.
    #[tracing::instrument(skip(self))]
    pub async fn mark_paid(&self, order_id: OrderId) -> Result<Order, OrderError> {
        let order = self.get_order(order_id).await?;

        let state = OrderState::of(&order);
        if !state.can_mark_paid() {
            return Err(OrderError::InvalidStateTransition {
                current_state: state,
                action: "mark paid",
            });
        }

        let order = self.store.mark_paid(order_id).await?;
        metrics::counter!("orders_paid_total").increment(1);
        Ok(order)
    }

    /// Loads an order by id.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, OrderError> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))
    }

    /// Loads an order that belongs to `customer_id`.
    #[tracing::instrument(skip(self))]
    pub async fn get_customer_order(
        &self,
        customer_id: UserId,
        order_id: OrderId,
    ) -> Result<Order, OrderError> {
        let order = self.get_order(order_id).await?;
        if order.customer_id != customer_id {
            return Err(OrderError::OrderNotFound(order_id));
        }
        Ok(order)
    }

    /// Lists a customer's orders, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, customer_id: UserId) -> Result<Vec<Order>, OrderError> {
        Ok(self.store.orders_for_customer(customer_id).await?)
    }
}
