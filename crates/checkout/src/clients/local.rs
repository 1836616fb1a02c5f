//! In-process adapters for deployments that host the cart and product
//! services alongside checkout.

use std::sync::Arc;

use async_trait::async_trait;
use common::{CartId, ProductId, UserId};
use domain::{CartError, CartProduct, CartService, QuantityMethod, StockError, StockLedger};
use store::{CartStore, ProductStore};

use super::{BearerToken, CartClient, ClientError, ProductClient, RemoteCartLine, StockChange};

/// [`CartClient`] backed by a local [`CartService`].
pub struct LocalCartClient<S: CartStore> {
    carts: Arc<CartService<S>>,
}

impl<S: CartStore> LocalCartClient<S> {
    pub fn new(carts: Arc<CartService<S>>) -> Self {
        Self { carts }
    }
}

fn unavailable(service: &'static str, e: impl std::fmt::Display) -> ClientError {
    ClientError::Unavailable {
        service,
        reason: e.to_string(),
    }
}

#[async_trait]
impl<S: CartStore + ProductStore + 'static> CartClient for LocalCartClient<S> {
    async fn get_line(
        &self,
        _token: &BearerToken,
        user_id: UserId,
        cart_id: CartId,
    ) -> Result<Option<RemoteCartLine>, ClientError> {
        match self.carts.get_line(user_id, cart_id).await {
            Ok(line) => Ok(Some(RemoteCartLine {
                cart_id: line.cart_id,
                product_id: line.product_id,
                quantity: line.quantity,
            })),
            Err(CartError::CartItemNotFound(_)) => Ok(None),
            Err(e) => Err(unavailable("cart", e)),
        }
    }

    async fn mark_processed(
        &self,
        _token: &BearerToken,
        user_id: UserId,
        cart_ids: &[CartId],
    ) -> Result<u64, ClientError> {
        self.carts
            .mark_processed(user_id, cart_ids)
            .await
            .map_err(|e| unavailable("cart", e))
    }
}

/// [`ProductClient`] backed by a local [`StockLedger`].
pub struct LocalProductClient<S: ProductStore> {
    ledger: Arc<StockLedger<S>>,
}

impl<S: ProductStore> LocalProductClient<S> {
    pub fn new(ledger: Arc<StockLedger<S>>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl<S: ProductStore + 'static> ProductClient for LocalProductClient<S> {
    async fn product_for_cart(
        &self,
        _token: &BearerToken,
        product_id: ProductId,
    ) -> Result<Option<CartProduct>, ClientError> {
        match self.ledger.product_for_cart(product_id).await {
            Ok(product) => Ok(Some(product)),
            Err(StockError::ProductNotFound(_)) => Ok(None),
            Err(e) => Err(unavailable("product", e)),
        }
    }

    async fn adjust_stock(
        &self,
        _token: &BearerToken,
        product_id: ProductId,
        method: QuantityMethod,
        quantity: u32,
    ) -> Result<StockChange, ClientError> {
        match self.ledger.apply(product_id, method, quantity).await {
            Ok(record) => Ok(StockChange::Applied {
                quantity: record.quantity,
            }),
            Err(StockError::OutOfStock { available, .. }) => Ok(StockChange::Insufficient {
                available: Some(available),
            }),
            Err(StockError::ProductNotFound(_)) => Ok(StockChange::UnknownProduct),
            Err(e) => Err(unavailable("product", e)),
        }
    }
}
