//! Order service endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use common::{CartId, OrderId, UserId};
use serde::Deserialize;
use store::Order;

use super::{Envelope, bearer_token, envelope};
use crate::error::ApiError;
use crate::{AppState, AppStore};

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub carts: Vec<CartRef>,
}

#[derive(Debug, Deserialize)]
pub struct CartRef {
    pub cart_id: CartId,
}

// -- Handlers --

/// POST /user/{id}/order/checkout: turn cart lines into an order.
#[tracing::instrument(skip(state, headers, req))]
pub async fn checkout<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<UserId>,
    headers: HeaderMap,
    Json(req): Json<CheckoutRequest>,
) -> Result<Json<Envelope<Order>>, ApiError> {
    let token = bearer_token(&headers);
    let cart_ids: Vec<CartId> = req.carts.iter().map(|c| c.cart_id).collect();

    let order = state
        .checkout
        .checkout(token.as_ref(), user_id, &cart_ids)
        .await?;
    Ok(envelope("order placed successfully", order))
}

/// GET /user/{id}/order/{order_id}: one order of the user.
#[tracing::instrument(skip(state))]
pub async fn get<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Path((user_id, order_id)): Path<(UserId, OrderId)>,
) -> Result<Json<Envelope<Order>>, ApiError> {
    let order = state
        .checkout
        .orders()
        .get_customer_order(user_id, order_id)
        .await?;
    Ok(envelope("order fetched successfully", order))
}

/// GET /user/{id}/order: every order of the user.
#[tracing::instrument(skip(state))]
pub async fn list<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Envelope<Vec<Order>>>, ApiError> {
    let orders = state.checkout.orders().list_orders(user_id).await?;
    Ok(envelope("orders fetched successfully", orders))
}
