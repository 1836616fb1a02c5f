//! Cart service endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{CartId, ProductId, UserId};
use domain::{QuantityMethod, RemoveOutcome};
use serde::{Deserialize, Serialize};
use store::CartLine;

use super::{Envelope, envelope};
use crate::error::ApiError;
use crate::{AppState, AppStore};

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub items: Vec<AddItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default)]
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub method: QuantityMethod,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct RemoveRequest {
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct ProcessedRequest {
    pub cart_ids: Vec<CartId>,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct RemoveResponse {
    pub cart_id: CartId,
    pub deleted: bool,
    /// The line after the decrement; absent when it was deleted.
    pub line: Option<CartLine>,
}

#[derive(Debug, Serialize)]
pub struct ProcessedResponse {
    pub processed: u64,
}

// -- Handlers --

/// GET /cart/{user_id}: the user's open lines.
#[tracing::instrument(skip(state))]
pub async fn list<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Envelope<Vec<CartLine>>>, ApiError> {
    let lines = state.carts.get_cart(user_id).await?;
    Ok(envelope("cart fetched successfully", lines))
}

/// GET /cart/{user_id}/{cart_id}: one open line of the user.
#[tracing::instrument(skip(state))]
pub async fn get<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Path((user_id, cart_id)): Path<(UserId, CartId)>,
) -> Result<Json<Envelope<CartLine>>, ApiError> {
    let line = state.carts.get_line(user_id, cart_id).await?;
    Ok(envelope("cart item fetched successfully", line))
}

/// POST /cart/{user_id}/add: add products, merging into open lines.
#[tracing::instrument(skip(state, req), fields(items = req.items.len()))]
pub async fn add<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<UserId>,
    Json(req): Json<AddToCartRequest>,
) -> Result<Json<Envelope<Vec<CartLine>>>, ApiError> {
    if req.items.is_empty() {
        return Err(ApiError::BadRequest("items must not be empty".to_string()));
    }
    let items: Vec<(ProductId, u32)> = req
        .items
        .iter()
        .map(|item| (item.product_id, item.quantity))
        .collect();

    let lines = state.carts.add_lines(user_id, &items).await?;
    Ok(envelope("added to cart successfully", lines))
}

/// POST /cart/{user_id}/{cart_id}/quantity: add to or subtract from a line.
#[tracing::instrument(skip(state))]
pub async fn update_quantity<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Path((user_id, cart_id)): Path<(UserId, CartId)>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Json<Envelope<CartLine>>, ApiError> {
    state.carts.get_line(user_id, cart_id).await?;
    let line = state
        .carts
        .update_quantity(cart_id, req.method, req.quantity)
        .await?;
    Ok(envelope("cart quantity updated successfully", line))
}

/// POST /cart/{user_id}/{cart_id}/remove: remove units, deleting the line
/// when all of them go.
#[tracing::instrument(skip(state))]
pub async fn remove<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Path((user_id, cart_id)): Path<(UserId, CartId)>,
    Json(req): Json<RemoveRequest>,
) -> Result<Json<Envelope<RemoveResponse>>, ApiError> {
    state.carts.get_line(user_id, cart_id).await?;
    let response = match state.carts.remove_line(cart_id, req.quantity).await? {
        RemoveOutcome::Deleted(cart_id) => RemoveResponse {
            cart_id,
            deleted: true,
            line: None,
        },
        RemoveOutcome::Decremented(line) => RemoveResponse {
            cart_id: line.cart_id,
            deleted: false,
            line: Some(line),
        },
    };
    Ok(envelope("removed from cart successfully", response))
}

/// POST /cart/{user_id}/processed: mark lines consumed by an order.
#[tracing::instrument(skip(state, req), fields(lines = req.cart_ids.len()))]
pub async fn mark_processed<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<UserId>,
    Json(req): Json<ProcessedRequest>,
) -> Result<Json<Envelope<ProcessedResponse>>, ApiError> {
    let processed = state.carts.mark_processed(user_id, &req.cart_ids).await?;
    Ok(envelope(
        "cart items marked processed",
        ProcessedResponse { processed },
    ))
}
