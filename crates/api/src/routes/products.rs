//! Product service endpoints backed by the stock ledger.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::ProductId;
use domain::{CartProduct, QuantityMethod};
use serde::Deserialize;
use store::StockRecord;

use super::{Envelope, envelope};
use crate::error::ApiError;
use crate::{AppState, AppStore};

#[derive(Debug, Deserialize)]
pub struct UpdateStockRequest {
    pub method: QuantityMethod,
    pub quantity: u32,
}

/// GET /product/{id}/cart: price, discount and stock for cart checks.
#[tracing::instrument(skip(state))]
pub async fn for_cart<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(product_id): Path<ProductId>,
) -> Result<Json<Envelope<CartProduct>>, ApiError> {
    let product = state.ledger.product_for_cart(product_id).await?;
    Ok(envelope("product fetched successfully", product))
}

/// POST /product/{id}/update-quantity: guarded stock adjustment.
#[tracing::instrument(skip(state))]
pub async fn update_quantity<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(product_id): Path<ProductId>,
    Json(req): Json<UpdateStockRequest>,
) -> Result<Json<Envelope<StockRecord>>, ApiError> {
    let record = state
        .ledger
        .apply(product_id, req.method, req.quantity)
        .await?;
    Ok(envelope("product quantity updated successfully", record))
}
