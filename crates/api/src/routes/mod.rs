//! HTTP handlers.

pub mod carts;
pub mod ops;
pub mod orders;
pub mod products;

use axum::Json;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use checkout::BearerToken;
use serde::Serialize;

/// Response body of every successful service call.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub message: &'static str,
    pub data: T,
}

pub(crate) fn envelope<T: Serialize>(message: &'static str, data: T) -> Json<Envelope<T>> {
    Json(Envelope { message, data })
}

/// Extracts the caller's bearer token, if a well-formed one was sent.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<BearerToken> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(BearerToken::from_header)
}
