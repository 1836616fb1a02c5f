//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::{CheckoutError, ErrorKind};
use domain::{CartError, DomainError, OrderError, StockError};
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request from the client.
    #[error("{0}")]
    BadRequest(String),

    /// Domain logic error.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Checkout failure.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Domain(err) => domain_status(err),
            ApiError::Checkout(err) => checkout_status(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        metrics::counter!("api_errors_total", "status" => status.as_str().to_string()).increment(1);
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "request failed");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Cart(CartError::CartItemNotFound(_) | CartError::ProductNotFound(_)) => {
            StatusCode::NOT_FOUND
        }
        DomainError::Cart(CartError::InvalidQuantity { .. } | CartError::OutOfStock { .. }) => {
            StatusCode::BAD_REQUEST
        }
        DomainError::Stock(StockError::ProductNotFound(_)) => StatusCode::NOT_FOUND,
        DomainError::Stock(StockError::OutOfStock { .. } | StockError::ZeroQuantity) => {
            StatusCode::BAD_REQUEST
        }
        DomainError::Order(OrderError::OrderNotFound(_)) => StatusCode::NOT_FOUND,
        DomainError::Order(OrderError::InvalidStateTransition { .. }) => StatusCode::CONFLICT,
        DomainError::Order(OrderError::NoCartLines) => StatusCode::BAD_REQUEST,
        DomainError::Cart(CartError::Store(_))
        | DomainError::Stock(StockError::Store(_))
        | DomainError::Order(OrderError::Store(_))
        | DomainError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn checkout_status(err: &CheckoutError) -> StatusCode {
    match err.kind() {
        ErrorKind::Validation | ErrorKind::Stock => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Downstream => StatusCode::BAD_GATEWAY,
        ErrorKind::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        ApiError::Domain(err.into())
    }
}

impl From<StockError> for ApiError {
    fn from(err: StockError) -> Self {
        ApiError::Domain(err.into())
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Domain(err.into())
    }
}
