//! Contracts of the services checkout depends on.
//!
//! Each trait has an HTTP implementation ([`http`]), and the cart and
//! product contracts also have in-process adapters over the local domain
//! services ([`local`]). Payment and user lookups have in-memory fakes
//! ([`memory`]).

pub mod http;
pub mod local;
pub mod memory;

use async_trait::async_trait;
use common::{CartId, Money, OrderId, ProductId, UserId};
use domain::{CartProduct, PartySnapshot, QuantityMethod};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use http::{
    HttpCartClient, HttpPaymentClient, HttpProductClient, HttpUserClient, build_http_client,
};
pub use local::{LocalCartClient, LocalProductClient};
pub use memory::{InMemoryPaymentService, InMemoryUserDirectory};

/// The caller's `Authorization` header value, forwarded byte for byte to
/// every downstream call.
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    /// Wraps a complete header value such as `"Bearer abc"`.
    pub fn new(header_value: impl Into<String>) -> Self {
        Self(header_value.into())
    }

    /// Takes an `Authorization` header value as sent. Only a blank value
    /// counts as missing; the scheme is left for downstream services to
    /// judge.
    pub fn from_header(value: &str) -> Option<Self> {
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

/// Errors returned by service clients.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request could not be sent or timed out.
    #[error("{service} request failed: {source}")]
    Request {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with an unexpected status.
    #[error("{service} returned status {status}")]
    Status { service: &'static str, status: u16 },

    /// The response body did not have the expected shape.
    #[error("{service} returned an invalid body: {reason}")]
    InvalidBody {
        service: &'static str,
        reason: String,
    },

    /// The service is not reachable (used by local adapters and fakes).
    #[error("{service} unavailable: {reason}")]
    Unavailable {
        service: &'static str,
        reason: String,
    },
}

/// A cart line as returned by the cart service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCartLine {
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Body of a payment initiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub customer_id: UserId,
    pub order_id: OrderId,
    pub total_amount: Money,
}

/// What the payment service said about an initiation it accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// The payment was recorded under this id.
    Paid { payment_id: i64 },
    /// The call succeeded but carried no usable payment id.
    NoPaymentId,
}

/// What the product service did with a guarded stock change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockChange {
    /// Applied; stock now stands at `quantity`.
    Applied { quantity: i64 },
    /// Rejected because stock would drop below zero. `available` is set
    /// when the service reports it.
    Insufficient { available: Option<i64> },
    /// The product is absent or deleted.
    UnknownProduct,
}

/// Customer details from the user service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl UserProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }

    pub fn snapshot(&self) -> PartySnapshot {
        PartySnapshot::new(self.full_name(), self.email.clone())
    }
}

/// Cart service contract.
#[async_trait]
pub trait CartClient: Send + Sync {
    /// Fetches an open line of `user_id`. Lines that are absent, processed
    /// or owned by someone else come back as `None`.
    async fn get_line(
        &self,
        token: &BearerToken,
        user_id: UserId,
        cart_id: CartId,
    ) -> Result<Option<RemoteCartLine>, ClientError>;

    /// Marks lines consumed by an order.
    async fn mark_processed(
        &self,
        token: &BearerToken,
        user_id: UserId,
        cart_ids: &[CartId],
    ) -> Result<u64, ClientError>;
}

/// Product service contract.
#[async_trait]
pub trait ProductClient: Send + Sync {
    /// Fetches price, discount and available quantity. Unknown products
    /// come back as `None`.
    async fn product_for_cart(
        &self,
        token: &BearerToken,
        product_id: ProductId,
    ) -> Result<Option<CartProduct>, ClientError>;

    /// Adds to or subtracts from a product's stock in one guarded step.
    async fn adjust_stock(
        &self,
        token: &BearerToken,
        product_id: ProductId,
        method: QuantityMethod,
        quantity: u32,
    ) -> Result<StockChange, ClientError>;
}

/// Payment service contract.
#[async_trait]
pub trait PaymentClient: Send + Sync {
    /// Initiates payment for an order.
    async fn initiate(
        &self,
        token: &BearerToken,
        request: &PaymentRequest,
    ) -> Result<PaymentOutcome, ClientError>;
}

/// User service contract.
#[async_trait]
pub trait UserClient: Send + Sync {
    /// Fetches a customer's profile.
    async fn profile(
        &self,
        token: &BearerToken,
        user_id: UserId,
    ) -> Result<UserProfile, ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_value_is_kept_verbatim() {
        for value in ["Bearer abc", "bearer abc", "Bearer  abc ", "abc"] {
            assert_eq!(
                BearerToken::from_header(value).map(|t| t.as_str().to_string()),
                Some(value.to_string())
            );
        }
        assert!(BearerToken::from_header("").is_none());
        assert!(BearerToken::from_header("   ").is_none());
    }

    #[test]
    fn test_bearer_token_is_redacted() {
        let token = BearerToken::new("secret");
        assert_eq!(format!("{token:?}"), "BearerToken(***)");
    }

    #[test]
    fn test_profile_snapshot() {
        let profile = UserProfile {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.com".to_string(),
        };
        let snapshot = profile.snapshot();
        assert_eq!(snapshot.name, "Ada Lovelace");
        assert_eq!(snapshot.email, "ada@example.com");
    }

    #[test]
    fn test_payment_request_wire_shape() {
        let request = PaymentRequest {
            customer_id: UserId::new(3),
            order_id: OrderId::new(9),
            total_amount: Money::from_cents(10620),
        };
        let json = serde_json::to_value(request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"customer_id": 3, "order_id": 9, "total_amount": 106.2})
        );
    }
}
