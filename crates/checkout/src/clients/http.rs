//! HTTP clients for the remote services.
//!
//! Every response body is wrapped in a `{data: ...}` envelope. The caller's
//! `Authorization` header is forwarded unchanged on every request.

use std::time::Duration;

use async_trait::async_trait;
use common::{CartId, Money, ProductId, UserId};
use domain::{CartProduct, QuantityMethod};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{
    BearerToken, CartClient, ClientError, PaymentClient, PaymentOutcome, PaymentRequest,
    ProductClient, RemoteCartLine, StockChange, UserClient, UserProfile,
};

/// Builds the shared client used by every service client.
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// Base URL, client and service name shared by the typed clients.
#[derive(Debug, Clone)]
struct HttpService {
    client: Client,
    base_url: String,
    service: &'static str,
}

impl HttpService {
    fn new(client: Client, base_url: impl Into<String>, service: &'static str) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            service,
        }
    }

    fn get(&self, token: &BearerToken, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{path}", self.base_url))
            .header(AUTHORIZATION, token.as_str())
    }

    fn post(&self, token: &BearerToken, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{path}", self.base_url))
            .header(AUTHORIZATION, token.as_str())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        request.send().await.map_err(|source| ClientError::Request {
            service: self.service,
            source,
        })
    }

    async fn data<T: DeserializeOwned>(&self, response: Response) -> Result<T, ClientError> {
        let envelope: Envelope<T> =
            response
                .json()
                .await
                .map_err(|e| ClientError::InvalidBody {
                    service: self.service,
                    reason: e.to_string(),
                })?;
        Ok(envelope.data)
    }

    fn status_error(&self, status: StatusCode) -> ClientError {
        ClientError::Status {
            service: self.service,
            status: status.as_u16(),
        }
    }
}

/// Cart service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCartClient {
    http: HttpService,
}

impl HttpCartClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            http: HttpService::new(client, base_url, "cart"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProcessedBody {
    processed: u64,
}

#[async_trait]
impl CartClient for HttpCartClient {
    #[tracing::instrument(skip(self, token))]
    async fn get_line(
        &self,
        token: &BearerToken,
        user_id: UserId,
        cart_id: CartId,
    ) -> Result<Option<RemoteCartLine>, ClientError> {
        let response = self
            .http
            .send(self.http.get(token, &format!("/cart/{user_id}/{cart_id}")))
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => self.http.data(response).await.map(Some),
            status => Err(self.http.status_error(status)),
        }
    }

    #[tracing::instrument(skip(self, token, cart_ids), fields(lines = cart_ids.len()))]
    async fn mark_processed(
        &self,
        token: &BearerToken,
        user_id: UserId,
        cart_ids: &[CartId],
    ) -> Result<u64, ClientError> {
        let request = self
            .http
            .post(token, &format!("/cart/{user_id}/processed"))
            .json(&serde_json::json!({ "cart_ids": cart_ids }));
        let response = self.http.send(request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(self.http.status_error(status));
        }
        let body: ProcessedBody = self.http.data(response).await?;
        Ok(body.processed)
    }
}

/// Product service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpProductClient {
    http: HttpService,
}

impl HttpProductClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            http: HttpService::new(client, base_url, "product"),
        }
    }
}

/// `GET /product/{id}/cart` body. The id is taken from the request path.
#[derive(Debug, Deserialize)]
struct ProductBody {
    product_name: String,
    #[serde(default)]
    description: String,
    price: Money,
    quantity: i64,
    #[serde(default)]
    discount: f64,
}

#[derive(Debug, Deserialize)]
struct StockBody {
    quantity: i64,
}

#[async_trait]
impl ProductClient for HttpProductClient {
    #[tracing::instrument(skip(self, token))]
    async fn product_for_cart(
        &self,
        token: &BearerToken,
        product_id: ProductId,
    ) -> Result<Option<CartProduct>, ClientError> {
        let response = self
            .http
            .send(self.http.get(token, &format!("/product/{product_id}/cart")))
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body: ProductBody = self.http.data(response).await?;
                Ok(Some(CartProduct {
                    product_id,
                    product_name: body.product_name,
                    description: body.description,
                    price: body.price,
                    quantity: body.quantity,
                    discount: body.discount,
                }))
            }
            status => Err(self.http.status_error(status)),
        }
    }

    /// `POST /product/{id}/update-quantity`. The service answers 400 when a
    /// subtraction would oversell.
    #[tracing::instrument(skip(self, token))]
    async fn adjust_stock(
        &self,
        token: &BearerToken,
        product_id: ProductId,
        method: QuantityMethod,
        quantity: u32,
    ) -> Result<StockChange, ClientError> {
        let request = self
            .http
            .post(token, &format!("/product/{product_id}/update-quantity"))
            .json(&serde_json::json!({ "method": method, "quantity": quantity }));
        let response = self.http.send(request).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(StockChange::UnknownProduct),
            StatusCode::BAD_REQUEST => Ok(StockChange::Insufficient { available: None }),
            status if status.is_success() => {
                let body: StockBody = self.http.data(response).await?;
                Ok(StockChange::Applied {
                    quantity: body.quantity,
                })
            }
            status => Err(self.http.status_error(status)),
        }
    }
}

/// Payment service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpPaymentClient {
    http: HttpService,
}

impl HttpPaymentClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            http: HttpService::new(client, base_url, "payment"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PaymentBody {
    #[serde(default)]
    payment_id: Option<i64>,
}

#[async_trait]
impl PaymentClient for HttpPaymentClient {
    #[tracing::instrument(skip(self, token), fields(order_id = %request.order_id))]
    async fn initiate(
        &self,
        token: &BearerToken,
        request: &PaymentRequest,
    ) -> Result<PaymentOutcome, ClientError> {
        let response = self
            .http
            .send(self.http.post(token, "/payment/initiate").json(request))
            .await?;
        let status = response.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(self.http.status_error(status));
        }

        let body: Option<PaymentBody> = self.http.data(response).await?;
        Ok(match body.and_then(|b| b.payment_id) {
            Some(payment_id) if payment_id > 0 => PaymentOutcome::Paid { payment_id },
            _ => PaymentOutcome::NoPaymentId,
        })
    }
}

/// User service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpUserClient {
    http: HttpService,
}

impl HttpUserClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            http: HttpService::new(client, base_url, "user"),
        }
    }
}

#[async_trait]
impl UserClient for HttpUserClient {
    #[tracing::instrument(skip(self, token))]
    async fn profile(
        &self,
        token: &BearerToken,
        user_id: UserId,
    ) -> Result<UserProfile, ClientError> {
        let response = self
            .http
            .send(self.http.get(token, &format!("/user/{user_id}")))
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(self.http.status_error(status));
        }
        self.http.data(response).await
    }
}
