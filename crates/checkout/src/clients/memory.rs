//! In-memory payment and user services.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use common::UserId;
use tokio::sync::RwLock;

use super::{
    BearerToken, ClientError, PaymentClient, PaymentOutcome, PaymentRequest, UserClient,
    UserProfile,
};

/// Payment service that accepts every request and hands out sequential
/// payment ids.
#[derive(Clone, Default)]
pub struct InMemoryPaymentService {
    requests: Arc<RwLock<Vec<PaymentRequest>>>,
    next_id: Arc<AtomicI64>,
    fail: Arc<AtomicBool>,
    withhold_id: Arc<AtomicBool>,
}

impl InMemoryPaymentService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent initiation fail as if the service answered 500.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent initiation succeed without a payment id.
    pub fn set_withhold_id(&self, withhold: bool) {
        self.withhold_id.store(withhold, Ordering::SeqCst);
    }

    /// Requests received so far, failed ones included.
    pub async fn requests(&self) -> Vec<PaymentRequest> {
        self.requests.read().await.clone()
    }
}

#[async_trait]
impl PaymentClient for InMemoryPaymentService {
    async fn initiate(
        &self,
        _token: &BearerToken,
        request: &PaymentRequest,
    ) -> Result<PaymentOutcome, ClientError> {
        self.requests.write().await.push(*request);

        if self.fail.load(Ordering::SeqCst) {
            return Err(ClientError::Status {
                service: "payment",
                status: 500,
            });
        }
        if self.withhold_id.load(Ordering::SeqCst) {
            return Ok(PaymentOutcome::NoPaymentId);
        }

        let payment_id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(PaymentOutcome::Paid { payment_id })
    }
}

/// User directory keyed by user id.
#[derive(Clone, Default)]
pub struct InMemoryUserDirectory {
    profiles: Arc<RwLock<HashMap<UserId, UserProfile>>>,
    fail: Arc<AtomicBool>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user_id: UserId, profile: UserProfile) {
        self.profiles.write().await.insert(user_id, profile);
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserClient for InMemoryUserDirectory {
    async fn profile(
        &self,
        _token: &BearerToken,
        user_id: UserId,
    ) -> Result<UserProfile, ClientError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ClientError::Unavailable {
                service: "user",
                reason: "directory offline".to_string(),
            });
        }
        self.profiles
            .read()
            .await
            .get(&user_id)
            .cloned()
            .ok_or(ClientError::Status {
                service: "user",
                status: 404,
            })
    }
}
