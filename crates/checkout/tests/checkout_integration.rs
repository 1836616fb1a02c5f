//! Checkout against HTTP collaborators and a live notification pipeline.

use std::sync::Arc;
use std::time::Duration;

use checkout::clients::{
    HttpCartClient, HttpPaymentClient, HttpProductClient, HttpUserClient, build_http_client,
};
use checkout::{BearerToken, CheckoutError, CheckoutOrchestrator, Collaborators};
use common::{CartId, Money, UserId};
use domain::{CompanyProfile, OrderService};
use notifications::{
    InMemoryEmailSender, NotificationPipeline, PipelineConfig, ShutdownMode, TextInvoiceRenderer,
};
use store::InMemoryStore;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    server: MockServer,
    store: InMemoryStore,
    sender: InMemoryEmailSender,
    pipeline: NotificationPipeline,
    orchestrator: CheckoutOrchestrator<InMemoryStore>,
    _dir: tempfile::TempDir,
}

impl Harness {
    async fn start() -> Self {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryStore::new();
        let sender = InMemoryEmailSender::new();
        let pipeline = NotificationPipeline::start(
            PipelineConfig {
                queue_capacity: 10,
                workers: 1,
                retention: Duration::from_secs(20),
            },
            Arc::new(TextInvoiceRenderer::new(dir.path())),
            Arc::new(sender.clone()),
        );

        let client = build_http_client(Duration::from_secs(5)).unwrap();
        let collaborators = Collaborators {
            carts: Arc::new(HttpCartClient::new(client.clone(), server.uri())),
            products: Arc::new(HttpProductClient::new(client.clone(), server.uri())),
            payments: Arc::new(HttpPaymentClient::new(client.clone(), server.uri())),
            users: Arc::new(HttpUserClient::new(client, server.uri())),
        };
        let orchestrator = CheckoutOrchestrator::new(
            OrderService::new(store.clone()),
            collaborators,
            Arc::new(pipeline.handle()),
            CompanyProfile::default(),
        );

        Self {
            server,
            store,
            sender,
            pipeline,
            orchestrator,
            _dir: dir,
        }
    }

    async fn mount_cart_line(&self, quantity: u32) {
        Mock::given(method("GET"))
            .and(path("/cart/1/10"))
            .and(header("authorization", "Bearer tkn"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"cart_id": 10, "product_id": 7, "quantity": quantity}
            })))
            .mount(&self.server)
            .await;
    }

    async fn mount_product(&self, stock: i64) {
        Mock::given(method("GET"))
            .and(path("/product/7/cart"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {
                    "product_name": "Lamp",
                    "description": "Desk lamp",
                    "price": 50,
                    "quantity": stock,
                    "discount": 10
                }
            })))
            .mount(&self.server)
            .await;
    }

    /// Accepts units taken from product 7, reporting `left` afterwards.
    async fn mount_reservation(&self, quantity: u32, left: i64, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/product/7/update-quantity"))
            .and(header("authorization", "Bearer tkn"))
            .and(body_json(serde_json::json!({"method": "subtract", "quantity": quantity})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"product_id": 7, "quantity": left, "in_stock": left > 0}
            })))
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    async fn mount_user(&self) {
        Mock::given(method("GET"))
            .and(path("/user/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": {"first_name": "Ada", "last_name": "Lovelace", "email": "ada@example.com"}
            })))
            .mount(&self.server)
            .await;
    }

    async fn mount_processed(&self, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/cart/1/processed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"data": {"processed": 1}})),
            )
            .expect(expected_calls)
            .mount(&self.server)
            .await;
    }

    async fn checkout(&self) -> Result<store::Order, CheckoutError> {
        self.orchestrator
            .checkout(Some(&BearerToken::new("Bearer tkn")), UserId::new(1), &[CartId::new(10)])
            .await
    }
}

async fn wait_for_emails(sender: &InMemoryEmailSender, count: usize) {
    for _ in 0..200 {
        if sender.sent().await.len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {count} emails");
}

#[tokio::test]
async fn payment_server_error_still_returns_unpaid_order() {
    let harness = Harness::start().await;
    harness.mount_cart_line(2).await;
    harness.mount_product(5).await;
    harness.mount_reservation(2, 3, 1).await;
    harness.mount_user().await;
    harness.mount_processed(1).await;
    Mock::given(method("POST"))
        .and(path("/payment/initiate"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&harness.server)
        .await;

    let order = harness.checkout().await.unwrap();

    assert!(!order.is_paid);
    assert_eq!(order.sub_total, Money::from_cents(9000));
    assert_eq!(order.tax_amount, Money::from_cents(1620));
    assert_eq!(order.total_amount, Money::from_cents(10620));
    assert_eq!(harness.store.order_count().await, 1);

    wait_for_emails(&harness.sender, 2).await;
    let sent = harness.sender.sent_to("ada@example.com").await;
    assert_eq!(sent.len(), 2);
    let document = String::from_utf8(sent[1].attachment.clone().unwrap()).unwrap();
    assert!(document.contains("UNPAID"));
    assert!(document.contains("106.20"));

    let report = harness.pipeline.shutdown(ShutdownMode::Drain).await;
    assert_eq!(report.processed, 1);
}

#[tokio::test]
async fn payment_with_id_marks_order_paid() {
    let harness = Harness::start().await;
    harness.mount_cart_line(2).await;
    harness.mount_product(5).await;
    harness.mount_reservation(2, 3, 1).await;
    harness.mount_user().await;
    harness.mount_processed(1).await;
    Mock::given(method("POST"))
        .and(path("/payment/initiate"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(serde_json::json!({"data": {"payment_id": 99}})),
        )
        .mount(&harness.server)
        .await;

    let order = harness.checkout().await.unwrap();

    assert!(order.is_paid);
    harness.pipeline.shutdown(ShutdownMode::Drain).await;
}

#[tokio::test]
async fn out_of_stock_aborts_before_persistence() {
    let harness = Harness::start().await;
    harness.mount_cart_line(6).await;
    harness.mount_product(5).await;
    harness.mount_reservation(6, 0, 0).await;
    harness.mount_processed(0).await;
    Mock::given(method("POST"))
        .and(path("/payment/initiate"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&harness.server)
        .await;

    let err = harness.checkout().await.unwrap_err();

    assert!(matches!(
        err,
        CheckoutError::OutOfStock {
            available: 5,
            requested: 6,
            ..
        }
    ));
    assert_eq!(harness.store.order_count().await, 0);

    let report = harness.pipeline.shutdown(ShutdownMode::Drain).await;
    assert_eq!(report.processed, 0);
}

#[tokio::test]
async fn rejected_reservation_aborts_before_persistence() {
    let harness = Harness::start().await;
    harness.mount_cart_line(2).await;
    harness.mount_product(5).await;
    harness.mount_processed(0).await;
    Mock::given(method("POST"))
        .and(path("/product/7/update-quantity"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/payment/initiate"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&harness.server)
        .await;

    let err = harness.checkout().await.unwrap_err();

    assert!(matches!(err, CheckoutError::OutOfStock { requested: 2, .. }));
    assert_eq!(harness.store.order_count().await, 0);

    let report = harness.pipeline.shutdown(ShutdownMode::Drain).await;
    assert_eq!(report.processed, 0);
}

#[tokio::test]
async fn missing_cart_line_is_not_found() {
    let harness = Harness::start().await;
    Mock::given(method("GET"))
        .and(path("/cart/1/10"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&harness.server)
        .await;

    let err = harness.checkout().await.unwrap_err();

    assert!(matches!(err, CheckoutError::CartItemNotFound(id) if id == CartId::new(10)));
    harness.pipeline.shutdown(ShutdownMode::Drain).await;
}

#[tokio::test]
async fn profile_failure_still_renders_invoice_without_mail() {
    let harness = Harness::start().await;
    harness.mount_cart_line(1).await;
    harness.mount_product(5).await;
    harness.mount_reservation(1, 4, 1).await;
    harness.mount_processed(1).await;
    Mock::given(method("GET"))
        .and(path("/user/1"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&harness.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/payment/initiate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"data": {"payment_id": 1}})),
        )
        .mount(&harness.server)
        .await;

    let order = harness.checkout().await.unwrap();
    assert!(order.is_paid);

    let report = harness.pipeline.shutdown(ShutdownMode::Drain).await;
    assert_eq!(report.processed, 1);
    assert!(harness.sender.sent().await.is_empty());
}
