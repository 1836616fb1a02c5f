//! Checkout orchestrator.

use std::collections::HashSet;
use std::sync::Arc;

use common::{CartId, ProductId, UserId};
use domain::{
    CompanyProfile, Invoice, InvoiceItem, LinePricing, OrderService, OrderTotals, PartySnapshot,
    QuantityMethod, price_line,
};
use notifications::InvoiceSink;
use store::{Order, OrderStore};

use crate::clients::{
    BearerToken, CartClient, PaymentClient, PaymentOutcome, PaymentRequest, ProductClient,
    RemoteCartLine, StockChange, UserClient,
};
use crate::error::{CheckoutError, Result};
use crate::steps;

/// The remote services a checkout talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub carts: Arc<dyn CartClient>,
    pub products: Arc<dyn ProductClient>,
    pub payments: Arc<dyn PaymentClient>,
    pub users: Arc<dyn UserClient>,
}

/// A cart line after the stock check, with its price.
struct PricedLine {
    line: RemoteCartLine,
    pricing: LinePricing,
    item: InvoiceItem,
}

/// Turns cart lines into orders.
///
/// Steps run in order on the caller's task:
/// validate → fetch cart lines → check stock and price → reserve stock →
/// persist unpaid order → initiate payment → mark lines processed → fetch
/// profile → enqueue invoice.
///
/// The stock check is advisory. The reservation is the guarded decrement
/// that decides who gets the last units. Any failure up to and including
/// persistence aborts the checkout, returns reserved units and writes no
/// order. Failures after persistence are logged, counted and absorbed; the
/// persisted order is returned either way.
pub struct CheckoutOrchestrator<S: OrderStore> {
    orders: OrderService<S>,
    collaborators: Collaborators,
    invoices: Arc<dyn InvoiceSink>,
    company: CompanyProfile,
}

impl<S: OrderStore> CheckoutOrchestrator<S> {
    pub fn new(
        orders: OrderService<S>,
        collaborators: Collaborators,
        invoices: Arc<dyn InvoiceSink>,
        company: CompanyProfile,
    ) -> Self {
        Self {
            orders,
            collaborators,
            invoices,
            company,
        }
    }

    /// Returns the order service used for persistence.
    pub fn orders(&self) -> &OrderService<S> {
        &self.orders
    }

    pub fn company(&self) -> &CompanyProfile {
        &self.company
    }

    /// Checks out the given cart lines of `user_id`.
    #[tracing::instrument(skip(self, token, cart_ids), fields(lines = cart_ids.len()))]
    pub async fn checkout(
        &self,
        token: Option<&BearerToken>,
        user_id: UserId,
        cart_ids: &[CartId],
    ) -> Result<Order> {
        let start = std::time::Instant::now();
        let result = self.run(token, user_id, cart_ids).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind().as_str(),
        };
        metrics::counter!("checkout_total", "outcome" => outcome).increment(1);
        metrics::histogram!("checkout_duration_seconds").record(start.elapsed().as_secs_f64());

        if let Err(e) = &result {
            tracing::warn!(%user_id, error = %e, "checkout rejected");
        }
        result
    }

    async fn run(
        &self,
        token: Option<&BearerToken>,
        user_id: UserId,
        cart_ids: &[CartId],
    ) -> Result<Order> {
        tracing::debug!(step = steps::STEP_VALIDATE, "checkout step started");
        let token = token.ok_or(CheckoutError::Unauthorized)?;
        validate_cart_ids(cart_ids)?;

        tracing::debug!(step = steps::STEP_FETCH_CART, "checkout step started");
        let mut lines = Vec::with_capacity(cart_ids.len());
        for &cart_id in cart_ids {
            let line = self
                .collaborators
                .carts
                .get_line(token, user_id, cart_id)
                .await
                .map_err(|source| CheckoutError::Downstream {
                    step: steps::STEP_FETCH_CART,
                    source,
                })?
                .ok_or(CheckoutError::CartItemNotFound(cart_id))?;
            lines.push(line);
        }

        tracing::debug!(step = steps::STEP_CHECK_STOCK, "checkout step started");
        let mut priced = Vec::with_capacity(lines.len());
        for line in lines {
            priced.push(self.price(token, line).await?);
        }
        let totals = OrderTotals::from_lines(priced.iter().map(|p| &p.pricing));

        tracing::debug!(step = steps::STEP_RESERVE_STOCK, "checkout step started");
        let reserved = self.reserve_stock(token, &priced).await?;

        tracing::debug!(step = steps::STEP_PERSIST_ORDER, "checkout step started");
        let cart_line_ids = priced.iter().map(|p| p.line.cart_id).collect();
        let order = match self
            .orders
            .create_order(user_id, cart_line_ids, totals)
            .await
        {
            Ok(order) => order,
            Err(e) => {
                self.release_stock(token, &reserved).await;
                return Err(e.into());
            }
        };

        let order = self.settle_payment(token, order).await;
        self.mark_processed(token, &order).await;
        let customer = self.customer_snapshot(token, &order).await;
        let items = priced.into_iter().map(|p| p.item).collect();
        self.enqueue_invoice(Invoice::for_order(&order, items, customer, &self.company))
            .await;

        tracing::info!(
            order_id = %order.order_id,
            customer_id = %user_id,
            total = %order.total_amount,
            is_paid = order.is_paid,
            "checkout completed"
        );
        Ok(order)
    }

    /// Advisory stock check and pricing. Reads stock without changing it.
    async fn price(&self, token: &BearerToken, line: RemoteCartLine) -> Result<PricedLine> {
        let product = self
            .collaborators
            .products
            .product_for_cart(token, line.product_id)
            .await
            .map_err(|source| CheckoutError::Downstream {
                step: steps::STEP_CHECK_STOCK,
                source,
            })?
            .ok_or(CheckoutError::ProductNotFound(line.product_id))?;

        if i64::from(line.quantity) > product.quantity {
            return Err(CheckoutError::OutOfStock {
                product_id: line.product_id,
                available: product.quantity,
                requested: line.quantity,
            });
        }

        let pricing = price_line(product.price, line.quantity, product.discount);
        let item = InvoiceItem {
            item: product.product_name,
            description: product.description,
            quantity: line.quantity,
            unit_price: product.price,
            discount: product.discount,
            total: pricing.total,
        };
        Ok(PricedLine {
            line,
            pricing,
            item,
        })
    }

    /// Subtracts every line's quantity from stock. On the first rejection
    /// the units taken so far go back and the rejection is returned.
    async fn reserve_stock(
        &self,
        token: &BearerToken,
        priced: &[PricedLine],
    ) -> Result<Vec<(ProductId, u32)>> {
        let mut reserved = Vec::with_capacity(priced.len());
        for p in priced {
            let (product_id, quantity) = (p.line.product_id, p.line.quantity);
            if quantity == 0 {
                continue;
            }

            let outcome = self
                .collaborators
                .products
                .adjust_stock(token, product_id, QuantityMethod::Subtract, quantity)
                .await;
            let err = match outcome {
                Ok(StockChange::Applied { quantity: left }) => {
                    tracing::debug!(%product_id, quantity, left, "stock reserved");
                    reserved.push((product_id, quantity));
                    continue;
                }
                Ok(StockChange::Insufficient { available }) => CheckoutError::OutOfStock {
                    product_id,
                    available: match available {
                        Some(available) => available,
                        None => self.current_stock(token, product_id).await,
                    },
                    requested: quantity,
                },
                Ok(StockChange::UnknownProduct) => CheckoutError::ProductNotFound(product_id),
                Err(source) => CheckoutError::Downstream {
                    step: steps::STEP_RESERVE_STOCK,
                    source,
                },
            };

            metrics::counter!("checkout_reservation_failures_total").increment(1);
            self.release_stock(token, &reserved).await;
            return Err(err);
        }
        Ok(reserved)
    }

    /// Stock as the product service reports it now, zero if it cannot say.
    async fn current_stock(&self, token: &BearerToken, product_id: ProductId) -> i64 {
        match self
            .collaborators
            .products
            .product_for_cart(token, product_id)
            .await
        {
            Ok(Some(product)) => product.quantity,
            _ => 0,
        }
    }

    /// Returns reserved units. Failures are logged for reconciliation.
    async fn release_stock(&self, token: &BearerToken, reserved: &[(ProductId, u32)]) {
        if reserved.is_empty() {
            return;
        }
        tracing::debug!(
            step = steps::STEP_RELEASE_STOCK,
            lines = reserved.len(),
            "checkout step started"
        );
        for &(product_id, quantity) in reserved {
            let outcome = self
                .collaborators
                .products
                .adjust_stock(token, product_id, QuantityMethod::Add, quantity)
                .await;
            if !matches!(outcome, Ok(StockChange::Applied { .. })) {
                metrics::counter!("checkout_stock_release_failures_total").increment(1);
                tracing::error!(
                    %product_id,
                    quantity,
                    outcome = ?outcome,
                    "reserved stock could not be returned"
                );
            }
        }
    }

    /// Initiates payment and marks the order paid when a payment id comes
    /// back. Returns the order as it stands afterwards.
    async fn settle_payment(&self, token: &BearerToken, order: Order) -> Order {
        tracing::debug!(
            step = steps::STEP_INITIATE_PAYMENT,
            order_id = %order.order_id,
            "checkout step started"
        );
        let request = PaymentRequest {
            customer_id: order.customer_id,
            order_id: order.order_id,
            total_amount: order.total_amount,
        };

        let payment_id = match self.collaborators.payments.initiate(token, &request).await {
            Ok(PaymentOutcome::Paid { payment_id }) => payment_id,
            Ok(PaymentOutcome::NoPaymentId) => {
                self.record_unpaid(&order, "payment service returned no payment id");
                return order;
            }
            Err(e) => {
                self.record_unpaid(&order, &e.to_string());
                return order;
            }
        };

        match self.orders.mark_paid(order.order_id).await {
            Ok(paid) => {
                tracing::info!(order_id = %paid.order_id, payment_id, "order paid");
                paid
            }
            Err(e) => {
                metrics::counter!("checkout_unpaid_orders_total").increment(1);
                tracing::error!(
                    order_id = %order.order_id,
                    customer_id = %order.customer_id,
                    payment_id,
                    error = %e,
                    "payment succeeded but order could not be marked paid"
                );
                order
            }
        }
    }

    fn record_unpaid(&self, order: &Order, error: &str) {
        metrics::counter!("checkout_payment_failures_total").increment(1);
        metrics::counter!("checkout_unpaid_orders_total").increment(1);
        tracing::warn!(
            order_id = %order.order_id,
            customer_id = %order.customer_id,
            total = %order.total_amount,
            error,
            "payment not completed, order left unpaid"
        );
    }

    async fn mark_processed(&self, token: &BearerToken, order: &Order) {
        tracing::debug!(
            step = steps::STEP_MARK_PROCESSED,
            order_id = %order.order_id,
            "checkout step started"
        );
        match self
            .collaborators
            .carts
            .mark_processed(token, order.customer_id, &order.cart_line_ids)
            .await
        {
            Ok(processed) => {
                tracing::debug!(
                    order_id = %order.order_id,
                    processed,
                    "cart lines marked processed"
                );
            }
            Err(e) => {
                metrics::counter!("checkout_mark_processed_failures_total").increment(1);
                tracing::warn!(
                    order_id = %order.order_id,
                    customer_id = %order.customer_id,
                    error = %e,
                    "failed to mark cart lines processed"
                );
            }
        }
    }

    /// The customer's snapshot for the invoice. Empty when the profile
    /// cannot be fetched.
    async fn customer_snapshot(&self, token: &BearerToken, order: &Order) -> PartySnapshot {
        tracing::debug!(
            step = steps::STEP_FETCH_PROFILE,
            order_id = %order.order_id,
            "checkout step started"
        );
        match self
            .collaborators
            .users
            .profile(token, order.customer_id)
            .await
        {
            Ok(profile) => profile.snapshot(),
            Err(e) => {
                metrics::counter!("checkout_profile_failures_total").increment(1);
                tracing::warn!(
                    order_id = %order.order_id,
                    customer_id = %order.customer_id,
                    error = %e,
                    "failed to fetch customer profile"
                );
                PartySnapshot::new("", "")
            }
        }
    }

    async fn enqueue_invoice(&self, invoice: Invoice) {
        tracing::debug!(
            step = steps::STEP_ENQUEUE_INVOICE,
            order_id = %invoice.invoice_id,
            "checkout step started"
        );
        let invoice_id = invoice.invoice_id;
        if let Err(e) = self.invoices.enqueue(invoice).await {
            metrics::counter!("checkout_enqueue_failures_total").increment(1);
            tracing::warn!(order_id = %invoice_id, error = %e, "invoice not queued");
        }
    }
}

fn validate_cart_ids(cart_ids: &[CartId]) -> Result<()> {
    if cart_ids.is_empty() {
        return Err(CheckoutError::NoCartLines);
    }
    let mut seen = HashSet::with_capacity(cart_ids.len());
    for &cart_id in cart_ids {
        if !seen.insert(cart_id) {
            return Err(CheckoutError::DuplicateCartLine(cart_id));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use common::{Money, ProductId};
    use domain::{CartService, StockLedger};
    use notifications::NotificationError;
    use store::{InMemoryStore, NewProduct};
    use tokio::sync::Mutex;

    use super::*;
    use crate::clients::{
        ClientError, InMemoryPaymentService, InMemoryUserDirectory, LocalCartClient,
        LocalProductClient, UserProfile,
    };
    use crate::error::ErrorKind;

    #[derive(Default)]
    struct RecordingSink {
        invoices: Mutex<Vec<Invoice>>,
        closed: bool,
    }

    #[async_trait]
    impl InvoiceSink for RecordingSink {
        async fn enqueue(&self, invoice: Invoice) -> std::result::Result<(), NotificationError> {
            if self.closed {
                return Err(NotificationError::PipelineClosed);
            }
            self.invoices.lock().await.push(invoice);
            Ok(())
        }
    }

    struct BrokenCarts;

    #[async_trait]
    impl CartClient for BrokenCarts {
        async fn get_line(
            &self,
            _token: &BearerToken,
            _user_id: UserId,
            _cart_id: CartId,
        ) -> std::result::Result<Option<RemoteCartLine>, ClientError> {
            Err(ClientError::Status {
                service: "cart",
                status: 500,
            })
        }

        async fn mark_processed(
            &self,
            _token: &BearerToken,
            _user_id: UserId,
            _cart_ids: &[CartId],
        ) -> std::result::Result<u64, ClientError> {
            Ok(0)
        }
    }

    struct Fixture {
        store: InMemoryStore,
        carts: Arc<CartService<InMemoryStore>>,
        ledger: Arc<StockLedger<InMemoryStore>>,
        payments: InMemoryPaymentService,
        users: InMemoryUserDirectory,
        sink: Arc<RecordingSink>,
    }

    const USER: UserId = UserId::new(1);

    impl Fixture {
        async fn new() -> Self {
            let store = InMemoryStore::new();
            let users = InMemoryUserDirectory::new();
            users
                .insert(
                    USER,
                    UserProfile {
                        first_name: "Ada".to_string(),
                        last_name: "Lovelace".to_string(),
                        email: "ada@example.com".to_string(),
                    },
                )
                .await;
            Self {
                carts: Arc::new(CartService::new(store.clone())),
                ledger: Arc::new(StockLedger::new(store.clone())),
                store,
                payments: InMemoryPaymentService::new(),
                users,
                sink: Arc::new(RecordingSink::default()),
            }
        }

        fn collaborators(&self) -> Collaborators {
            Collaborators {
                carts: Arc::new(LocalCartClient::new(self.carts.clone())),
                products: Arc::new(LocalProductClient::new(self.ledger.clone())),
                payments: Arc::new(self.payments.clone()),
                users: Arc::new(self.users.clone()),
            }
        }

        fn orchestrator(&self) -> CheckoutOrchestrator<InMemoryStore> {
            self.orchestrator_with(self.collaborators(), self.sink.clone())
        }

        fn orchestrator_with(
            &self,
            collaborators: Collaborators,
            sink: Arc<dyn InvoiceSink>,
        ) -> CheckoutOrchestrator<InMemoryStore> {
            CheckoutOrchestrator::new(
                OrderService::new(self.store.clone()),
                collaborators,
                sink,
                CompanyProfile::default(),
            )
        }

        async fn product(&self, price_cents: i64, discount: f64, quantity: i64) -> ProductId {
            self.ledger
                .create_product(NewProduct::new(
                    "Lamp",
                    Money::from_cents(price_cents),
                    discount,
                    quantity,
                ))
                .await
                .unwrap()
                .product_id
        }

        async fn line(&self, product_id: ProductId, quantity: u32) -> CartId {
            self.carts
                .add_line(USER, product_id, quantity)
                .await
                .unwrap()
                .cart_id
        }
    }

    fn token() -> BearerToken {
        BearerToken::new("Bearer tkn")
    }

    #[tokio::test]
    async fn test_checkout_prices_and_pays_order() {
        let fx = Fixture::new().await;
        let product = fx.product(5000, 10.0, 5).await;
        let line = fx.line(product, 2).await;

        let order = fx
            .orchestrator()
            .checkout(Some(&token()), USER, &[line])
            .await
            .unwrap();

        assert_eq!(order.sub_total, Money::from_cents(9000));
        assert_eq!(order.discount_amount, Money::from_cents(1000));
        assert_eq!(order.tax_amount, Money::from_cents(1620));
        assert_eq!(order.total_amount, Money::from_cents(10620));
        assert_eq!(order.cart_line_ids, vec![line]);
        assert!(order.is_paid);

        let requests = fx.payments.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].total_amount, Money::from_cents(10620));

        let invoices = fx.sink.invoices.lock().await;
        assert_eq!(invoices.len(), 1);
        assert_eq!(invoices[0].invoice_id, order.order_id);
        assert_eq!(invoices[0].customer.email, "ada@example.com");
        assert_eq!(invoices[0].items[0].total, Money::from_cents(9000));
        assert!(invoices[0].is_paid);
    }

    #[tokio::test]
    async fn test_checkout_marks_lines_processed() {
        let fx = Fixture::new().await;
        let product = fx.product(1000, 0.0, 10).await;
        let line = fx.line(product, 1).await;

        fx.orchestrator()
            .checkout(Some(&token()), USER, &[line])
            .await
            .unwrap();

        assert!(fx.carts.get_cart(USER).await.unwrap().is_empty());
        let again = fx
            .orchestrator()
            .checkout(Some(&token()), USER, &[line])
            .await
            .unwrap_err();
        assert!(matches!(again, CheckoutError::CartItemNotFound(id) if id == line));
    }

    #[tokio::test]
    async fn test_validation_precedes_side_effects() {
        let fx = Fixture::new().await;
        let product = fx.product(1000, 0.0, 10).await;
        let line = fx.line(product, 1).await;
        let orchestrator = fx.orchestrator();

        let err = orchestrator.checkout(None, USER, &[line]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let err = orchestrator
            .checkout(Some(&token()), USER, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::NoCartLines));

        let err = orchestrator
            .checkout(Some(&token()), USER, &[line, line])
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::DuplicateCartLine(id) if id == line));

        assert_eq!(fx.store.order_count().await, 0);
        assert!(fx.payments.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_out_of_stock_persists_nothing() {
        let fx = Fixture::new().await;
        let product = fx.product(5000, 0.0, 3).await;
        let line = fx.line(product, 3).await;
        fx.ledger.adjust_quantity(product, -2).await.unwrap();

        let err = fx
            .orchestrator()
            .checkout(Some(&token()), USER, &[line])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::OutOfStock {
                available: 1,
                requested: 3,
                ..
            }
        ));
        assert_eq!(fx.store.order_count().await, 0);
        assert!(fx.sink.invoices.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_product_and_foreign_line() {
        let fx = Fixture::new().await;
        let product = fx.product(1000, 0.0, 5).await;
        let line = fx.line(product, 1).await;
        fx.ledger.delete_product(product).await.unwrap();

        let err = fx
            .orchestrator()
            .checkout(Some(&token()), USER, &[line])
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::ProductNotFound(id) if id == product));

        let err = fx
            .orchestrator()
            .checkout(Some(&token()), UserId::new(2), &[line])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(fx.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_cart_service_failure_is_downstream() {
        let fx = Fixture::new().await;
        let mut collaborators = fx.collaborators();
        collaborators.carts = Arc::new(BrokenCarts);

        let err = fx
            .orchestrator_with(collaborators, fx.sink.clone())
            .checkout(Some(&token()), USER, &[CartId::new(1)])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::Downstream {
                step: steps::STEP_FETCH_CART,
                ..
            }
        ));
        assert_eq!(fx.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_payment_without_id_leaves_order_unpaid() {
        let fx = Fixture::new().await;
        let product = fx.product(1000, 0.0, 10).await;
        let line = fx.line(product, 1).await;
        fx.payments.set_withhold_id(true);

        let order = fx
            .orchestrator()
            .checkout(Some(&token()), USER, &[line])
            .await
            .unwrap();

        assert!(!order.is_paid);
        assert!(!fx.sink.invoices.lock().await[0].is_paid);
    }

    #[tokio::test]
    async fn test_post_commit_failures_are_absorbed() {
        let fx = Fixture::new().await;
        let product = fx.product(1000, 0.0, 10).await;
        let line = fx.line(product, 1).await;
        fx.payments.set_fail(true);
        fx.users.set_fail(true);
        let closed = Arc::new(RecordingSink {
            closed: true,
            ..Default::default()
        });

        let order = fx
            .orchestrator_with(fx.collaborators(), closed)
            .checkout(Some(&token()), USER, &[line])
            .await
            .unwrap();

        assert!(!order.is_paid);
        assert_eq!(fx.store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_profile_failure_sends_empty_customer() {
        let fx = Fixture::new().await;
        let product = fx.product(1000, 0.0, 10).await;
        let line = fx.line(product, 1).await;
        fx.users.set_fail(true);

        fx.orchestrator()
            .checkout(Some(&token()), USER, &[line])
            .await
            .unwrap();

        let invoices = fx.sink.invoices.lock().await;
        assert!(!invoices[0].customer.has_email());
        assert_eq!(invoices[0].seller.name, "NY Official Company");
    }

    #[tokio::test]
    async fn test_persistence_failure_is_fatal() {
        let fx = Fixture::new().await;
        let product = fx.product(1000, 0.0, 10).await;
        let line = fx.line(product, 1).await;
        fx.store.set_fail_on_create_order(true);

        let err = fx
            .orchestrator()
            .checkout(Some(&token()), USER, &[line])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert!(fx.payments.requests().await.is_empty());
        // The line stays open for a retry and its units are back in stock.
        assert_eq!(fx.carts.get_cart(USER).await.unwrap().len(), 1);
        assert_eq!(fx.ledger.check_stock(product).await.unwrap().quantity, 10);
    }

    #[tokio::test]
    async fn test_checkout_takes_units_out_of_stock() {
        let fx = Fixture::new().await;
        let product = fx.product(5000, 10.0, 5).await;
        let line = fx.line(product, 2).await;

        fx.orchestrator()
            .checkout(Some(&token()), USER, &[line])
            .await
            .unwrap();

        let stock = fx.ledger.check_stock(product).await.unwrap();
        assert_eq!(stock.quantity, 3);
        assert!(stock.in_stock);
    }

    #[tokio::test]
    async fn test_last_unit_sells_once() {
        let fx = Fixture::new().await;
        let product = fx.product(1000, 0.0, 1).await;
        let other = UserId::new(2);
        let first = fx.line(product, 1).await;
        let second = fx.carts.add_line(other, product, 1).await.unwrap().cart_id;
        let orchestrator = fx.orchestrator();

        orchestrator
            .checkout(Some(&token()), USER, &[first])
            .await
            .unwrap();
        let err = orchestrator
            .checkout(Some(&token()), other, &[second])
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Stock);
        assert_eq!(fx.store.order_count().await, 1);
        assert_eq!(fx.ledger.check_stock(product).await.unwrap().quantity, 0);
        assert_eq!(fx.carts.get_cart(other).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_checkouts_never_oversell() {
        let fx = Fixture::new().await;
        let product = fx.product(1000, 0.0, 3).await;
        let orchestrator = Arc::new(fx.orchestrator());

        let mut lines = Vec::new();
        for user in 1..=8 {
            let user = UserId::new(user);
            lines.push((user, fx.carts.add_line(user, product, 1).await.unwrap().cart_id));
        }

        let mut handles = Vec::new();
        for (user, line) in lines {
            let orchestrator = orchestrator.clone();
            handles.push(tokio::spawn(async move {
                orchestrator.checkout(Some(&token()), user, &[line]).await
            }));
        }

        let mut placed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => placed += 1,
                Err(e) => assert_eq!(e.kind(), ErrorKind::Stock),
            }
        }
        assert_eq!(placed, 3);
        assert_eq!(fx.store.order_count().await, 3);
        assert_eq!(fx.ledger.check_stock(product).await.unwrap().quantity, 0);
    }

    /// Lets a competing buyer drain `contested` just before checkout
    /// reserves it.
    struct CompetingBuyer {
        inner: LocalProductClient<InMemoryStore>,
        ledger: Arc<StockLedger<InMemoryStore>>,
        contested: ProductId,
    }

    #[async_trait]
    impl ProductClient for CompetingBuyer {
        async fn product_for_cart(
            &self,
            token: &BearerToken,
            product_id: ProductId,
        ) -> std::result::Result<Option<domain::CartProduct>, ClientError> {
            self.inner.product_for_cart(token, product_id).await
        }

        async fn adjust_stock(
            &self,
            token: &BearerToken,
            product_id: ProductId,
            method: QuantityMethod,
            quantity: u32,
        ) -> std::result::Result<StockChange, ClientError> {
            if product_id == self.contested && method == QuantityMethod::Subtract {
                let left = self.ledger.check_stock(product_id).await.unwrap().quantity;
                self.ledger.adjust_quantity(product_id, -left).await.unwrap();
            }
            self.inner
                .adjust_stock(token, product_id, method, quantity)
                .await
        }
    }

    #[tokio::test]
    async fn test_failed_reservation_returns_earlier_lines() {
        let fx = Fixture::new().await;
        let plentiful = fx.product(1000, 0.0, 5).await;
        let contested = fx.product(2000, 0.0, 1).await;
        let first = fx.line(plentiful, 2).await;
        let second = fx.line(contested, 1).await;

        let mut collaborators = fx.collaborators();
        collaborators.products = Arc::new(CompetingBuyer {
            inner: LocalProductClient::new(fx.ledger.clone()),
            ledger: fx.ledger.clone(),
            contested,
        });
        let err = fx
            .orchestrator_with(collaborators, fx.sink.clone())
            .checkout(Some(&token()), USER, &[first, second])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CheckoutError::OutOfStock {
                product_id,
                available: 0,
                requested: 1,
            } if product_id == contested
        ));
        assert_eq!(fx.ledger.check_stock(plentiful).await.unwrap().quantity, 5);
        assert_eq!(fx.store.order_count().await, 0);
        assert!(fx.payments.requests().await.is_empty());
    }
}
