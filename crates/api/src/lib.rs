//! HTTP API server for the cart, product and order services.
//!
//! Provides the checkout endpoint and the cart and product endpoints it
//! calls, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use checkout::clients::{
    HttpCartClient, HttpPaymentClient, HttpProductClient, HttpUserClient, InMemoryPaymentService,
    InMemoryUserDirectory, LocalCartClient, LocalProductClient, build_http_client,
};
use checkout::{
    CartClient, CheckoutOrchestrator, Collaborators, PaymentClient, ProductClient, UserClient,
};
use domain::{CartService, CompanyProfile, OrderService, StockLedger};
use metrics_exporter_prometheus::PrometheusHandle;
use notifications::InvoiceSink;
use store::{CartStore, OrderStore, ProductStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;

/// A store that backs all three services.
pub trait AppStore: CartStore + ProductStore + OrderStore + Clone + 'static {}

impl<T> AppStore for T where T: CartStore + ProductStore + OrderStore + Clone + 'static {}

/// Shared application state accessible from all handlers.
pub struct AppState<S: AppStore> {
    pub checkout: CheckoutOrchestrator<S>,
    pub carts: Arc<CartService<S>>,
    pub ledger: Arc<StockLedger<S>>,
}

/// Where checkout reaches its collaborators. `None` for the cart or
/// product service means the local service is called in-process.
pub struct Remotes {
    pub carts: Option<Arc<dyn CartClient>>,
    pub products: Option<Arc<dyn ProductClient>>,
    pub payments: Arc<dyn PaymentClient>,
    pub users: Arc<dyn UserClient>,
}

impl Remotes {
    /// Everything local: in-process cart and product services and
    /// in-memory payment and user services.
    pub fn local() -> Self {
        Self {
            carts: None,
            products: None,
            payments: Arc::new(InMemoryPaymentService::new()),
            users: Arc::new(InMemoryUserDirectory::new()),
        }
    }

    /// HTTP clients for every configured service URL, local fallbacks for
    /// the rest.
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = build_http_client(config.downstream_timeout)?;
        let mut remotes = Self::local();

        if let Some(url) = &config.cart_service_url {
            remotes.carts = Some(Arc::new(HttpCartClient::new(client.clone(), url.as_str())));
        }
        if let Some(url) = &config.product_service_url {
            remotes.products = Some(Arc::new(HttpProductClient::new(
                client.clone(),
                url.as_str(),
            )));
        }
        if let Some(url) = &config.payment_service_url {
            remotes.payments = Arc::new(HttpPaymentClient::new(client.clone(), url.as_str()));
        }
        if let Some(url) = &config.user_service_url {
            remotes.users = Arc::new(HttpUserClient::new(client, url.as_str()));
        }
        Ok(remotes)
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: AppStore>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::ops::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::ops::health))
        // Order service
        .route("/user/{id}/order/checkout", post(routes::orders::checkout::<S>))
        .route("/user/{id}/order", get(routes::orders::list::<S>))
        .route("/user/{id}/order/{order_id}", get(routes::orders::get::<S>))
        // Cart service
        .route("/cart/{user_id}", get(routes::carts::list::<S>))
        .route("/cart/{user_id}/add", post(routes::carts::add::<S>))
        .route(
            "/cart/{user_id}/processed",
            post(routes::carts::mark_processed::<S>),
        )
        .route("/cart/{user_id}/{cart_id}", get(routes::carts::get::<S>))
        .route(
            "/cart/{user_id}/{cart_id}/quantity",
            post(routes::carts::update_quantity::<S>),
        )
        .route(
            "/cart/{user_id}/{cart_id}/remove",
            post(routes::carts::remove::<S>),
        )
        // Product service
        .route("/product/{id}/cart", get(routes::products::for_cart::<S>))
        .route(
            "/product/{id}/update-quantity",
            post(routes::products::update_quantity::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires the services over one store.
pub fn create_state<S: AppStore>(
    store: S,
    remotes: Remotes,
    invoices: Arc<dyn InvoiceSink>,
    company: CompanyProfile,
) -> Arc<AppState<S>> {
    let carts = Arc::new(CartService::new(store.clone()));
    let ledger = Arc::new(StockLedger::new(store.clone()));

    let collaborators = Collaborators {
        carts: match remotes.carts {
            Some(remote) => remote,
            None => Arc::new(LocalCartClient::new(carts.clone())),
        },
        products: match remotes.products {
            Some(remote) => remote,
            None => Arc::new(LocalProductClient::new(ledger.clone())),
        },
        payments: remotes.payments,
        users: remotes.users,
    };
    let checkout =
        CheckoutOrchestrator::new(OrderService::new(store), collaborators, invoices, company);

    Arc::new(AppState {
        checkout,
        carts,
        ledger,
    })
}

/// Creates the default application state: local services and in-memory
/// payment and user fakes.
pub fn create_default_state<S: AppStore>(
    store: S,
    invoices: Arc<dyn InvoiceSink>,
) -> Arc<AppState<S>> {
    create_state(store, Remotes::local(), invoices, CompanyProfile::default())
}
