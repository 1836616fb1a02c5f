//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container and truncate its tables per
//! test, so they run serially. Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration
//! ```

use std::sync::Arc;

use common::{CartId, Money, ProductId, UserId};
use serial_test::serial;
use sqlx::PgPool;
use store::{CartStore, NewOrder, NewProduct, OrderStore, PostgresStore, ProductStore, StoreError};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresStore::new(pool.clone())
                .run_migrations()
                .await
                .unwrap();
            pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE carts, products, orders RESTART IDENTITY")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStore::new(pool)
}

fn mouse() -> NewProduct {
    NewProduct::new("Mouse", Money::from_cents(2500), 0.0, 5).with_description("Wireless")
}

#[tokio::test]
#[serial]
async fn cart_lines_round_trip() {
    let store = get_test_store().await;
    let user = UserId::new(1);

    let line = store.insert_line(user, ProductId::new(3), 2).await.unwrap();
    assert!(!line.processed);

    let found = store.find_open_line(user, ProductId::new(3)).await.unwrap();
    assert_eq!(found.as_ref(), Some(&line));

    let updated = store.set_quantity(line.cart_id, 7).await.unwrap();
    assert_eq!(updated.quantity, 7);

    let lines = store.open_lines_for_user(user).await.unwrap();
    assert_eq!(lines, vec![updated]);

    store.delete_line(line.cart_id).await.unwrap();
    assert!(store.get_line(line.cart_id).await.unwrap().is_none());
    assert!(matches!(
        store.delete_line(line.cart_id).await,
        Err(StoreError::NotFound { .. })
    ));
}

#[tokio::test]
#[serial]
async fn mark_processed_only_flips_owned_open_lines() {
    let store = get_test_store().await;
    let mine = store
        .insert_line(UserId::new(1), ProductId::new(1), 1)
        .await
        .unwrap();
    let theirs = store
        .insert_line(UserId::new(2), ProductId::new(1), 1)
        .await
        .unwrap();

    let flipped = store
        .mark_processed(UserId::new(1), &[mine.cart_id, theirs.cart_id, CartId::new(404)])
        .await
        .unwrap();
    assert_eq!(flipped, 1);

    assert!(store.open_lines_for_user(UserId::new(1)).await.unwrap().is_empty());
    assert_eq!(store.open_lines_for_user(UserId::new(2)).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn adjust_quantity_is_guarded() {
    let store = get_test_store().await;
    let product = store.insert_product(mouse()).await.unwrap();
    assert_eq!(product.description, "Wireless");
    assert!(product.in_stock);

    let stock = store.adjust_quantity(product.product_id, -5).await.unwrap();
    assert_eq!(stock.quantity, 0);
    assert!(!stock.in_stock);

    let result = store.adjust_quantity(product.product_id, -1).await;
    assert!(matches!(
        result,
        Err(StoreError::InsufficientStock {
            available: 0,
            requested: 1,
            ..
        })
    ));

    let missing = store.adjust_quantity(ProductId::new(999), 1).await;
    assert!(matches!(missing, Err(StoreError::NotFound { .. })));
}

#[tokio::test]
#[serial]
async fn concurrent_decrements_never_oversell() {
    let store = get_test_store().await;
    let product = store.insert_product(mouse()).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..12 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.adjust_quantity(product.product_id, -1).await.is_ok()
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap() {
            successes += 1;
        }
    }

    assert_eq!(successes, 5);
    let stored = store.get_product(product.product_id).await.unwrap().unwrap();
    assert_eq!(stored.quantity, 0);
}

#[tokio::test]
#[serial]
async fn soft_deleted_products_are_hidden() {
    let store = get_test_store().await;
    let product = store.insert_product(mouse()).await.unwrap();

    store.soft_delete_product(product.product_id).await.unwrap();
    assert!(store.get_product(product.product_id).await.unwrap().is_none());
    assert!(matches!(
        store.adjust_quantity(product.product_id, 1).await,
        Err(StoreError::NotFound { .. })
    ));
}

#[tokio::test]
#[serial]
async fn orders_persist_totals_and_payment_flag() {
    let store = get_test_store().await;
    let order = store
        .create_order(NewOrder {
            customer_id: UserId::new(9),
            cart_line_ids: vec![CartId::new(4), CartId::new(5)],
            sub_total: Money::from_cents(9000),
            discount_amount: Money::from_cents(1000),
            tax_amount: Money::from_cents(1620),
            total_amount: Money::from_cents(10620),
        })
        .await
        .unwrap();

    assert!(!order.is_paid);
    assert_eq!(order.cart_line_ids, vec![CartId::new(4), CartId::new(5)]);

    let paid = store.mark_paid(order.order_id).await.unwrap();
    assert!(paid.is_paid);
    assert_eq!(paid.total_amount, Money::from_cents(10620));

    let fetched = store.get_order(order.order_id).await.unwrap().unwrap();
    assert_eq!(fetched, paid);

    let listed = store.orders_for_customer(UserId::new(9)).await.unwrap();
    assert_eq!(listed.len(), 1);
}
