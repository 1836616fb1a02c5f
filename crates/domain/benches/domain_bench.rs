use common::{Money, ProductId, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{CartService, OrderTotals, QuantityMethod, price_line};
use store::{InMemoryStore, NewProduct, ProductStore};

fn bench_pricing(c: &mut Criterion) {
    let lines: Vec<_> = (1..=50)
        .map(|i| (Money::from_cents(i * 137), (i % 5) as u32 + 1, (i % 4) as f64 * 7.5))
        .collect();

    c.bench_function("domain/price_50_lines", |b| {
        b.iter(|| {
            let priced: Vec<_> = lines
                .iter()
                .map(|&(price, qty, discount)| price_line(price, qty, discount))
                .collect();
            OrderTotals::from_lines(&priced)
        });
    });
}

/// A store holding one product with stock that repeated adds never exhaust.
fn stocked_store(rt: &tokio::runtime::Runtime) -> (InMemoryStore, ProductId) {
    let store = InMemoryStore::new();
    let product = rt
        .block_on(store.insert_product(NewProduct::new(
            "Lamp",
            Money::from_cents(5000),
            0.0,
            i64::MAX,
        )))
        .unwrap();
    (store, product.product_id)
}

fn bench_cart_add(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, product) = stocked_store(&rt);
    let service = CartService::new(store);

    c.bench_function("domain/cart_add_merge", |b| {
        b.iter(|| {
            rt.block_on(async {
                service.add_line(UserId::new(1), product, 1).await.unwrap();
            });
        });
    });
}

fn bench_cart_update(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (store, product) = stocked_store(&rt);
    let service = CartService::new(store);
    let line = rt
        .block_on(service.add_line(UserId::new(1), product, 1))
        .unwrap();

    c.bench_function("domain/cart_update_quantity", |b| {
        b.iter(|| {
            rt.block_on(async {
                service
                    .update_quantity(line.cart_id, QuantityMethod::Add, 1)
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_pricing, bench_cart_add, bench_cart_update);
criterion_main!(benches);
