use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::{CartId, OrderId, ProductId, UserId};
use tokio::sync::RwLock;

use crate::{
    CartLine, NewOrder, NewProduct, Order, Product, Result, StockRecord, StoreError,
    store::{CartStore, OrderStore, ProductStore},
};

#[derive(Debug)]
struct StoredProduct {
    product: Product,
    deleted: bool,
}

#[derive(Debug, Default)]
struct Tables {
    carts: BTreeMap<CartId, CartLine>,
    products: BTreeMap<ProductId, StoredProduct>,
    orders: BTreeMap<OrderId, Order>,
    next_cart_id: i64,
    next_product_id: i64,
    next_order_id: i64,
}

/// In-memory store implementation for testing and local runs.
///
/// All tables live behind a single lock, so every trait method is atomic
/// with respect to the others. Ids are assigned sequentially from 1.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    fail_on_create_order: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent `create_order` calls fail.
    pub fn set_fail_on_create_order(&self, fail: bool) {
        self.fail_on_create_order.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of persisted orders.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Returns the number of cart lines, processed ones included.
    pub async fn cart_line_count(&self) -> usize {
        self.tables.read().await.carts.len()
    }
}

#[async_trait]
impl CartStore for InMemoryStore {
    async fn insert_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartLine> {
        let mut tables = self.tables.write().await;
        tables.next_cart_id += 1;
        let line = CartLine {
            cart_id: CartId::new(tables.next_cart_id),
            user_id,
            product_id,
            quantity,
            processed: false,
        };
        tables.carts.insert(line.cart_id, line.clone());
        Ok(line)
    }

    async fn get_line(&self, cart_id: CartId) -> Result<Option<CartLine>> {
        Ok(self.tables.read().await.carts.get(&cart_id).cloned())
    }

    async fn find_open_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<CartLine>> {
        let tables = self.tables.read().await;
        Ok(tables
            .carts
            .values()
            .find(|l| l.user_id == user_id && l.product_id == product_id && !l.processed)
            .cloned())
    }

    async fn open_lines_for_user(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        let tables = self.tables.read().await;
        Ok(tables
            .carts
            .values()
            .filter(|l| l.user_id == user_id && !l.processed)
            .cloned()
            .collect())
    }

    async fn set_quantity(&self, cart_id: CartId, quantity: u32) -> Result<CartLine> {
        let mut tables = self.tables.write().await;
        let line = tables
            .carts
            .get_mut(&cart_id)
            .ok_or_else(|| StoreError::not_found("cart line", cart_id))?;
        line.quantity = quantity;
        Ok(line.clone())
    }

    async fn delete_line(&self, cart_id: CartId) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .carts
            .remove(&cart_id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("cart line", cart_id))
    }

    async fn mark_processed(&self, user_id: UserId, cart_ids: &[CartId]) -> Result<u64> {
        let wanted: HashSet<CartId> = cart_ids.iter().copied().collect();
        let mut tables = self.tables.write().await;
        let mut flipped = 0;
        for line in tables.carts.values_mut() {
            if wanted.contains(&line.cart_id) && line.user_id == user_id && !line.processed {
                line.processed = true;
                flipped += 1;
            }
        }
        Ok(flipped)
    }
}

#[async_trait]
impl ProductStore for InMemoryStore {
    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        if !(0.0..=100.0).contains(&product.discount) {
            return Err(StoreError::InvalidRecord(format!(
                "discount {} outside 0..=100",
                product.discount
            )));
        }
        if product.quantity < 0 {
            return Err(StoreError::InvalidRecord(format!(
                "negative quantity {}",
                product.quantity
            )));
        }

        let mut tables = self.tables.write().await;
        tables.next_product_id += 1;
        let record = Product {
            product_id: ProductId::new(tables.next_product_id),
            name: product.name,
            description: product.description,
            price: product.price,
            discount: product.discount,
            quantity: product.quantity,
            in_stock: product.quantity > 0,
        };
        tables.products.insert(
            record.product_id,
            StoredProduct {
                product: record.clone(),
                deleted: false,
            },
        );
        Ok(record)
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let tables = self.tables.read().await;
        Ok(tables
            .products
            .get(&product_id)
            .filter(|p| !p.deleted)
            .map(|p| p.product.clone()))
    }

    async fn soft_delete_product(&self, product_id: ProductId) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.products.get_mut(&product_id) {
            Some(stored) if !stored.deleted => {
                stored.deleted = true;
                Ok(())
            }
            _ => Err(StoreError::not_found("product", product_id)),
        }
    }

    async fn adjust_quantity(&self, product_id: ProductId, delta: i64) -> Result<StockRecord> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .products
            .get_mut(&product_id)
            .filter(|p| !p.deleted)
            .ok_or_else(|| StoreError::not_found("product", product_id))?;

        let product = &mut stored.product;
        let updated = product.quantity + delta;
        if updated < 0 {
            return Err(StoreError::InsufficientStock {
                product_id,
                available: product.quantity,
                requested: -delta,
            });
        }
        product.quantity = updated;
        product.in_stock = updated > 0;
        Ok(product.stock())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn create_order(&self, order: NewOrder) -> Result<Order> {
        if self.fail_on_create_order.load(Ordering::SeqCst) {
            return Err(StoreError::WriteRejected(
                "order persistence disabled".to_string(),
            ));
        }

        let mut tables = self.tables.write().await;
        tables.next_order_id += 1;
        let now = Utc::now();
        let record = Order {
            order_id: OrderId::new(tables.next_order_id),
            customer_id: order.customer_id,
            cart_line_ids: order.cart_line_ids,
            sub_total: order.sub_total,
            discount_amount: order.discount_amount,
            tax_amount: order.tax_amount,
            total_amount: order.total_amount,
            is_paid: false,
            created_at: now,
            updated_at: now,
        };
        tables.orders.insert(record.order_id, record.clone());
        Ok(record)
    }

    async fn mark_paid(&self, order_id: OrderId) -> Result<Order> {
        let mut tables = self.tables.write().await;
        let order = tables
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| StoreError::not_found("order", order_id))?;
        order.is_paid = true;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.tables.read().await.orders.get(&order_id).cloned())
    }

    async fn orders_for_customer(&self, customer_id: UserId) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .values()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect())
    }
}
