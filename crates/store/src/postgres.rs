use async_trait::async_trait;
use common::{CartId, Money, OrderId, ProductId, UserId};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    CartLine, NewOrder, NewProduct, Order, Product, Result, StockRecord, StoreError,
    store::{CartStore, OrderStore, ProductStore},
};

const CART_COLUMNS: &str = "id, user_id, product_id, quantity, processed";
const PRODUCT_COLUMNS: &str = "id, name, description, price_cents, discount, quantity, in_stock";
const ORDER_COLUMNS: &str = "id, customer_id, cart_line_ids, sub_total_cents, discount_cents, \
     tax_cents, total_cents, is_paid, created_at, updated_at";

/// PostgreSQL-backed store implementation.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        tracing::info!("database migrations applied");
        Ok(())
    }

    fn row_to_line(row: PgRow) -> Result<CartLine> {
        let quantity: i64 = row.try_get("quantity")?;
        Ok(CartLine {
            cart_id: CartId::new(row.try_get("id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            product_id: ProductId::new(row.try_get("product_id")?),
            quantity: u32::try_from(quantity)
                .map_err(|_| StoreError::InvalidRecord(format!("cart quantity {quantity}")))?,
            processed: row.try_get("processed")?,
        })
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        Ok(Product {
            product_id: ProductId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            discount: row.try_get("discount")?,
            quantity: row.try_get("quantity")?,
            in_stock: row.try_get("in_stock")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let cart_line_ids: Vec<i64> = row.try_get("cart_line_ids")?;
        Ok(Order {
            order_id: OrderId::new(row.try_get("id")?),
            customer_id: UserId::new(row.try_get("customer_id")?),
            cart_line_ids: cart_line_ids.into_iter().map(CartId::new).collect(),
            sub_total: Money::from_cents(row.try_get("sub_total_cents")?),
            discount_amount: Money::from_cents(row.try_get("discount_cents")?),
            tax_amount: Money::from_cents(row.try_get("tax_cents")?),
            total_amount: Money::from_cents(row.try_get("total_cents")?),
            is_paid: row.try_get("is_paid")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl CartStore for PostgresStore {
    async fn insert_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartLine> {
        let row = sqlx::query(&format!(
            "INSERT INTO carts (user_id, product_id, quantity) VALUES ($1, $2, $3) \
             RETURNING {CART_COLUMNS}"
        ))
        .bind(user_id.get())
        .bind(product_id.get())
        .bind(i64::from(quantity))
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_line(row)
    }

    async fn get_line(&self, cart_id: CartId) -> Result<Option<CartLine>> {
        let row = sqlx::query(&format!("SELECT {CART_COLUMNS} FROM carts WHERE id = $1"))
            .bind(cart_id.get())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_line).transpose()
    }

    async fn find_open_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Option<CartLine>> {
        let row = sqlx::query(&format!(
            "SELECT {CART_COLUMNS} FROM carts \
             WHERE user_id = $1 AND product_id = $2 AND NOT processed \
             ORDER BY id ASC LIMIT 1"
        ))
        .bind(user_id.get())
        .bind(product_id.get())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_line).transpose()
    }

    async fn open_lines_for_user(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(&format!(
            "SELECT {CART_COLUMNS} FROM carts WHERE user_id = $1 AND NOT processed ORDER BY id ASC"
        ))
        .bind(user_id.get())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_line).collect()
    }

    async fn set_quantity(&self, cart_id: CartId, quantity: u32) -> Result<CartLine> {
        let row = sqlx::query(&format!(
            "UPDATE carts SET quantity = $2 WHERE id = $1 RETURNING {CART_COLUMNS}"
        ))
        .bind(cart_id.get())
        .bind(i64::from(quantity))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_line)
            .transpose()?
            .ok_or_else(|| StoreError::not_found("cart line", cart_id))
    }

    async fn delete_line(&self, cart_id: CartId) -> Result<()> {
        let result = sqlx::query("DELETE FROM carts WHERE id = $1")
            .bind(cart_id.get())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("cart line", cart_id));
        }
        Ok(())
    }

    async fn mark_processed(&self, user_id: UserId, cart_ids: &[CartId]) -> Result<u64> {
        let ids: Vec<i64> = cart_ids.iter().map(|id| id.get()).collect();
        let result = sqlx::query(
            "UPDATE carts SET processed = TRUE \
             WHERE user_id = $1 AND id = ANY($2) AND NOT processed",
        )
        .bind(user_id.get())
        .bind(&ids)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl ProductStore for PostgresStore {
    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        if !(0.0..=100.0).contains(&product.discount) {
            return Err(StoreError::InvalidRecord(format!(
                "discount {} outside 0..=100",
                product.discount
            )));
        }

        let row = sqlx::query(&format!(
            "INSERT INTO products (name, description, price_cents, discount, quantity, in_stock) \
             VALUES ($1, $2, $3, $4, $5, $5 > 0) RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(product.discount)
        .bind(product.quantity)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_product(row)
    }

    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(product_id.get())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn soft_delete_product(&self, product_id: ProductId) -> Result<()> {
        let result = sqlx::query(
            "UPDATE products SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(product_id.get())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("product", product_id));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn adjust_quantity(&self, product_id: ProductId, delta: i64) -> Result<StockRecord> {
        // The guard and the write are one statement, so concurrent
        // decrements cannot both pass the check.
        let row = sqlx::query(
            "UPDATE products \
             SET quantity = quantity + $2, in_stock = (quantity + $2) > 0 \
             WHERE id = $1 AND deleted_at IS NULL AND quantity + $2 >= 0 \
             RETURNING quantity, in_stock",
        )
        .bind(product_id.get())
        .bind(delta)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(StockRecord {
                product_id,
                quantity: row.try_get("quantity")?,
                in_stock: row.try_get("in_stock")?,
            });
        }

        let available: Option<i64> = sqlx::query_scalar(
            "SELECT quantity FROM products WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(product_id.get())
        .fetch_optional(&self.pool)
        .await?;

        match available {
            Some(available) => Err(StoreError::InsufficientStock {
                product_id,
                available,
                requested: -delta,
            }),
            None => Err(StoreError::not_found("product", product_id)),
        }
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    #[tracing::instrument(skip(self, order), fields(customer_id = %order.customer_id))]
    async fn create_order(&self, order: NewOrder) -> Result<Order> {
        let cart_line_ids: Vec<i64> = order.cart_line_ids.iter().map(|id| id.get()).collect();
        let row = sqlx::query(&format!(
            "INSERT INTO orders \
             (customer_id, cart_line_ids, sub_total_cents, discount_cents, tax_cents, total_cents) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order.customer_id.get())
        .bind(&cart_line_ids)
        .bind(order.sub_total.cents())
        .bind(order.discount_amount.cents())
        .bind(order.tax_amount.cents())
        .bind(order.total_amount.cents())
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_order(row)
    }

    async fn mark_paid(&self, order_id: OrderId) -> Result<Order> {
        let row = sqlx::query(&format!(
            "UPDATE orders SET is_paid = TRUE, updated_at = NOW() WHERE id = $1 \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order_id.get())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order)
            .transpose()?
            .ok_or_else(|| StoreError::not_found("order", order_id))
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id.get())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn orders_for_customer(&self, customer_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE customer_id = $1 ORDER BY id ASC"
        ))
        .bind(customer_id.get())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }
}
