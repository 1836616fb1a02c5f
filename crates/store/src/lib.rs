//! Persistence for cart lines, products and orders.
//!
//! Each service owns one trait: [`CartStore`] for the cart service,
//! [`ProductStore`] for the product service and [`OrderStore`] for the order
//! service. [`InMemoryStore`] and [`PostgresStore`] implement all three.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod records;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use records::{CartLine, NewOrder, NewProduct, Order, Product, StockRecord};
pub use store::{CartStore, OrderStore, ProductStore};
