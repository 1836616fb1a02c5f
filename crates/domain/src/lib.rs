//! Domain services for the checkout system.
//!
//! This crate provides:
//! - [`StockLedger`], the guarded stock adjustment entry point
//! - [`CartService`], cart mutations serialized per user
//! - [`OrderService`] and the `Created -> Paid` order state machine
//! - Line and order pricing
//! - [`Invoice`] construction from a paid or unpaid order

pub mod cart;
pub mod error;
pub mod invoice;
pub mod order;
pub mod pricing;
pub mod stock;

pub use cart::{CartError, CartService, KeyGuard, KeyedLock, QuantityMethod, RemoveOutcome};
pub use error::DomainError;
pub use invoice::{CompanyProfile, Invoice, InvoiceItem, PartySnapshot};
pub use order::{OrderError, OrderService, OrderState};
pub use pricing::{LinePricing, OrderTotals, TAX_RATE_PERCENT, price_line};
pub use stock::{CartProduct, StockError, StockLedger};
