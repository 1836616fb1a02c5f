//! Checkout orchestration.
//!
//! The [`CheckoutOrchestrator`] turns a user's cart lines into a persisted
//! order. It reads cart lines and product data from their owning services,
//! prices the order, reserves stock, persists the order unpaid, initiates
//! payment and hands an invoice to the notification pipeline. Everything
//! after persistence is best-effort.

pub mod clients;
pub mod coordinator;
pub mod error;
pub mod steps;

pub use clients::{
    BearerToken, CartClient, ClientError, PaymentClient, PaymentOutcome, PaymentRequest,
    ProductClient, RemoteCartLine, StockChange, UserClient, UserProfile,
};
pub use coordinator::{CheckoutOrchestrator, Collaborators};
pub use error::{CheckoutError, ErrorKind, Result};
