//! Checkout step names, used in logs and error context.

/// Validate the request before any side effect.
pub const STEP_VALIDATE: &str = "validate_request";

/// Fetch each requested cart line from the cart service.
pub const STEP_FETCH_CART: &str = "fetch_cart_line";

/// Fetch price and stock from the product service.
pub const STEP_CHECK_STOCK: &str = "check_stock";

/// Take the ordered units out of stock.
pub const STEP_RESERVE_STOCK: &str = "reserve_stock";

/// Return reserved units when checkout aborts before the order exists.
pub const STEP_RELEASE_STOCK: &str = "release_stock";

/// Persist the unpaid order.
pub const STEP_PERSIST_ORDER: &str = "persist_order";

/// Call the payment service.
pub const STEP_INITIATE_PAYMENT: &str = "initiate_payment";

/// Ask the cart service to mark consumed lines processed.
pub const STEP_MARK_PROCESSED: &str = "mark_cart_processed";

/// Fetch the customer's profile for the invoice.
pub const STEP_FETCH_PROFILE: &str = "fetch_profile";

/// Hand the invoice to the notification pipeline.
pub const STEP_ENQUEUE_INVOICE: &str = "enqueue_invoice";
