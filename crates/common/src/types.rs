use serde::{Deserialize, Serialize};

/// Declares an integer identifier newtype.
///
/// Every service keys its rows by auto-increment integers, so all
/// identifiers share one representation but stay distinct types.
macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an identifier from its raw value.
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw value.
            pub const fn get(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

integer_id!(
    /// Identifier of a customer account, owned by the user service.
    UserId
);

integer_id!(
    /// Identifier of a single cart line, owned by the cart service.
    CartId
);

integer_id!(
    /// Identifier of a product, owned by the product service.
    ProductId
);

integer_id!(
    /// Identifier of an order, owned by the order service.
    OrderId
);
