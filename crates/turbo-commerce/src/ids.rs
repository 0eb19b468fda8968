//! Newtype IDs for type-safe identifiers.
//!
//! Using newtypes prevents accidentally mixing up different ID types,
//! e.g., passing a CartId where a RegionId is expected. All identifiers are
//! assigned by the backend.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate newtype ID structs.
macro_rules! define_id {
    ($name:ident) => {
        /// A backend-assigned identifier.
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from a string.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the ID as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner string.
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(CartId);
define_id!(LineItemId);
define_id!(RegionId);
define_id!(ProductId);
define_id!(VariantId);
define_id!(CategoryId);
define_id!(CollectionId);
define_id!(OrderId);
define_id!(CustomerId);
define_id!(AddressId);
define_id!(ShippingOptionId);
define_id!(PaymentProviderId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_from_string() {
        let id: CartId = "cart_01".into();
        assert_eq!(id.as_str(), "cart_01");
        assert_eq!(format!("{}", id), "cart_01");
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let id = RegionId::new("reg_eu");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"reg_eu\"");
        let back: RegionId = serde_json::from_str("\"reg_eu\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_id_equality() {
        assert_eq!(ProductId::new("same"), ProductId::new("same"));
        assert_ne!(ProductId::new("same"), ProductId::new("different"));
    }
}
