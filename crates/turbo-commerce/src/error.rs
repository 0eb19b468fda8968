//! Commerce error types.

use thiserror::Error;
use turbo_cache::{CacheError, KeyError};
use turbo_data::ServiceError;
use turbo_query::QueryError;

use crate::ids::CartId;

/// Errors that can occur in storefront operations.
#[derive(Error, Debug)]
pub enum CommerceError {
    /// Input failed validation. No backend call was made.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The operation needs a cart and none is known.
    #[error("No active cart")]
    NoActiveCart,

    /// Payment was requested before a shipping method was chosen.
    #[error("Cart {0} has no shipping method")]
    ShippingRequired(CartId),

    /// The backend answered with a redirect or a multi-step challenge.
    #[error("Unsupported auth flow: {0}")]
    UnsupportedAuthFlow(String),

    /// The backend refused to turn the cart into an order.
    #[error("Cart {cart_id} could not be completed: {message}")]
    Completion { cart_id: CartId, message: String },

    /// The backend call failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// A generated query failed.
    #[error(transparent)]
    Query(QueryError),

    /// A cache key could not be built.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Cached data could not be read or written.
    #[error(transparent)]
    Cache(CacheError),
}

impl From<QueryError> for CommerceError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::Service(e) => CommerceError::Service(e),
            QueryError::Key(e) => CommerceError::Key(e),
            other => CommerceError::Query(other),
        }
    }
}

impl From<CacheError> for CommerceError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::Fetch(e) => CommerceError::Service(e),
            CacheError::Key(e) => CommerceError::Key(e),
            other => CommerceError::Cache(other),
        }
    }
}

impl From<serde_json::Error> for CommerceError {
    fn from(e: serde_json::Error) -> Self {
        CommerceError::Cache(CacheError::Serialization(e))
    }
}

impl CommerceError {
    /// The backend failure behind this error, if any.
    pub fn service_error(&self) -> Option<&ServiceError> {
        match self {
            CommerceError::Service(e) => Some(e),
            _ => None,
        }
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        self.service_error().is_some_and(ServiceError::is_not_found)
    }

    /// Check if this is a 401/403.
    pub fn is_unauthorized(&self) -> bool {
        self.service_error().is_some_and(ServiceError::is_unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_errors_surface_through_layers() {
        let from_query: CommerceError = QueryError::Service(ServiceError::not_found("cart")).into();
        assert!(from_query.is_not_found());

        let from_cache: CommerceError = CacheError::Fetch(ServiceError::http(403, "forbidden")).into();
        assert!(from_cache.is_unauthorized());
    }

    #[test]
    fn test_configuration_errors_stay_query_errors() {
        let e: CommerceError = QueryError::configuration("orders", "delete").into();
        assert!(matches!(e, CommerceError::Query(QueryError::Configuration { .. })));
        assert!(e.service_error().is_none());
    }
}
