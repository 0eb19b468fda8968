//! Query error types.

use thiserror::Error;
use turbo_cache::{CacheError, KeyError};
use turbo_data::ServiceError;

/// Errors raised by generated read and write operations.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The service does not expose a function the operation needs.
    #[error("{domain}: service does not provide `{operation}`")]
    Configuration {
        domain: String,
        operation: &'static str,
    },

    /// The backend call failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The cache key could not be built.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// Cached data could not be read back.
    #[error(transparent)]
    Cache(CacheError),
}

impl From<CacheError> for QueryError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::Fetch(e) => QueryError::Service(e),
            CacheError::Key(e) => QueryError::Key(e),
            other => QueryError::Cache(other),
        }
    }
}

impl From<serde_json::Error> for QueryError {
    fn from(e: serde_json::Error) -> Self {
        QueryError::Cache(CacheError::Serialization(e))
    }
}

impl QueryError {
    /// Create a configuration error.
    pub fn configuration(domain: impl Into<String>, operation: &'static str) -> Self {
        QueryError::Configuration {
            domain: domain.into(),
            operation,
        }
    }

    /// The backend failure behind this error, if any.
    pub fn service_error(&self) -> Option<&ServiceError> {
        match self {
            QueryError::Service(e) => Some(e),
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

    /// Check if this is a configuration error.
    pub fn is_configuration(&self) -> bool {
        matches!(self, QueryError::Configuration { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_fetch_errors_flatten_to_service() {
        let e: QueryError = CacheError::Fetch(ServiceError::not_found("cart")).into();
        assert!(e.is_not_found());
        assert!(matches!(e, QueryError::Service(_)));
    }

    #[test]
    fn test_configuration_message() {
        let e = QueryError::configuration("orders", "create");
        assert!(e.is_configuration());
        assert_eq!(e.to_string(), "orders: service does not provide `create`");
    }
}
