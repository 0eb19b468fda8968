//! Cache error types.

use thiserror::Error;
use turbo_data::ServiceError;

/// Errors raised while building a cache key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// A shared container references itself.
    #[error("circular reference in cache key material (depth {depth})")]
    CircularReference { depth: usize },

    /// Key material could not be converted to JSON.
    #[error("key material could not be serialized: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for KeyError {
    fn from(e: serde_json::Error) -> Self {
        KeyError::Serialization(e.to_string())
    }
}

/// Errors that can occur when reading through the cache store.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Cached value does not match the requested type.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend call behind the cache failed.
    #[error(transparent)]
    Fetch(#[from] ServiceError),

    /// The cache key could not be built.
    #[error(transparent)]
    Key(#[from] KeyError),
}

impl CacheError {
    /// The backend failure behind this error, if any.
    pub fn service_error(&self) -> Option<&ServiceError> {
        match self {
            CacheError::Fetch(e) => Some(e),
            _ => None,
        }
    }
}
