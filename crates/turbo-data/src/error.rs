//! Service error types.

use thiserror::Error;

/// Errors raised at the backend service boundary.
///
/// Cloneable so a single in-flight call can hand the same failure to every
/// reader that joined it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The backend answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The call never reached the backend or the connection dropped.
    #[error("transport error: {0}")]
    Transport(String),

    /// The call exceeded its deadline.
    #[error("request timed out")]
    Timeout,

    /// The caller cancelled the call before it resolved.
    #[error("request cancelled")]
    Cancelled,

    /// The response body could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The backend does not implement the requested operation.
    #[error("operation not supported: {0}")]
    Unsupported(String),
}

impl ServiceError {
    /// Build an HTTP error.
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Build a not-found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::NotFound(_) => Some(404),
            _ => None,
        }
    }

    /// Check if the backend signalled that the entity does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Check if this is an authentication or permission failure (401/403).
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }

    /// Check if this is a 4xx client error.
    pub fn is_client_error(&self) -> bool {
        matches!(self.status(), Some(status) if (400..500).contains(&status))
    }

    /// Check if this is a 5xx server error.
    pub fn is_server_error(&self) -> bool {
        matches!(self.status(), Some(status) if (500..600).contains(&status))
    }

    /// Check if this error came from a cancelled call.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        ServiceError::Decode(e.to_string())
    }
}
