//! Authentication module.
//!
//! Contains session operations and the registration saga.

mod manager;
mod saga;
mod service;

pub use manager::AuthManager;
pub use saga::{CompensationReporter, RegistrationSaga, RegistrationStep, TracingReporter};
pub use service::{AuthOutcome, AuthService, Credentials, RegistrationInput};

/// Auth cache keys.
pub mod keys {
    use turbo_cache::{Namespace, QueryKey};

    pub const DOMAIN: &str = "auth";

    /// Every auth entry.
    pub fn all(namespace: &Namespace) -> QueryKey {
        namespace.key().with(DOMAIN)
    }

    /// The customer behind the current session.
    pub fn customer(namespace: &Namespace) -> QueryKey {
        all(namespace).with("customer")
    }
}
