//! Customer module.
//!
//! Contains the customer record, the address book and the profile
//! orchestrator.

mod manager;
mod model;

pub(crate) use manager::absent_as;
pub use manager::{CustomerManager, CustomerService};
pub use model::{CreateCustomerInput, Customer, CustomerAddress, UpdateCustomerInput};

/// Customer cache keys.
pub mod keys {
    use turbo_cache::{Namespace, QueryKey};

    pub const DOMAIN: &str = "customer";

    /// Every customer entry.
    pub fn all(namespace: &Namespace) -> QueryKey {
        namespace.key().with(DOMAIN)
    }

    /// The signed-in customer's profile.
    pub fn profile(namespace: &Namespace) -> QueryKey {
        all(namespace).with("profile")
    }

    /// The signed-in customer's address book.
    pub fn addresses(namespace: &Namespace) -> QueryKey {
        all(namespace).with("addresses")
    }
}
