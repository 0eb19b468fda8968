//! Storefront orchestrators for TurboCommerce.
//!
//! Built on the `turbo-query` hook factory and the `turbo-cache` store:
//!
//! - **Catalog**: products, categories, collections and regions
//! - **Cart**: the active-cart state machine and its mutations
//! - **Checkout**: addresses, shipping prices, payment sessions
//! - **Auth**: login, logout and the registration saga
//! - **Customer**: profile and address book
//! - **Orders**: order history
//! - **Sync**: cache rules applied on session changes
//!
//! Backends are reached through the service traits in each module. This
//! crate never speaks HTTP itself.
//!
//! # Example
//!
//! ```rust,ignore
//! use turbo_commerce::prelude::*;
//!
//! let config = StorefrontConfig::load("storefront.toml")?;
//! let client = config.query_client();
//!
//! let region = RegionContext::new("reg_eu").with_country("de");
//! let carts = CartManager::new(cart_service, Arc::new(InMemoryCartIdStore::new()), &client)
//!     .with_options(config.cart_options());
//! let cart = carts.add_item(AddLineItemInput::new("variant_1", 2), &region).await?;
//!
//! let checkout = CheckoutManager::new(checkout_service, &client);
//! let options = checkout.shipping_options(&cart.id, &cancel).await?;
//! let prices = checkout.shipping_prices(&cart.id, &options, &cancel).await;
//! ```

pub mod error;
pub mod ids;

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod customer;
pub mod orders;
pub mod sync;

pub use config::{CartConfig, StorefrontConfig};
pub use error::CommerceError;
pub use ids::*;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::StorefrontConfig;
    pub use crate::error::CommerceError;
    pub use crate::ids::*;

    // Catalog
    pub use crate::catalog::{
        Category, Collection, Product, ProductDetailParams, ProductListParams, ProductVariant, Region,
    };

    // Cart
    pub use crate::cart::{
        AddLineItemInput, Cart, CartManager, CartOptions, CartService, CartState, CompleteCartResult,
        InMemoryCartIdStore, LineItem,
    };

    // Checkout
    pub use crate::checkout::{
        Address, AddressPair, AddressValidator, CheckoutManager, CheckoutService, CheckoutStep, ShippingOption,
    };

    // Session
    pub use crate::auth::{AuthManager, AuthService, Credentials, RegistrationInput};
    pub use crate::customer::{Customer, CustomerManager};
    pub use crate::orders::Order;
    pub use crate::sync::{CacheSync, SyncEvent};

    pub use turbo_data::{CancellationToken, RegionContext};
    pub use turbo_query::{DetailInput, ListInput, QueryClient};
}
