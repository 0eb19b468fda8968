//! Shopping cart module.
//!
//! Contains cart types, the cart backend boundary and the active cart
//! orchestrator.

pub mod keys;
mod manager;
mod model;
mod service;

pub use manager::{CartManager, CartOptions, CartState, CreateCartFn};
pub(crate) use manager::store_cart;
pub use model::{
    AddLineItemInput, Cart, CompleteCartResult, CreateCartInput, LineItem, ShippingMethod, UpdateCartInput,
};
pub use service::{CartIdStore, CartService, InMemoryCartIdStore};
