//! Checkout module.
//!
//! Contains addresses, shipping options, payment and the checkout
//! orchestrator.

mod address;
mod flow;
mod manager;
mod payment;
mod service;
mod shipping;

pub(crate) use address::is_plausible_email;
pub use address::{Address, AddressPair, AddressValidator};
pub use flow::CheckoutStep;
pub use manager::CheckoutManager;
pub use payment::{PaymentCollection, PaymentProvider, PaymentSession};
pub use service::CheckoutService;
pub use shipping::{shipping_price_map, PriceKind, ShippingOption};
