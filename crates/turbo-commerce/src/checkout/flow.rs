//! Checkout steps derived from cart state.

use serde::{Deserialize, Serialize};

use crate::cart::Cart;

/// Steps in the checkout flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
    /// Contact email and addresses.
    Address,
    /// Shipping method.
    Delivery,
    /// Payment provider.
    Payment,
    /// Order review before completion.
    Review,
}

impl CheckoutStep {
    pub const ALL: [CheckoutStep; 4] = [
        CheckoutStep::Address,
        CheckoutStep::Delivery,
        CheckoutStep::Payment,
        CheckoutStep::Review,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutStep::Address => "address",
            CheckoutStep::Delivery => "delivery",
            CheckoutStep::Payment => "payment",
            CheckoutStep::Review => "review",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CheckoutStep::Address => "Address",
            CheckoutStep::Delivery => "Delivery",
            CheckoutStep::Payment => "Payment",
            CheckoutStep::Review => "Review",
        }
    }

    /// Get the step number (1-indexed).
    pub fn number(&self) -> u8 {
        match self {
            CheckoutStep::Address => 1,
            CheckoutStep::Delivery => 2,
            CheckoutStep::Payment => 3,
            CheckoutStep::Review => 4,
        }
    }

    /// The first step the cart has not satisfied.
    pub fn for_cart(cart: &Cart) -> CheckoutStep {
        let has_contact = cart.email.is_some() && cart.shipping_address.is_some();
        let has_payment = cart
            .payment_collection
            .as_ref()
            .is_some_and(|p| !p.payment_sessions.is_empty());

        if !has_contact {
            CheckoutStep::Address
        } else if !cart.has_shipping_method() {
            CheckoutStep::Delivery
        } else if !has_payment {
            CheckoutStep::Payment
        } else {
            CheckoutStep::Review
        }
    }

    /// Whether a user may open `self` for this cart. Earlier steps stay open.
    pub fn is_reachable(&self, cart: &Cart) -> bool {
        *self <= CheckoutStep::for_cart(cart)
    }
}
