//! Cart types as returned by the backend.

use serde::{Deserialize, Serialize};

use crate::checkout::{Address, PaymentCollection};
use crate::ids::{CartId, CustomerId, LineItemId, ProductId, RegionId, ShippingOptionId, VariantId};
use crate::orders::Order;

/// A shopping cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cart {
    pub id: CartId,
    #[serde(default)]
    pub region_id: Option<RegionId>,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub currency_code: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub shipping_methods: Vec<ShippingMethod>,
    #[serde(default)]
    pub shipping_address: Option<Address>,
    #[serde(default)]
    pub billing_address: Option<Address>,
    #[serde(default)]
    pub payment_collection: Option<PaymentCollection>,
    #[serde(default)]
    pub promo_codes: Vec<String>,
    /// Backend-computed total in minor units.
    #[serde(default)]
    pub total: i64,
}

impl Cart {
    /// Create an empty cart.
    pub fn new(id: impl Into<CartId>) -> Self {
        Self {
            id: id.into(),
            region_id: None,
            customer_id: None,
            email: None,
            currency_code: None,
            items: Vec::new(),
            shipping_methods: Vec::new(),
            shipping_address: None,
            billing_address: None,
            payment_collection: None,
            promo_codes: Vec::new(),
            total: 0,
        }
    }

    /// Set the region.
    pub fn with_region(mut self, region_id: impl Into<RegionId>) -> Self {
        self.region_id = Some(region_id.into());
        self
    }

    /// Total item quantity.
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Find a line item.
    pub fn line_item(&self, id: &LineItemId) -> Option<&LineItem> {
        self.items.iter().find(|i| &i.id == id)
    }

    /// Find the line item holding a variant.
    pub fn line_for_variant(&self, variant_id: &VariantId) -> Option<&LineItem> {
        self.items.iter().find(|i| &i.variant_id == variant_id)
    }

    pub fn has_shipping_method(&self) -> bool {
        !self.shipping_methods.is_empty()
    }

    /// Whether the cart belongs to `region_id`.
    pub fn in_region(&self, region_id: &str) -> bool {
        self.region_id.as_ref().is_some_and(|r| r.as_str() == region_id)
    }
}

/// A line item in a cart or order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LineItem {
    pub id: LineItemId,
    pub variant_id: VariantId,
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub title: String,
    pub quantity: u32,
    /// Unit price in minor units.
    #[serde(default)]
    pub unit_price: i64,
}

/// A shipping method attached to a cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShippingMethod {
    pub shipping_option_id: ShippingOptionId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub amount: i64,
}

/// Result of completing a cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompleteCartResult {
    /// The cart became an order.
    Order { order: Order },
    /// The backend kept the cart and reported why.
    Cart { cart: Cart, error: String },
}

/// Body for creating a cart.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateCartInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_id: Option<RegionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<AddLineItemInput>,
}

impl CreateCartInput {
    /// A cart for the given region context.
    pub fn for_region(region_id: Option<RegionId>, country_code: Option<String>) -> Self {
        Self {
            region_id,
            country_code,
            ..Default::default()
        }
    }
}

/// Body for updating a cart. Unset fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateCartInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_id: Option<RegionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<Address>,
}

impl UpdateCartInput {
    /// Move the cart to another region.
    pub fn region(region_id: impl Into<RegionId>) -> Self {
        Self {
            region_id: Some(region_id.into()),
            ..Default::default()
        }
    }
}

/// Body for adding a variant to a cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddLineItemInput {
    pub variant_id: VariantId,
    pub quantity: u32,
}

impl AddLineItemInput {
    pub fn new(variant_id: impl Into<VariantId>, quantity: u32) -> Self {
        Self {
            variant_id: variant_id.into(),
            quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, variant: &str, quantity: u32) -> LineItem {
        LineItem {
            id: id.into(),
            variant_id: variant.into(),
            product_id: None,
            title: String::new(),
            quantity,
            unit_price: 1000,
        }
    }

    #[test]
    fn test_cart_queries() {
        let mut cart = Cart::new("cart_1").with_region("reg_eu");
        cart.items = vec![line("li_1", "var_a", 2), line("li_2", "var_b", 1)];

        assert_eq!(cart.item_count(), 3);
        assert!(cart.in_region("reg_eu"));
        assert!(!cart.in_region("reg_us"));
        assert_eq!(cart.line_for_variant(&"var_b".into()).map(|l| l.id.as_str()), Some("li_2"));
        assert!(!cart.has_shipping_method());
    }

    #[test]
    fn test_complete_result_shape() {
        let json = serde_json::json!({
            "type": "cart",
            "cart": { "id": "cart_1" },
            "error": "payment not authorized"
        });
        let result: CompleteCartResult = serde_json::from_value(json).unwrap();
        assert!(matches!(result, CompleteCartResult::Cart { ref error, .. } if error == "payment not authorized"));
    }

    #[test]
    fn test_update_input_skips_unset_fields() {
        let body = serde_json::to_value(UpdateCartInput::region("reg_us")).unwrap();
        assert_eq!(body, serde_json::json!({ "region_id": "reg_us" }));
    }
}
