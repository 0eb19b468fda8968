//! Shipping option types.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::ids::ShippingOptionId;

/// How an option is priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceKind {
    /// Fixed amount carried on the option.
    Flat,
    /// Amount computed by the backend per cart.
    Calculated,
}

/// A shipping option available to a cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShippingOption {
    pub id: ShippingOptionId,
    pub name: String,
    pub price_type: PriceKind,
    /// Amount in minor units. Set for flat options and for calculated
    /// options after calculation.
    #[serde(default)]
    pub amount: Option<i64>,
    /// Minimum delivery days.
    #[serde(default)]
    pub min_delivery_days: Option<u32>,
    /// Maximum delivery days.
    #[serde(default)]
    pub max_delivery_days: Option<u32>,
    /// Provider-specific data forwarded to price calculation.
    #[serde(default)]
    pub data: serde_json::Value,
}

impl ShippingOption {
    /// A flat-rate option.
    pub fn flat(id: impl Into<ShippingOptionId>, name: impl Into<String>, amount: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price_type: PriceKind::Flat,
            amount: Some(amount),
            min_delivery_days: None,
            max_delivery_days: None,
            data: serde_json::Value::Null,
        }
    }

    /// A backend-calculated option.
    pub fn calculated(id: impl Into<ShippingOptionId>, name: impl Into<String>) -> Self {
        Self {
            price_type: PriceKind::Calculated,
            amount: None,
            ..Self::flat(id, name, 0)
        }
    }

    pub fn is_calculated(&self) -> bool {
        self.price_type == PriceKind::Calculated
    }
}

/// Price per option: flat options use their own amount, calculated options
/// use `calculated`. Options with no known price are omitted.
pub fn shipping_price_map(
    options: &[ShippingOption],
    calculated: &HashMap<ShippingOptionId, i64>,
) -> BTreeMap<ShippingOptionId, i64> {
    options
        .iter()
        .filter_map(|option| {
            let amount = match option.price_type {
                PriceKind::Flat => option.amount,
                PriceKind::Calculated => calculated.get(&option.id).copied(),
            }?;
            Some((option.id.clone(), amount))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_map() {
        let options = vec![
            ShippingOption::flat("optFixed", "Standard", 500),
            ShippingOption::calculated("optCalc", "Express"),
            ShippingOption::calculated("optFailed", "Freight"),
        ];
        let calculated = HashMap::from([(ShippingOptionId::new("optCalc"), 1200)]);

        let prices = shipping_price_map(&options, &calculated);
        assert_eq!(
            prices,
            BTreeMap::from([
                (ShippingOptionId::new("optCalc"), 1200),
                (ShippingOptionId::new("optFixed"), 500),
            ])
        );
    }

    #[test]
    fn test_price_kind_wire_names() {
        let json = serde_json::json!({ "id": "so_1", "name": "Express", "price_type": "calculated" });
        let option: ShippingOption = serde_json::from_value(json).unwrap();
        assert!(option.is_calculated());
        assert_eq!(option.amount, None);
    }
}
