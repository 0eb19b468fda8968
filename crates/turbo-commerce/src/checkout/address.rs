//! Address types and client-side validation.
//!
//! Addresses are normalized before any rules run. The rules themselves are
//! an [`AddressValidator`], which defaults to [`Address::validate`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::CommerceError;
use crate::ids::AddressId;

/// A postal address.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Address {
    /// Address ID (None for unsaved addresses).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AddressId>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    /// Address line 1.
    pub address_1: String,
    /// Address line 2 (apt, suite, etc.).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_2: Option<String>,
    pub city: String,
    /// State/province.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub province: Option<String>,
    /// ISO 3166-1 alpha-2, lowercase after normalization.
    pub country_code: String,
    pub postal_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Address {
    /// Create a new address.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        address_1: impl Into<String>,
        city: impl Into<String>,
        country_code: impl Into<String>,
        postal_code: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            address_1: address_1.into(),
            city: city.into(),
            country_code: country_code.into(),
            postal_code: postal_code.into(),
            ..Default::default()
        }
    }

    /// Trim every field, drop blank optionals and lowercase the country code.
    pub fn normalized(&self) -> Address {
        fn opt(value: &Option<String>) -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        }

        Address {
            id: self.id.clone(),
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            company: opt(&self.company),
            address_1: self.address_1.trim().to_string(),
            address_2: opt(&self.address_2),
            city: self.city.trim().to_string(),
            province: opt(&self.province),
            country_code: self.country_code.trim().to_ascii_lowercase(),
            postal_code: self.postal_code.trim().to_string(),
            phone: opt(&self.phone),
        }
    }

    /// Standard field errors for this address. Empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let required = [
            ("first name", &self.first_name),
            ("last name", &self.last_name),
            ("address", &self.address_1),
            ("city", &self.city),
            ("postal code", &self.postal_code),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                errors.push(format!("{field} is required"));
            }
        }

        let country = self.country_code.trim();
        if country.is_empty() {
            errors.push("country code is required".to_string());
        } else if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
            errors.push(format!("country code '{country}' is not a two-letter code"));
        }

        if let Some(phone) = self.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            let valid = phone
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '+' | ' ' | '-' | '(' | ')'));
            if !valid {
                errors.push(format!("phone '{phone}' contains invalid characters"));
            }
        }

        errors
    }
}

/// Caller-supplied address rules.
///
/// Rules see the normalized address and return field errors; an empty list
/// means valid.
#[derive(Clone)]
pub struct AddressValidator(Arc<dyn Fn(&Address) -> Vec<String> + Send + Sync>);

impl AddressValidator {
    pub fn new(rules: impl Fn(&Address) -> Vec<String> + Send + Sync + 'static) -> Self {
        Self(Arc::new(rules))
    }

    /// Errors for an already normalized address.
    pub fn check(&self, address: &Address) -> Vec<String> {
        (self.0)(address)
    }

    /// Normalize and check, joining field errors into one validation error.
    pub fn validate(&self, address: &Address, label: &str) -> Result<Address, CommerceError> {
        let normalized = address.normalized();
        let errors = self.check(&normalized);
        if errors.is_empty() {
            Ok(normalized)
        } else {
            Err(CommerceError::Validation(prefixed(label, &errors)))
        }
    }
}

impl Default for AddressValidator {
    fn default() -> Self {
        Self::new(Address::validate)
    }
}

impl fmt::Debug for AddressValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AddressValidator(..)")
    }
}

fn prefixed(label: &str, errors: &[String]) -> String {
    errors
        .iter()
        .map(|e| format!("{label} {e}"))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Shipping and billing addresses submitted together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressPair {
    pub shipping: Address,
    /// Ignored when `billing_same_as_shipping` is set.
    pub billing: Option<Address>,
    pub billing_same_as_shipping: bool,
    pub email: Option<String>,
}

impl AddressPair {
    /// Use the shipping address for billing too.
    pub fn same_as_shipping(shipping: Address) -> Self {
        Self {
            shipping,
            billing: None,
            billing_same_as_shipping: true,
            email: None,
        }
    }

    /// Separate shipping and billing addresses.
    pub fn separate(shipping: Address, billing: Address) -> Self {
        Self {
            shipping,
            billing: Some(billing),
            billing_same_as_shipping: false,
            email: None,
        }
    }

    /// Set contact email.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Normalize both addresses, check them against `rules` and validate the email.
    ///
    /// Returns `(shipping, billing, email)`. All field errors are reported together.
    pub fn resolve(&self, rules: &AddressValidator) -> Result<(Address, Address, Option<String>), CommerceError> {
        let shipping = self.shipping.normalized();
        let billing = match (&self.billing, self.billing_same_as_shipping) {
            (_, true) => Some(shipping.clone()),
            (Some(billing), false) => Some(billing.normalized()),
            (None, false) => None,
        };

        let mut errors: Vec<String> = rules
            .check(&shipping)
            .iter()
            .map(|e| format!("shipping {e}"))
            .collect();
        match &billing {
            Some(billing) if !self.billing_same_as_shipping => {
                errors.extend(rules.check(billing).iter().map(|e| format!("billing {e}")));
            }
            Some(_) => {}
            None => errors.push("billing address is required".to_string()),
        }

        let email = self
            .email
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string);
        if let Some(ref email) = email {
            if !is_plausible_email(email) {
                errors.push(format!("email '{email}' is not valid"));
            }
        }

        match billing {
            Some(billing) if errors.is_empty() => Ok((shipping, billing, email)),
            _ => Err(CommerceError::Validation(errors.join("; "))),
        }
    }
}

pub(crate) fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.ends_with('.'),
        None => false,
    }
}
