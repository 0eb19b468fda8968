use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use turbo_query::Identify;

use crate::checkout::Address;
use crate::ids::{AddressId, CustomerId};

/// A registered customer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub id: CustomerId,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub addresses: Vec<CustomerAddress>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Customer {
    pub fn new(id: impl Into<CustomerId>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            first_name: None,
            last_name: None,
            phone: None,
            addresses: Vec::new(),
            created_at: None,
        }
    }

    /// First and last name, when either is known.
    pub fn full_name(&self) -> Option<String> {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(name), None) | (None, Some(name)) => Some(name.to_string()),
            (None, None) => None,
        }
    }

    pub fn default_shipping_address(&self) -> Option<&CustomerAddress> {
        self.addresses.iter().find(|a| a.is_default_shipping)
    }

    pub fn address(&self, id: &AddressId) -> Option<&CustomerAddress> {
        self.addresses.iter().find(|a| a.address.id.as_ref() == Some(id))
    }
}

impl Identify for Customer {
    fn id(&self) -> &str {
        self.id.as_str()
    }
}

/// A saved address book entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerAddress {
    #[serde(flatten)]
    pub address: Address,
    #[serde(default)]
    pub is_default_shipping: bool,
    #[serde(default)]
    pub is_default_billing: bool,
}

/// Body for creating the customer record after registration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateCustomerInput {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Profile changes. Unset fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateCustomerInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl UpdateCustomerInput {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none() && self.phone.is_none()
    }
}
