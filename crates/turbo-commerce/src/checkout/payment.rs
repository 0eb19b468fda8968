//! Payment provider and session types.

use serde::{Deserialize, Serialize};

use crate::ids::PaymentProviderId;

/// A payment provider enabled for a region.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentProvider {
    pub id: PaymentProviderId,
    #[serde(default = "enabled")]
    pub is_enabled: bool,
}

fn enabled() -> bool {
    true
}

/// Payment sessions for a cart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentCollection {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub payment_sessions: Vec<PaymentSession>,
}

impl PaymentCollection {
    /// The session for a provider.
    pub fn session(&self, provider_id: &PaymentProviderId) -> Option<&PaymentSession> {
        self.payment_sessions.iter().find(|s| &s.provider_id == provider_id)
    }
}

/// One provider's session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentSession {
    pub id: String,
    pub provider_id: PaymentProviderId,
    #[serde(default)]
    pub status: String,
    /// Provider data, e.g. a client secret.
    #[serde(default)]
    pub data: serde_json::Value,
}
