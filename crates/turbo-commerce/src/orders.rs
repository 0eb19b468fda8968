//! Customer order history.
//!
//! Orders are user data: an anonymous visitor reading the list gets an
//! empty page rather than an error.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use turbo_cache::{Namespace, StrategyKind};
use turbo_query::{DomainKeys, EntityQueries, EntityService, Identify, QueryClient, ReadService};

use crate::cart::LineItem;
use crate::ids::OrderId;

pub const DOMAIN: &str = "orders";

/// Key builder for orders.
pub fn keys(namespace: &Namespace) -> DomainKeys {
    DomainKeys::new(namespace.clone(), DOMAIN)
}

/// A placed order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub display_id: Option<u64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub currency_code: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn new(id: impl Into<OrderId>) -> Self {
        Self {
            id: id.into(),
            display_id: None,
            email: None,
            status: "pending".to_string(),
            currency_code: None,
            items: Vec::new(),
            total: 0,
            created_at: None,
        }
    }
}

impl Identify for Order {
    fn id(&self) -> &str {
        self.id.as_str()
    }
}

/// Order list filters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderListParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Sort expression, e.g. `-created_at`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
}

pub type OrderQueries = EntityQueries<Order, OrderListParams>;

/// Order operations on the user-data profile.
pub fn order_queries(
    client: &QueryClient,
    reader: Arc<dyn ReadService<Order, OrderListParams>>,
) -> OrderQueries {
    client.entity(DOMAIN, EntityService::from_reader(reader), StrategyKind::UserData)
}
