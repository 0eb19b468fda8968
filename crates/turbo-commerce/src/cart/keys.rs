//! Cart cache keys.
//!
//! `[ns.., "cart", "active", cart_id | null, region_id | null]`

use turbo_cache::{Namespace, QueryKey};

use crate::ids::{CartId, RegionId};

pub const DOMAIN: &str = "cart";

/// Every cart entry.
pub fn all(namespace: &Namespace) -> QueryKey {
    namespace.key().with(DOMAIN)
}

/// Every entry for one cart id, across regions.
pub fn active_prefix(namespace: &Namespace, cart_id: Option<&CartId>) -> QueryKey {
    all(namespace).with("active").with(cart_id.map(CartId::as_str))
}

/// The active cart for a region.
pub fn active(namespace: &Namespace, cart_id: Option<&CartId>, region_id: Option<&RegionId>) -> QueryKey {
    active_prefix(namespace, cart_id).with(region_id.map(RegionId::as_str))
}
