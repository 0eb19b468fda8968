//! Cross-domain cache synchronization.
//!
//! Session events change what many domains would return. Each event maps to
//! a rule listing key prefixes to invalidate and prefixes to remove. Rules
//! are built from each domain's exported key functions.

use tracing::debug;
use turbo_cache::{CacheStore, Namespace, QueryKey};

use crate::{auth, customer, orders};

/// Session events that affect cached data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncEvent {
    Login,
    Register,
    Logout,
    CustomerProfileUpdated,
}

/// Cache effects of one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRule {
    pub event: SyncEvent,
    /// Prefixes marked stale.
    pub invalidate: Vec<QueryKey>,
    /// Prefixes dropped.
    pub remove: Vec<QueryKey>,
}

impl SyncRule {
    pub fn new(event: SyncEvent) -> Self {
        Self {
            event,
            invalidate: Vec::new(),
            remove: Vec::new(),
        }
    }

    pub fn invalidating(mut self, prefix: QueryKey) -> Self {
        self.invalidate.push(prefix);
        self
    }

    pub fn removing(mut self, prefix: QueryKey) -> Self {
        self.remove.push(prefix);
        self
    }
}

/// Entries touched by applying an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub invalidated: usize,
    pub removed: usize,
}

/// Applies event rules to a store.
#[derive(Debug, Clone)]
pub struct CacheSync {
    store: CacheStore,
    rules: Vec<SyncRule>,
}

impl CacheSync {
    /// A synchronizer with no rules.
    pub fn new(store: CacheStore) -> Self {
        Self {
            store,
            rules: Vec::new(),
        }
    }

    /// The storefront rules.
    ///
    /// Login, register and logout make customer, orders and the signed-in
    /// customer stale. Logout also drops everything under `auth`. A profile
    /// update makes the profile and the signed-in customer stale.
    pub fn standard(store: CacheStore, namespace: &Namespace) -> Self {
        let session = |event| {
            SyncRule::new(event)
                .invalidating(customer::keys::all(namespace))
                .invalidating(orders::keys(namespace).all())
                .invalidating(auth::keys::customer(namespace))
        };

        Self::new(store)
            .with_rule(session(SyncEvent::Login))
            .with_rule(session(SyncEvent::Register))
            .with_rule(session(SyncEvent::Logout).removing(auth::keys::all(namespace)))
            .with_rule(
                SyncRule::new(SyncEvent::CustomerProfileUpdated)
                    .invalidating(customer::keys::profile(namespace))
                    .invalidating(auth::keys::customer(namespace)),
            )
    }

    /// Add a rule. Several rules may share an event.
    pub fn with_rule(mut self, rule: SyncRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[SyncRule] {
        &self.rules
    }

    /// Apply every rule for `event`. Removals run before invalidations.
    pub fn apply(&self, event: SyncEvent) -> SyncReport {
        let mut report = SyncReport::default();
        for rule in self.rules.iter().filter(|r| r.event == event) {
            for prefix in &rule.remove {
                report.removed += self.store.remove(prefix);
            }
            for prefix in &rule.invalidate {
                report.invalidated += self.store.invalidate(prefix);
            }
        }
        debug!(?event, invalidated = report.invalidated, removed = report.removed, "cache sync");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (CacheSync, CacheStore, Namespace) {
        let store = CacheStore::new();
        let ns = Namespace::default();
        for key in [
            auth::keys::customer(&ns),
            customer::keys::profile(&ns),
            customer::keys::addresses(&ns),
            orders::keys(&ns).lists(),
            ns.key().with("products").with("list"),
        ] {
            store.set_data(&key, &1).unwrap();
        }
        (CacheSync::standard(store.clone(), &ns), store, ns)
    }

    fn stale(store: &CacheStore, key: &QueryKey) -> bool {
        store.snapshot(key).is_some_and(|s| s.invalidated)
    }

    #[test]
    fn test_login_invalidates_session_data() {
        let (sync, store, ns) = seeded();

        let report = sync.apply(SyncEvent::Login);
        assert_eq!(report, SyncReport { invalidated: 4, removed: 0 });
        assert!(stale(&store, &auth::keys::customer(&ns)));
        assert!(stale(&store, &customer::keys::profile(&ns)));
        assert!(stale(&store, &orders::keys(&ns).lists()));
        assert!(!stale(&store, &ns.key().with("products").with("list")));
    }

    #[test]
    fn test_logout_removes_auth() {
        let (sync, store, ns) = seeded();

        let report = sync.apply(SyncEvent::Logout);
        assert_eq!(report.removed, 1);
        assert!(!store.contains(&auth::keys::customer(&ns)));
        assert!(stale(&store, &customer::keys::addresses(&ns)));
    }

    #[test]
    fn test_profile_update_is_narrow() {
        let (sync, store, ns) = seeded();

        sync.apply(SyncEvent::CustomerProfileUpdated);
        assert!(stale(&store, &customer::keys::profile(&ns)));
        assert!(stale(&store, &auth::keys::customer(&ns)));
        assert!(!stale(&store, &customer::keys::addresses(&ns)));
        assert!(!stale(&store, &orders::keys(&ns).lists()));
    }

    #[test]
    fn test_custom_rule() {
        let store = CacheStore::new();
        let ns = Namespace::default();
        let wishlist = ns.key().with("wishlist");
        store.set_data(&wishlist, &1).unwrap();

        let sync = CacheSync::new(store.clone())
            .with_rule(SyncRule::new(SyncEvent::Logout).removing(wishlist.clone()));
        assert_eq!(sync.apply(SyncEvent::Login), SyncReport::default());
        assert_eq!(sync.apply(SyncEvent::Logout).removed, 1);
        assert!(store.is_empty());
    }
}
