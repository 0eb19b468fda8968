//! The query client: one store, one namespace, one set of strategies.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;
use turbo_cache::{CacheStore, CacheStrategy, Canonicalizer, Namespace, StrategyKind, StrategySet};
use turbo_data::RegionContext;

use crate::config::ClientConfig;
use crate::factory::EntityQueries;
use crate::keys::DomainKeys;
use crate::prefetch::PrefetchScheduler;
use crate::service::EntityService;

/// Entry point for building domain operations.
#[derive(Debug, Clone)]
pub struct QueryClient {
    store: CacheStore,
    namespace: Namespace,
    canonicalizer: Canonicalizer,
    strategies: StrategySet,
    region: RegionContext,
    scheduler: Arc<PrefetchScheduler>,
    prefetch_delay: Duration,
    gc_interval: Duration,
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new(Namespace::default())
    }
}

impl QueryClient {
    /// Create a client with a fresh store.
    pub fn new(namespace: Namespace) -> Self {
        Self {
            store: CacheStore::new(),
            namespace,
            canonicalizer: Canonicalizer::default(),
            strategies: StrategySet::default(),
            region: RegionContext::default(),
            scheduler: Arc::new(PrefetchScheduler::new()),
            prefetch_delay: Duration::from_millis(200),
            gc_interval: Duration::from_secs(60),
        }
    }

    /// Create a client from configuration.
    pub fn from_config(config: &ClientConfig) -> Self {
        let mut client = Self::new(config.namespace()).with_strategies(config.strategy_set());
        client.store = CacheStore::new().with_retry(config.retry_policy());
        client.prefetch_delay = config.prefetch_delay();
        client.gc_interval = config.gc_interval();
        client
    }

    /// Use an existing store.
    pub fn with_store(mut self, store: CacheStore) -> Self {
        self.store = store;
        self
    }

    /// Use a different canonicalizer.
    pub fn with_canonicalizer(mut self, canonicalizer: Canonicalizer) -> Self {
        self.canonicalizer = canonicalizer;
        self
    }

    /// Replace the strategy presets.
    pub fn with_strategies(mut self, strategies: StrategySet) -> Self {
        self.strategies = strategies;
        self
    }

    /// Set the garbage collection interval used by [`spawn_gc`](Self::spawn_gc).
    pub fn with_gc_interval(mut self, interval: Duration) -> Self {
        self.gc_interval = interval;
        self
    }

    /// Set the ambient region context.
    pub fn with_region(mut self, region: RegionContext) -> Self {
        self.region = region;
        self
    }

    /// Get the store.
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Get the namespace.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Get the region context.
    pub fn region(&self) -> &RegionContext {
        &self.region
    }

    /// Get the garbage collection interval.
    pub fn gc_interval(&self) -> Duration {
        self.gc_interval
    }

    /// Get the prefetch scheduler.
    pub fn scheduler(&self) -> &Arc<PrefetchScheduler> {
        &self.scheduler
    }

    /// The active profile for a preset.
    pub fn strategy(&self, kind: StrategyKind) -> CacheStrategy {
        self.strategies.get(kind)
    }

    /// Key builder for a domain.
    pub fn keys(&self, domain: &str) -> DomainKeys {
        DomainKeys::new(self.namespace.clone(), domain).with_canonicalizer(self.canonicalizer.clone())
    }

    /// Build the operations for a domain.
    pub fn entity<E, L, D, C, U>(
        &self,
        domain: &str,
        service: EntityService<E, L, D, C, U>,
        kind: StrategyKind,
    ) -> EntityQueries<E, L, D, C, U>
    where
        E: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
        L: Serialize + Clone + Send + Sync + 'static,
        D: Serialize + Clone + Send + Sync + 'static,
        C: Send + 'static,
        U: Send + 'static,
    {
        EntityQueries::new(self.keys(domain), service, self.store.clone())
            .with_strategy(self.strategy(kind))
            .with_region(self.region.clone())
            .with_scheduler(self.scheduler.clone(), self.prefetch_delay)
    }

    /// Start periodic garbage collection on the store at the configured interval.
    pub fn spawn_gc(&self) -> JoinHandle<()> {
        self.store.spawn_gc(self.gc_interval)
    }
}
