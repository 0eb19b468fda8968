//! The shared cache store.
//!
//! One store per session. Entries are addressed by [`QueryKey`] and hold the
//! last-known JSON value of a read. Per key at most one backend call is in
//! flight; concurrent readers share it. When every reader of an in-flight
//! call has gone, the call is cancelled and its result never lands.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};
use turbo_data::{CancellationToken, ServiceError};

use crate::error::CacheError;
use crate::freshness::{should_skip, EntrySnapshot, SkipMode};
use crate::key::QueryKey;
use crate::policy::CacheStrategy;
use crate::retry::RetryPolicy;

/// Shortest period the gc task will tick at.
const MIN_GC_PERIOD: Duration = Duration::from_millis(1);

type SharedFetch = Shared<BoxFuture<'static, Result<Value, ServiceError>>>;

struct InFlight {
    id: u64,
    future: SharedFetch,
    token: CancellationToken,
    waiters: usize,
}

struct CacheEntry {
    data: Option<Value>,
    updated_at: Option<Instant>,
    invalidated: bool,
    strategy: CacheStrategy,
    observers: usize,
    idle_since: Instant,
    in_flight: Option<InFlight>,
    last_error: Option<ServiceError>,
}

impl CacheEntry {
    fn new(strategy: CacheStrategy, now: Instant) -> Self {
        Self {
            data: None,
            updated_at: None,
            invalidated: false,
            strategy,
            observers: 0,
            idle_since: now,
            in_flight: None,
            last_error: None,
        }
    }

    fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            has_data: self.data.is_some(),
            updated_at: self.updated_at,
            invalidated: self.invalidated,
            is_fetching: self.in_flight.is_some(),
            observers: self.observers,
        }
    }

    fn write(&mut self, value: Value, now: Instant) {
        self.data = Some(value);
        self.updated_at = Some(now);
        self.invalidated = false;
        self.last_error = None;
        if self.observers == 0 {
            self.idle_since = now;
        }
    }

    fn is_collectable(&self, now: Instant) -> bool {
        self.observers == 0
            && self.in_flight.is_none()
            && now.saturating_duration_since(self.idle_since) >= self.strategy.retention
    }
}

#[derive(Default)]
struct StoreState {
    entries: HashMap<QueryKey, CacheEntry>,
    next_fetch_id: u64,
}

impl StoreState {
    fn entry(&mut self, key: &QueryKey, strategy: &CacheStrategy, now: Instant) -> &mut CacheEntry {
        self.entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(strategy.clone(), now))
    }

    fn sweep(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| !e.is_collectable(now));
        before - self.entries.len()
    }
}

fn lock(state: &Mutex<StoreState>) -> MutexGuard<'_, StoreState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Outcome of a prefetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchOutcome {
    /// Cached data satisfied the skip mode.
    Skipped,
    /// Data was fetched and written.
    Fetched,
    /// The fetch failed. The failure was logged and swallowed.
    Failed,
}

/// Process-wide key to entry map.
#[derive(Clone)]
pub struct CacheStore {
    state: Arc<Mutex<StoreState>>,
    retry: RetryPolicy,
    default_strategy: CacheStrategy,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("entries", &self.len())
            .field("retry", &self.retry)
            .finish()
    }
}

impl CacheStore {
    /// Create an empty store with the default retry policy.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            retry: RetryPolicy::default(),
            default_strategy: CacheStrategy::default(),
        }
    }

    /// Set the retry policy applied to every fetch.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the strategy used for entries created by plain writes.
    pub fn with_default_strategy(mut self, strategy: CacheStrategy) -> Self {
        self.default_strategy = strategy;
        self
    }

    /// Get the retry policy.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        lock(&self.state).entries.len()
    }

    /// Check if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keys currently held.
    pub fn keys(&self) -> Vec<QueryKey> {
        let mut keys: Vec<_> = lock(&self.state).entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Check whether a key has an entry.
    pub fn contains(&self, key: &QueryKey) -> bool {
        lock(&self.state).entries.contains_key(key)
    }

    /// Point-in-time view of an entry.
    pub fn snapshot(&self, key: &QueryKey) -> Option<EntrySnapshot> {
        lock(&self.state).entries.get(key).map(CacheEntry::snapshot)
    }

    /// Last fetch error recorded for an entry.
    pub fn last_error(&self, key: &QueryKey) -> Option<ServiceError> {
        lock(&self.state)
            .entries
            .get(key)
            .and_then(|e| e.last_error.clone())
    }

    /// Read cached data, whatever its age.
    pub fn get_data<T: DeserializeOwned>(&self, key: &QueryKey) -> Result<Option<T>, CacheError> {
        let value = lock(&self.state)
            .entries
            .get(key)
            .and_then(|e| e.data.clone());
        match value {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Write data under a key with the default strategy.
    pub fn set_data<T: Serialize + ?Sized>(&self, key: &QueryKey, value: &T) -> Result<(), CacheError> {
        let strategy = self.default_strategy.clone();
        self.set_data_with(key, value, &strategy)
    }

    /// Write data under a key, creating the entry with `strategy` if needed.
    pub fn set_data_with<T: Serialize + ?Sized>(
        &self,
        key: &QueryKey,
        value: &T,
        strategy: &CacheStrategy,
    ) -> Result<(), CacheError> {
        let value = serde_json::to_value(value)?;
        let now = Instant::now();
        lock(&self.state).entry(key, strategy, now).write(value, now);
        debug!(key = %key, "cache write");
        Ok(())
    }

    /// Mark every entry under `prefix` as invalidated. Returns the count.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut state = lock(&self.state);
        let mut count = 0;
        for (key, entry) in state.entries.iter_mut() {
            if key.starts_with(prefix) {
                entry.invalidated = true;
                count += 1;
            }
        }
        debug!(prefix = %prefix, count, "cache invalidate");
        count
    }

    /// Drop every entry under `prefix`. Returns the count.
    ///
    /// In-flight calls for removed keys keep running for their waiters but
    /// their results are not written.
    pub fn remove(&self, prefix: &QueryKey) -> usize {
        let mut state = lock(&self.state);
        let before = state.entries.len();
        state.entries.retain(|key, _| !key.starts_with(prefix));
        let count = before - state.entries.len();
        debug!(prefix = %prefix, count, "cache remove");
        count
    }

    /// Drop everything.
    pub fn clear(&self) {
        lock(&self.state).entries.clear();
    }

    /// Register an observer on a key.
    pub fn subscribe(&self, key: &QueryKey) -> Subscription {
        let strategy = self.default_strategy.clone();
        self.subscribe_with(key, &strategy)
    }

    /// Register an observer, creating the entry with `strategy` if needed.
    pub fn subscribe_with(&self, key: &QueryKey, strategy: &CacheStrategy) -> Subscription {
        let now = Instant::now();
        lock(&self.state).entry(key, strategy, now).observers += 1;
        Subscription {
            state: Arc::downgrade(&self.state),
            key: key.clone(),
        }
    }

    /// Read through the cache.
    ///
    /// Cached data is returned when it is fresh, or when it is stale but the
    /// strategy does not refetch on mount. Invalidated or missing data is
    /// fetched, sharing any call already in flight for the key.
    pub async fn query<T, F, Fut>(
        &self,
        key: &QueryKey,
        strategy: &CacheStrategy,
        cancel: &CancellationToken,
        fetcher: F,
    ) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ServiceError>> + Send + 'static,
    {
        let _subscription = self.subscribe_with(key, strategy);

        if let Some(cached) = self.usable_data(key, strategy) {
            debug!(key = %key, "cache hit");
            return Ok(serde_json::from_value(cached)?);
        }
        debug!(key = %key, "cache miss");

        let value = self.fetch(key, strategy, cancel, into_json(fetcher)).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Fetch a key through the backend, bypassing cached data.
    ///
    /// Joins the in-flight call for the key when there is one. The caller's
    /// `cancel` only detaches this caller.
    pub async fn fetch<F, Fut>(
        &self,
        key: &QueryKey,
        strategy: &CacheStrategy,
        cancel: &CancellationToken,
        fetcher: F,
    ) -> Result<Value, ServiceError>
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ServiceError>> + Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(ServiceError::Cancelled);
        }

        let (future, waiter) = self.join_or_start(key, strategy, fetcher);
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ServiceError::Cancelled),
            result = future => result,
        };
        drop(waiter);
        result
    }

    /// Warm a key unless `mode` says the cached data is good enough.
    pub async fn prefetch<T, F, Fut>(
        &self,
        key: &QueryKey,
        strategy: &CacheStrategy,
        mode: SkipMode,
        fetcher: F,
    ) -> PrefetchOutcome
    where
        T: Serialize + Send + 'static,
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ServiceError>> + Send + 'static,
    {
        if should_skip(self.snapshot(key).as_ref(), strategy, mode, Instant::now()) {
            debug!(key = %key, ?mode, "prefetch skipped");
            return PrefetchOutcome::Skipped;
        }

        let cancel = CancellationToken::new();
        match self.fetch(key, strategy, &cancel, into_json(fetcher)).await {
            Ok(_) => PrefetchOutcome::Fetched,
            Err(error) => {
                warn!(key = %key, %error, "prefetch failed");
                PrefetchOutcome::Failed
            }
        }
    }

    /// Evict idle entries past their retention window. Returns the count.
    pub fn collect_garbage(&self) -> usize {
        let removed = lock(&self.state).sweep(Instant::now());
        if removed > 0 {
            debug!(removed, "cache gc");
        }
        removed
    }

    /// Run [`collect_garbage`](Self::collect_garbage) every `period`.
    ///
    /// A zero period is raised to one millisecond. The task ends on its own
    /// once the store is dropped.
    pub fn spawn_gc(&self, period: Duration) -> JoinHandle<()> {
        let period = if period.is_zero() {
            warn!("gc period of zero raised to {:?}", MIN_GC_PERIOD);
            MIN_GC_PERIOD
        } else {
            period
        };
        let state = Arc::downgrade(&self.state);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(state) = state.upgrade() else {
                    break;
                };
                let removed = lock(&state).sweep(Instant::now());
                if removed > 0 {
                    debug!(removed, "cache gc");
                }
            }
        })
    }

    /// The window regained focus. Returns the number of entries marked.
    pub fn notify_window_focus(&self) -> usize {
        self.invalidate_stale_where(|s| s.refetch_on_window_focus)
    }

    /// The network came back. Returns the number of entries marked.
    pub fn notify_reconnect(&self) -> usize {
        self.invalidate_stale_where(|s| s.refetch_on_reconnect)
    }

    fn invalidate_stale_where(&self, trigger: impl Fn(&CacheStrategy) -> bool) -> usize {
        let now = Instant::now();
        let mut state = lock(&self.state);
        let mut count = 0;
        for entry in state.entries.values_mut() {
            if entry.data.is_some()
                && trigger(&entry.strategy)
                && !entry.snapshot().is_fresh(&entry.strategy, now)
            {
                entry.invalidated = true;
                count += 1;
            }
        }
        count
    }

    fn usable_data(&self, key: &QueryKey, strategy: &CacheStrategy) -> Option<Value> {
        let now = Instant::now();
        let state = lock(&self.state);
        let entry = state.entries.get(key)?;
        if entry.invalidated {
            return None;
        }
        let snapshot = entry.snapshot();
        if snapshot.is_fresh(strategy, now) || !strategy.refetch_on_mount {
            return entry.data.clone();
        }
        None
    }

    fn join_or_start<F, Fut>(&self, key: &QueryKey, strategy: &CacheStrategy, fetcher: F) -> (SharedFetch, Waiter)
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ServiceError>> + Send + 'static,
    {
        let now = Instant::now();
        let mut state = lock(&self.state);
        state.next_fetch_id += 1;
        let id = state.next_fetch_id;

        let entry = state.entry(key, strategy, now);
        entry.strategy = strategy.clone();

        if let Some(in_flight) = entry.in_flight.as_mut() {
            in_flight.waiters += 1;
            debug!(key = %key, waiters = in_flight.waiters, "joining in-flight fetch");
            let waiter = Waiter {
                state: Arc::downgrade(&self.state),
                key: key.clone(),
                fetch_id: in_flight.id,
            };
            return (in_flight.future.clone(), waiter);
        }

        let token = CancellationToken::new();
        let future = run_fetch(
            Arc::downgrade(&self.state),
            key.clone(),
            id,
            self.retry.clone(),
            token.clone(),
            fetcher,
        )
        .boxed()
        .shared();

        entry.in_flight = Some(InFlight {
            id,
            future: future.clone(),
            token,
            waiters: 1,
        });

        let waiter = Waiter {
            state: Arc::downgrade(&self.state),
            key: key.clone(),
            fetch_id: id,
        };
        (future, waiter)
    }
}

fn into_json<T, F, Fut>(
    fetcher: F,
) -> impl Fn(CancellationToken) -> BoxFuture<'static, Result<Value, ServiceError>> + Send + Sync + 'static
where
    T: Serialize + Send + 'static,
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ServiceError>> + Send + 'static,
{
    move |token| {
        let call = fetcher(token);
        async move {
            let value = call.await?;
            serde_json::to_value(value).map_err(ServiceError::from)
        }
        .boxed()
    }
}

async fn run_fetch<F, Fut>(
    state: Weak<Mutex<StoreState>>,
    key: QueryKey,
    id: u64,
    retry: RetryPolicy,
    token: CancellationToken,
    fetcher: F,
) -> Result<Value, ServiceError>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ServiceError>> + Send + 'static,
{
    debug!(key = %key, "fetch started");
    let result = retry.run(&token, || fetcher(token.clone())).await;
    if let Some(state) = state.upgrade() {
        complete_fetch(&state, &key, id, &result);
    }
    result
}

fn complete_fetch(
    state: &Mutex<StoreState>,
    key: &QueryKey,
    id: u64,
    result: &Result<Value, ServiceError>,
) {
    let mut state = lock(state);
    let Some(entry) = state.entries.get_mut(key) else {
        debug!(key = %key, "entry removed while fetching, result dropped");
        return;
    };
    if entry.in_flight.as_ref().map(|f| f.id) != Some(id) {
        debug!(key = %key, "superseded fetch result dropped");
        return;
    }
    entry.in_flight = None;
    match result {
        Ok(value) => entry.write(value.clone(), Instant::now()),
        Err(ServiceError::Cancelled) => {}
        Err(error) => entry.last_error = Some(error.clone()),
    }
}

/// One caller waiting on an in-flight fetch.
struct Waiter {
    state: Weak<Mutex<StoreState>>,
    key: QueryKey,
    fetch_id: u64,
}

impl Drop for Waiter {
    fn drop(&mut self) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let mut state = lock(&state);
        let Some(entry) = state.entries.get_mut(&self.key) else {
            return;
        };
        let abandoned = match entry.in_flight.as_mut() {
            Some(f) if f.id == self.fetch_id => {
                f.waiters = f.waiters.saturating_sub(1);
                f.waiters == 0
            }
            _ => false,
        };
        if abandoned {
            if let Some(f) = entry.in_flight.take() {
                f.token.cancel();
                debug!(key = %self.key, "abandoned fetch cancelled");
            }
        }
    }
}

/// An active observer of a cache entry.
///
/// While any subscription is held the entry is never collected. Retention is
/// counted from the moment the last one is dropped.
#[derive(Debug)]
pub struct Subscription {
    state: Weak<Mutex<StoreState>>,
    key: QueryKey,
}

impl Subscription {
    /// The observed key.
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(state) = self.state.upgrade() else {
            return;
        };
        let mut state = lock(&state);
        if let Some(entry) = state.entries.get_mut(&self.key) {
            entry.observers = entry.observers.saturating_sub(1);
            if entry.observers == 0 {
                entry.idle_since = Instant::now();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Namespace;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(parts: &[&str]) -> QueryKey {
        parts
            .iter()
            .fold(Namespace::default().key(), |k, p| k.with(*p))
    }

    fn counting(
        calls: &Arc<AtomicUsize>,
        value: &'static str,
    ) -> impl Fn(CancellationToken) -> BoxFuture<'static, Result<String, ServiceError>> + Send + Sync + 'static
    {
        let calls = calls.clone();
        move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(value.to_string())
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_reads_share_one_call() {
        let store = CacheStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let k = key(&["products", "detail", "p1"]);
        let s = CacheStrategy::semi_static();
        let cancel = CancellationToken::new();

        let (a, b) = tokio::join!(
            store.query::<String, _, _>(&k, &s, &cancel, counting(&calls, "shirt")),
            store.query::<String, _, _>(&k, &s, &cancel, counting(&calls, "shirt")),
        );
        assert_eq!(a.unwrap(), "shirt");
        assert_eq!(b.unwrap(), "shirt");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_data_is_served_from_cache() {
        let store = CacheStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let k = key(&["regions", "list"]);
        let s = CacheStrategy::static_data();
        let cancel = CancellationToken::new();

        store.query::<String, _, _>(&k, &s, &cancel, counting(&calls, "eu")).await.unwrap();
        store.query::<String, _, _>(&k, &s, &cancel, counting(&calls, "eu")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_data_refetches_on_mount() {
        let store = CacheStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let k = key(&["cart"]);
        let s = CacheStrategy::realtime().with_stale_time(Duration::from_secs(5));
        let cancel = CancellationToken::new();

        store.query::<String, _, _>(&k, &s, &cancel, counting(&calls, "v1")).await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;
        let v = store
            .query::<String, _, _>(&k, &s, &cancel, counting(&calls, "v2"))
            .await
            .unwrap();
        assert_eq!(v, "v2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // stale but the strategy does not refetch on mount
        let lazy = s.clone().with_refetch_on_mount(false);
        tokio::time::advance(Duration::from_secs(6)).await;
        let v = store
            .query::<String, _, _>(&k, &lazy, &cancel, counting(&calls, "v3"))
            .await
            .unwrap();
        assert_eq!(v, "v2");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_prefix_forces_refetch() {
        let store = CacheStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let k = key(&["orders", "list"]);
        let s = CacheStrategy::static_data();
        let cancel = CancellationToken::new();

        store.query::<String, _, _>(&k, &s, &cancel, counting(&calls, "a")).await.unwrap();
        assert_eq!(store.invalidate(&key(&["orders"])), 1);
        assert_eq!(store.invalidate(&key(&["customer"])), 0);
        store.query::<String, _, _>(&k, &s, &cancel, counting(&calls, "b")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!store.snapshot(&k).unwrap().invalidated);
    }

    #[tokio::test]
    async fn test_set_get_and_remove() {
        let store = CacheStore::new();
        let k = key(&["auth", "customer"]);
        store.set_data(&k, &vec![1, 2, 3]).unwrap();
        assert_eq!(store.get_data::<Vec<u32>>(&k).unwrap(), Some(vec![1, 2, 3]));
        assert!(store.get_data::<String>(&k).is_err());

        store.set_data(&key(&["auth", "session"]), "tok").unwrap();
        store.set_data(&key(&["cart"]), "c").unwrap();
        assert_eq!(store.remove(&key(&["auth"])), 2);
        assert_eq!(store.keys(), vec![key(&["cart"])]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_caller_gets_cancelled_error() {
        let store = CacheStore::new();
        let k = key(&["products", "list"]);
        let s = CacheStrategy::semi_static();
        let cancel = CancellationToken::new();

        let fetcher = |token: CancellationToken| async move {
            token.cancelled().await;
            Err::<String, _>(ServiceError::Cancelled)
        };

        let reader = store.query::<String, _, _>(&k, &s, &cancel, fetcher);
        let canceller = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            cancel.cancel();
        };
        let (result, ()) = tokio::join!(reader, canceller);
        assert!(matches!(result, Err(CacheError::Fetch(ServiceError::Cancelled))));

        // it was the only waiter, so the underlying call is gone too
        let snap = store.snapshot(&k).unwrap();
        assert!(!snap.is_fetching);
        assert!(!snap.has_data);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_waiter_keeps_call_alive() {
        let store = CacheStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let k = key(&["products", "detail", "p9"]);
        let s = CacheStrategy::semi_static();
        let leaving = CancellationToken::new();
        let staying = CancellationToken::new();

        let gone = store.query::<String, _, _>(&k, &s, &leaving, counting(&calls, "x"));
        let kept = store.query::<String, _, _>(&k, &s, &staying, counting(&calls, "x"));
        let canceller = async {
            tokio::time::sleep(Duration::from_millis(2)).await;
            leaving.cancel();
        };
        let (gone, kept, ()) = tokio::join!(gone, kept, canceller);

        assert!(matches!(gone, Err(CacheError::Fetch(ServiceError::Cancelled))));
        assert_eq!(kept.unwrap(), "x");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.get_data::<String>(&k).unwrap().as_deref(), Some("x"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_prefetch_skip_modes() {
        let store = CacheStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let k = key(&["categories", "list"]);
        let s = CacheStrategy::static_data().with_stale_time(Duration::from_secs(10));

        let first = store.prefetch(&k, &s, SkipMode::Fresh, counting(&calls, "c")).await;
        assert_eq!(first, PrefetchOutcome::Fetched);
        let second = store.prefetch(&k, &s, SkipMode::Fresh, counting(&calls, "c")).await;
        assert_eq!(second, PrefetchOutcome::Skipped);

        tokio::time::advance(Duration::from_secs(11)).await;
        let any = store.prefetch(&k, &s, SkipMode::Any, counting(&calls, "c")).await;
        assert_eq!(any, PrefetchOutcome::Skipped);
        let fresh = store.prefetch(&k, &s, SkipMode::Fresh, counting(&calls, "c")).await;
        assert_eq!(fresh, PrefetchOutcome::Fetched);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_prefetch_failure_is_swallowed() {
        let store = CacheStore::new().with_retry(RetryPolicy::none());
        let k = key(&["products", "detail", "missing"]);
        let outcome = store
            .prefetch(&k, &CacheStrategy::default(), SkipMode::Fresh, |_| async {
                Err::<String, _>(ServiceError::http(500, "down"))
            })
            .await;
        assert_eq!(outcome, PrefetchOutcome::Failed);
        assert_eq!(store.last_error(&k), Some(ServiceError::http(500, "down")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gc_respects_observers_and_retention() {
        let store = CacheStore::new();
        let s = CacheStrategy::realtime().with_retention(Duration::from_secs(60));
        let watched = key(&["cart", "active"]);
        let idle = key(&["cart", "old"]);
        store.set_data_with(&watched, "a", &s).unwrap();
        store.set_data_with(&idle, "b", &s).unwrap();

        let sub = store.subscribe(&watched);
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(store.collect_garbage(), 1);
        assert!(store.contains(&watched));
        assert!(!store.contains(&idle));

        drop(sub);
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(store.collect_garbage(), 0);
        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(store.collect_garbage(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_gc_with_zero_period() {
        let store = CacheStore::new();
        let s = CacheStrategy::realtime().with_retention(Duration::from_millis(10));
        store.set_data_with(&key(&["cart", "old"]), "b", &s).unwrap();

        let gc = store.spawn_gc(Duration::ZERO);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!gc.is_finished());
        assert!(store.is_empty());
        gc.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_focus_marks_only_stale_focus_entries() {
        let store = CacheStore::new();
        let realtime = CacheStrategy::realtime().with_stale_time(Duration::from_secs(1));
        let fixed = CacheStrategy::static_data().with_stale_time(Duration::from_secs(1));
        store.set_data_with(&key(&["cart"]), "c", &realtime).unwrap();
        store.set_data_with(&key(&["regions"]), "r", &fixed).unwrap();

        assert_eq!(store.notify_window_focus(), 0);
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.notify_window_focus(), 1);
        assert!(store.snapshot(&key(&["cart"])).unwrap().invalidated);
        assert!(!store.snapshot(&key(&["regions"])).unwrap().invalidated);
        assert_eq!(store.notify_reconnect(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_entry_is_not_resurrected_by_late_result() {
        let store = CacheStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let k = key(&["auth", "customer"]);
        let s = CacheStrategy::user_data();
        let cancel = CancellationToken::new();

        let reader = store.query::<String, _, _>(&k, &s, &cancel, counting(&calls, "me"));
        let remover = async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            store.remove(&key(&["auth"]));
        };
        let (result, ()) = tokio::join!(reader, remover);
        assert_eq!(result.unwrap(), "me");
        assert!(!store.contains(&k));
    }
}
