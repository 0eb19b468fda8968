//! Generated read, mutate and prefetch operations for one domain.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use turbo_cache::{CacheError, CacheStore, CacheStrategy, PrefetchOutcome, QueryKey};
use turbo_data::{
    CancellationToken, ListRequest, ListResponse, ListResult, Pagination, RegionContext, ServiceError,
};

use crate::error::QueryError;
use crate::input::{DetailInput, ListInput, PrefetchOptions, RegionAware};
use crate::keys::DomainKeys;
use crate::prefetch::PrefetchScheduler;
use crate::service::{EntityService, Identify};

/// Rewrites params before they reach the key builder and the service.
pub type ParamsFn<P> = Arc<dyn Fn(P, &RegionContext) -> P + Send + Sync>;

/// Decides whether a backend error means "no such entity".
pub type NotFoundFn = Arc<dyn Fn(&ServiceError) -> bool + Send + Sync>;

/// Read, mutate and prefetch operations for entity `E`.
///
/// `L` are list params, `D` detail params, `C` and `U` the create and update
/// inputs. Cloning is cheap; clones share the store and the scheduler.
pub struct EntityQueries<E, L, D = (), C = (), U = ()> {
    keys: DomainKeys,
    service: EntityService<E, L, D, C, U>,
    store: CacheStore,
    strategy: CacheStrategy,
    region: RegionContext,
    list_params: Option<ParamsFn<L>>,
    detail_params: Option<ParamsFn<D>>,
    is_not_found: NotFoundFn,
    unauthorized_as_empty: bool,
    invalidate_on_write: Vec<QueryKey>,
    scheduler: Arc<PrefetchScheduler>,
    prefetch_delay: Duration,
}

impl<E, L, D, C, U> Clone for EntityQueries<E, L, D, C, U> {
    fn clone(&self) -> Self {
        Self {
            keys: self.keys.clone(),
            service: self.service.clone(),
            store: self.store.clone(),
            strategy: self.strategy.clone(),
            region: self.region.clone(),
            list_params: self.list_params.clone(),
            detail_params: self.detail_params.clone(),
            is_not_found: self.is_not_found.clone(),
            unauthorized_as_empty: self.unauthorized_as_empty,
            invalidate_on_write: self.invalidate_on_write.clone(),
            scheduler: self.scheduler.clone(),
            prefetch_delay: self.prefetch_delay,
        }
    }
}

impl<E, L, D, C, U> std::fmt::Debug for EntityQueries<E, L, D, C, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityQueries")
            .field("domain", &self.keys.domain())
            .field("service", &self.service)
            .field("strategy", &self.strategy.kind)
            .field("region", &self.region)
            .finish()
    }
}

impl<E, L, D, C, U> EntityQueries<E, L, D, C, U>
where
    E: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    L: Serialize + Clone + Send + Sync + 'static,
    D: Serialize + Clone + Send + Sync + 'static,
    C: Send + 'static,
    U: Send + 'static,
{
    /// Wire a service to a store.
    pub fn new(keys: DomainKeys, service: EntityService<E, L, D, C, U>, store: CacheStore) -> Self {
        Self {
            keys,
            service,
            store,
            strategy: CacheStrategy::default(),
            region: RegionContext::default(),
            list_params: None,
            detail_params: None,
            is_not_found: Arc::new(ServiceError::is_not_found),
            unauthorized_as_empty: true,
            invalidate_on_write: Vec::new(),
            scheduler: Arc::new(PrefetchScheduler::new()),
            prefetch_delay: Duration::from_millis(200),
        }
    }

    /// Set the default strategy.
    pub fn with_strategy(mut self, strategy: CacheStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the ambient region context.
    pub fn with_region(mut self, region: RegionContext) -> Self {
        self.region = region;
        self
    }

    /// Rewrite list params before keying and calling the service.
    pub fn with_list_params(mut self, f: impl Fn(L, &RegionContext) -> L + Send + Sync + 'static) -> Self {
        self.list_params = Some(Arc::new(f));
        self
    }

    /// Rewrite detail params before keying and calling the service.
    pub fn with_detail_params(mut self, f: impl Fn(D, &RegionContext) -> D + Send + Sync + 'static) -> Self {
        self.detail_params = Some(Arc::new(f));
        self
    }

    /// Fill unset list region fields from the region context.
    pub fn with_list_region(self) -> Self
    where
        L: RegionAware,
    {
        self.with_list_params(|mut params, region| {
            params.apply_region(region);
            params
        })
    }

    /// Fill unset detail region fields from the region context.
    pub fn with_detail_region(self) -> Self
    where
        D: RegionAware,
    {
        self.with_detail_params(|mut params, region| {
            params.apply_region(region);
            params
        })
    }

    /// Replace the not-found predicate.
    pub fn with_not_found(mut self, f: impl Fn(&ServiceError) -> bool + Send + Sync + 'static) -> Self {
        self.is_not_found = Arc::new(f);
        self
    }

    /// Surface 401/403 on reads instead of returning an empty result.
    pub fn surface_unauthorized(mut self) -> Self {
        self.unauthorized_as_empty = false;
        self
    }

    /// Invalidate another prefix after every successful write.
    pub fn invalidate_on_write(mut self, prefix: QueryKey) -> Self {
        self.invalidate_on_write.push(prefix);
        self
    }

    /// Share a prefetch scheduler.
    pub fn with_scheduler(mut self, scheduler: Arc<PrefetchScheduler>, delay: Duration) -> Self {
        self.scheduler = scheduler;
        self.prefetch_delay = delay;
        self
    }

    /// Get the key builder.
    pub fn keys(&self) -> &DomainKeys {
        &self.keys
    }

    /// Get the store.
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Get the default strategy.
    pub fn strategy(&self) -> &CacheStrategy {
        &self.strategy
    }

    /// Get the region context.
    pub fn region(&self) -> &RegionContext {
        &self.region
    }

    fn missing(&self, operation: &'static str) -> QueryError {
        QueryError::configuration(self.keys.domain(), operation)
    }

    fn list_request(&self, input: &ListInput<L>) -> ListRequest<L> {
        let params = match &self.list_params {
            Some(f) => f(input.params.clone(), &self.region),
            None => input.params.clone(),
        };
        ListRequest {
            params,
            limit: input.limit,
            offset: input.effective_offset(),
        }
    }

    fn detail_params(&self, params: D) -> D {
        match &self.detail_params {
            Some(f) => f(params, &self.region),
            None => params,
        }
    }

    // not-found and, unless surfaced, 401/403 become "nothing there"
    fn is_absent(&self, error: &CacheError) -> bool {
        error.service_error().is_some_and(|e| {
            (self.is_not_found)(e) || (self.unauthorized_as_empty && e.is_unauthorized())
        })
    }

    /// The key a list read would use.
    pub fn list_key(&self, input: &ListInput<L>) -> Result<QueryKey, QueryError> {
        Ok(self.keys.list(&self.list_request(input))?)
    }

    /// The key a detail read would use.
    pub fn detail_key(&self, id: &str, params: D) -> Result<QueryKey, QueryError> {
        Ok(self.keys.detail(id, &self.detail_params(params))?)
    }

    /// Read a page of entities.
    ///
    /// Returns `None` for a disabled read. A not-found or unauthenticated
    /// backend answer yields an empty page.
    pub async fn list(
        &self,
        input: ListInput<L>,
        cancel: &CancellationToken,
    ) -> Result<Option<ListResult<E>>, QueryError> {
        if !input.options.enabled {
            return Ok(None);
        }
        let list = self.service.list.clone().ok_or_else(|| self.missing("list"))?;

        let request = self.list_request(&input);
        let key = self.keys.list(&request)?;
        let strategy = input.options.strategy.clone().unwrap_or_else(|| self.strategy.clone());

        let fetch_request = request.clone();
        let response = self
            .store
            .query::<ListResponse<E>, _, _>(&key, &strategy, cancel, move |token| {
                list(fetch_request.clone(), token)
            })
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) if self.is_absent(&e) => {
                debug!(domain = self.keys.domain(), error = %e, "list read treated as empty");
                ListResponse::empty()
            }
            Err(e) => return Err(e.into()),
        };

        let pagination = Pagination::resolve(
            response.count,
            response.limit.or(request.limit),
            response.offset.or(request.offset),
            input.page,
        );
        Ok(Some(ListResult {
            items: response.items,
            count: response.count,
            pagination,
        }))
    }

    /// Read one entity.
    ///
    /// Returns `None` for a disabled read, an empty id, a not-found answer
    /// and (unless surfaced) an unauthenticated answer.
    pub async fn detail(&self, input: DetailInput<D>, cancel: &CancellationToken) -> Result<Option<E>, QueryError> {
        if !input.options.enabled || input.id.is_empty() {
            return Ok(None);
        }
        let retrieve = self
            .service
            .retrieve
            .clone()
            .ok_or_else(|| self.missing("retrieve"))?;

        let params = self.detail_params(input.params);
        let key = self.keys.detail(&input.id, &params)?;
        let strategy = input.options.strategy.unwrap_or_else(|| self.strategy.clone());

        let id = input.id;
        let result = self
            .store
            .query::<Option<E>, _, _>(&key, &strategy, cancel, move |token| {
                retrieve(id.clone(), params.clone(), token)
            })
            .await;

        match result {
            Ok(entity) => Ok(entity),
            Err(e) if self.is_absent(&e) => {
                debug!(domain = self.keys.domain(), error = %e, "detail read treated as absent");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Warm a list read.
    pub async fn prefetch_list(
        &self,
        input: ListInput<L>,
        options: PrefetchOptions,
    ) -> Result<PrefetchOutcome, QueryError> {
        let list = self.service.list.clone().ok_or_else(|| self.missing("list"))?;
        let request = self.list_request(&input);
        let key = self.keys.list(&request)?;
        let strategy = options.strategy.unwrap_or_else(|| self.strategy.clone());

        Ok(self
            .store
            .prefetch(&key, &strategy, options.mode, move |token| list(request.clone(), token))
            .await)
    }

    /// Warm a detail read.
    pub async fn prefetch_detail(
        &self,
        input: DetailInput<D>,
        options: PrefetchOptions,
    ) -> Result<PrefetchOutcome, QueryError> {
        let retrieve = self
            .service
            .retrieve
            .clone()
            .ok_or_else(|| self.missing("retrieve"))?;
        if input.id.is_empty() {
            return Ok(PrefetchOutcome::Skipped);
        }
        let params = self.detail_params(input.params);
        let key = self.keys.detail(&input.id, &params)?;
        let strategy = options.strategy.unwrap_or_else(|| self.strategy.clone());

        let id = input.id;
        Ok(self
            .store
            .prefetch(&key, &strategy, options.mode, move |token| {
                retrieve(id.clone(), params.clone(), token)
            })
            .await)
    }

    /// Warm a detail read after a delay, debounced per entity.
    ///
    /// Returns the prefetch id, usable with [`cancel_prefetch`](Self::cancel_prefetch).
    pub fn schedule_prefetch_detail(&self, input: DetailInput<D>, options: PrefetchOptions) -> String {
        let prefetch_id = format!("{}:detail:{}", self.keys.domain(), input.id);
        let delay = options.delay.unwrap_or(self.prefetch_delay);
        let this = self.clone();
        let log_id = prefetch_id.clone();
        self.scheduler.schedule(prefetch_id.clone(), delay, async move {
            if let Err(error) = this.prefetch_detail(input, options).await {
                warn!(prefetch_id = %log_id, %error, "scheduled prefetch failed");
            }
        });
        prefetch_id
    }

    /// Cancel a scheduled prefetch.
    pub fn cancel_prefetch(&self, prefetch_id: &str) -> bool {
        self.scheduler.cancel(prefetch_id)
    }

    /// Drop cached list pages so the next read refetches.
    pub fn invalidate_lists(&self) -> usize {
        self.store.invalidate(&self.keys.lists())
    }

    /// Drop every cached read of the domain.
    pub fn invalidate_all(&self) -> usize {
        self.store.invalidate(&self.keys.all())
    }

    fn after_write(&self) {
        self.store.invalidate(&self.keys.lists());
        for prefix in &self.invalidate_on_write {
            self.store.invalidate(prefix);
        }
    }
}

impl<E, L, D, C, U> EntityQueries<E, L, D, C, U>
where
    E: Identify + Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    L: Serialize + Clone + Send + Sync + 'static,
    D: Default + Serialize + Clone + Send + Sync + 'static,
    C: Send + 'static,
    U: Send + 'static,
{
    /// Write an entity under its natural detail key.
    ///
    /// Other cached variants of the same entity are invalidated.
    pub fn write_through(&self, entity: &E) -> Result<QueryKey, QueryError> {
        self.store.invalidate(&self.keys.detail_prefix(entity.id()));
        let key = self.detail_key(entity.id(), D::default())?;
        self.store.set_data_with(&key, &Some(entity), &self.strategy)?;
        Ok(key)
    }

    /// Create an entity.
    pub async fn create(&self, input: C) -> Result<E, QueryError> {
        let create = self.service.create.clone().ok_or_else(|| self.missing("create"))?;
        let entity = create(input).await?;
        self.write_through(&entity)?;
        self.after_write();
        debug!(domain = self.keys.domain(), id = entity.id(), "entity created");
        Ok(entity)
    }

    /// Update an entity.
    pub async fn update(&self, id: impl Into<String>, input: U) -> Result<E, QueryError> {
        let update = self.service.update.clone().ok_or_else(|| self.missing("update"))?;
        let entity = update(id.into(), input).await?;
        self.write_through(&entity)?;
        self.after_write();
        debug!(domain = self.keys.domain(), id = entity.id(), "entity updated");
        Ok(entity)
    }

    /// Delete an entity.
    pub async fn delete(&self, id: impl Into<String>) -> Result<(), QueryError> {
        let delete = self.service.delete.clone().ok_or_else(|| self.missing("delete"))?;
        let id = id.into();
        delete(id.clone()).await?;
        self.store.remove(&self.keys.detail_prefix(&id));
        self.after_write();
        debug!(domain = self.keys.domain(), id = %id, "entity deleted");
        Ok(())
    }
}
