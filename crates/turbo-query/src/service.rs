//! Backend service boundary for generated operations.
//!
//! Domains either implement [`ReadService`] / [`WriteService`] or plug
//! individual async functions into an [`EntityService`]. Functions a domain
//! does not provide stay empty, and the operations that need them fail with
//! a configuration error before any network call.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use turbo_data::{CancellationToken, ListRequest, ListResponse, ServiceResult};

/// Entities with a stable backend identifier.
pub trait Identify {
    /// The backend identifier.
    fn id(&self) -> &str;
}

/// Read side of a domain service.
#[async_trait]
pub trait ReadService<E, L, D = ()>: Send + Sync
where
    E: Send + 'static,
    L: Send + 'static,
    D: Send + 'static,
{
    /// List entities.
    async fn list(
        &self,
        request: ListRequest<L>,
        cancel: CancellationToken,
    ) -> ServiceResult<ListResponse<E>>;

    /// Retrieve one entity. `Ok(None)` means the backend has no such entity.
    async fn retrieve(&self, id: String, params: D, cancel: CancellationToken) -> ServiceResult<Option<E>>;
}

/// Write side of a domain service.
#[async_trait]
pub trait WriteService<E, C, U = C>: Send + Sync
where
    E: Send + 'static,
    C: Send + 'static,
    U: Send + 'static,
{
    /// Create an entity.
    async fn create(&self, input: C) -> ServiceResult<E>;

    /// Update an entity.
    async fn update(&self, id: String, input: U) -> ServiceResult<E>;

    /// Delete an entity.
    async fn delete(&self, id: String) -> ServiceResult<()>;
}

pub(crate) type ListFn<E, L> = Arc<
    dyn Fn(ListRequest<L>, CancellationToken) -> BoxFuture<'static, ServiceResult<ListResponse<E>>>
        + Send
        + Sync,
>;
pub(crate) type RetrieveFn<E, D> = Arc<
    dyn Fn(String, D, CancellationToken) -> BoxFuture<'static, ServiceResult<Option<E>>> + Send + Sync,
>;
pub(crate) type CreateFn<E, C> = Arc<dyn Fn(C) -> BoxFuture<'static, ServiceResult<E>> + Send + Sync>;
pub(crate) type UpdateFn<E, U> =
    Arc<dyn Fn(String, U) -> BoxFuture<'static, ServiceResult<E>> + Send + Sync>;
pub(crate) type DeleteFn = Arc<dyn Fn(String) -> BoxFuture<'static, ServiceResult<()>> + Send + Sync>;

/// A domain service assembled from optional async functions.
pub struct EntityService<E, L, D = (), C = (), U = ()> {
    pub(crate) list: Option<ListFn<E, L>>,
    pub(crate) retrieve: Option<RetrieveFn<E, D>>,
    pub(crate) create: Option<CreateFn<E, C>>,
    pub(crate) update: Option<UpdateFn<E, U>>,
    pub(crate) delete: Option<DeleteFn>,
}

impl<E, L, D, C, U> Clone for EntityService<E, L, D, C, U> {
    fn clone(&self) -> Self {
        Self {
            list: self.list.clone(),
            retrieve: self.retrieve.clone(),
            create: self.create.clone(),
            update: self.update.clone(),
            delete: self.delete.clone(),
        }
    }
}

impl<E, L, D, C, U> Default for EntityService<E, L, D, C, U> {
    fn default() -> Self {
        Self {
            list: None,
            retrieve: None,
            create: None,
            update: None,
            delete: None,
        }
    }
}

impl<E, L, D, C, U> std::fmt::Debug for EntityService<E, L, D, C, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityService")
            .field("list", &self.list.is_some())
            .field("retrieve", &self.retrieve.is_some())
            .field("create", &self.create.is_some())
            .field("update", &self.update.is_some())
            .field("delete", &self.delete.is_some())
            .finish()
    }
}

impl<E, L, D, C, U> EntityService<E, L, D, C, U>
where
    E: Send + 'static,
    L: Send + 'static,
    D: Send + 'static,
    C: Send + 'static,
    U: Send + 'static,
{
    /// Create a service with no functions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the read functions from a [`ReadService`].
    pub fn from_reader(reader: Arc<dyn ReadService<E, L, D>>) -> Self {
        let list_reader = reader.clone();
        Self::new()
            .with_list(move |request, cancel| {
                let reader = list_reader.clone();
                async move { reader.list(request, cancel).await }
            })
            .with_retrieve(move |id, params, cancel| {
                let reader = reader.clone();
                async move { reader.retrieve(id, params, cancel).await }
            })
    }

    /// Take the write functions from a [`WriteService`].
    pub fn with_writer(self, writer: Arc<dyn WriteService<E, C, U>>) -> Self {
        let create_writer = writer.clone();
        let update_writer = writer.clone();
        self.with_create(move |input| {
            let writer = create_writer.clone();
            async move { writer.create(input).await }
        })
        .with_update(move |id, input| {
            let writer = update_writer.clone();
            async move { writer.update(id, input).await }
        })
        .with_delete(move |id| {
            let writer = writer.clone();
            async move { writer.delete(id).await }
        })
    }

    /// Set the list function.
    pub fn with_list<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(ListRequest<L>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServiceResult<ListResponse<E>>> + Send + 'static,
    {
        self.list = Some(Arc::new(move |request, cancel| f(request, cancel).boxed()));
        self
    }

    /// Set the retrieve function.
    pub fn with_retrieve<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String, D, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServiceResult<Option<E>>> + Send + 'static,
    {
        self.retrieve = Some(Arc::new(move |id, params, cancel| f(id, params, cancel).boxed()));
        self
    }

    /// Set the create function.
    pub fn with_create<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServiceResult<E>> + Send + 'static,
    {
        self.create = Some(Arc::new(move |input| f(input).boxed()));
        self
    }

    /// Set the update function.
    pub fn with_update<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String, U) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServiceResult<E>> + Send + 'static,
    {
        self.update = Some(Arc::new(move |id, input| f(id, input).boxed()));
        self
    }

    /// Set the delete function.
    pub fn with_delete<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServiceResult<()>> + Send + 'static,
    {
        self.delete = Some(Arc::new(move |id| f(id).boxed()));
        self
    }

    /// Names of the functions this service provides.
    pub fn provided(&self) -> Vec<&'static str> {
        [
            ("list", self.list.is_some()),
            ("retrieve", self.retrieve.is_some()),
            ("create", self.create.is_some()),
            ("update", self.update.is_some()),
            ("delete", self.delete.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turbo_data::ServiceError;

    struct Names;

    #[async_trait]
    impl ReadService<String, ()> for Names {
        async fn list(
            &self,
            _request: ListRequest<()>,
            _cancel: CancellationToken,
        ) -> ServiceResult<ListResponse<String>> {
            Ok(ListResponse::new(vec!["a".into(), "b".into()], 2))
        }

        async fn retrieve(&self, id: String, _params: (), _cancel: CancellationToken) -> ServiceResult<Option<String>> {
            Ok((id == "a").then_some(id))
        }
    }

    #[tokio::test]
    async fn test_from_reader_fills_read_slots_only() {
        let service: EntityService<String, ()> = EntityService::from_reader(Arc::new(Names));
        assert_eq!(service.provided(), vec!["list", "retrieve"]);

        let retrieve = service.retrieve.clone().unwrap();
        let found = retrieve("a".into(), (), CancellationToken::new()).await.unwrap();
        assert_eq!(found.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_individual_slots() {
        let service: EntityService<String, (), (), String> = EntityService::new()
            .with_create(|name: String| async move {
                if name.is_empty() {
                    Err(ServiceError::http(400, "name required"))
                } else {
                    Ok(name)
                }
            });
        assert_eq!(service.provided(), vec!["create"]);
        let create = service.create.clone().unwrap();
        assert_eq!(create("x".into()).await.unwrap(), "x");
        assert!(create(String::new()).await.is_err());
    }
}
