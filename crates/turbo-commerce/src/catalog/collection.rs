use std::sync::Arc;

use serde::{Deserialize, Serialize};
use turbo_cache::{Namespace, StrategyKind};
use turbo_query::{DomainKeys, EntityQueries, EntityService, Identify, QueryClient, ReadService};

use crate::ids::CollectionId;

pub const DOMAIN: &str = "collections";

/// Key builder for collections.
pub fn keys(namespace: &Namespace) -> DomainKeys {
    DomainKeys::new(namespace.clone(), DOMAIN)
}

/// A curated group of products.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Collection {
    pub id: CollectionId,
    pub title: String,
    pub handle: String,
}

impl Collection {
    pub fn new(id: impl Into<CollectionId>, title: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            handle: handle.into(),
        }
    }
}

impl Identify for Collection {
    fn id(&self) -> &str {
        self.id.as_str()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionListParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl CollectionListParams {
    pub fn by_handle(handle: impl Into<String>) -> Self {
        Self {
            handle: Some(handle.into()),
            ..Default::default()
        }
    }
}

pub type CollectionQueries = EntityQueries<Collection, CollectionListParams>;

/// Collection operations on the static profile.
pub fn collection_queries(
    client: &QueryClient,
    reader: Arc<dyn ReadService<Collection, CollectionListParams>>,
) -> CollectionQueries {
    client.entity(DOMAIN, EntityService::from_reader(reader), StrategyKind::Static)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use turbo_data::{CancellationToken, ListRequest, ListResponse, ServiceResult};
    use turbo_query::ListInput;

    #[derive(Default)]
    struct FakeCollections {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ReadService<Collection, CollectionListParams> for FakeCollections {
        async fn list(
            &self,
            request: ListRequest<CollectionListParams>,
            _cancel: CancellationToken,
        ) -> ServiceResult<ListResponse<Collection>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let items = match request.params.handle.as_deref() {
                Some("summer") | None => vec![Collection::new("pcol_1", "Summer", "summer")],
                Some(_) => Vec::new(),
            };
            let count = items.len() as u64;
            Ok(ListResponse::new(items, count))
        }

        async fn retrieve(&self, _id: String, _params: (), _cancel: CancellationToken) -> ServiceResult<Option<Collection>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_lookup_by_handle_is_cached_per_params() {
        let service = Arc::new(FakeCollections::default());
        let collections = collection_queries(&QueryClient::default(), service.clone());
        let cancel = CancellationToken::new();

        for _ in 0..2 {
            let page = collections
                .list(ListInput::new(CollectionListParams::by_handle("summer")), &cancel)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(page.items[0].handle, "summer");
        }
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);

        let page = collections
            .list(ListInput::new(CollectionListParams::by_handle("winter")), &cancel)
            .await
            .unwrap()
            .unwrap();
        assert!(page.is_empty());
        assert_eq!(page.pagination.total_pages, 0);
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }
}
