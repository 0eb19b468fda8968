//! Product and variant types.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use turbo_cache::{Namespace, StrategyKind};
use turbo_data::RegionContext;
use turbo_query::{DomainKeys, EntityQueries, EntityService, Identify, QueryClient, ReadService, RegionAware};

use crate::ids::{CategoryId, CollectionId, ProductId, VariantId};

pub const DOMAIN: &str = "products";

/// Key builder for products.
pub fn keys(namespace: &Namespace) -> DomainKeys {
    DomainKeys::new(namespace.clone(), DOMAIN)
}

/// Product status in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    /// Product is in draft mode, not visible to customers.
    Draft,
    /// Product is active and visible.
    #[default]
    Published,
    /// Product was rejected in review.
    Rejected,
}

/// A product in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    /// URL-friendly handle.
    pub handle: String,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub collection_id: Option<CollectionId>,
    #[serde(default)]
    pub category_ids: Vec<CategoryId>,
    #[serde(default)]
    pub variants: Vec<ProductVariant>,
}

impl Product {
    pub fn new(id: impl Into<ProductId>, title: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            handle: handle.into(),
            status: ProductStatus::default(),
            description: None,
            thumbnail: None,
            collection_id: None,
            category_ids: Vec::new(),
            variants: Vec::new(),
        }
    }

    pub fn variant(&self, id: &VariantId) -> Option<&ProductVariant> {
        self.variants.iter().find(|v| &v.id == id)
    }

    /// Lowest region price across variants.
    pub fn cheapest_price(&self) -> Option<i64> {
        self.variants.iter().filter_map(|v| v.calculated_price).min()
    }

    pub fn in_stock(&self) -> bool {
        self.variants.iter().any(ProductVariant::in_stock)
    }
}

impl Identify for Product {
    fn id(&self) -> &str {
        self.id.as_str()
    }
}

/// A purchasable variant of a product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductVariant {
    pub id: VariantId,
    pub title: String,
    #[serde(default)]
    pub sku: Option<String>,
    /// Price for the requested region, in minor units.
    #[serde(default)]
    pub calculated_price: Option<i64>,
    /// Unmanaged inventory when absent.
    #[serde(default)]
    pub inventory_quantity: Option<i64>,
}

impl ProductVariant {
    pub fn in_stock(&self) -> bool {
        self.inventory_quantity.map_or(true, |q| q > 0)
    }
}

/// Product list filters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductListParams {
    /// Free-text search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub category_id: Vec<CategoryId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collection_id: Vec<CollectionId>,
    /// Sort expression, e.g. `-created_at`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

impl ProductListParams {
    pub fn search(q: impl Into<String>) -> Self {
        Self {
            q: Some(q.into()),
            ..Default::default()
        }
    }

    pub fn in_category(category_id: impl Into<CategoryId>) -> Self {
        Self {
            category_id: vec![category_id.into()],
            ..Default::default()
        }
    }

    pub fn in_collection(collection_id: impl Into<CollectionId>) -> Self {
        Self {
            collection_id: vec![collection_id.into()],
            ..Default::default()
        }
    }
}

impl RegionAware for ProductListParams {
    fn apply_region(&mut self, region: &RegionContext) {
        region.fill(&mut self.region_id, &mut self.country_code);
    }
}

/// Product detail parameters. Prices depend on the region.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductDetailParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

impl RegionAware for ProductDetailParams {
    fn apply_region(&mut self, region: &RegionContext) {
        region.fill(&mut self.region_id, &mut self.country_code);
    }
}

pub type ProductQueries = EntityQueries<Product, ProductListParams, ProductDetailParams>;

/// Product operations. Region and country come from the client unless the
/// params set them.
pub fn product_queries(
    client: &QueryClient,
    reader: Arc<dyn ReadService<Product, ProductListParams, ProductDetailParams>>,
) -> ProductQueries {
    client
        .entity(DOMAIN, EntityService::from_reader(reader), StrategyKind::SemiStatic)
        .with_list_region()
        .with_detail_region()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use turbo_cache::{PrefetchOutcome, SkipMode};
    use turbo_data::{CancellationToken, ListRequest, ListResponse, ServiceResult};
    use turbo_query::{DetailInput, ListInput, PrefetchOptions};

    #[derive(Default)]
    struct FakeProducts {
        calls: AtomicUsize,
        last_list: Mutex<Option<ProductListParams>>,
    }

    fn shirt(region_id: Option<&str>) -> Product {
        let mut product = Product::new("prod_1", "Shirt", "shirt");
        product.variants.push(ProductVariant {
            id: "var_s".into(),
            title: "S".to_string(),
            sku: None,
            calculated_price: Some(if region_id == Some("reg_us") { 2500 } else { 2000 }),
            inventory_quantity: Some(0),
        });
        product
    }

    #[async_trait]
    impl ReadService<Product, ProductListParams, ProductDetailParams> for FakeProducts {
        async fn list(
            &self,
            request: ListRequest<ProductListParams>,
            _cancel: CancellationToken,
        ) -> ServiceResult<ListResponse<Product>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let region = request.params.region_id.clone();
            *self.last_list.lock().unwrap() = Some(request.params);
            Ok(ListResponse::new(vec![shirt(region.as_deref())], 31).with_window(12, 12))
        }

        async fn retrieve(
            &self,
            id: String,
            params: ProductDetailParams,
            _cancel: CancellationToken,
        ) -> ServiceResult<Option<Product>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((id == "prod_1").then(|| shirt(params.region_id.as_deref())))
        }
    }

    fn queries(region: RegionContext) -> (ProductQueries, Arc<FakeProducts>) {
        let client = QueryClient::default().with_region(region);
        let service = Arc::new(FakeProducts::default());
        (product_queries(&client, service.clone()), service)
    }

    #[tokio::test]
    async fn test_list_fills_region_and_paginates() {
        let (products, service) = queries(RegionContext::new("reg_eu").with_country("de"));

        let page = products
            .list(
                ListInput::new(ProductListParams::search("shirt")).with_page(2).with_limit(12),
                &CancellationToken::new(),
            )
            .await
            .unwrap()
            .unwrap();

        let sent = service.last_list.lock().unwrap().clone().unwrap();
        assert_eq!(sent.region_id.as_deref(), Some("reg_eu"));
        assert_eq!(sent.country_code.as_deref(), Some("de"));
        assert_eq!(page.count, 31);
        assert_eq!(page.pagination.current_page, 2);
        assert_eq!(page.pagination.total_pages, 3);
        assert!(page.pagination.has_next_page);
    }

    #[tokio::test]
    async fn test_explicit_region_wins() {
        let (products, service) = queries(RegionContext::new("reg_eu"));
        let cancel = CancellationToken::new();

        let params = ProductDetailParams {
            region_id: Some("reg_us".to_string()),
            ..Default::default()
        };
        let product = products
            .detail(DetailInput::with_params("prod_1", params), &cancel)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(product.cheapest_price(), Some(2500));
        assert!(!product.in_stock());

        // a different region is a different key
        let product = products.detail(DetailInput::new("prod_1"), &cancel).await.unwrap().unwrap();
        assert_eq!(product.cheapest_price(), Some(2000));
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_prefetch_then_read_hits_cache() {
        let (products, service) = queries(RegionContext::new("reg_eu"));

        let outcome = products
            .prefetch_detail(DetailInput::new("prod_1"), PrefetchOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome, PrefetchOutcome::Fetched);

        let outcome = products
            .prefetch_detail(DetailInput::new("prod_1"), PrefetchOptions::skip_if_cached())
            .await
            .unwrap();
        assert_eq!(outcome, PrefetchOutcome::Skipped);

        products
            .detail(DetailInput::new("prod_1"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_prefetch_is_debounced() {
        let (products, service) = queries(RegionContext::new("reg_eu"));
        let options = PrefetchOptions {
            mode: SkipMode::Fresh,
            strategy: None,
            delay: Some(Duration::from_millis(100)),
        };

        products.schedule_prefetch_detail(DetailInput::new("prod_1"), options.clone());
        tokio::time::advance(Duration::from_millis(50)).await;
        let id = products.schedule_prefetch_detail(DetailInput::new("prod_1"), options);
        assert_eq!(id, "products:detail:prod_1");

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }
}
