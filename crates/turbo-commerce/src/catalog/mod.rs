//! Catalog reads.
//!
//! Products, categories, collections and regions. Each domain pairs its
//! entity types with an [`EntityQueries`](turbo_query::EntityQueries)
//! constructor on the right freshness profile.

pub mod category;
pub mod collection;
pub mod product;
pub mod region;

pub use category::{build_tree, category_queries, Category, CategoryListParams, CategoryQueries};
pub use collection::{collection_queries, Collection, CollectionListParams, CollectionQueries};
pub use product::{
    product_queries, Product, ProductDetailParams, ProductListParams, ProductQueries, ProductStatus, ProductVariant,
};
pub use region::{find_region_for_country, region_queries, Country, Region, RegionQueries};
