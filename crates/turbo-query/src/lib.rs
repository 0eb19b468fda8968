//! Generic read, mutate and prefetch operations for the TurboCommerce storefront.
//!
//! Turns a minimal backend service into a full set of cached operations:
//!
//! - `list` / `detail` reads with region merging, pagination and
//!   not-found / unauthenticated normalization
//! - `create` / `update` / `delete` with write-through and list invalidation
//! - `prefetch_list` / `prefetch_detail` and debounced scheduled prefetches
//!
//! # Example
//!
//! ```rust,ignore
//! use turbo_query::{EntityService, ListInput, QueryClient};
//! use turbo_cache::StrategyKind;
//!
//! let client = QueryClient::from_config(&ClientConfig::load("storefront.toml")?);
//! let products = client
//!     .entity("products", EntityService::from_reader(service), StrategyKind::SemiStatic)
//!     .with_list_region();
//!
//! let page = products.list(ListInput::new(params).with_limit(12), &cancel).await?;
//! ```

mod client;
mod config;
mod error;
mod factory;
mod input;
mod keys;
mod prefetch;
mod service;

pub use client::QueryClient;
pub use config::{load_file, ClientConfig, RetryConfig, StrategyOverride};
pub use error::QueryError;
pub use factory::{EntityQueries, NotFoundFn, ParamsFn};
pub use input::{DetailInput, ListInput, PrefetchOptions, ReadOptions, RegionAware};
pub use keys::DomainKeys;
pub use prefetch::PrefetchScheduler;
pub use service::{EntityService, Identify, ReadService, WriteService};

/// Result type for generated operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        DetailInput, DomainKeys, EntityQueries, EntityService, Identify, ListInput, PrefetchOptions,
        QueryClient, QueryError, ReadOptions, ReadService, RegionAware, WriteService,
    };
}
