//! Cache layer for the TurboCommerce storefront data layer.
//!
//! Holds the last-known result of every backend read in one shared store,
//! keyed by canonical cache keys and governed by strategy profiles.
//!
//! # Example
//!
//! ```rust,ignore
//! use turbo_cache::{CacheStore, CacheStrategy, Canonicalizer, KeyPart, Namespace};
//!
//! let store = CacheStore::new();
//! let key = Canonicalizer::new().build(
//!     &Namespace::default(),
//!     &["products".into(), "list".into(), KeyPart::from_serialize(&params)?],
//! )?;
//!
//! let products: Vec<Product> = store
//!     .query(&key, &CacheStrategy::semi_static(), &cancel, move |token| {
//!         service.list(params.clone(), token)
//!     })
//!     .await?;
//! ```

mod error;
mod freshness;
mod key;
mod policy;
mod retry;
mod store;

pub use error::{CacheError, KeyError};
pub use freshness::{should_skip, EntrySnapshot, SkipMode};
pub use key::{Canonicalizer, KeyPart, KeyValue, Namespace, NumberKey, QueryKey, SharedPart};
pub use policy::{CacheStrategy, StrategyKind, StrategySet};
pub use retry::{BackoffStrategy, RetryCondition, RetryPolicy};
pub use store::{CacheStore, PrefetchOutcome, Subscription};

/// Result type for cache reads.
pub type CacheResult<T> = Result<T, CacheError>;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        CacheError, CacheStore, CacheStrategy, Canonicalizer, KeyPart, Namespace, QueryKey,
        SkipMode, StrategyKind,
    };
}
