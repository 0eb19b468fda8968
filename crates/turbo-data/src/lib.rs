//! Backend service boundary for the TurboCommerce storefront data layer.
//!
//! The commerce backend is an opaque RPC boundary. This crate holds the
//! vocabulary every domain service speaks:
//!
//! - `ServiceError` - Transport, HTTP and not-found failures
//! - `ListRequest` / `ListResponse` - Paged list calls
//! - `Pagination` - Page numbers derived from limit/offset
//! - `RegionContext` - Ambient (region, country) pair
//! - `CancellationToken` - Threaded through every network call
//!
//! # Example
//!
//! ```rust,ignore
//! use turbo_data::{ListRequest, Pagination};
//!
//! let request = ListRequest::new(params).with_limit(12).with_offset(24);
//! let page = Pagination::resolve(100, request.limit, request.offset, None);
//! assert_eq!(page.current_page, 3);
//! ```

mod error;
mod pagination;
mod region;

pub use error::ServiceError;
pub use pagination::{ListRequest, ListResponse, ListResult, Pagination};
pub use region::RegionContext;
pub use tokio_util::sync::CancellationToken;

/// Result type for backend calls.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        CancellationToken, ListRequest, ListResponse, ListResult, Pagination, RegionContext,
        ServiceError, ServiceResult,
    };
}
