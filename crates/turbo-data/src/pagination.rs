//! List requests, list responses and derived pagination.

use serde::{Deserialize, Serialize};

/// A list call as it reaches the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListRequest<P> {
    /// Domain-specific filter parameters.
    pub params: P,
    /// Page size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Number of items to skip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl<P> ListRequest<P> {
    /// Create a request without paging.
    pub fn new(params: P) -> Self {
        Self {
            params,
            limit: None,
            offset: None,
        }
    }

    /// Set the page size.
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the offset.
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// A page of entities as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse<E> {
    /// Items on this page.
    pub items: Vec<E>,
    /// Total number of items across all pages.
    pub count: u64,
    /// Page size the backend applied, if it reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Offset the backend applied, if it reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl<E> ListResponse<E> {
    /// Create a response without paging metadata.
    pub fn new(items: Vec<E>, count: u64) -> Self {
        Self {
            items,
            count,
            limit: None,
            offset: None,
        }
    }

    /// An empty page.
    pub fn empty() -> Self {
        Self::new(Vec::new(), 0)
    }

    /// Attach the paging window the backend applied.
    pub fn with_window(mut self, limit: u32, offset: u32) -> Self {
        self.limit = Some(limit);
        self.offset = Some(offset);
        self
    }
}

/// Pagination derived from a list response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Pagination {
    /// Current page (1-indexed).
    pub current_page: u32,
    /// Total number of pages (0 for an empty result).
    pub total_pages: u32,
    /// Whether there's a next page.
    pub has_next_page: bool,
    /// Whether there's a previous page.
    pub has_prev_page: bool,
}

impl Pagination {
    /// Derive pagination.
    ///
    /// The current page comes from `offset` when both offset and a non-zero
    /// limit are known, otherwise from the explicit `page`, otherwise 1.
    pub fn resolve(count: u64, limit: Option<u32>, offset: Option<u32>, page: Option<u32>) -> Self {
        let limit = limit.filter(|l| *l > 0);

        let current_page = match (offset, limit) {
            (Some(offset), Some(limit)) => offset / limit + 1,
            _ => page.unwrap_or(1).max(1),
        };

        let total_pages = match limit {
            Some(limit) => count.div_ceil(u64::from(limit)) as u32,
            None if count > 0 => 1,
            None => 0,
        };

        Self {
            current_page,
            total_pages,
            has_next_page: current_page < total_pages,
            has_prev_page: current_page > 1,
        }
    }

    /// Offset for a 1-indexed page.
    pub fn offset_for_page(page: u32, limit: u32) -> u32 {
        page.saturating_sub(1).saturating_mul(limit)
    }
}

/// A page of entities with derived pagination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResult<E> {
    /// Items on this page.
    pub items: Vec<E>,
    /// Total number of items.
    pub count: u64,
    /// Derived pagination.
    pub pagination: Pagination,
}

impl<E> ListResult<E> {
    /// Check if the result holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
