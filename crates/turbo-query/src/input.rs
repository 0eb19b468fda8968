//! Inputs to generated operations.
//!
//! Caller-only flags live in [`ReadOptions`] and never reach the service or
//! the key builder.

use std::time::Duration;

use turbo_cache::{CacheStrategy, SkipMode};
use turbo_data::RegionContext;

/// Caller-side read flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// A disabled read returns `None` without touching the network.
    pub enabled: bool,
    /// Strategy override for this read.
    pub strategy: Option<CacheStrategy>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: None,
        }
    }
}

impl ReadOptions {
    /// Options for a disabled read.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            strategy: None,
        }
    }

    /// Override the strategy.
    pub fn with_strategy(mut self, strategy: CacheStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }
}

/// Input to a list read.
#[derive(Debug, Clone, PartialEq)]
pub struct ListInput<L> {
    /// Domain filter parameters.
    pub params: L,
    /// 1-indexed page, used when no offset is given.
    pub page: Option<u32>,
    /// Page size.
    pub limit: Option<u32>,
    /// Number of items to skip. Wins over `page`.
    pub offset: Option<u32>,
    /// Caller-side flags.
    pub options: ReadOptions,
}

impl<L> ListInput<L> {
    /// Create an input for the first page.
    pub fn new(params: L) -> Self {
        Self {
            params,
            page: None,
            limit: None,
            offset: None,
            options: ReadOptions::default(),
        }
    }

    /// Set the page.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
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

    /// Set the caller-side flags.
    pub fn with_options(mut self, options: ReadOptions) -> Self {
        self.options = options;
        self
    }

    /// Offset to send: the explicit offset, else one derived from page and limit.
    pub fn effective_offset(&self) -> Option<u32> {
        self.offset.or_else(|| match (self.page, self.limit) {
            (Some(page), Some(limit)) => Some(turbo_data::Pagination::offset_for_page(page, limit)),
            _ => None,
        })
    }
}

impl<L: Default> Default for ListInput<L> {
    fn default() -> Self {
        Self::new(L::default())
    }
}

/// Input to a detail read.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailInput<D> {
    /// Entity identifier. An empty id disables the read.
    pub id: String,
    /// Domain read parameters.
    pub params: D,
    /// Caller-side flags.
    pub options: ReadOptions,
}

impl<D: Default> DetailInput<D> {
    /// Create an input with default params.
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_params(id, D::default())
    }
}

impl<D> DetailInput<D> {
    /// Create an input with explicit params.
    pub fn with_params(id: impl Into<String>, params: D) -> Self {
        Self {
            id: id.into(),
            params,
            options: ReadOptions::default(),
        }
    }

    /// Set the caller-side flags.
    pub fn with_options(mut self, options: ReadOptions) -> Self {
        self.options = options;
        self
    }
}

/// Options for a prefetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefetchOptions {
    /// How much cached data is enough to skip.
    pub mode: SkipMode,
    /// Strategy override.
    pub strategy: Option<CacheStrategy>,
    /// Delay for scheduled prefetches. Falls back to the client default.
    pub delay: Option<Duration>,
}

impl PrefetchOptions {
    /// Skip whenever any data is cached.
    pub fn skip_if_cached() -> Self {
        Self {
            mode: SkipMode::Any,
            ..Self::default()
        }
    }

    /// Set the delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Parameters that carry a region and a country code.
pub trait RegionAware {
    /// Fill unset region fields from the context. Explicit values win.
    fn apply_region(&mut self, region: &RegionContext);
}

impl RegionAware for () {
    fn apply_region(&mut self, _region: &RegionContext) {}
}
