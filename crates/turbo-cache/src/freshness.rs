//! Prefetch skip decisions.

use std::time::Duration;

use tokio::time::Instant;

use crate::policy::CacheStrategy;

/// How much cached data is enough to skip a prefetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkipMode {
    /// Any cached value, regardless of age.
    Any,
    /// Only a fresh, non-invalidated value.
    #[default]
    Fresh,
}

/// Point-in-time view of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntrySnapshot {
    /// Whether the entry holds data.
    pub has_data: bool,
    /// When the data was last written.
    pub updated_at: Option<Instant>,
    /// Whether the entry was explicitly invalidated.
    pub invalidated: bool,
    /// Whether a fetch is in flight.
    pub is_fetching: bool,
    /// Number of active subscriptions.
    pub observers: usize,
}

impl EntrySnapshot {
    /// Age of the data at `now`.
    pub fn age(&self, now: Instant) -> Option<Duration> {
        self.updated_at.map(|t| now.saturating_duration_since(t))
    }

    /// Check whether the data is usable without a refetch.
    pub fn is_fresh(&self, strategy: &CacheStrategy, now: Instant) -> bool {
        self.has_data
            && !self.invalidated
            && self.age(now).is_some_and(|age| strategy.is_fresh(age))
    }
}

/// Decide whether a prefetch may be skipped.
pub fn should_skip(
    entry: Option<&EntrySnapshot>,
    strategy: &CacheStrategy,
    mode: SkipMode,
    now: Instant,
) -> bool {
    let Some(entry) = entry else {
        return false;
    };
    match mode {
        SkipMode::Any => entry.has_data,
        SkipMode::Fresh => entry.is_fresh(strategy, now),
    }
}
