//! Cache strategy profiles.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Named strategy presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StrategyKind {
    /// Data that almost never changes (regions, categories).
    Static,
    /// Catalog data that changes occasionally.
    SemiStatic,
    /// Data that must track the backend closely (carts, shipping prices).
    Realtime,
    /// Data owned by the signed-in customer.
    UserData,
}

impl StrategyKind {
    /// All presets.
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::Static,
        StrategyKind::SemiStatic,
        StrategyKind::Realtime,
        StrategyKind::UserData,
    ];

    /// Look up a preset by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    /// Get the preset name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::SemiStatic => "semiStatic",
            Self::Realtime => "realtime",
            Self::UserData => "userData",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Freshness, retention and refetch triggers for one kind of data.
///
/// Profiles are values: the `with_*` methods return a modified copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStrategy {
    /// Preset this profile was derived from.
    pub kind: StrategyKind,
    /// How long data counts as fresh.
    pub stale_time: Duration,
    /// How long an unobserved entry is kept.
    pub retention: Duration,
    /// Refetch stale data when the window regains focus.
    pub refetch_on_window_focus: bool,
    /// Refetch stale data when a reader subscribes.
    pub refetch_on_mount: bool,
    /// Refetch stale data after the network comes back.
    pub refetch_on_reconnect: bool,
}

impl CacheStrategy {
    /// Get the preset for a kind.
    pub fn preset(kind: StrategyKind) -> Self {
        match kind {
            StrategyKind::Static => Self::static_data(),
            StrategyKind::SemiStatic => Self::semi_static(),
            StrategyKind::Realtime => Self::realtime(),
            StrategyKind::UserData => Self::user_data(),
        }
    }

    /// Regions, categories, collections.
    pub fn static_data() -> Self {
        Self {
            kind: StrategyKind::Static,
            stale_time: Duration::from_secs(30 * 60),
            retention: Duration::from_secs(60 * 60),
            refetch_on_window_focus: false,
            refetch_on_mount: false,
            refetch_on_reconnect: false,
        }
    }

    /// Products and other catalog reads.
    pub fn semi_static() -> Self {
        Self {
            kind: StrategyKind::SemiStatic,
            stale_time: Duration::from_secs(5 * 60),
            retention: Duration::from_secs(15 * 60),
            refetch_on_window_focus: false,
            refetch_on_mount: true,
            refetch_on_reconnect: true,
        }
    }

    /// Carts, shipping options and prices.
    pub fn realtime() -> Self {
        Self {
            kind: StrategyKind::Realtime,
            stale_time: Duration::from_secs(30),
            retention: Duration::from_secs(5 * 60),
            refetch_on_window_focus: true,
            refetch_on_mount: true,
            refetch_on_reconnect: true,
        }
    }

    /// Customer profile, addresses, orders.
    pub fn user_data() -> Self {
        Self {
            kind: StrategyKind::UserData,
            stale_time: Duration::from_secs(2 * 60),
            retention: Duration::from_secs(10 * 60),
            refetch_on_window_focus: true,
            refetch_on_mount: true,
            refetch_on_reconnect: true,
        }
    }

    /// Set the freshness window.
    pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    /// Set the retention window.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Set the focus trigger.
    pub fn with_refetch_on_window_focus(mut self, enabled: bool) -> Self {
        self.refetch_on_window_focus = enabled;
        self
    }

    /// Set the mount trigger.
    pub fn with_refetch_on_mount(mut self, enabled: bool) -> Self {
        self.refetch_on_mount = enabled;
        self
    }

    /// Set the reconnect trigger.
    pub fn with_refetch_on_reconnect(mut self, enabled: bool) -> Self {
        self.refetch_on_reconnect = enabled;
        self
    }

    /// Check if data of this age is still fresh.
    pub fn is_fresh(&self, age: Duration) -> bool {
        age < self.stale_time
    }
}

impl Default for CacheStrategy {
    fn default() -> Self {
        Self::semi_static()
    }
}

/// The active profile for every preset, after overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategySet {
    profiles: HashMap<StrategyKind, CacheStrategy>,
}

impl Default for StrategySet {
    fn default() -> Self {
        Self {
            profiles: StrategyKind::ALL
                .into_iter()
                .map(|kind| (kind, CacheStrategy::preset(kind)))
                .collect(),
        }
    }
}

impl StrategySet {
    /// Get the profile for a preset.
    pub fn get(&self, kind: StrategyKind) -> CacheStrategy {
        self.profiles
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| CacheStrategy::preset(kind))
    }

    /// Replace the profile for a preset.
    pub fn with(mut self, strategy: CacheStrategy) -> Self {
        self.profiles.insert(strategy.kind, strategy);
        self
    }

    /// Adjust the profile for a preset.
    pub fn with_override(
        self,
        kind: StrategyKind,
        f: impl FnOnce(CacheStrategy) -> CacheStrategy,
    ) -> Self {
        let adjusted = f(self.get(kind));
        self.with(CacheStrategy { kind, ..adjusted })
    }
}
