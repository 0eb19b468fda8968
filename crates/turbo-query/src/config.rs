//! Client configuration.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;
use turbo_cache::{BackoffStrategy, CacheStrategy, Namespace, RetryPolicy, StrategyKind, StrategySet};

/// Load any config type from a TOML or JSON file, chosen by extension.
pub fn load_file<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    if path.extension().is_some_and(|ext| ext == "json") {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON config: {}", path.display()))
    } else {
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }
}

/// Query client configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Cache key namespace.
    pub namespace: Vec<String>,

    /// Retry policy for backend calls.
    pub retry: RetryConfig,

    /// Per-preset strategy overrides, keyed by preset name.
    pub strategies: BTreeMap<String, StrategyOverride>,

    /// Interval between cache garbage collections.
    pub gc_interval_ms: u64,

    /// Default delay for scheduled prefetches.
    pub prefetch_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            namespace: vec!["commerce".to_string()],
            retry: RetryConfig::default(),
            strategies: BTreeMap::new(),
            gc_interval_ms: 60_000,
            prefetch_delay_ms: 200,
        }
    }
}

impl ClientConfig {
    /// Load and validate config from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = load_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML config")?;
        config.validate()?;
        Ok(config)
    }

    /// Check the config for values that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() || self.namespace.iter().any(String::is_empty) {
            bail!("namespace must have at least one non-empty part");
        }
        if self.gc_interval_ms == 0 {
            bail!("gc_interval_ms must be greater than zero");
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            bail!(
                "retry.max_delay_ms ({}) is below retry.base_delay_ms ({})",
                self.retry.max_delay_ms,
                self.retry.base_delay_ms
            );
        }
        if let Some(name) = self
            .strategies
            .keys()
            .find(|name| StrategyKind::from_name(name).is_none())
        {
            bail!("unknown strategy profile: {name}");
        }
        Ok(())
    }

    /// The key namespace.
    pub fn namespace(&self) -> Namespace {
        Namespace::from(self.namespace.clone())
    }

    /// The retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.policy()
    }

    /// Presets with overrides applied.
    pub fn strategy_set(&self) -> StrategySet {
        self.strategies
            .iter()
            .fold(StrategySet::default(), |set, (name, overrides)| {
                match StrategyKind::from_name(name) {
                    Some(kind) => set.with_override(kind, |s| overrides.apply(s)),
                    None => {
                        warn!(profile = %name, "ignoring unknown strategy profile");
                        set
                    }
                }
            })
    }

    /// Garbage collection interval.
    pub fn gc_interval(&self) -> Duration {
        Duration::from_millis(self.gc_interval_ms)
    }

    /// Scheduled prefetch delay.
    pub fn prefetch_delay(&self) -> Duration {
        Duration::from_millis(self.prefetch_delay_ms)
    }
}

/// Retry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_attempts: u32,
    /// First backoff delay.
    pub base_delay_ms: u64,
    /// Backoff ceiling.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    /// Build the retry policy.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts).with_backoff(BackoffStrategy::Exponential {
            base: Duration::from_millis(self.base_delay_ms),
            max: Duration::from_millis(self.max_delay_ms),
        })
    }
}

/// Optional overrides for one strategy preset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_time_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retention_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refetch_on_window_focus: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refetch_on_mount: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refetch_on_reconnect: Option<bool>,
}

impl StrategyOverride {
    /// Apply the overrides to a profile.
    pub fn apply(&self, mut strategy: CacheStrategy) -> CacheStrategy {
        if let Some(ms) = self.stale_time_ms {
            strategy.stale_time = Duration::from_millis(ms);
        }
        if let Some(ms) = self.retention_ms {
            strategy.retention = Duration::from_millis(ms);
        }
        if let Some(v) = self.refetch_on_window_focus {
            strategy.refetch_on_window_focus = v;
        }
        if let Some(v) = self.refetch_on_mount {
            strategy.refetch_on_mount = v;
        }
        if let Some(v) = self.refetch_on_reconnect {
            strategy.refetch_on_reconnect = v;
        }
        strategy
    }
}
