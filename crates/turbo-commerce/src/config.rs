//! Storefront configuration.
//!
//! Extends the query client file with a `[cart]` table:
//!
//! ```toml
//! namespace = ["shop"]
//!
//! [strategies.realtime]
//! stale_time_ms = 0
//!
//! [cart]
//! auto_create = true
//! auto_update_region = false
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use turbo_query::{load_file, ClientConfig, QueryClient};

use crate::cart::CartOptions;

/// Storefront configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorefrontConfig {
    /// Query client settings at the top level of the file.
    #[serde(flatten)]
    pub client: ClientConfig,

    #[serde(default)]
    pub cart: CartConfig,
}

impl StorefrontConfig {
    /// Load and validate config from a TOML or JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: Self = load_file(path)?;
        config
            .client
            .validate()
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        Ok(config)
    }

    /// Parse and validate config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse TOML config")?;
        config.client.validate()?;
        Ok(config)
    }

    /// Build a query client from the file.
    pub fn query_client(&self) -> QueryClient {
        QueryClient::from_config(&self.client)
    }

    /// Cart behaviour flags.
    pub fn cart_options(&self) -> CartOptions {
        CartOptions {
            auto_create: self.cart.auto_create,
            require_region: self.cart.require_region,
            auto_update_region: self.cart.auto_update_region,
        }
    }
}

/// `[cart]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartConfig {
    /// Create a cart on first use.
    pub auto_create: bool,
    /// Refuse to create a cart without a region.
    pub require_region: bool,
    /// Move the cart when the browsing region changes.
    pub auto_update_region: bool,
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            auto_create: true,
            require_region: true,
            auto_update_region: true,
        }
    }
}
