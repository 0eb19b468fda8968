//! Ambient region context.

use serde::{Deserialize, Serialize};

/// The (region, country) pair a storefront session is browsing in.
///
/// Passed explicitly to the query layer. Values already present on a request
/// always win over the context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionContext {
    /// Backend region identifier.
    pub region_id: Option<String>,
    /// ISO 3166-1 alpha-2 country code, lowercase.
    pub country_code: Option<String>,
}

impl RegionContext {
    /// Create a context for a region.
    pub fn new(region_id: impl Into<String>) -> Self {
        Self {
            region_id: Some(region_id.into()),
            country_code: None,
        }
    }

    /// Set the country code.
    pub fn with_country(mut self, country_code: impl Into<String>) -> Self {
        self.country_code = Some(country_code.into().to_lowercase());
        self
    }

    /// Check if the context carries nothing.
    pub fn is_empty(&self) -> bool {
        self.region_id.is_none() && self.country_code.is_none()
    }

    /// Fill unset request fields from the context.
    pub fn fill(&self, region_id: &mut Option<String>, country_code: &mut Option<String>) {
        if region_id.is_none() {
            region_id.clone_from(&self.region_id);
        }
        if country_code.is_none() {
            country_code.clone_from(&self.country_code);
        }
    }

    /// Overlay another context on top of this one.
    pub fn merged_with(&self, overrides: &RegionContext) -> RegionContext {
        RegionContext {
            region_id: overrides.region_id.clone().or_else(|| self.region_id.clone()),
            country_code: overrides
                .country_code
                .clone()
                .or_else(|| self.country_code.clone()),
        }
    }
}
