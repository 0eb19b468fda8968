//! Sales regions.
//!
//! A region fixes the currency and the set of countries a cart can ship to.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use turbo_cache::{Namespace, StrategyKind};
use turbo_query::{DomainKeys, EntityQueries, EntityService, Identify, QueryClient, ReadService};

use crate::ids::RegionId;

pub const DOMAIN: &str = "regions";

/// Key builder for regions.
pub fn keys(namespace: &Namespace) -> DomainKeys {
    DomainKeys::new(namespace.clone(), DOMAIN)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Country {
    /// ISO 3166-1 alpha-2, lowercase.
    pub iso_2: String,
    #[serde(default)]
    pub display_name: String,
}

impl Country {
    pub fn new(iso_2: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            iso_2: iso_2.into().to_lowercase(),
            display_name: display_name.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Region {
    pub id: RegionId,
    pub name: String,
    pub currency_code: String,
    #[serde(default)]
    pub countries: Vec<Country>,
}

impl Region {
    pub fn new(id: impl Into<RegionId>, name: impl Into<String>, currency_code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            currency_code: currency_code.into(),
            countries: Vec::new(),
        }
    }

    pub fn with_country(mut self, country: Country) -> Self {
        self.countries.push(country);
        self
    }

    /// Case-insensitive country membership.
    pub fn has_country(&self, country_code: &str) -> bool {
        self.countries
            .iter()
            .any(|c| c.iso_2.eq_ignore_ascii_case(country_code.trim()))
    }
}

impl Identify for Region {
    fn id(&self) -> &str {
        self.id.as_str()
    }
}

/// The first region that ships to `country_code`.
pub fn find_region_for_country<'a>(regions: &'a [Region], country_code: &str) -> Option<&'a Region> {
    regions.iter().find(|r| r.has_country(country_code))
}

pub type RegionQueries = EntityQueries<Region, ()>;

/// Region operations on the static profile.
pub fn region_queries(client: &QueryClient, reader: Arc<dyn ReadService<Region, ()>>) -> RegionQueries {
    client.entity(DOMAIN, EntityService::from_reader(reader), StrategyKind::Static)
}
