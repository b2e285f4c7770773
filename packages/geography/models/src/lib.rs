#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Census geography types.
//!
//! Tract and place boundaries pulled from `TIGERweb`, and per-tract
//! American Community Survey records with their derived indicators.

pub mod fips;

use std::collections::BTreeMap;

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

/// A census tract boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct CensusTract {
    /// Census GEOID (state FIPS + county FIPS + tract code, e.g. "06085500100").
    pub geoid: String,
    /// Tract name as published (e.g. "Census Tract 5001").
    pub name: String,
    /// Two-digit state FIPS code.
    pub state_fips: String,
    /// Three-digit county FIPS code.
    pub county_fips: String,
    /// Land area in square meters.
    pub land_area_m2: Option<f64>,
    /// Boundary in EPSG:4326.
    pub boundary: MultiPolygon<f64>,
}

/// An incorporated place (city) boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct CensusPlace {
    /// Census place GEOID (state FIPS + place code).
    pub geoid: String,
    /// Base name without legal suffix (e.g. "San Jose").
    pub name: String,
    /// Full name (e.g. "San Jose city").
    pub full_name: String,
    /// Two-digit state FIPS code.
    pub state_fips: String,
    /// Boundary in EPSG:4326.
    pub boundary: MultiPolygon<f64>,
}

impl CensusPlace {
    /// Whether `city` names this place, ignoring case, by base or full name.
    #[must_use]
    pub fn matches_name(&self, city: &str) -> bool {
        let city = city.trim();
        self.name.eq_ignore_ascii_case(city) || self.full_name.eq_ignore_ascii_case(city)
    }
}

/// ACS 5-year estimates for one tract.
///
/// `values` holds raw estimates keyed by friendly variable name;
/// `indicators` holds derived percentages and counts. Missing estimates,
/// Census sentinel codes and undefined ratios are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcsRecord {
    /// Tract GEOID.
    pub geoid: String,
    /// Census `NAME` string (e.g. "Census Tract 5001; Santa Clara County; California").
    pub name: String,
    /// Raw estimates by friendly name.
    pub values: BTreeMap<String, Option<f64>>,
    /// Derived indicators by name.
    pub indicators: BTreeMap<String, Option<f64>>,
}

impl AcsRecord {
    /// Creates an empty record for `geoid`.
    #[must_use]
    pub fn new(geoid: impl Into<String>) -> Self {
        Self {
            geoid: geoid.into(),
            ..Self::default()
        }
    }

    /// Raw estimate by friendly name.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied().flatten()
    }

    /// Derived indicator by name.
    #[must_use]
    pub fn indicator(&self, name: &str) -> Option<f64> {
        self.indicators.get(name).copied().flatten()
    }

    /// Looks up `name` among indicators first, then raw values.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.indicators
            .get(name)
            .or_else(|| self.values.get(name))
            .copied()
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn place_name_matching() {
        let place = CensusPlace {
            geoid: "0668000".to_string(),
            name: "San Jose".to_string(),
            full_name: "San Jose city".to_string(),
            state_fips: "06".to_string(),
            boundary: MultiPolygon(vec![]),
        };
        assert!(place.matches_name("San Jose"));
        assert!(place.matches_name("san jose city"));
        assert!(!place.matches_name("San Jose del Monte"));
    }

    #[test]
    fn record_lookup_prefers_indicators() {
        let mut record = AcsRecord::new("06085500100");
        record.values.insert("median_rent".to_string(), Some(2400.0));
        record.values.insert("gini".to_string(), None);
        record.indicators.insert("pct_renters".to_string(), Some(55.0));

        assert_eq!(record.get("median_rent"), Some(2400.0));
        assert_eq!(record.get("pct_renters"), Some(55.0));
        assert_eq!(record.get("gini"), None);
        assert_eq!(record.value("pct_renters"), None);
        assert_eq!(record.indicator("missing"), None);
    }
}
