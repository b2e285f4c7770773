//! City tract subsets and the tract/ACS merge.

use std::collections::HashMap;

use diridon_geography_models::{AcsRecord, CensusPlace, CensusTract};
use diridon_spatial_models::{AttributeValue, Crs, Feature, Layer};
use geo::{Centroid, Contains};

use crate::acs::ACS_VARIABLES;
use crate::indicators::INDICATORS;

/// Keeps the tracts whose centroid lies inside a place named `city_name`.
///
/// Places match by base name or full name, ignoring case. Tract geometry
/// is returned unchanged.
#[must_use]
pub fn subset_city_tracts(
    tracts: &[CensusTract],
    places: &[CensusPlace],
    city_name: &str,
) -> Vec<CensusTract> {
    let city: Vec<&CensusPlace> = places.iter().filter(|p| p.matches_name(city_name)).collect();

    if city.is_empty() {
        log::warn!("No place named '{city_name}' among {} places", places.len());
        return Vec::new();
    }

    let subset: Vec<CensusTract> = tracts
        .iter()
        .filter(|tract| {
            tract
                .boundary
                .centroid()
                .is_some_and(|c| city.iter().any(|place| place.boundary.contains(&c)))
        })
        .cloned()
        .collect();

    log::info!(
        "{} of {} tracts have their centroid in {city_name}",
        subset.len(),
        tracts.len()
    );
    subset
}

/// Every ACS column a merged tract layer carries, raw estimates first.
#[must_use]
pub fn acs_columns() -> Vec<&'static str> {
    ACS_VARIABLES
        .iter()
        .map(|(name, _)| *name)
        .chain(INDICATORS.iter().map(|(name, _)| *name))
        .collect()
}

/// Left-joins ACS records onto tracts by GEOID, producing a tract layer in
/// EPSG:4326.
///
/// Every tract keeps one row. Tracts without a matching record carry null
/// ACS columns so the layer schema is identical for all rows.
#[must_use]
pub fn merge_tracts_with_acs(tracts: &[CensusTract], acs: &[AcsRecord]) -> Layer {
    let by_geoid: HashMap<&str, &AcsRecord> = acs.iter().map(|r| (r.geoid.as_str(), r)).collect();
    let columns = acs_columns();
    let mut unmatched = 0usize;

    let features: Vec<Feature> = tracts
        .iter()
        .map(|tract| {
            let mut feature = Feature::new(tract.boundary.clone())
                .with("GEOID", tract.geoid.as_str())
                .with("NAME", tract.name.as_str())
                .with("STATEFP", tract.state_fips.as_str())
                .with("COUNTYFP", tract.county_fips.as_str())
                .with("ALAND", tract.land_area_m2);

            let record = by_geoid.get(tract.geoid.as_str());
            if record.is_none() {
                unmatched += 1;
            }
            for column in &columns {
                let value = record.and_then(|r| r.get(column));
                feature.set(column, AttributeValue::from_f64(value));
            }
            feature
        })
        .collect();

    if unmatched > 0 {
        log::warn!("{unmatched} of {} tracts have no ACS record", tracts.len());
    }

    Layer::with_features("tracts_with_acs", Crs::WGS84, features)
}
