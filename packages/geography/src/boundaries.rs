//! Tract and place boundaries from the Census Bureau `TIGERweb` REST API.
//!
//! Boundaries are requested as `GeoJSON` in EPSG:4326 from the
//! `tigerWMS_<vintage>` map service (e.g. `tigerWMS_ACS2022`).

use diridon_geography_models::{CensusPlace, CensusTract, fips};
use geo::MultiPolygon;
use geojson::GeoJson;

use crate::GeoError;
use crate::client::fetch_tigerweb_paginated;

/// `TIGERweb` layer holding census tracts.
pub const TRACT_LAYER: u32 = 8;

/// `TIGERweb` layer holding incorporated places.
pub const INCORPORATED_PLACE_LAYER: u32 = 28;

/// Builds the query URL for every feature of `layer` in a state.
#[must_use]
pub fn tigerweb_query_url(vintage: &str, layer: u32, state_fips: &str, fields: &str) -> String {
    format!(
        "https://tigerweb.geo.census.gov/arcgis/rest/services/TIGERweb/tigerWMS_{vintage}/MapServer/{layer}/query\
         ?where=STATE%3D%27{state_fips}%27\
         &outFields={fields}\
         &outSR=4326\
         &f=geojson\
         &returnGeometry=true"
    )
}

/// Parses a `GeoJSON` geometry value into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
#[must_use]
pub fn parse_boundary(geometry: &serde_json::Value) -> Option<MultiPolygon<f64>> {
    if geometry.is_null() {
        return None;
    }
    let geojson: GeoJson = geometry.to_string().parse().ok()?;
    if let GeoJson::Geometry(geom) = geojson {
        let geo_geom: geo::Geometry<f64> = geom.try_into().ok()?;
        match geo_geom {
            geo::Geometry::MultiPolygon(mp) => Some(mp),
            geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
            _ => None,
        }
    } else {
        None
    }
}

fn text_property(props: &serde_json::Value, key: &str) -> Option<String> {
    match &props[key] {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn numeric_property(props: &serde_json::Value, key: &str) -> Option<f64> {
    props[key]
        .as_f64()
        .or_else(|| props[key].as_str().and_then(|s| s.trim().parse().ok()))
}

/// Converts one `TIGERweb` tract feature. Features without a GEOID or a
/// polygon geometry yield `None`.
#[must_use]
pub fn parse_tract_feature(feature: &serde_json::Value) -> Option<CensusTract> {
    let props = &feature["properties"];
    let geoid = text_property(props, "GEOID")?;
    let boundary = parse_boundary(&feature["geometry"])?;

    Some(CensusTract {
        name: text_property(props, "NAME").unwrap_or_else(|| format!("Census Tract {geoid}")),
        state_fips: text_property(props, "STATE").unwrap_or_else(|| geoid.chars().take(2).collect()),
        county_fips: text_property(props, "COUNTY")
            .unwrap_or_else(|| geoid.chars().skip(2).take(3).collect()),
        land_area_m2: numeric_property(props, "AREALAND"),
        geoid,
        boundary,
    })
}

/// Converts one `TIGERweb` place feature. Features without a GEOID or a
/// polygon geometry yield `None`.
#[must_use]
pub fn parse_place_feature(feature: &serde_json::Value) -> Option<CensusPlace> {
    let props = &feature["properties"];
    let geoid = text_property(props, "GEOID")?;
    let boundary = parse_boundary(&feature["geometry"])?;
    let full_name = text_property(props, "NAME").unwrap_or_default();
    let name = text_property(props, "BASENAME").unwrap_or_else(|| full_name.clone());

    Some(CensusPlace {
        state_fips: text_property(props, "STATE").unwrap_or_else(|| geoid.chars().take(2).collect()),
        geoid,
        name,
        full_name,
        boundary,
    })
}

/// Downloads every census tract boundary in a state.
///
/// # Errors
///
/// Returns [`GeoError`] for an unknown state or if any page request fails.
pub async fn fetch_tracts(
    client: &reqwest::Client,
    state: &str,
    vintage: &str,
) -> Result<Vec<CensusTract>, GeoError> {
    let state_fips = fips::validate_state(state)?;
    let abbr = fips::state_abbr(state_fips);
    let url = tigerweb_query_url(
        vintage,
        TRACT_LAYER,
        state_fips,
        "GEOID,NAME,STATE,COUNTY,AREALAND",
    );

    let label = format!("{vintage} tracts for state {state_fips} ({abbr})");
    log::info!("Fetching {label}...");
    let features = fetch_tigerweb_paginated(client, &url, &label).await?;

    let tracts: Vec<CensusTract> = features.iter().filter_map(parse_tract_feature).collect();
    let skipped = features.len() - tracts.len();
    if skipped > 0 {
        log::warn!("{label}: skipped {skipped} features without GEOID or polygon geometry");
    }
    log::info!("{label}: {} tracts", tracts.len());

    Ok(tracts)
}

/// Downloads every incorporated place boundary in a state.
///
/// # Errors
///
/// Returns [`GeoError`] for an unknown state or if any page request fails.
pub async fn fetch_places(
    client: &reqwest::Client,
    state: &str,
    vintage: &str,
) -> Result<Vec<CensusPlace>, GeoError> {
    let state_fips = fips::validate_state(state)?;
    let abbr = fips::state_abbr(state_fips);
    let url = tigerweb_query_url(
        vintage,
        INCORPORATED_PLACE_LAYER,
        state_fips,
        "GEOID,BASENAME,NAME,STATE",
    );

    let label = format!("{vintage} incorporated places for state {state_fips} ({abbr})");
    log::info!("Fetching {label}...");
    let features = fetch_tigerweb_paginated(client, &url, &label).await?;

    let places: Vec<CensusPlace> = features.iter().filter_map(parse_place_feature).collect();
    log::info!("{label}: {} places", places.len());

    Ok(places)
}
