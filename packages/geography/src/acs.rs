//! American Community Survey 5-year pulls.
//!
//! The Census API caps a request at 50 variables, so the catalog is split
//! into chunks of [`MAX_VARIABLES_PER_REQUEST`] (plus `NAME`) and the
//! responses are merged by GEOID.

use std::collections::{BTreeMap, HashMap};

use diridon_geography_models::{AcsRecord, fips};

use crate::GeoError;
use crate::client::{MAX_RETRIES, fetch_json_with_retry};

/// Environment variable holding the optional Census API key.
pub const API_KEY_ENV: &str = "CENSUS_API_KEY";

/// Variables per request, leaving room for `NAME` under the API limit.
pub const MAX_VARIABLES_PER_REQUEST: usize = 48;

/// Census "annotation" estimates (-666666666, -999999999, ...) sit at or
/// below this value and mean the estimate is unavailable.
pub const SENTINEL_THRESHOLD: f64 = -555_555_555.0;

/// `(friendly name, ACS variable)` for every estimate the pipeline uses.
pub const ACS_VARIABLES: &[(&str, &str)] = &[
    ("median_age", "B01002_001E"),
    ("median_income", "B19013_001E"),
    // Rent burden
    ("total_renter_households", "B25070_001E"),
    ("rent_<15", "B25070_002E"),
    ("rent_15_19", "B25070_003E"),
    ("rent_20_24", "B25070_004E"),
    ("rent_25_29", "B25070_005E"),
    ("rent_30_34", "B25070_006E"),
    ("rent_35_39", "B25070_007E"),
    ("rent_40_49", "B25070_008E"),
    ("rent_50_plus", "B25070_009E"),
    // Poverty
    ("poverty_universe", "B17001_001E"),
    ("below_poverty", "B17001_002E"),
    // Vehicle availability
    ("total_households", "B08201_001E"),
    ("no_vehicle", "B08201_002E"),
    // Tenure
    ("tenure_total", "B25003_001E"),
    ("owner_occupied", "B25003_002E"),
    ("renter_occupied", "B25003_003E"),
    // Commute mode
    ("total_workers", "B08301_001E"),
    ("drove", "B08301_002E"),
    ("public_transit_total", "B08301_010E"),
    ("bus", "B08301_011E"),
    ("subway", "B08301_012E"),
    ("commuter_rail", "B08301_013E"),
    ("light_rail", "B08301_014E"),
    ("bike", "B08301_018E"),
    ("walked", "B08301_019E"),
    ("worked_home", "B08301_021E"),
    // Median gross rent
    ("median_rent", "B25064_001E"),
    // Units in structure
    ("units_total", "B25024_001E"),
    ("units_1_detached", "B25024_002E"),
    ("units_1_attached", "B25024_003E"),
    ("units_2", "B25024_004E"),
    ("units_3_4", "B25024_005E"),
    ("units_5_9", "B25024_006E"),
    ("units_10_19", "B25024_007E"),
    ("units_20_49", "B25024_008E"),
    ("units_50_plus", "B25024_009E"),
    ("units_mobile", "B25024_010E"),
    ("units_other", "B25024_011E"),
    // Vacancy
    ("housing_units_total", "B25002_001E"),
    ("housing_units_occupied", "B25002_002E"),
    ("housing_units_vacant", "B25002_003E"),
    // Race / ethnicity
    ("race_total", "B02001_001E"),
    ("white", "B02001_002E"),
    ("black", "B02001_003E"),
    ("asian", "B02001_005E"),
    ("hisp_total", "B03003_001E"),
    ("hispanic", "B03003_003E"),
    // Education
    ("edu_total", "B15003_001E"),
    ("bachelors", "B15003_022E"),
    ("masters", "B15003_023E"),
    ("professional", "B15003_024E"),
    ("doctorate", "B15003_025E"),
    // Income inequality
    ("gini", "B19083_001E"),
];

/// Reads the API key from [`API_KEY_ENV`], ignoring blank values.
#[must_use]
pub fn api_key_from_env() -> Option<String> {
    std::env::var(API_KEY_ENV)
        .ok()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

/// Builds the ACS 5-year request URL for every tract of a state.
#[must_use]
pub fn acs_url(year: u16, variables: &[&str], state_fips: &str, api_key: Option<&str>) -> String {
    let mut url = format!(
        "https://api.census.gov/data/{year}/acs/acs5\
         ?get=NAME,{}\
         &for=tract:*\
         &in=state:{state_fips}",
        variables.join(",")
    );
    if let Some(key) = api_key {
        url.push_str("&key=");
        url.push_str(key);
    }
    url
}

/// Converts a cell of the Census array-of-arrays response to a number.
///
/// Cells arrive as strings (`"1181"`), occasionally as bare numbers, or
/// `null`. Sentinel codes and non-numeric cells become `None`.
#[must_use]
pub fn parse_estimate(cell: &serde_json::Value) -> Option<f64> {
    let value = match cell {
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        serde_json::Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    (value.is_finite() && value > SENTINEL_THRESHOLD).then_some(value)
}

/// Parses one Census API response into records keyed by GEOID.
///
/// The response is a JSON array of arrays whose first row is the header:
/// `[["NAME","B01002_001E","state","county","tract"], ["Census Tract 1; ...","35.2","06","085","500100"], ...]`.
/// Variable columns are renamed through `names` (ACS code to friendly
/// name); unknown columns are ignored.
///
/// # Errors
///
/// Returns [`GeoError::Conversion`] if the body is not an array of
/// arrays or the header lacks the geography columns.
pub fn parse_acs_response(
    json: &serde_json::Value,
    names: &HashMap<&str, &str>,
) -> Result<Vec<AcsRecord>, GeoError> {
    let rows = json.as_array().ok_or_else(|| GeoError::Conversion {
        message: "ACS response is not an array".to_string(),
    })?;

    let Some((header, body)) = rows.split_first() else {
        return Ok(Vec::new());
    };
    let header: Vec<&str> = header
        .as_array()
        .ok_or_else(|| GeoError::Conversion {
            message: "ACS header row is not an array".to_string(),
        })?
        .iter()
        .map(|h| h.as_str().unwrap_or_default())
        .collect();

    let column = |name: &str| {
        header
            .iter()
            .position(|h| *h == name)
            .ok_or_else(|| GeoError::Conversion {
                message: format!("ACS response has no '{name}' column"),
            })
    };
    let state_col = column("state")?;
    let county_col = column("county")?;
    let tract_col = column("tract")?;
    let name_col = header.iter().position(|h| *h == "NAME");

    let mut records = Vec::with_capacity(body.len());

    for row in body {
        let Some(cells) = row.as_array() else {
            continue;
        };
        let text = |i: usize| cells.get(i).and_then(serde_json::Value::as_str).unwrap_or("");

        // GEOID: state FIPS + county FIPS + tract code
        let geoid = format!("{}{}{}", text(state_col), text(county_col), text(tract_col));
        if geoid.len() != 11 {
            log::warn!("Skipping ACS row with malformed geography: {geoid:?}");
            continue;
        }

        let mut record = AcsRecord::new(geoid);
        if let Some(i) = name_col {
            record.name = text(i).to_string();
        }
        for (i, code) in header.iter().enumerate() {
            if let Some(friendly) = names.get(code) {
                let value = cells.get(i).and_then(parse_estimate);
                record.values.insert((*friendly).to_string(), value);
            }
        }
        records.push(record);
    }

    Ok(records)
}

/// Merges chunked responses: values from later chunks are added to the
/// record with the same GEOID. Output is sorted by GEOID.
#[must_use]
pub fn merge_chunks(chunks: Vec<Vec<AcsRecord>>) -> Vec<AcsRecord> {
    let mut merged: BTreeMap<String, AcsRecord> = BTreeMap::new();

    for record in chunks.into_iter().flatten() {
        match merged.get_mut(&record.geoid) {
            Some(existing) => {
                if existing.name.is_empty() {
                    existing.name = record.name;
                }
                existing.values.extend(record.values);
            }
            None => {
                merged.insert(record.geoid.clone(), record);
            }
        }
    }

    merged.into_values().collect()
}

/// Pulls every catalog variable for every tract in `state`.
///
/// `state` may be a FIPS code, abbreviation or state name.
///
/// # Errors
///
/// Returns [`GeoError`] for an unknown state, a failed request or an
/// unparseable response.
pub async fn fetch_acs(
    client: &reqwest::Client,
    state: &str,
    year: u16,
    api_key: Option<&str>,
) -> Result<Vec<AcsRecord>, GeoError> {
    let state_fips = fips::validate_state(state)?;
    let abbr = fips::state_abbr(state_fips);
    let names: HashMap<&str, &str> = ACS_VARIABLES.iter().map(|(n, c)| (*c, *n)).collect();
    let codes: Vec<&str> = ACS_VARIABLES.iter().map(|(_, c)| *c).collect();

    if api_key.is_none() {
        log::warn!("{API_KEY_ENV} not set; Census API requests are rate limited without a key");
    }

    let total_chunks = codes.len().div_ceil(MAX_VARIABLES_PER_REQUEST);
    let mut chunks = Vec::with_capacity(total_chunks);

    for (i, chunk) in codes.chunks(MAX_VARIABLES_PER_REQUEST).enumerate() {
        let label = format!(
            "ACS {year} for state {state_fips} ({abbr}), chunk {}/{total_chunks}",
            i + 1
        );
        log::info!("Fetching {label} ({} variables)...", chunk.len());

        let url = acs_url(year, chunk, state_fips, api_key);
        let json = fetch_json_with_retry(client, &url, &label, MAX_RETRIES).await?;
        chunks.push(parse_acs_response(&json, &names)?);
    }

    let records = merge_chunks(chunks);
    log::info!(
        "ACS {year}: {} tracts for state {state_fips} ({abbr})",
        records.len()
    );
    Ok(records)
}
