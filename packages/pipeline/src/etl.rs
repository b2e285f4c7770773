//! Extract, transform and load.
//!
//! Reads the city's parcel and zoning layers, pulls ACS estimates and
//! TIGERweb boundaries, joins parcels to zoning and tracts, and writes every
//! processed layer to `data/processed/` as `GeoParquet`.

use std::path::PathBuf;
use std::sync::Arc;

use diridon_geography::acs::{api_key_from_env, fetch_acs};
use diridon_geography::boundaries::{fetch_places, fetch_tracts};
use diridon_geography::city::{merge_tracts_with_acs, subset_city_tracts};
use diridon_geography::client::build_client;
use diridon_geography::indicators::compute_acs_indicators;
use diridon_geography_models::{AcsRecord, CensusPlace, CensusTract};
use diridon_spatial::join::{ZonedParcels, join_parcels_zoning};
use diridon_spatial::progress::ProgressCallback;
use diridon_spatial::tracts::attach_tract_data;
use diridon_spatial_models::{AttributeValue, Layer};
use diridon_storage::geoparquet::write_geoparquet;
use diridon_storage::paths::{self, DataPaths};
use diridon_storage::read_layer;
use diridon_zoning::{abbreviate_zoning, classify_zoning, is_planned_development};

use crate::PipelineError;
use crate::config::{CensusConfig, InputPaths, PipelineConfig};

/// Raw code of the joined zoning district.
pub const ZONING_CODE_COLUMN: &str = "zoning_code";
/// Human-readable zoning category column.
pub const ZONING_COLUMN: &str = "zoning";
/// Land-use class column.
pub const ZONING_CLASS_COLUMN: &str = "zoning_class";
/// Planned development flag column.
pub const ZONING_PLANNED_COLUMN: &str = "zoning_planned";

/// City layers read from disk.
#[derive(Debug, Clone)]
pub struct CityLayers {
    /// Parcel polygons.
    pub parcels: Layer,
    /// Zoning districts.
    pub zoning: Layer,
    /// Affordable rental housing sites.
    pub affordable: Option<Layer>,
    /// Equity index tracts.
    pub equity: Option<Layer>,
}

/// Census data pulled from the ACS and TIGERweb APIs.
#[derive(Debug, Clone)]
pub struct CensusData {
    /// ACS estimates for every tract in the state.
    pub acs: Vec<AcsRecord>,
    /// Tract boundaries for the state.
    pub tracts: Vec<CensusTract>,
    /// Incorporated place boundaries for the state.
    pub places: Vec<CensusPlace>,
}

/// Every processed layer produced by the ETL.
#[derive(Debug, Clone)]
pub struct EtlOutputs {
    /// One row per parcel with zoning columns.
    pub parcels_zoned: Layer,
    /// Zoning districts as read.
    pub zoning: Layer,
    /// City tracts with ACS estimates and indicators.
    pub tracts_with_acs: Layer,
    /// Zoned parcels with tract indicators.
    pub parcels_with_tract_data: Layer,
    /// Affordable rental housing sites as read.
    pub affordable: Option<Layer>,
    /// Equity index tracts as read.
    pub equity: Option<Layer>,
}

// ── Extract ──────────────────────────────────────────────────────────────

/// Reads the city input layers.
///
/// # Errors
///
/// Returns [`PipelineError::Storage`] if any layer cannot be read.
pub fn read_city_layers(
    inputs: &InputPaths,
    paths: &DataPaths,
) -> Result<CityLayers, PipelineError> {
    let read = |path: &PathBuf| read_layer(&paths.resolve(path), inputs.crs_override);

    let parcels = read(&inputs.parcels)?;
    let zoning = read(&inputs.zoning)?;
    let affordable = inputs.affordable.as_ref().map(&read).transpose()?;
    let equity = inputs.equity.as_ref().map(&read).transpose()?;

    log::info!(
        "Read {} parcels ({}) and {} zoning districts ({})",
        parcels.len(),
        parcels.crs,
        zoning.len(),
        zoning.crs
    );

    Ok(CityLayers {
        parcels,
        zoning,
        affordable,
        equity,
    })
}

/// Pulls ACS estimates and tract and place boundaries for the configured
/// state. Requests run one after another.
///
/// # Errors
///
/// Returns [`PipelineError::Geo`] if any request fails.
pub async fn fetch_census(census: &CensusConfig) -> Result<CensusData, PipelineError> {
    let client = build_client()?;
    let api_key = api_key_from_env();
    if api_key.is_none() {
        log::warn!("CENSUS_API_KEY is not set; ACS requests are rate limited");
    }

    let acs = fetch_acs(&client, &census.state, census.year, api_key.as_deref()).await?;
    let tracts = fetch_tracts(&client, &census.state, &census.boundary_vintage).await?;
    let places = fetch_places(&client, &census.state, &census.boundary_vintage).await?;

    Ok(CensusData {
        acs,
        tracts,
        places,
    })
}

// ── Transform ────────────────────────────────────────────────────────────

/// Adds `zoning_code`, `zoning`, `zoning_class` and `zoning_planned` to
/// every joined parcel, using the code of the district each parcel was
/// matched to. `zoning_code` has a fixed name so it survives the
/// `_left`/`_right` renaming the join applies when parcels carry their own
/// zoning column.
#[must_use]
pub fn classify_parcels(zoned: &ZonedParcels, code_field: &str) -> Layer {
    let mut layer = zoned.layer.clone();

    for (feature, district) in layer.features.iter_mut().zip(&zoned.districts) {
        let code = district
            .and_then(|d| zoned.zoning.features.get(d))
            .and_then(|z| z.get(code_field).as_text());
        let code = code.as_deref();

        feature.set(
            ZONING_CODE_COLUMN,
            code.map_or(AttributeValue::Null, AttributeValue::from),
        );
        feature.set(ZONING_COLUMN, abbreviate_zoning(code));
        feature.set(ZONING_CLASS_COLUMN, classify_zoning(code).to_string());
        feature.set(ZONING_PLANNED_COLUMN, is_planned_development(code));
    }

    layer
}

/// Runs every transform step on already extracted data.
///
/// # Errors
///
/// Returns [`PipelineError::Spatial`] if a join fails.
pub fn transform(
    city: CityLayers,
    mut census: CensusData,
    config: &PipelineConfig,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<EtlOutputs, PipelineError> {
    log::info!("Joining parcels to zoning districts...");
    let zoned = join_parcels_zoning(&city.parcels, &city.zoning, &config.join.options(), progress)?;
    let parcels_zoned = classify_parcels(&zoned, &config.join.zoning_code_field);

    log::info!("Computing ACS indicators...");
    compute_acs_indicators(&mut census.acs);

    log::info!("Subsetting tracts to {}...", config.census.city);
    let city_tracts = subset_city_tracts(&census.tracts, &census.places, &config.census.city);

    log::info!("Merging ACS with tract geometries...");
    let tracts_with_acs = merge_tracts_with_acs(&city_tracts, &census.acs);

    log::info!("Attaching tract data to parcels...");
    let parcels_with_tract_data = attach_tract_data(
        &parcels_zoned,
        &tracts_with_acs,
        &config.tracts.fields,
        config.tracts.containment,
        progress,
    )?;

    Ok(EtlOutputs {
        parcels_zoned,
        zoning: city.zoning,
        tracts_with_acs,
        parcels_with_tract_data,
        affordable: city.affordable,
        equity: city.equity,
    })
}

// ── Load ─────────────────────────────────────────────────────────────────

/// Writes every processed layer and returns the written paths.
///
/// # Errors
///
/// Returns [`PipelineError::Storage`] if any file cannot be written.
pub fn write_outputs(
    outputs: &EtlOutputs,
    paths: &DataPaths,
) -> Result<Vec<PathBuf>, PipelineError> {
    let mut layers: Vec<(&Layer, &str)> = vec![
        (&outputs.parcels_zoned, paths::PARCELS_WITH_ZONING),
        (&outputs.zoning, paths::ZONING),
    ];
    if let Some(equity) = &outputs.equity {
        layers.push((equity, paths::EQUITY));
    }
    if let Some(affordable) = &outputs.affordable {
        layers.push((affordable, paths::AFFORDABLE));
    }
    layers.push((&outputs.tracts_with_acs, paths::TRACTS_WITH_ACS));
    layers.push((&outputs.parcels_with_tract_data, paths::PARCELS_WITH_TRACT_DATA));

    layers
        .into_iter()
        .map(|(layer, file)| {
            let path = paths.processed(file);
            write_geoparquet(layer, &path)?;
            Ok(path)
        })
        .collect()
}

/// Runs the full ETL: extract, transform, load.
///
/// # Errors
///
/// Returns [`PipelineError`] from whichever step fails first.
pub async fn run_etl(
    config: &PipelineConfig,
    paths: &DataPaths,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<EtlOutputs, PipelineError> {
    log::info!("Starting ETL pipeline");

    log::info!("Extracting data...");
    let city = read_city_layers(&config.paths, paths)?;
    let census = fetch_census(&config.census).await?;

    let outputs = transform(city, census, config, progress)?;

    log::info!("Saving outputs...");
    let written = write_outputs(&outputs, paths)?;
    log::info!("ETL finished: {} layers written", written.len());

    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use diridon_spatial::progress::null_progress;
    use diridon_spatial_models::{Crs, Feature};
    use geo::{MultiPolygon, Rect, coord};

    fn square(x: f64, y: f64, size: f64) -> geo::Polygon<f64> {
        Rect::new(coord! { x: x, y: y }, coord! { x: x + size, y: y + size }).to_polygon()
    }

    fn city() -> CityLayers {
        CityLayers {
            parcels: Layer::with_features(
                "Parcels",
                Crs::WGS84,
                vec![
                    Feature::new(square(0.1, 0.1, 0.2)).with("PARCELID", 2i64),
                    // Mostly in the R-1-8 district.
                    Feature::new(square(0.9, 0.1, 0.4)).with("PARCELID", 1i64),
                    Feature::new(square(5.0, 5.0, 0.1)).with("PARCELID", 3i64),
                ],
            ),
            zoning: Layer::with_features(
                "Zoning_Districts",
                Crs::WGS84,
                vec![
                    Feature::new(square(0.0, 0.0, 1.0)).with("ZONING", "UR(PD)"),
                    Feature::new(square(1.0, 0.0, 1.0)).with("ZONING", "R-1-8"),
                ],
            ),
            affordable: None,
            equity: None,
        }
    }

    fn census() -> CensusData {
        let tract = |geoid: &str, x: f64| CensusTract {
            geoid: geoid.to_string(),
            name: format!("Census Tract {geoid}"),
            state_fips: "06".to_string(),
            county_fips: "085".to_string(),
            land_area_m2: None,
            boundary: MultiPolygon(vec![square(x, 0.0, 2.0)]),
        };
        let mut record = AcsRecord::new("06085000100");
        record.values.insert("median_rent".to_string(), Some(2500.0));
        record.values.insert("tenure_total".to_string(), Some(200.0));
        record.values.insert("renter_occupied".to_string(), Some(50.0));

        CensusData {
            acs: vec![record],
            tracts: vec![tract("06085000100", 0.0), tract("06085999999", 50.0)],
            places: vec![CensusPlace {
                geoid: "0668000".to_string(),
                name: "San Jose".to_string(),
                full_name: "San Jose city".to_string(),
                state_fips: "06".to_string(),
                boundary: MultiPolygon(vec![square(-1.0, -1.0, 10.0)]),
            }],
        }
    }

    fn config() -> PipelineConfig {
        PipelineConfig::load(None).unwrap()
    }

    #[test]
    fn classification_uses_joined_district_code() {
        let outputs = transform(city(), census(), &config(), &null_progress()).unwrap();
        let parcels = &outputs.parcels_zoned;

        let ids: Vec<i64> = parcels
            .features
            .iter()
            .filter_map(|f| match f.get("PARCELID") {
                AttributeValue::Integer(i) => Some(*i),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let first = &parcels.features[0];
        assert_eq!(first.get("ZONING").as_str(), Some("R-1-8"));
        assert_eq!(first.get(ZONING_CODE_COLUMN).as_str(), Some("R-1-8"));
        assert_eq!(first.get(ZONING_COLUMN).as_str(), Some("Other"));
        assert_eq!(first.get(ZONING_CLASS_COLUMN).as_str(), Some("Residential"));
        assert_eq!(first.get(ZONING_PLANNED_COLUMN).as_bool(), Some(false));

        let second = &parcels.features[1];
        assert_eq!(second.get(ZONING_CLASS_COLUMN).as_str(), Some("Mixed Use"));
        assert_eq!(second.get(ZONING_PLANNED_COLUMN).as_bool(), Some(true));

        let unmatched = &parcels.features[2];
        assert!(unmatched.get(ZONING_CODE_COLUMN).is_null());
        assert_eq!(unmatched.get(ZONING_COLUMN).as_str(), Some("Unknown"));
        assert_eq!(unmatched.get(ZONING_CLASS_COLUMN).as_str(), Some("Unknown"));
    }

    #[test]
    fn tracts_are_subset_merged_and_attached() {
        let outputs = transform(city(), census(), &config(), &null_progress()).unwrap();

        assert_eq!(outputs.tracts_with_acs.len(), 1);
        let tract = &outputs.tracts_with_acs.features[0];
        assert_eq!(tract.get("pct_renters").as_f64(), Some(25.0));

        let parcels = &outputs.parcels_with_tract_data;
        assert_eq!(parcels.len(), 3);
        assert_eq!(parcels.features[0].get("GEOID").as_str(), Some("06085000100"));
        assert_eq!(parcels.features[0].get("median_rent").as_f64(), Some(2500.0));
        assert!(parcels.features[2].get("GEOID").is_null());
        assert!(parcels.features[2].get("pct_renters").is_null());
    }

    #[test]
    fn writes_processed_layers() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let outputs = transform(city(), census(), &config(), &null_progress()).unwrap();

        let written = write_outputs(&outputs, &paths).unwrap();
        assert_eq!(written.len(), 4);
        assert!(paths.processed(paths::TRACTS_WITH_ACS).is_file());
        assert!(!paths.processed(paths::EQUITY).exists());
    }

    /// Parcels around the station that carry their own `ZONING` column,
    /// which disagrees with the district they sit in.
    fn station_city() -> CityLayers {
        let (lon, lat) = (-121.9036, 37.3292);
        CityLayers {
            parcels: Layer::with_features(
                "Parcels",
                Crs::WGS84,
                vec![
                    Feature::new(square(lon - 0.0005, lat - 0.0005, 0.001))
                        .with("PARCELID", 10i64)
                        .with("ZONING", "R-1-8"),
                    Feature::new(square(-121.8955, lat - 0.0005, 0.001))
                        .with("PARCELID", 11i64)
                        .with("ZONING", "UV"),
                ],
            ),
            zoning: Layer::with_features(
                "Zoning_Districts",
                Crs::WGS84,
                vec![
                    Feature::new(square(-121.91, 37.32, 0.01)).with("ZONING", "UV"),
                    Feature::new(square(-121.90, 37.32, 0.01)).with("ZONING", "R-1-8"),
                ],
            ),
            affordable: None,
            equity: None,
        }
    }

    fn station_census() -> CensusData {
        let mut record = AcsRecord::new("06085500100");
        record.values.insert("median_rent".to_string(), Some(2400.0));
        CensusData {
            acs: vec![record],
            tracts: vec![CensusTract {
                geoid: "06085500100".to_string(),
                name: "Census Tract 5001".to_string(),
                state_fips: "06".to_string(),
                county_fips: "085".to_string(),
                land_area_m2: None,
                boundary: MultiPolygon(vec![square(-121.93, 37.30, 0.06)]),
            }],
            places: vec![CensusPlace {
                geoid: "0668000".to_string(),
                name: "San Jose".to_string(),
                full_name: "San Jose city".to_string(),
                state_fips: "06".to_string(),
                boundary: MultiPolygon(vec![square(-122.0, 37.2, 0.3)]),
            }],
        }
    }

    #[test]
    fn parcels_with_own_zoning_column_keep_district_code() {
        let outputs =
            transform(station_city(), station_census(), &config(), &null_progress()).unwrap();
        let parcels = &outputs.parcels_zoned;

        assert!(!parcels.has_column("ZONING"));
        assert_eq!(parcels.features[0].get("ZONING_left").as_str(), Some("R-1-8"));
        assert_eq!(parcels.features[0].get(ZONING_CODE_COLUMN).as_str(), Some("UV"));
        assert_eq!(parcels.features[1].get(ZONING_CODE_COLUMN).as_str(), Some("R-1-8"));
    }

    #[test]
    fn station_stage_reads_processed_parcels() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let config = config();
        let outputs =
            transform(station_city(), station_census(), &config, &null_progress()).unwrap();
        write_outputs(&outputs, &paths).unwrap();

        let station = crate::station::run_station(&config.station, &paths).unwrap();

        assert_eq!(station.total_parcels, 2);
        assert_eq!(station.uv_parcels, 1);
        let urban = diridon_storage::geoparquet::read_geoparquet(&station.urban_parcels).unwrap();
        assert_eq!(urban.features[0].get("PARCELID").as_f64(), Some(10.0));
    }
}
