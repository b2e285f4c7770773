//! Station-area opportunity analysis.
//!
//! Reads the processed parcels and tracts back, reprojects them to web
//! mercator and summarizes what lies within the inner (parcel) and outer
//! (tract) buffers around the station.

use std::path::PathBuf;

use diridon_render::station_map::render_station_map;
use diridon_spatial::SpatialError;
use diridon_spatial::buffer::{StationBuffers, build_station_buffers};
use diridon_spatial::crs::to_crs;
use diridon_spatial_models::{Feature, Layer};
use diridon_storage::geoparquet::{read_geoparquet, write_geoparquet};
use diridon_storage::paths::{self, DataPaths};
use diridon_storage::summary::write_summary_csv;
use diridon_zoning::is_urban_code;
use geo::{Centroid, Contains, Intersects, Polygon};

use crate::PipelineError;
use crate::config::{StationConfig, SummaryColumn};

/// Size of the station map in pixels.
pub const STATION_MAP_SIZE: (u32, u32) = (1500, 1500);

/// Parcels near the station.
#[derive(Debug, Clone)]
pub struct ParcelSummary {
    /// Parcels whose centroid lies within the inner buffer.
    pub within: Layer,
    /// Urban-zoned subset of [`Self::within`].
    pub urban: Layer,
}

impl ParcelSummary {
    /// Number of parcels within the inner buffer.
    #[must_use]
    pub fn total_parcels(&self) -> usize {
        self.within.len()
    }

    /// Number of urban-zoned parcels within the inner buffer.
    #[must_use]
    pub fn uv_parcels(&self) -> usize {
        self.urban.len()
    }
}

/// Tracts near the station and their mean indicators.
#[derive(Debug, Clone)]
pub struct AcsSummary {
    /// Tracts intersecting the outer buffer.
    pub tracts: Layer,
    /// `(label, mean)` per summarized column, in configured order.
    pub values: Vec<(String, Option<f64>)>,
}

/// Files written by the station stage, with the headline numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct StationOutputs {
    /// Parcels within the inner buffer.
    pub parcels: PathBuf,
    /// Urban-zoned parcels within the inner buffer.
    pub urban_parcels: PathBuf,
    /// One-row ACS summary CSV.
    pub acs_summary: PathBuf,
    /// Number of parcels within the inner buffer.
    pub total_parcels: usize,
    /// Number of urban-zoned parcels within the inner buffer.
    pub uv_parcels: usize,
    /// Averages written to the summary CSV.
    pub acs_values: Vec<(String, Option<f64>)>,
}

/// Reprojects parcels and tracts to web mercator for buffering.
///
/// # Errors
///
/// Returns [`SpatialError::UnsupportedCrs`] if either layer cannot be
/// reprojected.
pub fn reproject_for_buffering(
    parcels: &Layer,
    tracts: &Layer,
) -> Result<(Layer, Layer), SpatialError> {
    Ok((
        to_crs(parcels, StationBuffers::CRS)?,
        to_crs(tracts, StationBuffers::CRS)?,
    ))
}

fn centroid_within(feature: &Feature, area: &Polygon<f64>) -> bool {
    feature
        .geometry
        .as_ref()
        .and_then(Centroid::centroid)
        .is_some_and(|c| area.contains(&c))
}

/// Selects parcels whose centroid lies within `inner` and the subset whose
/// raw code in `zoning_field` is one of `urban_codes`. Parcel geometry is
/// kept as is.
#[must_use]
pub fn summarize_parcels(
    parcels: &Layer,
    inner: &Polygon<f64>,
    zoning_field: &str,
    urban_codes: &[String],
) -> ParcelSummary {
    if !parcels.is_empty() && !parcels.has_column(zoning_field) {
        log::warn!(
            "Parcel layer '{}' has no '{zoning_field}' column, no parcel counts as urban",
            parcels.name
        );
    }
    let within = parcels
        .filter(|f| centroid_within(f, inner))
        .renamed(format!("{}_within_inner_buffer", parcels.name));
    let urban = within
        .filter(|f| is_urban_code(f.get(zoning_field).as_str(), urban_codes))
        .renamed(format!("{}_urban", parcels.name));

    log::info!(
        "{} parcels within the inner buffer, {} urban-zoned",
        within.len(),
        urban.len()
    );

    ParcelSummary { within, urban }
}

/// Mean of the non-null numeric values of `column`; `None` when there are
/// none.
#[must_use]
pub fn column_mean(layer: &Layer, column: &str) -> Option<f64> {
    let (sum, count) = layer
        .features
        .iter()
        .filter_map(|f| f.get(column).as_f64())
        .fold((0.0, 0u32), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / f64::from(count))
}

/// Selects tracts intersecting `outer` and averages each configured
/// column over them. Columns absent from the tract layer are skipped.
#[must_use]
pub fn summarize_acs(
    tracts: &Layer,
    outer: &Polygon<f64>,
    columns: &[SummaryColumn],
) -> AcsSummary {
    let selected = tracts
        .filter(|f| f.geometry.as_ref().is_some_and(|g| g.intersects(outer)))
        .renamed(format!("{}_within_outer_buffer", tracts.name));

    let values = columns
        .iter()
        .filter(|c| {
            let present = tracts.has_column(&c.column);
            if !present {
                log::warn!("Tract layer has no column '{}'; skipping '{}'", c.column, c.label);
            }
            present
        })
        .map(|c| (c.label.clone(), column_mean(&selected, &c.column)))
        .collect();

    log::info!("{} tracts intersect the outer buffer", selected.len());

    AcsSummary {
        tracts: selected,
        values,
    }
}

/// Writes the station parquet files and the ACS summary CSV.
///
/// # Errors
///
/// Returns [`PipelineError::Storage`] if any file cannot be written.
pub fn export_station_outputs(
    parcels: &ParcelSummary,
    acs: &AcsSummary,
    paths: &DataPaths,
) -> Result<StationOutputs, PipelineError> {
    let outputs = StationOutputs {
        parcels: paths.output(paths::STATION_PARCELS),
        urban_parcels: paths.output(paths::STATION_URBAN_PARCELS),
        acs_summary: paths.output(paths::STATION_ACS_SUMMARY),
        total_parcels: parcels.total_parcels(),
        uv_parcels: parcels.uv_parcels(),
        acs_values: acs.values.clone(),
    };

    write_geoparquet(&parcels.within, &outputs.parcels)?;
    write_geoparquet(&parcels.urban, &outputs.urban_parcels)?;
    write_summary_csv(&outputs.acs_summary, &acs.values)?;

    Ok(outputs)
}

/// Runs the station stage on the processed ETL outputs.
///
/// # Errors
///
/// Returns [`PipelineError`] if the inputs cannot be read, reprojection
/// fails or an output cannot be written.
pub fn run_station(
    config: &StationConfig,
    paths: &DataPaths,
) -> Result<StationOutputs, PipelineError> {
    log::info!("Starting station-area analysis for {}", config.name);

    let parcels = read_geoparquet(&paths.processed(paths::PARCELS_WITH_ZONING))?;
    let tracts = read_geoparquet(&paths.processed(paths::TRACTS_WITH_ACS))?;
    let (parcels, tracts) = reproject_for_buffering(&parcels, &tracts)?;

    let buffers = build_station_buffers(
        config.lon,
        config.lat,
        config.inner_miles,
        config.outer_miles,
    )?;

    let parcel_summary = summarize_parcels(
        &parcels,
        &buffers.inner,
        &config.zoning_field,
        &config.urban_codes,
    );
    let acs_summary = summarize_acs(&tracts, &buffers.outer, &config.acs_summary);

    let outputs = export_station_outputs(&parcel_summary, &acs_summary, paths)?;

    let urban_near = parcels.filter(|f| {
        is_urban_code(f.get(&config.zoning_field).as_str(), &config.urban_codes)
    });
    render_station_map(
        &parcels,
        &urban_near,
        &buffers,
        STATION_MAP_SIZE,
        &paths.map(paths::STATION_MAP),
    )?;

    log::info!(
        "Station analysis finished: total_parcels={}, uv_parcels={}",
        parcel_summary.total_parcels(),
        parcel_summary.uv_parcels()
    );
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use diridon_spatial_models::{AttributeValue, Crs};
    use crate::etl::ZONING_CODE_COLUMN;
    use diridon_zoning::default_urban_codes;
    use geo::{Rect, coord};

    fn buffers() -> StationBuffers {
        build_station_buffers(-121.9036, 37.3292, 1.0, 2.0).unwrap()
    }

    fn square(cx: f64, cy: f64, half: f64) -> Polygon<f64> {
        Rect::new(
            coord! { x: cx - half, y: cy - half },
            coord! { x: cx + half, y: cy + half },
        )
        .to_polygon()
    }

    fn parcels(b: &StationBuffers) -> Layer {
        let (x, y) = (b.center.x(), b.center.y());
        Layer::with_features(
            "parcels_with_zoning",
            Crs::WEB_MERCATOR,
            vec![
                Feature::new(square(x, y, 20.0)).with(ZONING_CODE_COLUMN, "UV"),
                Feature::new(square(x + 500.0, y, 20.0)).with(ZONING_CODE_COLUMN, "R-1-8"),
                Feature::new(square(x, y + 800.0, 20.0)).with(ZONING_CODE_COLUMN, "MUC"),
                // Centroid just outside the inner buffer, edge inside.
                Feature::new(square(x + b.inner_radius_m + 10.0, y, 20.0))
                    .with(ZONING_CODE_COLUMN, "UV"),
                Feature::new(square(x + 5_000.0, y, 20.0)).with(ZONING_CODE_COLUMN, "TR"),
            ],
        )
    }

    #[test]
    fn counts_parcels_by_centroid() {
        let b = buffers();
        let summary =
            summarize_parcels(&parcels(&b), &b.inner, ZONING_CODE_COLUMN, &default_urban_codes());
        assert_eq!(summary.total_parcels(), 3);
        assert_eq!(summary.uv_parcels(), 2);
        assert!(
            summary
                .urban
                .features
                .iter()
                .all(|f| f.get(ZONING_CODE_COLUMN).as_str() != Some("R-1-8"))
        );
    }

    #[test]
    fn missing_zoning_field_counts_no_urban_parcels() {
        let b = buffers();
        let summary = summarize_parcels(&parcels(&b), &b.inner, "ZONING", &default_urban_codes());
        assert_eq!(summary.total_parcels(), 3);
        assert_eq!(summary.uv_parcels(), 0);
    }

    #[test]
    fn averages_tract_columns_ignoring_nulls() {
        let b = buffers();
        let (x, y) = (b.center.x(), b.center.y());
        let tracts = Layer::with_features(
            "tracts",
            Crs::WEB_MERCATOR,
            vec![
                Feature::new(square(x, y, 1_000.0))
                    .with("pct_renters", 40.0)
                    .with("gini", AttributeValue::Null),
                // Straddles the outer buffer edge.
                Feature::new(square(x + b.outer_radius_m, y, 1_000.0))
                    .with("pct_renters", 60.0)
                    .with("gini", AttributeValue::Null),
                Feature::new(square(x + 20_000.0, y, 1_000.0))
                    .with("pct_renters", 1_000.0)
                    .with("gini", 0.4),
            ],
        );
        let columns = vec![
            SummaryColumn {
                label: "Percent Renters".to_string(),
                column: "pct_renters".to_string(),
            },
            SummaryColumn {
                label: "Gini Index".to_string(),
                column: "gini".to_string(),
            },
            SummaryColumn {
                label: "Missing".to_string(),
                column: "not_a_column".to_string(),
            },
        ];

        let summary = summarize_acs(&tracts, &b.outer, &columns);
        assert_eq!(summary.tracts.len(), 2);
        assert_eq!(
            summary.values,
            vec![
                ("Percent Renters".to_string(), Some(50.0)),
                ("Gini Index".to_string(), None),
            ]
        );
    }

    #[test]
    fn mean_of_empty_is_none() {
        let layer = Layer::new("empty", Crs::WGS84);
        assert_eq!(column_mean(&layer, "x"), None);
    }

    #[test]
    fn exports_station_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let b = buffers();
        let parcels =
            summarize_parcels(&parcels(&b), &b.inner, ZONING_CODE_COLUMN, &default_urban_codes());
        let acs = AcsSummary {
            tracts: Layer::new("tracts", Crs::WEB_MERCATOR),
            values: vec![("Percent Renters".to_string(), Some(50.0))],
        };

        let outputs = export_station_outputs(&parcels, &acs, &paths).unwrap();
        assert!(outputs.parcels.ends_with("output/diridon_parcels_1mile.parquet"));
        assert_eq!(read_geoparquet(&outputs.urban_parcels).unwrap().len(), 2);
        assert_eq!(
            std::fs::read_to_string(&outputs.acs_summary).unwrap(),
            "Percent Renters\n50\n"
        );
    }

    #[test]
    fn runs_on_processed_layers() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let b = buffers();

        // Processed layers are stored in WGS84 and the state plane.
        let parcels = to_crs(&parcels(&b), Crs::CA_ZONE_3_FT).unwrap();
        write_geoparquet(&parcels, &paths.processed(paths::PARCELS_WITH_ZONING)).unwrap();
        let tracts = Layer::with_features(
            "tracts",
            Crs::WEB_MERCATOR,
            vec![
                Feature::new(square(b.center.x(), b.center.y(), 3_000.0))
                    .with("median_rent", 2_400.0),
            ],
        );
        let tracts = to_crs(&tracts, Crs::WGS84).unwrap();
        write_geoparquet(&tracts, &paths.processed(paths::TRACTS_WITH_ACS)).unwrap();

        let config = crate::config::PipelineConfig::load(None).unwrap().station;
        let outputs = run_station(&config, &paths).unwrap();

        assert_eq!(outputs.total_parcels, 3);
        assert_eq!(outputs.uv_parcels, 2);
        assert_eq!(read_geoparquet(&outputs.parcels).unwrap().len(), 3);
        let summary = diridon_storage::summary::read_summary_csv(&outputs.acs_summary).unwrap();
        let rent = summary
            .iter()
            .find(|(label, _)| label == "Median Gross Rent")
            .and_then(|(_, v)| *v)
            .unwrap();
        assert!((rent - 2_400.0).abs() < 1e-9);
        assert!(paths.map(paths::STATION_MAP).is_file());
    }
}
