//! Tract choropleths and the interactive map.

use std::path::PathBuf;

use diridon_render::StationOverlay;
use diridon_render::choropleth::{ChoroplethOptions, render_choropleth};
use diridon_render::interactive::{InteractiveOptions, render_interactive_map};
use diridon_spatial::SpatialError;
use diridon_spatial::buffer::{StationBuffers, build_station_buffers};
use diridon_spatial_models::Layer;
use diridon_storage::geoparquet::read_geoparquet;
use diridon_storage::paths::{self, DataPaths};

use crate::PipelineError;
use crate::config::{MapsConfig, StationConfig};

/// Station marker with both buffer outlines.
///
/// # Errors
///
/// Returns [`SpatialError`] if the station cannot be projected.
pub fn station_overlay(station: &StationConfig) -> Result<StationOverlay, SpatialError> {
    let buffers = build_station_buffers(
        station.lon,
        station.lat,
        station.inner_miles,
        station.outer_miles,
    )?;
    Ok(StationOverlay {
        crs: StationBuffers::CRS,
        station: buffers.center,
        buffers: vec![buffers.inner, buffers.outer],
    })
}

/// File name of the choropleth for `column`.
#[must_use]
pub fn choropleth_file(column: &str) -> String {
    format!("{column}_choropleth.png")
}

/// Renders a PNG choropleth per configured column and the interactive map.
/// Columns missing from the tract layer are skipped with a warning.
///
/// # Errors
///
/// Returns [`PipelineError`] if a map cannot be rendered or written.
pub fn render_tract_maps(
    tracts: &Layer,
    maps: &MapsConfig,
    station: &StationConfig,
    paths: &DataPaths,
) -> Result<Vec<PathBuf>, PipelineError> {
    let overlay = station_overlay(station)?;
    let mut written = Vec::new();

    // PNG maps only outline the tract buffer.
    let outer_only = StationOverlay {
        buffers: overlay.buffers.last().cloned().into_iter().collect(),
        ..overlay.clone()
    };
    let options = ChoroplethOptions {
        width: maps.width,
        height: maps.height,
        classes: maps.classes,
        palette: maps.palette,
        overlay: Some(outer_only),
    };
    for column in &maps.columns {
        if !tracts.has_column(column) {
            log::warn!("Skipping map of '{column}': not a tract column");
            continue;
        }
        let path = paths.map(&choropleth_file(column));
        render_choropleth(tracts, column, &options, &path)?;
        written.push(path);
    }

    if tracts.has_column(&maps.interactive_column) {
        let path = paths.map(paths::INTERACTIVE_MAP);
        let options = InteractiveOptions {
            title: format!("{} near {}", maps.interactive_column, station.name),
            classes: maps.classes,
            palette: maps.palette,
            overlay: Some(overlay),
            station_name: station.name.clone(),
        };
        render_interactive_map(tracts, &maps.interactive_column, &options, &path)?;
        written.push(path);
    } else {
        log::warn!(
            "Skipping interactive map: '{}' is not a tract column",
            maps.interactive_column
        );
    }

    Ok(written)
}

/// Runs the map stage on the processed tract layer.
///
/// # Errors
///
/// Returns [`PipelineError`] if the tract layer cannot be read or a map
/// cannot be written.
pub fn run_maps(
    maps: &MapsConfig,
    station: &StationConfig,
    paths: &DataPaths,
) -> Result<Vec<PathBuf>, PipelineError> {
    log::info!("Rendering tract maps");
    let tracts = read_geoparquet(&paths.processed(paths::TRACTS_WITH_ACS))?;
    let written = render_tract_maps(&tracts, maps, station, paths)?;
    log::info!("Wrote {} maps to {}", written.len(), paths.maps_dir().display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use diridon_spatial_models::{Crs, Feature};
    use geo::{Rect, coord};

    fn tracts() -> Layer {
        let square = |x: f64, y: f64| {
            Rect::new(coord! { x: x, y: y }, coord! { x: x + 0.02, y: y + 0.02 }).to_polygon()
        };
        Layer::with_features(
            "san_jose_tracts_with_acs",
            Crs::WGS84,
            vec![
                Feature::new(square(-121.92, 37.32))
                    .with("GEOID", "06085500100")
                    .with("pct_renters", 35.0),
                Feature::new(square(-121.90, 37.32))
                    .with("GEOID", "06085500200")
                    .with("pct_renters", 70.0),
            ],
        )
    }

    #[test]
    fn overlay_has_both_buffers() {
        let config = PipelineConfig::load(None).unwrap();
        let overlay = station_overlay(&config.station).unwrap();
        assert_eq!(overlay.crs, Crs::WEB_MERCATOR);
        assert_eq!(overlay.buffers.len(), 2);
    }

    #[test]
    fn renders_configured_columns() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        let config = PipelineConfig::load(None).unwrap();
        let maps = MapsConfig {
            columns: vec!["pct_renters".to_string(), "median_rent".to_string()],
            width: 200,
            height: 200,
            ..config.maps.clone()
        };

        let written = render_tract_maps(&tracts(), &maps, &config.station, &paths).unwrap();
        assert_eq!(
            written,
            vec![
                paths.map("pct_renters_choropleth.png"),
                paths.map(paths::INTERACTIVE_MAP),
            ]
        );
        assert!(written.iter().all(|p| p.is_file()));
    }
}
