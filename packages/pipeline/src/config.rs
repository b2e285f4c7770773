//! Pipeline configuration.
//!
//! The default configuration is embedded at compile time from
//! `pipeline.toml`; a file given on the command line replaces it entirely.
//! Input paths are relative to the project root.

use std::path::{Path, PathBuf};

use diridon_render::palette::Palette;
use diridon_spatial::join::{JoinOptions, JoinStrategy};
use diridon_spatial::tracts::{Containment, default_tract_fields};
use diridon_spatial_models::Crs;
use diridon_zoning::default_urban_codes;
use serde::Deserialize;

use crate::PipelineError;
use crate::etl::ZONING_CODE_COLUMN;

const DEFAULT_CONFIG: &str = include_str!("pipeline.toml");

// ── Top-level config ─────────────────────────────────────────────────────

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Raw input layers.
    pub paths: InputPaths,
    /// Census pull settings.
    pub census: CensusConfig,
    /// Parcel/zoning join settings.
    #[serde(default)]
    pub join: JoinConfig,
    /// Tract attachment settings.
    #[serde(default)]
    pub tracts: TractsConfig,
    /// Station-area analysis settings.
    pub station: StationConfig,
    /// Map stage settings.
    #[serde(default)]
    pub maps: MapsConfig,
}

// ── Sections ─────────────────────────────────────────────────────────────

/// Raw input layers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputPaths {
    /// Parcel polygons.
    pub parcels: PathBuf,
    /// Zoning district polygons.
    pub zoning: PathBuf,
    /// Affordable rental housing sites, copied through to GeoParquet.
    #[serde(default)]
    pub affordable: Option<PathBuf>,
    /// Equity index tracts, copied through to GeoParquet.
    #[serde(default)]
    pub equity: Option<PathBuf>,
    /// CRS to assume for inputs without a usable `.prj`.
    #[serde(default)]
    pub crs_override: Option<Crs>,
}

/// Census pull settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CensusConfig {
    /// State abbreviation, FIPS code or name.
    pub state: String,
    /// ACS 5-year release year.
    pub year: u16,
    /// Incorporated place whose tracts are kept.
    pub city: String,
    /// TIGERweb map service vintage, e.g. `ACS2022`.
    pub boundary_vintage: String,
}

/// Parcel/zoning join settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct JoinConfig {
    /// How a parcel picks among intersecting districts.
    pub strategy: JoinStrategy,
    /// Parcel identifier column used for deduplication.
    pub parcel_id_field: String,
    /// Zoning layer column holding the district code.
    pub zoning_code_field: String,
}

impl Default for JoinConfig {
    fn default() -> Self {
        let options = JoinOptions::default();
        Self {
            strategy: options.strategy,
            parcel_id_field: options.parcel_id_field,
            zoning_code_field: "ZONING".to_string(),
        }
    }
}

impl JoinConfig {
    /// Options for the spatial join.
    #[must_use]
    pub fn options(&self) -> JoinOptions {
        JoinOptions {
            strategy: self.strategy,
            parcel_id_field: self.parcel_id_field.clone(),
        }
    }
}

/// Tract attachment settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TractsConfig {
    /// Containment test.
    pub containment: Containment,
    /// Tract columns copied onto parcels (besides `GEOID`).
    pub fields: Vec<String>,
}

impl Default for TractsConfig {
    fn default() -> Self {
        Self {
            containment: Containment::default(),
            fields: default_tract_fields(),
        }
    }
}

/// One labelled column of the station ACS summary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SummaryColumn {
    /// Header written to the summary CSV.
    pub label: String,
    /// Tract column averaged.
    pub column: String,
}

/// Station-area analysis settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StationConfig {
    /// Station name for map labels.
    pub name: String,
    /// Station longitude (WGS84).
    pub lon: f64,
    /// Station latitude (WGS84).
    pub lat: f64,
    /// Radius of the parcel buffer, in miles.
    #[serde(default = "default_inner_miles")]
    pub inner_miles: f64,
    /// Radius of the tract buffer, in miles.
    #[serde(default = "default_outer_miles")]
    pub outer_miles: f64,
    /// Parcel column holding the joined district's raw zoning code.
    #[serde(default = "default_zoning_field")]
    pub zoning_field: String,
    /// Codes counted as urban zoning.
    #[serde(default = "default_urban_codes")]
    pub urban_codes: Vec<String>,
    /// Tract indicators averaged over the outer buffer, in output order.
    #[serde(default)]
    pub acs_summary: Vec<SummaryColumn>,
}

const fn default_inner_miles() -> f64 {
    1.0
}

const fn default_outer_miles() -> f64 {
    2.0
}

fn default_zoning_field() -> String {
    ZONING_CODE_COLUMN.to_string()
}

/// Map stage settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MapsConfig {
    /// Tract columns rendered as PNG choropleths.
    pub columns: Vec<String>,
    /// Column shown on the interactive map.
    pub interactive_column: String,
    /// Number of natural-breaks classes.
    pub classes: usize,
    /// Fill palette.
    pub palette: Palette,
    /// PNG width in pixels.
    pub width: u32,
    /// PNG height in pixels.
    pub height: u32,
}

impl Default for MapsConfig {
    fn default() -> Self {
        Self {
            columns: vec!["pct_renters".to_string()],
            interactive_column: "pct_renters".to_string(),
            classes: 5,
            palette: Palette::Blues,
            width: 1500,
            height: 1500,
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────────────

impl PipelineConfig {
    /// Parses a TOML document and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Toml`] for malformed TOML or
    /// [`PipelineError::InvalidConfig`] for values out of range.
    pub fn parse(text: &str) -> Result<Self, PipelineError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`, or the embedded default when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the file cannot be read or is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, PipelineError> {
        match path {
            Some(path) => {
                log::info!("Loading config from {}", path.display());
                Self::parse(&std::fs::read_to_string(path)?)
            }
            None => {
                log::debug!("Using embedded default config");
                Self::parse(DEFAULT_CONFIG)
            }
        }
    }

    fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |message: String| Err(PipelineError::InvalidConfig { message });

        if !(-180.0..=180.0).contains(&self.station.lon)
            || !(-90.0..=90.0).contains(&self.station.lat)
        {
            return invalid(format!(
                "station location ({}, {}) is not a longitude/latitude pair",
                self.station.lon, self.station.lat
            ));
        }
        if !(self.station.inner_miles > 0.0 && self.station.outer_miles > 0.0) {
            return invalid("station buffer radii must be positive".to_string());
        }
        if self.maps.classes == 0 {
            return invalid("maps.classes must be at least 1".to_string());
        }
        if self.maps.width == 0 || self.maps.height == 0 {
            return invalid("map size must be non-zero".to_string());
        }
        Ok(())
    }
}
