#![allow(clippy::module_name_repetitions)]
//! Canonical file paths for pipeline inputs and outputs.
//!
//! Processed layers live under `data/processed/`, station outputs under
//! `output/` and maps under `output/maps/`, all relative to a project root.

use std::path::{Path, PathBuf};

/// Zoned parcels, one row per parcel ID.
pub const PARCELS_WITH_ZONING: &str = "parcels_with_zoning.parquet";
/// Zoning districts as read.
pub const ZONING: &str = "zoning.parquet";
/// Equity index tracts as read.
pub const EQUITY: &str = "equity.parquet";
/// Affordable rental housing sites as read.
pub const AFFORDABLE: &str = "affordable.parquet";
/// City tracts with ACS estimates and indicators.
pub const TRACTS_WITH_ACS: &str = "san_jose_tracts_with_acs.geoparquet";
/// Zoned parcels with tract indicators.
pub const PARCELS_WITH_TRACT_DATA: &str = "parcels_with_zoning_and_tract_data.parquet";

/// Parcels whose centroid is within the inner station buffer.
pub const STATION_PARCELS: &str = "diridon_parcels_1mile.parquet";
/// Urban-zoned subset of [`STATION_PARCELS`].
pub const STATION_URBAN_PARCELS: &str = "diridon_uv_parcels_1mile.parquet";
/// Mean tract indicators within the outer station buffer.
pub const STATION_ACS_SUMMARY: &str = "diridon_acs_2mile_summary.csv";
/// Station buffer map.
pub const STATION_MAP: &str = "diridon_buffer_map.png";
/// Leaflet map of the tract layer.
pub const INTERACTIVE_MAP: &str = "interactive_map.html";

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`; falls back to the
/// current directory when the manifest is not nested two levels deep.
#[must_use]
pub fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Resolves every pipeline path against one root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    /// Creates paths rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a configured path. Absolute paths are returned unchanged.
    #[must_use]
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Returns the `data/` directory path.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    /// Returns the `data/processed/` directory for pipeline layers.
    #[must_use]
    pub fn processed_dir(&self) -> PathBuf {
        self.data_dir().join("processed")
    }

    /// Returns the `output/` directory for station-area outputs.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.root.join("output")
    }

    /// Returns the `output/maps/` directory.
    #[must_use]
    pub fn maps_dir(&self) -> PathBuf {
        self.output_dir().join("maps")
    }

    /// Path of a file in [`Self::processed_dir`].
    #[must_use]
    pub fn processed(&self, file: &str) -> PathBuf {
        self.processed_dir().join(file)
    }

    /// Path of a file in [`Self::output_dir`].
    #[must_use]
    pub fn output(&self, file: &str) -> PathBuf {
        self.output_dir().join(file)
    }

    /// Path of a file in [`Self::maps_dir`].
    #[must_use]
    pub fn map(&self, file: &str) -> PathBuf {
        self.maps_dir().join(file)
    }
}

impl Default for DataPaths {
    fn default() -> Self {
        Self::new(project_root())
    }
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Ensures the parent directory of a file path exists.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}
