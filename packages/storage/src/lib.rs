#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Reading and writing pipeline layers.
//!
//! Inputs arrive as ESRI shapefiles and GeoJSON; processed layers are
//! written as `GeoParquet` with WKB geometry, and station summaries as
//! one-row CSV files. [`paths`] fixes where each artifact lives.

pub mod geojson_io;
pub mod geoparquet;
pub mod paths;
pub mod shp;
pub mod summary;
pub mod wkb;

use std::path::{Path, PathBuf};

use diridon_spatial_models::{Crs, Layer};
use thiserror::Error;

/// Errors that can occur while reading or writing layers.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Shapefile or dBase error.
    #[error(transparent)]
    Shapefile(#[from] shapefile::Error),

    /// Malformed GeoJSON.
    #[error(transparent)]
    GeoJson(#[from] geojson::Error),

    /// Parquet encoding or decoding error.
    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Arrow array or schema error.
    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    /// CSV error.
    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// JSON metadata error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Malformed WKB geometry.
    #[error("Invalid WKB: {message}")]
    Wkb {
        /// What was wrong with the bytes.
        message: String,
    },

    /// The CRS of a file could not be determined.
    #[error("Cannot determine the CRS of {path}; set an explicit CRS for this input")]
    UnknownCrs {
        /// File whose CRS is unknown.
        path: PathBuf,
    },

    /// The file extension is not a supported vector format.
    #[error("Unsupported vector format: {path}")]
    UnsupportedFormat {
        /// Offending file.
        path: PathBuf,
    },

    /// The file contents do not match the expected layout.
    #[error("{message}")]
    Schema {
        /// Description of the mismatch.
        message: String,
    },
}

/// Reads a vector layer, choosing the reader from the file extension.
///
/// `crs_override` applies to shapefiles and GeoJSON; `GeoParquet` files
/// always use the CRS in their metadata.
///
/// # Errors
///
/// Returns [`StorageError::UnsupportedFormat`] for unknown extensions, or
/// whatever error the chosen reader produces.
pub fn read_layer(path: &Path, crs_override: Option<Crs>) -> Result<Layer, StorageError> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    log::debug!("Reading {} as '{extension}'", path.display());

    match extension.as_str() {
        "shp" => shp::read_shapefile(path, crs_override),
        "geojson" | "json" => {
            let mut layer = geojson_io::read_geojson(path)?;
            if let Some(crs) = crs_override {
                layer.crs = crs;
            }
            Ok(layer)
        }
        "parquet" | "geoparquet" => {
            if crs_override.is_some() {
                log::warn!(
                    "Ignoring CRS override for {}; GeoParquet declares its own",
                    path.display()
                );
            }
            geoparquet::read_geoparquet(path)
        }
        _ => Err(StorageError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_extension_is_unsupported() {
        let err = read_layer(Path::new("data/raw/parcels.kml"), None).unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedFormat { .. }));
    }

    #[test]
    fn geojson_override_replaces_crs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sites.geojson");
        std::fs::write(
            &path,
            r#"{"type":"FeatureCollection","features":[{"type":"Feature","geometry":{"type":"Point","coordinates":[6152000.0,1940000.0]},"properties":{"NAME":"Site A"}}]}"#,
        )
        .unwrap();

        let layer = read_layer(&path, Some(Crs::CA_ZONE_3_FT)).unwrap();
        assert_eq!(layer.crs, Crs::CA_ZONE_3_FT);
        assert_eq!(layer.len(), 1);
        assert_eq!(layer.features[0].get("NAME").as_str(), Some("Site A"));
    }
}
