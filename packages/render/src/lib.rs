#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Static and interactive maps.
//!
//! Tract choropleths are classified with Jenks natural breaks and drawn
//! with `ColorBrewer` palettes, either as PNG rasters or as a standalone
//! Leaflet page. The station map shows parcels around a station with its
//! buffer outline.

pub mod canvas;
pub mod choropleth;
pub mod classify;
pub mod interactive;
pub mod palette;
pub mod station_map;

use diridon_spatial::SpatialError;
use diridon_spatial::crs::Transformer;
use diridon_spatial_models::Crs;
use geo::{MapCoords, Point, Polygon};
use thiserror::Error;

/// Errors that can occur while rendering maps.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Image encoding error.
    #[error(transparent)]
    Image(#[from] image::ImageError),

    /// Filesystem error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Reprojection error.
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    /// JSON serialization error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The mapped column does not exist.
    #[error("Layer '{layer}' has no column '{column}'")]
    MissingColumn {
        /// Layer name.
        layer: String,
        /// Requested column.
        column: String,
    },

    /// Nothing drawable in the layer.
    #[error("Layer '{layer}' has no polygon geometry to draw")]
    EmptyLayer {
        /// Layer name.
        layer: String,
    },
}

/// Station marker and buffer outlines drawn on top of a map.
#[derive(Debug, Clone, PartialEq)]
pub struct StationOverlay {
    /// CRS of `station` and `buffers`.
    pub crs: Crs,
    /// Station location.
    pub station: Point<f64>,
    /// Buffer polygons, outlined dashed.
    pub buffers: Vec<Polygon<f64>>,
}

impl StationOverlay {
    /// Returns the overlay reprojected to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::UnsupportedCrs`] if either CRS is unsupported.
    pub fn to_crs(&self, target: Crs) -> Result<Self, SpatialError> {
        let transformer = Transformer::new(self.crs, target)?;
        Ok(Self {
            crs: target,
            station: transformer.transform(self.station.0).into(),
            buffers: self
                .buffers
                .iter()
                .map(|b| b.map_coords(|c| transformer.transform(c)))
                .collect(),
        })
    }
}
