#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial operations for the parcel pipeline.
//!
//! Provides CRS reprojection between the handful of reference systems the
//! San Jose and Census datasets use, the largest-overlap join that assigns
//! each parcel exactly one zoning district, tract attribution by
//! containment, and circular station buffers. Polygon layers are indexed in
//! R-trees so candidate lookups stay proportional to local density rather
//! than layer size.

pub mod buffer;
pub mod crs;
pub mod index;
pub mod join;
pub mod progress;
pub mod tracts;

use diridon_spatial_models::Crs;
use thiserror::Error;

/// Errors that can occur during spatial operations.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// No projection formulas are available for this CRS.
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(Crs),

    /// A layer required to be areal contains another geometry type.
    #[error("Feature {index} of layer '{layer}' is not a polygon")]
    NotAreal {
        /// Layer name.
        layer: String,
        /// Row index of the offending feature.
        index: usize,
    },

    /// A required attribute column is missing from a layer.
    #[error("Layer '{layer}' has no column '{column}'")]
    MissingColumn {
        /// Layer name.
        layer: String,
        /// Missing column name.
        column: String,
    },
}
