#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Stage orchestration for the Diridon station-area analysis.
//!
//! Three stages share one [`config::PipelineConfig`] and one
//! [`diridon_storage::paths::DataPaths`] root:
//!
//! 1. [`etl`] reads the city layers and Census data, joins parcels to zoning
//!    and tracts, and writes everything to `data/processed/`.
//! 2. [`station`] summarizes parcels and tracts around the station and
//!    draws the buffer map.
//! 3. [`maps`] renders tract choropleths and the interactive page.
//!
//! Each later stage only reads files written by the earlier ones, so any
//! stage can be rerun on its own.

pub mod config;
pub mod etl;
pub mod maps;
pub mod station;

use diridon_geography::GeoError;
use diridon_render::RenderError;
use diridon_spatial::SpatialError;
use diridon_storage::StorageError;
use thiserror::Error;

/// Errors that can occur while running a pipeline stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Config file is not valid TOML for [`config::PipelineConfig`].
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    /// Filesystem error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Reprojection or join failure.
    #[error(transparent)]
    Spatial(#[from] SpatialError),

    /// Census request or response failure.
    #[error(transparent)]
    Geo(#[from] GeoError),

    /// Reading or writing a layer failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Drawing a map failed.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Config parsed but holds unusable values.
    #[error("Invalid config: {message}")]
    InvalidConfig {
        /// What is wrong.
        message: String,
    },
}
