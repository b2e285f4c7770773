#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Census data acquisition.
//!
//! Pulls American Community Survey 5-year estimates from the Census API,
//! derives percentage indicators, downloads tract and place boundaries
//! from the `TIGERweb` REST API, and assembles the city tract layer with
//! its ACS columns.

pub mod acs;
pub mod boundaries;
pub mod city;
pub mod client;
pub mod indicators;

use diridon_geography_models::fips::UnknownStateError;
use thiserror::Error;

/// Errors that can occur during geography operations.
#[derive(Debug, Error)]
pub enum GeoError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A request failed permanently or exhausted its retries.
    #[error("{label}: {message}")]
    Request {
        /// What was being fetched.
        label: String,
        /// Last failure observed.
        message: String,
    },

    /// The state argument names no US state.
    #[error(transparent)]
    UnknownState(#[from] UnknownStateError),

    /// Data conversion error.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
