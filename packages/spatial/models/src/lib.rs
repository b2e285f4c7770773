#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Layer, feature, and coordinate reference system types.
//!
//! A [`Layer`] is the in-memory equivalent of one vector dataset (a
//! shapefile, a `GeoParquet` file, a set of Census boundaries): a list of
//! [`Feature`]s that share one [`Crs`]. Every pipeline stage reads and
//! produces layers so that joins, classification, and export can be
//! chained without intermediate formats.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use geo::{Geometry, MultiPolygon};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A coordinate reference system identified by its EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Crs(u32);

impl Crs {
    /// WGS 84 geographic coordinates (longitude, latitude).
    pub const WGS84: Self = Self(4326);
    /// NAD83 geographic coordinates, used by Census cartographic files.
    pub const NAD83: Self = Self(4269);
    /// Spherical Web Mercator, in metres.
    pub const WEB_MERCATOR: Self = Self(3857);
    /// NAD83 / California zone 3, in US survey feet (San Jose open data).
    pub const CA_ZONE_3_FT: Self = Self(2227);
    /// NAD83 / California zone 3, in metres.
    pub const CA_ZONE_3_M: Self = Self(26943);

    /// Creates a CRS from a raw EPSG code.
    #[must_use]
    pub const fn from_epsg(code: u32) -> Self {
        Self(code)
    }

    /// Returns the EPSG code.
    #[must_use]
    pub const fn epsg(self) -> u32 {
        self.0
    }

    /// Whether coordinates are longitude/latitude degrees.
    #[must_use]
    pub const fn is_geographic(self) -> bool {
        matches!(self.0, 4326 | 4269)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// Error returned when a CRS string is not of the form `EPSG:<code>`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid CRS identifier: {0}")]
pub struct ParseCrsError(pub String);

impl FromStr for Crs {
    type Err = ParseCrsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let code = trimmed
            .get(..5)
            .filter(|prefix| prefix.eq_ignore_ascii_case("epsg:"))
            .map_or(trimmed, |_| &trimmed[5..]);

        code.parse::<u32>()
            .map(Self)
            .map_err(|_| ParseCrsError(s.to_string()))
    }
}

impl TryFrom<String> for Crs {
    type Error = ParseCrsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Crs> for String {
    fn from(value: Crs) -> Self {
        value.to_string()
    }
}

/// A single attribute value in a feature's property table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Missing value.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Whole number.
    Integer(i64),
    /// Floating-point number. Never NaN; undefined values are [`Self::Null`].
    Number(f64),
    /// Free text.
    Text(String),
}

impl AttributeValue {
    /// Builds a numeric value, mapping `None` and non-finite numbers to
    /// [`Self::Null`].
    #[must_use]
    pub fn from_f64(value: Option<f64>) -> Self {
        match value {
            Some(v) if v.is_finite() => Self::Number(v),
            _ => Self::Null,
        }
    }

    /// Returns `true` for [`Self::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the value as text. Numbers are rendered without a trailing
    /// `.0` when they are whole, matching how parcel IDs are usually stored.
    #[must_use]
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Integer(i) => Some(i.to_string()),
            #[allow(clippy::cast_possible_truncation)]
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some((*n as i64).to_string()),
            Self::Number(n) => Some(n.to_string()),
            Self::Text(s) => Some(s.clone()),
        }
    }

    /// Borrows the value as a string slice when it is [`Self::Text`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a float when it is numeric.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the value as a boolean when it is [`Self::Bool`].
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::from_f64(Some(value))
    }
}

impl<T: Into<Self>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Ordered property table of a feature, keyed by column name.
pub type Properties = BTreeMap<String, AttributeValue>;

/// One row of a vector dataset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Feature {
    /// Feature geometry, `None` for rows stored without a shape.
    pub geometry: Option<Geometry<f64>>,
    /// Attribute columns.
    pub properties: Properties,
}

impl Feature {
    /// Creates a feature from a geometry and an empty property table.
    #[must_use]
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            geometry: Some(geometry.into()),
            properties: Properties::new(),
        }
    }

    /// Builder-style property setter.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<AttributeValue>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// Looks up a property, treating a missing key as [`AttributeValue::Null`].
    #[must_use]
    pub fn get(&self, key: &str) -> &AttributeValue {
        self.properties.get(key).unwrap_or(&AttributeValue::Null)
    }

    /// Sets a property.
    pub fn set(&mut self, key: &str, value: impl Into<AttributeValue>) {
        self.properties.insert(key.to_string(), value.into());
    }

    /// Returns the geometry as a [`MultiPolygon`] when it is areal.
    #[must_use]
    pub fn area_geometry(&self) -> Option<MultiPolygon<f64>> {
        match self.geometry.as_ref()? {
            Geometry::Polygon(p) => Some(MultiPolygon(vec![p.clone()])),
            Geometry::MultiPolygon(mp) => Some(mp.clone()),
            Geometry::Rect(r) => Some(MultiPolygon(vec![r.to_polygon()])),
            _ => None,
        }
    }
}

/// A named collection of features in one coordinate reference system.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    /// Dataset name, used in log messages and output file names.
    pub name: String,
    /// CRS shared by every feature geometry.
    pub crs: Crs,
    /// Rows of the dataset.
    pub features: Vec<Feature>,
}

impl Layer {
    /// Creates an empty layer.
    #[must_use]
    pub fn new(name: impl Into<String>, crs: Crs) -> Self {
        Self {
            name: name.into(),
            crs,
            features: Vec::new(),
        }
    }

    /// Creates a layer from existing features.
    #[must_use]
    pub fn with_features(name: impl Into<String>, crs: Crs, features: Vec<Feature>) -> Self {
        Self {
            name: name.into(),
            crs,
            features,
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether the layer has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Union of property names across all features, sorted.
    #[must_use]
    pub fn columns(&self) -> Vec<String> {
        let mut names = std::collections::BTreeSet::new();
        for feature in &self.features {
            names.extend(feature.properties.keys().cloned());
        }
        names.into_iter().collect()
    }

    /// Whether any feature carries the given property.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.features
            .iter()
            .any(|f| f.properties.contains_key(name))
    }

    /// Keeps only features matching `predicate`.
    #[must_use]
    pub fn filter(&self, predicate: impl Fn(&Feature) -> bool) -> Self {
        Self {
            name: self.name.clone(),
            crs: self.crs,
            features: self
                .features
                .iter()
                .filter(|f| predicate(f))
                .cloned()
                .collect(),
        }
    }

    /// Returns a copy with a different name.
    #[must_use]
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}
