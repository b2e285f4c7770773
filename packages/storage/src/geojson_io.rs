//! `GeoJSON` layer reading and serialization.
//!
//! `GeoJSON` is always EPSG:4326 (RFC 7946), so reading never needs a CRS
//! hint and writing reprojects nothing: callers hand in WGS84 layers.

use std::path::Path;

use diridon_spatial_models::{AttributeValue, Crs, Feature, Layer, Properties};
use geojson::{FeatureCollection, GeoJson, JsonObject};

use crate::StorageError;

/// Converts a JSON value into an attribute.
#[must_use]
pub fn attribute_from_json(value: &serde_json::Value) -> AttributeValue {
    match value {
        serde_json::Value::Null => AttributeValue::Null,
        serde_json::Value::Bool(b) => AttributeValue::Bool(*b),
        serde_json::Value::Number(n) => n.as_i64().map_or_else(
            || AttributeValue::from_f64(n.as_f64()),
            AttributeValue::Integer,
        ),
        serde_json::Value::String(s) => AttributeValue::Text(s.clone()),
        other => AttributeValue::Text(other.to_string()),
    }
}

/// Converts an attribute into a JSON value. Non-finite numbers become null.
#[must_use]
pub fn attribute_to_json(value: &AttributeValue) -> serde_json::Value {
    match value {
        AttributeValue::Null => serde_json::Value::Null,
        AttributeValue::Bool(b) => serde_json::Value::Bool(*b),
        AttributeValue::Integer(i) => serde_json::Value::from(*i),
        AttributeValue::Number(n) => serde_json::Number::from_f64(*n)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        AttributeValue::Text(s) => serde_json::Value::String(s.clone()),
    }
}

/// Parses a `GeoJSON` document (`FeatureCollection`, single `Feature` or
/// bare geometry) into a layer named `name`.
///
/// # Errors
///
/// Returns [`StorageError::GeoJson`] if the document is invalid.
pub fn parse_geojson(text: &str, name: &str) -> Result<Layer, StorageError> {
    let geojson: GeoJson = text.parse()?;

    let features: Vec<geojson::Feature> = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(g) => vec![geojson::Feature {
            bbox: None,
            geometry: Some(g),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    };

    let mut skipped = 0usize;
    let features = features
        .into_iter()
        .map(|f| {
            let geometry = f.geometry.and_then(|g| {
                let converted: Result<geo::Geometry<f64>, _> = g.try_into();
                if converted.is_err() {
                    skipped += 1;
                }
                converted.ok()
            });
            let properties: Properties = f
                .properties
                .unwrap_or_default()
                .into_iter()
                .map(|(k, v)| (k, attribute_from_json(&v)))
                .collect();
            Feature {
                geometry,
                properties,
            }
        })
        .collect::<Vec<_>>();

    if skipped > 0 {
        log::warn!("{name}: {skipped} geometries could not be converted and were left empty");
    }

    Ok(Layer::with_features(name, Crs::WGS84, features))
}

/// Reads a `GeoJSON` file.
///
/// # Errors
///
/// Returns [`StorageError`] if the file cannot be read or parsed.
pub fn read_geojson(path: &Path) -> Result<Layer, StorageError> {
    let text = std::fs::read_to_string(path)?;
    let name = path
        .file_stem()
        .map_or_else(|| "layer".to_string(), |s| s.to_string_lossy().into_owned());
    let layer = parse_geojson(&text, &name)?;
    log::info!("Read {} features from {}", layer.len(), path.display());
    Ok(layer)
}

/// Builds a `FeatureCollection` from a layer, keeping only `columns`
/// (all columns when `None`).
#[must_use]
pub fn layer_to_feature_collection(layer: &Layer, columns: Option<&[&str]>) -> FeatureCollection {
    let features = layer
        .features
        .iter()
        .map(|f| {
            let properties: JsonObject = f
                .properties
                .iter()
                .filter(|(k, _)| columns.is_none_or(|cols| cols.contains(&k.as_str())))
                .map(|(k, v)| (k.clone(), attribute_to_json(v)))
                .collect();
            geojson::Feature {
                bbox: None,
                geometry: f
                    .geometry
                    .as_ref()
                    .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}
