//! Standalone Leaflet maps.
//!
//! The page loads Leaflet from a CDN and embeds the layer as `GeoJSON`
//! with a precomputed `fill` color per feature, so it opens from disk
//! without a server.

use std::path::Path;

use diridon_spatial::crs::to_crs;
use diridon_spatial_models::{Crs, Layer};
use diridon_storage::geojson_io::layer_to_feature_collection;
use diridon_storage::paths::ensure_parent;
use geojson::{Feature, FeatureCollection, JsonObject};
use serde_json::{Value, json};

use crate::choropleth::classify_layer;
use crate::classify::break_labels;
use crate::palette::{NULL_COLOR, Palette, hex};
use crate::{RenderError, StationOverlay};

const TEMPLATE: &str = include_str!("interactive.html");

/// Options for [`render_interactive_map`].
#[derive(Debug, Clone, PartialEq)]
pub struct InteractiveOptions {
    /// Page title.
    pub title: String,
    /// Number of natural-breaks classes.
    pub classes: usize,
    /// Fill palette.
    pub palette: Palette,
    /// Station marker and buffer outlines.
    pub overlay: Option<StationOverlay>,
    /// Station name shown in the marker popup.
    pub station_name: String,
}

impl Default for InteractiveOptions {
    fn default() -> Self {
        Self {
            title: "San Jose census tracts".to_string(),
            classes: 5,
            palette: Palette::Blues,
            overlay: None,
            station_name: "Station".to_string(),
        }
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Script-safe JSON: `</` cannot close the surrounding `<script>`.
fn script_json(value: &impl serde::Serialize) -> Result<String, RenderError> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

fn overlay_collection(
    overlay: &StationOverlay,
    name: &str,
) -> Result<FeatureCollection, RenderError> {
    let overlay = overlay.to_crs(Crs::WGS84)?;
    let mut properties = JsonObject::new();
    properties.insert("name".to_string(), Value::String(name.to_string()));

    let station = Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(&overlay.station))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    };
    let buffers = overlay.buffers.iter().map(|b| Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(b))),
        id: None,
        properties: None,
        foreign_members: None,
    });

    Ok(FeatureCollection {
        bbox: None,
        features: buffers.chain(std::iter::once(station)).collect(),
        foreign_members: None,
    })
}

/// Builds the HTML page for `column` of `layer`.
///
/// Features carry only `GEOID`, the mapped column and their `fill`.
///
/// # Errors
///
/// Returns [`RenderError`] if the column is missing or reprojection fails.
pub fn interactive_map_html(
    layer: &Layer,
    column: &str,
    options: &InteractiveOptions,
) -> Result<String, RenderError> {
    let classification = classify_layer(layer, column, options.classes, options.palette)?;
    let layer = to_crs(layer, Crs::WGS84)?;

    let mut collection = layer_to_feature_collection(&layer, Some(&["GEOID", column]));
    for (feature, fill) in collection.features.iter_mut().zip(&classification.fills) {
        if let Some(properties) = feature.properties.as_mut() {
            properties.insert("fill".to_string(), Value::String(hex(*fill)));
        }
    }

    let values: Vec<f64> = layer
        .features
        .iter()
        .filter_map(|f| f.get(column).as_f64())
        .collect();
    let mut legend: Vec<Value> = break_labels(&values, &classification.breaks)
        .into_iter()
        .enumerate()
        .map(|(i, label)| {
            json!({
                "color": hex(options.palette.color(i, classification.breaks.len())),
                "label": label,
            })
        })
        .collect();
    if classification.nulls > 0 {
        legend.push(json!({ "color": hex(NULL_COLOR), "label": "No data" }));
    }

    let overlay = options
        .overlay
        .as_ref()
        .map(|o| overlay_collection(o, &options.station_name))
        .transpose()?;

    Ok(TEMPLATE
        .replace("__TITLE__", &escape_html(&options.title))
        .replace("__COLUMN__", &script_json(&column)?)
        .replace("__TRACTS__", &script_json(&collection)?)
        .replace("__OVERLAY__", &script_json(&overlay)?)
        .replace("__LEGEND__", &script_json(&legend)?))
}

/// Writes the interactive map for `column` of `layer` to `path`.
///
/// # Errors
///
/// Returns [`RenderError`] if the page cannot be built or written.
pub fn render_interactive_map(
    layer: &Layer,
    column: &str,
    options: &InteractiveOptions,
    path: &Path,
) -> Result<(), RenderError> {
    let html = interactive_map_html(layer, column, options)?;
    ensure_parent(path)?;
    std::fs::write(path, html)?;
    log::info!(
        "Wrote interactive map of '{column}' ({} features) to {}",
        layer.len(),
        path.display()
    );
    Ok(())
}
