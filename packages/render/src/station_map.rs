//! Station-area parcel map.

use std::path::Path;

use diridon_spatial::buffer::StationBuffers;
use diridon_spatial::crs::to_crs;
use diridon_spatial_models::Layer;
use geo::{BooleanOps, BoundingRect, Intersects, MultiPolygon, Polygon};
use image::Rgba;

use crate::canvas::{BLACK, BLUE, BUFFER_DASH, Canvas, Viewport, WHITE};
use crate::RenderError;
use crate::palette::NULL_COLOR;

/// Urban parcel fill: red at 70% opacity.
pub const HIGHLIGHT: Rgba<u8> = Rgba([255, 0, 0, 179]);

/// Counts of what was drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationMapStats {
    /// Parcels drawn as base map (intersecting the outer buffer).
    pub base_parcels: usize,
    /// Highlighted parcels (intersecting the inner buffer).
    pub highlighted: usize,
}

/// Clips every areal feature of `layer` to `clip`, dropping empty results.
#[must_use]
pub fn clip_to(layer: &Layer, clip: &Polygon<f64>) -> Vec<MultiPolygon<f64>> {
    let clip_rect = clip.bounding_rect();
    layer
        .features
        .iter()
        .filter_map(|f| f.area_geometry())
        .filter(|area| match (area.bounding_rect(), clip_rect) {
            (Some(a), Some(c)) => a.intersects(&c),
            _ => false,
        })
        .map(|area| area.intersection(clip))
        .filter(|clipped| !clipped.0.is_empty())
        .collect()
}

/// Draws parcels around a station: every parcel clipped to the outer
/// buffer in light grey with white edges, `highlight` parcels clipped to
/// the inner buffer in translucent red, the inner buffer as a dashed blue
/// outline and the station as a black dot. The map extent is the outer
/// buffer.
///
/// Layers in any supported CRS are reprojected to web mercator first.
///
/// # Errors
///
/// Returns [`RenderError`] if reprojection fails or the PNG cannot be
/// written.
pub fn render_station_map(
    parcels: &Layer,
    highlight: &Layer,
    buffers: &StationBuffers,
    size: (u32, u32),
    path: &Path,
) -> Result<StationMapStats, RenderError> {
    let parcels = to_crs(parcels, StationBuffers::CRS)?;
    let highlight = to_crs(highlight, StationBuffers::CRS)?;

    let bounds = buffers
        .outer
        .bounding_rect()
        .ok_or_else(|| RenderError::EmptyLayer {
            layer: "station buffer".to_string(),
        })?;
    let viewport = Viewport::fit(bounds, size.0, size.1, 20);
    let mut canvas = Canvas::new(viewport, WHITE);

    let base = clip_to(&parcels, &buffers.outer);
    for area in &base {
        canvas.fill_multi_polygon(area, NULL_COLOR);
    }
    for area in &base {
        canvas.stroke_multi_polygon(area, WHITE, 1.0, None);
    }

    let highlighted = clip_to(&highlight, &buffers.inner);
    for area in &highlighted {
        canvas.fill_multi_polygon(area, HIGHLIGHT);
    }

    canvas.stroke_polygon(&buffers.inner, BLUE, 4.0, Some(BUFFER_DASH));
    canvas.fill_circle(buffers.center.0, 7.0, BLACK);
    canvas.swatch_legend(&[HIGHLIGHT, NULL_COLOR]);

    canvas.save_png(path)?;

    let stats = StationMapStats {
        base_parcels: base.len(),
        highlighted: highlighted.len(),
    };
    log::info!(
        "Station map: {} parcels in view, {} highlighted",
        stats.base_parcels,
        stats.highlighted
    );
    Ok(stats)
}
