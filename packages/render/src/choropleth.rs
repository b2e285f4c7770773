//! PNG choropleth maps of a numeric column.

use std::path::Path;

use diridon_spatial::crs::to_crs;
use diridon_spatial_models::{Crs, Layer};
use geo::{BoundingRect, Polygon};
use image::Rgba;

use crate::canvas::{BLACK, BLUE, BUFFER_DASH, Canvas, Viewport, WHITE, union_bounds};
use crate::classify::{class_index, natural_breaks};
use crate::palette::{NULL_COLOR, Palette};
use crate::{RenderError, StationOverlay};

/// CRS choropleths are drawn in.
pub const MAP_CRS: Crs = Crs::NAD83;

/// Options for [`render_choropleth`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChoroplethOptions {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Number of natural-breaks classes.
    pub classes: usize,
    /// Fill palette.
    pub palette: Palette,
    /// Station marker and buffer outlines to draw on top.
    pub overlay: Option<StationOverlay>,
}

impl Default for ChoroplethOptions {
    fn default() -> Self {
        Self {
            width: 1500,
            height: 1500,
            classes: 5,
            palette: Palette::Blues,
            overlay: None,
        }
    }
}

/// Class breaks and fills computed for a choropleth.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Upper bound of each class.
    pub breaks: Vec<f64>,
    /// Fill color per feature, in layer order.
    pub fills: Vec<Rgba<u8>>,
    /// Number of features drawn with [`NULL_COLOR`].
    pub nulls: usize,
}

/// Classifies `column` of `layer` into natural-breaks classes and picks a
/// fill for every feature. Features without a numeric value get
/// [`NULL_COLOR`].
///
/// # Errors
///
/// Returns [`RenderError::MissingColumn`] if no feature has the column.
pub fn classify_layer(
    layer: &Layer,
    column: &str,
    classes: usize,
    palette: Palette,
) -> Result<Classification, RenderError> {
    if !layer.has_column(column) {
        return Err(RenderError::MissingColumn {
            layer: layer.name.clone(),
            column: column.to_string(),
        });
    }

    let values: Vec<Option<f64>> = layer.features.iter().map(|f| f.get(column).as_f64()).collect();
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let breaks = natural_breaks(&present, classes);

    let mut nulls = 0;
    let fills = values
        .iter()
        .map(|value| {
            value
                .and_then(|v| class_index(v, &breaks))
                .map_or_else(
                    || {
                        nulls += 1;
                        NULL_COLOR
                    },
                    |class| palette.color(class, breaks.len()),
                )
        })
        .collect();

    Ok(Classification {
        breaks,
        fills,
        nulls,
    })
}

pub(crate) fn draw_overlay(canvas: &mut Canvas, overlay: &StationOverlay, line_width: f64) {
    for buffer in &overlay.buffers {
        canvas.stroke_polygon(buffer, BLUE, line_width, Some(BUFFER_DASH));
    }
    canvas.fill_circle(overlay.station.0, 7.0, BLACK);
}

/// Renders `column` of `layer` as a PNG choropleth at `path`.
///
/// The layer is drawn in EPSG:4269 with black 1 px edges. The overlay, if
/// any, is reprojected into the same CRS and included in the map extent.
///
/// # Errors
///
/// Returns [`RenderError`] if the column is missing, nothing is drawable,
/// reprojection fails or the PNG cannot be written.
pub fn render_choropleth(
    layer: &Layer,
    column: &str,
    options: &ChoroplethOptions,
    path: &Path,
) -> Result<Classification, RenderError> {
    let classification = classify_layer(layer, column, options.classes, options.palette)?;
    let layer = to_crs(layer, MAP_CRS)?;
    let overlay = options
        .overlay
        .as_ref()
        .map(|o| o.to_crs(MAP_CRS))
        .transpose()?;

    let areas: Vec<_> = layer.features.iter().map(|f| f.area_geometry()).collect();
    let bounds = union_bounds(
        areas
            .iter()
            .flatten()
            .filter_map(BoundingRect::bounding_rect)
            .chain(
                overlay
                    .iter()
                    .flat_map(|o| o.buffers.iter().filter_map(Polygon::bounding_rect)),
            ),
    )
    .ok_or_else(|| RenderError::EmptyLayer {
        layer: layer.name.clone(),
    })?;

    let viewport = Viewport::fit(bounds, options.width, options.height, 40);
    let mut canvas = Canvas::new(viewport, WHITE);

    for (area, fill) in areas.iter().zip(&classification.fills) {
        if let Some(area) = area {
            canvas.fill_multi_polygon(area, *fill);
        }
    }
    for area in areas.iter().flatten() {
        canvas.stroke_multi_polygon(area, BLACK, 1.0, None);
    }
    if let Some(overlay) = &overlay {
        draw_overlay(&mut canvas, overlay, 4.0);
    }

    let mut legend: Vec<Rgba<u8>> = (0..classification.breaks.len())
        .map(|i| options.palette.color(i, classification.breaks.len()))
        .collect();
    if classification.nulls > 0 {
        legend.push(NULL_COLOR);
    }
    canvas.swatch_legend(&legend);

    canvas.save_png(path)?;
    log::info!(
        "Choropleth of '{column}' ({} classes, {} without data)",
        classification.breaks.len(),
        classification.nulls
    );

    Ok(classification)
}
