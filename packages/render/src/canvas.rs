//! Raster drawing of map geometry onto an RGBA image.
//!
//! Map coordinates are fitted into the image by a [`Viewport`] (uniform
//! scale, north up, centered). Polygons are filled with an even-odd
//! scanline so holes stay empty; outlines are stroked by stamping a square
//! brush along each segment, with optional dashes.

use std::path::Path;

use diridon_storage::paths::ensure_parent;
use geo::{Coord, LineString, MultiPolygon, Polygon, Rect};
use image::{Pixel, Rgba, RgbaImage};

use crate::RenderError;

/// Plain white background.
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
/// Outline and marker black.
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
/// Buffer outline blue.
pub const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

/// Dash pattern in pixels: drawn length, then gap length.
pub type Dash = (f64, f64);

/// Default dash for buffer outlines.
pub const BUFFER_DASH: Dash = (14.0, 8.0);

/// Maps a rectangle of map coordinates onto an image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    bounds: Rect<f64>,
    width: u32,
    height: u32,
    scale: f64,
    offset_x: f64,
    offset_y: f64,
}

impl Viewport {
    /// Fits `bounds` into a `width` x `height` image leaving `margin`
    /// pixels on every side.
    #[must_use]
    pub fn fit(bounds: Rect<f64>, width: u32, height: u32, margin: u32) -> Self {
        let inner_w = f64::from(width.saturating_sub(2 * margin).max(1));
        let inner_h = f64::from(height.saturating_sub(2 * margin).max(1));
        let span_w = bounds.width().max(f64::EPSILON);
        let span_h = bounds.height().max(f64::EPSILON);
        let scale = (inner_w / span_w).min(inner_h / span_h);

        Self {
            bounds,
            width,
            height,
            scale,
            offset_x: (f64::from(width) - span_w * scale) / 2.0,
            offset_y: (f64::from(height) - span_h * scale) / 2.0,
        }
    }

    /// Converts a map coordinate to fractional pixel coordinates.
    #[must_use]
    pub fn to_pixel(&self, c: Coord<f64>) -> (f64, f64) {
        (
            (c.x - self.bounds.min().x).mul_add(self.scale, self.offset_x),
            (self.bounds.max().y - c.y).mul_add(self.scale, self.offset_y),
        )
    }

    /// Pixels per map unit.
    #[must_use]
    pub const fn scale(&self) -> f64 {
        self.scale
    }
}

/// An image plus the viewport used to draw into it.
pub struct Canvas {
    image: RgbaImage,
    viewport: Viewport,
}

impl Canvas {
    /// Creates a canvas filled with `background`.
    #[must_use]
    pub fn new(viewport: Viewport, background: Rgba<u8>) -> Self {
        Self {
            image: RgbaImage::from_pixel(viewport.width, viewport.height, background),
            viewport,
        }
    }

    /// The rendered image.
    #[must_use]
    pub const fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// The viewport.
    #[must_use]
    pub const fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn blend(&mut self, x: i64, y: i64, color: Rgba<u8>) {
        let (width, height) = self.image.dimensions();
        if x < 0 || y < 0 || x >= i64::from(width) || y >= i64::from(height) {
            return;
        }
        self.image.get_pixel_mut(x as u32, y as u32).blend(&color);
    }

    /// Fills a polygon, leaving interior rings empty.
    pub fn fill_polygon(&mut self, polygon: &Polygon<f64>, color: Rgba<u8>) {
        let rings: Vec<Vec<(f64, f64)>> = std::iter::once(polygon.exterior())
            .chain(polygon.interiors())
            .map(|ring| ring.coords().map(|c| self.viewport.to_pixel(*c)).collect())
            .collect();
        self.fill_rings(&rings, color);
    }

    /// Fills every polygon of a multipolygon.
    pub fn fill_multi_polygon(&mut self, multi: &MultiPolygon<f64>, color: Rgba<u8>) {
        for polygon in multi {
            self.fill_polygon(polygon, color);
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn fill_rings(&mut self, rings: &[Vec<(f64, f64)>], color: Rgba<u8>) {
        let (min_y, max_y) = rings
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, y)| {
                (lo.min(*y), hi.max(*y))
            });
        if !min_y.is_finite() {
            return;
        }

        let first_row = (min_y.floor() as i64).max(0);
        let last_row = (max_y.ceil() as i64).min(i64::from(self.image.height()) - 1);
        let mut crossings = Vec::new();

        for row in first_row..=last_row {
            #[allow(clippy::cast_precision_loss)]
            let sample_y = row as f64 + 0.5;
            crossings.clear();

            for ring in rings {
                for edge in ring.windows(2) {
                    let ((x0, y0), (x1, y1)) = (edge[0], edge[1]);
                    if (y0 <= sample_y) != (y1 <= sample_y) {
                        let t = (sample_y - y0) / (y1 - y0);
                        crossings.push(t.mul_add(x1 - x0, x0));
                    }
                }
            }
            crossings.sort_by(f64::total_cmp);

            for span in crossings.chunks_exact(2) {
                let start = (span[0] - 0.5).ceil() as i64;
                let end = (span[1] - 0.5).floor() as i64;
                for x in start.max(0)..=end.min(i64::from(self.image.width()) - 1) {
                    self.blend(x, row, color);
                }
            }
        }
    }

    /// Strokes a ring or line with a brush `width` pixels wide.
    pub fn stroke_line(
        &mut self,
        line: &LineString<f64>,
        color: Rgba<u8>,
        width: f64,
        dash: Option<Dash>,
    ) {
        let points: Vec<(f64, f64)> = line.coords().map(|c| self.viewport.to_pixel(*c)).collect();
        let half = (width / 2.0).max(0.5);
        let mut travelled = 0.0;

        for segment in points.windows(2) {
            let ((x0, y0), (x1, y1)) = (segment[0], segment[1]);
            let length = (x1 - x0).hypot(y1 - y0);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let steps = (length * 2.0).ceil().max(1.0) as u32;

            for step in 0..=steps {
                let t = f64::from(step) / f64::from(steps);
                let along = t.mul_add(length, travelled);
                let visible = dash.is_none_or(|(on, off)| along % (on + off) < on);
                if visible {
                    self.stamp(t.mul_add(x1 - x0, x0), t.mul_add(y1 - y0, y0), half, color);
                }
            }
            travelled += length;
        }
    }

    /// Strokes every ring of a polygon.
    pub fn stroke_polygon(
        &mut self,
        polygon: &Polygon<f64>,
        color: Rgba<u8>,
        width: f64,
        dash: Option<Dash>,
    ) {
        self.stroke_line(polygon.exterior(), color, width, dash);
        for interior in polygon.interiors() {
            self.stroke_line(interior, color, width, dash);
        }
    }

    /// Strokes every polygon of a multipolygon.
    pub fn stroke_multi_polygon(
        &mut self,
        multi: &MultiPolygon<f64>,
        color: Rgba<u8>,
        width: f64,
        dash: Option<Dash>,
    ) {
        for polygon in multi {
            self.stroke_polygon(polygon, color, width, dash);
        }
    }

    // Stamps overwrite rather than blend so overlapping stamps along a
    // stroke do not darken it.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn stamp(&mut self, cx: f64, cy: f64, half: f64, color: Rgba<u8>) {
        let (w, h) = (i64::from(self.image.width()), i64::from(self.image.height()));
        let x0 = ((cx - half).round() as i64).max(0);
        let x1 = ((cx + half).round() as i64 - 1).min(w - 1);
        let y0 = ((cy - half).round() as i64).max(0);
        let y1 = ((cy + half).round() as i64 - 1).min(h - 1);
        for y in y0..=y1 {
            for x in x0..=x1 {
                self.image.put_pixel(x as u32, y as u32, color);
            }
        }
    }

    /// Draws a filled disc of `radius` pixels centered on a map coordinate.
    #[allow(clippy::cast_possible_truncation)]
    pub fn fill_circle(&mut self, center: Coord<f64>, radius: f64, color: Rgba<u8>) {
        let (cx, cy) = self.viewport.to_pixel(center);
        let r = radius.ceil() as i64;
        let (px, py) = (cx.floor() as i64, cy.floor() as i64);
        for dy in -r..=r {
            for dx in -r..=r {
                #[allow(clippy::cast_precision_loss)]
                let (fx, fy) = ((px + dx) as f64 + 0.5 - cx, (py + dy) as f64 + 0.5 - cy);
                if fx.hypot(fy) <= radius {
                    self.blend(px + dx, py + dy, color);
                }
            }
        }
    }

    /// Fills an axis-aligned rectangle given in pixels.
    pub fn fill_rect_px(&mut self, x: u32, y: u32, width: u32, height: u32, color: Rgba<u8>) {
        for py in y..y.saturating_add(height) {
            for px in x..x.saturating_add(width) {
                self.blend(i64::from(px), i64::from(py), color);
            }
        }
    }

    /// Draws a column of outlined color swatches in the lower-right corner,
    /// first color on top.
    pub fn swatch_legend(&mut self, colors: &[Rgba<u8>]) {
        const SIZE: u32 = 24;
        const GAP: u32 = 6;
        const INSET: u32 = 20;

        let Ok(count) = u32::try_from(colors.len()) else {
            return;
        };
        let total = count * (SIZE + GAP);
        let x = self.image.width().saturating_sub(INSET + SIZE);
        let top = self.image.height().saturating_sub(INSET + total);

        for (i, color) in (0..count).zip(colors) {
            let y = top + i * (SIZE + GAP);
            self.fill_rect_px(x.saturating_sub(1), y.saturating_sub(1), SIZE + 2, SIZE + 2, BLACK);
            self.fill_rect_px(x, y, SIZE, SIZE, *color);
        }
    }

    /// Writes the image as PNG, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] if the directory or file cannot be written.
    pub fn save_png(&self, path: &Path) -> Result<(), RenderError> {
        ensure_parent(path)?;
        self.image
            .save_with_format(path, image::ImageFormat::Png)?;
        log::info!(
            "Wrote {}x{} map to {}",
            self.image.width(),
            self.image.height(),
            path.display()
        );
        Ok(())
    }
}

/// Smallest rectangle covering every rectangle in `rects`.
#[must_use]
pub fn union_bounds(rects: impl IntoIterator<Item = Rect<f64>>) -> Option<Rect<f64>> {
    rects.into_iter().reduce(|a, b| {
        Rect::new(
            Coord {
                x: a.min().x.min(b.min().x),
                y: a.min().y.min(b.min().y),
            },
            Coord {
                x: a.max().x.max(b.max().x),
                y: a.max().y.max(b.max().y),
            },
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    fn unit_viewport() -> Viewport {
        Viewport::fit(
            Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 10.0, y: 10.0 }),
            100,
            100,
            0,
        )
    }

    #[test]
    fn viewport_puts_north_up() {
        let viewport = unit_viewport();
        assert_eq!(viewport.to_pixel(coord! { x: 0.0, y: 10.0 }), (0.0, 0.0));
        assert_eq!(viewport.to_pixel(coord! { x: 10.0, y: 0.0 }), (100.0, 100.0));
    }

    #[test]
    fn viewport_keeps_aspect_ratio() {
        let viewport = Viewport::fit(
            Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 20.0, y: 10.0 }),
            100,
            100,
            0,
        );
        assert!((viewport.scale() - 5.0).abs() < 1e-12);
        // Centered vertically: 50 px of content in a 100 px image.
        assert_eq!(viewport.to_pixel(coord! { x: 0.0, y: 10.0 }), (0.0, 25.0));
    }

    #[test]
    fn fill_leaves_holes_empty() {
        let mut canvas = Canvas::new(unit_viewport(), WHITE);
        let polygon = Polygon::new(
            Rect::new(coord! { x: 1.0, y: 1.0 }, coord! { x: 9.0, y: 9.0 })
                .to_polygon()
                .exterior()
                .clone(),
            vec![
                Rect::new(coord! { x: 4.0, y: 4.0 }, coord! { x: 6.0, y: 6.0 })
                    .to_polygon()
                    .exterior()
                    .clone(),
            ],
        );
        canvas.fill_polygon(&polygon, BLACK);

        assert_eq!(*canvas.image().get_pixel(20, 20), BLACK);
        assert_eq!(*canvas.image().get_pixel(50, 50), WHITE);
        assert_eq!(*canvas.image().get_pixel(5, 5), WHITE);
    }

    #[test]
    fn dashed_stroke_has_gaps() {
        let mut canvas = Canvas::new(unit_viewport(), WHITE);
        let line = LineString::from(vec![(0.0, 5.0), (10.0, 5.0)]);
        canvas.stroke_line(&line, BLUE, 2.0, Some((10.0, 10.0)));

        assert_eq!(*canvas.image().get_pixel(5, 50), BLUE);
        assert_eq!(*canvas.image().get_pixel(15, 50), WHITE);
        assert_eq!(*canvas.image().get_pixel(25, 50), BLUE);
    }

    #[test]
    fn union_of_bounds() {
        let a = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 });
        let b = Rect::new(coord! { x: -1.0, y: 0.5 }, coord! { x: 0.5, y: 3.0 });
        let u = union_bounds([a, b]).unwrap();
        assert_eq!(u.min(), coord! { x: -1.0, y: 0.0 });
        assert_eq!(u.max(), coord! { x: 1.0, y: 3.0 });
        assert!(union_bounds(std::iter::empty()).is_none());
    }

    #[test]
    fn saves_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("maps/test.png");
        let mut canvas = Canvas::new(unit_viewport(), WHITE);
        canvas.swatch_legend(&[BLACK, BLUE]);
        canvas.save_png(&path).unwrap();
        assert!(path.is_file());
    }
}
