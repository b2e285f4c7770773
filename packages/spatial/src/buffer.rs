//! Circular buffers around a point of interest.

use std::f64::consts::TAU;

use diridon_spatial_models::Crs;
use geo::{Coord, LineString, Point, Polygon};

use crate::SpatialError;
use crate::crs::Transformer;

/// One statute mile in meters.
pub const MILE_IN_METERS: f64 = 1609.344;

/// Vertices used to approximate a full circle.
pub const DEFAULT_SEGMENTS: usize = 64;

/// Approximates a circle of `radius` around `center` as a closed polygon.
///
/// `segments` is clamped to at least 3.
#[must_use]
pub fn circle(center: Point<f64>, radius: f64, segments: usize) -> Polygon<f64> {
    let segments = segments.max(3);
    #[allow(clippy::cast_precision_loss)]
    let step = TAU / segments as f64;

    let mut ring: Vec<Coord<f64>> = (0..segments)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let angle = step * i as f64;
            Coord {
                x: radius.mul_add(angle.cos(), center.x()),
                y: radius.mul_add(angle.sin(), center.y()),
            }
        })
        .collect();
    ring.push(ring[0]);

    Polygon::new(LineString::from(ring), vec![])
}

/// Inner and outer buffers around a station, in web mercator meters.
#[derive(Debug, Clone)]
pub struct StationBuffers {
    /// Station location in [`Crs::WEB_MERCATOR`].
    pub center: Point<f64>,
    /// Buffer used for parcel summaries.
    pub inner: Polygon<f64>,
    /// Buffer used for tract summaries.
    pub outer: Polygon<f64>,
    /// Inner radius in meters.
    pub inner_radius_m: f64,
    /// Outer radius in meters.
    pub outer_radius_m: f64,
}

impl StationBuffers {
    /// Reference system of every geometry in this struct.
    pub const CRS: Crs = Crs::WEB_MERCATOR;
}

/// Projects a WGS84 station location to web mercator and builds buffers of
/// `inner_miles` and `outer_miles` around it.
///
/// # Errors
///
/// Propagates [`SpatialError`] from the projection setup.
pub fn build_station_buffers(
    lon: f64,
    lat: f64,
    inner_miles: f64,
    outer_miles: f64,
) -> Result<StationBuffers, SpatialError> {
    let transformer = Transformer::new(Crs::WGS84, StationBuffers::CRS)?;
    let center: Point<f64> = transformer.transform(Coord { x: lon, y: lat }).into();

    let inner_radius_m = inner_miles * MILE_IN_METERS;
    let outer_radius_m = outer_miles * MILE_IN_METERS;

    log::debug!(
        "Station buffers at ({lon}, {lat}): {inner_radius_m:.1} m and {outer_radius_m:.1} m"
    );

    Ok(StationBuffers {
        center,
        inner: circle(center, inner_radius_m, DEFAULT_SEGMENTS),
        outer: circle(center, outer_radius_m, DEFAULT_SEGMENTS),
        inner_radius_m,
        outer_radius_m,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Area, Contains};

    #[test]
    fn circle_area_approaches_pi_r_squared() {
        let poly = circle(Point::new(0.0, 0.0), 100.0, DEFAULT_SEGMENTS);
        let exact = std::f64::consts::PI * 100.0 * 100.0;
        let area = poly.unsigned_area();
        assert!(area < exact);
        assert!((exact - area) / exact < 0.002);
        assert_eq!(poly.exterior().0.len(), DEFAULT_SEGMENTS + 1);
    }

    #[test]
    fn degenerate_segment_counts_are_clamped() {
        let poly = circle(Point::new(5.0, 5.0), 1.0, 1);
        assert_eq!(poly.exterior().0.len(), 4);
    }

    #[test]
    fn station_buffers_are_nested_around_the_station() {
        let buffers = build_station_buffers(-121.9036, 37.3292, 1.0, 2.0).unwrap();
        assert!((buffers.inner_radius_m - 1609.344).abs() < 1e-9);
        assert!((buffers.outer_radius_m - 3218.688).abs() < 1e-9);
        assert!(buffers.inner.contains(&buffers.center));
        assert!(buffers.outer.unsigned_area() > buffers.inner.unsigned_area() * 3.9);
        assert!((buffers.center.x() - -13_570_246.68).abs() < 1.0);
    }
}
