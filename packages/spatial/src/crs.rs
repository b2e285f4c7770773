//! Coordinate reference system reprojection.
//!
//! Supports the reference systems the pipeline actually meets: geographic
//! WGS84/NAD83 (Census boundaries), spherical Web Mercator (buffering and
//! station maps), and NAD83 / California zone 3 in feet or metres (San
//! Jose open data shapefiles). NAD83 and WGS84 are treated as the same
//! datum; the sub-metre shift between them is below parcel precision.
//!
//! Every conversion goes through geographic longitude/latitude, so any pair
//! of supported systems can be chained.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use diridon_spatial_models::{Crs, Feature, Layer};
use geo::{Coord, Geometry, MapCoords};

use crate::SpatialError;

/// Sphere radius used by EPSG:3857.
const WEB_MERCATOR_RADIUS_M: f64 = 6_378_137.0;

/// GRS 1980 semi-major axis (NAD83).
const GRS80_A: f64 = 6_378_137.0;

/// GRS 1980 inverse flattening (NAD83).
const GRS80_INV_F: f64 = 298.257_222_101;

/// Length of one US survey foot in metres.
pub const US_SURVEY_FOOT_M: f64 = 1200.0 / 3937.0;

/// Iterations for the inverse latitude series; converges well below 1e-12
/// radians within five for conformal latitudes.
const INVERSE_ITERATIONS: usize = 15;

/// Lambert Conformal Conic (2SP) on an ellipsoid, following the EPSG
/// guidance note formulas.
#[derive(Debug, Clone, Copy)]
pub struct LambertConformal {
    a: f64,
    e: f64,
    n: f64,
    big_f: f64,
    rho0: f64,
    lon0: f64,
    false_easting_m: f64,
    false_northing_m: f64,
    unit_m: f64,
}

/// Defining parameters of a Lambert Conformal Conic projection.
#[derive(Debug, Clone, Copy)]
pub struct LambertParams {
    /// Ellipsoid semi-major axis in metres.
    pub semi_major_m: f64,
    /// Ellipsoid inverse flattening.
    pub inverse_flattening: f64,
    /// First standard parallel in degrees.
    pub lat1: f64,
    /// Second standard parallel in degrees.
    pub lat2: f64,
    /// Latitude of false origin in degrees.
    pub lat0: f64,
    /// Longitude of false origin in degrees.
    pub lon0: f64,
    /// False easting in metres.
    pub false_easting_m: f64,
    /// False northing in metres.
    pub false_northing_m: f64,
    /// Size of one output unit in metres.
    pub unit_m: f64,
}

impl LambertConformal {
    /// Builds the projection from its defining parameters.
    #[must_use]
    pub fn new(p: &LambertParams) -> Self {
        let f = 1.0 / p.inverse_flattening;
        let e = f.mul_add(-f, 2.0 * f).sqrt();

        let phi1 = p.lat1.to_radians();
        let phi2 = p.lat2.to_radians();
        let phi0 = p.lat0.to_radians();

        let m1 = conformal_m(phi1, e);
        let m2 = conformal_m(phi2, e);
        let t1 = conformal_t(phi1, e);
        let t2 = conformal_t(phi2, e);
        let t0 = conformal_t(phi0, e);

        let n = (m1.ln() - m2.ln()) / (t1.ln() - t2.ln());
        let big_f = m1 / (n * t1.powf(n));
        let rho0 = p.semi_major_m * big_f * t0.powf(n);

        Self {
            a: p.semi_major_m,
            e,
            n,
            big_f,
            rho0,
            lon0: p.lon0.to_radians(),
            false_easting_m: p.false_easting_m,
            false_northing_m: p.false_northing_m,
            unit_m: p.unit_m,
        }
    }

    /// NAD83 / California zone 3 (EPSG:2227 in feet, EPSG:26943 in metres).
    #[must_use]
    pub fn california_zone_3(unit_m: f64) -> Self {
        Self::new(&LambertParams {
            semi_major_m: GRS80_A,
            inverse_flattening: GRS80_INV_F,
            lat1: 38.0 + 26.0 / 60.0,
            lat2: 37.0 + 4.0 / 60.0,
            lat0: 36.5,
            lon0: -120.5,
            false_easting_m: 2_000_000.0,
            false_northing_m: 500_000.0,
            unit_m,
        })
    }

    /// Projects longitude/latitude degrees to easting/northing in the
    /// projection's unit.
    #[must_use]
    pub fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let t = conformal_t(lat.to_radians(), self.e);
        let rho = self.a * self.big_f * t.powf(self.n);
        let theta = self.n * (lon.to_radians() - self.lon0);

        let x = rho.mul_add(theta.sin(), self.false_easting_m);
        let y = rho.mul_add(-theta.cos(), self.false_northing_m + self.rho0);
        (x / self.unit_m, y / self.unit_m)
    }

    /// Inverse of [`Self::forward`].
    #[must_use]
    pub fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let dx = x.mul_add(self.unit_m, -self.false_easting_m);
        let dy = self.rho0 - y.mul_add(self.unit_m, -self.false_northing_m);

        let rho = dx.hypot(dy).copysign(self.n);
        let theta = if self.n < 0.0 {
            (-dx).atan2(-dy)
        } else {
            dx.atan2(dy)
        };
        let t = (rho / (self.a * self.big_f)).powf(1.0 / self.n);

        let lon = theta / self.n + self.lon0;
        let half_e = self.e / 2.0;
        let mut phi = 2.0f64.mul_add(-t.atan(), FRAC_PI_2);
        for _ in 0..INVERSE_ITERATIONS {
            let es = self.e * phi.sin();
            phi = 2.0f64.mul_add(-(t * ((1.0 - es) / (1.0 + es)).powf(half_e)).atan(), FRAC_PI_2);
        }

        (lon.to_degrees(), phi.to_degrees())
    }
}

fn conformal_m(phi: f64, e: f64) -> f64 {
    let es = e * phi.sin();
    phi.cos() / es.mul_add(-es, 1.0).sqrt()
}

fn conformal_t(phi: f64, e: f64) -> f64 {
    let es = e * phi.sin();
    (FRAC_PI_4 - phi / 2.0).tan() / ((1.0 - es) / (1.0 + es)).powf(e / 2.0)
}

/// Concrete projection formulas for a supported [`Crs`].
#[derive(Debug, Clone, Copy)]
enum Projection {
    Geographic,
    WebMercator,
    Lambert(LambertConformal),
}

impl Projection {
    fn for_crs(crs: Crs) -> Result<Self, SpatialError> {
        match crs.epsg() {
            4326 | 4269 => Ok(Self::Geographic),
            3857 => Ok(Self::WebMercator),
            2227 => Ok(Self::Lambert(LambertConformal::california_zone_3(
                US_SURVEY_FOOT_M,
            ))),
            26943 => Ok(Self::Lambert(LambertConformal::california_zone_3(1.0))),
            _ => Err(SpatialError::UnsupportedCrs(crs)),
        }
    }

    fn to_lon_lat(&self, c: Coord<f64>) -> Coord<f64> {
        match self {
            Self::Geographic => c,
            Self::WebMercator => Coord {
                x: (c.x / WEB_MERCATOR_RADIUS_M).to_degrees(),
                y: (2.0f64.mul_add((c.y / WEB_MERCATOR_RADIUS_M).exp().atan(), -FRAC_PI_2))
                    .to_degrees(),
            },
            Self::Lambert(lcc) => {
                let (lon, lat) = lcc.inverse(c.x, c.y);
                Coord { x: lon, y: lat }
            }
        }
    }

    fn from_lon_lat(&self, c: Coord<f64>) -> Coord<f64> {
        match self {
            Self::Geographic => c,
            Self::WebMercator => Coord {
                x: WEB_MERCATOR_RADIUS_M * c.x.to_radians(),
                y: WEB_MERCATOR_RADIUS_M * (FRAC_PI_4 + c.y.to_radians() / 2.0).tan().ln(),
            },
            Self::Lambert(lcc) => {
                let (x, y) = lcc.forward(c.x, c.y);
                Coord { x, y }
            }
        }
    }
}

/// Converts coordinates from one [`Crs`] to another.
#[derive(Debug, Clone, Copy)]
pub struct Transformer {
    from: Projection,
    to: Projection,
    identity: bool,
}

impl Transformer {
    /// Builds a transformer between two supported reference systems.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialError::UnsupportedCrs`] if either side has no
    /// projection formulas (unless both are identical).
    pub fn new(from: Crs, to: Crs) -> Result<Self, SpatialError> {
        if from == to {
            return Ok(Self {
                from: Projection::Geographic,
                to: Projection::Geographic,
                identity: true,
            });
        }

        Ok(Self {
            from: Projection::for_crs(from)?,
            to: Projection::for_crs(to)?,
            identity: false,
        })
    }

    /// Transforms a single coordinate.
    #[must_use]
    pub fn transform(&self, c: Coord<f64>) -> Coord<f64> {
        if self.identity {
            return c;
        }
        self.to.from_lon_lat(self.from.to_lon_lat(c))
    }

    /// Transforms every coordinate of a geometry.
    #[must_use]
    pub fn transform_geometry(&self, geometry: &Geometry<f64>) -> Geometry<f64> {
        if self.identity {
            return geometry.clone();
        }
        geometry.map_coords(|c| self.transform(c))
    }
}

/// Returns a copy of `layer` with every geometry reprojected to `target`.
///
/// Returns a plain clone when the layer is already in `target`.
///
/// # Errors
///
/// Returns [`SpatialError::UnsupportedCrs`] if either CRS is unsupported.
pub fn to_crs(layer: &Layer, target: Crs) -> Result<Layer, SpatialError> {
    if layer.crs == target {
        return Ok(layer.clone());
    }

    let transformer = Transformer::new(layer.crs, target)?;
    log::debug!(
        "Reprojecting {} features of '{}' from {} to {target}",
        layer.len(),
        layer.name,
        layer.crs
    );

    let features = layer
        .features
        .iter()
        .map(|f| Feature {
            geometry: f
                .geometry
                .as_ref()
                .map(|g| transformer.transform_geometry(g)),
            properties: f.properties.clone(),
        })
        .collect();

    Ok(Layer::with_features(layer.name.clone(), target, features))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn lambert_matches_epsg_guidance_example() {
        // Texas South Central on Clarke 1866, worked example from EPSG
        // guidance note 7-2.
        let lcc = LambertConformal::new(&LambertParams {
            semi_major_m: 6_378_206.4,
            inverse_flattening: 294.978_698_2,
            lat1: 28.0 + 23.0 / 60.0,
            lat2: 30.0 + 17.0 / 60.0,
            lat0: 27.0 + 50.0 / 60.0,
            lon0: -99.0,
            false_easting_m: 2_000_000.0 * US_SURVEY_FOOT_M,
            false_northing_m: 0.0,
            unit_m: US_SURVEY_FOOT_M,
        });
        let (x, y) = lcc.forward(-96.0, 28.5);
        assert!(close(x, 2_963_503.91, 0.01), "easting {x}");
        assert!(close(y, 254_759.80, 0.01), "northing {y}");
    }

    #[test]
    fn california_zone_3_origin_maps_to_false_origin() {
        let lcc = LambertConformal::california_zone_3(1.0);
        let (x, y) = lcc.forward(-120.5, 36.5);
        assert!(close(x, 2_000_000.0, 1e-6));
        assert!(close(y, 500_000.0, 1e-6));
    }

    #[test]
    fn diridon_station_in_state_plane_feet() {
        let t = Transformer::new(Crs::WGS84, Crs::CA_ZONE_3_FT).unwrap();
        let c = t.transform(Coord {
            x: -121.9036,
            y: 37.3292,
        });
        assert!(close(c.x, 6_153_577.0, 0.5), "easting {}", c.x);
        assert!(close(c.y, 1_945_396.8, 0.5), "northing {}", c.y);
    }

    #[test]
    fn round_trips_through_every_supported_crs() {
        let start = Coord {
            x: -121.9036,
            y: 37.3292,
        };
        for crs in [
            Crs::NAD83,
            Crs::WEB_MERCATOR,
            Crs::CA_ZONE_3_FT,
            Crs::CA_ZONE_3_M,
        ] {
            let fwd = Transformer::new(Crs::WGS84, crs).unwrap();
            let back = Transformer::new(crs, Crs::WGS84).unwrap();
            let c = back.transform(fwd.transform(start));
            assert!(close(c.x, start.x, 1e-6), "{crs}: lon {}", c.x);
            assert!(close(c.y, start.y, 1e-6), "{crs}: lat {}", c.y);
        }
    }

    #[test]
    fn web_mercator_known_values() {
        let t = Transformer::new(Crs::WGS84, Crs::WEB_MERCATOR).unwrap();
        let c = t.transform(Coord { x: 180.0, y: 0.0 });
        assert!(close(c.x, 20_037_508.342_789_244, 1e-6));
        assert!(close(c.y, 0.0, 1e-6));

        let c = t.transform(Coord {
            x: -121.9036,
            y: 37.3292,
        });
        assert!(close(c.x, -13_570_246.68, 0.01));
        assert!(close(c.y, 4_485_092.90, 0.01));
    }

    #[test]
    fn rejects_unsupported_crs() {
        assert!(matches!(
            Transformer::new(Crs::WGS84, Crs::from_epsg(32610)),
            Err(SpatialError::UnsupportedCrs(_))
        ));
        // Identity is always allowed, even for unknown systems.
        assert!(Transformer::new(Crs::from_epsg(32610), Crs::from_epsg(32610)).is_ok());
    }

    #[test]
    fn to_crs_keeps_properties() {
        let layer = Layer::with_features(
            "pts",
            Crs::WGS84,
            vec![Feature::new(geo::Point::new(0.0, 0.0)).with("id", "a")],
        );
        let out = to_crs(&layer, Crs::WEB_MERCATOR).unwrap();
        assert_eq!(out.crs, Crs::WEB_MERCATOR);
        assert_eq!(out.features[0].get("id").as_str(), Some("a"));
    }
}
