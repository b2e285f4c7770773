//! Well-Known Binary geometry codec.
//!
//! Writes little-endian ISO WKB (2D only). Reads either byte order.
//! `Line`, `Rect` and `Triangle` are written as their `LineString` /
//! `Polygon` equivalents.

use geo::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};

use crate::StorageError;

const POINT: u32 = 1;
const LINE_STRING: u32 = 2;
const POLYGON: u32 = 3;
const MULTI_POINT: u32 = 4;
const MULTI_LINE_STRING: u32 = 5;
const MULTI_POLYGON: u32 = 6;
const GEOMETRY_COLLECTION: u32 = 7;

/// Encodes a geometry as WKB.
#[must_use]
pub fn encode(geometry: &Geometry<f64>) -> Vec<u8> {
    let mut out = Vec::with_capacity(64);
    write_geometry(&mut out, geometry);
    out
}

/// Geometry type name as used in `GeoParquet` metadata.
#[must_use]
pub const fn geometry_type_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) | Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
    }
}

fn write_header(out: &mut Vec<u8>, kind: u32) {
    out.push(1);
    out.extend_from_slice(&kind.to_le_bytes());
}

#[allow(clippy::cast_possible_truncation)]
fn write_len(out: &mut Vec<u8>, len: usize) {
    out.extend_from_slice(&(len as u32).to_le_bytes());
}

fn write_coord(out: &mut Vec<u8>, c: Coord<f64>) {
    out.extend_from_slice(&c.x.to_le_bytes());
    out.extend_from_slice(&c.y.to_le_bytes());
}

fn write_ring(out: &mut Vec<u8>, ring: &LineString<f64>) {
    write_len(out, ring.0.len());
    for c in &ring.0 {
        write_coord(out, *c);
    }
}

fn write_polygon_body(out: &mut Vec<u8>, polygon: &Polygon<f64>) {
    write_len(out, 1 + polygon.interiors().len());
    write_ring(out, polygon.exterior());
    for interior in polygon.interiors() {
        write_ring(out, interior);
    }
}

fn write_geometry(out: &mut Vec<u8>, geometry: &Geometry<f64>) {
    match geometry {
        Geometry::Point(p) => {
            write_header(out, POINT);
            write_coord(out, p.0);
        }
        Geometry::Line(line) => {
            write_header(out, LINE_STRING);
            write_ring(out, &LineString::from(vec![line.start, line.end]));
        }
        Geometry::LineString(ls) => {
            write_header(out, LINE_STRING);
            write_ring(out, ls);
        }
        Geometry::Polygon(polygon) => {
            write_header(out, POLYGON);
            write_polygon_body(out, polygon);
        }
        Geometry::Rect(rect) => {
            write_header(out, POLYGON);
            write_polygon_body(out, &rect.to_polygon());
        }
        Geometry::Triangle(triangle) => {
            write_header(out, POLYGON);
            write_polygon_body(out, &triangle.to_polygon());
        }
        Geometry::MultiPoint(mp) => {
            write_header(out, MULTI_POINT);
            write_len(out, mp.0.len());
            for p in &mp.0 {
                write_geometry(out, &Geometry::Point(*p));
            }
        }
        Geometry::MultiLineString(mls) => {
            write_header(out, MULTI_LINE_STRING);
            write_len(out, mls.0.len());
            for ls in &mls.0 {
                write_header(out, LINE_STRING);
                write_ring(out, ls);
            }
        }
        Geometry::MultiPolygon(mp) => {
            write_header(out, MULTI_POLYGON);
            write_len(out, mp.0.len());
            for polygon in &mp.0 {
                write_header(out, POLYGON);
                write_polygon_body(out, polygon);
            }
        }
        Geometry::GeometryCollection(gc) => {
            write_header(out, GEOMETRY_COLLECTION);
            write_len(out, gc.0.len());
            for g in &gc.0 {
                write_geometry(out, g);
            }
        }
    }
}

/// Decodes a WKB geometry.
///
/// # Errors
///
/// Returns [`StorageError::Wkb`] on truncated input, an unknown byte
/// order or an unsupported geometry type. Trailing bytes are rejected.
pub fn decode(bytes: &[u8]) -> Result<Geometry<f64>, StorageError> {
    let mut reader = Reader { bytes, pos: 0 };
    let geometry = reader.geometry()?;
    if reader.pos != bytes.len() {
        return Err(wkb_error(format!(
            "{} trailing bytes after geometry",
            bytes.len() - reader.pos
        )));
    }
    Ok(geometry)
}

fn wkb_error(message: String) -> StorageError {
    StorageError::Wkb { message }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], StorageError> {
        let end = self.pos + N;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or_else(|| wkb_error(format!("unexpected end of input at byte {}", self.pos)))?;
        self.pos = end;
        let mut buf = [0u8; N];
        buf.copy_from_slice(slice);
        Ok(buf)
    }

    fn u32(&mut self, little: bool) -> Result<u32, StorageError> {
        let b = self.take::<4>()?;
        Ok(if little {
            u32::from_le_bytes(b)
        } else {
            u32::from_be_bytes(b)
        })
    }

    fn f64(&mut self, little: bool) -> Result<f64, StorageError> {
        let b = self.take::<8>()?;
        Ok(if little {
            f64::from_le_bytes(b)
        } else {
            f64::from_be_bytes(b)
        })
    }

    fn coord(&mut self, little: bool) -> Result<Coord<f64>, StorageError> {
        Ok(Coord {
            x: self.f64(little)?,
            y: self.f64(little)?,
        })
    }

    fn line_string(&mut self, little: bool) -> Result<LineString<f64>, StorageError> {
        let n = self.u32(little)? as usize;
        // Each coordinate needs 16 bytes; reject counts the input cannot hold.
        if n.saturating_mul(16) > self.bytes.len() - self.pos {
            return Err(wkb_error(format!("coordinate count {n} exceeds input")));
        }
        (0..n)
            .map(|_| self.coord(little))
            .collect::<Result<Vec<_>, _>>()
            .map(LineString::from)
    }

    fn polygon(&mut self, little: bool) -> Result<Polygon<f64>, StorageError> {
        let rings = self.u32(little)? as usize;
        if rings == 0 {
            return Ok(Polygon::new(LineString::new(vec![]), vec![]));
        }
        let exterior = self.line_string(little)?;
        let interiors = (1..rings)
            .map(|_| self.line_string(little))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Polygon::new(exterior, interiors))
    }

    fn header(&mut self) -> Result<(bool, u32), StorageError> {
        let [order] = self.take::<1>()?;
        let little = match order {
            0 => false,
            1 => true,
            other => return Err(wkb_error(format!("invalid byte order marker {other}"))),
        };
        Ok((little, self.u32(little)?))
    }

    fn count(&mut self, little: bool) -> Result<usize, StorageError> {
        let n = self.u32(little)? as usize;
        // Smallest member (an empty geometry) is 9 bytes.
        if n.saturating_mul(9) > self.bytes.len() - self.pos {
            return Err(wkb_error(format!("member count {n} exceeds input")));
        }
        Ok(n)
    }

    fn member<T>(
        &mut self,
        expected: u32,
        read: impl Fn(&mut Self, bool) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let (little, kind) = self.header()?;
        if kind != expected {
            return Err(wkb_error(format!(
                "expected member type {expected}, found {kind}"
            )));
        }
        read(self, little)
    }

    fn geometry(&mut self) -> Result<Geometry<f64>, StorageError> {
        let (little, kind) = self.header()?;

        Ok(match kind {
            POINT => Geometry::Point(Point(self.coord(little)?)),
            LINE_STRING => Geometry::LineString(self.line_string(little)?),
            POLYGON => Geometry::Polygon(self.polygon(little)?),
            MULTI_POINT => {
                let n = self.count(little)?;
                let points = (0..n)
                    .map(|_| self.member(POINT, |r, le| r.coord(le).map(Point)))
                    .collect::<Result<Vec<_>, _>>()?;
                Geometry::MultiPoint(MultiPoint(points))
            }
            MULTI_LINE_STRING => {
                let n = self.count(little)?;
                let lines = (0..n)
                    .map(|_| self.member(LINE_STRING, Self::line_string))
                    .collect::<Result<Vec<_>, _>>()?;
                Geometry::MultiLineString(MultiLineString(lines))
            }
            MULTI_POLYGON => {
                let n = self.count(little)?;
                let polygons = (0..n)
                    .map(|_| self.member(POLYGON, Self::polygon))
                    .collect::<Result<Vec<_>, _>>()?;
                Geometry::MultiPolygon(MultiPolygon(polygons))
            }
            GEOMETRY_COLLECTION => {
                let n = self.count(little)?;
                let members = (0..n)
                    .map(|_| self.geometry())
                    .collect::<Result<Vec<_>, _>>()?;
                Geometry::GeometryCollection(GeometryCollection(members))
            }
            other => return Err(wkb_error(format!("unsupported geometry type {other}"))),
        })
    }
}
