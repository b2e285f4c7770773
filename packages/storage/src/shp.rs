//! ESRI shapefile reading.
//!
//! Geometry and attributes come from the `.shp`/`.dbf` pair; the CRS is
//! detected from the sidecar `.prj` WKT. Esri-flavoured WKT rarely carries
//! an `AUTHORITY` clause, so well-known projection names are recognized as
//! well.

use std::path::Path;
use std::sync::LazyLock;

use diridon_spatial_models::{AttributeValue, Crs, Feature, Layer, Properties};
use regex::Regex;
use shapefile::dbase::FieldValue;

use crate::StorageError;

static AUTHORITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"AUTHORITY\[\s*"EPSG"\s*,\s*"?(\d+)"?\s*\]"#).unwrap_or_else(|_| unreachable!())
});

static ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"ID\[\s*"EPSG"\s*,\s*(\d+)\s*\]"#).unwrap_or_else(|_| unreachable!())
});

/// Detects the CRS described by `.prj` WKT.
///
/// The last `AUTHORITY["EPSG", ...]` (the outermost object in WKT1) wins;
/// otherwise the projection name is matched against the systems the
/// pipeline supports.
#[must_use]
pub fn crs_from_wkt(wkt: &str) -> Option<Crs> {
    if let Some(code) = AUTHORITY_RE
        .captures_iter(wkt)
        .chain(ID_RE.captures_iter(wkt))
        .last()
        .and_then(|c| c[1].parse::<u32>().ok())
    {
        return Some(Crs::from_epsg(code));
    }

    let normalized = wkt.to_uppercase().replace([' ', '-'], "_");
    let projected = normalized.starts_with("PROJCS") || normalized.starts_with("PROJCRS");

    if normalized.contains("WEB_MERCATOR") || normalized.contains("PSEUDO_MERCATOR") {
        return Some(Crs::WEB_MERCATOR);
    }
    if projected
        && normalized.contains("CALIFORNIA")
        && (normalized.contains("_III") || normalized.contains("ZONE_3"))
    {
        let feet = normalized.contains("FEET") || normalized.contains("FOOT");
        return Some(if feet {
            Crs::CA_ZONE_3_FT
        } else {
            Crs::CA_ZONE_3_M
        });
    }
    if !projected {
        if normalized.contains("WGS_1984") || normalized.contains("WGS_84") {
            return Some(Crs::WGS84);
        }
        if normalized.contains("NORTH_AMERICAN_1983") || normalized.contains("NAD83") {
            return Some(Crs::NAD83);
        }
    }
    None
}

/// Converts a dBase field into an attribute. Whole-valued numerics become
/// integers so parcel IDs compare and serialize as integers.
#[must_use]
pub fn attribute_from_field(value: FieldValue) -> AttributeValue {
    #[allow(clippy::cast_possible_truncation)]
    fn numeric(v: f64) -> AttributeValue {
        if v.fract() == 0.0 && v.abs() < 9.0e15 {
            AttributeValue::Integer(v as i64)
        } else {
            AttributeValue::from_f64(Some(v))
        }
    }

    match value {
        FieldValue::Character(s) => s
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map_or(AttributeValue::Null, AttributeValue::Text),
        FieldValue::Memo(s) => AttributeValue::Text(s),
        FieldValue::Numeric(v) => v.map_or(AttributeValue::Null, numeric),
        FieldValue::Float(v) => AttributeValue::from_f64(v.map(f64::from)),
        FieldValue::Double(v) | FieldValue::Currency(v) => AttributeValue::from_f64(Some(v)),
        FieldValue::Integer(v) => AttributeValue::Integer(i64::from(v)),
        FieldValue::Logical(v) => v.map_or(AttributeValue::Null, AttributeValue::Bool),
        other => AttributeValue::Text(format!("{other:?}")),
    }
}

/// Reads a shapefile into a layer.
///
/// `crs_override` replaces whatever the `.prj` says.
///
/// # Errors
///
/// Returns [`StorageError::UnknownCrs`] if no override is given and the
/// `.prj` is missing or unrecognized, or [`StorageError::Shapefile`] if
/// the file cannot be read.
pub fn read_shapefile(path: &Path, crs_override: Option<Crs>) -> Result<Layer, StorageError> {
    let crs = match crs_override {
        Some(crs) => crs,
        None => {
            let prj = path.with_extension("prj");
            let wkt = std::fs::read_to_string(&prj).map_err(|_| StorageError::UnknownCrs {
                path: path.to_path_buf(),
            })?;
            crs_from_wkt(&wkt).ok_or_else(|| StorageError::UnknownCrs {
                path: path.to_path_buf(),
            })?
        }
    };

    let name = path
        .file_stem()
        .map_or_else(|| "layer".to_string(), |s| s.to_string_lossy().into_owned());

    let mut reader = shapefile::Reader::from_path(path)?;
    let mut features = Vec::new();
    let mut null_shapes = 0usize;

    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;
        let geometry = geo::Geometry::<f64>::try_from(shape).ok();
        if geometry.is_none() {
            null_shapes += 1;
        }

        let properties: Properties = record
            .into_iter()
            .map(|(field, value)| (field, attribute_from_field(value)))
            .collect();

        features.push(Feature {
            geometry,
            properties,
        });
    }

    if null_shapes > 0 {
        log::warn!("{name}: {null_shapes} records have no usable geometry");
    }
    log::info!(
        "Read {} features from {} ({crs})",
        features.len(),
        path.display()
    );

    Ok(Layer::with_features(name, crs, features))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_authority_codes() {
        let wkt = r#"PROJCS["NAD83 / California zone 3 (ftUS)",GEOGCS["NAD83",AUTHORITY["EPSG","4269"]],UNIT["US survey foot",0.3048006096012192,AUTHORITY["EPSG","9003"]],AUTHORITY["EPSG","2227"]]"#;
        assert_eq!(crs_from_wkt(wkt), Some(Crs::CA_ZONE_3_FT));
    }

    #[test]
    fn detects_esri_state_plane_names() {
        let feet = r#"PROJCS["NAD_1983_StatePlane_California_III_FIPS_0403_Feet",GEOGCS["GCS_North_American_1983"],PROJECTION["Lambert_Conformal_Conic"],UNIT["Foot_US",0.3048006096012192]]"#;
        assert_eq!(crs_from_wkt(feet), Some(Crs::CA_ZONE_3_FT));

        let meters = r#"PROJCS["NAD_1983_StatePlane_California_III_FIPS_0403",GEOGCS["GCS_North_American_1983"],UNIT["Meter",1.0]]"#;
        assert_eq!(crs_from_wkt(meters), Some(Crs::CA_ZONE_3_M));
    }

    #[test]
    fn detects_geographic_and_web_mercator() {
        assert_eq!(
            crs_from_wkt(r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984"]]"#),
            Some(Crs::WGS84)
        );
        assert_eq!(
            crs_from_wkt(r#"GEOGCS["GCS_North_American_1983",DATUM["D_North_American_1983"]]"#),
            Some(Crs::NAD83)
        );
        assert_eq!(
            crs_from_wkt(r#"PROJCS["WGS_1984_Web_Mercator_Auxiliary_Sphere",GEOGCS["GCS_WGS_1984"]]"#),
            Some(Crs::WEB_MERCATOR)
        );
        assert_eq!(crs_from_wkt(r#"PROJCS["Unknown_Projection"]"#), None);
    }

    #[test]
    fn converts_dbase_fields() {
        assert_eq!(
            attribute_from_field(FieldValue::Numeric(Some(4_520_013.0))),
            AttributeValue::Integer(4_520_013)
        );
        assert_eq!(
            attribute_from_field(FieldValue::Numeric(Some(0.25))),
            AttributeValue::Number(0.25)
        );
        assert_eq!(
            attribute_from_field(FieldValue::Character(Some(" UV ".to_string()))),
            AttributeValue::Text("UV".to_string())
        );
        assert!(attribute_from_field(FieldValue::Character(Some("   ".to_string()))).is_null());
        assert!(attribute_from_field(FieldValue::Numeric(None)).is_null());
        assert_eq!(
            attribute_from_field(FieldValue::Logical(Some(true))),
            AttributeValue::Bool(true)
        );
    }

    #[test]
    fn missing_prj_is_an_error_without_override() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_shapefile(&dir.path().join("Parcels.shp"), None).unwrap_err();
        assert!(matches!(err, StorageError::UnknownCrs { .. }));
    }
}
