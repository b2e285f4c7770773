//! Largest-overlap join between parcels and zoning districts.
//!
//! Every parcel is matched against all zoning polygons it intersects and
//! keeps exactly one: the district covering the largest share of its area.
//! Zoning is reprojected into the parcel CRS first so intersection areas
//! are measured in parcel units.
//!
//! Equal overlap areas resolve to the zoning district that appears first
//! in the zoning layer. A district that only touches a parcel's boundary
//! still counts as intersecting (with zero area), so a parcel is left
//! unzoned only when no district intersects it at all.

use std::cmp::Ordering;
use std::sync::Arc;

use diridon_spatial_models::{AttributeValue, Feature, Layer, Properties};
use geo::{Area, BooleanOps, BoundingRect, Intersects};
use serde::{Deserialize, Serialize};

use crate::SpatialError;
use crate::crs::to_crs;
use crate::index::PolygonIndex;
use crate::progress::ProgressCallback;

/// Name of the column holding the parcel/district intersection area.
pub const OVERLAP_AREA_COLUMN: &str = "overlap_area";

/// Suffix applied to parcel columns that collide with joined columns.
pub const LEFT_SUFFIX: &str = "_left";

/// Suffix applied to joined columns that collide with parcel columns.
pub const RIGHT_SUFFIX: &str = "_right";

/// How a parcel picks among several intersecting districts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStrategy {
    /// District with the largest intersection area.
    #[default]
    Largest,
    /// First intersecting district in zoning row order.
    First,
}

/// Zoning assignment of one parcel row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoningMatch {
    /// Row index in the parcel layer.
    pub parcel_index: usize,
    /// Row index in the zoning layer, `None` when nothing intersects.
    pub district_index: Option<usize>,
    /// Intersection area in squared parcel CRS units; zero when unmatched.
    pub overlap_area: f64,
}

/// Options for [`join_parcels_zoning`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOptions {
    /// Candidate selection strategy.
    pub strategy: JoinStrategy,
    /// Parcel column holding the parcel identifier used for deduplication.
    pub parcel_id_field: String,
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self {
            strategy: JoinStrategy::Largest,
            parcel_id_field: "PARCELID".to_string(),
        }
    }
}

/// Result of [`join_parcels_zoning`].
#[derive(Debug, Clone)]
pub struct ZonedParcels {
    /// One row per unique parcel ID, sorted by ID.
    pub layer: Layer,
    /// Zoning row matched by each output row (aligned with `layer`).
    pub districts: Vec<Option<usize>>,
    /// Zoning layer in the parcel CRS, indexable by `districts`.
    pub zoning: Layer,
}

/// Matches every parcel row to one zoning district.
///
/// Returns exactly one [`ZoningMatch`] per parcel row, in parcel order,
/// together with the zoning layer reprojected to the parcel CRS.
///
/// # Errors
///
/// Returns [`SpatialError::UnsupportedCrs`] if the zoning layer cannot be
/// reprojected into the parcel CRS.
pub fn sjoin_parcels_to_zd(
    parcels: &Layer,
    zoning: &Layer,
    strategy: JoinStrategy,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<(Vec<ZoningMatch>, Layer), SpatialError> {
    let zoning = if zoning.crs == parcels.crs {
        zoning.clone()
    } else {
        log::info!(
            "Reprojecting zoning '{}' from {} to {} to match parcels",
            zoning.name,
            zoning.crs,
            parcels.crs
        );
        to_crs(zoning, parcels.crs)?
    };

    let index = PolygonIndex::build(&zoning);
    progress.set_total(parcels.len() as u64);
    progress.set_message(format!("Joining {} parcels to zoning", parcels.len()));

    let mut matches = Vec::with_capacity(parcels.len());
    let mut unmatched = 0usize;

    for (parcel_index, feature) in parcels.features.iter().enumerate() {
        let matched = match_parcel(feature, &index, strategy);
        if matched.0.is_none() {
            unmatched += 1;
        }
        matches.push(ZoningMatch {
            parcel_index,
            district_index: matched.0,
            overlap_area: matched.1,
        });
        progress.inc(1);
    }

    progress.finish(format!(
        "Joined {} parcels ({unmatched} without zoning)",
        parcels.len()
    ));
    log::info!(
        "Zoning join: {} parcels, {} districts indexed, {unmatched} unmatched",
        parcels.len(),
        index.size()
    );

    Ok((matches, zoning))
}

/// Picks the district for one parcel, returning `(district, area)`.
fn match_parcel(
    feature: &Feature,
    index: &PolygonIndex,
    strategy: JoinStrategy,
) -> (Option<usize>, f64) {
    let Some(parcel) = feature.area_geometry() else {
        return (None, 0.0);
    };
    let Some(bbox) = parcel.bounding_rect() else {
        return (None, 0.0);
    };

    let mut best: Option<(usize, f64)> = None;

    for candidate in index.candidates(bbox) {
        if !candidate.polygon.intersects(&parcel) {
            continue;
        }
        if strategy == JoinStrategy::First && best.is_some() {
            break;
        }
        let area = parcel.intersection(&candidate.polygon).unsigned_area();

        match best {
            None => best = Some((candidate.index, area)),
            // Strict comparison keeps the earlier row on ties.
            Some((_, best_area)) if area > best_area => best = Some((candidate.index, area)),
            Some(_) => {}
        }
    }

    best.map_or((None, 0.0), |(idx, area)| (Some(idx), area))
}

/// Joins parcels to zoning and deduplicates to one row per parcel ID.
///
/// Each output row carries the parcel's columns, the matched district's
/// columns (nulls when unmatched), and [`OVERLAP_AREA_COLUMN`]. Columns
/// present in both layers are suffixed with [`LEFT_SUFFIX`] and
/// [`RIGHT_SUFFIX`]. When a parcel ID appears on several rows, the row
/// with the largest overlap is kept. Output is sorted by parcel ID; rows
/// without an ID are dropped.
///
/// # Errors
///
/// Returns [`SpatialError::MissingColumn`] if no parcel carries the ID
/// column, or [`SpatialError::UnsupportedCrs`] if reprojection fails.
pub fn join_parcels_zoning(
    parcels: &Layer,
    zoning: &Layer,
    options: &JoinOptions,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<ZonedParcels, SpatialError> {
    if !parcels.is_empty() && !parcels.has_column(&options.parcel_id_field) {
        return Err(SpatialError::MissingColumn {
            layer: parcels.name.clone(),
            column: options.parcel_id_field.clone(),
        });
    }

    let (matches, zoning) = sjoin_parcels_to_zd(parcels, zoning, options.strategy, progress)?;

    let parcel_columns = parcels.columns();
    let zoning_columns = zoning.columns();

    let mut rows: Vec<(AttributeValue, ZoningMatch)> = Vec::with_capacity(matches.len());
    let mut missing_ids = 0usize;
    for m in matches {
        let id = parcels.features[m.parcel_index]
            .get(&options.parcel_id_field)
            .clone();
        if id.is_null() {
            missing_ids += 1;
            continue;
        }
        rows.push((id, m));
    }
    if missing_ids > 0 {
        log::warn!(
            "Dropped {missing_ids} parcels without a {} value",
            options.parcel_id_field
        );
    }

    rows.sort_by(|(a_id, a), (b_id, b)| {
        compare_ids(a_id, b_id).then_with(|| {
            b.overlap_area
                .partial_cmp(&a.overlap_area)
                .unwrap_or(Ordering::Equal)
        })
    });
    let before = rows.len();
    rows.dedup_by(|(later, _), (kept, _)| compare_ids(later, kept) == Ordering::Equal);
    if rows.len() < before {
        log::info!(
            "Deduplicated {} duplicate parcel rows by {}",
            before - rows.len(),
            options.parcel_id_field
        );
    }

    let mut features = Vec::with_capacity(rows.len());
    let mut districts = Vec::with_capacity(rows.len());

    for (_, m) in rows {
        let parcel = &parcels.features[m.parcel_index];
        let district = m.district_index.map(|i| &zoning.features[i]);

        let mut properties = merge_properties(
            &parcel.properties,
            &parcel_columns,
            district.map(|d| &d.properties),
            &zoning_columns,
        );
        properties.insert(
            OVERLAP_AREA_COLUMN.to_string(),
            AttributeValue::Number(m.overlap_area),
        );

        features.push(Feature {
            geometry: parcel.geometry.clone(),
            properties,
        });
        districts.push(m.district_index);
    }

    Ok(ZonedParcels {
        layer: Layer::with_features(format!("{}_with_zoning", parcels.name), parcels.crs, features),
        districts,
        zoning,
    })
}

/// Numeric value of a parcel ID. Text holding a plain number counts, since
/// parcel IDs are often stored as strings.
fn numeric_id(id: &AttributeValue) -> Option<f64> {
    id.as_f64().or_else(|| {
        id.as_str()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .filter(|v| v.is_finite())
    })
}

/// Orders parcel IDs: numeric IDs first by value, then the rest as text.
fn compare_ids(a: &AttributeValue, b: &AttributeValue) -> Ordering {
    match (numeric_id(a), numeric_id(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.as_text().cmp(&b.as_text()),
    }
}

/// Combines left and right property tables the way a left spatial join
/// does: right columns are always present (null when `right` is `None`),
/// and names present on both sides get `_left` / `_right` suffixes.
#[must_use]
pub fn merge_properties(
    left: &Properties,
    left_columns: &[String],
    right: Option<&Properties>,
    right_columns: &[String],
) -> Properties {
    let mut out = Properties::new();

    for (key, value) in left {
        if right_columns.contains(key) {
            out.insert(format!("{key}{LEFT_SUFFIX}"), value.clone());
        } else {
            out.insert(key.clone(), value.clone());
        }
    }

    for key in right_columns {
        let value = right
            .and_then(|props| props.get(key))
            .cloned()
            .unwrap_or(AttributeValue::Null);
        if left_columns.contains(key) {
            out.insert(format!("{key}{RIGHT_SUFFIX}"), value);
        } else {
            out.insert(key.clone(), value);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::null_progress;
    use diridon_spatial_models::Crs;
    use geo::{Rect, coord};

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> geo::Polygon<f64> {
        Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 }).to_polygon()
    }

    fn zoning_layer(zones: Vec<(&str, geo::Polygon<f64>)>) -> Layer {
        Layer::with_features(
            "zoning",
            Crs::CA_ZONE_3_FT,
            zones
                .into_iter()
                .map(|(code, poly)| Feature::new(poly).with("ZONING", code))
                .collect(),
        )
    }

    fn parcel_layer(parcels: Vec<(&str, geo::Polygon<f64>)>) -> Layer {
        Layer::with_features(
            "parcels",
            Crs::CA_ZONE_3_FT,
            parcels
                .into_iter()
                .map(|(id, poly)| Feature::new(poly).with("PARCELID", id))
                .collect(),
        )
    }

    #[test]
    fn picks_district_with_largest_overlap() {
        let parcels = parcel_layer(vec![("1", rect(0.0, 0.0, 10.0, 10.0))]);
        let zoning = zoning_layer(vec![
            ("R-1-8", rect(-5.0, -5.0, 7.0, 15.0)),
            ("UV", rect(7.0, -5.0, 20.0, 15.0)),
            ("CG", rect(50.0, 50.0, 60.0, 60.0)),
        ]);

        let (matches, _) =
            sjoin_parcels_to_zd(&parcels, &zoning, JoinStrategy::Largest, &null_progress())
                .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].district_index, Some(0));
        assert!((matches[0].overlap_area - 70.0).abs() < 1e-6);
    }

    #[test]
    fn assigned_district_maximises_area_among_candidates() {
        let zoning = zoning_layer(vec![
            ("A", rect(0.0, 0.0, 4.0, 10.0)),
            ("B", rect(4.0, 0.0, 9.0, 10.0)),
            ("C", rect(9.0, 0.0, 20.0, 10.0)),
        ]);
        let parcels = parcel_layer(vec![
            ("p1", rect(1.0, 1.0, 6.0, 2.0)),
            ("p2", rect(3.0, 1.0, 12.0, 2.0)),
            ("p3", rect(8.5, 1.0, 15.0, 2.0)),
        ]);
        let (matches, zoning) =
            sjoin_parcels_to_zd(&parcels, &zoning, JoinStrategy::Largest, &null_progress())
                .unwrap();

        for m in &matches {
            let parcel = parcels.features[m.parcel_index].area_geometry().unwrap();
            let best = zoning
                .features
                .iter()
                .map(|z| {
                    parcel
                        .intersection(&z.area_geometry().unwrap())
                        .unsigned_area()
                })
                .fold(0.0, f64::max);
            assert!((m.overlap_area - best).abs() < 1e-9);
        }
        let codes: Vec<Option<usize>> = matches.iter().map(|m| m.district_index).collect();
        assert_eq!(codes, vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn unmatched_parcel_gets_null_zoning_and_zero_area() {
        let parcels = parcel_layer(vec![
            ("1", rect(0.0, 0.0, 1.0, 1.0)),
            ("2", rect(100.0, 100.0, 101.0, 101.0)),
        ]);
        let zoning = zoning_layer(vec![("UV", rect(-1.0, -1.0, 2.0, 2.0))]);

        let zoned =
            join_parcels_zoning(&parcels, &zoning, &JoinOptions::default(), &null_progress())
                .unwrap();
        assert_eq!(zoned.layer.len(), 2);
        assert_eq!(zoned.districts, vec![Some(0), None]);

        let orphan = &zoned.layer.features[1];
        assert_eq!(orphan.get("PARCELID").as_str(), Some("2"));
        assert!(orphan.get("ZONING").is_null());
        assert_eq!(orphan.get(OVERLAP_AREA_COLUMN).as_f64(), Some(0.0));
    }

    #[test]
    fn ties_resolve_to_first_zoning_row() {
        let parcels = parcel_layer(vec![("1", rect(0.0, 0.0, 10.0, 10.0))]);
        let zoning = zoning_layer(vec![
            ("RIGHT", rect(5.0, 0.0, 10.0, 10.0)),
            ("LEFT", rect(0.0, 0.0, 5.0, 10.0)),
        ]);
        let (matches, _) =
            sjoin_parcels_to_zd(&parcels, &zoning, JoinStrategy::Largest, &null_progress())
                .unwrap();
        assert_eq!(matches[0].district_index, Some(0));
        assert!((matches[0].overlap_area - 50.0).abs() < 1e-6);
    }

    #[test]
    fn touching_district_matches_with_zero_area() {
        let parcels = parcel_layer(vec![("1", rect(0.0, 0.0, 1.0, 1.0))]);
        let zoning = zoning_layer(vec![("OS", rect(1.0, 0.0, 2.0, 1.0))]);
        let (matches, _) =
            sjoin_parcels_to_zd(&parcels, &zoning, JoinStrategy::Largest, &null_progress())
                .unwrap();
        assert_eq!(matches[0].district_index, Some(0));
        assert!(matches[0].overlap_area.abs() < 1e-12);
    }

    #[test]
    fn first_strategy_takes_lowest_intersecting_row() {
        let parcels = parcel_layer(vec![("1", rect(0.0, 0.0, 10.0, 10.0))]);
        let zoning = zoning_layer(vec![
            ("FAR", rect(50.0, 50.0, 60.0, 60.0)),
            ("SMALL", rect(9.0, 0.0, 20.0, 10.0)),
            ("BIG", rect(-5.0, -5.0, 9.0, 15.0)),
        ]);
        let (matches, _) =
            sjoin_parcels_to_zd(&parcels, &zoning, JoinStrategy::First, &null_progress())
                .unwrap();
        assert_eq!(matches[0].district_index, Some(1));
        assert!((matches[0].overlap_area - 10.0).abs() < 1e-6);
    }

    #[test]
    fn reprojects_zoning_into_parcel_crs() {
        let parcels = Layer::with_features(
            "parcels",
            Crs::WGS84,
            vec![Feature::new(rect(0.0, 0.0, 0.001, 0.001)).with("PARCELID", "1")],
        );
        let zoning = Layer::with_features(
            "zoning",
            Crs::WEB_MERCATOR,
            vec![Feature::new(rect(-1000.0, -1000.0, 1000.0, 1000.0)).with("ZONING", "DC")],
        );

        let zoned =
            join_parcels_zoning(&parcels, &zoning, &JoinOptions::default(), &null_progress())
                .unwrap();
        assert_eq!(zoned.zoning.crs, Crs::WGS84);
        assert_eq!(zoned.districts, vec![Some(0)]);
        let area = zoned.layer.features[0]
            .get(OVERLAP_AREA_COLUMN)
            .as_f64()
            .unwrap();
        assert!((area - 1e-6).abs() < 1e-10);
    }

    #[test]
    fn output_cardinality_equals_parcel_rows() {
        let parcels = parcel_layer(
            (0..25)
                .map(|i| {
                    let x = f64::from(i) * 3.0;
                    ("p", rect(x, 0.0, x + 2.0, 2.0))
                })
                .collect(),
        );
        let zoning = zoning_layer(vec![("UV", rect(0.0, 0.0, 29.5, 5.0))]);
        let (matches, _) =
            sjoin_parcels_to_zd(&parcels, &zoning, JoinStrategy::Largest, &null_progress())
                .unwrap();
        assert_eq!(matches.len(), parcels.len());
        assert_eq!(matches.iter().filter(|m| m.district_index.is_some()).count(), 10);
    }

    #[test]
    fn deduplicates_by_parcel_id_keeping_largest_overlap() {
        let parcels = parcel_layer(vec![
            ("20", rect(0.0, 0.0, 1.0, 1.0)),
            ("3", rect(0.0, 0.0, 1.0, 1.0)),
            ("3", rect(0.9, 0.0, 1.9, 1.0)),
        ]);
        let zoning = zoning_layer(vec![("UV", rect(0.0, 0.0, 1.0, 1.0))]);

        let zoned =
            join_parcels_zoning(&parcels, &zoning, &JoinOptions::default(), &null_progress())
                .unwrap();

        let ids: Vec<Option<&str>> = zoned
            .layer
            .features
            .iter()
            .map(|f| f.get("PARCELID").as_str())
            .collect();
        assert_eq!(ids, vec![Some("3"), Some("20")]);
        let kept = zoned.layer.features[0]
            .get(OVERLAP_AREA_COLUMN)
            .as_f64()
            .unwrap();
        assert!((kept - 1.0).abs() < 1e-9);
    }

    #[test]
    fn text_ids_sort_by_value_before_other_text() {
        let parcels = parcel_layer(vec![
            ("P-7", rect(0.0, 0.0, 1.0, 1.0)),
            ("100", rect(2.0, 0.0, 3.0, 1.0)),
            (" 9", rect(4.0, 0.0, 5.0, 1.0)),
            ("A-2", rect(6.0, 0.0, 7.0, 1.0)),
            ("20", rect(8.0, 0.0, 9.0, 1.0)),
        ]);
        let zoning = zoning_layer(vec![("UV", rect(0.0, 0.0, 9.0, 1.0))]);

        let zoned =
            join_parcels_zoning(&parcels, &zoning, &JoinOptions::default(), &null_progress())
                .unwrap();

        let ids: Vec<Option<&str>> = zoned
            .layer
            .features
            .iter()
            .map(|f| f.get("PARCELID").as_str())
            .collect();
        assert_eq!(
            ids,
            vec![Some(" 9"), Some("20"), Some("100"), Some("A-2"), Some("P-7")]
        );
    }

    #[test]
    fn mixed_integer_and_text_ids_dedup_together() {
        let parcels = Layer::with_features(
            "parcels",
            Crs::CA_ZONE_3_FT,
            vec![
                Feature::new(rect(0.0, 0.0, 1.0, 1.0)).with("PARCELID", 42_i64),
                Feature::new(rect(0.5, 0.0, 1.5, 1.0)).with("PARCELID", "42"),
                Feature::new(rect(0.0, 0.0, 1.0, 1.0)).with("PARCELID", 7_i64),
            ],
        );
        let zoning = zoning_layer(vec![("UV", rect(0.0, 0.0, 1.0, 1.0))]);

        let zoned =
            join_parcels_zoning(&parcels, &zoning, &JoinOptions::default(), &null_progress())
                .unwrap();

        assert_eq!(zoned.layer.len(), 2);
        assert_eq!(zoned.layer.features[0].get("PARCELID").as_f64(), Some(7.0));
        let kept = zoned.layer.features[1]
            .get(OVERLAP_AREA_COLUMN)
            .as_f64()
            .unwrap();
        assert!((kept - 1.0).abs() < 1e-9);
    }

    #[test]
    fn colliding_columns_get_suffixes() {
        let parcels = Layer::with_features(
            "parcels",
            Crs::CA_ZONE_3_FT,
            vec![
                Feature::new(rect(0.0, 0.0, 1.0, 1.0))
                    .with("PARCELID", "1")
                    .with("ZONING", "R-1-8"),
            ],
        );
        let zoning = zoning_layer(vec![("UV", rect(0.0, 0.0, 1.0, 1.0))]);
        let zoned =
            join_parcels_zoning(&parcels, &zoning, &JoinOptions::default(), &null_progress())
                .unwrap();
        let row = &zoned.layer.features[0];
        assert_eq!(row.get("ZONING_left").as_str(), Some("R-1-8"));
        assert_eq!(row.get("ZONING_right").as_str(), Some("UV"));
        assert!(row.get("ZONING").is_null());
    }

    #[test]
    fn missing_id_column_is_an_error() {
        let parcels = Layer::with_features(
            "parcels",
            Crs::CA_ZONE_3_FT,
            vec![Feature::new(rect(0.0, 0.0, 1.0, 1.0)).with("APN", "1")],
        );
        let zoning = zoning_layer(vec![]);
        let err = join_parcels_zoning(&parcels, &zoning, &JoinOptions::default(), &null_progress())
            .unwrap_err();
        assert!(matches!(err, SpatialError::MissingColumn { .. }));
    }
}
