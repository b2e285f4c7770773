//! Tract attribution by containment.
//!
//! Attaches a census tract's GEOID and selected indicator columns to every
//! parcel that lies inside the tract. Unlike the zoning join this is a
//! containment test, not an area-weighted overlap: a parcel straddling two
//! tracts under [`Containment::Within`] receives nulls.

use std::sync::Arc;

use diridon_spatial_models::{AttributeValue, Feature, Layer};
use geo::{BoundingRect, Centroid, Contains};
use serde::{Deserialize, Serialize};

use crate::SpatialError;
use crate::crs::to_crs;
use crate::index::{IndexedPolygon, PolygonIndex};
use crate::join::LEFT_SUFFIX;
use crate::progress::ProgressCallback;

/// Tract identifier column, always attached.
pub const GEOID_COLUMN: &str = "GEOID";

/// Tract indicator columns attached when no explicit list is given.
pub const DEFAULT_TRACT_FIELDS: &[&str] = &[
    "public_transit_pct",
    "walked_pct",
    "drove_pct",
    "pct_renters",
    "vacancy_rate",
    "median_rent",
    "median_income",
    "pct_white",
    "pct_black",
    "pct_asian",
    "pct_latino",
    "pct_college_plus",
];

/// Which part of a parcel must fall inside a tract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Containment {
    /// The whole parcel geometry lies within the tract.
    #[default]
    Within,
    /// The parcel centroid lies within the tract.
    Centroid,
}

/// Returns [`DEFAULT_TRACT_FIELDS`] as owned strings.
#[must_use]
pub fn default_tract_fields() -> Vec<String> {
    DEFAULT_TRACT_FIELDS.iter().map(ToString::to_string).collect()
}

/// Attaches `GEOID` and the requested tract `fields` to each parcel.
///
/// Tracts are reprojected into the parcel CRS when needed. Requested
/// fields that no tract carries are skipped. When several tracts contain a
/// parcel the first tract row wins; parcels in no tract receive nulls.
/// Parcel columns that collide with attached names are renamed with a
/// `_left` suffix.
///
/// # Errors
///
/// Returns [`SpatialError::UnsupportedCrs`] if reprojection fails.
pub fn attach_tract_data(
    parcels: &Layer,
    tracts: &Layer,
    fields: &[String],
    mode: Containment,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<Layer, SpatialError> {
    let tracts = to_crs(tracts, parcels.crs)?;

    let mut attached: Vec<String> = vec![GEOID_COLUMN.to_string()];
    for field in fields {
        if field == GEOID_COLUMN || attached.contains(field) {
            continue;
        }
        if tracts.has_column(field) {
            attached.push(field.clone());
        } else {
            log::warn!("Tract layer '{}' has no column '{field}', skipping", tracts.name);
        }
    }

    let index = PolygonIndex::build(&tracts);
    progress.set_total(parcels.len() as u64);
    progress.set_message(format!("Attributing {} parcels to tracts", parcels.len()));

    let mut features = Vec::with_capacity(parcels.len());
    let mut unmatched = 0usize;

    for parcel in &parcels.features {
        let tract = containing_tract(parcel, &index, mode).map(|i| &tracts.features[i]);
        if tract.is_none() {
            unmatched += 1;
        }

        let mut properties = parcel.properties.clone();
        for name in &attached {
            if let Some(existing) = properties.remove(name) {
                properties.insert(format!("{name}{LEFT_SUFFIX}"), existing);
            }
            let value = tract.map_or(AttributeValue::Null, |t| t.get(name).clone());
            properties.insert(name.clone(), value);
        }

        features.push(Feature {
            geometry: parcel.geometry.clone(),
            properties,
        });
        progress.inc(1);
    }

    progress.finish(format!(
        "Attributed {} parcels ({unmatched} outside every tract)",
        parcels.len()
    ));
    log::info!(
        "Tract attachment: {} parcels, {} tracts, {unmatched} parcels in no tract",
        parcels.len(),
        index.size()
    );

    Ok(Layer::with_features(
        format!("{}_with_tracts", parcels.name),
        parcels.crs,
        features,
    ))
}

/// Finds the first tract row containing `parcel` under `mode`.
#[must_use]
pub fn containing_tract(
    parcel: &Feature,
    index: &PolygonIndex,
    mode: Containment,
) -> Option<usize> {
    let shape = parcel.area_geometry();

    match mode {
        Containment::Within => {
            let shape = shape?;
            let bbox = shape.bounding_rect()?;
            first_match(index.candidates(bbox), |tract| tract.polygon.contains(&shape))
        }
        Containment::Centroid => {
            let point = match shape {
                Some(mp) => mp.centroid()?,
                None => parcel.geometry.as_ref()?.centroid()?,
            };
            let bbox = point.bounding_rect();
            first_match(index.candidates(bbox), |tract| tract.polygon.contains(&point))
        }
    }
}

fn first_match(
    candidates: Vec<&IndexedPolygon>,
    test: impl Fn(&IndexedPolygon) -> bool,
) -> Option<usize> {
    candidates
        .into_iter()
        .find(|candidate| test(candidate))
        .map(|candidate| candidate.index)
}
