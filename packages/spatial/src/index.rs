//! R-tree index over the polygons of a layer.
//!
//! Stores each areal feature's row index alongside its envelope so that
//! candidate lookups return positions in the source layer. Non-areal and
//! empty geometries are skipped and never match.

use diridon_spatial_models::Layer;
use geo::{BoundingRect, MultiPolygon, Rect};
use rstar::{AABB, RTree, RTreeObject};

/// A polygon stored in the R-tree with its source row.
pub struct IndexedPolygon {
    /// Row index in the indexed layer.
    pub index: usize,
    /// Feature geometry.
    pub polygon: MultiPolygon<f64>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedPolygon {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Bulk-loaded R-tree over a polygon layer.
pub struct PolygonIndex {
    tree: RTree<IndexedPolygon>,
}

impl PolygonIndex {
    /// Indexes every areal feature of `layer`.
    #[must_use]
    pub fn build(layer: &Layer) -> Self {
        let mut entries = Vec::with_capacity(layer.len());
        let mut skipped = 0usize;

        for (index, feature) in layer.features.iter().enumerate() {
            let Some(polygon) = feature.area_geometry() else {
                skipped += 1;
                continue;
            };
            let Some(rect) = polygon.bounding_rect() else {
                skipped += 1;
                continue;
            };
            entries.push(IndexedPolygon {
                index,
                polygon,
                envelope: rect_envelope(rect),
            });
        }

        if skipped > 0 {
            log::warn!(
                "Skipped {skipped} features without polygon geometry while indexing '{}'",
                layer.name
            );
        }
        log::debug!("Indexed {} polygons of '{}'", entries.len(), layer.name);

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Number of indexed polygons.
    #[must_use]
    pub fn size(&self) -> usize {
        self.tree.size()
    }

    /// Returns indexed polygons whose envelope intersects `rect`, sorted by
    /// source row so callers see candidates in layer order.
    #[must_use]
    pub fn candidates(&self, rect: Rect<f64>) -> Vec<&IndexedPolygon> {
        let mut found: Vec<&IndexedPolygon> = self
            .tree
            .locate_in_envelope_intersecting(&rect_envelope(rect))
            .collect();
        found.sort_by_key(|entry| entry.index);
        found
    }
}

/// Converts a bounding rectangle into an R-tree envelope.
#[must_use]
pub fn rect_envelope(rect: Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

#[cfg(test)]
mod tests {
    use super::*;
    use diridon_spatial_models::{Crs, Feature};
    use geo::{Point, coord};

    #[test]
    fn candidates_are_in_layer_order_and_skip_points() {
        let square = |x: f64| {
            Rect::new(coord! { x: x, y: 0.0 }, coord! { x: x + 1.0, y: 1.0 }).to_polygon()
        };
        let layer = Layer::with_features(
            "zones",
            Crs::WGS84,
            vec![
                Feature::new(square(2.0)),
                Feature::new(Point::new(0.5, 0.5)),
                Feature::new(square(0.0)),
            ],
        );
        let index = PolygonIndex::build(&layer);
        assert_eq!(index.size(), 2);

        let query = Rect::new(coord! { x: -1.0, y: -1.0 }, coord! { x: 5.0, y: 5.0 });
        let rows: Vec<usize> = index.candidates(query).iter().map(|e| e.index).collect();
        assert_eq!(rows, vec![0, 2]);
    }
}
