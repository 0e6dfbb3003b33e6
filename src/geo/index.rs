//! Spatial index for radius queries over located entries.

use rstar::primitives::GeomWithData;
use rstar::{RTree, AABB};
use tracing::debug;

use super::GeoCoordinate;

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// R-tree over `[lon, lat]` points, each carrying the position of its entry
/// in the caller's storage.
///
/// The bounding box is used as a pre-filter; exact great-circle distance
/// decides membership.
pub struct RadiusIndex {
    tree: RTree<IndexedPoint>,
}

impl RadiusIndex {
    /// Build the index. `entries` pairs a coordinate with a caller-defined slot.
    pub fn build<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (usize, GeoCoordinate)>,
    {
        let points: Vec<IndexedPoint> = entries
            .into_iter()
            .map(|(slot, coordinate)| GeomWithData::new([coordinate.lon(), coordinate.lat()], slot))
            .collect();

        let tree = RTree::bulk_load(points);
        debug!("Radius index built with {} entries", tree.size());
        Self { tree }
    }

    /// Slots of all entries within `radius_km` of `center`, nearest first.
    pub fn within(&self, center: &GeoCoordinate, radius_km: f64) -> Vec<usize> {
        let mut hits: Vec<(f64, usize)> = envelopes(center, radius_km)
            .iter()
            .flat_map(|envelope| self.tree.locate_in_envelope(envelope))
            .filter_map(|point| {
                let [lon, lat] = *point.geom();
                let coordinate = GeoCoordinate::new(lat, lon).ok()?;
                let distance = center.distance(&coordinate);
                (distance <= radius_km).then_some((distance, point.data))
            })
            .collect();

        hits.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        hits.into_iter().map(|(_, slot)| slot).collect()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

/// Search envelopes for a radius query, split in two where the box crosses
/// the antimeridian. Boxes reaching a pole span every longitude.
fn envelopes(center: &GeoCoordinate, radius_km: f64) -> Vec<AABB<[f64; 2]>> {
    let [south, west, north, east] = center.bounding_box(radius_km);
    if east - west >= 360.0 || south <= -90.0 || north >= 90.0 {
        return vec![AABB::from_corners([-180.0, south], [180.0, north])];
    }

    let mut envelopes = vec![AABB::from_corners([west.max(-180.0), south], [east.min(180.0), north])];
    if west < -180.0 {
        envelopes.push(AABB::from_corners([west + 360.0, south], [180.0, north]));
    }
    if east > 180.0 {
        envelopes.push(AABB::from_corners([-180.0, south], [east - 360.0, north]));
    }
    envelopes
}
