//! R-tree index over stop facility coordinates.

use rstar::{AABB, PointDistance, RTree, RTreeObject};

use crate::domain::Coord;

use super::compiled::StopIdx;

/// A stop facility wrapped for the R-tree.
#[derive(Debug, Clone)]
struct StopNode {
    stop: StopIdx,
    point: [f64; 2],
}

impl RTreeObject for StopNode {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for StopNode {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}

/// Spatial index answering "which stops are near this point".
#[derive(Debug, Clone)]
pub struct StopIndex {
    tree: RTree<StopNode>,
}

impl StopIndex {
    /// Bulk-load the index from stop coordinates, in stop index order.
    pub fn new(coords: impl IntoIterator<Item = Coord>) -> Self {
        let nodes = coords
            .into_iter()
            .enumerate()
            .map(|(i, c)| StopNode {
                stop: StopIdx(i),
                point: c.to_array(),
            })
            .collect();
        Self {
            tree: RTree::bulk_load(nodes),
        }
    }

    /// Stops within `radius` of `coord` (inclusive), with their distance.
    ///
    /// Sorted by distance, ties broken by stop index, so results are
    /// deterministic regardless of tree layout.
    pub fn within(&self, coord: Coord, radius: f64) -> Vec<(StopIdx, f64)> {
        if radius.is_nan() || radius < 0.0 {
            return Vec::new();
        }
        let query = coord.to_array();
        let mut found: Vec<(StopIdx, f64)> = self
            .tree
            .locate_within_distance(query, radius * radius)
            .map(|node| (node.stop, node.distance_2(&query).sqrt()))
            .collect();
        found.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        found
    }

    /// The stop nearest to `coord`, with its distance.
    pub fn nearest(&self, coord: Coord) -> Option<(StopIdx, f64)> {
        let query = coord.to_array();
        self.tree
            .nearest_neighbor(&query)
            .map(|node| (node.stop, node.distance_2(&query).sqrt()))
    }

    /// Number of indexed stops.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Returns true if no stops are indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
