use crate::geo::{great_circle_angle, BoundingBox, Coord, Geo, Hilbert2DRTree};
use std::ops::ControlFlow;

/**
 * Answers "which points are within this distance of here?" for a fixed set of points.
 *
 * The candidates come from a [Hilbert2DRTree] range query on a box enclosing the search circle and
 * are then checked with the exact great circle angle.
 */
pub struct SpatialIndex<'a, T> {
    tree: Option<Hilbert2DRTree<'a, T>>,
    data: &'a [T],
}

impl<'a, T: Geo> SpatialIndex<'a, T> {
    /// Build the index, an empty slice gives an index that never finds anything.
    pub fn build(data: &'a [T]) -> Self {
        SpatialIndex {
            tree: Hilbert2DRTree::build_for(data),
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /**
     * Find the indexes of all points within `angular_radius` radians of `center`, inclusive.
     *
     * The indexes are returned in ascending order.
     */
    pub fn query_within(&self, center: Coord, angular_radius: f64) -> Vec<usize> {
        let tree = match self.tree {
            Some(ref tree) => tree,
            None => return vec![],
        };

        let mut found = vec![];
        for region in BoundingBox::around(center, angular_radius) {
            found = tree.foreach(region, found, |item, idx, mut found| {
                if great_circle_angle(center, item.centroid()) <= angular_radius {
                    found.push(idx);
                }
                ControlFlow::Continue(found)
            });
        }

        found.sort_unstable();
        found.dedup();
        found
    }

    /// The neighbors of the point at `index`, including that point.
    pub fn query_neighbors(&self, index: usize, angular_radius: f64) -> Vec<usize> {
        self.query_within(self.data[index].centroid(), angular_radius)
    }
}
