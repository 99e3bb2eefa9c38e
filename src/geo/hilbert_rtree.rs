use super::{BoundingBox, Coord, Geo};
use std::ops::ControlFlow;

/// Maximum number of entries grouped under one node.
const NODE_CAPACITY: usize = 8;

/// Boxes this close (degrees) are treated as touching.
const TOUCH_EPS: f64 = 1.0e-5;

/// Pad the domain so a set of points on a single meridian or parallel still spans an area.
const DOMAIN_PAD: f64 = 1.0e-6;

/// Bits per axis of the curve used to order the items.
const CURVE_ORDER: u32 = 16;

#[derive(Debug, Clone, Copy)]
struct Node {
    bbox: BoundingBox,
    /// First entry in the level below, or in the sorted item order for the bottom level.
    first: usize,
    count: usize,
}

/**
 * A static, packed R-tree over a borrowed slice.
 *
 * The items are sorted along a Hilbert curve covering their extent, then grouped
 * [NODE_CAPACITY] at a time into nodes, and the nodes grouped the same way until a single root
 * remains. Sorting along the curve keeps items that are close together in the same nodes. The
 * tree never changes after it is built.
 */
#[derive(Debug)]
pub struct Hilbert2DRTree<'a, T> {
    /// Indexes into `data`, in curve order.
    order: Vec<usize>,
    /// `levels[0]` groups the items, the last level holds only the root.
    levels: Vec<Vec<Node>>,
    data: &'a [T],
}

impl<'a, T: Geo> Hilbert2DRTree<'a, T> {
    /// Build an index for the provided list, returns `None` if it is empty.
    pub fn build_for(data: &'a [T]) -> Option<Self> {
        if data.is_empty() {
            return None;
        }

        let curve = HilbertCurve::new(CURVE_ORDER, padded_extent(data));

        // Ties broken by index so the layout is fully determined by the input.
        let mut keyed: Vec<(u64, usize)> = data
            .iter()
            .enumerate()
            .map(|(i, item)| (curve.distance_of(item.centroid()), i))
            .collect();
        keyed.sort_unstable();
        let order: Vec<usize> = keyed.into_iter().map(|(_, i)| i).collect();

        let bottom = group(order.iter().map(|&i| data[i].bounding_box()));
        let mut levels = vec![bottom];

        while let Some(below) = levels.last().filter(|level| level.len() > 1) {
            let above = group(below.iter().map(|node| node.bbox));
            levels.push(above);
        }

        Some(Hilbert2DRTree {
            order,
            levels,
            data,
        })
    }

    /// The number of items in the index.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /**
     * Apply `visit` to every item with a bounding box that overlaps `region`.
     *
     * `visit` gets the item, its index in the slice the tree was built for, and `user_data` as
     * returned by the previous call, like the accumulator of [Iterator::fold]. Returning `Break`
     * stops the search. The last value returned by `visit` is returned.
     */
    pub fn foreach<V, F>(&self, region: BoundingBox, user_data: V, mut visit: F) -> V
    where
        F: FnMut(&T, usize, V) -> ControlFlow<V, V>,
    {
        let mut acc = user_data;

        let top = self.levels.len() - 1;
        let mut stack: Vec<(usize, usize)> = vec![(top, 0)];

        while let Some((level, node_idx)) = stack.pop() {
            let node = &self.levels[level][node_idx];
            if !node.bbox.overlap(&region, TOUCH_EPS) {
                continue;
            }

            let entries = node.first..(node.first + node.count);

            if level > 0 {
                stack.extend(entries.rev().map(|child| (level - 1, child)));
                continue;
            }

            for &item_idx in &self.order[entries] {
                let item = &self.data[item_idx];
                if !item.bounding_box().overlap(&region, TOUCH_EPS) {
                    continue;
                }

                acc = match visit(item, item_idx, acc) {
                    ControlFlow::Continue(value) => value,
                    ControlFlow::Break(value) => return value,
                };
            }
        }

        acc
    }
}

/// Pack consecutive boxes into nodes.
fn group<I: Iterator<Item = BoundingBox>>(boxes: I) -> Vec<Node> {
    let mut nodes: Vec<Node> = vec![];

    for (i, bbox) in boxes.enumerate() {
        match nodes.last_mut() {
            Some(node) if node.count < NODE_CAPACITY => {
                node.bbox.expand_to_cover(&bbox);
                node.count += 1;
            }
            _ => nodes.push(Node {
                bbox,
                first: i,
                count: 1,
            }),
        }
    }

    nodes
}

fn padded_extent<T: Geo>(data: &[T]) -> BoundingBox {
    let mut extent = BoundingBox::inverted();
    for item in data {
        extent.expand_to_cover(&item.bounding_box());
    }

    extent.ll.lat -= DOMAIN_PAD;
    extent.ll.lon -= DOMAIN_PAD;
    extent.ur.lat += DOMAIN_PAD;
    extent.ur.lon += DOMAIN_PAD;

    extent
}

/// Maps coordinates in a rectangular domain to their distance along a Hilbert curve.
#[derive(Debug)]
struct HilbertCurve {
    /// Bits per axis, at most 31.
    order: u32,
    domain: BoundingBox,
    width: f64,
    height: f64,
}

impl HilbertCurve {
    fn new(order: u32, domain: BoundingBox) -> Self {
        debug_assert!((1..=31).contains(&order));

        let width = domain.ur.lon - domain.ll.lon;
        let height = domain.ur.lat - domain.ll.lat;
        debug_assert!(width > 0.0 && height > 0.0);

        HilbertCurve {
            order,
            domain,
            width,
            height,
        }
    }

    fn side(&self) -> u64 {
        1u64 << self.order
    }

    /// The grid cell a coordinate falls in, longitude along x. Points on the far edges of the
    /// domain go in the last cell.
    fn cell_of(&self, coord: Coord) -> (u64, u64) {
        let side = self.side();
        let max_cell = side - 1;

        let x = ((coord.lon - self.domain.ll.lon) / self.width * side as f64) as u64;
        let y = ((coord.lat - self.domain.ll.lat) / self.height * side as f64) as u64;

        (x.min(max_cell), y.min(max_cell))
    }

    fn distance_of(&self, coord: Coord) -> u64 {
        let (x, y) = self.cell_of(coord);
        self.cell_to_distance(x, y)
    }

    fn cell_to_distance(&self, mut x: u64, mut y: u64) -> u64 {
        let side = self.side();

        let mut dist = 0;
        let mut s = side / 2;
        while s > 0 {
            let rx = u64::from(x & s != 0);
            let ry = u64::from(y & s != 0);
            dist += s * s * ((3 * rx) ^ ry);

            rotate(side, &mut x, &mut y, rx, ry);
            s /= 2;
        }

        dist
    }

    #[cfg(test)]
    fn distance_to_cell(&self, dist: u64) -> (u64, u64) {
        let side = self.side();

        let (mut x, mut y) = (0, 0);
        let mut t = dist;
        let mut s = 1;
        while s < side {
            let rx = 1 & (t / 2);
            let ry = 1 & (t ^ rx);

            rotate(s, &mut x, &mut y, rx, ry);
            x += s * rx;
            y += s * ry;

            t /= 4;
            s *= 2;
        }

        (x, y)
    }
}

/// Rotate and flip a quadrant so the sub-curve in it has the right orientation.
fn rotate(n: u64, x: &mut u64, y: &mut u64, rx: u64, ry: u64) {
    if ry == 0 {
        if rx == 1 {
            *x = n - 1 - *x;
            *y = n - 1 - *y;
        }

        std::mem::swap(x, y);
    }
}
