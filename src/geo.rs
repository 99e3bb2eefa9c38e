/*!
 * Geographic calculations.
 *
 * Simple spherical-earth geometry for working with vessel positions, and a static R-tree for
 * finding the neighbors of a position quickly.
 */
use std::fmt::{self, Display};

pub use hilbert_rtree::Hilbert2DRTree;

mod hilbert_rtree;

/// Mean earth radius used for converting between kilometers and angles.
pub const EARTH_RADIUS_KM: f64 = 6371.0090;

const DEG2RAD: f64 = 2.0 * std::f64::consts::PI / 360.0;
const RAD2DEG: f64 = 360.0 / (2.0 * std::f64::consts::PI);

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

impl Coord {
    pub fn new(lat: f64, lon: f64) -> Self {
        Coord { lat, lon }
    }

    /// Check whether the coordinates are within `eps` degrees of each other.
    pub fn is_close(&self, other: Coord, eps: f64) -> bool {
        (self.lat - other.lat).abs() <= eps && (self.lon - other.lon).abs() <= eps
    }
}

/// A latitude-longitude aligned rectangle given by its lower left and upper right corners.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    pub ll: Coord,
    pub ur: Coord,
}

impl Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(
            f,
            "({:.6}, {:.6}) -> ({:.6}, {:.6})",
            self.ll.lat, self.ll.lon, self.ur.lat, self.ur.lon
        )
    }
}

impl BoundingBox {
    /// A box with zero area at a single point.
    pub fn from_point(coord: Coord) -> Self {
        BoundingBox {
            ll: coord,
            ur: coord,
        }
    }

    /// An "empty" box, anything expanded into it replaces it.
    pub fn inverted() -> Self {
        BoundingBox {
            ll: Coord {
                lat: f64::INFINITY,
                lon: f64::INFINITY,
            },
            ur: Coord {
                lat: -f64::INFINITY,
                lon: -f64::INFINITY,
            },
        }
    }

    /// Grow this box so it also covers `other`.
    pub fn expand_to_cover(&mut self, other: &BoundingBox) {
        self.ll.lat = self.ll.lat.min(other.ll.lat);
        self.ll.lon = self.ll.lon.min(other.ll.lon);
        self.ur.lat = self.ur.lat.max(other.ur.lat);
        self.ur.lon = self.ur.lon.max(other.ur.lon);
    }

    /// Check if two boxes overlap, treating boxes within `eps` degrees of each other as touching.
    pub fn overlap(&self, other: &BoundingBox, eps: f64) -> bool {
        !(self.ll.lat > other.ur.lat + eps
            || self.ur.lat < other.ll.lat - eps
            || self.ll.lon > other.ur.lon + eps
            || self.ur.lon < other.ll.lon - eps)
    }

    pub fn contains(&self, coord: Coord) -> bool {
        coord.lat >= self.ll.lat
            && coord.lat <= self.ur.lat
            && coord.lon >= self.ll.lon
            && coord.lon <= self.ur.lon
    }

    /**
     * Get the boxes that enclose every point within `angular_radius` radians of `center`.
     *
     * The boxes are conservative, they may cover some points farther away than the radius, but
     * never miss one that is closer. When the circle crosses the antimeridian the area is split
     * into two boxes, one on each side. When it reaches a pole it covers all longitudes.
     */
    pub fn around(center: Coord, angular_radius: f64) -> Vec<BoundingBox> {
        // Slack for rounding, the exact distance check happens later anyway.
        let angular_radius = angular_radius * (1.0 + 1.0e-9);
        let radius_deg = angular_radius * RAD2DEG;

        let min_lat = center.lat - radius_deg;
        let max_lat = center.lat + radius_deg;

        if min_lat <= -90.0 || max_lat >= 90.0 {
            return vec![BoundingBox {
                ll: Coord::new(min_lat.max(-90.0), -180.0),
                ur: Coord::new(max_lat.min(90.0), 180.0),
            }];
        }

        // Widest longitude span of a small circle on the sphere.
        let ratio = f64::sin(angular_radius) / f64::cos(center.lat * DEG2RAD);
        if !(ratio < 1.0) {
            return vec![BoundingBox {
                ll: Coord::new(min_lat, -180.0),
                ur: Coord::new(max_lat, 180.0),
            }];
        }

        let delta_lon = f64::asin(ratio) * RAD2DEG;
        let min_lon = center.lon - delta_lon;
        let max_lon = center.lon + delta_lon;

        if min_lon < -180.0 {
            vec![
                BoundingBox {
                    ll: Coord::new(min_lat, min_lon + 360.0),
                    ur: Coord::new(max_lat, 180.0),
                },
                BoundingBox {
                    ll: Coord::new(min_lat, -180.0),
                    ur: Coord::new(max_lat, max_lon),
                },
            ]
        } else if max_lon > 180.0 {
            vec![
                BoundingBox {
                    ll: Coord::new(min_lat, min_lon),
                    ur: Coord::new(max_lat, 180.0),
                },
                BoundingBox {
                    ll: Coord::new(min_lat, -180.0),
                    ur: Coord::new(max_lat, max_lon - 360.0),
                },
            ]
        } else {
            vec![BoundingBox {
                ll: Coord::new(min_lat, min_lon),
                ur: Coord::new(max_lat, max_lon),
            }]
        }
    }
}

/// Anything that can be placed in a [Hilbert2DRTree].
pub trait Geo {
    fn centroid(&self) -> Coord;
    fn bounding_box(&self) -> BoundingBox;
}

impl Geo for Coord {
    fn centroid(&self) -> Coord {
        *self
    }

    fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_point(*self)
    }
}

/**
 * The central angle between two points on a sphere (the haversine formula).
 *
 * #Arguments
 * * a - the first point in degrees.
 * * b - the second point in degrees.
 *
 * #Returns
 * The angle between the points in radians. Swapping the arguments gives exactly the same value.
 */
pub fn great_circle_angle(a: Coord, b: Coord) -> f64 {
    let lat1_r = a.lat * DEG2RAD;
    let lon1_r = a.lon * DEG2RAD;
    let lat2_r = b.lat * DEG2RAD;
    let lon2_r = b.lon * DEG2RAD;

    let dlat2 = (lat2_r - lat1_r) / 2.0;
    let dlon2 = (lon2_r - lon1_r) / 2.0;

    let sin2_dlat = f64::powi(f64::sin(dlat2), 2);
    let sin2_dlon = f64::powi(f64::sin(dlon2), 2);

    let h = sin2_dlat + sin2_dlon * (f64::cos(lat1_r) * f64::cos(lat2_r));

    2.0 * f64::asin(f64::sqrt(h.min(1.0)))
}

/**
 * the simple great circle distance calculation.
 *
 * #Arguments
 * * lat1 - the latitude of the first point in degrees.
 * * lon1 - the longitude of the first point in degrees.
 * * lat2 - the latitude of the second point in degrees.
 * * lon2 - the longitude of the second point in degrees.
 *
 * #Returns
 * The distance between the points in kilometers.
 */
pub fn great_circle_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    great_circle_angle(Coord::new(lat1, lon1), Coord::new(lat2, lon2)) * EARTH_RADIUS_KM
}
