use super::SpatialIndex;
use crate::{
    geo::Geo,
    report::{CleanedReport, ClusterAssignment, ClusterId, NOISE_CLUSTER_ID},
};
use std::{
    collections::VecDeque,
    fmt::{self, Display},
};

/// Default neighborhood radius, anchorages are rarely more than a few kilometers across.
pub const DEFAULT_EPSILON_KM: f64 = 3.0;

/// Default number of reports (including itself) a report needs within the radius to seed a
/// cluster.
pub const DEFAULT_MIN_SAMPLES: usize = 2;

/// Earth radius used to turn the neighborhood radius into an angle.
const CLUSTER_EARTH_RADIUS_KM: f64 = 6371.0;

/// Parameters for density based clustering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DbscanParams {
    /// Neighborhood radius in kilometers.
    pub epsilon_km: f64,
    /// Minimum neighborhood size, counting the point itself, for a point to be a core point.
    pub min_samples: usize,
}

impl Default for DbscanParams {
    fn default() -> Self {
        DbscanParams {
            epsilon_km: DEFAULT_EPSILON_KM,
            min_samples: DEFAULT_MIN_SAMPLES,
        }
    }
}

impl DbscanParams {
    /// The neighborhood radius as an angle in radians.
    pub fn angular_radius(&self) -> f64 {
        self.epsilon_km / CLUSTER_EARTH_RADIUS_KM
    }
}

/**
 * Label points with density based clusters.
 *
 * Returns one label per point, in the same order as `points`. Clusters are numbered from 0 in the
 * order their first core point appears in the input. Points that are not density reachable from
 * any core point get [NOISE_CLUSTER_ID].
 *
 * Core points that are reachable from each other always share a label. A border point (one that
 * is not a core point itself) within reach of two clusters joins whichever is expanded first.
 */
pub fn dbscan<T: Geo>(points: &[T], params: &DbscanParams) -> Vec<ClusterId> {
    let index = SpatialIndex::build(points);
    let radius = params.angular_radius();

    // None means not visited yet.
    let mut labels: Vec<Option<ClusterId>> = vec![None; points.len()];
    let mut next_cluster: ClusterId = 0;

    for i in 0..points.len() {
        if labels[i].is_some() {
            continue;
        }

        let neighbors = index.query_neighbors(i, radius);
        if neighbors.len() < params.min_samples {
            // May still be claimed as a border point by a later cluster.
            labels[i] = Some(NOISE_CLUSTER_ID);
            continue;
        }

        expand_cluster(&index, i, neighbors, next_cluster, params, &mut labels);
        next_cluster += 1;
    }

    labels
        .into_iter()
        .map(|label| label.unwrap_or(NOISE_CLUSTER_ID))
        .collect()
}

/**
 * Grow a cluster breadth first from a core point.
 *
 * Points are labeled with `cluster_id` as soon as they are reached, so each point is queued at
 * most once. Only points that turn out to be core points have their own neighborhoods added to the
 * search.
 */
fn expand_cluster<T: Geo>(
    index: &SpatialIndex<T>,
    seed: usize,
    seed_neighbors: Vec<usize>,
    cluster_id: ClusterId,
    params: &DbscanParams,
    labels: &mut [Option<ClusterId>],
) {
    let radius = params.angular_radius();

    labels[seed] = Some(cluster_id);
    let mut queue: VecDeque<usize> = VecDeque::new();
    claim(seed_neighbors, cluster_id, labels, &mut queue);

    while let Some(pnt) = queue.pop_front() {
        let neighbors = index.query_neighbors(pnt, radius);
        if neighbors.len() >= params.min_samples {
            claim(neighbors, cluster_id, labels, &mut queue);
        }
    }
}

/// Label the unclaimed points in `neighbors`, queueing the ones not visited before.
fn claim(
    neighbors: Vec<usize>,
    cluster_id: ClusterId,
    labels: &mut [Option<ClusterId>],
    queue: &mut VecDeque<usize>,
) {
    for n in neighbors {
        match labels[n] {
            None => {
                labels[n] = Some(cluster_id);
                queue.push_back(n);
            }
            // Already known not to be a core point, so it is a border point of this cluster.
            Some(NOISE_CLUSTER_ID) => labels[n] = Some(cluster_id),
            Some(_) => {}
        }
    }
}

/// Summary of a clustering run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterStats {
    pub points: usize,
    pub clusters: usize,
    pub noise: usize,
}

impl Display for ClusterStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "    points: {:>12}", self.points)?;
        writeln!(f, "  clusters: {:>12}", self.clusters)?;
        write!(f, "     noise: {:>12}", self.noise)
    }
}

/// The result of the clustering stage.
#[derive(Debug, Clone)]
pub struct ClusterOutput {
    /// In the same order as the input reports.
    pub assignments: Vec<ClusterAssignment>,
    pub stats: ClusterStats,
}

/// Assign every cleaned report to a cluster, or to noise.
pub fn assign_clusters(reports: Vec<CleanedReport>, params: &DbscanParams) -> ClusterOutput {
    let labels = dbscan(&reports, params);

    let stats = ClusterStats {
        points: labels.len(),
        clusters: labels
            .iter()
            .filter(|&&l| l != NOISE_CLUSTER_ID)
            .max()
            .map_or(0, |&l| l as usize + 1),
        noise: labels.iter().filter(|&&l| l == NOISE_CLUSTER_ID).count(),
    };

    let assignments = reports
        .into_iter()
        .zip(labels)
        .map(|(report, cluster_id)| ClusterAssignment { report, cluster_id })
        .collect();

    ClusterOutput { assignments, stats }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geo::Coord;

    fn params() -> DbscanParams {
        DbscanParams::default()
    }

    #[test]
    fn test_two_groups_and_noise() {
        let points = vec![
            Coord::new(55.000, 10.000),
            Coord::new(60.000, 5.000),
            Coord::new(55.005, 10.005),
            Coord::new(57.000, 8.000),
            Coord::new(60.004, 5.000),
            Coord::new(55.010, 10.000),
        ];

        let labels = dbscan(&points, &params());
        assert_eq!(labels, vec![0, 1, 0, NOISE_CLUSTER_ID, 1, 0]);
    }

    #[test]
    fn test_chain_is_one_cluster() {
        // Each point is ~2.2 km from the next, the ends are ~20 km apart.
        let points: Vec<Coord> = (0..10)
            .map(|i| Coord::new(55.0 + i as f64 * 0.02, 10.0))
            .collect();

        let labels = dbscan(&points, &params());
        assert!(labels.iter().all(|&l| l == 0));
    }

    #[test]
    fn test_epsilon_boundary() {
        // 0.03 degrees of latitude is about 3.34 km, too far apart.
        let points = vec![Coord::new(55.0, 10.0), Coord::new(55.03, 10.0)];
        assert_eq!(dbscan(&points, &params()), vec![NOISE_CLUSTER_ID; 2]);

        // 0.025 degrees is about 2.78 km.
        let points = vec![Coord::new(55.0, 10.0), Coord::new(55.025, 10.0)];
        assert_eq!(dbscan(&points, &params()), vec![0, 0]);
    }

    #[test]
    fn test_border_point_claimed_after_noise() {
        let p = DbscanParams {
            epsilon_km: 3.0,
            min_samples: 3,
        };

        // The first point only has one neighbor so it is not a core point and is visited first,
        // but the middle point is a core point that reaches it.
        let points = vec![
            Coord::new(55.000, 10.0),
            Coord::new(55.020, 10.0),
            Coord::new(55.040, 10.0),
        ];

        assert_eq!(dbscan(&points, &p), vec![0, 0, 0]);
    }

    #[test]
    fn test_no_points() {
        let points: Vec<Coord> = vec![];
        assert!(dbscan(&points, &params()).is_empty());

        let out = assign_clusters(vec![], &params());
        assert!(out.assignments.is_empty());
        assert_eq!(out.stats, ClusterStats::default());
    }

    #[test]
    fn test_dense_cluster_at_one_spot() {
        // Every point is a neighbor of every other one.
        let points: Vec<Coord> = (0..3_000)
            .map(|i| Coord::new(57.7 + (i % 50) as f64 * 1.0e-4, 11.9 + (i / 50) as f64 * 1.0e-4))
            .collect();

        let labels = dbscan(&points, &params());
        assert_eq!(labels.len(), points.len());
        assert!(labels.iter().all(|&l| l == 0));
    }

    #[test]
    fn test_each_point_queued_once() {
        let mut labels = vec![None; 200];
        let mut queue = VecDeque::new();
        claim((0..200).collect(), 0, &mut labels, &mut queue);
        claim((0..200).collect(), 0, &mut labels, &mut queue);

        assert_eq!(queue.len(), 200);
        assert!(labels.iter().all(|&l| l == Some(0)));
    }

    #[test]
    fn test_single_point_is_noise() {
        let points = vec![Coord::new(1.0, 1.0)];
        assert_eq!(dbscan(&points, &params()), vec![NOISE_CLUSTER_ID]);
    }
}
