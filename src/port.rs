/*!
 * Decide which clusters are ports and summarize them.
 *
 * A spatial cluster only counts as a port if enough different vessels were seen sitting in it. A
 * couple of vessels loitering together is not a port. Clusters that fail the test are folded back
 * into the noise.
 */

use crate::{
    geo::great_circle_distance,
    report::{ClusterAssignment, ClusterId, VesselId, NOISE_CLUSTER_ID},
};
use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
use std::fmt::{self, Display};

/// The minimum number of distinct vessels in a cluster for it to be considered a port.
pub const MIN_VESSELS_PER_PORT: usize = 3;

/// The aggregate properties of a cluster that was accepted as a port.
#[derive(Debug, Clone, PartialEq)]
pub struct PortCluster {
    pub cluster_id: ClusterId,
    /// Average latitude of the reports in the cluster.
    pub centroid_latitude: f64,
    /// Average longitude of the reports in the cluster.
    pub centroid_longitude: f64,
    /// The number of distinct vessels seen in the cluster.
    pub vessel_count: usize,
    /// The number of reports in the cluster.
    pub report_count: usize,
    /// The distance from the centroid to the farthest report in the cluster in kilometers.
    pub radius_km: f64,
}

/// Bookkeeping for a validation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    /// Clusters handed in by the clustering stage.
    pub candidates: usize,
    pub retained: usize,
    pub rejected: usize,
    /// Noise points handed in by the clustering stage.
    pub initial_noise: usize,
    /// Noise points after rejected clusters were folded in.
    pub noise: usize,
}

impl Display for ValidationStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "  candidate clusters: {:>12}", self.candidates)?;
        writeln!(f, "               ports: {:>12}", self.retained)?;
        writeln!(f, "   rejected clusters: {:>12}", self.rejected)?;
        writeln!(f, "   noise (clustered): {:>12}", self.initial_noise)?;
        write!(f, "  noise (validated): {:>12}", self.noise)
    }
}

/// The ports found and the reports they were built from.
#[derive(Debug, Clone)]
pub struct PortSummary {
    /// Sorted by cluster id.
    pub ports: Vec<PortCluster>,
    /// Every report, with the reports from rejected clusters relabeled as noise.
    pub assignments: Vec<ClusterAssignment>,
    pub stats: ValidationStats,
}

impl PortSummary {
    /// The reports that aren't part of any port.
    pub fn noise(&self) -> impl Iterator<Item = &ClusterAssignment> {
        self.assignments.iter().filter(|a| a.is_noise())
    }

    /// Look up a port by its cluster id.
    pub fn port(&self, cluster_id: ClusterId) -> Option<&PortCluster> {
        self.ports
            .binary_search_by_key(&cluster_id, |p| p.cluster_id)
            .ok()
            .map(|i| &self.ports[i])
    }
}

#[derive(Default)]
struct Members {
    vessels: HashSet<VesselId>,
    lat_sum: f64,
    lon_sum: f64,
    count: usize,
}

/**
 * Keep the clusters with at least `min_vessels` distinct vessels and summarize them.
 *
 * #Arguments
 * assignments - every report with the label given to it by the clustering stage.
 * min_vessels - the number of distinct vessels needed for a cluster to be a port.
 *
 * #Returns
 * A [PortSummary] with one [PortCluster] per retained cluster. Reports from rejected clusters are
 * relabeled as noise in the returned assignments.
 */
pub fn validate_clusters(
    mut assignments: Vec<ClusterAssignment>,
    min_vessels: usize,
) -> PortSummary {
    let mut clusters: HashMap<ClusterId, Members> = HashMap::default();
    let mut initial_noise = 0;

    for assignment in &assignments {
        if assignment.is_noise() {
            initial_noise += 1;
            continue;
        }

        let members = clusters.entry(assignment.cluster_id).or_default();
        members.vessels.insert(assignment.report.vessel_id);
        members.lat_sum += assignment.report.latitude;
        members.lon_sum += assignment.report.longitude;
        members.count += 1;
    }

    let candidates = clusters.len();
    clusters.retain(|_, members| members.vessels.len() >= min_vessels);

    let mut ports: Vec<PortCluster> = clusters
        .iter()
        .map(|(&cluster_id, members)| PortCluster {
            cluster_id,
            centroid_latitude: members.lat_sum / members.count as f64,
            centroid_longitude: members.lon_sum / members.count as f64,
            vessel_count: members.vessels.len(),
            report_count: members.count,
            radius_km: 0.0,
        })
        .collect();
    ports.sort_unstable_by_key(|p| p.cluster_id);

    let port_index: HashMap<ClusterId, usize> = ports
        .iter()
        .enumerate()
        .map(|(i, p)| (p.cluster_id, i))
        .collect();

    let mut noise = 0;
    for assignment in assignments.iter_mut() {
        match port_index.get(&assignment.cluster_id) {
            Some(&i) => {
                let port = &mut ports[i];
                let dist = great_circle_distance(
                    assignment.report.latitude,
                    assignment.report.longitude,
                    port.centroid_latitude,
                    port.centroid_longitude,
                );
                port.radius_km = port.radius_km.max(dist);
            }
            None => {
                assignment.cluster_id = NOISE_CLUSTER_ID;
                noise += 1;
            }
        }
    }

    let stats = ValidationStats {
        candidates,
        retained: ports.len(),
        rejected: candidates - ports.len(),
        initial_noise,
        noise,
    };

    PortSummary {
        ports,
        assignments,
        stats,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::report::{CleanedReport, NavigationalStatus};
    use chrono::{TimeZone, Utc};

    fn assigned(vessel_id: u32, lat: f64, lon: f64, cluster_id: ClusterId) -> ClusterAssignment {
        ClusterAssignment {
            report: CleanedReport {
                vessel_id,
                timestamp: Utc.timestamp_opt(1_740_787_200, 0).unwrap(),
                latitude: lat,
                longitude: lon,
                speed: 0.0,
                destination: String::new(),
                navigational_status: NavigationalStatus::Moored,
            },
            cluster_id,
        }
    }

    #[test]
    fn test_diverse_cluster_is_kept() {
        let input = vec![
            assigned(1, 55.00, 10.00, 4),
            assigned(2, 55.01, 10.00, 4),
            assigned(3, 55.02, 10.03, 4),
            assigned(3, 55.03, 10.01, 4),
            assigned(9, 50.00, 1.00, NOISE_CLUSTER_ID),
        ];

        let summary = validate_clusters(input, MIN_VESSELS_PER_PORT);
        assert_eq!(summary.ports.len(), 1);

        let port = summary.port(4).unwrap();
        assert_eq!(port.vessel_count, 3);
        assert_eq!(port.report_count, 4);
        assert!((port.centroid_latitude - 55.015).abs() < 1.0e-12);
        assert!((port.centroid_longitude - 10.01).abs() < 1.0e-12);

        let farthest = [(55.00, 10.00), (55.01, 10.00), (55.02, 10.03), (55.03, 10.01)]
            .iter()
            .map(|&(lat, lon)| {
                great_circle_distance(lat, lon, port.centroid_latitude, port.centroid_longitude)
            })
            .fold(0.0, f64::max);
        assert!((port.radius_km - farthest).abs() < 1.0e-9);
        assert!(port.radius_km > 1.7 && port.radius_km < 1.9);

        assert_eq!(summary.noise().count(), 1);
        assert_eq!(summary.stats.candidates, 1);
        assert_eq!(summary.stats.retained, 1);
        assert_eq!(summary.stats.rejected, 0);
    }

    #[test]
    fn test_repeat_visits_do_not_count_as_diversity() {
        let input = vec![
            assigned(1, 55.00, 10.00, 0),
            assigned(1, 55.01, 10.00, 0),
            assigned(2, 55.02, 10.00, 0),
            assigned(2, 55.00, 10.01, 0),
            assigned(5, 40.00, 3.00, 1),
            assigned(6, 40.00, 3.01, 1),
            assigned(7, 40.01, 3.00, 1),
        ];

        let summary = validate_clusters(input, MIN_VESSELS_PER_PORT);

        assert_eq!(summary.ports.len(), 1);
        assert_eq!(summary.ports[0].cluster_id, 1);
        assert!(summary.port(0).is_none());

        // The rejected cluster's points are noise now.
        let noise: Vec<_> = summary.noise().map(|a| a.report.vessel_id).collect();
        assert_eq!(noise, vec![1, 1, 2, 2]);

        assert_eq!(summary.stats.candidates, 2);
        assert_eq!(summary.stats.rejected, 1);
        assert_eq!(summary.stats.initial_noise, 0);
        assert_eq!(summary.stats.noise, 4);
    }

    #[test]
    fn test_nothing_to_validate() {
        let summary = validate_clusters(vec![], MIN_VESSELS_PER_PORT);
        assert!(summary.ports.is_empty());
        assert!(summary.assignments.is_empty());
        assert_eq!(summary.stats, ValidationStats::default());
    }
}
