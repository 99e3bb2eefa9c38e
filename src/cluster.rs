/*!
 * Types and functions for finding spatial clusters of stationary vessels.
 *
 * Clusters are found with density based clustering (DBSCAN) using the great circle distance
 * between reports. A report with enough neighbors nearby seeds a cluster, and the cluster grows
 * through every report reachable by a chain of such dense neighborhoods. Reports that aren't
 * reachable from any seed are noise.
 */

pub use dbscan::{
    assign_clusters, dbscan, ClusterOutput, ClusterStats, DbscanParams, DEFAULT_EPSILON_KM,
    DEFAULT_MIN_SAMPLES,
};
pub use spatial_index::SpatialIndex;

mod dbscan;
mod spatial_index;
