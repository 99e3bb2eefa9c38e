/*!
 * Find ports from the places AIS vessels sit still.
 *
 * Vessels broadcast their position, speed, and navigational status over AIS. Reports from vessels
 * that are moored or at anchor pile up wherever there is a port. This crate cleans a raw AIS
 * archive down to those stationary reports, clusters them by great circle distance, and keeps the
 * clusters visited by enough different vessels to be a port.
 *
 * The stages are [clean_reports], [assign_clusters], and [validate_clusters]. [find_ports] and
 * [clean_file] string them together.
 */

pub use cluster::{
    assign_clusters, dbscan, ClusterOutput, ClusterStats, DbscanParams, SpatialIndex,
    DEFAULT_EPSILON_KM, DEFAULT_MIN_SAMPLES,
};
pub use error::{PortFindError, PortFindResult};
pub use filter::{
    check, clean_reports, deduplicate, position_cell, retain, CleanConfig, CleanOutput,
    CleanStats, DedupStats, DropReason, MAX_STATIONARY_SPEED_KNOTS,
};
pub use geo::{
    great_circle_angle, great_circle_distance, BoundingBox, Coord, Geo, EARTH_RADIUS_KM,
};
pub use ingest::{parse_raw_timestamp, RawReportReader};
pub use pipeline::{clean_file, find_ports, find_ports_in_file, PipelineConfig, PortRun};
pub use port::{validate_clusters, PortCluster, PortSummary, ValidationStats, MIN_VESSELS_PER_PORT};
pub use port_database::{AddPortsTransaction, PortsDatabase};
pub use report::{
    CleanedReport, ClusterAssignment, ClusterId, NavigationalStatus, PositionReport, VesselId,
    NOISE_CLUSTER_ID,
};
pub use store::{
    read_cleaned, read_cleaned_reports, write_assignments, write_assignments_file, write_cleaned,
    write_cleaned_reports, write_ports, write_ports_file,
};

/**************************************************************************************************
 * Private Implementation
 *************************************************************************************************/
mod cluster;
mod error;
mod filter;
mod geo;
mod ingest;
mod pipeline;
mod port;
mod port_database;
mod report;
mod store;
