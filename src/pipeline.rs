/*!
 * Run the stages end to end.
 *
 * None of the stages log. Each returns its bookkeeping alongside its results and it is up to the
 * caller to report it.
 */

use crate::{
    cluster::{assign_clusters, ClusterStats, DbscanParams},
    filter::{clean_reports, CleanConfig, CleanOutput},
    ingest::RawReportReader,
    port::{validate_clusters, PortSummary, MIN_VESSELS_PER_PORT},
    report::CleanedReport,
    store, PortFindResult,
};
use std::{
    fmt::{self, Display},
    path::Path,
};

/// Everything that can be tuned about a run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub clean: CleanConfig,
    pub dbscan: DbscanParams,
    /// Distinct vessels needed for a cluster to count as a port.
    pub min_vessels: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            clean: CleanConfig::default(),
            dbscan: DbscanParams::default(),
            min_vessels: MIN_VESSELS_PER_PORT,
        }
    }
}

impl Display for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "  max speed (knots): {}", self.clean.max_speed_knots)?;
        writeln!(f, "         partitions: {}", self.clean.partitions)?;
        writeln!(f, "       epsilon (km): {}", self.dbscan.epsilon_km)?;
        writeln!(f, "        min samples: {}", self.dbscan.min_samples)?;
        write!(f, "        min vessels: {}", self.min_vessels)
    }
}

/// The ports found along with what the clustering stage saw before validation.
#[derive(Debug, Clone)]
pub struct PortRun {
    pub cluster_stats: ClusterStats,
    pub summary: PortSummary,
}

/**
 * Clean a raw AIS file (CSV or zipped CSV) and write the survivors to `output` as a cleaned
 * reports file.
 */
pub fn clean_file<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
    config: &CleanConfig,
) -> PortFindResult<CleanOutput> {
    let reader = RawReportReader::open(input)?;
    let cleaned = clean_reports(reader, config)?;

    store::write_cleaned_reports(output, &cleaned.reports)?;

    Ok(cleaned)
}

/// Cluster cleaned reports and keep the clusters that qualify as ports.
pub fn find_ports(reports: Vec<CleanedReport>, config: &PipelineConfig) -> PortRun {
    let clustered = assign_clusters(reports, &config.dbscan);
    let summary = validate_clusters(clustered.assignments, config.min_vessels);

    PortRun {
        cluster_stats: clustered.stats,
        summary,
    }
}

/// Load a cleaned reports file and find the ports in it.
pub fn find_ports_in_file<P: AsRef<Path>>(
    path: P,
    config: &PipelineConfig,
) -> PortFindResult<PortRun> {
    let reports = store::read_cleaned_reports(path)?;
    Ok(find_ports(reports, config))
}
