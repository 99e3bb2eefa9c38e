/*!
 * CSV files passed between the stages and handed to whoever consumes the results.
 *
 * The cleaned reports file is the contract between cleaning and clustering. It is our own
 * artifact, so reading it back is strict: any missing column or bad value is an error.
 *
 * Every file is written under a temporary name and renamed into place once it is complete, so a
 * failed run never leaves a partial file behind.
 */

use crate::{
    port::PortCluster,
    report::{CleanedReport, ClusterAssignment, NavigationalStatus},
    PortFindResult,
};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::{
    fs::File,
    io::{BufWriter, Read, Write},
    path::{Path, PathBuf},
};

/// Column names of the cleaned reports file.
pub const CLEANED_COLUMNS: [&str; 7] = [
    "MMSI",
    "Timestamp",
    "Latitude",
    "Longitude",
    "Speed",
    "Destination",
    "Navigational status",
];

/// The extra column holding the cluster label in the labeled reports file.
pub const CLUSTER_COLUMN: &str = "Port cluster";

/// Column names of the ports file.
pub const PORT_COLUMNS: [&str; 6] = [
    "cluster_id",
    "centroid_latitude",
    "centroid_longitude",
    "vessel_count",
    "report_count",
    "radius_km",
];

const CLEANED_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn cleaned_fields(report: &CleanedReport) -> [String; 7] {
    [
        report.vessel_id.to_string(),
        report.timestamp.format(CLEANED_TIME_FORMAT).to_string(),
        report.latitude.to_string(),
        report.longitude.to_string(),
        report.speed.to_string(),
        report.destination.clone(),
        report.navigational_status.name().to_owned(),
    ]
}

/// Write cleaned reports as CSV.
pub fn write_cleaned<W: Write>(wtr: W, reports: &[CleanedReport]) -> PortFindResult<()> {
    let mut wtr = csv::Writer::from_writer(wtr);

    wtr.write_record(CLEANED_COLUMNS)?;
    for report in reports {
        wtr.write_record(cleaned_fields(report))?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write reports with their cluster labels as CSV.
pub fn write_assignments<W: Write>(wtr: W, assignments: &[ClusterAssignment]) -> PortFindResult<()> {
    let mut wtr = csv::Writer::from_writer(wtr);

    wtr.write_record(CLEANED_COLUMNS.iter().chain(std::iter::once(&CLUSTER_COLUMN)))?;
    for assignment in assignments {
        let fields = cleaned_fields(&assignment.report);
        let label = assignment.cluster_id.to_string();
        wtr.write_record(fields.iter().chain(std::iter::once(&label)))?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write the port summaries as CSV.
pub fn write_ports<W: Write>(wtr: W, ports: &[PortCluster]) -> PortFindResult<()> {
    let mut wtr = csv::Writer::from_writer(wtr);

    wtr.write_record(PORT_COLUMNS)?;
    for port in ports {
        wtr.write_record([
            port.cluster_id.to_string(),
            port.centroid_latitude.to_string(),
            port.centroid_longitude.to_string(),
            port.vessel_count.to_string(),
            port.report_count.to_string(),
            format!("{:.3}", port.radius_km),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/**
 * Read cleaned reports written by [write_cleaned].
 *
 * Columns are located by name so their order doesn't matter, but all of them must be present and
 * every value must parse.
 */
pub fn read_cleaned<R: Read>(rdr: R) -> PortFindResult<Vec<CleanedReport>> {
    let mut rdr = csv::Reader::from_reader(rdr);

    let headers = rdr.headers()?;
    let mut cols = [0usize; 7];
    for (col, name) in cols.iter_mut().zip(CLEANED_COLUMNS) {
        *col = headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| format!("cleaned reports missing column: {}", name))?;
    }

    let mut reports = vec![];
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let field = |i: usize| {
            record
                .get(cols[i])
                .ok_or_else(|| format!("line {}: missing {}", line, CLEANED_COLUMNS[i]))
        };
        let bad = |i: usize| format!("line {}: invalid {}", line, CLEANED_COLUMNS[i]);

        let status = field(6)?;
        reports.push(CleanedReport {
            vessel_id: field(0)?.parse().map_err(|_| bad(0))?,
            timestamp: parse_cleaned_timestamp(field(1)?).ok_or_else(|| bad(1))?,
            latitude: field(2)?.parse().map_err(|_| bad(2))?,
            longitude: field(3)?.parse().map_err(|_| bad(3))?,
            speed: field(4)?.parse().map_err(|_| bad(4))?,
            destination: field(5)?.to_owned(),
            navigational_status: NavigationalStatus::from_feed_text(status)
                .ok_or_else(|| bad(6))?,
        });
    }

    Ok(reports)
}

fn parse_cleaned_timestamp(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, CLEANED_TIME_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Read a cleaned reports file.
pub fn read_cleaned_reports<P: AsRef<Path>>(path: P) -> PortFindResult<Vec<CleanedReport>> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|err| format!("unable to open {}: {}", path.display(), err))?;

    read_cleaned(std::io::BufReader::new(file))
}

/// Write a cleaned reports file.
pub fn write_cleaned_reports<P: AsRef<Path>>(
    path: P,
    reports: &[CleanedReport],
) -> PortFindResult<()> {
    write_atomically(path.as_ref(), |wtr| write_cleaned(wtr, reports))
}

/// Write a labeled reports file.
pub fn write_assignments_file<P: AsRef<Path>>(
    path: P,
    assignments: &[ClusterAssignment],
) -> PortFindResult<()> {
    write_atomically(path.as_ref(), |wtr| write_assignments(wtr, assignments))
}

/// Write a ports file.
pub fn write_ports_file<P: AsRef<Path>>(path: P, ports: &[PortCluster]) -> PortFindResult<()> {
    write_atomically(path.as_ref(), |wtr| write_ports(wtr, ports))
}

fn write_atomically<F>(path: &Path, write: F) -> PortFindResult<()>
where
    F: FnOnce(&mut BufWriter<File>) -> PortFindResult<()>,
{
    let tmp_path = partial_path(path);

    let result = write_then_rename(&tmp_path, path, write);
    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
    }

    result
}

fn write_then_rename<F>(tmp_path: &Path, path: &Path, write: F) -> PortFindResult<()>
where
    F: FnOnce(&mut BufWriter<File>) -> PortFindResult<()>,
{
    let file = File::create(tmp_path)
        .map_err(|err| format!("unable to create {}: {}", tmp_path.display(), err))?;

    let mut wtr = BufWriter::new(file);
    write(&mut wtr)?;
    wtr.flush()?;
    drop(wtr);

    std::fs::rename(tmp_path, path)?;
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    path.with_file_name(name)
}
