/*!
 * Filter noise out of raw position reports and remove duplicates.
 *
 * A report survives only if it is complete, has a valid position, the vessel is (nearly) not
 * moving, and it reports a status consistent with sitting in or near a port. The survivors are
 * then deduplicated twice: once on vessel and time, to drop re-broadcasts, and once on vessel and
 * a ~1 km grid cell, since a moored vessel repeats nearly the same position for hours.
 *
 * Both deduplication passes only compare reports from the same vessel, so the work is split
 * across threads by vessel id.
 */

use crate::{
    error::PortFindError,
    report::{CleanedReport, NavigationalStatus, PositionReport, VesselId},
    PortFindResult,
};
use chrono::{DateTime, Utc};
use crossbeam_channel::bounded;
use rustc_hash::FxHashSet as HashSet;
use std::{
    fmt::{self, Display},
    thread,
};

/// Vessels reporting a speed over ground at or above this (knots) are considered under way.
pub const MAX_STATIONARY_SPEED_KNOTS: f64 = 0.5;

const CHANNEL_SIZE: usize = 1024;

/// Settings for the cleaning stage.
#[derive(Debug, Clone)]
pub struct CleanConfig {
    /// Reports must have a speed strictly less than this, in knots.
    pub max_speed_knots: f64,
    /// Number of worker threads (and vessel id partitions) used for deduplication.
    pub partitions: usize,
}

impl Default for CleanConfig {
    fn default() -> Self {
        CleanConfig {
            max_speed_knots: MAX_STATIONARY_SPEED_KNOTS,
            partitions: num_cpus::get(),
        }
    }
}

/// Why a report was filtered out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Vessel id, time, position, or speed was missing or malformed.
    MissingField,
    /// Latitude or longitude out of range.
    OutOfRange,
    /// Too fast to be sitting in port.
    Moving,
    /// Missing, unrecognized, or not a stationary navigational status.
    NotStationary,
}

/**
 * Apply the cleaning predicate to a single report.
 *
 * On success the report is narrowed to a [CleanedReport], otherwise the reason it was rejected is
 * returned.
 */
pub fn check(report: PositionReport, config: &CleanConfig) -> Result<CleanedReport, DropReason> {
    let PositionReport {
        vessel_id,
        timestamp,
        latitude,
        longitude,
        speed,
        destination,
        navigational_status,
    } = report;

    let (vessel_id, timestamp, latitude, longitude, speed) =
        match (vessel_id, timestamp, latitude, longitude, speed) {
            (Some(v), Some(t), Some(lat), Some(lon), Some(s)) => (v, t, lat, lon, s),
            _ => return Err(DropReason::MissingField),
        };

    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(DropReason::OutOfRange);
    }

    if !(speed < config.max_speed_knots) {
        return Err(DropReason::Moving);
    }

    let navigational_status = navigational_status
        .as_deref()
        .and_then(NavigationalStatus::from_feed_text)
        .filter(NavigationalStatus::is_stationary)
        .ok_or(DropReason::NotStationary)?;

    Ok(CleanedReport {
        vessel_id,
        timestamp,
        latitude,
        longitude,
        speed,
        destination: destination.unwrap_or_default(),
        navigational_status,
    })
}

/// Apply the cleaning predicate, keeping the report if it passes.
pub fn retain(report: PositionReport, config: &CleanConfig) -> Option<CleanedReport> {
    check(report, config).ok()
}

/**
 * The ~1 km grid cell a position falls in: the coordinates rounded to 2 decimal places.
 *
 * Rounding is half up (away from zero) on the shortest decimal text of the value, so `1.005` is
 * in cell `101` even though the nearest double is slightly below 1.005.
 */
pub fn position_cell(latitude: f64, longitude: f64) -> (i64, i64) {
    (hundredths(latitude), hundredths(longitude))
}

/// `x` in hundredths, rounded half up on its decimal text.
fn hundredths(x: f64) -> i64 {
    let text = format!("{}", x.abs());
    let (whole, frac) = text.split_once('.').unwrap_or((text.as_str(), ""));

    let whole = match whole.parse::<i64>() {
        Ok(whole) => whole,
        Err(_) => return (x * 100.0).round() as i64,
    };

    let mut digits = frac.bytes().map(|d| i64::from(d - b'0'));
    let tenths = digits.next().unwrap_or(0);
    let hundredths = digits.next().unwrap_or(0);
    let round_up = digits.next().map_or(false, |d| d >= 5);

    let magnitude = whole * 100 + tenths * 10 + hundredths + i64::from(round_up);
    if x.is_sign_negative() {
        -magnitude
    } else {
        magnitude
    }
}

/// Counts of reports removed by each deduplication pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupStats {
    pub duplicate_times: usize,
    pub duplicate_positions: usize,
}

/**
 * Run both deduplication passes over a set of cleaned reports.
 *
 * 1. One report per vessel and timestamp, the first one in input order wins.
 * 2. One report per vessel and grid cell (see [position_cell]), the earliest one wins.
 *
 * The output is sorted by vessel id and then timestamp.
 */
pub fn deduplicate(mut reports: Vec<CleanedReport>) -> (Vec<CleanedReport>, DedupStats) {
    let mut stats = DedupStats::default();

    let start = reports.len();
    let mut seen_times: HashSet<(VesselId, DateTime<Utc>)> = HashSet::default();
    reports.retain(|r| seen_times.insert((r.vessel_id, r.timestamp)));
    stats.duplicate_times = start - reports.len();

    // Keys are unique now, so this order is total.
    reports.sort_unstable_by_key(|r| (r.vessel_id, r.timestamp));

    let start = reports.len();
    let mut seen_cells: HashSet<(VesselId, (i64, i64))> = HashSet::default();
    reports.retain(|r| seen_cells.insert((r.vessel_id, position_cell(r.latitude, r.longitude))));
    stats.duplicate_positions = start - reports.len();

    (reports, stats)
}

/// Bookkeeping for a run of the cleaning stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanStats {
    pub read: usize,
    pub missing_field: usize,
    pub out_of_range: usize,
    pub moving: usize,
    pub not_stationary: usize,
    pub duplicate_times: usize,
    pub duplicate_positions: usize,
    pub kept: usize,
}

impl CleanStats {
    fn count_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::MissingField => self.missing_field += 1,
            DropReason::OutOfRange => self.out_of_range += 1,
            DropReason::Moving => self.moving += 1,
            DropReason::NotStationary => self.not_stationary += 1,
        }
    }

    fn add_dedup(&mut self, dedup: DedupStats) {
        self.duplicate_times += dedup.duplicate_times;
        self.duplicate_positions += dedup.duplicate_positions;
    }
}

impl Display for CleanStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "              read: {:>12}", self.read)?;
        writeln!(f, "     missing field: {:>12}", self.missing_field)?;
        writeln!(f, "      out of range: {:>12}", self.out_of_range)?;
        writeln!(f, "            moving: {:>12}", self.moving)?;
        writeln!(f, "    not stationary: {:>12}", self.not_stationary)?;
        writeln!(f, "   duplicate times: {:>12}", self.duplicate_times)?;
        writeln!(f, "duplicate position: {:>12}", self.duplicate_positions)?;
        write!(f, "              kept: {:>12}", self.kept)
    }
}

/// The result of the cleaning stage.
#[derive(Debug, Clone)]
pub struct CleanOutput {
    /// Sorted by vessel id and then timestamp.
    pub reports: Vec<CleanedReport>,
    pub stats: CleanStats,
}

/**
 * Filter and deduplicate a stream of position reports.
 *
 * The predicate runs on the calling thread as the reports are read. Survivors are routed to one of
 * `config.partitions` worker threads by vessel id, so every report for a vessel lands in the same
 * worker, and each worker deduplicates its share once the input is exhausted. The merged output
 * does not depend on the number of partitions.
 *
 * An `Err` from the input aborts the stage and is returned. An empty result is not an error.
 */
pub fn clean_reports<I>(reports: I, config: &CleanConfig) -> PortFindResult<CleanOutput>
where
    I: IntoIterator<Item = PortFindResult<PositionReport>>,
{
    let partitions = config.partitions.max(1);

    let mut to_workers = Vec::with_capacity(partitions);
    let mut workers = Vec::with_capacity(partitions);
    for i in 0..partitions {
        let (to_worker, from_reader) = bounded::<CleanedReport>(CHANNEL_SIZE);

        let jh = thread::Builder::new()
            .name(format!("portfind-dedup-{}", i))
            .spawn(move || deduplicate(from_reader.into_iter().collect()))?;

        to_workers.push(to_worker);
        workers.push(jh);
    }

    let mut stats = CleanStats::default();
    for report in reports {
        let report = report?;
        stats.read += 1;

        match check(report, config) {
            Ok(cleaned) => {
                let partition = cleaned.vessel_id as usize % partitions;
                to_workers[partition].send(cleaned).map_err(|_| PortFindError {
                    msg: "deduplication worker hung up",
                })?;
            }
            Err(reason) => stats.count_drop(reason),
        }
    }

    // Closing the channels tells the workers the input is done.
    drop(to_workers);

    let mut cleaned = Vec::new();
    for jh in workers {
        let (partition, dedup) = jh.join().map_err(|_| PortFindError {
            msg: "deduplication worker panicked",
        })?;

        cleaned.extend(partition);
        stats.add_dedup(dedup);
    }

    cleaned.sort_unstable_by_key(|r| (r.vessel_id, r.timestamp));
    stats.kept = cleaned.len();

    Ok(CleanOutput {
        reports: cleaned,
        stats,
    })
}
