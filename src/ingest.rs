/*!
 * Read raw AIS position reports.
 *
 * The input is a CSV file with a header row, as published in the Danish Maritime Authority daily
 * dumps, or a zip archive holding one. The columns we need are located by name and every value is
 * coerced to its type. Values that fail to parse are treated as missing rather than as errors,
 * since AIS feeds are full of junk. A missing column or an unreadable file is an error.
 */

use crate::{
    error::PortFindError,
    report::{PositionReport, VesselId},
    PortFindResult,
};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::{
    fs::File,
    io::{self, BufReader, Read, Seek, SeekFrom},
    path::Path,
};

/// Timestamp format used in the raw feed.
const RAW_TIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Column positions of the fields we use.
#[derive(Debug, Clone, Copy)]
struct RawColumns {
    timestamp: usize,
    vessel_id: usize,
    latitude: usize,
    longitude: usize,
    speed: usize,
    destination: usize,
    navigational_status: usize,
}

impl RawColumns {
    fn from_headers(headers: &csv::StringRecord) -> PortFindResult<Self> {
        let find = |names: &[&str]| -> PortFindResult<usize> {
            headers
                .iter()
                .position(|h| names.contains(&h.trim()))
                .ok_or_else(|| format!("missing required column: {}", names[0]).into())
        };

        Ok(RawColumns {
            timestamp: find(&["# Timestamp", "Timestamp"])?,
            vessel_id: find(&["MMSI"])?,
            latitude: find(&["Latitude"])?,
            longitude: find(&["Longitude"])?,
            speed: find(&["SOG"])?,
            destination: find(&["Destination"])?,
            navigational_status: find(&["Navigational status"])?,
        })
    }
}

/**
 * A streaming reader of raw position reports.
 *
 * Iterating yields one [PositionReport] per row. Rows the CSV parser cannot make sense of come
 * back with every field empty so the filter drops them like any other bad row. I/O errors end the
 * iteration with an `Err`.
 */
pub struct RawReportReader {
    rdr: csv::Reader<Box<dyn Read>>,
    columns: RawColumns,
    record: csv::StringRecord,
}

impl RawReportReader {
    /// Open a CSV file, or a zip archive with a CSV file in it.
    pub fn open<P: AsRef<Path>>(path: P) -> PortFindResult<Self> {
        let path = path.as_ref();

        let is_zip = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("zip"))
            .unwrap_or(false);

        let file = File::open(path)
            .map_err(|err| format!("unable to open {}: {}", path.display(), err))?;

        if is_zip {
            Self::open_zip(file)
        } else {
            Self::from_reader(BufReader::new(file))
        }
    }

    fn open_zip(file: File) -> PortFindResult<Self> {
        let mut zip = zip::ZipArchive::new(file)?;

        let csv_index = (0..zip.len())
            .find(|&i| {
                zip.by_index(i)
                    .map(|entry| entry.name().to_ascii_lowercase().ends_with(".csv"))
                    .unwrap_or(false)
            })
            .ok_or(PortFindError {
                msg: "zip archive does not contain a csv file",
            })?;

        // Rows are streamed from an anonymous temporary file, not held in memory.
        let mut csv_file = zip.by_index(csv_index)?;
        let mut unpacked = tempfile::tempfile()?;
        let _size_read = io::copy(&mut csv_file, &mut unpacked)?;
        let _ = unpacked.seek(SeekFrom::Start(0))?;

        Self::from_reader(BufReader::new(unpacked))
    }

    /// Read from anything that produces CSV text with a header row.
    pub fn from_reader<R: Read + 'static>(reader: R) -> PortFindResult<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(Box::new(reader) as Box<dyn Read>);

        let columns = RawColumns::from_headers(rdr.headers()?)?;

        Ok(RawReportReader {
            rdr,
            columns,
            record: csv::StringRecord::new(),
        })
    }

    fn parse_record(&self) -> PositionReport {
        let record = &self.record;
        let cols = &self.columns;

        let text = |idx: usize| record.get(idx).map(str::trim).filter(|s| !s.is_empty());

        PositionReport {
            vessel_id: text(cols.vessel_id).and_then(parse_vessel_id),
            timestamp: text(cols.timestamp).and_then(parse_raw_timestamp),
            latitude: text(cols.latitude).and_then(parse_float),
            longitude: text(cols.longitude).and_then(parse_float),
            speed: text(cols.speed).and_then(parse_float),
            destination: text(cols.destination).map(str::to_owned),
            navigational_status: text(cols.navigational_status).map(str::to_owned),
        }
    }
}

impl Iterator for RawReportReader {
    type Item = PortFindResult<PositionReport>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.rdr.read_record(&mut self.record) {
            Ok(true) => Some(Ok(self.parse_record())),
            Ok(false) => None,
            Err(err) if err.is_io_error() => Some(Err(err.into())),
            Err(_) => Some(Ok(PositionReport::default())),
        }
    }
}

fn parse_vessel_id(text: &str) -> Option<VesselId> {
    text.parse().ok()
}

fn parse_float(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a timestamp in the raw feed format, always UTC.
pub fn parse_raw_timestamp(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, RAW_TIME_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}
