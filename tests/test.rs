use chrono::{TimeZone, Utc};
use portfind::{
    clean_file, clean_reports, dbscan, find_ports, find_ports_in_file, position_cell,
    read_cleaned_reports, write_ports_file, CleanConfig, CleanedReport, Coord, DbscanParams,
    PipelineConfig, PortFindResult, PortsDatabase, PositionReport, RawReportReader,
    NOISE_CLUSTER_ID,
};
use proptest::prelude::*;
use rustc_hash::FxHashSet as HashSet;
use std::{fs, io::Write, path::Path};
use tempfile::TempDir;

/*-------------------------------------------------------------------------------------------------
 *                                           Helpers
 *-----------------------------------------------------------------------------------------------*/

const RAW_HEADER: &str = "# Timestamp,Type of mobile,MMSI,Latitude,Longitude,Navigational status,ROT,SOG,COG,Heading,IMO,Callsign,Name,Ship type,Cargo type,Width,Length,Type of position fixing device,Draught,Destination,ETA,Data source type,A,B,C,D";

struct RawRow<'a> {
    timestamp: &'a str,
    mmsi: &'a str,
    lat: &'a str,
    lon: &'a str,
    status: &'a str,
    sog: &'a str,
    destination: &'a str,
}

fn raw_line(row: &RawRow) -> String {
    let mut fields = vec![""; 26];
    fields[0] = row.timestamp;
    fields[1] = "Class A";
    fields[2] = row.mmsi;
    fields[3] = row.lat;
    fields[4] = row.lon;
    fields[5] = row.status;
    fields[7] = row.sog;
    fields[19] = row.destination;
    fields[21] = "AIS";
    fields.join(",")
}

fn raw_text(rows: &[RawRow]) -> String {
    let mut text = String::from(RAW_HEADER);
    text.push('\n');
    for row in rows {
        text.push_str(&raw_line(row));
        text.push('\n');
    }
    text
}

fn moored<'a>(mmsi: &'a str, lat: &'a str, lon: &'a str) -> RawRow<'a> {
    RawRow {
        timestamp: "01/03/2025 06:00:00",
        mmsi,
        lat,
        lon,
        status: "Moored",
        sog: "0",
        destination: "AARHUS",
    }
}

fn clean_text(text: &str) -> PortFindResult<Vec<CleanedReport>> {
    let reader = RawReportReader::from_reader(std::io::Cursor::new(text.as_bytes().to_vec()))?;
    Ok(clean_reports(reader, &CleanConfig::default())?.reports)
}

fn write_file(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

/*-------------------------------------------------------------------------------------------------
 *                                          Scenarios
 *-----------------------------------------------------------------------------------------------*/

#[test]
fn test_same_vessel_and_time_keeps_one() {
    let mut first = moored("219000001", "56.1500", "10.2200");
    first.destination = "AARHUS";
    let mut second = moored("219000001", "56.1500", "10.2200");
    second.destination = "Aarhus";

    let cleaned = clean_text(&raw_text(&[first, second])).unwrap();

    assert_eq!(cleaned.len(), 1);
    assert_eq!(cleaned[0].destination, "AARHUS");
}

#[test]
fn test_three_vessels_make_a_port() {
    let rows = [
        moored("219000001", "56.1500", "10.2200"),
        moored("219000002", "56.1530", "10.2220"),
        moored("219000003", "56.1510", "10.2260"),
    ];

    let cleaned = clean_text(&raw_text(&rows)).unwrap();
    assert_eq!(cleaned.len(), 3);

    let run = find_ports(cleaned, &PipelineConfig::default());
    assert_eq!(run.summary.ports.len(), 1);

    let port = &run.summary.ports[0];
    assert_eq!(port.vessel_count, 3);
    assert_eq!(port.report_count, 3);
    assert!((port.centroid_latitude - 56.1513333333).abs() < 1.0e-6);
    assert!((port.centroid_longitude - 10.2226666667).abs() < 1.0e-6);
    assert_eq!(run.summary.noise().count(), 0);
}

#[test]
fn test_two_vessels_are_not_a_port() {
    let rows = [
        moored("219000001", "56.1500", "10.2200"),
        moored("219000002", "56.1530", "10.2220"),
    ];

    let cleaned = clean_text(&raw_text(&rows)).unwrap();
    let run = find_ports(cleaned, &PipelineConfig::default());

    // A density cluster, but not a port.
    assert_eq!(run.cluster_stats.clusters, 1);
    assert_eq!(run.cluster_stats.noise, 0);

    assert!(run.summary.ports.is_empty());
    assert_eq!(run.summary.stats.rejected, 1);
    assert_eq!(run.summary.noise().count(), 2);
}

#[test]
fn test_impossible_latitude_is_dropped() {
    let rows = [
        moored("219000001", "95.0", "10.2200"),
        moored("219000002", "56.1530", "10.2220"),
    ];

    let reader =
        RawReportReader::from_reader(std::io::Cursor::new(raw_text(&rows).into_bytes())).unwrap();
    let out = clean_reports(reader, &CleanConfig::default()).unwrap();

    assert_eq!(out.stats.read, 2);
    assert_eq!(out.stats.out_of_range, 1);
    assert_eq!(out.reports.len(), 1);
    assert_eq!(out.reports[0].vessel_id, 219000002);
}

#[test]
fn test_empty_input_is_not_an_error() {
    let cleaned = clean_text(&raw_text(&[])).unwrap();
    assert!(cleaned.is_empty());

    let run = find_ports(cleaned, &PipelineConfig::default());
    assert!(run.summary.ports.is_empty());
    assert!(run.summary.assignments.is_empty());
}

#[test]
fn test_noisy_rows_are_dropped_quietly() {
    let mut moving = moored("219000004", "56.1500", "10.2200");
    moving.sog = "0.5";
    let mut fishing = moored("219000005", "56.1500", "10.2200");
    fishing.status = "Engaged in fishing";
    let mut garbled = moored("not a number", "56.1500", "10.2200");
    garbled.timestamp = "yesterday";

    let rows = [moving, fishing, garbled, moored("219000006", "56.1", "10.2")];
    let cleaned = clean_text(&raw_text(&rows)).unwrap();

    assert_eq!(cleaned.len(), 1);
    assert_eq!(cleaned[0].vessel_id, 219000006);
}

#[test]
fn test_missing_column_is_fatal() {
    let text = "# Timestamp,MMSI,Latitude,Longitude,SOG,Destination\n";
    assert!(clean_text(text).is_err());
}

/*-------------------------------------------------------------------------------------------------
 *                                            Files
 *-----------------------------------------------------------------------------------------------*/

fn port_rows() -> Vec<RawRow<'static>> {
    vec![
        moored("219000001", "56.1500", "10.2200"),
        moored("219000002", "56.1530", "10.2220"),
        moored("219000003", "56.1510", "10.2260"),
        moored("219000004", "57.7000", "11.9500"),
        moored("219000005", "57.7010", "11.9520"),
        moored("219000006", "57.7020", "11.9480"),
        moored("219000007", "57.7030", "11.9510"),
        moored("219000008", "45.0000", "-30.0000"),
    ]
}

#[test]
fn test_clean_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let input = write_file(dir.path(), "aisdk.csv", &raw_text(&port_rows()));
    let output = dir.path().join("cleaned.csv");

    let cleaned = clean_file(&input, &output, &CleanConfig::default()).unwrap();
    assert_eq!(cleaned.reports.len(), 8);
    assert!(!dir.path().join("cleaned.csv.partial").exists());

    let read_back = read_cleaned_reports(&output).unwrap();
    assert_eq!(read_back, cleaned.reports);

    let from_file = find_ports_in_file(&output, &PipelineConfig::default()).unwrap();
    let in_memory = find_ports(cleaned.reports, &PipelineConfig::default());
    assert_eq!(from_file.summary.ports, in_memory.summary.ports);
    assert_eq!(from_file.summary.ports.len(), 2);
}

#[test]
fn test_zipped_input() {
    let dir = TempDir::new().unwrap();
    let zip_path = dir.path().join("aisdk-2025-03-01.zip");

    {
        let file = fs::File::create(&zip_path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file("README.txt", zip::write::FileOptions::default())
            .unwrap();
        zip.write_all(b"not the data").unwrap();
        zip.start_file("aisdk-2025-03-01.csv", zip::write::FileOptions::default())
            .unwrap();
        zip.write_all(raw_text(&port_rows()).as_bytes()).unwrap();
        zip.finish().unwrap();
    }

    let output = dir.path().join("cleaned.csv");
    let cleaned = clean_file(&zip_path, &output, &CleanConfig::default()).unwrap();
    assert_eq!(cleaned.reports.len(), 8);
}

#[test]
fn test_missing_input_is_fatal() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("cleaned.csv");

    let result = clean_file(dir.path().join("nope.csv"), &output, &CleanConfig::default());
    assert!(result.is_err());
    assert!(!output.exists());
}

#[test]
fn test_ports_file_and_database() {
    let dir = TempDir::new().unwrap();
    let cleaned = clean_text(&raw_text(&port_rows())).unwrap();
    let run = find_ports(cleaned, &PipelineConfig::default());
    assert_eq!(run.summary.ports.len(), 2);

    let ports_path = dir.path().join("ports.csv");
    write_ports_file(&ports_path, &run.summary.ports).unwrap();
    let text = fs::read_to_string(&ports_path).unwrap();
    assert_eq!(text.lines().count(), 3);
    assert!(text.starts_with("cluster_id,centroid_latitude,centroid_longitude,vessel_count"));

    let db_path = dir.path().join("ports.sqlite");
    {
        let db = PortsDatabase::connect(&db_path).unwrap();
        db.replace_ports(&run.summary.ports).unwrap();
    }

    let db = PortsDatabase::connect(&db_path).unwrap();
    assert_eq!(db.ports().unwrap(), run.summary.ports);
}

/*-------------------------------------------------------------------------------------------------
 *                                          Properties
 *-----------------------------------------------------------------------------------------------*/

const STATUSES: [&str; 5] = [
    "Moored",
    "At anchor",
    "Not under command",
    "Under way using engine",
    "Engaged in fishing",
];

fn position_report() -> impl Strategy<Value = PositionReport> {
    (
        0u32..12,
        0i64..120,
        prop_oneof![4 => 54.95f64..55.05, 1 => 85.0f64..95.0],
        9.95f64..10.05,
        0.0f64..1.0,
        0usize..STATUSES.len(),
    )
        .prop_map(|(vessel_id, minutes, lat, lon, speed, status)| PositionReport {
            vessel_id: Some(vessel_id),
            timestamp: Some(Utc.timestamp_opt(1_740_787_200 + minutes * 60, 0).unwrap()),
            latitude: Some(lat),
            longitude: Some(lon),
            speed: Some(speed),
            destination: Some("AARHUS".to_owned()),
            navigational_status: Some(STATUSES[status].to_owned()),
        })
}

fn clean(reports: Vec<PositionReport>, partitions: usize) -> Vec<CleanedReport> {
    let config = CleanConfig {
        partitions,
        ..CleanConfig::default()
    };

    clean_reports(reports.into_iter().map(Ok), &config)
        .unwrap()
        .reports
}

fn cleaned_reports() -> impl Strategy<Value = Vec<CleanedReport>> {
    prop::collection::vec(position_report(), 0..200).prop_map(|reports| clean(reports, 2))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_cleaned_reports_are_valid(reports in prop::collection::vec(position_report(), 0..200)) {
        let cleaned = clean(reports, 3);

        let mut times = HashSet::default();
        let mut cells = HashSet::default();
        for r in &cleaned {
            prop_assert!((-90.0..=90.0).contains(&r.latitude));
            prop_assert!((-180.0..=180.0).contains(&r.longitude));
            prop_assert!(r.speed < 0.5);
            prop_assert!(r.navigational_status.is_stationary());

            prop_assert!(times.insert((r.vessel_id, r.timestamp)));
            prop_assert!(cells.insert((r.vessel_id, position_cell(r.latitude, r.longitude))));
        }
    }

    #[test]
    fn prop_cleaning_is_idempotent(cleaned in cleaned_reports()) {
        let again = clean(cleaned.iter().cloned().map(PositionReport::from).collect(), 2);
        prop_assert_eq!(again, cleaned);
    }

    #[test]
    fn prop_partitions_do_not_change_output(
        reports in prop::collection::vec(position_report(), 0..200),
        partitions in 1usize..6,
    ) {
        prop_assert_eq!(clean(reports.clone(), 1), clean(reports, partitions));
    }

    #[test]
    fn prop_ports_match_their_members(cleaned in cleaned_reports()) {
        let run = find_ports(cleaned, &PipelineConfig::default());

        for port in &run.summary.ports {
            let members: Vec<&CleanedReport> = run
                .summary
                .assignments
                .iter()
                .filter(|a| a.cluster_id == port.cluster_id)
                .map(|a| &a.report)
                .collect();

            let vessels: HashSet<u32> = members.iter().map(|r| r.vessel_id).collect();
            prop_assert!(port.vessel_count >= 3);
            prop_assert_eq!(port.vessel_count, vessels.len());
            prop_assert_eq!(port.report_count, members.len());

            let n = members.len() as f64;
            let lat = members.iter().map(|r| r.latitude).sum::<f64>() / n;
            let lon = members.iter().map(|r| r.longitude).sum::<f64>() / n;
            prop_assert!((port.centroid_latitude - lat).abs() < 1.0e-9);
            prop_assert!((port.centroid_longitude - lon).abs() < 1.0e-9);
        }

        // Every label left is a port or noise.
        for a in &run.summary.assignments {
            prop_assert!(a.cluster_id == NOISE_CLUSTER_ID || run.summary.port(a.cluster_id).is_some());
        }
    }

    #[test]
    fn prop_clusters_do_not_depend_on_order(
        (points, order) in prop::collection::vec((55.0f64..55.2, 10.0f64..10.3), 1..80)
            .prop_flat_map(|points| {
                let order: Vec<usize> = (0..points.len()).collect();
                (Just(points), Just(order).prop_shuffle())
            })
    ) {
        let params = DbscanParams::default();

        let points: Vec<Coord> = points.into_iter().map(|(lat, lon)| Coord::new(lat, lon)).collect();
        let shuffled: Vec<Coord> = order.iter().map(|&i| points[i]).collect();

        let labels = dbscan(&points, &params);
        let shuffled_labels = dbscan(&shuffled, &params);

        let mut relabeled = vec![NOISE_CLUSTER_ID; points.len()];
        for (k, &i) in order.iter().enumerate() {
            relabeled[i] = shuffled_labels[k];
        }

        for i in 0..points.len() {
            prop_assert_eq!(labels[i] == NOISE_CLUSTER_ID, relabeled[i] == NOISE_CLUSTER_ID);
            if labels[i] == NOISE_CLUSTER_ID {
                continue;
            }

            for j in (i + 1)..points.len() {
                prop_assert_eq!(labels[i] == labels[j], relabeled[i] == relabeled[j]);
            }
        }
    }
}
