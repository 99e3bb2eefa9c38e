use clap::Parser;
use log::{info, LevelFilter};
use portfind::{
    find_ports_in_file, write_assignments_file, write_ports_file, DbscanParams, PipelineConfig,
    PortFindResult, PortsDatabase, DEFAULT_EPSILON_KM, DEFAULT_MIN_SAMPLES, MIN_VESSELS_PER_PORT,
};
use simple_logger::SimpleLogger;
use std::{
    fmt::{self, Display},
    path::PathBuf,
};

/*-------------------------------------------------------------------------------------------------
 *                                     Command Line Options
 *-----------------------------------------------------------------------------------------------*/

///
/// Find ports in a file of cleaned AIS reports.
///
/// The reports are clustered by great circle distance, and clusters visited by enough different
/// vessels are reported as ports.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "findports")]
#[clap(author, version, about)]
struct FindPortsOptionsInit {
    /// The cleaned reports file produced by cleanais.
    ///
    /// If this is not specified, then the program will check for it in the "CLEANED_AIS_FILE"
    /// environment variable.
    #[clap(short, long)]
    #[clap(env = "CLEANED_AIS_FILE")]
    input: PathBuf,

    /// Where to write the ports.
    ///
    /// If this is not specified, then the program will replace the extension on the input with
    /// "ports.csv".
    #[clap(short, long)]
    ports_file: Option<PathBuf>,

    /// Where to write every report with its cluster label.
    ///
    /// If this is not specified, the labels are not saved.
    #[clap(short, long)]
    labels_file: Option<PathBuf>,

    /// A database to store the ports in, replacing the ports from any earlier run.
    ///
    /// If this is not specified, then the program will check for it in the "PORTS_DB"
    /// environment variable. If that isn't set either, no database is used.
    #[clap(short, long)]
    #[clap(env = "PORTS_DB")]
    database: Option<PathBuf>,

    /// The neighborhood radius in kilometers.
    #[clap(long)]
    #[clap(default_value_t = DEFAULT_EPSILON_KM)]
    epsilon_km: f64,

    /// Reports (including itself) needed within the radius for a report to seed a cluster.
    #[clap(long)]
    #[clap(default_value_t = DEFAULT_MIN_SAMPLES)]
    min_samples: usize,

    /// Distinct vessels needed for a cluster to be a port.
    #[clap(long)]
    #[clap(default_value_t = MIN_VESSELS_PER_PORT)]
    min_vessels: usize,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Debug)]
struct FindPortsOptionsChecked {
    input: PathBuf,
    ports_file: PathBuf,
    labels_file: Option<PathBuf>,
    database: Option<PathBuf>,
    config: PipelineConfig,
    verbose: bool,
}

impl Display for FindPortsOptionsChecked {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "\n")?; // yes, two blank lines.
        writeln!(f, "          Input: {}", self.input.display())?;
        writeln!(f, "          Ports: {}", self.ports_file.display())?;
        match self.labels_file {
            Some(ref labels) => writeln!(f, "         Labels: {}", labels.display())?,
            None => writeln!(f, "         Labels: not saved")?,
        }
        match self.database {
            Some(ref db) => writeln!(f, "       Database: {}", db.display())?,
            None => writeln!(f, "       Database: not used")?,
        }
        writeln!(f, "   Epsilon (km): {}", self.config.dbscan.epsilon_km)?;
        writeln!(f, "    Min samples: {}", self.config.dbscan.min_samples)?;
        writeln!(f, "    Min vessels: {}", self.config.min_vessels)?;
        writeln!(f, "\n")?; // yes, two blank lines.

        Ok(())
    }
}

/// Get the command line arguments and check them.
fn parse_args() -> PortFindResult<FindPortsOptionsChecked> {
    let FindPortsOptionsInit {
        input,
        ports_file,
        labels_file,
        database,
        epsilon_km,
        min_samples,
        min_vessels,
        verbose,
    } = FindPortsOptionsInit::parse();

    if !input.is_file() {
        return Err(format!("input file does not exist: {}", input.display()).into());
    }

    if epsilon_km.is_nan() || epsilon_km <= 0.0 {
        return Err(format!("epsilon must be positive: {}", epsilon_km).into());
    }

    if min_samples < 1 {
        return Err("min samples must be at least 1".into());
    }

    let ports_file = match ports_file {
        Some(v) => v,
        None => {
            let mut clone = input.clone();
            clone.set_extension("ports.csv");
            clone
        }
    };

    let config = PipelineConfig {
        dbscan: DbscanParams {
            epsilon_km,
            min_samples,
        },
        min_vessels,
        ..PipelineConfig::default()
    };

    Ok(FindPortsOptionsChecked {
        input,
        ports_file,
        labels_file,
        database,
        config,
        verbose,
    })
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> PortFindResult<()> {
    let opts = parse_args()?;

    let level = if opts.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new().with_level(level).init()?;

    if opts.verbose {
        info!("{}", opts);
    }

    let run = find_ports_in_file(&opts.input, &opts.config)?;
    info!("Clustering summary:\n{}", run.cluster_stats);
    info!("Validation summary:\n{}", run.summary.stats);

    write_ports_file(&opts.ports_file, &run.summary.ports)?;
    info!(
        "Wrote {} ports to {}",
        run.summary.ports.len(),
        opts.ports_file.display()
    );

    if let Some(ref labels_file) = opts.labels_file {
        write_assignments_file(labels_file, &run.summary.assignments)?;
        info!("Wrote cluster labels to {}", labels_file.display());
    }

    if let Some(ref database) = opts.database {
        let db = PortsDatabase::connect(database)?;
        db.replace_ports(&run.summary.ports)?;
        info!("Stored ports in {}", database.display());
    }

    for port in &run.summary.ports {
        log::debug!(
            "port {:>5} - lat {:>10.5} lon {:>11.5} vessels {:>5} reports {:>6} radius {:>6.2} km",
            port.cluster_id,
            port.centroid_latitude,
            port.centroid_longitude,
            port.vessel_count,
            port.report_count,
            port.radius_km
        );
    }

    if run.summary.ports.is_empty() {
        log::warn!("");
        log::warn!("No ports found!");
        log::warn!("");
    }

    Ok(())
}
