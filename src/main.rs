use clap::Parser;
use log::{info, LevelFilter};
use portfind::{
    clean_reports, find_ports, write_cleaned_reports, write_ports_file, CleanConfig,
    DbscanParams, PipelineConfig, PortFindResult, PortsDatabase, RawReportReader,
    DEFAULT_EPSILON_KM, DEFAULT_MIN_SAMPLES, MAX_STATIONARY_SPEED_KNOTS, MIN_VESSELS_PER_PORT,
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
/// Find ports in a raw AIS archive.
///
/// Cleans the archive down to stationary vessels, clusters what is left, and reports the clusters
/// visited by enough different vessels as ports.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "portfind")]
#[clap(author, version, about)]
struct PortFindOptionsInit {
    /// The raw AIS file, CSV or a zip archive holding a CSV.
    ///
    /// If this is not specified, then the program will check for it in the "AIS_FILE"
    /// environment variable.
    #[clap(short, long)]
    #[clap(env = "AIS_FILE")]
    input: PathBuf,

    /// Also save the cleaned reports here.
    ///
    /// If this is not specified, then the program will check for it in the "CLEANED_AIS_FILE"
    /// environment variable. If that isn't set either, the cleaned reports are not saved.
    #[clap(short, long)]
    #[clap(env = "CLEANED_AIS_FILE")]
    cleaned_file: Option<PathBuf>,

    /// Where to write the ports.
    ///
    /// If this is not specified, then the program will replace the extension on the input with
    /// "ports.csv".
    #[clap(short, long)]
    ports_file: Option<PathBuf>,

    /// A database to store the ports in, replacing the ports from any earlier run.
    ///
    /// If this is not specified, then the program will check for it in the "PORTS_DB"
    /// environment variable. If that isn't set either, no database is used.
    #[clap(short, long)]
    #[clap(env = "PORTS_DB")]
    database: Option<PathBuf>,

    /// Reports at or above this speed over ground (knots) are dropped.
    #[clap(long)]
    #[clap(default_value_t = MAX_STATIONARY_SPEED_KNOTS)]
    max_speed: f64,

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

    /// Number of threads to use for deduplication, defaults to the number of CPUs.
    #[clap(short, long)]
    threads: Option<usize>,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Debug)]
struct PortFindOptionsChecked {
    input: PathBuf,
    cleaned_file: Option<PathBuf>,
    ports_file: PathBuf,
    database: Option<PathBuf>,
    config: PipelineConfig,
    verbose: bool,
}

impl Display for PortFindOptionsChecked {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "\n")?; // yes, two blank lines.
        writeln!(f, "        Input: {}", self.input.display())?;
        match self.cleaned_file {
            Some(ref cleaned) => writeln!(f, "      Cleaned: {}", cleaned.display())?,
            None => writeln!(f, "      Cleaned: not saved")?,
        }
        writeln!(f, "        Ports: {}", self.ports_file.display())?;
        match self.database {
            Some(ref db) => writeln!(f, "     Database: {}", db.display())?,
            None => writeln!(f, "     Database: not used")?,
        }
        writeln!(f, "{}", self.config)?;
        writeln!(f, "\n")?; // yes, two blank lines.

        Ok(())
    }
}

/// Get the command line arguments and check them.
fn parse_args() -> PortFindResult<PortFindOptionsChecked> {
    let PortFindOptionsInit {
        input,
        cleaned_file,
        ports_file,
        database,
        max_speed,
        epsilon_km,
        min_samples,
        min_vessels,
        threads,
        verbose,
    } = PortFindOptionsInit::parse();

    if !input.is_file() {
        return Err(format!("input file does not exist: {}", input.display()).into());
    }

    if max_speed.is_nan() || max_speed <= 0.0 {
        return Err(format!("max speed must be positive: {}", max_speed).into());
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

    let mut clean = CleanConfig {
        max_speed_knots: max_speed,
        ..CleanConfig::default()
    };
    if let Some(threads) = threads {
        clean.partitions = threads.max(1);
    }

    let config = PipelineConfig {
        clean,
        dbscan: DbscanParams {
            epsilon_km,
            min_samples,
        },
        min_vessels,
    };

    Ok(PortFindOptionsChecked {
        input,
        cleaned_file,
        ports_file,
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

    //
    // Clean
    //
    let reader = RawReportReader::open(&opts.input)?;
    let cleaned = clean_reports(reader, &opts.config.clean)?;
    info!("Cleaning summary:\n{}", cleaned.stats);

    if let Some(ref cleaned_file) = opts.cleaned_file {
        write_cleaned_reports(cleaned_file, &cleaned.reports)?;
        info!("Wrote cleaned reports to {}", cleaned_file.display());
    }

    if cleaned.reports.is_empty() {
        log::warn!("No reports survived cleaning, there are no ports to find.");
    }

    //
    // Cluster and validate
    //
    let run = find_ports(cleaned.reports, &opts.config);
    info!("Clustering summary:\n{}", run.cluster_stats);
    info!("Validation summary:\n{}", run.summary.stats);

    //
    // Save
    //
    write_ports_file(&opts.ports_file, &run.summary.ports)?;
    info!(
        "Wrote {} ports to {}",
        run.summary.ports.len(),
        opts.ports_file.display()
    );

    if let Some(ref database) = opts.database {
        let db = PortsDatabase::connect(database)?;
        db.replace_ports(&run.summary.ports)?;
        info!("Stored ports in {}", database.display());
    }

    Ok(())
}
