use clap::Parser;
use log::{info, LevelFilter};
use portfind::{clean_file, CleanConfig, PortFindResult, MAX_STATIONARY_SPEED_KNOTS};
use simple_logger::SimpleLogger;
use std::{
    fmt::{self, Display},
    path::PathBuf,
};

/*-------------------------------------------------------------------------------------------------
 *                                     Command Line Options
 *-----------------------------------------------------------------------------------------------*/

///
/// Clean a raw AIS archive down to the reports from stationary vessels.
///
/// Reports that are incomplete, out of range, moving, or not moored / at anchor / not under
/// command are dropped. The rest are deduplicated by vessel and time, and then by vessel and
/// position.
///
#[derive(Debug, Parser)]
#[clap(bin_name = "cleanais")]
#[clap(author, version, about)]
struct CleanAisOptionsInit {
    /// The raw AIS file, CSV or a zip archive holding a CSV.
    ///
    /// If this is not specified, then the program will check for it in the "AIS_FILE"
    /// environment variable.
    #[clap(short, long)]
    #[clap(env = "AIS_FILE")]
    input: PathBuf,

    /// Where to write the cleaned reports.
    ///
    /// If this is not specified, then the program will check the "CLEANED_AIS_FILE" environment
    /// variable, and failing that replace the extension on the input with "cleaned.csv".
    #[clap(short, long)]
    #[clap(env = "CLEANED_AIS_FILE")]
    output: Option<PathBuf>,

    /// Reports at or above this speed over ground (knots) are dropped.
    #[clap(long)]
    #[clap(default_value_t = MAX_STATIONARY_SPEED_KNOTS)]
    max_speed: f64,

    /// Number of threads to use for deduplication, defaults to the number of CPUs.
    #[clap(short, long)]
    threads: Option<usize>,

    /// Verbose output
    #[clap(short, long)]
    verbose: bool,
}

#[derive(Debug)]
struct CleanAisOptionsChecked {
    /// The raw AIS file.
    input: PathBuf,

    /// The cleaned reports file.
    output: PathBuf,

    config: CleanConfig,

    /// Verbose output
    verbose: bool,
}

impl Display for CleanAisOptionsChecked {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "\n")?; // yes, two blank lines.
        writeln!(f, "          Input: {}", self.input.display())?;
        writeln!(f, "         Output: {}", self.output.display())?;
        writeln!(f, "      Max speed: {}", self.config.max_speed_knots)?;
        writeln!(f, "        Threads: {}", self.config.partitions)?;
        writeln!(f, "\n")?; // yes, two blank lines.

        Ok(())
    }
}

/// Get the command line arguments and check them.
///
/// If there is missing data, try to fill it in with environment variables or defaults.
fn parse_args() -> PortFindResult<CleanAisOptionsChecked> {
    let CleanAisOptionsInit {
        input,
        output,
        max_speed,
        threads,
        verbose,
    } = CleanAisOptionsInit::parse();

    if !input.is_file() {
        return Err(format!("input file does not exist: {}", input.display()).into());
    }

    if max_speed.is_nan() || max_speed <= 0.0 {
        return Err(format!("max speed must be positive: {}", max_speed).into());
    }

    let output = match output {
        Some(v) => v,
        None => {
            let mut clone = input.clone();
            clone.set_extension("cleaned.csv");
            clone
        }
    };

    let mut config = CleanConfig {
        max_speed_knots: max_speed,
        ..CleanConfig::default()
    };
    if let Some(threads) = threads {
        config.partitions = threads.max(1);
    }

    Ok(CleanAisOptionsChecked {
        input,
        output,
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

    let cleaned = clean_file(&opts.input, &opts.output, &opts.config)?;

    info!("Cleaning summary:\n{}", cleaned.stats);
    if cleaned.reports.is_empty() {
        log::warn!("No reports survived cleaning, {} is empty.", opts.output.display());
    } else {
        info!(
            "Wrote {} reports to {}",
            cleaned.reports.len(),
            opts.output.display()
        );
    }

    Ok(())
}
