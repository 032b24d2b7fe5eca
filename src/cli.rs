//! CLI definition and dispatch.
//!
//! Every command reads an INI file (`-c`). Diagnostics go through `tracing`
//! to stderr; listings requested by the user go to stdout.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_store::CsvStore;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::analysis::{
    AnalysisConfig, DEFAULT_BINS, DEFAULT_HISTOGRAM_RANGE, DEFAULT_LOCAL_WINDOW,
    DEFAULT_VOLATILITY_WINDOW, DataSource,
};
use crate::domain::artifact::RunTag;
use crate::domain::config_validation::{parse_date, validate_analysis_config};
use crate::domain::error::CorrError;
use crate::domain::interval::Interval;
use crate::domain::normalize::Normalization;
use crate::domain::pipeline::{self, StageOutcome};
use crate::domain::universe::{MAX_MISSING_OBSERVATIONS, parse_tickers};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(
    name = "retcorr",
    about = "Return correlation and pairwise whitening analysis"
)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Arguments shared by the stages that read normalized returns.
#[derive(Args, Debug)]
pub struct StageArgs {
    #[arg(short, long)]
    pub config: PathBuf,
    /// Use local normalization with this window instead of the configured one
    #[arg(long)]
    pub local: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run every stage in order
    Run(StageArgs),
    /// Load, align and clean the configured tickers' prices
    Prices {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Compute simple returns from the price matrix
    Returns {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Rolling standard deviation of returns
    Volatility {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        window: Option<usize>,
    },
    /// Normalize returns globally or over a trailing window
    Normalize(StageArgs),
    /// Compare each instrument's normalized returns with N(0, 1)
    Densities(StageArgs),
    /// Correlation matrix of the normalized returns
    Correlation(StageArgs),
    /// Correlation matrices per calendar period
    Intervals {
        #[command(flatten)]
        args: StageArgs,
        #[arg(short, long)]
        interval: Option<Interval>,
        #[arg(short, long)]
        year: Option<i32>,
    },
    /// Correlation matrices over consecutive blocks of business days
    Blocks {
        #[command(flatten)]
        args: StageArgs,
        #[arg(short, long)]
        size: Option<usize>,
    },
    /// Pool whitened pairs and compare the density with N(0, 1)
    Aggregate(StageArgs),
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List symbols available in the configured data source
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the data range for one ticker or every configured ticker
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        ticker: Option<String>,
    },
}

/// Installs the global `tracing` subscriber writing to stderr.
///
/// Calling it more than once keeps the first subscriber.
pub fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            (&e).into()
        }
    }
}

pub fn execute(cli: Cli) -> Result<(), CorrError> {
    match cli.command {
        Command::Run(args) => run_all(&args),
        Command::Prices { config } => run_prices(&config),
        Command::Returns { config } => {
            let (_, analysis) = prepare(&config, None)?;
            report("returns", &pipeline::returns_stage(&store_for(&analysis), &analysis)?);
            Ok(())
        }
        Command::Volatility { config, window } => {
            let (_, analysis) = prepare(&config, None)?;
            let window = window.unwrap_or(analysis.volatility_window);
            let outcome = pipeline::volatility_stage(&store_for(&analysis), &analysis, window)?;
            report("volatility", &outcome);
            Ok(())
        }
        Command::Normalize(args) => {
            let (_, analysis) = prepare(&args.config, args.local)?;
            let outcome =
                pipeline::normalize_stage(&store_for(&analysis), &analysis, &analysis.normalization)?;
            report("normalize", &outcome);
            Ok(())
        }
        Command::Densities(args) => {
            let (_, analysis) = prepare(&args.config, args.local)?;
            let outcome = pipeline::return_density_stage(
                &store_for(&analysis),
                &analysis,
                &analysis.normalization,
            )?;
            report("densities", &outcome);
            Ok(())
        }
        Command::Correlation(args) => {
            let (_, analysis) = prepare(&args.config, args.local)?;
            let outcome =
                pipeline::correlation_stage(&store_for(&analysis), &analysis, &analysis.normalization)?;
            report("correlation", &outcome);
            Ok(())
        }
        Command::Intervals {
            args,
            interval,
            year,
        } => run_intervals(&args, interval, year),
        Command::Blocks { args, size } => run_blocks(&args, size),
        Command::Aggregate(args) => {
            let (_, analysis) = prepare(&args.config, args.local)?;
            let outcome =
                pipeline::aggregate_stage(&store_for(&analysis), &analysis, &analysis.normalization)?;
            report("aggregate", &outcome);
            Ok(())
        }
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { config } => run_list_symbols(&config),
        Command::Info { config, ticker } => run_info(&config, ticker.as_deref()),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, CorrError> {
    FileConfigAdapter::from_file(path).map_err(|e| CorrError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn get_usize(
    adapter: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, CorrError> {
    let value = adapter.get_int(section, key, default as i64);
    usize::try_from(value).map_err(|_| CorrError::ConfigInvalid {
        section: section.into(),
        key: key.into(),
        reason: format!("{} must be non-negative", key),
    })
}

pub fn build_normalization(adapter: &dyn ConfigPort) -> Result<Normalization, CorrError> {
    let value = adapter
        .get_string("analysis", "normalization")
        .unwrap_or_else(|| "global".to_string());
    if value.trim().eq_ignore_ascii_case("local") {
        let window = get_usize(adapter, "analysis", "window", DEFAULT_LOCAL_WINDOW)?;
        return Ok(Normalization::Local { window });
    }
    value.parse::<Normalization>().map_err(|reason| CorrError::ConfigInvalid {
        section: "analysis".into(),
        key: "normalization".into(),
        reason,
    })
}

pub fn build_analysis_config(adapter: &dyn ConfigPort) -> Result<AnalysisConfig, CorrError> {
    let tickers_str = adapter
        .get_string("data", "tickers")
        .ok_or_else(|| CorrError::ConfigMissing {
            section: "data".into(),
            key: "tickers".into(),
        })?;
    let tickers = parse_tickers(&tickers_str).map_err(|e| CorrError::ConfigInvalid {
        section: "data".into(),
        key: "tickers".into(),
        reason: e.to_string(),
    })?;

    let start_date = parse_date(adapter, "start_date")?;
    let end_date = parse_date(adapter, "end_date")?;
    let time_step = adapter
        .get_string("data", "time_step")
        .unwrap_or_else(|| "1d".to_string());

    let source = adapter
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string())
        .parse::<DataSource>()
        .map_err(|reason| CorrError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason,
        })?;

    let intervals = match adapter.get_list("analysis", "intervals") {
        list if list.is_empty() => Interval::ALL.to_vec(),
        list => list
            .iter()
            .map(|s| s.parse::<Interval>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|reason| CorrError::ConfigInvalid {
                section: "analysis".into(),
                key: "intervals".into(),
                reason,
            })?,
    };

    let years = adapter
        .get_list("analysis", "years")
        .iter()
        .map(|s| {
            s.parse::<i32>().map_err(|_| CorrError::ConfigInvalid {
                section: "analysis".into(),
                key: "years".into(),
                reason: format!("'{}' is not a year", s),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AnalysisConfig {
        tag: RunTag::new(start_date, end_date, time_step),
        tickers,
        source,
        data_path: PathBuf::from(
            adapter
                .get_string("data", "path")
                .unwrap_or_else(|| "data".to_string()),
        ),
        max_missing: get_usize(adapter, "data", "max_missing", MAX_MISSING_OBSERVATIONS)?,
        normalization: build_normalization(adapter)?,
        volatility_window: get_usize(
            adapter,
            "analysis",
            "volatility_window",
            DEFAULT_VOLATILITY_WINDOW,
        )?,
        intervals,
        years,
        block_size: get_usize(adapter, "analysis", "block_size", 0)?,
        bins: get_usize(adapter, "analysis", "bins", DEFAULT_BINS)?,
        histogram_range: (
            adapter.get_double("analysis", "histogram_min", DEFAULT_HISTOGRAM_RANGE.0),
            adapter.get_double("analysis", "histogram_max", DEFAULT_HISTOGRAM_RANGE.1),
        ),
        output_path: PathBuf::from(
            adapter
                .get_string("output", "path")
                .unwrap_or_else(|| "output".to_string()),
        ),
    })
}

/// Loads, validates and resolves the configuration, applying a `--local` override.
fn prepare(
    config_path: &Path,
    local: Option<usize>,
) -> Result<(FileConfigAdapter, AnalysisConfig), CorrError> {
    info!(path = %config_path.display(), "loading config");
    let adapter = load_config(config_path)?;
    validate_analysis_config(&adapter)?;
    let mut analysis = build_analysis_config(&adapter)?;
    if let Some(window) = local {
        analysis.normalization = Normalization::Local { window };
    }
    Ok((adapter, analysis))
}

fn store_for(analysis: &AnalysisConfig) -> CsvStore {
    CsvStore::new(analysis.output_path.clone())
}

/// Opens the price source named by `[data] source`.
pub fn open_data_port(adapter: &dyn ConfigPort) -> Result<Box<dyn DataPort>, CorrError> {
    let source = adapter
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string())
        .parse::<DataSource>()
        .map_err(|reason| CorrError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason,
        })?;

    match source {
        DataSource::Csv => {
            let path = adapter
                .get_string("data", "path")
                .ok_or_else(|| CorrError::ConfigMissing {
                    section: "data".into(),
                    key: "path".into(),
                })?;
            Ok(Box::new(CsvAdapter::new(PathBuf::from(path))))
        }
        DataSource::Sqlite => open_sqlite(adapter),
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(adapter: &dyn ConfigPort) -> Result<Box<dyn DataPort>, CorrError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let sqlite = SqliteAdapter::from_config(adapter)?;
    sqlite.initialize_schema()?;
    Ok(Box::new(sqlite))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_adapter: &dyn ConfigPort) -> Result<Box<dyn DataPort>, CorrError> {
    Err(CorrError::ConfigInvalid {
        section: "data".into(),
        key: "source".into(),
        reason: "built without the sqlite feature".into(),
    })
}

fn report(stage: &str, outcome: &StageOutcome) {
    match outcome {
        StageOutcome::Written(paths) => {
            for path in paths {
                tracing::debug!(stage, path = %path.display(), "artifact");
            }
            info!(stage, files = paths.len(), "stage complete");
        }
        StageOutcome::Skipped { reason } => info!(stage, %reason, "stage skipped"),
    }
}

fn run_all(args: &StageArgs) -> Result<(), CorrError> {
    let (adapter, analysis) = prepare(&args.config, args.local)?;
    let data_port = open_data_port(&adapter)?;
    let store = store_for(&analysis);

    let outcomes = pipeline::run_all(data_port.as_ref(), &store, &analysis)?;
    for (stage, outcome) in &outcomes {
        report(stage, outcome);
    }
    let files: usize = outcomes.iter().map(|(_, o)| o.paths().len()).sum();
    info!(
        files,
        output = %analysis.output_path.display(),
        "analysis complete"
    );
    Ok(())
}

fn run_prices(config_path: &Path) -> Result<(), CorrError> {
    let (adapter, analysis) = prepare(config_path, None)?;
    let data_port = open_data_port(&adapter)?;
    let outcome = pipeline::prices_stage(data_port.as_ref(), &store_for(&analysis), &analysis)?;
    report("prices", &outcome);
    Ok(())
}

fn run_intervals(
    args: &StageArgs,
    interval: Option<Interval>,
    year: Option<i32>,
) -> Result<(), CorrError> {
    let (_, analysis) = prepare(&args.config, args.local)?;
    let intervals = match interval {
        Some(i) => vec![i],
        None => analysis.intervals.clone(),
    };
    let years = match year {
        Some(y) => vec![y],
        None => analysis.years.clone(),
    };

    let outcome = pipeline::interval_correlation_stage(
        &store_for(&analysis),
        &analysis,
        &analysis.normalization,
        &intervals,
        &years,
    )?;
    report("intervals", &outcome);
    Ok(())
}

fn run_blocks(args: &StageArgs, size: Option<usize>) -> Result<(), CorrError> {
    let (_, analysis) = prepare(&args.config, args.local)?;
    let block = size.unwrap_or(analysis.block_size);
    if block == 0 {
        return Err(CorrError::ConfigInvalid {
            section: "analysis".into(),
            key: "block_size".into(),
            reason: "pass --size or set block_size to enable business-day blocks".into(),
        });
    }

    let outcome = pipeline::block_correlation_stage(
        &store_for(&analysis),
        &analysis,
        &analysis.normalization,
        block,
    )?;
    report("blocks", &outcome);
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), CorrError> {
    let (_, analysis) = prepare(config_path, None)?;
    let intervals: Vec<String> = analysis.intervals.iter().map(|i| i.to_string()).collect();

    info!(
        tickers = %analysis.tickers.join(", "),
        source = %analysis.source,
        start = %analysis.tag.start,
        end = %analysis.tag.end,
        "universe"
    );
    info!(
        normalization = %analysis.normalization,
        volatility_window = analysis.volatility_window,
        intervals = %intervals.join(", "),
        block_size = analysis.block_size,
        bins = analysis.bins,
        "analysis"
    );
    info!("configuration is valid");
    Ok(())
}

fn run_list_symbols(config_path: &Path) -> Result<(), CorrError> {
    let adapter = load_config(config_path)?;
    let data_port = open_data_port(&adapter)?;

    let symbols = data_port.list_symbols()?;
    if symbols.is_empty() {
        warn!("no symbols found");
    }
    for symbol in &symbols {
        println!("{}", symbol);
    }
    info!(count = symbols.len(), "symbols listed");
    Ok(())
}

fn run_info(config_path: &Path, ticker: Option<&str>) -> Result<(), CorrError> {
    let adapter = load_config(config_path)?;
    let data_port = open_data_port(&adapter)?;

    let tickers = match ticker {
        Some(t) => vec![t.to_string()],
        None => match adapter.get_list("data", "tickers") {
            list if list.is_empty() => data_port.list_symbols()?,
            list => list,
        },
    };

    for ticker in &tickers {
        match data_port.get_data_range(ticker)? {
            Some((first, last, count)) => {
                println!("{}: {} to {} ({} observations)", ticker, first, last, count)
            }
            None => println!("{}: no data", ticker),
        }
    }
    Ok(())
}
