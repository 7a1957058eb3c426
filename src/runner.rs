//! Command line entry point.
//!
//! [`run_with_args`] runs the whole pipeline for already parsed [`BaseArgs`], so it can be driven
//! from tests without spawning a process. [`run`] parses the process arguments first.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;

use crate::config::FitConfig;
use crate::data::load_confirmed;
use crate::error::{Result, SirFitError};
use crate::log::{info, set_log_level, set_module_filters, LevelFilter};
use crate::pipeline::{fit_series, FitResult};
use crate::report::{write_forecast_csv, write_summary_json};
use crate::series::parse_date;

/// Fit an SIR model to a region's confirmed case counts and forecast it forward.
#[derive(Parser, Debug, Clone)]
#[command(name = "sirfit", version, about)]
pub struct BaseArgs {
    /// Wide case-count table (one row per region, one column per day)
    #[arg(short, long)]
    pub data: PathBuf,

    /// Region to fit, matched against `Province/State` then `Country/Region`
    #[arg(short, long)]
    pub region: String,

    /// Optional path for a JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory for the forecast table and fit summary
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Total days to forecast, counted from the first fitted day
    #[arg(long)]
    pub horizon: Option<usize>,

    /// First day of data to fit, overriding the configured start date
    #[arg(long)]
    pub start_date: Option<String>,

    /// Wall-clock budget for the optimizer, e.g. `30s` or `2m`
    #[arg(long, value_parser = humantime::parse_duration)]
    pub time_budget: Option<Duration>,

    /// Log level (`info`) or comma separated module filters (`info,sirfit::estimator=trace`)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Increase logging verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Parses `--log-level` text: bare levels set the global level, `module=level` entries set
/// module filters.
fn parse_log_levels(text: &str) -> Result<(Option<LevelFilter>, Vec<(String, LevelFilter)>)> {
    let parse_level = |level: &str| {
        level.trim().parse::<LevelFilter>().map_err(|_| {
            SirFitError::InvalidConfig(format!("unknown log level `{}`", level.trim()))
        })
    };
    let mut global = None;
    let mut modules = Vec::new();
    for entry in text.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match entry.split_once('=') {
            Some((module, level)) => modules.push((module.trim().to_string(), parse_level(level)?)),
            None => global = Some(parse_level(entry)?),
        }
    }
    Ok((global, modules))
}

fn configure_logging(args: &BaseArgs) -> Result<()> {
    let verbosity = match args.verbose {
        0 => None,
        1 => Some(LevelFilter::Info),
        2 => Some(LevelFilter::Debug),
        _ => Some(LevelFilter::Trace),
    };
    let (global, modules) = match &args.log_level {
        Some(text) => parse_log_levels(text)?,
        None => (None, Vec::new()),
    };
    if let Some(level) = global.or(verbosity) {
        set_log_level(level);
    } else if !modules.is_empty() {
        set_log_level(LevelFilter::Error);
    }
    if !modules.is_empty() {
        set_module_filters(&modules);
    }
    Ok(())
}

/// Loads the configuration file if given and applies the command line overrides.
fn resolve_config(args: &BaseArgs) -> Result<FitConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("loading configuration from {}", path.display());
            FitConfig::from_json_file(path)?
        }
        None => FitConfig::default(),
    };
    if let Some(horizon) = args.horizon {
        config.horizon = horizon;
    }
    if let Some(date) = &args.start_date {
        parse_date(date)?;
        config.start_dates.insert(args.region.clone(), date.clone());
    }
    if args.time_budget.is_some() {
        config.estimator.time_budget = args.time_budget;
    }
    config.validate()?;
    Ok(config)
}

/// Output file name stem for a region, e.g. `New York` becomes `new_york`.
fn file_stem(region: &str) -> String {
    let stem: String = region
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if stem.is_empty() {
        "region".to_string()
    } else {
        stem
    }
}

/// Paths of the forecast table and fit summary for `region` under `output_dir`.
pub fn output_paths(output_dir: &Path, region: &str) -> (PathBuf, PathBuf) {
    let stem = file_stem(region);
    (
        output_dir.join(format!("{stem}_forecast.csv")),
        output_dir.join(format!("{stem}_fit.json")),
    )
}

/// Runs the whole pipeline: configuration, data, fit, forecast and output files.
///
/// # Errors
/// Returns the first failure of any stage.
pub fn run_with_args(args: &BaseArgs) -> Result<FitResult> {
    configure_logging(args)?;
    let config = resolve_config(args)?;
    let start = config.start_date(&args.region)?;
    let series = load_confirmed(&args.data, &args.region, start)?;
    info!(
        "{}: {} days of data, {} observed",
        args.region,
        series.len(),
        series.observed_count()
    );

    let result = fit_series(&args.region, &series, &config)?;

    let (forecast_path, summary_path) = output_paths(&args.output_dir, &args.region);
    write_forecast_csv(&forecast_path, &result)?;
    write_summary_json(&summary_path, &result)?;
    Ok(result)
}

/// Parses the process arguments and runs [`run_with_args`], printing a one-line summary.
///
/// # Errors
/// See [`run_with_args`].
pub fn run() -> Result<FitResult> {
    let args = BaseArgs::parse();
    let result = run_with_args(&args)?;
    let estimate = &result.estimate;
    println!(
        "{}: beta={:.6e} gamma={:.6e} rmse={:.4} converged={} ({} evaluations)",
        result.region,
        estimate.parameters.beta,
        estimate.parameters.gamma,
        estimate.loss,
        estimate.converged,
        estimate.evaluations
    );
    Ok(result)
}
