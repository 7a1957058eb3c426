//! Writing fit results to disk.
//!
//! The forecast table goes to a CSV file with one row per day and an empty `observed` cell for
//! days without data. The fitted parameters and optimizer outcome go to a JSON summary. Both
//! are plain data, so any plotting tool can render them.

use std::ffi::OsStr;
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::NaiveDate;
use csv::Writer;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SirFitError};
use crate::estimator::Termination;
use crate::log::info;
use crate::pipeline::FitResult;

/// The JSON summary of one fitting run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    pub region: String,
    pub beta: f64,
    pub gamma: f64,
    pub loss: f64,
    pub converged: bool,
    pub termination: Termination,
    pub iterations: usize,
    pub evaluations: usize,
    pub observed_days: usize,
    pub forecast_days: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

impl From<&FitResult> for FitSummary {
    fn from(result: &FitResult) -> Self {
        let estimate = &result.estimate;
        let index = result.forecast.index();
        FitSummary {
            region: result.region.clone(),
            beta: estimate.parameters.beta,
            gamma: estimate.parameters.gamma,
            loss: estimate.loss,
            converged: estimate.converged,
            termination: estimate.termination,
            iterations: estimate.iterations,
            evaluations: estimate.evaluations,
            observed_days: result.forecast.observed_len(),
            forecast_days: result.forecast.len(),
            first_date: index.first(),
            last_date: index.last(),
        }
    }
}

// Checks that the path has the expected extension and creates all parent directories if they
// do not exist. Returns the created file.
fn generate_validate_filepath(path: &Path, extension: &str) -> Result<File> {
    if path.extension().and_then(OsStr::to_str) != Some(extension) {
        return Err(SirFitError::SirFitError(format!(
            "output file {} must have a .{extension} extension",
            path.display()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent)?;
    }
    Ok(File::create(path)?)
}

/// Writes the forecast table of `result` as CSV.
///
/// # Errors
/// Fails if `path` does not end in `.csv` or cannot be written.
pub fn write_forecast_csv(path: &Path, result: &FitResult) -> Result<()> {
    let file = generate_validate_filepath(path, "csv")?;
    let mut writer = Writer::from_writer(file);
    for row in result.forecast.rows() {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!("wrote forecast table to {}", path.display());
    Ok(())
}

/// Writes the [`FitSummary`] of `result` as pretty-printed JSON.
///
/// # Errors
/// Fails if `path` does not end in `.json` or cannot be written.
pub fn write_summary_json(path: &Path, result: &FitResult) -> Result<()> {
    let file = generate_validate_filepath(path, "json")?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &FitSummary::from(result))?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    info!("wrote fit summary to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FitConfig;
    use crate::forecast::ForecastRow;
    use crate::pipeline::fit_series;
    use crate::series::ObservedSeries;
    use tempfile::tempdir;

    fn result() -> FitResult {
        let series = ObservedSeries::from_counts(
            NaiveDate::from_ymd_opt(2020, 2, 15).unwrap(),
            &[2.0, 3.0, 5.0, 8.0, 13.0, 20.0, 30.0],
        )
        .unwrap();
        let config = FitConfig {
            horizon: 12,
            ..FitConfig::default()
        };
        fit_series("Testland", &series, &config).unwrap()
    }

    #[test]
    fn forecast_csv_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("testland_forecast.csv");
        let result = result();
        write_forecast_csv(&path, &result).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec!["date", "observed", "susceptible", "infected", "recovered"]
        );
        let rows: Vec<ForecastRow> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 12);
        assert_eq!(rows[0].observed, Some(2.0));
        assert_eq!(rows[6].observed, Some(30.0));
        assert_eq!(rows[7].observed, None);
        assert_eq!(rows[11].date, NaiveDate::from_ymd_opt(2020, 2, 26).unwrap());
    }

    #[test]
    fn missing_observations_are_empty_cells() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("forecast.csv");
        write_forecast_csv(&path, &result()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let last = text.lines().last().unwrap();
        assert!(last.starts_with("2020-02-26,,"), "{last}");
    }

    #[test]
    fn summary_json_contains_fit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fit.json");
        let result = result();
        write_summary_json(&path, &result).unwrap();

        let summary: FitSummary =
            serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(summary.region, "Testland");
        assert_eq!(summary.beta, result.estimate.parameters.beta);
        assert_eq!(summary.observed_days, 7);
        assert_eq!(summary.forecast_days, 12);
        assert_eq!(summary.first_date, NaiveDate::from_ymd_opt(2020, 2, 15));
        assert_eq!(summary.termination, result.estimate.termination);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"termination\": \""), "{text}");
    }

    #[test]
    fn wrong_extension_is_rejected() {
        let dir = tempdir().unwrap();
        let result = result();
        assert!(write_forecast_csv(&dir.path().join("forecast.tsv"), &result).is_err());
        assert!(write_summary_json(&dir.path().join("fit.txt"), &result).is_err());
    }
}
