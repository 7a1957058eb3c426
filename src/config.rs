//! Run configuration.
//!
//! A [`FitConfig`] gathers every constant the fitting pipeline consumes: the initial
//! compartments, the initial guess and search box for the parameters, the forecast horizon, the
//! per-region start dates and the solver and optimizer settings. It can be loaded from a JSON
//! file; every field is optional and falls back to its default.
//!
//! ```json
//! {
//!     "initial_condition": { "s0": 2000.0, "i0": 2.0, "r0": 2.5 },
//!     "initial_guess": { "beta": 0.001, "gamma": 0.001 },
//!     "bounds": { "lower": 1e-8, "upper": 0.4 },
//!     "horizon": 60,
//!     "start_dates": { "Washington": "2/15/20" },
//!     "integrator": { "method": "dormand_prince", "rtol": 1e-6, "atol": 1e-9 },
//!     "estimator": { "max_iterations": 4000, "restarts": 3 }
//! }
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SirFitError};
use crate::estimator::{Bounds, EstimatorOptions};
use crate::forecast::DEFAULT_HORIZON;
use crate::integrator::{ClassicRk4, Solver};
use crate::log::trace;
use crate::model::SirParameters;
use crate::objective::InitialCondition;
use crate::series::parse_date;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FitConfig {
    pub initial_condition: InitialCondition,
    pub initial_guess: SirParameters,
    pub bounds: Bounds,
    /// Total days covered by the forecast, counted from the first observed day.
    pub horizon: usize,
    /// First day of data to fit, per region. Regions without an entry use the whole series.
    pub start_dates: BTreeMap<String, String>,
    pub integrator: Solver,
    pub estimator: EstimatorOptions,
}

impl Default for FitConfig {
    fn default() -> Self {
        let start_dates = [("Michigan", "2/15/20"), ("Washington", "2/15/20")]
            .into_iter()
            .map(|(region, date)| (region.to_string(), date.to_string()))
            .collect();
        Self {
            initial_condition: InitialCondition::default(),
            initial_guess: SirParameters::new(0.001, 0.001),
            bounds: Bounds::default(),
            horizon: DEFAULT_HORIZON,
            start_dates,
            integrator: Solver::default(),
            estimator: EstimatorOptions::default(),
        }
    }
}

impl FitConfig {
    /// Reads a configuration from a JSON file and validates it.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or the values are invalid.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        trace!("loading configuration from {}", path.display());
        let file = File::open(path)?;
        let config: FitConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns `SirFitError::InvalidConfig`, `SirFitError::InvalidParameterRange` or
    /// `SirFitError::DateParse` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.initial_condition.validate()?;
        self.bounds.validate()?;
        self.bounds.check(self.initial_guess)?;
        if self.horizon == 0 {
            return Err(SirFitError::InvalidConfig(
                "horizon must be at least one day".to_string(),
            ));
        }
        for date in self.start_dates.values() {
            parse_date(date)?;
        }
        match self.integrator {
            Solver::DormandPrince(options)
                if !(options.rtol > 0.0 && options.atol > 0.0 && options.max_steps > 0) =>
            {
                Err(SirFitError::InvalidConfig(
                    "integrator tolerances and step budget must be positive".to_string(),
                ))
            }
            Solver::Rk4 { steps_per_day } => {
                let population: f64 = self.initial_condition.as_array().iter().sum();
                let required = ClassicRk4::min_steps_per_day(self.bounds.upper() * population);
                if steps_per_day < required {
                    return Err(SirFitError::InvalidConfig(format!(
                        "rk4 needs at least {required} steps per day for beta up to {} with a \
                         population of {population}, got {steps_per_day}",
                        self.bounds.upper()
                    )));
                }
                Ok(())
            }
            Solver::DormandPrince(_) => Ok(()),
        }
    }

    /// The configured first day of data for `region`, if any.
    ///
    /// # Errors
    /// Returns `SirFitError::DateParse` if the configured date is malformed.
    pub fn start_date(&self, region: &str) -> Result<Option<NaiveDate>> {
        self.start_dates
            .get(region)
            .map(|date| parse_date(date))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_are_valid() {
        let config = FitConfig::default();
        config.validate().unwrap();
        assert_eq!(config.horizon, 60);
        assert_eq!(config.initial_condition, InitialCondition::new(2000.0, 2.0, 2.5));
        assert_eq!(
            config.start_date("Washington").unwrap(),
            NaiveDate::from_ymd_opt(2020, 2, 15)
        );
        assert_eq!(config.start_date("Oregon").unwrap(), None);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let file = write_config(
            r#"{ "horizon": 90, "initial_condition": { "s0": 1e6, "i0": 10.0, "r0": 0.0 } }"#,
        );
        let config = FitConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.horizon, 90);
        assert_eq!(config.initial_condition.s0, 1e6);
        assert_eq!(config.bounds, Bounds::default());
        assert_eq!(config.initial_guess, SirParameters::new(0.001, 0.001));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let file = write_config(r#"{ "horizn": 90 }"#);
        assert!(matches!(
            FitConfig::from_json_file(file.path()),
            Err(SirFitError::JsonError(_))
        ));
    }

    #[test]
    fn guess_outside_bounds_is_rejected() {
        let file = write_config(r#"{ "initial_guess": { "beta": 0.9, "gamma": 0.001 } }"#);
        assert!(matches!(
            FitConfig::from_json_file(file.path()),
            Err(SirFitError::InvalidParameterRange { .. })
        ));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let config = FitConfig {
            horizon: 0,
            ..FitConfig::default()
        };
        assert!(matches!(config.validate(), Err(SirFitError::InvalidConfig(_))));

        let mut config = FitConfig::default();
        config
            .start_dates
            .insert("Nowhere".to_string(), "someday".to_string());
        assert!(matches!(config.validate(), Err(SirFitError::DateParse(_))));

        let config = FitConfig {
            integrator: Solver::Rk4 { steps_per_day: 0 },
            ..FitConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rk4_step_count_must_match_the_fastest_rate() {
        // beta up to 0.4 with about 2000 people needs 321 sub-steps per day.
        let config = FitConfig {
            integrator: Solver::Rk4 { steps_per_day: 10 },
            ..FitConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SirFitError::InvalidConfig(ref msg)) if msg.contains("321")
        ));

        let config = FitConfig {
            integrator: Solver::Rk4 { steps_per_day: 321 },
            ..FitConfig::default()
        };
        config.validate().unwrap();

        let config = FitConfig {
            integrator: Solver::Rk4 { steps_per_day: 10 },
            bounds: Bounds::new(1e-8, 0.01).unwrap(),
            initial_guess: SirParameters::new(0.001, 0.001),
            ..FitConfig::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            FitConfig::from_json_file(Path::new("/nonexistent/sirfit.json")),
            Err(SirFitError::IoError(_))
        ));
    }
}
