//! Fit then forecast, for one region.

use crate::config::FitConfig;
use crate::error::Result;
use crate::estimator::{Estimate, NelderMead};
use crate::forecast::{Forecast, Forecaster};
use crate::log::{info, warn};
use crate::objective::RmseObjective;
use crate::series::ObservedSeries;

/// Everything one run produces.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub region: String,
    pub estimate: Estimate,
    pub forecast: Forecast,
}

/// Fits `series` with the settings in `config` and projects the fitted model over
/// `config.horizon` days.
///
/// # Errors
/// Fails if the series has too few observations, the configuration is invalid, or the
/// forecast simulation diverges at the fitted parameters.
pub fn fit_series(region: &str, series: &ObservedSeries, config: &FitConfig) -> Result<FitResult> {
    config.validate()?;
    let objective = RmseObjective::new(series, config.initial_condition, config.integrator)?;
    let estimate =
        NelderMead::new(config.estimator).estimate(&objective, config.initial_guess, config.bounds)?;
    if !estimate.converged {
        warn!(
            "{region}: optimizer stopped early ({:?}), reporting best point found",
            estimate.termination
        );
    }
    info!(
        "{region}: beta={:e} gamma={:e} rmse={:.4}",
        estimate.parameters.beta, estimate.parameters.gamma, estimate.loss
    );

    let forecast = Forecaster::new(config.initial_condition, config.integrator)
        .with_bounds(config.bounds)
        .forecast(estimate.parameters, series, config.horizon)?;
    Ok(FitResult {
        region: region.to_string(),
        estimate,
        forecast,
    })
}
