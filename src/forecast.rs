//! Forward projection of a fitted model.
//!
//! The forecaster never re-fits. It extends the calendar past the last observation, runs the
//! model over the whole extended horizon from the same initial condition used for fitting, and
//! lines the observations up against the simulation, padding the future with `None`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::estimator::Bounds;
use crate::integrator::Integrator;
use crate::log::debug;
use crate::model::SirParameters;
use crate::objective::{simulate, InitialCondition};
use crate::series::{DateIndex, ObservedSeries};
use crate::trajectory::Trajectory;

/// Total number of days (observed and future) covered by a forecast unless configured.
pub const DEFAULT_HORIZON: usize = 60;

/// One day of a forecast table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub date: NaiveDate,
    /// Observed count, `None` for days without an observation (including all future days).
    pub observed: Option<f64>,
    pub susceptible: f64,
    pub infected: f64,
    pub recovered: f64,
}

/// The extended index, the padded observations and the simulated trajectory over it.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    parameters: SirParameters,
    index: DateIndex,
    observed: Vec<Option<f64>>,
    observed_len: usize,
    trajectory: Trajectory<3>,
}

impl Forecast {
    pub fn parameters(&self) -> SirParameters {
        self.parameters
    }

    pub fn index(&self) -> &DateIndex {
        &self.index
    }

    /// Observations padded with `None` to the length of the index.
    pub fn observed(&self) -> &[Option<f64>] {
        &self.observed
    }

    /// Number of leading days that belong to the fitting window.
    pub fn observed_len(&self) -> usize {
        self.observed_len
    }

    pub fn trajectory(&self) -> &Trajectory<3> {
        &self.trajectory
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// The forecast as a table, one row per day.
    pub fn rows(&self) -> Vec<ForecastRow> {
        self.index
            .dates()
            .iter()
            .zip(&self.observed)
            .zip(self.trajectory.sir_states())
            .map(|((&date, &observed), state)| ForecastRow {
                date,
                observed,
                susceptible: state.s,
                infected: state.i,
                recovered: state.r,
            })
            .collect()
    }
}

/// Simulates fitted parameters forward over an extended calendar.
#[derive(Debug, Clone)]
pub struct Forecaster<I> {
    initial: InitialCondition,
    integrator: I,
    bounds: Bounds,
}

impl<I: Integrator> Forecaster<I> {
    /// A forecaster accepting parameters inside [`Bounds::default`].
    pub fn new(initial: InitialCondition, integrator: I) -> Self {
        Self {
            initial,
            integrator,
            bounds: Bounds::default(),
        }
    }

    /// Accepts parameters inside `bounds` instead, normally the box the estimator searched.
    #[must_use]
    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Projects `parameters` over `horizon` days counted from the first observed date.
    ///
    /// A horizon shorter than the observed series is widened to cover every observation.
    ///
    /// # Errors
    /// Returns `SirFitError::InvalidParameterRange` if `parameters` lie outside the bounds, and
    /// fails if the series is empty or the simulation diverges.
    pub fn forecast(
        &self,
        parameters: SirParameters,
        observed: &ObservedSeries,
        horizon: usize,
    ) -> Result<Forecast> {
        self.bounds.check(parameters)?;
        let index = observed.index().extended_to(horizon)?;
        let size = index.len();
        debug!(
            "forecasting {} days ({} observed) with beta={:e} gamma={:e}",
            size,
            observed.len(),
            parameters.beta,
            parameters.gamma
        );

        let mut padded = observed.values().to_vec();
        padded.resize(size, None);

        let trajectory = simulate(&self.integrator, parameters, &self.initial, size)?;
        Ok(Forecast {
            parameters,
            index,
            observed: padded,
            observed_len: observed.len(),
            trajectory,
        })
    }
}
