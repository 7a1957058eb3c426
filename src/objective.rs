//! The fitting objective: how far a simulated Infected curve is from observed case counts.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SirFitError};
use crate::integrator::Integrator;
use crate::log::debug;
use crate::model::{SirModel, SirParameters};
use crate::numeric::root_mean_square_error;
use crate::series::ObservedSeries;
use crate::trajectory::Trajectory;

/// Score given to parameters whose simulation fails. It is finite so that a search can keep
/// comparing points, and larger than any RMSE a realistic case series can produce.
pub const DIVERGENCE_PENALTY: f64 = 1.0e15;

/// Minimum number of observed days needed to fit the two free parameters.
pub const MIN_OBSERVATIONS: usize = 2;

/// Compartment sizes at `t = 0`. They seed every simulation and are never estimated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialCondition {
    pub s0: f64,
    pub i0: f64,
    pub r0: f64,
}

impl InitialCondition {
    pub fn new(s0: f64, i0: f64, r0: f64) -> Self {
        Self { s0, i0, r0 }
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.s0, self.i0, self.r0]
    }

    /// # Errors
    /// Returns `SirFitError::InvalidConfig` unless all compartments are finite and
    /// non-negative.
    pub fn validate(&self) -> Result<()> {
        if self.as_array().iter().all(|v| v.is_finite() && *v >= 0.0) {
            Ok(())
        } else {
            Err(SirFitError::InvalidConfig(format!(
                "initial compartments must be finite and non-negative, got {self:?}"
            )))
        }
    }
}

impl Default for InitialCondition {
    fn default() -> Self {
        Self::new(2000.0, 2.0, 2.5)
    }
}

/// Simulates the SIR model from a fixed initial condition over `horizon` days.
///
/// # Errors
/// Returns `SirFitError::SolverDivergence` if the integrator fails.
pub fn simulate<I: Integrator>(
    integrator: &I,
    parameters: SirParameters,
    initial: &InitialCondition,
    horizon: usize,
) -> Result<Trajectory<3>> {
    let model = SirModel::new(parameters);
    Ok(integrator.integrate(&model, initial.as_array(), horizon)?)
}

/// Root-mean-square error between the simulated Infected compartment and an observed series.
///
/// The objective holds everything it needs explicitly, so evaluating it has no side effects and
/// gives the same answer for the same parameters every time.
#[derive(Debug, Clone)]
pub struct RmseObjective<'a, I> {
    observed: &'a ObservedSeries,
    initial: InitialCondition,
    integrator: I,
}

impl<'a, I: Integrator> RmseObjective<'a, I> {
    /// # Errors
    /// Returns `SirFitError::InsufficientData` if fewer than [`MIN_OBSERVATIONS`] days are
    /// observed, or `SirFitError::InvalidConfig` for an invalid initial condition.
    pub fn new(
        observed: &'a ObservedSeries,
        initial: InitialCondition,
        integrator: I,
    ) -> Result<Self> {
        observed.require_observations(MIN_OBSERVATIONS)?;
        initial.validate()?;
        Ok(Self {
            observed,
            initial,
            integrator,
        })
    }

    pub fn observed(&self) -> &ObservedSeries {
        self.observed
    }

    pub fn initial_condition(&self) -> &InitialCondition {
        &self.initial
    }

    pub fn integrator(&self) -> &I {
        &self.integrator
    }

    /// The RMSE at `parameters`, or the underlying failure.
    ///
    /// # Errors
    /// Returns `SirFitError::SolverDivergence` when the simulation cannot be completed.
    pub fn try_evaluate(&self, parameters: SirParameters) -> Result<f64> {
        let trajectory = simulate(
            &self.integrator,
            parameters,
            &self.initial,
            self.observed.len(),
        )?;
        root_mean_square_error(&trajectory.infected(), self.observed.values()).ok_or(
            SirFitError::InsufficientData {
                required: MIN_OBSERVATIONS,
                found: 0,
            },
        )
    }

    /// The RMSE at `parameters`; simulations that diverge score [`DIVERGENCE_PENALTY`].
    pub fn evaluate(&self, parameters: SirParameters) -> f64 {
        match self.try_evaluate(parameters) {
            Ok(loss) if loss.is_finite() => loss,
            Ok(loss) => {
                debug!("non-finite loss {loss} at {parameters:?}, scoring as divergent");
                DIVERGENCE_PENALTY
            }
            Err(e) => {
                debug!("objective penalised at {parameters:?}: {e}");
                DIVERGENCE_PENALTY
            }
        }
    }
}
