//! Bounded parameter estimation.
//!
//! The search is a Nelder–Mead simplex over `(beta, gamma)`, with every trial point projected
//! back onto the box of admissible values. It is a local method: it returns the best point it
//! finds near the initial guess and makes no claim of global optimality.
//!
//! Stopping on a budget (iterations, objective evaluations or wall-clock time) is not an error.
//! The best point so far is returned with [`Estimate::converged`] set to `false` so the caller
//! can decide whether to trust it.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SirFitError};
use crate::integrator::Integrator;
use crate::log::{debug, info, trace, warn};
use crate::model::SirParameters;
use crate::objective::RmseObjective;

/// Something the estimator can minimise.
pub trait Objective {
    fn evaluate(&self, parameters: SirParameters) -> f64;
}

impl<F> Objective for F
where
    F: Fn(SirParameters) -> f64,
{
    fn evaluate(&self, parameters: SirParameters) -> f64 {
        self(parameters)
    }
}

impl<I: Integrator> Objective for RmseObjective<'_, I> {
    fn evaluate(&self, parameters: SirParameters) -> f64 {
        RmseObjective::evaluate(self, parameters)
    }
}

/// The closed box `[lower, upper]` that both beta and gamma must lie in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    lower: f64,
    upper: f64,
}

impl Bounds {
    /// # Errors
    /// Returns `SirFitError::InvalidConfig` unless `0 < lower < upper` and both are finite.
    pub fn new(lower: f64, upper: f64) -> Result<Self> {
        let bounds = Self { lower, upper };
        bounds.validate()?;
        Ok(bounds)
    }

    /// # Errors
    /// Returns `SirFitError::InvalidConfig` unless `0 < lower < upper` and both are finite.
    pub fn validate(&self) -> Result<()> {
        if self.lower.is_finite() && self.upper.is_finite() && 0.0 < self.lower && self.lower < self.upper
        {
            Ok(())
        } else {
            Err(SirFitError::InvalidConfig(format!(
                "parameter bounds must satisfy 0 < lower < upper, got [{}, {}]",
                self.lower, self.upper
            )))
        }
    }

    pub fn lower(&self) -> f64 {
        self.lower
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn contains(&self, parameters: SirParameters) -> bool {
        parameters
            .as_array()
            .iter()
            .all(|v| (self.lower..=self.upper).contains(v))
    }

    /// # Errors
    /// Returns `SirFitError::InvalidParameterRange` if `parameters` lie outside the box.
    pub fn check(&self, parameters: SirParameters) -> Result<()> {
        if self.contains(parameters) {
            Ok(())
        } else {
            Err(SirFitError::InvalidParameterRange {
                beta: parameters.beta,
                gamma: parameters.gamma,
                lower: self.lower,
                upper: self.upper,
            })
        }
    }

    fn project(&self, x: [f64; 2]) -> [f64; 2] {
        x.map(|v| v.clamp(self.lower, self.upper))
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            lower: 1e-8,
            upper: 0.4,
        }
    }
}

/// Stopping rules for [`NelderMead`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorOptions {
    /// Maximum number of simplex iterations, summed over restarts.
    pub max_iterations: usize,
    /// Maximum number of objective evaluations, summed over restarts.
    pub max_evaluations: usize,
    /// Converged when every vertex is within this fraction of the best vertex, per coordinate.
    pub x_tolerance: f64,
    /// Converged when every vertex value is within `f_tolerance * (1 + |best|)` of the best.
    pub f_tolerance: f64,
    /// How many times to rebuild the simplex around a converged point to confirm it.
    pub restarts: usize,
    /// Optional wall-clock limit for the whole search.
    #[serde(skip)]
    pub time_budget: Option<Duration>,
}

impl Default for EstimatorOptions {
    fn default() -> Self {
        Self {
            max_iterations: 4_000,
            max_evaluations: 8_000,
            x_tolerance: 1e-8,
            f_tolerance: 1e-10,
            restarts: 3,
            time_budget: None,
        }
    }
}

/// Why the search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Converged,
    IterationBudget,
    EvaluationBudget,
    TimeBudget,
}

/// Result of a parameter search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub parameters: SirParameters,
    /// Objective value at `parameters`.
    pub loss: f64,
    /// `false` when a budget ran out before the tolerances were met.
    pub converged: bool,
    pub termination: Termination,
    pub iterations: usize,
    pub evaluations: usize,
}

// Standard reflection, expansion, contraction and shrink coefficients.
const RHO: f64 = 1.0;
const CHI: f64 = 2.0;
const PSI: f64 = 0.5;
const SIGMA: f64 = 0.5;

/// Relative size of the initial simplex edges, and the edge used for a zero coordinate.
const NONZERO_STEP: f64 = 0.05;
const ZERO_STEP: f64 = 0.00025;

#[derive(Clone, Copy)]
struct Vertex {
    x: [f64; 2],
    f: f64,
}

/// Bounded Nelder–Mead simplex search.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NelderMead {
    options: EstimatorOptions,
}

struct Search<'a, O: ?Sized> {
    objective: &'a O,
    bounds: Bounds,
    options: EstimatorOptions,
    started: Instant,
    iterations: usize,
    evaluations: usize,
}

impl<O: Objective + ?Sized> Search<'_, O> {
    fn eval(&mut self, x: [f64; 2]) -> Vertex {
        let x = self.bounds.project(x);
        self.evaluations += 1;
        let f = self.objective.evaluate(SirParameters::from_array(x));
        // NaN would break the ordering of the simplex.
        let f = if f.is_nan() { f64::INFINITY } else { f };
        Vertex { x, f }
    }

    fn exhausted(&self) -> Option<Termination> {
        if self.iterations >= self.options.max_iterations {
            Some(Termination::IterationBudget)
        } else if self.evaluations >= self.options.max_evaluations {
            Some(Termination::EvaluationBudget)
        } else if self
            .options
            .time_budget
            .is_some_and(|budget| self.started.elapsed() >= budget)
        {
            Some(Termination::TimeBudget)
        } else {
            None
        }
    }

    fn initial_simplex(&mut self, x0: [f64; 2]) -> [Vertex; 3] {
        let mut simplex = [self.eval(x0); 3];
        for k in 0..2 {
            let mut x = x0;
            let step = if x[k] != 0.0 {
                NONZERO_STEP * x[k]
            } else {
                ZERO_STEP
            };
            // Step inwards when the outward vertex would be clamped onto the first one.
            x[k] = if x[k] + step <= self.bounds.upper() {
                x[k] + step
            } else {
                x[k] - step
            };
            simplex[k + 1] = self.eval(x);
        }
        simplex
    }

    fn has_converged(&self, simplex: &[Vertex; 3]) -> bool {
        let best = simplex[0];
        simplex[1..].iter().all(|v| {
            let x_close = (0..2).all(|k| {
                (v.x[k] - best.x[k]).abs() <= self.options.x_tolerance * best.x[k].abs()
            });
            let f_close = (v.f - best.f).abs() <= self.options.f_tolerance * (1.0 + best.f.abs());
            x_close && f_close
        })
    }

    /// Runs one simplex descent from `x0`; returns the best vertex and how it stopped.
    fn descend(&mut self, x0: [f64; 2]) -> (Vertex, Termination) {
        let mut simplex = self.initial_simplex(x0);
        loop {
            simplex.sort_by(|a, b| a.f.total_cmp(&b.f));
            if self.has_converged(&simplex) {
                return (simplex[0], Termination::Converged);
            }
            if let Some(reason) = self.exhausted() {
                return (simplex[0], reason);
            }
            self.iterations += 1;

            let [best, second, worst] = simplex;
            let centroid = [0.5 * (best.x[0] + second.x[0]), 0.5 * (best.x[1] + second.x[1])];
            let along = |scale: f64, from: [f64; 2]| -> [f64; 2] {
                [
                    centroid[0] + scale * (from[0] - centroid[0]),
                    centroid[1] + scale * (from[1] - centroid[1]),
                ]
            };

            let reflected = self.eval(along(-RHO, worst.x));
            if reflected.f < best.f {
                let expanded = self.eval(along(-RHO * CHI, worst.x));
                simplex[2] = if expanded.f < reflected.f {
                    expanded
                } else {
                    reflected
                };
                continue;
            }
            if reflected.f < second.f {
                simplex[2] = reflected;
                continue;
            }

            let contracted = if reflected.f < worst.f {
                let outside = self.eval(along(-RHO * PSI, worst.x));
                (outside.f <= reflected.f).then_some(outside)
            } else {
                let inside = self.eval(along(PSI, worst.x));
                (inside.f < worst.f).then_some(inside)
            };
            match contracted {
                Some(vertex) => simplex[2] = vertex,
                None => {
                    trace!("shrinking simplex towards {:?}", best.x);
                    for k in 1..3 {
                        let x = simplex[k].x;
                        simplex[k] = self.eval([
                            best.x[0] + SIGMA * (x[0] - best.x[0]),
                            best.x[1] + SIGMA * (x[1] - best.x[1]),
                        ]);
                    }
                }
            }
        }
    }
}

impl NelderMead {
    pub fn new(options: EstimatorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EstimatorOptions {
        &self.options
    }

    /// Minimises `objective` over `bounds`, starting at `initial_guess`.
    ///
    /// # Errors
    /// Returns `SirFitError::InvalidParameterRange` if the initial guess lies outside the box,
    /// or `SirFitError::InvalidConfig` for malformed bounds.
    pub fn estimate<O: Objective + ?Sized>(
        &self,
        objective: &O,
        initial_guess: SirParameters,
        bounds: Bounds,
    ) -> Result<Estimate> {
        bounds.validate()?;
        bounds.check(initial_guess)?;

        let mut search = Search {
            objective,
            bounds,
            options: self.options,
            started: Instant::now(),
            iterations: 0,
            evaluations: 0,
        };

        let (mut best, mut termination) = search.descend(initial_guess.as_array());
        for restart in 0..self.options.restarts {
            if termination != Termination::Converged {
                break;
            }
            let (candidate, reason) = search.descend(best.x);
            debug!(
                "restart {} moved loss from {:e} to {:e}",
                restart + 1,
                best.f,
                candidate.f
            );
            let improvement = best.f - candidate.f;
            termination = reason;
            if candidate.f < best.f {
                best = candidate;
            }
            if improvement <= self.options.f_tolerance * (1.0 + best.f.abs()) {
                break;
            }
        }

        let estimate = Estimate {
            parameters: SirParameters::from_array(best.x),
            loss: best.f,
            converged: termination == Termination::Converged,
            termination,
            iterations: search.iterations,
            evaluations: search.evaluations,
        };
        if estimate.converged {
            info!(
                "estimate converged: beta={:e} gamma={:e} loss={:e} after {} iterations",
                estimate.parameters.beta,
                estimate.parameters.gamma,
                estimate.loss,
                estimate.iterations
            );
        } else {
            warn!(
                "optimizer did not converge ({:?}); best beta={:e} gamma={:e} loss={:e}",
                estimate.termination,
                estimate.parameters.beta,
                estimate.parameters.gamma,
                estimate.loss
            );
        }
        Ok(estimate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrator::DormandPrince;
    use crate::objective::{simulate, InitialCondition};
    use crate::series::ObservedSeries;
    use chrono::NaiveDate;

    fn quadratic(p: SirParameters) -> f64 {
        (p.beta - 0.12).powi(2) + 10.0 * (p.gamma - 0.03).powi(2)
    }

    #[test]
    fn bounds_validation() {
        assert!(Bounds::new(1e-8, 0.4).is_ok());
        assert!(Bounds::new(0.0, 0.4).is_err());
        assert!(Bounds::new(0.4, 0.1).is_err());
        assert!(Bounds::new(1e-8, f64::INFINITY).is_err());
    }

    #[test]
    fn out_of_range_guess_is_rejected() {
        let result = NelderMead::default().estimate(
            &quadratic,
            SirParameters::new(0.5, 0.001),
            Bounds::default(),
        );
        assert!(matches!(
            result,
            Err(SirFitError::InvalidParameterRange { beta, .. }) if beta == 0.5
        ));
    }

    #[test]
    fn minimises_a_quadratic() {
        let estimate = NelderMead::default()
            .estimate(&quadratic, SirParameters::new(0.001, 0.001), Bounds::default())
            .unwrap();
        assert!(estimate.converged);
        assert!((estimate.parameters.beta - 0.12).abs() < 1e-6);
        assert!((estimate.parameters.gamma - 0.03).abs() < 1e-6);
    }

    #[test]
    fn respects_the_box() {
        // Unconstrained minimum at (1, -1) lies outside the box.
        let objective = |p: SirParameters| (p.beta - 1.0).powi(2) + (p.gamma + 1.0).powi(2);
        let bounds = Bounds::default();
        let estimate = NelderMead::default()
            .estimate(&objective, SirParameters::new(0.001, 0.001), bounds)
            .unwrap();
        assert!(bounds.contains(estimate.parameters));
        assert!((estimate.parameters.beta - 0.4).abs() < 1e-6);
        assert!((estimate.parameters.gamma - 1e-8).abs() < 1e-6);
    }

    #[test]
    fn budget_exhaustion_returns_best_point() {
        let options = EstimatorOptions {
            max_iterations: 5,
            ..EstimatorOptions::default()
        };
        let start = SirParameters::new(0.001, 0.001);
        let estimate = NelderMead::new(options)
            .estimate(&quadratic, start, Bounds::default())
            .unwrap();
        assert!(!estimate.converged);
        assert_eq!(estimate.termination, Termination::IterationBudget);
        assert!(estimate.loss <= quadratic(start));
        assert!(estimate.loss.is_finite());
    }

    #[test]
    fn zero_time_budget_stops_immediately() {
        let options = EstimatorOptions {
            time_budget: Some(Duration::ZERO),
            ..EstimatorOptions::default()
        };
        let estimate = NelderMead::new(options)
            .estimate(&quadratic, SirParameters::new(0.001, 0.001), Bounds::default())
            .unwrap();
        assert_eq!(estimate.termination, Termination::TimeBudget);
        assert_eq!(estimate.iterations, 0);
    }

    #[test]
    fn nan_objective_does_not_poison_search() {
        let objective = |p: SirParameters| {
            if p.gamma > 0.2 {
                f64::NAN
            } else {
                quadratic(p)
            }
        };
        let estimate = NelderMead::default()
            .estimate(&objective, SirParameters::new(0.001, 0.001), Bounds::default())
            .unwrap();
        assert!(estimate.loss.is_finite());
    }

    #[test]
    fn recovers_sir_parameters_from_synthetic_data() {
        let truth = SirParameters::new(0.0002, 0.1);
        let initial = InitialCondition::default();
        let integrator = DormandPrince::default();
        let infected = simulate(&integrator, truth, &initial, 60)
            .unwrap()
            .infected();
        let observed =
            ObservedSeries::from_counts(NaiveDate::from_ymd_opt(2020, 2, 15).unwrap(), &infected)
                .unwrap();
        let objective = RmseObjective::new(&observed, initial, integrator).unwrap();

        let estimate = NelderMead::default()
            .estimate(&objective, SirParameters::new(0.001, 0.001), Bounds::default())
            .unwrap();
        assert!(
            (estimate.parameters.beta - truth.beta).abs() / truth.beta < 0.01,
            "{estimate:?}"
        );
        assert!(
            (estimate.parameters.gamma - truth.gamma).abs() / truth.gamma < 0.01,
            "{estimate:?}"
        );
        assert!(estimate.loss < 1e-2);
    }
}
