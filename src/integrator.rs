//! Numerical integration of [`OdeSystem`]s sampled at integer days.
//!
//! Two explicit Runge–Kutta schemes are provided:
//!
//! - [`DormandPrince`]: adaptive 5(4) pair with local error control. Steps are clipped so that
//!   every integer sample time is reached exactly, so no interpolation is needed.
//! - [`ClassicRk4`]: fixed-step fourth order scheme with a configurable number of sub-steps per
//!   day.
//!
//! Neither scheme returns NaN silently. A trajectory either contains only finite values or the
//! integration fails with an [`IntegrationError`] saying where and why.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::log::{debug, trace};
use crate::model::OdeSystem;
use crate::trajectory::Trajectory;

/// Why an integration could not produce a finite trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IntegrationError {
    /// A state or derivative became NaN or infinite at time `t`.
    NonFinite { t: f64 },
    /// The adaptive controller shrank the step below what `t` can resolve.
    StepSizeUnderflow { t: f64 },
    /// `max_steps` attempts were used up before reaching the horizon.
    StepBudgetExhausted { t: f64, steps: usize },
    /// A horizon of zero sample points was requested.
    ZeroHorizon,
}

impl Display for IntegrationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IntegrationError::NonFinite { t } => write!(f, "non-finite state at t={t}"),
            IntegrationError::StepSizeUnderflow { t } => {
                write!(f, "step size underflow at t={t}")
            }
            IntegrationError::StepBudgetExhausted { t, steps } => {
                write!(f, "step budget of {steps} exhausted at t={t}")
            }
            IntegrationError::ZeroHorizon => write!(f, "horizon must contain at least one sample"),
        }
    }
}

impl std::error::Error for IntegrationError {}

/// Advances an [`OdeSystem`] from `y0` at `t = 0` and records its state at `t = 0, 1, ...,
/// horizon - 1`.
pub trait Integrator {
    /// # Errors
    /// Returns an [`IntegrationError`] if the horizon is empty or the solution cannot be
    /// continued with finite values.
    fn integrate<S, const N: usize>(
        &self,
        system: &S,
        y0: [f64; N],
        horizon: usize,
    ) -> Result<Trajectory<N>, IntegrationError>
    where
        S: OdeSystem<N> + ?Sized;
}

/// Tolerances and budget for [`DormandPrince`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorOptions {
    /// Relative tolerance on the local error.
    pub rtol: f64,
    /// Absolute tolerance on the local error.
    pub atol: f64,
    /// Maximum number of attempted steps (accepted and rejected) over the whole horizon.
    pub max_steps: usize,
    /// First step to try; chosen from the derivative at `t = 0` when `None`.
    pub initial_step: Option<f64>,
}

impl Default for IntegratorOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-9,
            max_steps: 100_000,
            initial_step: None,
        }
    }
}

// Dormand–Prince 5(4) tableau.
const C: [f64; 6] = [1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];
const A2: [f64; 1] = [1.0 / 5.0];
const A3: [f64; 2] = [3.0 / 40.0, 9.0 / 40.0];
const A4: [f64; 3] = [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0];
const A5: [f64; 4] = [
    19372.0 / 6561.0,
    -25360.0 / 2187.0,
    64448.0 / 6561.0,
    -212.0 / 729.0,
];
const A6: [f64; 5] = [
    9017.0 / 3168.0,
    -355.0 / 33.0,
    46732.0 / 5247.0,
    49.0 / 176.0,
    -5103.0 / 18656.0,
];
// Fifth order weights; the second stage weight is zero.
const B: [f64; 6] = [
    35.0 / 384.0,
    0.0,
    500.0 / 1113.0,
    125.0 / 192.0,
    -2187.0 / 6784.0,
    11.0 / 84.0,
];
// Difference between the fifth and embedded fourth order weights (7 stages, FSAL).
const E: [f64; 7] = [
    71.0 / 57600.0,
    0.0,
    -71.0 / 16695.0,
    71.0 / 1920.0,
    -17253.0 / 339200.0,
    22.0 / 525.0,
    -1.0 / 40.0,
];

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;
const ERROR_EXPONENT: f64 = -1.0 / 5.0;

/// Adaptive Dormand–Prince 5(4) integrator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DormandPrince {
    options: IntegratorOptions,
}

struct StepOutcome<const N: usize> {
    y_new: [f64; N],
    f_new: [f64; N],
    error_norm: f64,
}

impl DormandPrince {
    pub fn new(options: IntegratorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &IntegratorOptions {
        &self.options
    }

    fn error_scale(&self, a: f64, b: f64) -> f64 {
        self.options.atol + self.options.rtol * a.abs().max(b.abs())
    }

    fn rms_norm(values: impl Iterator<Item = f64>, n: usize) -> f64 {
        (values.map(|v| v * v).sum::<f64>() / n as f64).sqrt()
    }

    /// Picks a first step from the size of the derivative relative to the state.
    fn initial_step<S, const N: usize>(&self, system: &S, y0: &[f64; N], f0: &[f64; N]) -> f64
    where
        S: OdeSystem<N> + ?Sized,
    {
        let scale: [f64; N] = std::array::from_fn(|i| self.error_scale(y0[i], y0[i]));
        let d0 = Self::rms_norm((0..N).map(|i| y0[i] / scale[i]), N);
        let d1 = Self::rms_norm((0..N).map(|i| f0[i] / scale[i]), N);
        let h0 = if d0 < 1e-5 || d1 < 1e-5 {
            1e-6
        } else {
            0.01 * d0 / d1
        };
        let y1: [f64; N] = std::array::from_fn(|i| y0[i] + h0 * f0[i]);
        let f1 = system.derivative(h0, &y1);
        let d2 = Self::rms_norm((0..N).map(|i| (f1[i] - f0[i]) / scale[i]), N) / h0;
        let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / d1.max(d2)).powf(1.0 / 5.0)
        };
        let h = (100.0 * h0).min(h1);
        if h.is_finite() && h > 0.0 {
            h
        } else {
            1e-6
        }
    }

    fn step<S, const N: usize>(
        &self,
        system: &S,
        t: f64,
        y: &[f64; N],
        f0: &[f64; N],
        h: f64,
    ) -> StepOutcome<N>
    where
        S: OdeSystem<N> + ?Sized,
    {
        let k1 = *f0;
        let stage = |coeffs: &[f64], ks: &[&[f64; N]]| -> [f64; N] {
            std::array::from_fn(|i| {
                y[i] + h * coeffs
                    .iter()
                    .zip(ks)
                    .map(|(a, k)| a * k[i])
                    .sum::<f64>()
            })
        };
        let k2 = system.derivative(t + C[0] * h, &stage(&A2, &[&k1]));
        let k3 = system.derivative(t + C[1] * h, &stage(&A3, &[&k1, &k2]));
        let k4 = system.derivative(t + C[2] * h, &stage(&A4, &[&k1, &k2, &k3]));
        let k5 = system.derivative(t + C[3] * h, &stage(&A5, &[&k1, &k2, &k3, &k4]));
        let k6 = system.derivative(t + C[4] * h, &stage(&A6, &[&k1, &k2, &k3, &k4, &k5]));
        let y_new = stage(&B, &[&k1, &k2, &k3, &k4, &k5, &k6]);
        let k7 = system.derivative(t + C[5] * h, &y_new);

        let ks = [&k1, &k2, &k3, &k4, &k5, &k6, &k7];
        let error_norm = Self::rms_norm(
            (0..N).map(|i| {
                let err = h * E.iter().zip(&ks).map(|(e, k)| e * k[i]).sum::<f64>();
                err / self.error_scale(y[i], y_new[i])
            }),
            N,
        );

        StepOutcome {
            y_new,
            f_new: k7,
            error_norm,
        }
    }
}

impl Integrator for DormandPrince {
    fn integrate<S, const N: usize>(
        &self,
        system: &S,
        y0: [f64; N],
        horizon: usize,
    ) -> Result<Trajectory<N>, IntegrationError>
    where
        S: OdeSystem<N> + ?Sized,
    {
        if horizon == 0 {
            return Err(IntegrationError::ZeroHorizon);
        }
        if y0.iter().any(|v| !v.is_finite()) {
            return Err(IntegrationError::NonFinite { t: 0.0 });
        }

        let mut states = Vec::with_capacity(horizon);
        states.push(y0);

        let mut t = 0.0;
        let mut y = y0;
        let mut f = system.derivative(t, &y);
        if f.iter().any(|v| !v.is_finite()) {
            return Err(IntegrationError::NonFinite { t });
        }
        let mut h = self
            .options
            .initial_step
            .unwrap_or_else(|| self.initial_step(system, &y, &f));
        let mut attempts = 0usize;

        for sample in 1..horizon {
            let target = sample as f64;
            while t < target {
                if attempts >= self.options.max_steps {
                    debug!("integration budget exhausted at t={t} after {attempts} steps");
                    return Err(IntegrationError::StepBudgetExhausted { t, steps: attempts });
                }
                attempts += 1;

                let min_step = 10.0 * f64::EPSILON * t.abs().max(1.0);
                if h < min_step {
                    debug!("step size underflow at t={t} (h={h:e})");
                    return Err(IntegrationError::StepSizeUnderflow { t });
                }

                let remaining = target - t;
                let clipped = h >= remaining;
                let h_try = if clipped { remaining } else { h };

                let outcome = self.step(system, t, &y, &f, h_try);
                if !outcome.error_norm.is_finite() {
                    trace!("rejecting non-finite step at t={t} (h={h_try:e})");
                    h = h_try * MIN_FACTOR;
                    continue;
                }

                if outcome.error_norm <= 1.0 {
                    if outcome.y_new.iter().any(|v| !v.is_finite()) {
                        return Err(IntegrationError::NonFinite { t: t + h_try });
                    }
                    t = if clipped { target } else { t + h_try };
                    y = outcome.y_new;
                    f = outcome.f_new;
                    let factor = if outcome.error_norm == 0.0 {
                        MAX_FACTOR
                    } else {
                        (SAFETY * outcome.error_norm.powf(ERROR_EXPONENT)).min(MAX_FACTOR)
                    };
                    // A clipped step says nothing about how large the next one may be.
                    h = if clipped {
                        h.max(h_try * factor)
                    } else {
                        h_try * factor
                    };
                } else {
                    let factor =
                        (SAFETY * outcome.error_norm.powf(ERROR_EXPONENT)).max(MIN_FACTOR);
                    h = h_try * factor;
                }
            }
            states.push(y);
        }

        trace!("integrated {horizon} samples in {attempts} steps");
        Ok(Trajectory::from_states(states))
    }
}

/// Largest `|h * rate|` kept by [`ClassicRk4`]; the real stability interval of RK4 ends near 2.78.
pub const RK4_STABILITY_LIMIT: f64 = 2.5;

/// Fixed-step classic fourth order Runge–Kutta.
///
/// The step is not adapted, so it must resolve the fastest rate in the system. For the SIR model
/// that is `beta * N` with `N = S + I + R`: once the infected compartment approaches the whole
/// population, the susceptible compartment decays at that rate, and a sub-step with
/// `h * beta * N` beyond [`RK4_STABILITY_LIMIT`] overflows. See
/// [`ClassicRk4::min_steps_per_day`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassicRk4 {
    steps_per_day: usize,
}

impl ClassicRk4 {
    /// Uses `steps_per_day` equal sub-steps between consecutive samples (at least one).
    pub fn new(steps_per_day: usize) -> Self {
        Self {
            steps_per_day: steps_per_day.max(1),
        }
    }

    pub fn steps_per_day(&self) -> usize {
        self.steps_per_day
    }

    /// Fewest sub-steps per day that keep a system whose fastest rate is `max_rate` (per day)
    /// inside the stability interval.
    pub fn min_steps_per_day(max_rate: f64) -> usize {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let steps = (max_rate.abs() / RK4_STABILITY_LIMIT).ceil() as usize;
        steps.max(1)
    }
}

impl Default for ClassicRk4 {
    fn default() -> Self {
        Self::new(10)
    }
}

fn rk4_step<S, const N: usize>(system: &S, t: f64, y: &[f64; N], dt: f64) -> [f64; N]
where
    S: OdeSystem<N> + ?Sized,
{
    let k1 = system.derivative(t, y);
    let ytmp: [f64; N] = std::array::from_fn(|i| y[i] + 0.5 * dt * k1[i]);
    let k2 = system.derivative(t + 0.5 * dt, &ytmp);
    let ytmp: [f64; N] = std::array::from_fn(|i| y[i] + 0.5 * dt * k2[i]);
    let k3 = system.derivative(t + 0.5 * dt, &ytmp);
    let ytmp: [f64; N] = std::array::from_fn(|i| y[i] + dt * k3[i]);
    let k4 = system.derivative(t + dt, &ytmp);
    std::array::from_fn(|i| y[i] + (dt / 6.0) * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]))
}

impl Integrator for ClassicRk4 {
    fn integrate<S, const N: usize>(
        &self,
        system: &S,
        y0: [f64; N],
        horizon: usize,
    ) -> Result<Trajectory<N>, IntegrationError>
    where
        S: OdeSystem<N> + ?Sized,
    {
        if horizon == 0 {
            return Err(IntegrationError::ZeroHorizon);
        }
        let dt = 1.0 / self.steps_per_day as f64;
        let mut states = Vec::with_capacity(horizon);
        let mut y = y0;
        states.push(y);
        for day in 1..horizon {
            let start = (day - 1) as f64;
            for sub in 0..self.steps_per_day {
                y = rk4_step(system, start + sub as f64 * dt, &y, dt);
            }
            if y.iter().any(|v| !v.is_finite()) {
                return Err(IntegrationError::NonFinite { t: day as f64 });
            }
            states.push(y);
        }
        Ok(Trajectory::from_states(states))
    }
}

/// An integrator chosen at run time, e.g. from a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Solver {
    DormandPrince(IntegratorOptions),
    /// Fixed-step RK4. `steps_per_day` must be at least
    /// [`ClassicRk4::min_steps_per_day`] of `beta * N` for the largest admissible `beta`, or
    /// the trajectory overflows near the epidemic peak.
    Rk4 { steps_per_day: usize },
}

impl Default for Solver {
    fn default() -> Self {
        Solver::DormandPrince(IntegratorOptions::default())
    }
}

impl Integrator for Solver {
    fn integrate<S, const N: usize>(
        &self,
        system: &S,
        y0: [f64; N],
        horizon: usize,
    ) -> Result<Trajectory<N>, IntegrationError>
    where
        S: OdeSystem<N> + ?Sized,
    {
        match *self {
            Solver::DormandPrince(options) => {
                DormandPrince::new(options).integrate(system, y0, horizon)
            }
            Solver::Rk4 { steps_per_day } => {
                ClassicRk4::new(steps_per_day).integrate(system, y0, horizon)
            }
        }
    }
}
