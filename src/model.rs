//! The SIR compartmental model.
//!
//! A population is split into Susceptible, Infected and Recovered compartments that evolve by
//!
//! ```text
//! dS/dt = -β S I
//! dI/dt =  β S I - γ I
//! dR/dt =  γ I
//! ```
//!
//! where β is the transmission rate and γ the recovery rate. The system is autonomous: the
//! derivative never depends on `t`.

use serde::{Deserialize, Serialize};

/// A system of ordinary differential equations with `N` state variables.
///
/// Implementations must be pure: the derivative depends only on `t` and `y`, and evaluating it
/// never fails, even for states a solver probes outside the physically meaningful range.
pub trait OdeSystem<const N: usize> {
    /// Returns `dy/dt` at time `t` and state `y`.
    fn derivative(&self, t: f64, y: &[f64; N]) -> [f64; N];
}

/// Transmission and recovery rates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SirParameters {
    pub beta: f64,
    pub gamma: f64,
}

impl SirParameters {
    pub fn new(beta: f64, gamma: f64) -> Self {
        Self { beta, gamma }
    }

    pub fn as_array(&self) -> [f64; 2] {
        [self.beta, self.gamma]
    }

    pub fn from_array([beta, gamma]: [f64; 2]) -> Self {
        Self { beta, gamma }
    }
}

/// Compartment sizes at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SirState {
    pub s: f64,
    pub i: f64,
    pub r: f64,
}

impl SirState {
    pub fn new(s: f64, i: f64, r: f64) -> Self {
        Self { s, i, r }
    }

    pub fn total(&self) -> f64 {
        self.s + self.i + self.r
    }

    pub fn is_finite(&self) -> bool {
        self.s.is_finite() && self.i.is_finite() && self.r.is_finite()
    }
}

impl From<[f64; 3]> for SirState {
    fn from([s, i, r]: [f64; 3]) -> Self {
        Self { s, i, r }
    }
}

impl From<SirState> for [f64; 3] {
    fn from(state: SirState) -> Self {
        [state.s, state.i, state.r]
    }
}

/// The SIR right-hand side for a fixed parameter pair.
#[derive(Debug, Clone, Copy)]
pub struct SirModel {
    parameters: SirParameters,
}

impl SirModel {
    pub fn new(parameters: SirParameters) -> Self {
        Self { parameters }
    }

    pub fn parameters(&self) -> SirParameters {
        self.parameters
    }
}

impl OdeSystem<3> for SirModel {
    fn derivative(&self, _t: f64, y: &[f64; 3]) -> [f64; 3] {
        let SirParameters { beta, gamma } = self.parameters;
        let [s, i, _r] = *y;
        let infection = beta * s * i;
        let recovery = gamma * i;
        [-infection, infection - recovery, recovery]
    }
}
