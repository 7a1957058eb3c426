use crate::model::SirState;

/// States of an ODE system sampled at integer times `0, 1, ..., len - 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory<const N: usize> {
    states: Vec<[f64; N]>,
}

impl<const N: usize> Trajectory<N> {
    pub(crate) fn from_states(states: Vec<[f64; N]>) -> Self {
        Self { states }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// The sample times, one per state.
    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.states.len()).map(|t| t as f64)
    }

    pub fn states(&self) -> &[[f64; N]] {
        &self.states
    }

    /// The time series of a single state component.
    ///
    /// # Panics
    /// Panics if `index >= N`.
    pub fn component(&self, index: usize) -> Vec<f64> {
        assert!(index < N, "component {index} out of range for a {N}-state system");
        self.states.iter().map(|y| y[index]).collect()
    }

    pub fn is_finite(&self) -> bool {
        self.states.iter().flatten().all(|v| v.is_finite())
    }
}

impl Trajectory<3> {
    pub fn state(&self, t: usize) -> Option<SirState> {
        self.states.get(t).map(|&y| SirState::from(y))
    }

    pub fn susceptible(&self) -> Vec<f64> {
        self.component(0)
    }

    pub fn infected(&self) -> Vec<f64> {
        self.component(1)
    }

    pub fn recovered(&self) -> Vec<f64> {
        self.component(2)
    }

    pub fn sir_states(&self) -> impl Iterator<Item = SirState> + '_ {
        self.states.iter().map(|&y| SirState::from(y))
    }
}
