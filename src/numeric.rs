#![allow(clippy::approx_constant)]
//! Floating point helpers: tolerance comparisons built on the approx crate and the error metric
//! used to score a simulated curve against observed case counts.

use approx::AbsDiffEq;

/// Targeted accuracy instantiated over `f64`
pub const ACC: f64 = 10e-11;

/// Compares if two floats are close via `approx::abs_diff_eq` using a maximum absolute difference
/// (epsilon) of `acc`.
#[must_use]
pub fn almost_eq(a: f64, b: f64, acc: f64) -> bool {
    if a.is_infinite() && b.is_infinite() {
        return a == b;
    }
    a.abs_diff_eq(&b, acc)
}

/// Compares if two floats are close via `approx::relative_eq!` with relative precision `rel`.
#[must_use]
pub fn relatively_eq(a: f64, b: f64, rel: f64) -> bool {
    approx::relative_eq!(a, b, max_relative = rel)
}

/// Root-mean-square error between `simulated` and `observed`, paired elementwise.
///
/// Observations that are `None` or non-finite are left out of the mean. Returns `None` when no
/// pair contributes, or when `simulated` is shorter than `observed`.
#[must_use]
pub fn root_mean_square_error(simulated: &[f64], observed: &[Option<f64>]) -> Option<f64> {
    if simulated.len() < observed.len() {
        return None;
    }
    let (sum, count) = simulated
        .iter()
        .zip(observed)
        .filter_map(|(sim, obs)| obs.filter(|o| o.is_finite()).map(|o| sim - o))
        .fold((0.0, 0usize), |(sum, count), diff| (sum + diff * diff, count + 1));
    if count == 0 {
        return None;
    }
    Some((sum / count as f64).sqrt())
}
