use chrono::NaiveDate;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;
use sirfit::prelude::*;

const SEED: u64 = 42;
const DAYS: usize = 60;

fn truth() -> SirParameters {
    SirParameters::new(0.0002, 0.1)
}

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 3, 1).unwrap()
}

/// Infected counts of the true model with multiplicative Gaussian noise.
fn noisy_counts(relative_noise: f64) -> Vec<f64> {
    let trajectory = simulate(
        &DormandPrince::default(),
        truth(),
        &InitialCondition::default(),
        DAYS,
    )
    .unwrap();
    let mut rng = SmallRng::seed_from_u64(SEED);
    let noise = Normal::new(1.0, relative_noise).unwrap();
    trajectory
        .infected()
        .into_iter()
        .map(|i| (i * rng.sample(noise)).max(0.0))
        .collect()
}

#[test]
fn recovers_parameters_from_noisy_data() {
    let series = ObservedSeries::from_counts(start(), &noisy_counts(0.02)).unwrap();
    let result = fit_series("Synthetic", &series, &FitConfig::default()).unwrap();
    let fitted = result.estimate.parameters;
    assert!(
        (fitted.beta - truth().beta).abs() / truth().beta < 0.05,
        "beta {fitted:?}"
    );
    assert!(
        (fitted.gamma - truth().gamma).abs() / truth().gamma < 0.05,
        "gamma {fitted:?}"
    );
}

#[test]
fn gaps_in_the_data_do_not_bias_the_fit() {
    let mut values: Vec<Option<f64>> = noisy_counts(0.0).into_iter().map(Some).collect();
    for day in (3..DAYS).step_by(4) {
        values[day] = None;
    }
    let index = DateIndex::daily(start(), DAYS);
    let series = ObservedSeries::new(index, values).unwrap();
    let result = fit_series("Gappy", &series, &FitConfig::default()).unwrap();
    let fitted = result.estimate.parameters;
    assert!((fitted.beta - truth().beta).abs() / truth().beta < 0.01);
    assert!((fitted.gamma - truth().gamma).abs() / truth().gamma < 0.01);
    assert_eq!(result.forecast.observed()[3], None);
}

#[test]
fn rk4_and_dormand_prince_agree_on_the_fit() {
    let series = ObservedSeries::from_counts(start(), &noisy_counts(0.02)).unwrap();
    // A narrower box keeps the fixed step count needed for stability small.
    let narrow = FitConfig {
        bounds: Bounds::new(1e-8, 0.15).unwrap(),
        ..FitConfig::default()
    };
    let adaptive = fit_series("Synthetic", &series, &narrow).unwrap();
    let config = FitConfig {
        integrator: Solver::Rk4 {
            steps_per_day: ClassicRk4::min_steps_per_day(0.15 * 2004.5),
        },
        ..narrow.clone()
    };
    let fixed = fit_series("Synthetic", &series, &config).unwrap();
    let (a, b) = (adaptive.estimate.parameters, fixed.estimate.parameters);
    assert!((a.beta - b.beta).abs() / a.beta < 0.01, "{a:?} vs {b:?}");
    assert!((a.gamma - b.gamma).abs() / a.gamma < 0.01, "{a:?} vs {b:?}");
}

#[test]
fn forecast_follows_the_true_epidemic() {
    let counts = noisy_counts(0.0);
    let series = ObservedSeries::from_counts(start(), &counts[..30]).unwrap();
    let config = FitConfig {
        horizon: DAYS,
        ..FitConfig::default()
    };
    let result = fit_series("Synthetic", &series, &config).unwrap();
    let projected = result.forecast.trajectory().infected();
    for day in 30..DAYS {
        assert!(
            (projected[day] - counts[day]).abs() <= 0.05 * counts[day].max(1.0),
            "day {day}: {} vs {}",
            projected[day],
            counts[day]
        );
    }
}
