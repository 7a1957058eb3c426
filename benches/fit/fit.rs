use chrono::NaiveDate;
use criterion::{criterion_group, criterion_main, Criterion};
use sirfit::prelude::*;
use std::hint::black_box;

static DAYS: usize = 60;

fn synthetic_series() -> ObservedSeries {
    let trajectory = simulate(
        &DormandPrince::default(),
        SirParameters::new(0.0002, 0.1),
        &InitialCondition::default(),
        DAYS,
    )
    .expect("synthetic trajectory");
    let start = NaiveDate::from_ymd_opt(2020, 3, 1).expect("valid date");
    ObservedSeries::from_counts(start, &trajectory.infected()).expect("synthetic series")
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let series = synthetic_series();
    let config = FitConfig::default();

    c.bench_function("objective evaluation", |bencher| {
        let objective =
            RmseObjective::new(&series, config.initial_condition, config.integrator)
                .expect("objective");
        bencher.iter(|| objective.evaluate(black_box(SirParameters::new(0.0003, 0.08))));
    });

    c.bench_function("fit and forecast", |bencher| {
        bencher.iter(|| fit_series("Synthetic", black_box(&series), &config));
    });

    let mut group = c.benchmark_group("integrators");
    let model = SirModel::new(SirParameters::new(0.0002, 0.1));
    let y0 = InitialCondition::default().as_array();
    group.bench_function("dormand prince", |bencher| {
        bencher.iter(|| DormandPrince::default().integrate(&model, black_box(y0), DAYS));
    });
    group.bench_function("rk4", |bencher| {
        bencher.iter(|| ClassicRk4::default().integrate(&model, black_box(y0), DAYS));
    });
    group.finish();
}

criterion_group!(fit_benches, criterion_benchmark);
criterion_main!(fit_benches);
