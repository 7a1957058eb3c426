pub use crate::config::FitConfig;
pub use crate::error::{Result, SirFitError};
pub use crate::estimator::{Bounds, Estimate, EstimatorOptions, NelderMead, Objective, Termination};
pub use crate::forecast::{Forecast, ForecastRow, Forecaster, DEFAULT_HORIZON};
pub use crate::integrator::{
    ClassicRk4, DormandPrince, IntegrationError, Integrator, IntegratorOptions, Solver,
};
pub use crate::log::{debug, error, info, trace, warn, LevelFilter};
pub use crate::model::{OdeSystem, SirModel, SirParameters, SirState};
pub use crate::objective::{simulate, InitialCondition, RmseObjective};
pub use crate::pipeline::{fit_series, FitResult};
pub use crate::series::{DateIndex, ObservedSeries};
pub use crate::trajectory::Trajectory;
pub use crate::assert_almost_eq;
