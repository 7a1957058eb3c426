//! Fit a two-parameter SIR model to confirmed case counts and forecast it forward.
//!
//! The model has three compartments, susceptible `S`, infected `I` and recovered `R`, and two
//! rates: the transmission rate `beta` and the recovery rate `gamma`.
//!
//! ```text
//! dS/dt = -beta * S * I
//! dI/dt =  beta * S * I - gamma * I
//! dR/dt =  gamma * I
//! ```
//!
//! A run goes through the following stages:
//! * [`data`] reads a region's daily counts from a wide case-count table into an
//!   [`ObservedSeries`](series::ObservedSeries) indexed by calendar date.
//! * [`objective`] scores a parameter pair by integrating the model over the observed days and
//!   taking the root-mean-square error between simulated `I` and the observations.
//! * [`estimator`] searches the parameter box for the pair with the lowest score.
//! * [`forecast`] runs the fitted model past the last observation.
//! * [`report`] writes the forecast table and a fit summary.
//!
//! [`pipeline::fit_series`] strings the middle stages together, and [`runner`] adds the
//! command line, configuration and output files on top.
pub mod config;
pub mod data;
pub mod error;
pub mod estimator;
pub mod forecast;
pub mod integrator;
pub mod log;
pub mod model;
pub mod numeric;
pub mod objective;
pub mod pipeline;
pub mod report;
pub mod runner;
pub mod series;
pub mod trajectory;

mod macros;

pub mod prelude;

pub use error::{Result, SirFitError};
