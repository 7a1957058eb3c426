use std::fmt::{self, Debug, Display};
use std::io;

use crate::integrator::IntegrationError;

/// Provides `SirFitError` and maps to other errors to
/// convert to a `SirFitError`
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum SirFitError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CSVError(csv::Error),
    /// A parameter pair (or an initial guess) lies outside the search box.
    InvalidParameterRange {
        beta: f64,
        gamma: f64,
        lower: f64,
        upper: f64,
    },
    /// The integrator could not produce a finite trajectory.
    SolverDivergence(IntegrationError),
    /// Too few numeric observations to fit two free parameters.
    InsufficientData {
        required: usize,
        found: usize,
    },
    InvalidConfig(String),
    RegionNotFound(String),
    DateParse(String),
    SirFitError(String),
}

impl From<io::Error> for SirFitError {
    fn from(error: io::Error) -> Self {
        SirFitError::IoError(error)
    }
}

impl From<serde_json::Error> for SirFitError {
    fn from(error: serde_json::Error) -> Self {
        SirFitError::JsonError(error)
    }
}

impl From<csv::Error> for SirFitError {
    fn from(error: csv::Error) -> Self {
        SirFitError::CSVError(error)
    }
}

impl From<IntegrationError> for SirFitError {
    fn from(error: IntegrationError) -> Self {
        SirFitError::SolverDivergence(error)
    }
}

impl From<chrono::ParseError> for SirFitError {
    fn from(error: chrono::ParseError) -> Self {
        SirFitError::DateParse(error.to_string())
    }
}

impl From<String> for SirFitError {
    fn from(error: String) -> Self {
        SirFitError::SirFitError(error)
    }
}

impl From<&str> for SirFitError {
    fn from(error: &str) -> Self {
        SirFitError::SirFitError(error.to_string())
    }
}

impl std::error::Error for SirFitError {}

impl Display for SirFitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SirFitError::InvalidParameterRange {
                beta,
                gamma,
                lower,
                upper,
            } => write!(
                f,
                "Error: parameters (beta={beta}, gamma={gamma}) outside bounds [{lower}, {upper}]"
            ),
            SirFitError::SolverDivergence(error) => write!(f, "Error: solver diverged: {error}"),
            SirFitError::InsufficientData { required, found } => write!(
                f,
                "Error: at least {required} observations are needed to fit, found {found}"
            ),
            SirFitError::InvalidConfig(msg) => write!(f, "Error: invalid configuration: {msg}"),
            SirFitError::RegionNotFound(region) => {
                write!(f, "Error: region `{region}` not found in case data")
            }
            SirFitError::DateParse(msg) => write!(f, "Error: could not parse date: {msg}"),
            _ => write!(f, "Error: {self:?}"),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = SirFitError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_failure() {
        let err = SirFitError::InsufficientData {
            required: 2,
            found: 1,
        };
        assert_eq!(
            err.to_string(),
            "Error: at least 2 observations are needed to fit, found 1"
        );

        let err = SirFitError::RegionNotFound("Atlantis".to_string());
        assert!(err.to_string().contains("Atlantis"));
    }

    #[test]
    fn string_conversions() {
        let err: SirFitError = "boom".into();
        assert!(matches!(err, SirFitError::SirFitError(ref s) if s == "boom"));
    }

    #[test]
    fn integration_error_becomes_divergence() {
        let err: SirFitError = IntegrationError::NonFinite { t: 3.5 }.into();
        assert!(matches!(err, SirFitError::SolverDivergence(_)));
        assert!(err.to_string().contains("3.5"));
    }
}
