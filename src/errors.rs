//! Errors
//!
//! Custom error types used throughout the `calibration-helpers` crate.
use thiserror::Error;

/// Errors that can occur while fitting or applying a calibration model.
#[derive(Debug, Error)]
pub enum CalibrationError {
    /// Unrecognized configuration value.
    /// First value is what was passed, second is the field, third lists the accepted values.
    #[error("Invalid value {0} passed for {1}, expected one of {2}.")]
    InvalidConfiguration(String, String, String),
    /// First value is the name of the parameter, second is expected, third is what was passed.
    #[error("Invalid parameter value passed for {0}, expected {1} but {2} provided.")]
    InvalidParameter(String, String, String),
    /// A model was used before it was fit.
    #[error("{0} must be fit before calling {1}.")]
    UnfittedModel(String, String),
    /// Inputs of different lengths, or an empty input.
    #[error("Expected two non-empty inputs of equal length, got lengths {0} and {1}.")]
    DimensionMismatch(usize, usize),
    /// NaN or infinite value found in training data.
    #[error("Non-finite value found in {0}.")]
    NonFiniteValue(String),
    /// A supervised model was fit without targets.
    #[error("{0} requires target values to fit.")]
    MissingTarget(String),
    /// The smoothing solver hit its iteration limit.
    #[error("Monotone smoothing did not converge within {0} iterations.")]
    NotConverged(usize),
    /// Unable to write model.
    #[error("Unable to write model: {0}")]
    UnableToWrite(String),
    /// Unable to read model.
    #[error("Unable to read model: {0}")]
    UnableToRead(String),
}
