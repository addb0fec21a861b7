//! Pipeline
//!
//! The fit/transform/predict contracts shared by every model in the crate,
//! adapters between them, and JSON persistence.
use std::fs;
use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};

use crate::errors::CalibrationError;

/// Anything that learns state from data.
pub trait Estimator {
    /// Input data type, e.g. `[f64]` for one-dimensional models.
    type Input: ?Sized;

    /// Fit the model.
    ///
    /// * `x` - Training inputs.
    /// * `y` - Training targets. Supervised models reject `None`.
    fn fit(&mut self, x: &Self::Input, y: Option<&[f64]>) -> Result<&mut Self, CalibrationError>;
}

/// An estimator that maps inputs to a new representation.
pub trait Transformer: Estimator {
    /// Apply the fitted transformation.
    fn transform(&self, x: &Self::Input) -> Result<Vec<f64>, CalibrationError>;

    /// Fit, then transform the training inputs.
    fn fit_transform(&mut self, x: &Self::Input, y: Option<&[f64]>) -> Result<Vec<f64>, CalibrationError> {
        self.fit(x, y)?;
        self.transform(x)
    }
}

/// An estimator that predicts a real-valued target.
pub trait Regressor: Estimator {
    /// Predict on fitted data.
    fn predict(&self, x: &Self::Input) -> Result<Vec<f64>, CalibrationError>;
}

/// Exposes a regressor's predictions as a transform, so a model such as a
/// regression ensemble can sit in the middle of a pipeline.
#[derive(Clone, Debug)]
pub struct RegressorTransformer<R> {
    regressor: R,
}

impl<R: Regressor> RegressorTransformer<R> {
    pub fn new(regressor: R) -> Self {
        RegressorTransformer { regressor }
    }

    /// The wrapped regressor.
    pub fn inner(&self) -> &R {
        &self.regressor
    }

    pub fn into_inner(self) -> R {
        self.regressor
    }
}

impl<R: Regressor> Estimator for RegressorTransformer<R> {
    type Input = R::Input;

    fn fit(&mut self, x: &Self::Input, y: Option<&[f64]>) -> Result<&mut Self, CalibrationError> {
        self.regressor.fit(x, y)?;
        Ok(self)
    }
}

impl<R: Regressor> Transformer for RegressorTransformer<R> {
    fn transform(&self, x: &Self::Input) -> Result<Vec<f64>, CalibrationError> {
        self.regressor.predict(x)
    }
}

impl<R: Regressor> Regressor for RegressorTransformer<R> {
    fn predict(&self, x: &Self::Input) -> Result<Vec<f64>, CalibrationError> {
        self.regressor.predict(x)
    }
}

/// Two stage pipeline: a transformer whose output feeds a one-dimensional
/// estimator.
///
/// Both stages are fit on the same targets; the second stage sees the first
/// stage's transform of the training inputs.
#[derive(Clone, Debug)]
pub struct Pipeline<T, E> {
    pub first: T,
    pub last: E,
}

impl<T, E> Pipeline<T, E>
where
    T: Transformer,
    E: Estimator<Input = [f64]>,
{
    pub fn new(first: T, last: E) -> Self {
        Pipeline { first, last }
    }
}

impl<T, E> Estimator for Pipeline<T, E>
where
    T: Transformer,
    E: Estimator<Input = [f64]>,
{
    type Input = T::Input;

    fn fit(&mut self, x: &Self::Input, y: Option<&[f64]>) -> Result<&mut Self, CalibrationError> {
        let z = self.first.fit_transform(x, y)?;
        self.last.fit(z.as_slice(), y)?;
        Ok(self)
    }
}

impl<T, E> Transformer for Pipeline<T, E>
where
    T: Transformer,
    E: Transformer<Input = [f64]>,
{
    fn transform(&self, x: &Self::Input) -> Result<Vec<f64>, CalibrationError> {
        let z = self.first.transform(x)?;
        self.last.transform(z.as_slice())
    }
}

impl<T, E> Regressor for Pipeline<T, E>
where
    T: Transformer,
    E: Regressor<Input = [f64]>,
{
    fn predict(&self, x: &Self::Input) -> Result<Vec<f64>, CalibrationError> {
        let z = self.first.transform(x)?;
        self.last.predict(z.as_slice())
    }
}

/// JSON persistence for estimators and their configurations.
///
/// Fitted state travels with the parameters, so a loaded calibrator or
/// scaler transforms exactly like the one that was saved. Malformed fitted
/// state is rejected with [`CalibrationError::UnableToRead`].
pub trait ModelIO: Serialize + DeserializeOwned + Sized {
    /// Write the JSON form to `path`, replacing any existing file.
    fn save_model<P: AsRef<Path>>(&self, path: P) -> Result<(), CalibrationError> {
        fs::write(path, self.json_dump()?).map_err(|e| CalibrationError::UnableToWrite(e.to_string()))
    }

    /// JSON form, parameters and fitted state.
    fn json_dump(&self) -> Result<String, CalibrationError> {
        serde_json::to_string(self).map_err(|e| CalibrationError::UnableToWrite(e.to_string()))
    }

    /// Rebuild from the output of [`ModelIO::json_dump`]. Missing parameters
    /// take their defaults.
    fn from_json(json_str: &str) -> Result<Self, CalibrationError> {
        serde_json::from_str::<Self>(json_str).map_err(|e| CalibrationError::UnableToRead(e.to_string()))
    }

    /// Read a file written by [`ModelIO::save_model`].
    fn load_model<P: AsRef<Path>>(path: P) -> Result<Self, CalibrationError> {
        let json_str = fs::read_to_string(path).map_err(|e| CalibrationError::UnableToRead(e.to_string()))?;
        Self::from_json(&json_str)
    }
}
