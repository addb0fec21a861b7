//! Quantile Calibrator
//!
//! Learns a monotone step function from a one-dimensional predicted score to
//! a calibrated target. Scores are split into buckets (by quantile or equal
//! width), each bucket maps to the mean target of its members, and the bucket
//! values are optionally regularized by an isotonic fit and third difference
//! smoothing.
use log::debug;
use serde::{Deserialize, Serialize};

use crate::binning::{bucket_edges, bucket_means, fill_empty, BinningMethod};
use crate::constants::{DEFAULT_ISOTONIC_LAMBDA, DEFAULT_QUANTILES, ITERATION_LIMIT, SMOOTHING_TOLERANCE};
use crate::errors::CalibrationError;
use crate::isotonic::isotonic_regression;
use crate::lookup::LookupTable;
use crate::pipeline::{Estimator, ModelIO, Regressor, Transformer};
use crate::smoothing::smooth_monotone;
use crate::utils::check_finite;

fn default_quantiles() -> usize {
    DEFAULT_QUANTILES
}
fn default_true() -> bool {
    true
}
fn default_isotonic_lambda() -> f64 {
    DEFAULT_ISOTONIC_LAMBDA
}
fn default_max_iter() -> usize {
    ITERATION_LIMIT
}
fn default_tolerance() -> f64 {
    SMOOTHING_TOLERANCE
}

/// Parameters of a [`QuantileCalibrator`]. Never changed by fitting.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CalibratorConfig {
    /// Number of buckets, at least one.
    #[serde(default = "default_quantiles")]
    pub quantiles: usize,
    /// Regularize bucket values with an isotonic fit.
    #[serde(default = "default_true")]
    pub isotonic_fit: bool,
    /// Additionally apply third difference smoothing to the isotonic fit.
    #[serde(default = "default_true")]
    pub do_smoothing: bool,
    /// Weight of the third difference penalty.
    #[serde(default = "default_isotonic_lambda")]
    pub isotonic_lambda: f64,
    /// How bucket edges are placed.
    #[serde(default)]
    pub method: BinningMethod,
    /// Iteration limit of the smoothing solver.
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    /// Convergence tolerance of the smoothing solver.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

impl Default for CalibratorConfig {
    fn default() -> Self {
        CalibratorConfig {
            quantiles: default_quantiles(),
            isotonic_fit: true,
            do_smoothing: true,
            isotonic_lambda: default_isotonic_lambda(),
            method: BinningMethod::default(),
            max_iter: default_max_iter(),
            tolerance: default_tolerance(),
        }
    }
}

impl CalibratorConfig {
    /// Check parameter ranges.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        if self.quantiles == 0 {
            return Err(CalibrationError::InvalidParameter(
                "quantiles".to_string(),
                "at least 1".to_string(),
                self.quantiles.to_string(),
            ));
        }
        if !(self.isotonic_lambda.is_finite() && self.isotonic_lambda >= 0.0) {
            return Err(CalibrationError::InvalidParameter(
                "isotonic_lambda".to_string(),
                "a finite non-negative value".to_string(),
                self.isotonic_lambda.to_string(),
            ));
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(CalibrationError::InvalidParameter(
                "tolerance".to_string(),
                "a finite non-negative value".to_string(),
                self.tolerance.to_string(),
            ));
        }
        Ok(())
    }
}

impl ModelIO for CalibratorConfig {}

/// Calibrates a predicted score with respect to quantiles of that score.
///
/// Acts both as a [`Transformer`] and as a single feature [`Regressor`];
/// `predict` and `transform` return the same values.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct QuantileCalibrator {
    /// Calibration parameters.
    pub cfg: CalibratorConfig,
    lookup_table: Option<LookupTable>,
}

impl QuantileCalibrator {
    /// Create a calibrator from a configuration.
    pub fn new(cfg: CalibratorConfig) -> Self {
        QuantileCalibrator { cfg, lookup_table: None }
    }

    /// Set the number of buckets.
    /// * `quantiles` - Number of buckets the predicted score is split into.
    pub fn set_quantiles(mut self, quantiles: usize) -> Self {
        self.cfg.quantiles = quantiles;
        self
    }

    /// Set whether bucket values are regularized with an isotonic fit.
    pub fn set_isotonic_fit(mut self, isotonic_fit: bool) -> Self {
        self.cfg.isotonic_fit = isotonic_fit;
        self
    }

    /// Set whether the isotonic fit is smoothed. Ignored without `isotonic_fit`.
    pub fn set_do_smoothing(mut self, do_smoothing: bool) -> Self {
        self.cfg.do_smoothing = do_smoothing;
        self
    }

    /// Set the weight of the third difference penalty.
    pub fn set_isotonic_lambda(mut self, isotonic_lambda: f64) -> Self {
        self.cfg.isotonic_lambda = isotonic_lambda;
        self
    }

    /// Set the binning policy.
    pub fn set_method(mut self, method: BinningMethod) -> Self {
        self.cfg.method = method;
        self
    }

    /// Set the binning policy by name, `"quantile"` or `"equal"`.
    pub fn set_method_name(mut self, method: &str) -> Result<Self, CalibrationError> {
        self.cfg.method = method.parse()?;
        Ok(self)
    }

    /// Set the iteration limit of the smoothing solver.
    pub fn set_max_iter(mut self, max_iter: usize) -> Self {
        self.cfg.max_iter = max_iter;
        self
    }

    /// Set the convergence tolerance of the smoothing solver.
    pub fn set_tolerance(mut self, tolerance: f64) -> Self {
        self.cfg.tolerance = tolerance;
        self
    }

    /// Calibration parameters.
    pub fn config(&self) -> &CalibratorConfig {
        &self.cfg
    }

    /// The fitted lookup table, `None` before fit.
    pub fn lookup_table(&self) -> Option<&LookupTable> {
        self.lookup_table.as_ref()
    }

    /// Map predicted values through the fitted table.
    ///
    /// * `values` - Predicted values to calibrate.
    /// * `parallel` - Map in parallel.
    pub fn transform_parallel(&self, values: &[f64], parallel: bool) -> Result<Vec<f64>, CalibrationError> {
        let table = self.fitted_table("transform")?;
        Ok(table.map(values, parallel))
    }

    fn fitted_table(&self, operation: &str) -> Result<&LookupTable, CalibrationError> {
        self.lookup_table
            .as_ref()
            .ok_or_else(|| CalibrationError::UnfittedModel("QuantileCalibrator".to_string(), operation.to_string()))
    }

    fn build_table(&self, predicted: &[f64], truth: &[f64]) -> Result<LookupTable, CalibrationError> {
        let edges = bucket_edges(predicted, self.cfg.quantiles, self.cfg.method);
        let means = bucket_means(&edges, predicted, truth);
        let raw = fill_empty(&means).ok_or(CalibrationError::DimensionMismatch(predicted.len(), truth.len()))?;

        let values = match (self.cfg.isotonic_fit, self.cfg.do_smoothing) {
            (false, _) => raw,
            (true, false) => isotonic_regression(&raw),
            (true, true) => smooth_monotone(&raw, self.cfg.isotonic_lambda, self.cfg.max_iter, self.cfg.tolerance)?,
        };
        Ok(LookupTable::new(edges, values))
    }
}

impl Estimator for QuantileCalibrator {
    type Input = [f64];

    /// Fit the calibration table.
    ///
    /// * `x` - Predicted values.
    /// * `y` - Ground truth values, same length as `x`.
    fn fit(&mut self, x: &[f64], y: Option<&[f64]>) -> Result<&mut Self, CalibrationError> {
        self.lookup_table = None;
        let y = y.ok_or_else(|| CalibrationError::MissingTarget("QuantileCalibrator".to_string()))?;
        if x.is_empty() || x.len() != y.len() {
            return Err(CalibrationError::DimensionMismatch(x.len(), y.len()));
        }
        self.cfg.validate()?;
        check_finite(x, "predicted values")?;
        check_finite(y, "truth values")?;

        let table = self.build_table(x, y)?;
        debug!(
            "Fit QuantileCalibrator with {} {} buckets, isotonic: {}, smoothing: {}.",
            table.len(),
            self.cfg.method,
            self.cfg.isotonic_fit,
            self.cfg.isotonic_fit && self.cfg.do_smoothing
        );
        self.lookup_table = Some(table);
        Ok(self)
    }
}

impl Transformer for QuantileCalibrator {
    fn transform(&self, x: &[f64]) -> Result<Vec<f64>, CalibrationError> {
        self.transform_parallel(x, false)
    }
}

impl Regressor for QuantileCalibrator {
    fn predict(&self, x: &[f64]) -> Result<Vec<f64>, CalibrationError> {
        let table = self.fitted_table("predict")?;
        Ok(table.map(x, false))
    }
}

impl ModelIO for QuantileCalibrator {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Pipeline, RegressorTransformer};
    use crate::smoothing::smoothing_objective;
    use tempfile::tempdir;

    fn one_to_hundred() -> Vec<f64> {
        (1..=100).map(f64::from).collect()
    }

    /// Deterministic noisy, roughly increasing data.
    fn noisy() -> (Vec<f64>, Vec<f64>) {
        let x: Vec<f64> = (0..200).map(|i| (i as f64 * 0.37).sin() * 5.0 + i as f64 * 0.05).collect();
        let y: Vec<f64> = x.iter().enumerate().map(|(i, v)| v + (i as f64 * 1.7).cos() * 2.0).collect();
        (x, y)
    }

    fn unregularized() -> QuantileCalibrator {
        QuantileCalibrator::default().set_isotonic_fit(false)
    }

    #[test]
    fn test_defaults() {
        let cfg = CalibratorConfig::default();
        assert_eq!(cfg.quantiles, 10);
        assert!(cfg.isotonic_fit);
        assert!(cfg.do_smoothing);
        assert_eq!(cfg.isotonic_lambda, 1.0);
        assert_eq!(cfg.method, BinningMethod::Quantile);
    }

    #[test]
    fn test_bucket_means_round_trip() {
        let v = one_to_hundred();
        let mut cal = unregularized().set_quantiles(10);
        cal.fit(&v, Some(v.as_slice())).unwrap();
        let out = cal.transform(&[1.0, 50.0, 100.0]).unwrap();
        assert!((out[0] - 5.5).abs() < 1e-12);
        assert!((out[1] - 45.5).abs() < 1e-12);
        assert!((out[2] - 95.5).abs() < 1e-12);
        assert_eq!(cal.lookup_table().unwrap().len(), 10);
    }

    #[test]
    fn test_single_bucket_is_overall_mean() {
        let x = one_to_hundred();
        let y: Vec<f64> = x.iter().map(|v| v * 2.0).collect();
        let mut cal = QuantileCalibrator::default().set_quantiles(1);
        cal.fit(&x, Some(y.as_slice())).unwrap();
        let out = cal.predict(&[-5.0, 1.0, 33.3, 100.0, 1e9]).unwrap();
        for v in out {
            assert!((v - 101.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_equal_width_interpolates_empty_buckets() {
        let x = vec![0.0, 1.0, 2.0, 9.0, 10.0];
        let mut cal = unregularized().set_quantiles(5).set_method(BinningMethod::EqualWidth);
        cal.fit(&x, Some(x.as_slice())).unwrap();
        let table = cal.lookup_table().unwrap();
        let expected = [1.0, 3.125, 5.25, 7.375, 9.5];
        for (v, e) in table.values().iter().zip(expected) {
            assert!((v - e).abs() < 1e-12);
            assert!(v.is_finite());
        }
        let out = cal.transform(&[5.0]).unwrap();
        assert!((out[0] - 5.25).abs() < 1e-12);
    }

    #[test]
    fn test_method_by_name() {
        let cal = QuantileCalibrator::default().set_method_name("equal").unwrap();
        assert_eq!(cal.config().method, BinningMethod::EqualWidth);
        let err = QuantileCalibrator::default().set_method_name("bogus").unwrap_err();
        assert!(matches!(err, CalibrationError::InvalidConfiguration(..)));
    }

    #[test]
    fn test_isotonic_values_are_monotone() {
        let (x, y) = noisy();
        for smoothing in [false, true] {
            for method in [BinningMethod::Quantile, BinningMethod::EqualWidth] {
                let mut cal = QuantileCalibrator::default()
                    .set_quantiles(20)
                    .set_do_smoothing(smoothing)
                    .set_method(method);
                cal.fit(&x, Some(y.as_slice())).unwrap();
                assert!(cal.lookup_table().unwrap().is_monotone());
            }
        }
    }

    #[test]
    fn test_smoothing_does_not_worsen_objective() {
        let (x, y) = noisy();
        let raw_cal = {
            let mut c = unregularized().set_quantiles(15);
            c.fit(&x, Some(y.as_slice())).unwrap();
            c
        };
        let raw = raw_cal.lookup_table().unwrap().values().to_vec();

        let mut cal = QuantileCalibrator::default().set_quantiles(15).set_isotonic_lambda(2.0);
        cal.fit(&x, Some(y.as_slice())).unwrap();
        let smoothed = cal.lookup_table().unwrap().values();

        let start = isotonic_regression(&raw);
        assert!(smoothing_objective(&raw, smoothed, 2.0) <= smoothing_objective(&raw, &start, 2.0) + 1e-9);
    }

    #[test]
    fn test_transform_is_idempotent() {
        let (x, y) = noisy();
        let mut cal = QuantileCalibrator::default();
        cal.fit(&x, Some(y.as_slice())).unwrap();
        let probe: Vec<f64> = (-40..40).map(|i| i as f64 * 0.25).collect();
        let first = cal.transform(&probe).unwrap();
        let second = cal.transform(&probe).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, cal.predict(&probe).unwrap());
        assert_eq!(first, cal.transform_parallel(&probe, true).unwrap());
    }

    #[test]
    fn test_boundary_values() {
        let (x, y) = noisy();
        let mut cal = QuantileCalibrator::default();
        cal.fit(&x, Some(y.as_slice())).unwrap();
        let table = cal.lookup_table().unwrap().clone();
        let first = table.values()[0];
        let last = *table.values().last().unwrap();
        let out = cal
            .transform(&[table.lower(), table.lower() - 100.0, table.upper(), table.upper() + 100.0])
            .unwrap();
        assert_eq!(out, vec![first, first, last, last]);
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut cal = QuantileCalibrator::default();
        let err = cal.fit(&[1.0, 2.0, 3.0], Some([1.0, 2.0].as_slice())).unwrap_err();
        assert!(matches!(err, CalibrationError::DimensionMismatch(3, 2)));
        let empty: Vec<f64> = Vec::new();
        let err = cal.fit(&empty, Some(empty.as_slice())).unwrap_err();
        assert!(matches!(err, CalibrationError::DimensionMismatch(0, 0)));
    }

    #[test]
    fn test_unfitted() {
        let cal = QuantileCalibrator::default();
        assert!(matches!(cal.transform(&[1.0]), Err(CalibrationError::UnfittedModel(..))));
        assert!(matches!(cal.predict(&[1.0]), Err(CalibrationError::UnfittedModel(..))));
    }

    #[test]
    fn test_failed_refit_clears_table() {
        let v = one_to_hundred();
        let mut cal = QuantileCalibrator::default();
        cal.fit(&v, Some(v.as_slice())).unwrap();
        assert!(cal.fit(&v, Some(&v[..10])).is_err());
        assert!(matches!(cal.transform(&[1.0]), Err(CalibrationError::UnfittedModel(..))));
    }

    #[test]
    fn test_invalid_inputs() {
        let v = one_to_hundred();
        let mut cal = QuantileCalibrator::default().set_quantiles(0);
        assert!(matches!(
            cal.fit(&v, Some(v.as_slice())),
            Err(CalibrationError::InvalidParameter(..))
        ));

        let mut cal = QuantileCalibrator::default().set_isotonic_lambda(-1.0);
        assert!(matches!(
            cal.fit(&v, Some(v.as_slice())),
            Err(CalibrationError::InvalidParameter(..))
        ));

        let mut bad = v.clone();
        bad[3] = f64::NAN;
        let mut cal = QuantileCalibrator::default();
        assert!(matches!(
            cal.fit(&bad, Some(v.as_slice())),
            Err(CalibrationError::NonFiniteValue(_))
        ));
        assert!(matches!(cal.fit(&v, None), Err(CalibrationError::MissingTarget(_))));
    }

    #[test]
    fn test_solver_limit_surfaces_error() {
        let (x, y) = noisy();
        let mut cal = QuantileCalibrator::default()
            .set_quantiles(20)
            .set_isotonic_lambda(100.0)
            .set_max_iter(1)
            .set_tolerance(0.0);
        assert!(matches!(
            cal.fit(&x, Some(y.as_slice())),
            Err(CalibrationError::NotConverged(1))
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let (x, y) = noisy();
        let mut cal = QuantileCalibrator::default().set_method(BinningMethod::EqualWidth);
        cal.fit(&x, Some(y.as_slice())).unwrap();
        let json = cal.json_dump().unwrap();
        let loaded = QuantileCalibrator::from_json(&json).unwrap();
        assert_eq!(loaded.config(), cal.config());
        assert_eq!(loaded.transform(&x).unwrap(), cal.transform(&x).unwrap());
    }

    #[test]
    fn test_save_and_load() {
        let v = one_to_hundred();
        let mut cal = unregularized();
        cal.fit(&v, Some(v.as_slice())).unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("calibrator.json");
        cal.save_model(&path).unwrap();
        let loaded = QuantileCalibrator::load_model(&path).unwrap();
        assert_eq!(loaded.lookup_table(), cal.lookup_table());
    }

    #[test]
    fn test_load_rejects_malformed_table() {
        for json in [
            r#"{"cfg":{},"lookup_table":{"edges":[0.0,1.0],"values":[]}}"#,
            r#"{"cfg":{},"lookup_table":{"edges":[],"values":[]}}"#,
            r#"{"cfg":{},"lookup_table":{"edges":[0.0,1.0],"values":[1.0,2.0]}}"#,
        ] {
            assert!(matches!(
                QuantileCalibrator::from_json(json),
                Err(CalibrationError::UnableToRead(_))
            ));
        }
        let unfitted = QuantileCalibrator::from_json(r#"{"cfg":{},"lookup_table":null}"#).unwrap();
        assert!(matches!(unfitted.transform(&[0.5]), Err(CalibrationError::UnfittedModel(..))));
    }

    #[test]
    fn test_strong_smoothing_fits_many_buckets() {
        let (x, y) = noisy();
        let lambda = 1e4;
        let raw = {
            let mut c = unregularized().set_quantiles(30);
            c.fit(&x, Some(y.as_slice())).unwrap();
            c.lookup_table().unwrap().values().to_vec()
        };
        let mut cal = QuantileCalibrator::default().set_quantiles(30).set_isotonic_lambda(lambda);
        cal.fit(&x, Some(y.as_slice())).unwrap();
        let table = cal.lookup_table().unwrap();
        assert_eq!(table.len(), raw.len());
        assert!(table.is_monotone());
        let start = isotonic_regression(&raw);
        assert!(smoothing_objective(&raw, table.values(), lambda) <= smoothing_objective(&raw, &start, lambda) + 1e-9);
    }

    #[test]
    fn test_config_partial_json() {
        let cfg = CalibratorConfig::from_json(r#"{"quantiles": 5, "method": "equal"}"#).unwrap();
        assert_eq!(cfg.quantiles, 5);
        assert_eq!(cfg.method, BinningMethod::EqualWidth);
        assert!(cfg.isotonic_fit);
        assert_eq!(cfg.isotonic_lambda, 1.0);

        let err = CalibratorConfig::from_json(r#"{"method": "uniform"}"#).unwrap_err();
        assert!(matches!(err, CalibrationError::UnableToRead(_)));
    }

    #[test]
    fn test_pipeline_calibrates_upstream_predictions() {
        // Upstream model is itself a regressor exposed as a transform.
        let (x, y) = noisy();
        let upstream = RegressorTransformer::new(unregularized().set_quantiles(25));
        let mut pipe = Pipeline::new(upstream, QuantileCalibrator::default().set_quantiles(8));
        pipe.fit(&x, Some(y.as_slice())).unwrap();

        let preds = pipe.predict(&x).unwrap();
        assert_eq!(preds.len(), x.len());
        assert!(pipe.last.lookup_table().unwrap().is_monotone());
        assert_eq!(preds, pipe.transform(&x).unwrap());
    }
}
