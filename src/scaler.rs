//! Quantile Scaler
//!
//! Monotone transformation of a feature onto buckets of equal population.
//! Each value is replaced by the quantile fraction at the lower edge of its
//! bucket, so the output lies in `[0, 1)`.
use log::warn;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_QUANTILES, SIGNIFICANT_DIGITS};
use crate::errors::CalibrationError;
use crate::lookup::LookupTable;
use crate::pipeline::{Estimator, ModelIO, Transformer};
use crate::utils::{check_finite, n_unique, quantile_linear, round_to_significant, sorted_copy};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
struct ScalerState {
    /// Quantile count actually used, capped by the number of distinct values.
    n_quantiles: usize,
    lookup_table: LookupTable,
}

/// Maps a feature to the quantile bucket it falls in.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct QuantileScaler {
    /// Requested number of quantile buckets.
    pub n_quantiles: usize,
    state: Option<ScalerState>,
}

impl Default for QuantileScaler {
    fn default() -> Self {
        QuantileScaler::new(DEFAULT_QUANTILES)
    }
}

impl QuantileScaler {
    pub fn new(n_quantiles: usize) -> Self {
        QuantileScaler {
            n_quantiles,
            state: None,
        }
    }

    /// Quantile count used by the fit, `None` before fit.
    pub fn effective_quantiles(&self) -> Option<usize> {
        self.state.as_ref().map(|s| s.n_quantiles)
    }

    /// The fitted lookup table, `None` before fit.
    pub fn lookup_table(&self) -> Option<&LookupTable> {
        self.state.as_ref().map(|s| &s.lookup_table)
    }
}

/// Build the quantile lookup table of `x` with `n_quantiles` buckets.
///
/// Values are rounded to a fixed number of significant digits first, so
/// float noise does not create spurious edges. The first and last quantiles
/// stand in for negative and positive infinity. `x` must be non-empty and
/// `n_quantiles` at least one, as checked by [`QuantileScaler`]'s fit.
pub(crate) fn quantile_lookup_table(x: &[f64], n_quantiles: usize) -> LookupTable {
    let rounded: Vec<f64> = x.iter().map(|&v| round_to_significant(v, SIGNIFICANT_DIGITS)).collect();
    let sorted = sorted_copy(&rounded);

    // (edge, fraction) pairs, keeping the lowest fraction of a repeated edge.
    let mut cuts: Vec<(f64, f64)> = Vec::with_capacity(n_quantiles + 1);
    for j in 0..=n_quantiles {
        let q = j as f64 / n_quantiles as f64;
        let edge = quantile_linear(&sorted, q);
        if cuts.last().map_or(true, |&(last, _)| last != edge) {
            cuts.push((edge, q));
        }
    }

    if cuts.len() == 1 {
        let edge = cuts[0].0;
        return LookupTable::new(vec![edge, edge], vec![0.0]);
    }
    let edges = cuts.iter().map(|&(e, _)| e).collect();
    let values = cuts[..cuts.len() - 1].iter().map(|&(_, q)| q).collect();
    LookupTable::new(edges, values)
}

impl Estimator for QuantileScaler {
    type Input = [f64];

    /// Fit the scaler. Targets are ignored.
    fn fit(&mut self, x: &[f64], _y: Option<&[f64]>) -> Result<&mut Self, CalibrationError> {
        self.state = None;
        if x.is_empty() {
            return Err(CalibrationError::DimensionMismatch(0, 0));
        }
        if self.n_quantiles == 0 {
            return Err(CalibrationError::InvalidParameter(
                "n_quantiles".to_string(),
                "at least 1".to_string(),
                "0".to_string(),
            ));
        }
        check_finite(x, "scaler input")?;

        let distinct = n_unique(x);
        let n_quantiles = if self.n_quantiles > distinct {
            warn!(
                "Requested {} quantiles but only {} distinct values were seen, using {}.",
                self.n_quantiles, distinct, distinct
            );
            distinct
        } else {
            self.n_quantiles
        };

        self.state = Some(ScalerState {
            n_quantiles,
            lookup_table: quantile_lookup_table(x, n_quantiles),
        });
        Ok(self)
    }
}

impl Transformer for QuantileScaler {
    fn transform(&self, x: &[f64]) -> Result<Vec<f64>, CalibrationError> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| CalibrationError::UnfittedModel("QuantileScaler".to_string(), "transform".to_string()))?;
        Ok(state.lookup_table.map(x, false))
    }
}

impl ModelIO for QuantileScaler {}
