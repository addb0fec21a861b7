//! Lookup Table
//!
//! An ordered mapping from contiguous intervals to one output per interval.
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::binning::bucket_index;
use crate::errors::CalibrationError;

/// Step function over the real line.
///
/// `edges` holds `values.len() + 1` non-decreasing boundaries. Interior
/// intervals are right-closed. The first interval extends to negative
/// infinity and the last to positive infinity, so only finite edges
/// are ever stored.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(try_from = "TableParts")]
pub struct LookupTable {
    edges: Vec<f64>,
    values: Vec<f64>,
}

/// Unchecked serialized form of a [`LookupTable`].
#[derive(Deserialize)]
struct TableParts {
    edges: Vec<f64>,
    values: Vec<f64>,
}

impl TryFrom<TableParts> for LookupTable {
    type Error = CalibrationError;

    fn try_from(parts: TableParts) -> Result<Self, Self::Error> {
        let TableParts { edges, values } = parts;
        if values.is_empty() || edges.len() != values.len() + 1 {
            return Err(CalibrationError::UnableToRead(format!(
                "lookup table needs one more edge than values, got {} edges and {} values",
                edges.len(),
                values.len()
            )));
        }
        if !edges.iter().all(|e| e.is_finite()) || !edges.windows(2).all(|w| w[0] <= w[1]) {
            return Err(CalibrationError::UnableToRead(
                "lookup table edges must be finite and non-decreasing".to_string(),
            ));
        }
        Ok(LookupTable { edges, values })
    }
}

impl LookupTable {
    /// Build a table, checking that there is one more edge than values.
    pub(crate) fn new(edges: Vec<f64>, values: Vec<f64>) -> Self {
        debug_assert_eq!(edges.len(), values.len() + 1);
        LookupTable { edges, values }
    }

    /// Interval boundaries.
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Output for each interval.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of intervals.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Lower boundary of the first interval.
    pub fn lower(&self) -> f64 {
        self.edges[0]
    }

    /// Upper boundary of the last interval.
    pub fn upper(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    /// Output for a single value. NaN maps to NaN.
    #[inline]
    pub fn lookup(&self, value: f64) -> f64 {
        if value.is_nan() {
            f64::NAN
        } else if value >= self.upper() {
            self.values[self.values.len() - 1]
        } else if value <= self.lower() {
            self.values[0]
        } else {
            self.values[bucket_index(&self.edges, value)]
        }
    }

    /// Output for each value.
    ///
    /// * `values` - Values to map.
    /// * `parallel` - Map in parallel.
    pub fn map(&self, values: &[f64], parallel: bool) -> Vec<f64> {
        if parallel {
            values.par_iter().map(|&v| self.lookup(v)).collect()
        } else {
            values.iter().map(|&v| self.lookup(v)).collect()
        }
    }

    /// True if every output is at least the one before it.
    pub fn is_monotone(&self) -> bool {
        self.values.windows(2).all(|w| w[0] <= w[1])
    }
}
