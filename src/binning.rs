//! Binning
//!
//! Splits a one-dimensional score into contiguous buckets and aggregates
//! targets per bucket.
//!
//! Buckets are described by `k + 1` non-decreasing edges. Bucket `i` covers
//! the right-closed interval `(edges[i], edges[i + 1]]`, except bucket `0`,
//! which also owns `edges[0]` itself.
use std::fmt;
use std::str::FromStr;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::constants::RANGE_PADDING;
use crate::errors::CalibrationError;
use crate::utils::{items_to_strings, sorted_copy};

/// Policy used to place bucket edges.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum BinningMethod {
    /// Edges at empirical quantiles; buckets hold equal counts.
    #[default]
    #[serde(rename = "quantile")]
    Quantile,
    /// Edges evenly spaced between the minimum and maximum.
    #[serde(rename = "equal")]
    EqualWidth,
}

impl FromStr for BinningMethod {
    type Err = CalibrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quantile" => Ok(BinningMethod::Quantile),
            "equal" => Ok(BinningMethod::EqualWidth),
            _ => Err(CalibrationError::InvalidConfiguration(
                s.to_string(),
                "method".to_string(),
                items_to_strings(vec!["quantile", "equal"]),
            )),
        }
    }
}

impl fmt::Display for BinningMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinningMethod::Quantile => write!(f, "quantile"),
            BinningMethod::EqualWidth => write!(f, "equal"),
        }
    }
}

/// Compute bucket edges for `v` under the given policy.
///
/// * `v` - Non-empty, finite values.
/// * `n_buckets` - Requested number of buckets, at least one.
pub fn bucket_edges(v: &[f64], n_buckets: usize, method: BinningMethod) -> Vec<f64> {
    match method {
        BinningMethod::Quantile => quantile_edges(v, n_buckets),
        BinningMethod::EqualWidth => equal_width_edges(v, n_buckets),
    }
}

/// Edges at the empirical quantiles `j / k`.
///
/// Edge `j` is the smallest value whose empirical CDF reaches `j / k`,
/// that is `sorted[ceil(j * n / k) - 1]`. Ties can produce repeated edges;
/// those are collapsed, leaving fewer buckets than requested.
fn quantile_edges(v: &[f64], n_buckets: usize) -> Vec<f64> {
    let sorted = sorted_copy(v);
    let n = sorted.len();
    let mut edges = Vec::with_capacity(n_buckets + 1);
    edges.push(sorted[0]);
    for j in 1..=n_buckets {
        let rank = (j * n).div_ceil(n_buckets);
        edges.push(sorted[rank - 1]);
    }
    edges.dedup();

    if edges.len() == 1 {
        // Every value is identical, a single closed bucket.
        edges.push(edges[0]);
    }
    if edges.len() - 1 < n_buckets {
        warn!(
            "Only {} distinct quantile buckets could be formed out of {} requested.",
            edges.len() - 1,
            n_buckets
        );
    }
    edges
}

/// Edges evenly spaced over `[min, max]`.
fn equal_width_edges(v: &[f64], n_buckets: usize) -> Vec<f64> {
    let (mut lo, mut hi) = v
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)));
    if lo == hi {
        lo -= if lo == 0.0 { RANGE_PADDING } else { RANGE_PADDING * lo.abs() };
        hi += if hi == 0.0 { RANGE_PADDING } else { RANGE_PADDING * hi.abs() };
    }
    let width = hi - lo;
    let mut edges: Vec<f64> = (0..n_buckets)
        .map(|j| {
            if width.is_finite() {
                lo + width * (j as f64) / (n_buckets as f64)
            } else {
                // Range wider than f64::MAX, interpolate without forming it.
                let t = j as f64 / n_buckets as f64;
                lo * (1.0 - t) + hi * t
            }
        })
        .collect();
    edges.push(hi);
    edges
}

/// Index of the bucket containing `value`.
///
/// Values at or below the first edge fall in bucket `0`, values above
/// the last edge fall in the last bucket. `value` must not be NaN.
#[inline]
pub fn bucket_index(edges: &[f64], value: f64) -> usize {
    let n_buckets = edges.len() - 1;
    // First interior edge that is >= value closes the bucket.
    edges[1..].partition_point(|&e| e < value).min(n_buckets - 1)
}

/// Mean of `y` per bucket of `x`. Buckets with no members are `None`.
pub fn bucket_means(edges: &[f64], x: &[f64], y: &[f64]) -> Vec<Option<f64>> {
    let n_buckets = edges.len() - 1;
    let mut sums = vec![0.0; n_buckets];
    let mut counts = vec![0usize; n_buckets];
    for (&xi, &yi) in x.iter().zip(y) {
        let b = bucket_index(edges, xi);
        sums[b] += yi;
        counts[b] += 1;
    }
    sums.into_iter()
        .zip(counts)
        .map(|(s, c)| if c == 0 { None } else { Some(s / c as f64) })
        .collect()
}

/// Fill empty buckets.
///
/// Interior gaps are linearly interpolated by bucket position between the
/// nearest filled neighbours. Leading and trailing gaps take the value of
/// the nearest filled bucket. Returns `None` if every bucket is empty.
pub fn fill_empty(means: &[Option<f64>]) -> Option<Vec<f64>> {
    let filled: Vec<usize> = means
        .iter()
        .enumerate()
        .filter_map(|(i, m)| m.map(|_| i))
        .collect();
    let (&first, &last) = (filled.first()?, filled.last()?);

    let mut out = Vec::with_capacity(means.len());
    let mut right = 0;
    for (i, m) in means.iter().enumerate() {
        match m {
            Some(v) => out.push(*v),
            None if i < first => out.push(means[first]?),
            None if i > last => out.push(means[last]?),
            None => {
                while filled[right] < i {
                    right += 1;
                }
                let (l, r) = (filled[right - 1], filled[right]);
                let (yl, yr) = (means[l]?, means[r]?);
                let frac = (i - l) as f64 / (r - l) as f64;
                out.push(yl + (yr - yl) * frac);
            }
        }
    }
    Some(out)
}
