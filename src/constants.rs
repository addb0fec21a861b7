pub const DEFAULT_QUANTILES: usize = 10;
pub const DEFAULT_ISOTONIC_LAMBDA: f64 = 1.0;
pub const ITERATION_LIMIT: usize = 1_000_000;
pub const SMOOTHING_TOLERANCE: f64 = 1e-10;
/// Upper bound on the squared spectral norm of the third difference operator.
pub const THIRD_DIFF_NORM_SQ: f64 = 64.0;
pub const SIGNIFICANT_DIGITS: i32 = 8;
/// Relative widening applied to a degenerate equal-width range.
pub const RANGE_PADDING: f64 = 0.001;
