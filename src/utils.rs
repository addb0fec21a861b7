use crate::errors::CalibrationError;

/// Join a list of accepted option names for error messages.
pub fn items_to_strings(items: Vec<&str>) -> String {
    items.join(", ")
}

/// Return an error naming `name` if any value is NaN or infinite.
pub fn check_finite(v: &[f64], name: &str) -> Result<(), CalibrationError> {
    if v.iter().all(|x| x.is_finite()) {
        Ok(())
    } else {
        Err(CalibrationError::NonFiniteValue(name.to_string()))
    }
}

/// Return a sorted copy of a slice of finite values.
pub fn sorted_copy(v: &[f64]) -> Vec<f64> {
    let mut s = v.to_vec();
    s.sort_by(|a, b| a.total_cmp(b));
    s
}

/// Count the distinct values of a slice.
pub fn n_unique(v: &[f64]) -> usize {
    let mut s = sorted_copy(v);
    s.dedup();
    s.len()
}

/// Round a number to `n` significant digits.
///
/// ```text
/// round_to_significant(12345.0, 2) -> 12000.0
/// round_to_significant(0.0123456, 3) -> 0.0123
/// ```
///
/// The magnitude is taken from `|x| + 0.01`, so values close to zero
/// are rounded at a fixed number of decimals instead of blowing up.
pub fn round_to_significant(x: f64, n: i32) -> f64 {
    let digits = n - 1 - (x.abs() + 0.01).log10().floor() as i32;
    if digits >= 0 {
        let factor = 10f64.powi(digits);
        (x * factor).round() / factor
    } else {
        let factor = 10f64.powi(-digits);
        (x / factor).round() * factor
    }
}

/// Quantile of sorted data, linearly interpolating between
/// the order statistics at position `q * (n - 1)`.
///
/// * `sorted` - Non-empty, ascending values.
/// * `q` - Fraction in `[0, 1]`.
pub fn quantile_linear(sorted: &[f64], q: f64) -> f64 {
    let last = sorted.len() - 1;
    let pos = (q * last as f64).clamp(0.0, last as f64);
    let lower = pos.floor() as usize;
    let upper = (lower + 1).min(last);
    let frac = pos - lower as f64;
    if frac == 0.0 {
        sorted[lower]
    } else {
        sorted[lower] + (sorted[upper] - sorted[lower]) * frac
    }
}
