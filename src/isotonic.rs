//! Isotonic Regression
//!
//! Least-squares fit of a non-decreasing sequence using the Pool Adjacent
//! Violators Algorithm (PAVA). Runs in linear time.

/// Non-decreasing sequence closest to `y` in squared error.
///
/// Every observation carries the same weight. The output has the same
/// length as `y`.
pub fn isotonic_regression(y: &[f64]) -> Vec<f64> {
    // Stack of pooled blocks: (sum_y, count)
    let mut blocks: Vec<(f64, usize)> = Vec::with_capacity(y.len());

    for &target in y {
        let mut current_sum = target;
        let mut current_count = 1;

        // Merge down while the previous block violates monotonicity.
        while let Some(&(prev_sum, prev_count)) = blocks.last() {
            if prev_sum / prev_count as f64 > current_sum / current_count as f64 {
                current_sum += prev_sum;
                current_count += prev_count;
                blocks.pop();
            } else {
                break;
            }
        }
        blocks.push((current_sum, current_count));
    }

    let mut fitted = Vec::with_capacity(y.len());
    for (sum, count) in blocks {
        let value = sum / count as f64;
        fitted.extend(std::iter::repeat_n(value, count));
    }
    fitted
}
