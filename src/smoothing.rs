//! Monotone Smoothing
//!
//! Solves
//!
//! ```text
//! minimize    sum (y_i - x_i)^2 + lambda * sum (D3 x)_i^2
//! subject to  x_{i+1} >= x_i
//! ```
//!
//! where `D3` is the third finite difference. The problem is a strongly convex
//! quadratic program over the monotone cone. It is solved by accelerated
//! projected gradient descent with step `1 / L` and Nesterov momentum, which
//! keeps the iteration count proportional to `sqrt(lambda)` rather than
//! `lambda`. Momentum is reset whenever the objective goes up, so the
//! objective never increases. The Euclidean projection onto the monotone
//! cone is exactly isotonic regression, which makes every iterate feasible.
use log::debug;

use crate::constants::THIRD_DIFF_NORM_SQ;
use crate::errors::CalibrationError;
use crate::isotonic::isotonic_regression;

/// Third finite difference, `n - 3` values (empty when `n < 4`).
pub fn third_difference(x: &[f64]) -> Vec<f64> {
    x.windows(4).map(|w| w[3] - 3.0 * w[2] + 3.0 * w[1] - w[0]).collect()
}

/// Value of the smoothing objective at `fit`.
pub fn smoothing_objective(target: &[f64], fit: &[f64], lambda: f64) -> f64 {
    let residual: f64 = target.iter().zip(fit).map(|(y, x)| (y - x) * (y - x)).sum();
    let roughness: f64 = third_difference(fit).iter().map(|d| d * d).sum();
    residual + lambda * roughness
}

/// Gradient of the smoothing objective at `x`, written into `grad`.
fn objective_gradient(target: &[f64], x: &[f64], lambda: f64, grad: &mut [f64]) {
    for ((g, &xi), &yi) in grad.iter_mut().zip(x).zip(target) {
        *g = 2.0 * (xi - yi);
    }
    // 2 * lambda * D3^T D3 x
    for (i, d) in third_difference(x).into_iter().enumerate() {
        let d = 2.0 * lambda * d;
        grad[i] -= d;
        grad[i + 1] += 3.0 * d;
        grad[i + 2] -= 3.0 * d;
        grad[i + 3] += d;
    }
}

/// Minimize the smoothing objective over non-decreasing sequences.
///
/// * `target` - Raw values to approximate.
/// * `lambda` - Weight of the third difference penalty, non-negative.
/// * `max_iter` - Iteration limit of the solver.
/// * `tolerance` - Stop once no coordinate moves by more than
///   `tolerance * max(1, max |x|)`.
///
/// The unregularized isotonic fit is used as the starting point. It is
/// already optimal when `lambda` is zero or there are fewer than four values.
pub fn smooth_monotone(
    target: &[f64],
    lambda: f64,
    max_iter: usize,
    tolerance: f64,
) -> Result<Vec<f64>, CalibrationError> {
    let mut x = isotonic_regression(target);
    if lambda == 0.0 || target.len() < 4 {
        return Ok(x);
    }

    let step = 1.0 / (2.0 * (1.0 + lambda * THIRD_DIFF_NORM_SQ));
    let mut objective = smoothing_objective(target, &x, lambda);
    // Extrapolated point the gradient step is taken from.
    let mut y = x.clone();
    let mut momentum = 1.0_f64;
    let mut grad = vec![0.0; x.len()];
    let mut proposal = vec![0.0; x.len()];

    for iteration in 0..max_iter {
        objective_gradient(target, &y, lambda, &mut grad);
        for ((p, &yi), &g) in proposal.iter_mut().zip(&y).zip(&grad) {
            *p = yi - step * g;
        }
        let next = isotonic_regression(&proposal);
        let next_objective = smoothing_objective(target, &next, lambda);

        if momentum > 1.0 && next_objective > objective {
            y.copy_from_slice(&x);
            momentum = 1.0;
            continue;
        }

        let moved = next.iter().zip(&y).fold(0.0_f64, |m, (a, b)| m.max((a - b).abs()));
        let scale = next.iter().fold(1.0_f64, |m, v| m.max(v.abs()));

        let next_momentum = (1.0 + (1.0 + 4.0 * momentum * momentum).sqrt()) / 2.0;
        let beta = (momentum - 1.0) / next_momentum;
        for ((yi, &n), &xi) in y.iter_mut().zip(&next).zip(&x) {
            *yi = n + beta * (n - xi);
        }
        momentum = next_momentum;
        x = next;
        objective = next_objective;

        if moved <= tolerance * scale {
            debug!("Monotone smoothing converged after {} iterations.", iteration + 1);
            return Ok(x);
        }
    }
    Err(CalibrationError::NotConverged(max_iter))
}
