//! Trend smoothing for chart overlays.
//!
//! Charts draw a smoothed curve over each plotted series. The smoother sits
//! behind [`TrendSmoother`] so the chart builder does not depend on a
//! particular regression; [`Lowess`] is the default.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median};
use std::cmp::Ordering;

/// Fraction of points used for each local regression.
pub const DEFAULT_FRAC: f64 = 2.0 / 3.0;
/// Robustifying iterations after the initial fit.
pub const DEFAULT_ITERATIONS: usize = 3;

/// Produces a smoothed curve from (x, y) points.
pub trait TrendSmoother {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Smooth `points`, returning the curve sorted by x.
    ///
    /// Non-finite points are ignored. Fewer than two usable points yields
    /// an empty curve.
    fn smooth(&self, points: &[(f64, f64)]) -> Vec<(f64, f64)>;
}

/// Locally weighted scatterplot smoothing.
///
/// Each point is fitted by a weighted linear regression over its
/// `frac * n` nearest neighbours (tricube weights), followed by
/// `iterations` passes that down-weight large residuals (bisquare).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lowess {
    pub frac: f64,
    pub iterations: usize,
}

impl Default for Lowess {
    fn default() -> Self {
        Self {
            frac: DEFAULT_FRAC,
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl Lowess {
    pub fn new(frac: f64, iterations: usize) -> Self {
        Self { frac, iterations }
    }

    /// Neighbourhood size for `n` points.
    fn window(&self, n: usize) -> usize {
        let k = (self.frac * n as f64 + 1e-10).floor() as usize;
        k.clamp(2, n)
    }

    pub fn fit(&self, points: &[(f64, f64)]) -> Vec<(f64, f64)> {
        let mut sorted: Vec<(f64, f64)> = points
            .iter()
            .copied()
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .collect();
        if sorted.len() < 2 {
            return Vec::new();
        }
        sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

        let n = sorted.len();
        let xs: Vec<f64> = sorted.iter().map(|p| p.0).collect();
        let ys: Vec<f64> = sorted.iter().map(|p| p.1).collect();
        let k = self.window(n);

        let mut robustness = vec![1.0; n];
        let mut fitted = vec![0.0; n];
        let mut weights = vec![0.0; k];

        for iteration in 0..=self.iterations {
            let mut left = 0;
            for i in 0..n {
                // Slide [left, left + k) to the k nearest neighbours of xs[i]
                while left + k < n && xs[i] - xs[left] > xs[left + k] - xs[i] {
                    left += 1;
                }
                let right = left + k - 1;
                let radius = (xs[i] - xs[left]).max(xs[right] - xs[i]);

                for (slot, j) in weights.iter_mut().zip(left..=right) {
                    let u = if radius > 0.0 {
                        (xs[j] - xs[i]).abs() / radius
                    } else {
                        0.0
                    };
                    *slot = tricube(u) * robustness[j];
                }

                fitted[i] = weighted_linear_fit(&xs[left..=right], &ys[left..=right], &weights, xs[i])
                    .unwrap_or(ys[i]);
            }

            if iteration == self.iterations {
                break;
            }

            let residuals: Vec<f64> = ys.iter().zip(&fitted).map(|(y, f)| y - f).collect();
            let abs: Vec<f64> = residuals.iter().map(|r| r.abs()).collect();
            let scale = median(&abs);
            if scale <= f64::EPSILON * ys.iter().map(|y| y.abs()).fold(1.0, f64::max) {
                // Residuals are negligible; further passes would not move the fit
                break;
            }
            for (w, r) in robustness.iter_mut().zip(&residuals) {
                *w = bisquare(r / (6.0 * scale));
            }
        }

        xs.into_iter().zip(fitted).collect()
    }
}

impl TrendSmoother for Lowess {
    fn name(&self) -> &'static str {
        "lowess"
    }

    fn smooth(&self, points: &[(f64, f64)]) -> Vec<(f64, f64)> {
        self.fit(points)
    }
}

fn tricube(u: f64) -> f64 {
    if u >= 1.0 {
        0.0
    } else {
        let t = 1.0 - u * u * u;
        t * t * t
    }
}

fn bisquare(u: f64) -> f64 {
    if u.abs() >= 1.0 {
        0.0
    } else {
        let t = 1.0 - u * u;
        t * t
    }
}

/// Weighted least-squares line through the points, evaluated at `x0`.
///
/// The design matrix is centred on `x0` so the intercept is the fitted
/// value, and scaled so epoch-second x values stay well conditioned.
/// Returns `None` when every weight is zero.
fn weighted_linear_fit(xs: &[f64], ys: &[f64], weights: &[f64], x0: f64) -> Option<f64> {
    let sum_w: f64 = weights.iter().sum();
    if sum_w <= 0.0 {
        return None;
    }

    let scale = xs
        .iter()
        .map(|x| (x - x0).abs())
        .fold(0.0, f64::max)
        .max(f64::MIN_POSITIVE);
    let roots: Vec<f64> = weights.iter().map(|w| w.max(0.0).sqrt()).collect();

    let design = DMatrix::from_fn(xs.len(), 2, |row, col| match col {
        0 => roots[row],
        _ => roots[row] * (xs[row] - x0) / scale,
    });
    let target = DVector::from_iterator(ys.len(), ys.iter().zip(&roots).map(|(y, r)| y * r));

    // Near-singular directions (no x spread) are dropped, leaving the weighted mean
    let svd = design.svd(true, true);
    let eps = 1e-10 * svd.singular_values.max();
    let coefficients = svd.solve(&target, eps).ok()?;
    let fitted = coefficients[0];
    fitted.is_finite().then_some(fitted)
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    Data::new(values.to_vec()).median()
}
