//! Acquisition functions in minimization form: lower scores are more
//! attractive candidates.

use super::Acquisition;

pub const DEFAULT_BETA: f64 = 2.576;
const MIN_STD: f64 = 1e-9;

/// Standard normal CDF (Abramowitz-Stegun 7.1.26).
pub fn normal_cdf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs() / std::f64::consts::SQRT_2;

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    0.5 * (1.0 + sign * y)
}

/// Lower confidence bound whose exploration weight shrinks as the predicted
/// mean beats the incumbent.
///
/// `score = μ − σ·κ` with `κ = β·Φ(−z)` and `z = (best − μ)/σ`. Collapses to
/// `μ` when `σ` is effectively zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapWeightedBound {
    pub beta: f64,
}

impl Default for GapWeightedBound {
    fn default() -> Self {
        GapWeightedBound { beta: DEFAULT_BETA }
    }
}

impl Acquisition for GapWeightedBound {
    fn score(&self, mean: f64, std: f64, best: f64) -> f64 {
        if std.is_nan() || std < MIN_STD {
            return mean;
        }
        let z = (best - mean) / std;
        let kappa = self.beta * normal_cdf(-z);
        mean - std * kappa
    }
}
