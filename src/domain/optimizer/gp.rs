//! Gaussian-process regression with a Matérn 5/2 kernel.
//!
//! Inputs are expected in the unit cube. Targets are standardized before
//! fitting and predictions are mapped back to the original scale. The length
//! scale is picked from a log-spaced grid by log marginal likelihood.

use ndarray::{Array1, Array2};

use super::{Surrogate, SurrogateError};

const DEFAULT_JITTER: f64 = 1e-5;
const JITTER_ESCALATIONS: usize = 5;
const LENGTH_SCALE_GRID: usize = 12;
const MIN_LOG10_LENGTH_SCALE: f64 = -1.5;
const MAX_LOG10_LENGTH_SCALE: f64 = 0.7;

/// Matérn kernel with ν = 2.5 and unit signal variance.
pub fn matern52(distance: f64, length_scale: f64) -> f64 {
    let r = 5f64.sqrt() * distance / length_scale;
    (1.0 + r + r * r / 3.0) * (-r).exp()
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Lower-triangular `L` with `a = L Lᵀ`, or `None` if `a` is not positive
/// definite.
fn cholesky(a: &Array2<f64>) -> Option<Array2<f64>> {
    let n = a.nrows();
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }

            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }
    Some(l)
}

/// Solve `L z = b`.
fn forward_substitute(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * z[j];
        }
        z[i] = (b[i] - sum) / l[[i, i]];
    }
    z
}

/// Solve `Lᵀ x = z`.
fn backward_substitute(l: &Array2<f64>, z: &Array1<f64>) -> Array1<f64> {
    let n = l.nrows();
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (z[i] - sum) / l[[i, i]];
    }
    x
}

#[derive(Debug, Clone)]
struct Posterior {
    length_scale: f64,
    chol: Array2<f64>,
    alpha: Array1<f64>,
    log_marginal_likelihood: f64,
}

#[derive(Debug, Clone)]
pub struct GaussianProcess {
    jitter: f64,
    x: Vec<Vec<f64>>,
    y_mean: f64,
    y_std: f64,
    posterior: Option<Posterior>,
}

impl Default for GaussianProcess {
    fn default() -> Self {
        GaussianProcess::new(DEFAULT_JITTER)
    }
}

impl GaussianProcess {
    pub fn new(jitter: f64) -> Self {
        GaussianProcess {
            jitter,
            x: Vec::new(),
            y_mean: 0.0,
            y_std: 1.0,
            posterior: None,
        }
    }

    pub fn length_scale(&self) -> Option<f64> {
        self.posterior.as_ref().map(|p| p.length_scale)
    }

    pub fn log_marginal_likelihood(&self) -> Option<f64> {
        self.posterior.as_ref().map(|p| p.log_marginal_likelihood)
    }

    fn kernel_matrix(&self, length_scale: f64) -> Array2<f64> {
        let n = self.x.len();
        let mut k = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            for j in 0..=i {
                let v = matern52(euclidean(&self.x[i], &self.x[j]), length_scale);
                k[[i, j]] = v;
                k[[j, i]] = v;
            }
        }
        k
    }

    /// Factor `K + jitter·I`, escalating the jitter tenfold on failure.
    fn factor(&self, k: &Array2<f64>) -> Option<Array2<f64>> {
        let mut jitter = self.jitter;
        for _ in 0..=JITTER_ESCALATIONS {
            let mut kj = k.clone();
            for i in 0..kj.nrows() {
                kj[[i, i]] += jitter;
            }
            if let Some(l) = cholesky(&kj) {
                return Some(l);
            }
            jitter *= 10.0;
        }
        None
    }

    fn posterior_for(&self, length_scale: f64, y: &Array1<f64>) -> Option<Posterior> {
        let chol = self.factor(&self.kernel_matrix(length_scale))?;
        let alpha = backward_substitute(&chol, &forward_substitute(&chol, y));
        let n = y.len() as f64;
        let log_det: f64 = (0..chol.nrows()).map(|i| chol[[i, i]].ln()).sum();
        let log_marginal_likelihood =
            -0.5 * y.dot(&alpha) - log_det - 0.5 * n * (2.0 * std::f64::consts::PI).ln();
        Some(Posterior {
            length_scale,
            chol,
            alpha,
            log_marginal_likelihood,
        })
    }
}

fn length_scale_grid() -> impl Iterator<Item = f64> {
    let step = (MAX_LOG10_LENGTH_SCALE - MIN_LOG10_LENGTH_SCALE) / (LENGTH_SCALE_GRID - 1) as f64;
    (0..LENGTH_SCALE_GRID).map(move |i| 10f64.powf(MIN_LOG10_LENGTH_SCALE + step * i as f64))
}

impl Surrogate for GaussianProcess {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), SurrogateError> {
        if x.is_empty() {
            return Err(SurrogateError::NoObservations);
        }
        if x.len() != y.len() {
            return Err(SurrogateError::ShapeMismatch {
                inputs: x.len(),
                targets: y.len(),
            });
        }
        if y.iter().any(|v| !v.is_finite()) {
            return Err(SurrogateError::NonFiniteTarget);
        }

        let n = y.len() as f64;
        let mean = y.iter().sum::<f64>() / n;
        let var = y.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = if var.sqrt() > 1e-12 { var.sqrt() } else { 1.0 };
        let y_norm: Array1<f64> = y.iter().map(|v| (v - mean) / std).collect();

        self.x = x.to_vec();
        self.y_mean = mean;
        self.y_std = std;
        self.posterior = None;

        for length_scale in length_scale_grid() {
            let Some(candidate) = self.posterior_for(length_scale, &y_norm) else {
                continue;
            };
            let better = self
                .posterior
                .as_ref()
                .is_none_or(|p| candidate.log_marginal_likelihood > p.log_marginal_likelihood);
            if better {
                self.posterior = Some(candidate);
            }
        }

        match &self.posterior {
            Some(p) => {
                tracing::debug!(
                    observations = x.len(),
                    length_scale = p.length_scale,
                    lml = p.log_marginal_likelihood,
                    "surrogate fitted"
                );
                Ok(())
            }
            None => Err(SurrogateError::NotPositiveDefinite),
        }
    }

    fn predict(&self, point: &[f64]) -> (f64, f64) {
        let Some(p) = &self.posterior else {
            return (self.y_mean, self.y_std);
        };
        let k_star: Array1<f64> = self
            .x
            .iter()
            .map(|xi| matern52(euclidean(xi, point), p.length_scale))
            .collect();
        let mean = k_star.dot(&p.alpha);
        let v = forward_substitute(&p.chol, &k_star);
        let var = (1.0 - v.dot(&v)).max(0.0);
        (mean * self.y_std + self.y_mean, var.sqrt() * self.y_std)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn kernel_is_one_at_zero_distance_and_decays() {
        assert_abs_diff_eq!(matern52(0.0, 0.5), 1.0, epsilon = 1e-12);
        assert!(matern52(0.1, 0.5) > matern52(0.4, 0.5));
        assert!(matern52(10.0, 0.5) < 1e-6);
    }

    #[test]
    fn cholesky_reconstructs_matrix() {
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let l = cholesky(&a).unwrap();
        let back = l.dot(&l.t());
        for i in 0..2 {
            for j in 0..2 {
                assert_abs_diff_eq!(back[[i, j]], a[[i, j]], epsilon = 1e-12);
            }
        }
        assert!(cholesky(&array![[1.0, 2.0], [2.0, 1.0]]).is_none());
    }

    #[test]
    fn interpolates_observations() {
        let x: Vec<Vec<f64>> = vec![vec![0.0], vec![0.25], vec![0.5], vec![0.75], vec![1.0]];
        let y: Vec<f64> = x.iter().map(|p| (p[0] * 6.0).sin() * 100.0).collect();
        let mut gp = GaussianProcess::default();
        gp.fit(&x, &y).unwrap();

        for (xi, yi) in x.iter().zip(&y) {
            let (mean, std) = gp.predict(xi);
            assert_abs_diff_eq!(mean, *yi, epsilon = 1.0);
            assert!(std < 5.0, "std {} at {:?}", std, xi);
        }
    }

    #[test]
    fn uncertainty_grows_away_from_data() {
        let x = vec![vec![0.0, 0.0], vec![0.1, 0.1], vec![0.2, 0.0]];
        let y = vec![1.0, 2.0, 1.5];
        let mut gp = GaussianProcess::default();
        gp.fit(&x, &y).unwrap();

        let (_, near) = gp.predict(&[0.1, 0.05]);
        let (_, far) = gp.predict(&[1.0, 1.0]);
        assert!(far > near);
    }

    #[test]
    fn duplicate_points_still_fit() {
        let x = vec![vec![0.5], vec![0.5], vec![0.5]];
        let y = vec![10.0, 10.0, 10.0];
        let mut gp = GaussianProcess::default();
        gp.fit(&x, &y).unwrap();
        let (mean, _) = gp.predict(&[0.5]);
        assert_abs_diff_eq!(mean, 10.0, epsilon = 1e-6);
        assert!(gp.length_scale().is_some());
    }

    #[test]
    fn rejects_bad_input() {
        let mut gp = GaussianProcess::default();
        assert_eq!(gp.fit(&[], &[]), Err(SurrogateError::NoObservations));
        assert!(matches!(
            gp.fit(&[vec![0.0]], &[1.0, 2.0]),
            Err(SurrogateError::ShapeMismatch { .. })
        ));
        assert_eq!(
            gp.fit(&[vec![0.0]], &[f64::NAN]),
            Err(SurrogateError::NonFiniteTarget)
        );
    }
}
