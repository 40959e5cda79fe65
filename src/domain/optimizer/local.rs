//! Bounded local minimization on the unit cube.
//!
//! Projected gradient descent: central finite differences for the gradient,
//! backtracking line search on the step, every iterate clamped to `[0, 1]`.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalMinimizer {
    pub max_iterations: usize,
    pub initial_step: f64,
    pub fd_step: f64,
    pub tolerance: f64,
}

impl Default for LocalMinimizer {
    fn default() -> Self {
        LocalMinimizer {
            max_iterations: 50,
            initial_step: 0.25,
            fd_step: 1e-4,
            tolerance: 1e-10,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalMinimum {
    pub point: Vec<f64>,
    pub value: f64,
    pub evaluations: usize,
}

fn project(point: &mut [f64]) {
    for x in point.iter_mut() {
        *x = x.clamp(0.0, 1.0);
    }
}

impl LocalMinimizer {
    pub fn minimize<F>(&self, f: F, start: &[f64]) -> LocalMinimum
    where
        F: Fn(&[f64]) -> f64,
    {
        let mut evaluations = 0;
        let mut eval = |p: &[f64]| {
            evaluations += 1;
            f(p)
        };

        let mut x = start.to_vec();
        project(&mut x);
        let mut fx = eval(&x);

        for _ in 0..self.max_iterations {
            let grad = self.gradient(&mut eval, &x);
            if grad.iter().all(|g| g.abs() < self.tolerance) {
                break;
            }

            let mut step = self.initial_step;
            let mut improved = None;
            while step > 1e-8 {
                let mut candidate: Vec<f64> =
                    x.iter().zip(&grad).map(|(xi, gi)| xi - step * gi).collect();
                project(&mut candidate);
                let fc = eval(&candidate);
                if fc < fx {
                    improved = Some((candidate, fc));
                    break;
                }
                step *= 0.5;
            }

            let Some((next, f_next)) = improved else {
                break;
            };
            let gain = fx - f_next;
            x = next;
            fx = f_next;
            if gain < self.tolerance {
                break;
            }
        }

        LocalMinimum {
            point: x,
            value: fx,
            evaluations,
        }
    }

    fn gradient<F>(&self, eval: &mut F, x: &[f64]) -> Vec<f64>
    where
        F: FnMut(&[f64]) -> f64,
    {
        let mut shifted = x.to_vec();
        (0..x.len())
            .map(|i| {
                let hi = (x[i] + self.fd_step).min(1.0);
                let lo = (x[i] - self.fd_step).max(0.0);
                shifted[i] = hi;
                let f_hi = eval(&shifted);
                shifted[i] = lo;
                let f_lo = eval(&shifted);
                shifted[i] = x[i];
                if hi > lo { (f_hi - f_lo) / (hi - lo) } else { 0.0 }
            })
            .collect()
    }
}
