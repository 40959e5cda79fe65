//! Candidate proposal strategies.

use rand::rngs::StdRng;
use rand::Rng;

use super::local::LocalMinimizer;
use super::{Acquisition, Observation, SearchStrategy, Surrogate};
use crate::domain::cancel::CancellationToken;
use crate::domain::parameters::ParameterSpace;

/// Sequential model-based search: random seeding, then the minimizer of the
/// acquisition over a surrogate fitted to every observation so far.
pub struct BayesianSearch<S, A> {
    surrogate: S,
    acquisition: A,
    minimizer: LocalMinimizer,
    n_init: usize,
    restarts: usize,
}

impl<S: Surrogate, A: Acquisition> BayesianSearch<S, A> {
    pub fn new(surrogate: S, acquisition: A, n_init: usize, restarts: usize) -> Self {
        BayesianSearch {
            surrogate,
            acquisition,
            minimizer: LocalMinimizer::default(),
            n_init,
            restarts: restarts.max(1),
        }
    }

    pub fn surrogate(&self) -> &S {
        &self.surrogate
    }

    fn acquisition_optimum(
        &self,
        space: &ParameterSpace,
        best: f64,
        rng: &mut StdRng,
        cancel: &CancellationToken,
    ) -> Option<(Vec<f64>, f64)> {
        let score = |u: &[f64]| {
            let (mean, std) = self.surrogate.predict(u);
            self.acquisition.score(mean, std, best)
        };

        let mut best_candidate: Option<(Vec<f64>, f64)> = None;
        for _ in 0..self.restarts {
            if cancel.is_cancelled() {
                return None;
            }
            let start: Vec<f64> = (0..space.len()).map(|_| rng.gen_range(0.0..=1.0)).collect();
            let local = self.minimizer.minimize(&score, &start);
            if best_candidate
                .as_ref()
                .is_none_or(|(_, value)| local.value < *value)
            {
                best_candidate = Some((local.point, local.value));
            }
        }
        best_candidate
    }
}

impl<S: Surrogate, A: Acquisition> SearchStrategy for BayesianSearch<S, A> {
    fn name(&self) -> &'static str {
        "bayesian"
    }

    fn propose(
        &mut self,
        space: &ParameterSpace,
        history: &[Observation],
        rng: &mut StdRng,
        cancel: &CancellationToken,
    ) -> Option<Vec<f64>> {
        if history.len() < self.n_init {
            return Some(space.sample(rng));
        }

        let x: Vec<Vec<f64>> = history.iter().map(|o| space.to_unit(&o.point)).collect();
        let y: Vec<f64> = history.iter().map(|o| o.objective).collect();
        if let Err(err) = self.surrogate.fit(&x, &y) {
            tracing::warn!(error = %err, "surrogate fit failed, sampling at random");
            return Some(space.sample(rng));
        }

        let best = y.iter().copied().fold(f64::INFINITY, f64::min);
        let (unit_point, score) = self.acquisition_optimum(space, best, rng, cancel)?;
        let candidate = space.from_unit(&unit_point);
        tracing::debug!(?candidate, score, "acquisition optimum");
        Some(candidate)
    }
}

/// Uniform random proposals.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSearch;

impl SearchStrategy for RandomSearch {
    fn name(&self) -> &'static str {
        "random"
    }

    fn propose(
        &mut self,
        space: &ParameterSpace,
        _history: &[Observation],
        rng: &mut StdRng,
        _cancel: &CancellationToken,
    ) -> Option<Vec<f64>> {
        Some(space.sample(rng))
    }
}

/// Walks an integer grid over the space, at most `budget` points, in
/// odometer order. Exhausts after the last point.
#[derive(Debug, Clone)]
pub struct GridSearch {
    points: Vec<Vec<f64>>,
    cursor: usize,
}

impl GridSearch {
    pub fn new(space: &ParameterSpace, budget: usize) -> Self {
        let budget = budget.max(1);
        let dims = space.len().max(1);
        let per_dim = (((budget as f64).powf(1.0 / dims as f64) + 1e-9).floor() as usize).max(1);

        let axes: Vec<Vec<f64>> = space
            .dims()
            .iter()
            .map(|d| {
                let axis: Vec<f64> = if per_dim == 1 || d.width() == 0.0 {
                    vec![(d.low + d.high) / 2.0]
                } else {
                    (0..per_dim)
                        .map(|i| d.low + d.width() * i as f64 / (per_dim - 1) as f64)
                        .collect()
                };
                snap_axis(&axis, d.low, d.high)
            })
            .collect();

        let mut points = vec![Vec::new()];
        for axis in &axes {
            points = points
                .into_iter()
                .flat_map(|prefix| {
                    axis.iter().map(move |&v| {
                        let mut p = prefix.clone();
                        p.push(v);
                        p
                    })
                })
                .collect();
        }
        points.truncate(budget);

        GridSearch { points, cursor: 0 }
    }

    pub fn points(&self) -> &[Vec<f64>] {
        &self.points
    }
}

/// Round axis values to integers inside `[low, high]` and drop duplicates.
fn snap_axis(axis: &[f64], low: f64, high: f64) -> Vec<f64> {
    let (lo, hi) = (low.ceil(), high.floor());
    let mut snapped: Vec<f64> = axis
        .iter()
        .map(|&v| if lo <= hi { v.round().clamp(lo, hi) } else { v })
        .collect();
    snapped.dedup();
    snapped
}

impl SearchStrategy for GridSearch {
    fn name(&self) -> &'static str {
        "grid"
    }

    fn propose(
        &mut self,
        _space: &ParameterSpace,
        _history: &[Observation],
        _rng: &mut StdRng,
        _cancel: &CancellationToken,
    ) -> Option<Vec<f64>> {
        let point = self.points.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(point)
    }
}
