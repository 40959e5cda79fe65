//! Parameter optimization over repeated backtests.
//!
//! Each trial maps a candidate point to a strategy, runs a full
//! [`run_backtest`], and records the negated final balance as the objective
//! to minimize. Trials that fail score as if the balance fell to zero, so a
//! single bad region never stops the search.
//!
//! Three seams keep the search pluggable:
//!
//! - [`Surrogate`]: a regression model over observed `(point, objective)` pairs.
//! - [`Acquisition`]: scores a candidate from the surrogate's mean and std.
//! - [`SearchStrategy`]: proposes the next point given the trial history.

pub mod acquisition;
pub mod gp;
pub mod local;
pub mod search;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::backtest::{run_backtest, BacktestRequest, FailurePolicy};
use crate::domain::cancel::CancellationToken;
use crate::domain::error::TrendsimError;
use crate::domain::parameters::{ParameterSpace, ParameterVector};
use crate::ports::data_port::MarketDataPort;

use acquisition::GapWeightedBound;
use gp::GaussianProcess;
use search::{BayesianSearch, GridSearch, RandomSearch};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurrogateError {
    #[error("no observations to fit")]
    NoObservations,

    #[error("{inputs} inputs but {targets} targets")]
    ShapeMismatch { inputs: usize, targets: usize },

    #[error("objective values must be finite")]
    NonFiniteTarget,

    #[error("kernel matrix is not positive definite")]
    NotPositiveDefinite,
}

/// Regression model over points in the unit cube.
pub trait Surrogate {
    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), SurrogateError>;

    /// Predicted `(mean, std)` at `point`.
    fn predict(&self, point: &[f64]) -> (f64, f64);
}

/// Lower scores mark better candidates.
pub trait Acquisition {
    fn score(&self, mean: f64, std: f64, best: f64) -> f64;
}

/// One evaluated point, in parameter space, with its objective.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub point: Vec<f64>,
    pub objective: f64,
}

pub trait SearchStrategy {
    fn name(&self) -> &'static str;

    /// Next point to evaluate, or `None` when the strategy is exhausted or
    /// was cancelled mid-proposal.
    fn propose(
        &mut self,
        space: &ParameterSpace,
        history: &[Observation],
        rng: &mut StdRng,
        cancel: &CancellationToken,
    ) -> Option<Vec<f64>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    #[default]
    Bayesian,
    Random,
    Grid,
}

impl FromStr for SearchKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bayesian" | "gp" => Ok(SearchKind::Bayesian),
            "random" => Ok(SearchKind::Random),
            "grid" => Ok(SearchKind::Grid),
            other => Err(format!("unknown search strategy '{other}'")),
        }
    }
}

impl fmt::Display for SearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchKind::Bayesian => write!(f, "bayesian"),
            SearchKind::Random => write!(f, "random"),
            SearchKind::Grid => write!(f, "grid"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizerConfig {
    pub n_init: usize,
    pub n_iterations: usize,
    pub restarts: usize,
    pub seed: Option<u64>,
    pub search: SearchKind,
    pub beta: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            n_init: 5,
            n_iterations: 15,
            restarts: 100,
            seed: None,
            search: SearchKind::Bayesian,
            beta: acquisition::DEFAULT_BETA,
        }
    }
}

impl OptimizerConfig {
    pub fn total_trials(&self) -> usize {
        self.n_init + self.n_iterations
    }

    pub fn validate(&self) -> Result<(), TrendsimError> {
        if self.total_trials() == 0 {
            return Err(TrendsimError::invalid_parameter(
                "n_iterations",
                "at least one trial is required",
            ));
        }
        if self.search == SearchKind::Bayesian && self.n_init == 0 {
            return Err(TrendsimError::invalid_parameter(
                "n_init",
                "bayesian search needs at least one seed trial",
            ));
        }
        if !(self.beta.is_finite() && self.beta >= 0.0) {
            return Err(TrendsimError::invalid_parameter(
                "beta",
                format!("{} must be a non-negative number", self.beta),
            ));
        }
        Ok(())
    }

    fn build_search(&self, space: &ParameterSpace) -> Box<dyn SearchStrategy> {
        match self.search {
            SearchKind::Bayesian => Box::new(BayesianSearch::new(
                GaussianProcess::default(),
                GapWeightedBound { beta: self.beta },
                self.n_init,
                self.restarts,
            )),
            SearchKind::Random => Box::new(RandomSearch),
            SearchKind::Grid => Box::new(GridSearch::new(space, self.total_trials())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationTrial {
    pub index: usize,
    pub params: ParameterVector,
    pub final_balance: f64,
    pub total_return_pct: f64,
    /// Set when the backtest failed and the trial scored zero.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizationResult {
    pub strategy: String,
    pub search: SearchKind,
    pub optimized_params: BTreeMap<String, i64>,
    pub best_balance: f64,
    pub total_return_pct: f64,
    pub trials: Vec<OptimizationTrial>,
    pub cancelled: bool,
}

/// Search `space` for the strategy parameters that maximize the final
/// portfolio balance of `request`.
///
/// Parameters absent from `space` keep the values in `request.strategy`.
/// Trials always run with [`FailurePolicy::Abort`]: a trial in which any
/// symbol fails scores a zero balance, whatever `request.failure_policy` says.
/// The best trial is chosen by its observed balance, never by a surrogate
/// estimate. Cancellation returns the best trial so far with `cancelled` set,
/// or [`TrendsimError::Cancelled`] if no trial completed.
pub fn optimize_parameters(
    port: &dyn MarketDataPort,
    request: &BacktestRequest,
    space: &ParameterSpace,
    config: &OptimizerConfig,
    cancel: &CancellationToken,
) -> Result<OptimizationResult, TrendsimError> {
    request.validate()?;
    config.validate()?;

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut search = config.build_search(space);

    tracing::info!(
        strategy = %request.strategy.kind(),
        search = search.name(),
        trials = config.total_trials(),
        seed = ?config.seed,
        "optimization started"
    );

    let mut observations: Vec<Observation> = Vec::new();
    let mut trials: Vec<OptimizationTrial> = Vec::new();
    let mut cancelled = false;

    for index in 0..config.total_trials() {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }
        let Some(raw) = search.propose(space, &observations, &mut rng, cancel) else {
            cancelled = cancel.is_cancelled();
            break;
        };

        let point = space.snap(&raw);
        let trial = evaluate_trial(port, request, space, &point, index);
        tracing::info!(
            trial = index,
            params = ?trial.params,
            balance = trial.final_balance,
            "trial finished"
        );

        observations.push(Observation {
            point,
            objective: -trial.final_balance,
        });
        trials.push(trial);
    }

    let best = trials
        .iter()
        .reduce(|best, t| if t.final_balance > best.final_balance { t } else { best })
        .ok_or(TrendsimError::Cancelled)?;

    let optimized_params = best
        .params
        .iter()
        .map(|(name, value)| (name.to_string(), value.round() as i64))
        .collect();
    let (best_balance, total_return_pct) = (best.final_balance, best.total_return_pct);
    let result = OptimizationResult {
        strategy: request.strategy.kind().to_string(),
        search: config.search,
        optimized_params,
        best_balance,
        total_return_pct,
        trials,
        cancelled,
    };

    tracing::info!(
        best_balance = result.best_balance,
        return_pct = result.total_return_pct,
        trials = result.trials.len(),
        cancelled,
        "optimization finished"
    );
    Ok(result)
}

fn evaluate_trial(
    port: &dyn MarketDataPort,
    request: &BacktestRequest,
    space: &ParameterSpace,
    point: &[f64],
    index: usize,
) -> OptimizationTrial {
    let params = space.named(point);
    let outcome = request
        .strategy
        .with_parameters(&params)
        .and_then(|strategy| {
            // Any symbol failure fails the whole trial.
            let trial_request = BacktestRequest {
                strategy,
                failure_policy: FailurePolicy::Abort,
                ..request.clone()
            };
            run_backtest(port, &trial_request)
        });

    match outcome {
        Ok(report) => OptimizationTrial {
            index,
            params,
            final_balance: report.final_balance,
            total_return_pct: report.total_return_pct,
            error: None,
        },
        Err(err) => {
            tracing::warn!(trial = index, error = %err, "trial failed, scoring zero");
            OptimizationTrial {
                index,
                params,
                final_balance: 0.0,
                total_return_pct: -100.0,
                error: Some(err.to_string()),
            }
        }
    }
}
