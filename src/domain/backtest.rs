//! Backtest orchestration across a symbol list.
//!
//! For each symbol: fetch bars, compute the strategy's indicators, simulate
//! bar by bar, and hand the result to the portfolio accountant. A symbol that
//! fails is either skipped with a recorded reason or aborts the run,
//! depending on the request's [`FailurePolicy`].

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::domain::benchmark::{buy_and_hold, BenchmarkResult};
use crate::domain::error::TrendsimError;
use crate::domain::indicator::IndicatorError;
use crate::domain::metrics::Metrics;
use crate::domain::portfolio::{PortfolioAccountant, PortfolioSummary, SymbolSummary, SymbolTrades};
use crate::domain::price_bar::{first_out_of_order, Timeframe};
use crate::domain::regime::{RegimeConfig, RegimeFilter};
use crate::domain::simulator::{simulate, EquityPoint, SymbolRun};
use crate::domain::strategy::Strategy;
use crate::domain::universe::{SkipReason, SkippedSymbol};
use crate::ports::data_port::MarketDataPort;

pub const DEFAULT_INITIAL_BALANCE: f64 = 100_000.0;
pub const DEFAULT_TRAILING_STOP: f64 = 0.05;

/// What to do when one symbol cannot be simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the symbol as skipped and keep going.
    #[default]
    SkipSymbol,
    /// Fail the whole run with the symbol's error.
    Abort,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "skip" | "skip_symbol" => Ok(FailurePolicy::SkipSymbol),
            "abort" => Ok(FailurePolicy::Abort),
            other => Err(format!("unknown failure policy '{other}'")),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::SkipSymbol => write!(f, "skip"),
            FailurePolicy::Abort => write!(f, "abort"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestRequest {
    pub symbols: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub timeframe: Timeframe,
    pub strategy: Strategy,
    pub initial_balance: f64,
    /// Fraction in `(0, 1)`; zero disables the trailing stop.
    pub trailing_stop: f64,
    pub regime: RegimeConfig,
    pub failure_policy: FailurePolicy,
    pub benchmark: Option<String>,
}

impl BacktestRequest {
    pub fn new(symbols: Vec<String>, start: NaiveDate, end: NaiveDate, strategy: Strategy) -> Self {
        BacktestRequest {
            symbols,
            start,
            end,
            timeframe: Timeframe::Day,
            strategy,
            initial_balance: DEFAULT_INITIAL_BALANCE,
            trailing_stop: DEFAULT_TRAILING_STOP,
            regime: RegimeConfig::default(),
            failure_policy: FailurePolicy::default(),
            benchmark: None,
        }
    }

    pub fn validate(&self) -> Result<(), TrendsimError> {
        if self.symbols.is_empty() {
            return Err(TrendsimError::invalid_parameter(
                "symbols",
                "at least one symbol is required",
            ));
        }
        if self.start > self.end {
            return Err(TrendsimError::invalid_parameter(
                "start",
                format!("start date {} is after end date {}", self.start, self.end),
            ));
        }
        if !(self.initial_balance.is_finite() && self.initial_balance > 0.0) {
            return Err(TrendsimError::invalid_parameter(
                "initial_balance",
                format!("{} must be positive", self.initial_balance),
            ));
        }
        if !(self.trailing_stop == 0.0 || (self.trailing_stop > 0.0 && self.trailing_stop < 1.0)) {
            return Err(TrendsimError::invalid_parameter(
                "trailing_stop",
                format!("{} must be 0 or lie in (0, 1)", self.trailing_stop),
            ));
        }
        if self.regime.enabled {
            if self.regime.short_ma == 0 || self.regime.long_ma == 0 {
                return Err(TrendsimError::invalid_parameter(
                    "regime",
                    "moving average periods must be at least 1",
                ));
            }
            if !(self.regime.crash_threshold > 0.0 && self.regime.crash_threshold < 1.0) {
                return Err(TrendsimError::invalid_parameter(
                    "crash_threshold",
                    format!("{} must lie in (0, 1)", self.regime.crash_threshold),
                ));
            }
        }
        self.strategy.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyPerformance {
    /// `YYYY-MM`
    pub month: String,
    pub balance: f64,
    pub return_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestReport {
    pub strategy: Strategy,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub total_return_pct: f64,
    pub summary: PortfolioSummary,
    pub per_symbol: Vec<SymbolSummary>,
    pub trade_history: Vec<SymbolTrades>,
    pub skipped: Vec<SkippedSymbol>,
    pub equity_curve: Vec<EquityPoint>,
    pub monthly_performance: Vec<MonthlyPerformance>,
    pub metrics: Metrics,
    pub benchmark: Option<BenchmarkResult>,
}

/// Run a full multi-symbol backtest.
pub fn run_backtest(
    port: &dyn MarketDataPort,
    request: &BacktestRequest,
) -> Result<BacktestReport, TrendsimError> {
    request.validate()?;
    tracing::info!(
        strategy = %request.strategy,
        symbols = request.symbols.len(),
        start = %request.start,
        end = %request.end,
        "backtest started"
    );

    let regime = build_regime_filter(port, request);
    let mut accountant = PortfolioAccountant::new(request.initial_balance, request.symbols.len());

    for symbol in &request.symbols {
        match run_symbol(port, request, &regime, symbol, accountant.allocation()) {
            Ok(run) => accountant.record(run),
            Err(err) => match request.failure_policy {
                FailurePolicy::Abort => return Err(err),
                FailurePolicy::SkipSymbol => {
                    tracing::warn!(%symbol, error = %err, "skipping symbol");
                    accountant.skip(SkippedSymbol {
                        symbol: symbol.clone(),
                        reason: SkipReason::from_error(&err),
                    });
                }
            },
        }
    }

    let equity_curve = accountant.equity_curve();
    let final_balance = accountant.final_balance();
    let monthly_performance = if equity_curve.is_empty() {
        interpolated_monthly_performance(
            request.initial_balance,
            final_balance,
            request.start,
            request.end,
        )
    } else {
        monthly_performance(&equity_curve, request.initial_balance)
    };
    let metrics = Metrics::compute(
        &equity_curve,
        &accountant.round_trips(),
        request.initial_balance,
        request.timeframe.periods_per_year(),
    );
    let benchmark = request
        .benchmark
        .as_deref()
        .and_then(|symbol| run_benchmark(port, request, symbol));

    let report = BacktestReport {
        strategy: request.strategy.clone(),
        start: request.start,
        end: request.end,
        initial_balance: request.initial_balance,
        final_balance,
        total_return_pct: accountant.total_return_pct(),
        summary: accountant.summary(),
        per_symbol: accountant.symbol_summaries(),
        trade_history: accountant.trade_history(),
        skipped: accountant.skipped().to_vec(),
        equity_curve,
        monthly_performance,
        metrics,
        benchmark,
    };

    tracing::info!(
        final_balance = report.final_balance,
        return_pct = report.total_return_pct,
        trades = report.summary.total_trade_events,
        skipped = report.skipped.len(),
        "backtest finished"
    );
    Ok(report)
}

fn run_symbol(
    port: &dyn MarketDataPort,
    request: &BacktestRequest,
    regime: &RegimeFilter,
    symbol: &str,
    allocation: f64,
) -> Result<SymbolRun, TrendsimError> {
    let (start, end) = (request.start, request.end);
    let bars = port.get_bars(symbol, request.timeframe, start, end)?;

    if let Some(i) = first_out_of_order(&bars) {
        return Err(TrendsimError::DataUnavailable {
            symbol: symbol.to_string(),
            start,
            end,
            reason: format!("bar {} is not strictly after its predecessor", i),
        });
    }

    let frame = request
        .strategy
        .build_frame(symbol, bars)
        .map_err(|err| label_indicator_error(err, symbol, start, end))?;

    Ok(simulate(
        &request.strategy,
        &frame,
        regime,
        allocation,
        request.trailing_stop,
    ))
}

fn label_indicator_error(
    err: IndicatorError,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> TrendsimError {
    match err {
        IndicatorError::InsufficientData { bars, required, .. } => {
            TrendsimError::InsufficientData {
                symbol: symbol.to_string(),
                start,
                end,
                bars,
                required,
            }
        }
        other => TrendsimError::Computation {
            symbol: symbol.to_string(),
            start,
            end,
            reason: other.to_string(),
        },
    }
}

/// Load reference and volatility series with enough history before `start`
/// for the regime's moving averages. Fetch failures leave the filter to fail
/// open.
fn build_regime_filter(port: &dyn MarketDataPort, request: &BacktestRequest) -> RegimeFilter {
    let config = &request.regime;
    if !config.enabled {
        return RegimeFilter::new(config.clone(), None, None);
    }

    let warmup_bars = config.long_ma.max(config.short_ma) + config.crash_lookback;
    let lookback = Duration::days((warmup_bars as i64 * 3) / 2 + 10);
    let from = request.start - lookback;

    let fetch = |symbol: &str| match port.get_bars(symbol, Timeframe::Day, from, request.end) {
        Ok(bars) if first_out_of_order(&bars).is_none() => Some(bars),
        Ok(_) => {
            tracing::warn!(symbol, "regime series out of order, ignoring it");
            None
        }
        Err(err) => {
            tracing::warn!(symbol, error = %err, "regime series unavailable");
            None
        }
    };

    let reference = fetch(&config.reference_symbol);
    let volatility = fetch(&config.volatility_symbol);
    RegimeFilter::new(config.clone(), reference.as_deref(), volatility.as_deref())
}

fn run_benchmark(
    port: &dyn MarketDataPort,
    request: &BacktestRequest,
    symbol: &str,
) -> Option<BenchmarkResult> {
    match port.get_bars(symbol, Timeframe::Day, request.start, request.end) {
        Ok(bars) => buy_and_hold(symbol, &bars, request.initial_balance),
        Err(err) => {
            tracing::warn!(symbol, error = %err, "benchmark unavailable");
            None
        }
    }
}

fn month_label(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// Month-end balances resampled from an equity curve. Each month's return is
/// relative to the previous month-end, starting from `initial_balance`.
pub fn monthly_performance(curve: &[EquityPoint], initial_balance: f64) -> Vec<MonthlyPerformance> {
    let mut month_ends: Vec<(String, f64)> = Vec::new();
    for point in curve {
        let label = month_label(point.timestamp.date());
        match month_ends.last_mut() {
            Some((last, equity)) if *last == label => *equity = point.equity,
            _ => month_ends.push((label, point.equity)),
        }
    }

    let mut previous = initial_balance;
    month_ends
        .into_iter()
        .map(|(month, balance)| {
            let return_pct = if previous > 0.0 {
                (balance - previous) / previous * 100.0
            } else {
                0.0
            };
            previous = balance;
            MonthlyPerformance {
                month,
                balance,
                return_pct,
            }
        })
        .collect()
}

/// Geometric interpolation from `initial` to `final_balance` across the
/// calendar months spanned by `[start, end]`. An approximation used only
/// when no equity curve exists.
pub fn interpolated_monthly_performance(
    initial: f64,
    final_balance: f64,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<MonthlyPerformance> {
    if start > end || initial <= 0.0 || final_balance < 0.0 {
        return Vec::new();
    }
    let months = (end.year() - start.year()) * 12 + end.month() as i32 - start.month() as i32 + 1;
    let rate = (final_balance / initial).powf(1.0 / months as f64) - 1.0;

    let mut year = start.year();
    let mut month = start.month();
    (1..=months)
        .map(|k| {
            let entry = MonthlyPerformance {
                month: format!("{:04}-{:02}", year, month),
                balance: initial * (1.0 + rate).powi(k),
                return_pct: rate * 100.0,
            };
            if month == 12 {
                year += 1;
                month = 1;
            } else {
                month += 1;
            }
            entry
        })
        .collect()
}
