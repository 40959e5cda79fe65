//! Typed run settings built from an INI config.

use std::path::PathBuf;

use crate::domain::backtest::{BacktestRequest, FailurePolicy, DEFAULT_TRAILING_STOP};
use crate::domain::config_validation::{
    invalid, parse_date, strategy_kind, validate_backtest_config, validate_optimizer_config,
    validate_regime_config, validate_strategy_config,
};
use crate::domain::error::TrendsimError;
use crate::domain::indicator::MaKind;
use crate::domain::optimizer::{OptimizerConfig, SearchKind};
use crate::domain::parameters::ParameterSpace;
use crate::domain::price_bar::Timeframe;
use crate::domain::regime::RegimeConfig;
use crate::domain::strategy::Strategy;
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_DATA_DIR: &str = "data";
/// Trailing stop used for optimizer trials unless `[optimizer] trailing_stop` says otherwise.
pub const OPTIMIZER_TRAILING_STOP: f64 = 0.1;

/// Run every section validator.
pub fn validate_config(config: &dyn ConfigPort) -> Result<(), TrendsimError> {
    validate_backtest_config(config)?;
    validate_strategy_config(config)?;
    validate_regime_config(config)?;
    validate_optimizer_config(config)?;
    Ok(())
}

pub fn data_dir(config: &dyn ConfigPort) -> PathBuf {
    PathBuf::from(
        config
            .get_string("backtest", "data_dir")
            .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
    )
}

fn period(config: &dyn ConfigPort, key: &str, default: usize) -> usize {
    config.get_int("strategy", key, default as i64).max(1) as usize
}

pub fn load_strategy(config: &dyn ConfigPort) -> Result<Strategy, TrendsimError> {
    validate_strategy_config(config)?;
    let strategy = match strategy_kind(config)?.default_strategy() {
        Strategy::Macd { fast, slow, signal } => Strategy::Macd {
            fast: period(config, "fast", fast),
            slow: period(config, "slow", slow),
            signal: period(config, "signal", signal),
        },
        Strategy::Rsi {
            period: p,
            oversold,
            overbought,
        } => Strategy::Rsi {
            period: period(config, "period", p),
            oversold: config.get_double("strategy", "oversold", oversold),
            overbought: config.get_double("strategy", "overbought", overbought),
        },
        Strategy::MaCrossover { short, long, kind } => Strategy::MaCrossover {
            short: period(config, "short", short),
            long: period(config, "long", long),
            kind: match config.get_string("strategy", "ma_type") {
                Some(raw) => raw
                    .parse::<MaKind>()
                    .map_err(|e| invalid("strategy", "ma_type", e))?,
                None => kind,
            },
        },
    };

    strategy.validate().map_err(|err| match err {
        TrendsimError::InvalidParameter { name, reason } => invalid("strategy", &name, reason),
        other => other,
    })?;
    Ok(strategy)
}

pub fn load_regime(config: &dyn ConfigPort) -> Result<RegimeConfig, TrendsimError> {
    validate_regime_config(config)?;
    let defaults = RegimeConfig::default();
    let count = |key: &str, default: usize| config.get_int("regime", key, default as i64).max(1) as usize;

    Ok(RegimeConfig {
        enabled: config.get_bool("regime", "enabled", defaults.enabled),
        reference_symbol: config
            .get_string("regime", "reference_symbol")
            .map(|s| s.to_uppercase())
            .unwrap_or(defaults.reference_symbol),
        volatility_symbol: config
            .get_string("regime", "volatility_symbol")
            .map(|s| s.to_uppercase())
            .unwrap_or(defaults.volatility_symbol),
        volatility_threshold: config.get_double(
            "regime",
            "volatility_threshold",
            defaults.volatility_threshold,
        ),
        crash_threshold: config.get_double("regime", "crash_threshold", defaults.crash_threshold),
        crash_lookback: count("crash_lookback", defaults.crash_lookback),
        short_ma: count("short_ma", defaults.short_ma),
        long_ma: count("long_ma", defaults.long_ma),
    })
}

pub fn load_backtest_request(config: &dyn ConfigPort) -> Result<BacktestRequest, TrendsimError> {
    validate_backtest_config(config)?;

    let raw_symbols = config.get_string("backtest", "symbols").unwrap_or_default();
    let symbols =
        parse_symbols(&raw_symbols).map_err(|e| invalid("backtest", "symbols", e.to_string()))?;
    let start = parse_date(config, "start_date")?;
    let end = parse_date(config, "end_date")?;

    let mut request = BacktestRequest::new(symbols, start, end, load_strategy(config)?);
    if let Some(raw) = config.get_string("backtest", "timeframe") {
        request.timeframe = raw
            .parse::<Timeframe>()
            .map_err(|e| invalid("backtest", "timeframe", e))?;
    }
    request.initial_balance =
        config.get_double("backtest", "initial_balance", request.initial_balance);
    request.trailing_stop = config.get_double("backtest", "trailing_stop", DEFAULT_TRAILING_STOP);
    if let Some(raw) = config.get_string("backtest", "on_symbol_error") {
        request.failure_policy = raw
            .parse::<FailurePolicy>()
            .map_err(|e| invalid("backtest", "on_symbol_error", e))?;
    }
    request.benchmark = config
        .get_string("backtest", "benchmark")
        .map(|s| s.to_uppercase());
    request.regime = load_regime(config)?;

    request.validate()?;
    Ok(request)
}

/// Backtest request for optimizer trials: the `[backtest]` request with the
/// optimizer's trailing stop.
pub fn load_optimizer_request(config: &dyn ConfigPort) -> Result<BacktestRequest, TrendsimError> {
    let mut request = load_backtest_request(config)?;
    request.trailing_stop = config.get_double("optimizer", "trailing_stop", OPTIMIZER_TRAILING_STOP);
    request.validate()?;
    Ok(request)
}

/// The strategy's default search box with any `<param>_min` / `<param>_max`
/// overrides applied.
pub fn load_parameter_space(config: &dyn ConfigPort) -> Result<ParameterSpace, TrendsimError> {
    validate_optimizer_config(config)?;
    let mut space = strategy_kind(config)?.default_space();
    for dim in space.dims().to_vec() {
        let low = config.get_double("optimizer", &format!("{}_min", dim.name), dim.low);
        let high = config.get_double("optimizer", &format!("{}_max", dim.name), dim.high);
        if low != dim.low || high != dim.high {
            space = space
                .with_bound(&dim.name, low, high)
                .map_err(|e| invalid("optimizer", &format!("{}_min", dim.name), e.to_string()))?;
        }
    }
    Ok(space)
}

pub fn load_optimizer_config(config: &dyn ConfigPort) -> Result<OptimizerConfig, TrendsimError> {
    validate_optimizer_config(config)?;
    let defaults = OptimizerConfig::default();
    let count = |key: &str, default: usize| config.get_int("optimizer", key, default as i64).max(0) as usize;

    let search = match config.get_string("optimizer", "search") {
        Some(raw) => raw
            .parse::<SearchKind>()
            .map_err(|e| invalid("optimizer", "search", e))?,
        None => defaults.search,
    };
    let seed = config
        .get_string("optimizer", "seed")
        .map(|raw| {
            raw.parse::<u64>()
                .map_err(|_| invalid("optimizer", "seed", "seed must be a non-negative integer"))
        })
        .transpose()?;

    let loaded = OptimizerConfig {
        n_init: count("n_init", defaults.n_init),
        n_iterations: count("n_iterations", defaults.n_iterations),
        restarts: count("restarts", defaults.restarts),
        seed,
        search,
        beta: config.get_double("optimizer", "beta", defaults.beta),
    };
    loaded.validate().map_err(|err| match err {
        TrendsimError::InvalidParameter { name, reason } => invalid("optimizer", &name, reason),
        other => other,
    })?;
    Ok(loaded)
}
