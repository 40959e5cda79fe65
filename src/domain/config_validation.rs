//! Configuration validation.
//!
//! Validates every config field before a run. The `settings` module builds
//! typed requests only from configs that pass these checks.

use chrono::NaiveDate;

use crate::domain::error::TrendsimError;
use crate::domain::indicator::MaKind;
use crate::domain::optimizer::SearchKind;
use crate::domain::price_bar::Timeframe;
use crate::domain::strategy::StrategyKind;
use crate::domain::universe::parse_symbols;
use crate::ports::config_port::ConfigPort;

pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> TrendsimError {
    TrendsimError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

pub(crate) fn missing(section: &str, key: &str) -> TrendsimError {
    TrendsimError::ConfigMissing {
        section: section.to_string(),
        key: key.to_string(),
    }
}

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), TrendsimError> {
    validate_symbols(config)?;
    validate_dates(config)?;
    validate_timeframe(config)?;
    validate_initial_balance(config)?;
    validate_trailing_stop(config, "backtest")?;
    validate_failure_policy(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), TrendsimError> {
    let kind = strategy_kind(config)?;
    let periods: &[&str] = match kind {
        StrategyKind::Macd => &["fast", "slow", "signal"],
        StrategyKind::Rsi => &["period"],
        StrategyKind::MaCrossover => &["short", "long"],
    };
    for key in periods {
        validate_positive_int(config, "strategy", key)?;
    }
    if kind == StrategyKind::MaCrossover {
        if let Some(raw) = config.get_string("strategy", "ma_type") {
            raw.parse::<MaKind>()
                .map_err(|e| invalid("strategy", "ma_type", e))?;
        }
    }
    Ok(())
}

pub fn validate_regime_config(config: &dyn ConfigPort) -> Result<(), TrendsimError> {
    if !config.get_bool("regime", "enabled", true) {
        return Ok(());
    }
    validate_positive_int(config, "regime", "short_ma")?;
    validate_positive_int(config, "regime", "long_ma")?;
    validate_positive_int(config, "regime", "crash_lookback")?;

    let crash = config.get_double("regime", "crash_threshold", 0.10);
    if crash <= 0.0 || crash >= 1.0 {
        return Err(invalid(
            "regime",
            "crash_threshold",
            "crash_threshold must be between 0 and 1",
        ));
    }
    let volatility = config.get_double("regime", "volatility_threshold", 30.0);
    if volatility <= 0.0 {
        return Err(invalid(
            "regime",
            "volatility_threshold",
            "volatility_threshold must be positive",
        ));
    }
    Ok(())
}

pub fn validate_optimizer_config(config: &dyn ConfigPort) -> Result<(), TrendsimError> {
    for key in ["n_init", "n_iterations", "restarts"] {
        if config.get_int("optimizer", key, 0) < 0 {
            return Err(invalid("optimizer", key, format!("{} must be non-negative", key)));
        }
    }
    if config.get_int("optimizer", "seed", 0) < 0 {
        return Err(invalid("optimizer", "seed", "seed must be non-negative"));
    }
    if let Some(raw) = config.get_string("optimizer", "search") {
        raw.parse::<SearchKind>()
            .map_err(|e| invalid("optimizer", "search", e))?;
    }
    let beta = config.get_double("optimizer", "beta", 2.576);
    if beta < 0.0 {
        return Err(invalid("optimizer", "beta", "beta must be non-negative"));
    }
    validate_trailing_stop(config, "optimizer")?;
    validate_bound_overrides(config)?;
    Ok(())
}

fn validate_symbols(config: &dyn ConfigPort) -> Result<(), TrendsimError> {
    let raw = config
        .get_string("backtest", "symbols")
        .ok_or_else(|| missing("backtest", "symbols"))?;
    parse_symbols(&raw).map_err(|e| invalid("backtest", "symbols", e.to_string()))?;
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), TrendsimError> {
    let start = parse_date(config, "start_date")?;
    let end = parse_date(config, "end_date")?;
    if start > end {
        return Err(invalid(
            "backtest",
            "start_date",
            "start_date must not be after end_date",
        ));
    }
    Ok(())
}

pub(crate) fn parse_date(config: &dyn ConfigPort, field: &str) -> Result<NaiveDate, TrendsimError> {
    let raw = config
        .get_string("backtest", field)
        .ok_or_else(|| missing("backtest", field))?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
        invalid(
            "backtest",
            field,
            format!("invalid {} format, expected YYYY-MM-DD", field),
        )
    })
}

fn validate_timeframe(config: &dyn ConfigPort) -> Result<(), TrendsimError> {
    if let Some(raw) = config.get_string("backtest", "timeframe") {
        raw.parse::<Timeframe>()
            .map_err(|e| invalid("backtest", "timeframe", e))?;
    }
    Ok(())
}

fn validate_initial_balance(config: &dyn ConfigPort) -> Result<(), TrendsimError> {
    let value = config.get_double("backtest", "initial_balance", 100_000.0);
    if value <= 0.0 {
        return Err(invalid(
            "backtest",
            "initial_balance",
            "initial_balance must be positive",
        ));
    }
    Ok(())
}

fn validate_trailing_stop(config: &dyn ConfigPort, section: &str) -> Result<(), TrendsimError> {
    let value = config.get_double(section, "trailing_stop", 0.05);
    if !(0.0..1.0).contains(&value) {
        return Err(invalid(
            section,
            "trailing_stop",
            "trailing_stop must be 0 (disabled) or between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_failure_policy(config: &dyn ConfigPort) -> Result<(), TrendsimError> {
    if let Some(raw) = config.get_string("backtest", "on_symbol_error") {
        if !matches!(raw.to_lowercase().as_str(), "skip" | "skip_symbol" | "abort") {
            return Err(invalid(
                "backtest",
                "on_symbol_error",
                "on_symbol_error must be skip or abort",
            ));
        }
    }
    Ok(())
}

pub(crate) fn strategy_kind(config: &dyn ConfigPort) -> Result<StrategyKind, TrendsimError> {
    match config.get_string("strategy", "kind") {
        None => Ok(StrategyKind::Macd),
        Some(raw) => raw
            .parse::<StrategyKind>()
            .map_err(|e| invalid("strategy", "kind", e)),
    }
}

fn validate_positive_int(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), TrendsimError> {
    if config.get_string(section, key).is_some() && config.get_int(section, key, 0) < 1 {
        return Err(invalid(section, key, format!("{} must be at least 1", key)));
    }
    Ok(())
}

/// `<param>_min` / `<param>_max` keys must be numeric and name a tunable
/// parameter of the configured strategy.
fn validate_bound_overrides(config: &dyn ConfigPort) -> Result<(), TrendsimError> {
    let space = strategy_kind(config)?.default_space();
    for key in config.keys("optimizer") {
        let Some(name) = key
            .strip_suffix("_min")
            .or_else(|| key.strip_suffix("_max"))
        else {
            continue;
        };
        if !space.dims().iter().any(|d| d.name == name) {
            return Err(invalid(
                "optimizer",
                &key,
                format!("'{}' is not a tunable parameter", name),
            ));
        }
        let numeric = config
            .get_string("optimizer", &key)
            .is_some_and(|v| v.parse::<f64>().is_ok_and(f64::is_finite));
        if !numeric {
            return Err(invalid("optimizer", &key, format!("{} must be a number", key)));
        }
    }
    Ok(())
}
