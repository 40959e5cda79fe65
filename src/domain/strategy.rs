//! Strategy selection, parameters, and entry/exit signal evaluation.
//!
//! - MACD: enter when line > signal and histogram > 0; exit when line < signal.
//! - RSI: enter when RSI < oversold; exit when RSI > overbought.
//! - MA crossover: enter on a golden cross (short crosses above long); exit on
//!   a death cross (short crosses below long).
//!
//! Signals are only raised where every value they read is defined.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::TrendsimError;
use crate::domain::frame::{pair_at, IndicatorFrame};
use crate::domain::indicator::{
    compute_macd, macd, compute_moving_average, compute_rsi, IndicatorError, IndicatorType, MaKind,
};
use crate::domain::parameters::{ParamBound, ParameterSpace, ParameterVector};
use crate::domain::price_bar::{closes, PriceBar};

pub const DEFAULT_OVERSOLD: f64 = 30.0;
pub const DEFAULT_OVERBOUGHT: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Macd,
    Rsi,
    MaCrossover,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Macd => write!(f, "macd"),
            StrategyKind::Rsi => write!(f, "rsi"),
            StrategyKind::MaCrossover => write!(f, "ma_crossover"),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "macd" => Ok(StrategyKind::Macd),
            "rsi" => Ok(StrategyKind::Rsi),
            "ma_crossover" | "ma" | "sma_crossover" => Ok(StrategyKind::MaCrossover),
            other => Err(format!("unknown strategy '{other}'")),
        }
    }
}

impl StrategyKind {
    pub fn default_strategy(self) -> Strategy {
        match self {
            StrategyKind::Macd => Strategy::Macd {
                fast: macd::DEFAULT_FAST,
                slow: macd::DEFAULT_SLOW,
                signal: macd::DEFAULT_SIGNAL,
            },
            StrategyKind::Rsi => Strategy::Rsi {
                period: 14,
                oversold: DEFAULT_OVERSOLD,
                overbought: DEFAULT_OVERBOUGHT,
            },
            StrategyKind::MaCrossover => Strategy::MaCrossover {
                short: 50,
                long: 200,
                kind: MaKind::Simple,
            },
        }
    }

    /// Default optimizer search box for this strategy's tunable parameters.
    pub fn default_space(self) -> ParameterSpace {
        let dims = match self {
            StrategyKind::Macd => vec![
                ParamBound::new("fast", 8.0, 15.0),
                ParamBound::new("slow", 20.0, 30.0),
                ParamBound::new("signal", 5.0, 10.0),
            ],
            StrategyKind::Rsi => vec![
                ParamBound::new("period", 7.0, 21.0),
                ParamBound::new("oversold", 20.0, 35.0),
                ParamBound::new("overbought", 65.0, 80.0),
            ],
            StrategyKind::MaCrossover => vec![
                ParamBound::new("short", 10.0, 50.0),
                ParamBound::new("long", 60.0, 200.0),
            ],
        };
        ParameterSpace { dims }
    }
}

/// Entry/exit conditions at one bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signal {
    pub entry: bool,
    pub exit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Strategy {
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Rsi {
        period: usize,
        oversold: f64,
        overbought: f64,
    },
    MaCrossover {
        short: usize,
        long: usize,
        kind: MaKind,
    },
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            Strategy::Rsi {
                period,
                oversold,
                overbought,
            } => write!(f, "RSI({}, {}/{})", period, oversold, overbought),
            Strategy::MaCrossover { short, long, kind } => {
                let tag = match kind {
                    MaKind::Simple => "SMA",
                    MaKind::Exponential => "EMA",
                };
                write!(f, "{} crossover({},{})", tag, short, long)
            }
        }
    }
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::Macd { .. } => StrategyKind::Macd,
            Strategy::Rsi { .. } => StrategyKind::Rsi,
            Strategy::MaCrossover { .. } => StrategyKind::MaCrossover,
        }
    }

    pub fn validate(&self) -> Result<(), TrendsimError> {
        match *self {
            Strategy::Macd { fast, slow, signal } => {
                check_period("fast", fast)?;
                check_period("slow", slow)?;
                check_period("signal", signal)?;
                if fast >= slow {
                    return Err(TrendsimError::invalid_parameter(
                        "fast",
                        format!("fast period {fast} must be below slow period {slow}"),
                    ));
                }
            }
            Strategy::Rsi {
                period,
                oversold,
                overbought,
            } => {
                check_period("period", period)?;
                if oversold <= 0.0 || oversold >= 100.0 {
                    return Err(TrendsimError::invalid_parameter(
                        "oversold",
                        format!("{oversold} must lie in (0, 100)"),
                    ));
                }
                if overbought <= oversold || overbought >= 100.0 {
                    return Err(TrendsimError::invalid_parameter(
                        "overbought",
                        format!("{overbought} must lie in ({oversold}, 100)"),
                    ));
                }
            }
            Strategy::MaCrossover { short, long, .. } => {
                check_period("short", short)?;
                check_period("long", long)?;
                if short >= long {
                    return Err(TrendsimError::invalid_parameter(
                        "short",
                        format!("short period {short} must be below long period {long}"),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn indicators(&self) -> Vec<IndicatorType> {
        match *self {
            Strategy::Macd { fast, slow, signal } => {
                vec![IndicatorType::Macd { fast, slow, signal }]
            }
            Strategy::Rsi { period, .. } => vec![IndicatorType::Rsi(period)],
            Strategy::MaCrossover { short, long, kind } => match kind {
                MaKind::Simple => vec![IndicatorType::Sma(short), IndicatorType::Sma(long)],
                MaKind::Exponential => {
                    vec![IndicatorType::Ema(short), IndicatorType::Ema(long)]
                }
            },
        }
    }

    /// Bars needed before every indicator the strategy reads is defined.
    pub fn required_bars(&self) -> usize {
        self.indicators()
            .iter()
            .map(IndicatorType::required_bars)
            .max()
            .unwrap_or(0)
    }

    /// Compute the indicator columns this strategy reads.
    pub fn build_frame(
        &self,
        symbol: &str,
        bars: Vec<PriceBar>,
    ) -> Result<IndicatorFrame, IndicatorError> {
        let prices = closes(&bars);
        let mut frame = IndicatorFrame::new(symbol, bars);
        match *self {
            Strategy::Macd { fast, slow, signal } => {
                frame.macd = Some(compute_macd(&prices, fast, slow, signal)?);
            }
            Strategy::Rsi { period, .. } => {
                frame.rsi = Some(compute_rsi(&prices, period)?);
            }
            Strategy::MaCrossover { short, long, kind } => {
                frame.short_ma = Some(compute_moving_average(&prices, short, kind)?);
                frame.long_ma = Some(compute_moving_average(&prices, long, kind)?);
            }
        }
        Ok(frame)
    }

    /// Evaluate entry and exit conditions at bar `i` of `frame`.
    pub fn signal_at(&self, frame: &IndicatorFrame, i: usize) -> Signal {
        match *self {
            Strategy::Macd { .. } => {
                let Some(macd) = frame.macd.as_ref() else {
                    return Signal::default();
                };
                let values = (
                    macd.line.get(i).copied().flatten(),
                    macd.signal.get(i).copied().flatten(),
                    macd.histogram.get(i).copied().flatten(),
                );
                match values {
                    (Some(line), Some(signal), Some(hist)) => Signal {
                        entry: line > signal && hist > 0.0,
                        exit: line < signal,
                    },
                    _ => Signal::default(),
                }
            }
            Strategy::Rsi {
                oversold,
                overbought,
                ..
            } => match frame.rsi.as_ref().and_then(|r| r.get(i).copied().flatten()) {
                Some(rsi) => Signal {
                    entry: rsi < oversold,
                    exit: rsi > overbought,
                },
                None => Signal::default(),
            },
            Strategy::MaCrossover { .. } => {
                let (Some(short), Some(long)) = (frame.short_ma.as_ref(), frame.long_ma.as_ref())
                else {
                    return Signal::default();
                };
                match (pair_at(short, i), pair_at(long, i)) {
                    (Some((prev_s, cur_s)), Some((prev_l, cur_l))) => Signal {
                        entry: prev_s <= prev_l && cur_s > cur_l,
                        exit: prev_s >= prev_l && cur_s < cur_l,
                    },
                    _ => Signal::default(),
                }
            }
        }
    }

    /// The tunable parameters as a named vector.
    pub fn parameters(&self) -> ParameterVector {
        match *self {
            Strategy::Macd { fast, slow, signal } => ParameterVector::new()
                .with("fast", fast as f64)
                .with("slow", slow as f64)
                .with("signal", signal as f64),
            Strategy::Rsi {
                period,
                oversold,
                overbought,
            } => ParameterVector::new()
                .with("period", period as f64)
                .with("oversold", oversold)
                .with("overbought", overbought),
            Strategy::MaCrossover { short, long, .. } => ParameterVector::new()
                .with("short", short as f64)
                .with("long", long as f64),
        }
    }

    /// Copy of this strategy with any parameters present in `params` replaced.
    /// Periods are rounded to the nearest integer; thresholds are rounded too
    /// so every trial lands on the integer lattice.
    pub fn with_parameters(&self, params: &ParameterVector) -> Result<Strategy, TrendsimError> {
        let period = |name: &str, current: usize| -> Result<usize, TrendsimError> {
            params.period(name).unwrap_or(Ok(current))
        };
        let threshold = |name: &str, current: f64| params.get(name).map_or(current, f64::round);

        let updated = match *self {
            Strategy::Macd { fast, slow, signal } => Strategy::Macd {
                fast: period("fast", fast)?,
                slow: period("slow", slow)?,
                signal: period("signal", signal)?,
            },
            Strategy::Rsi {
                period: p,
                oversold,
                overbought,
            } => Strategy::Rsi {
                period: period("period", p)?,
                oversold: threshold("oversold", oversold),
                overbought: threshold("overbought", overbought),
            },
            Strategy::MaCrossover { short, long, kind } => Strategy::MaCrossover {
                short: period("short", short)?,
                long: period("long", long)?,
                kind,
            },
        };
        updated.validate()?;
        Ok(updated)
    }
}

fn check_period(name: &str, period: usize) -> Result<(), TrendsimError> {
    if period == 0 {
        return Err(TrendsimError::invalid_parameter(name, "period must be at least 1"));
    }
    Ok(())
}
