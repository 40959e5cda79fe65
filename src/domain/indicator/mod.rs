//! Technical indicator implementations.
//!
//! Every indicator works on a slice of closing prices and returns a series of
//! the same length. Entries inside the warm-up window are `None`. An input
//! shorter than the indicator's required length is rejected with
//! [`IndicatorError::InsufficientData`] instead of producing an all-`None`
//! series.

pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use ema::compute_ema;
pub use macd::{compute_macd, MacdSeries};
pub use rsi::compute_rsi;
pub use sma::compute_sma;

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndicatorError {
    #[error("{indicator} needs {required} bars, have {bars}")]
    InsufficientData {
        indicator: IndicatorType,
        bars: usize,
        required: usize,
    },

    #[error("invalid period for {indicator}: {reason}")]
    InvalidPeriod {
        indicator: IndicatorType,
        reason: String,
    },
}

/// Moving-average flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MaKind {
    Simple,
    Exponential,
}

impl FromStr for MaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simple" | "sma" => Ok(MaKind::Simple),
            "exponential" | "ema" => Ok(MaKind::Exponential),
            other => Err(format!("unknown moving average kind '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
        }
    }
}

impl IndicatorType {
    /// Number of closes needed before the first defined value.
    pub fn required_bars(&self) -> usize {
        match *self {
            IndicatorType::Sma(period) | IndicatorType::Ema(period) => period,
            IndicatorType::Rsi(period) => period + 1,
            IndicatorType::Macd { slow, signal, .. } => slow + signal - 1,
        }
    }
}

pub fn compute_moving_average(
    closes: &[f64],
    period: usize,
    kind: MaKind,
) -> Result<Vec<Option<f64>>, IndicatorError> {
    match kind {
        MaKind::Simple => compute_sma(closes, period),
        MaKind::Exponential => compute_ema(closes, period),
    }
}

pub(crate) fn check_length(
    indicator: IndicatorType,
    bars: usize,
) -> Result<(), IndicatorError> {
    let required = indicator.required_bars();
    if bars < required {
        return Err(IndicatorError::InsufficientData {
            indicator,
            bars,
            required,
        });
    }
    Ok(())
}

pub(crate) fn check_period(indicator: IndicatorType, period: usize) -> Result<(), IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::InvalidPeriod {
            indicator,
            reason: "period must be at least 1".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indicator_type_display() {
        assert_eq!(IndicatorType::Sma(20).to_string(), "SMA(20)");
        let macd = IndicatorType::Macd {
            fast: 12,
            slow: 26,
            signal: 9,
        };
        assert_eq!(macd.to_string(), "MACD(12,26,9)");
    }

    #[test]
    fn required_bars_per_indicator() {
        assert_eq!(IndicatorType::Sma(5).required_bars(), 5);
        assert_eq!(IndicatorType::Rsi(14).required_bars(), 15);
        let macd = IndicatorType::Macd {
            fast: 12,
            slow: 26,
            signal: 9,
        };
        assert_eq!(macd.required_bars(), 34);
    }

    #[test]
    fn moving_average_dispatches_on_kind() {
        let closes = [10.0, 20.0, 10.0, 40.0];
        let sma = compute_moving_average(&closes, 2, MaKind::Simple).unwrap();
        let ema = compute_moving_average(&closes, 2, MaKind::Exponential).unwrap();
        assert_eq!(sma[3], Some(25.0));

        // k = 2/3, seeded with SMA(10, 20) = 15: 15 -> 35/3 -> 275/9
        assert_eq!(ema[0], None);
        assert_eq!(ema[1], Some(15.0));
        assert!((ema[2].unwrap() - 35.0 / 3.0).abs() < 1e-9);
        assert!((ema[3].unwrap() - 275.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn ma_kind_parse() {
        assert_eq!("EMA".parse::<MaKind>().unwrap(), MaKind::Exponential);
        assert_eq!("simple".parse::<MaKind>().unwrap(), MaKind::Simple);
        assert!("hull".parse::<MaKind>().is_err());
    }

    #[test]
    fn error_message_names_indicator() {
        let err = check_length(IndicatorType::Rsi(14), 3).unwrap_err();
        assert_eq!(err.to_string(), "RSI(14) needs 15 bars, have 3");
    }
}
