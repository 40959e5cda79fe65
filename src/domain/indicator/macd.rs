//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//! Histogram = MACD Line - Signal Line
//!
//! Default parameters: fast=12, slow=26, signal=9
//! The line is defined from index slow-1; signal and histogram from
//! slow-1 + signal-1. At least slow + signal - 1 closes are required.

use crate::domain::indicator::ema::ema_values;
use crate::domain::indicator::{check_length, IndicatorError, IndicatorType};

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub line: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

pub fn compute_macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Result<MacdSeries, IndicatorError> {
    let indicator = IndicatorType::Macd {
        fast,
        slow,
        signal: signal_period,
    };
    if fast == 0 || slow == 0 || signal_period == 0 {
        return Err(IndicatorError::InvalidPeriod {
            indicator,
            reason: "periods must be at least 1".into(),
        });
    }
    if fast >= slow {
        return Err(IndicatorError::InvalidPeriod {
            indicator,
            reason: format!("fast period {fast} must be below slow period {slow}"),
        });
    }
    check_length(indicator, closes.len())?;

    let ema_fast = ema_values(closes, fast);
    let ema_slow = ema_values(closes, slow);

    let line: Vec<Option<f64>> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    // Signal EMA runs over the defined part of the line only.
    let line_start = slow - 1;
    let defined: Vec<f64> = line[line_start..].iter().flatten().copied().collect();
    let mut signal = vec![None; line_start];
    signal.extend(ema_values(&defined, signal_period));

    let histogram = line
        .iter()
        .zip(&signal)
        .map(|(l, s)| match (l, s) {
            (Some(l), Some(s)) => Some(l - s),
            _ => None,
        })
        .collect();

    Ok(MacdSeries {
        line,
        signal,
        histogram,
    })
}
