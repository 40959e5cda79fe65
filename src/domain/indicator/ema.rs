//! Exponential Moving Average.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = C[i]*k + EMA[i-1]*(1-k),
//! evaluated as EMA[i-1] + k*(C[i] - EMA[i-1]) so a constant input stays exact.
//! Warmup: first (n-1) entries are undefined.

use crate::domain::indicator::{check_length, check_period, IndicatorError, IndicatorType};

pub fn compute_ema(closes: &[f64], period: usize) -> Result<Vec<Option<f64>>, IndicatorError> {
    check_period(IndicatorType::Ema(period), period)?;
    check_length(IndicatorType::Ema(period), closes.len())?;
    Ok(ema_values(closes, period))
}

/// EMA without length checks. Used by MACD for both the price EMAs and the
/// signal line.
pub(crate) fn ema_values(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = 0.0;
    let mut sum = 0.0;

    for (i, &value) in values.iter().enumerate() {
        if i + 1 < period {
            sum += value;
            out.push(None);
        } else if i + 1 == period {
            sum += value;
            ema = sum / period as f64;
            out.push(Some(ema));
        } else {
            ema += k * (value - ema);
            out.push(Some(ema));
        }
    }

    out
}
