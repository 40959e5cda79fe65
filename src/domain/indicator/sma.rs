//! Simple Moving Average.
//!
//! SMA[i] = mean(C[i-n+1..=i]); first (n-1) entries are undefined.

use crate::domain::indicator::{check_length, check_period, IndicatorError, IndicatorType};

pub fn compute_sma(closes: &[f64], period: usize) -> Result<Vec<Option<f64>>, IndicatorError> {
    check_period(IndicatorType::Sma(period), period)?;
    check_length(IndicatorType::Sma(period), closes.len())?;
    Ok(sma_values(closes, period))
}

/// Rolling mean without length checks; entries before `period - 1` are `None`.
pub(crate) fn sma_values(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut values = Vec::with_capacity(closes.len());
    let mut sum = 0.0;
    for (i, &close) in closes.iter().enumerate() {
        sum += close;
        if i >= period {
            sum -= closes[i - period];
        }
        if i + 1 >= period {
            values.push(Some(sum / period as f64));
        } else {
            values.push(None);
        }
    }
    values
}
