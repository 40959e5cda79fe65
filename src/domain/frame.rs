//! Per-symbol price bars with aligned indicator columns.

use crate::domain::indicator::MacdSeries;
use crate::domain::price_bar::PriceBar;

/// Indicator columns share the bars' indexing; warm-up entries are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorFrame {
    pub symbol: String,
    pub bars: Vec<PriceBar>,
    pub macd: Option<MacdSeries>,
    pub rsi: Option<Vec<Option<f64>>>,
    pub short_ma: Option<Vec<Option<f64>>>,
    pub long_ma: Option<Vec<Option<f64>>>,
}

impl IndicatorFrame {
    pub fn new(symbol: &str, bars: Vec<PriceBar>) -> Self {
        IndicatorFrame {
            symbol: symbol.to_string(),
            bars,
            ..Default::default()
        }
    }
}

/// Read column `i` and `i - 1` together, for crossover checks.
pub(crate) fn pair_at(column: &[Option<f64>], i: usize) -> Option<(f64, f64)> {
    if i == 0 {
        return None;
    }
    match (column.get(i - 1).copied().flatten(), column.get(i).copied().flatten()) {
        (Some(prev), Some(cur)) => Some((prev, cur)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_at_requires_both_values() {
        let column = vec![None, Some(1.0), Some(2.0)];
        assert_eq!(pair_at(&column, 0), None);
        assert_eq!(pair_at(&column, 1), None);
        assert_eq!(pair_at(&column, 2), Some((1.0, 2.0)));
        assert_eq!(pair_at(&column, 3), None);
    }

    #[test]
    fn new_frame_has_no_columns() {
        let frame = IndicatorFrame::new("SPY", Vec::new());
        assert_eq!(frame.symbol, "SPY");
        assert!(frame.macd.is_none() && frame.rsi.is_none());
    }
}
