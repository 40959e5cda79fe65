//! Buy-and-hold benchmark over the backtest window.
//!
//! final = initial × (last close / first close). Fractional units, no trades.

use serde::Serialize;

use crate::domain::price_bar::PriceBar;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkResult {
    pub symbol: String,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub return_pct: f64,
}

/// `None` when there are no bars or the first close is not positive.
pub fn buy_and_hold(symbol: &str, bars: &[PriceBar], initial_balance: f64) -> Option<BenchmarkResult> {
    let first = bars.first()?.close;
    let last = bars.last()?.close;
    if first <= 0.0 {
        return None;
    }
    let final_balance = initial_balance * (last / first);
    Some(BenchmarkResult {
        symbol: symbol.to_string(),
        initial_balance,
        final_balance,
        return_pct: (last / first - 1.0) * 100.0,
    })
}
