#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use std::cell::Cell;
use std::collections::HashMap;
use trendsim::domain::cancel::CancellationToken;
use trendsim::domain::error::TrendsimError;
pub use trendsim::domain::price_bar::{PriceBar, Timeframe};
use trendsim::ports::data_port::MarketDataPort;

/// In-memory market data. Unknown symbols are `SymbolNotFound`, like the CSV
/// adapter; bars are filtered to the requested window.
pub struct MockDataPort {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
    pub calls: Cell<usize>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            calls: Cell::new(0),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl MarketDataPort for MockDataPort {
    fn get_bars(
        &self,
        symbol: &str,
        _timeframe: Timeframe,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, TrendsimError> {
        self.calls.set(self.calls.get() + 1);
        if let Some(reason) = self.errors.get(symbol) {
            return Err(TrendsimError::DataUnavailable {
                symbol: symbol.to_string(),
                start,
                end,
                reason: reason.clone(),
            });
        }
        let bars = self
            .data
            .get(symbol)
            .ok_or_else(|| TrendsimError::SymbolNotFound {
                symbol: symbol.to_string(),
                start,
                end,
            })?;
        Ok(bars
            .iter()
            .filter(|b| b.date() >= start && b.date() <= end)
            .cloned()
            .collect())
    }

    fn list_symbols(&self) -> Result<Vec<String>, TrendsimError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

/// Wraps a port and cancels `token` once `after` fetches have been served.
pub struct CancellingPort<'a> {
    pub inner: &'a MockDataPort,
    pub token: CancellationToken,
    pub after: usize,
    pub served: Cell<usize>,
}

impl MarketDataPort for CancellingPort<'_> {
    fn get_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, TrendsimError> {
        self.served.set(self.served.get() + 1);
        if self.served.get() >= self.after {
            self.token.cancel();
        }
        self.inner.get_bars(symbol, timeframe, start, end)
    }

    fn list_symbols(&self) -> Result<Vec<String>, TrendsimError> {
        self.inner.list_symbols()
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(day: NaiveDate, close: f64) -> PriceBar {
    PriceBar {
        timestamp: day.and_hms_opt(0, 0, 0).unwrap(),
        open: close,
        high: close,
        low: close,
        close,
        volume: 1000,
    }
}

/// One bar per calendar day starting at `start`.
pub fn bars_from_closes(start: NaiveDate, closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| make_bar(start + Duration::days(i as i64), close))
        .collect()
}

/// A smooth oscillating series with an upward drift; enough swings to
/// produce MACD and RSI signals.
pub fn wave_closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let t = i as f64;
            100.0 + 0.15 * t + 8.0 * (t / 6.0).sin() + 3.0 * (t / 2.5).cos()
        })
        .collect()
}

/// Flat at 10, climbs to 15, then a single 15% drop that holds.
pub fn crash_closes() -> Vec<f64> {
    vec![
        10.0, 10.0, 10.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 12.75, 12.75, 12.75, 12.75,
    ]
}
