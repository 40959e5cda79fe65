//! Price bar representation and bar timeframes.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Bar granularity requested from a market-data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Minute,
    Hour,
    Day,
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeframe::Minute => write!(f, "minute"),
            Timeframe::Hour => write!(f, "hour"),
            Timeframe::Day => write!(f, "day"),
        }
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "minute" | "1min" | "1m" => Ok(Timeframe::Minute),
            "hour" | "1h" => Ok(Timeframe::Hour),
            "day" | "1d" | "daily" => Ok(Timeframe::Day),
            other => Err(format!("unknown timeframe '{other}'")),
        }
    }
}

impl Timeframe {
    /// Bars per trading year, assuming 252 sessions of 6.5 hours.
    pub fn periods_per_year(&self) -> f64 {
        match self {
            Timeframe::Minute => 252.0 * 390.0,
            Timeframe::Hour => 252.0 * 6.5,
            Timeframe::Day => 252.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceBar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl PriceBar {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// Closing prices of a bar series, in order.
pub fn closes(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Index of the first bar that breaks strict ascending timestamp order, if any.
pub fn first_out_of_order(bars: &[PriceBar]) -> Option<usize> {
    bars.windows(2)
        .position(|w| w[1].timestamp <= w[0].timestamp)
        .map(|i| i + 1)
}
