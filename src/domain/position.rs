//! Open positions, trade events, and round trips.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;

/// A single open long lot. Exists only while `quantity > 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub quantity: u64,
    pub entry_price: f64,
    pub entry_time: NaiveDateTime,
    pub highest_price_since_entry: f64,
}

impl Position {
    pub fn open(symbol: &str, quantity: u64, price: f64, time: NaiveDateTime) -> Self {
        Position {
            symbol: symbol.to_string(),
            quantity,
            entry_price: price,
            entry_time: time,
            highest_price_since_entry: price,
        }
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity as f64 * price
    }

    pub fn cost_basis(&self) -> f64 {
        self.quantity as f64 * self.entry_price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity as f64 * (price - self.entry_price)
    }

    /// Raise the high-water mark; it never decreases while the lot is open.
    pub fn observe(&mut self, price: f64) {
        if price > self.highest_price_since_entry {
            self.highest_price_since_entry = price;
        }
    }

    /// `fraction == 0` disables the stop.
    pub fn trailing_stop_hit(&self, price: f64, fraction: f64) -> bool {
        if fraction <= 0.0 {
            return false;
        }
        price <= self.highest_price_since_entry * (1.0 - fraction)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "buy"),
            TradeAction::Sell => write!(f, "sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeReason {
    EntrySignal,
    RegimeExit,
    TrailingStop,
    SignalExit,
    EndOfBacktest,
}

impl TradeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeReason::EntrySignal => "entry_signal",
            TradeReason::RegimeExit => "regime_exit",
            TradeReason::TrailingStop => "trailing_stop",
            TradeReason::SignalExit => "signal_exit",
            TradeReason::EndOfBacktest => "end_of_backtest",
        }
    }
}

impl fmt::Display for TradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeEvent {
    pub symbol: String,
    pub action: TradeAction,
    pub price: f64,
    pub quantity: u64,
    pub timestamp: NaiveDateTime,
    pub reason: TradeReason,
}

impl TradeEvent {
    pub fn value(&self) -> f64 {
        self.quantity as f64 * self.price
    }
}

/// A buy paired with the sell that closed it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundTrip {
    pub symbol: String,
    pub quantity: u64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub pnl: f64,
    pub exit_reason: TradeReason,
}

impl RoundTrip {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }
}

/// Pair consecutive buy/sell events of one symbol's history. A trailing
/// unmatched buy is ignored.
pub fn pair_round_trips(events: &[TradeEvent]) -> Vec<RoundTrip> {
    let mut trips = Vec::new();
    let mut open: Option<&TradeEvent> = None;

    for event in events {
        match event.action {
            TradeAction::Buy => open = Some(event),
            TradeAction::Sell => {
                if let Some(buy) = open.take() {
                    trips.push(RoundTrip {
                        symbol: event.symbol.clone(),
                        quantity: event.quantity,
                        entry_price: buy.price,
                        exit_price: event.price,
                        entry_time: buy.timestamp,
                        exit_time: event.timestamp,
                        pnl: event.quantity as f64 * (event.price - buy.price),
                        exit_reason: event.reason,
                    });
                }
            }
        }
    }

    trips
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn sample_position() -> Position {
        Position::open("AAPL", 100, 50.0, ts(15))
    }

    fn event(action: TradeAction, price: f64, day: u32, reason: TradeReason) -> TradeEvent {
        TradeEvent {
            symbol: "AAPL".into(),
            action,
            price,
            quantity: 10,
            timestamp: ts(day),
            reason,
        }
    }

    #[test]
    fn open_sets_high_water_mark_to_entry() {
        let pos = sample_position();
        assert!((pos.highest_price_since_entry - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn market_value_and_cost_basis() {
        let pos = sample_position();
        assert!((pos.market_value(55.0) - 5500.0).abs() < f64::EPSILON);
        assert!((pos.cost_basis() - 5000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unrealized_pnl_profit_and_loss() {
        let pos = sample_position();
        assert!((pos.unrealized_pnl(55.0) - 500.0).abs() < f64::EPSILON);
        assert!((pos.unrealized_pnl(45.0) + 500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn high_water_mark_is_monotonic() {
        let mut pos = sample_position();
        pos.observe(60.0);
        pos.observe(55.0);
        assert!((pos.highest_price_since_entry - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn trailing_stop_threshold() {
        let mut pos = sample_position();
        pos.observe(100.0);
        assert!(!pos.trailing_stop_hit(90.01, 0.1));
        assert!(pos.trailing_stop_hit(90.0, 0.1));
        assert!(pos.trailing_stop_hit(80.0, 0.1));
    }

    #[test]
    fn trailing_stop_disabled() {
        let pos = sample_position();
        assert!(!pos.trailing_stop_hit(0.0, 0.0));
    }

    #[test]
    fn reason_codes() {
        assert_eq!(TradeReason::RegimeExit.to_string(), "regime_exit");
        assert_eq!(TradeReason::EndOfBacktest.as_str(), "end_of_backtest");
        let json = serde_json::to_string(&TradeReason::TrailingStop).unwrap();
        assert_eq!(json, "\"trailing_stop\"");
    }

    #[test]
    fn pairs_buys_with_sells() {
        let events = vec![
            event(TradeAction::Buy, 10.0, 2, TradeReason::EntrySignal),
            event(TradeAction::Sell, 12.0, 5, TradeReason::SignalExit),
            event(TradeAction::Buy, 11.0, 8, TradeReason::EntrySignal),
            event(TradeAction::Sell, 9.0, 9, TradeReason::TrailingStop),
            event(TradeAction::Buy, 9.5, 10, TradeReason::EntrySignal),
        ];
        let trips = pair_round_trips(&events);

        assert_eq!(trips.len(), 2);
        assert!((trips[0].pnl - 20.0).abs() < f64::EPSILON);
        assert!(trips[0].is_win());
        assert!((trips[1].pnl + 20.0).abs() < f64::EPSILON);
        assert_eq!(trips[1].exit_reason, TradeReason::TrailingStop);
        assert_eq!(trips[1].entry_time, ts(8));
    }
}
