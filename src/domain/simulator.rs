//! Per-symbol trade simulation.
//!
//! A two-state machine (FLAT, LONG) stepped once per bar in timestamp order.
//! Entries need the strategy's entry signal, a regime that allows trading, and
//! a whole-unit quantity `floor(cash / price) > 0`. While LONG the high-water
//! mark is raised before exits are checked; when several exits coincide the
//! recorded reason follows regime > trailing stop > signal. A bar makes at
//! most one transition. Any open lot is closed at the final bar's close.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::domain::frame::IndicatorFrame;
use crate::domain::position::{Position, TradeAction, TradeEvent, TradeReason};
use crate::domain::price_bar::PriceBar;
use crate::domain::regime::{RegimeFilter, RegimeSnapshot};
use crate::domain::strategy::{Signal, Strategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimState {
    Flat,
    Long,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

/// Result of an entry attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
enum EntryResult {
    Entered,
    InsufficientCapital,
}

/// Everything one symbol's simulation produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolRun {
    pub symbol: String,
    pub allocated: f64,
    pub final_balance: f64,
    pub realized_pnl: f64,
    pub events: Vec<TradeEvent>,
    pub equity_curve: Vec<EquityPoint>,
}

#[derive(Debug, Clone)]
pub struct SymbolSimulator {
    symbol: String,
    allocated: f64,
    cash: f64,
    trailing_stop: f64,
    position: Option<Position>,
    realized_pnl: f64,
    events: Vec<TradeEvent>,
    equity_curve: Vec<EquityPoint>,
}

impl SymbolSimulator {
    /// `trailing_stop` is a fraction in `(0, 1)`; zero disables it.
    pub fn new(symbol: &str, allocated: f64, trailing_stop: f64) -> Self {
        SymbolSimulator {
            symbol: symbol.to_string(),
            allocated,
            cash: allocated,
            trailing_stop,
            position: None,
            realized_pnl: 0.0,
            events: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn state(&self) -> SimState {
        match self.position {
            Some(_) => SimState::Long,
            None => SimState::Flat,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    /// Open position valued at its entry price.
    pub fn cost_basis(&self) -> f64 {
        self.position.as_ref().map_or(0.0, Position::cost_basis)
    }

    pub fn equity(&self, price: f64) -> f64 {
        self.cash + self.position.as_ref().map_or(0.0, |p| p.market_value(price))
    }

    pub fn events(&self) -> &[TradeEvent] {
        &self.events
    }

    /// Process one bar. Returns the trade event it produced, if any.
    pub fn step(
        &mut self,
        bar: &PriceBar,
        signal: Signal,
        regime: &RegimeSnapshot,
    ) -> Option<TradeEvent> {
        let price = bar.close;
        let event = if let Some(position) = self.position.as_mut() {
            position.observe(price);
            let reason = if regime.reason.forces_exit() {
                Some(TradeReason::RegimeExit)
            } else if position.trailing_stop_hit(price, self.trailing_stop) {
                Some(TradeReason::TrailingStop)
            } else if signal.exit {
                Some(TradeReason::SignalExit)
            } else {
                None
            };
            reason.and_then(|reason| self.exit(price, bar.timestamp, reason))
        } else if signal.entry && regime.can_trade {
            match self.enter(price, bar.timestamp) {
                EntryResult::Entered => self.events.last().cloned(),
                EntryResult::InsufficientCapital => None,
            }
        } else {
            None
        };

        self.equity_curve.push(EquityPoint {
            timestamp: bar.timestamp,
            equity: self.equity(price),
        });
        event
    }

    fn enter(&mut self, price: f64, timestamp: NaiveDateTime) -> EntryResult {
        if !(price.is_finite() && price > 0.0) {
            return EntryResult::InsufficientCapital;
        }
        let mut quantity = (self.cash / price).floor() as u64;
        if quantity > 0 && quantity as f64 * price > self.cash {
            quantity -= 1;
        }
        if quantity == 0 {
            return EntryResult::InsufficientCapital;
        }

        let cost = quantity as f64 * price;
        self.cash -= cost;
        self.position = Some(Position::open(&self.symbol, quantity, price, timestamp));

        let event = TradeEvent {
            symbol: self.symbol.clone(),
            action: TradeAction::Buy,
            price,
            quantity,
            timestamp,
            reason: TradeReason::EntrySignal,
        };
        tracing::debug!(
            symbol = %self.symbol,
            quantity,
            price,
            %timestamp,
            "buy"
        );
        self.events.push(event);

        EntryResult::Entered
    }

    fn exit(
        &mut self,
        price: f64,
        timestamp: NaiveDateTime,
        reason: TradeReason,
    ) -> Option<TradeEvent> {
        let position = self.position.take()?;
        self.cash += position.market_value(price);
        self.realized_pnl += position.unrealized_pnl(price);

        let event = TradeEvent {
            symbol: self.symbol.clone(),
            action: TradeAction::Sell,
            price,
            quantity: position.quantity,
            timestamp,
            reason,
        };
        tracing::debug!(
            symbol = %self.symbol,
            quantity = event.quantity,
            price,
            %timestamp,
            %reason,
            "sell"
        );
        self.events.push(event.clone());
        Some(event)
    }

    /// Close any open lot at `last_bar`'s close and return the results.
    pub fn finish(mut self, last_bar: Option<&PriceBar>) -> SymbolRun {
        if let Some(bar) = last_bar {
            if self
                .exit(bar.close, bar.timestamp, TradeReason::EndOfBacktest)
                .is_some()
            {
                if let Some(point) = self.equity_curve.last_mut() {
                    if point.timestamp == bar.timestamp {
                        point.equity = self.cash;
                    }
                }
            }
        }
        let final_balance = self.cash + self.cost_basis();
        SymbolRun {
            symbol: self.symbol,
            allocated: self.allocated,
            final_balance,
            realized_pnl: self.realized_pnl,
            events: self.events,
            equity_curve: self.equity_curve,
        }
    }
}

/// Run `strategy` over every bar of `frame`. Entries are suppressed on the
/// final bar since it always closes the window.
pub fn simulate(
    strategy: &Strategy,
    frame: &IndicatorFrame,
    regime: &RegimeFilter,
    allocated: f64,
    trailing_stop: f64,
) -> SymbolRun {
    let mut sim = SymbolSimulator::new(&frame.symbol, allocated, trailing_stop);
    let last = frame.bars.len().saturating_sub(1);

    for (i, bar) in frame.bars.iter().enumerate() {
        let mut signal = strategy.signal_at(frame, i);
        if i == last {
            signal.entry = false;
        }
        let snapshot = regime.evaluate(bar.date());
        sim.step(bar, signal, &snapshot);
    }

    sim.finish(frame.bars.last())
}
