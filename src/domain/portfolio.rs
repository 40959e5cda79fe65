//! Portfolio capital accounting across symbols.
//!
//! The initial balance is split evenly across every requested symbol once, at
//! the start of a run. Allocations are never rebalanced; a skipped symbol's
//! share stays idle as cash.
//!
//! Final balance = initial + Σ(symbol final − symbol allocation)

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::domain::position::{pair_round_trips, RoundTrip, TradeEvent};
use crate::domain::simulator::{EquityPoint, SymbolRun};
use crate::domain::universe::SkippedSymbol;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolSummary {
    pub symbol: String,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub pnl: f64,
    pub return_pct: f64,
    pub trade_count: usize,
    pub round_trips_won: usize,
    pub round_trips_lost: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub initial_balance: f64,
    pub final_balance: f64,
    pub total_return_pct: f64,
    pub symbols_traded: usize,
    pub symbols_skipped: usize,
    pub total_trade_events: usize,
}

/// One symbol's trade events, in chronological order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolTrades {
    pub symbol: String,
    pub events: Vec<TradeEvent>,
}

#[derive(Debug, Clone)]
pub struct PortfolioAccountant {
    initial_balance: f64,
    allocation: f64,
    runs: Vec<SymbolRun>,
    skipped: Vec<SkippedSymbol>,
}

impl PortfolioAccountant {
    /// `symbol_count` of zero allocates nothing.
    pub fn new(initial_balance: f64, symbol_count: usize) -> Self {
        let allocation = if symbol_count > 0 {
            initial_balance / symbol_count as f64
        } else {
            0.0
        };
        PortfolioAccountant {
            initial_balance,
            allocation,
            runs: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    pub fn allocation(&self) -> f64 {
        self.allocation
    }

    pub fn record(&mut self, run: SymbolRun) {
        self.runs.push(run);
    }

    pub fn skip(&mut self, skipped: SkippedSymbol) {
        self.skipped.push(skipped);
    }

    pub fn runs(&self) -> &[SymbolRun] {
        &self.runs
    }

    pub fn skipped(&self) -> &[SkippedSymbol] {
        &self.skipped
    }

    pub fn final_balance(&self) -> f64 {
        self.initial_balance
            + self
                .runs
                .iter()
                .map(|r| r.final_balance - r.allocated)
                .sum::<f64>()
    }

    pub fn total_return_pct(&self) -> f64 {
        if self.initial_balance > 0.0 {
            (self.final_balance() - self.initial_balance) / self.initial_balance * 100.0
        } else {
            0.0
        }
    }

    pub fn symbol_summaries(&self) -> Vec<SymbolSummary> {
        self.runs
            .iter()
            .map(|run| {
                let trips = pair_round_trips(&run.events);
                let pnl = run.final_balance - run.allocated;
                SymbolSummary {
                    symbol: run.symbol.clone(),
                    initial_balance: run.allocated,
                    final_balance: run.final_balance,
                    pnl,
                    return_pct: if run.allocated > 0.0 {
                        pnl / run.allocated * 100.0
                    } else {
                        0.0
                    },
                    trade_count: run.events.len(),
                    round_trips_won: trips.iter().filter(|t| t.is_win()).count(),
                    round_trips_lost: trips.iter().filter(|t| t.pnl < 0.0).count(),
                }
            })
            .collect()
    }

    pub fn summary(&self) -> PortfolioSummary {
        PortfolioSummary {
            initial_balance: self.initial_balance,
            final_balance: self.final_balance(),
            total_return_pct: self.total_return_pct(),
            symbols_traded: self.runs.len(),
            symbols_skipped: self.skipped.len(),
            total_trade_events: self.runs.iter().map(|r| r.events.len()).sum(),
        }
    }

    /// Trade history grouped per symbol, in run order.
    pub fn trade_history(&self) -> Vec<SymbolTrades> {
        self.runs
            .iter()
            .map(|run| SymbolTrades {
                symbol: run.symbol.clone(),
                events: run.events.clone(),
            })
            .collect()
    }

    pub fn round_trips(&self) -> Vec<RoundTrip> {
        self.runs
            .iter()
            .flat_map(|run| pair_round_trips(&run.events))
            .collect()
    }

    /// Portfolio equity on the union of all symbols' timestamps. Each symbol
    /// contributes its last known equity, or its allocation before its first
    /// bar.
    pub fn equity_curve(&self) -> Vec<EquityPoint> {
        let mut timeline: Vec<NaiveDateTime> = self
            .runs
            .iter()
            .flat_map(|r| r.equity_curve.iter().map(|p| p.timestamp))
            .collect();
        timeline.sort_unstable();
        timeline.dedup();

        let mut cursors = vec![0usize; self.runs.len()];
        let mut last: Vec<f64> = self.runs.iter().map(|r| r.allocated).collect();

        timeline
            .into_iter()
            .map(|timestamp| {
                for (k, run) in self.runs.iter().enumerate() {
                    let curve = &run.equity_curve;
                    while cursors[k] < curve.len() && curve[cursors[k]].timestamp <= timestamp {
                        last[k] = curve[cursors[k]].equity;
                        cursors[k] += 1;
                    }
                }
                let delta: f64 = self
                    .runs
                    .iter()
                    .zip(&last)
                    .map(|(run, equity)| equity - run.allocated)
                    .sum();
                EquityPoint {
                    timestamp,
                    equity: self.initial_balance + delta,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::{TradeAction, TradeReason};
    use crate::domain::universe::SkipReason;
    use chrono::NaiveDate;

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn event(symbol: &str, action: TradeAction, price: f64, day: u32) -> TradeEvent {
        TradeEvent {
            symbol: symbol.into(),
            action,
            price,
            quantity: 10,
            timestamp: ts(day),
            reason: match action {
                TradeAction::Buy => TradeReason::EntrySignal,
                TradeAction::Sell => TradeReason::SignalExit,
            },
        }
    }

    fn make_run(symbol: &str, allocated: f64, curve: &[(u32, f64)], events: Vec<TradeEvent>) -> SymbolRun {
        SymbolRun {
            symbol: symbol.into(),
            allocated,
            final_balance: curve.last().map_or(allocated, |p| p.1),
            realized_pnl: 0.0,
            events,
            equity_curve: curve
                .iter()
                .map(|&(day, equity)| EquityPoint {
                    timestamp: ts(day),
                    equity,
                })
                .collect(),
        }
    }

    #[test]
    fn allocation_is_even_split() {
        let accountant = PortfolioAccountant::new(9000.0, 3);
        assert!((accountant.allocation() - 3000.0).abs() < f64::EPSILON);
        assert!((PortfolioAccountant::new(100.0, 0).allocation()).abs() < f64::EPSILON);
    }

    #[test]
    fn final_balance_sums_symbol_pnl() {
        let mut accountant = PortfolioAccountant::new(10_000.0, 2);
        accountant.record(make_run("AAA", 5000.0, &[(1, 5000.0), (2, 6000.0)], vec![]));
        accountant.record(make_run("BBB", 5000.0, &[(1, 5000.0), (2, 4500.0)], vec![]));

        assert!((accountant.final_balance() - 10_500.0).abs() < f64::EPSILON);
        assert!((accountant.total_return_pct() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn skipped_symbol_keeps_allocation_idle() {
        let mut accountant = PortfolioAccountant::new(10_000.0, 2);
        accountant.record(make_run("AAA", 5000.0, &[(1, 5000.0), (2, 5500.0)], vec![]));
        accountant.skip(SkippedSymbol {
            symbol: "ZZZ".into(),
            reason: SkipReason::NotFound,
        });

        let summary = accountant.summary();
        assert!((summary.final_balance - 10_500.0).abs() < f64::EPSILON);
        assert_eq!(summary.symbols_traded, 1);
        assert_eq!(summary.symbols_skipped, 1);
    }

    #[test]
    fn trade_history_is_grouped_per_symbol() {
        let mut accountant = PortfolioAccountant::new(2000.0, 2);
        accountant.record(make_run(
            "AAA",
            1000.0,
            &[(3, 1000.0)],
            vec![
                event("AAA", TradeAction::Buy, 10.0, 2),
                event("AAA", TradeAction::Sell, 12.0, 9),
            ],
        ));
        accountant.record(make_run(
            "BBB",
            1000.0,
            &[(3, 1000.0)],
            vec![
                event("BBB", TradeAction::Buy, 5.0, 1),
                event("BBB", TradeAction::Sell, 4.0, 3),
            ],
        ));

        let history = accountant.trade_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].symbol, "AAA");
        assert!(history[0].events.iter().all(|e| e.symbol == "AAA"));
        assert_eq!(history[1].events[0].timestamp, ts(1));

        let summaries = accountant.symbol_summaries();
        assert_eq!(summaries[0].round_trips_won, 1);
        assert_eq!(summaries[1].round_trips_lost, 1);
        assert_eq!(accountant.round_trips().len(), 2);
    }

    #[test]
    fn equity_curve_carries_last_value_forward() {
        let mut accountant = PortfolioAccountant::new(2000.0, 2);
        accountant.record(make_run("AAA", 1000.0, &[(1, 1000.0), (3, 1100.0)], vec![]));
        accountant.record(make_run("BBB", 1000.0, &[(2, 900.0), (3, 950.0)], vec![]));

        let curve = accountant.equity_curve();
        let values: Vec<f64> = curve.iter().map(|p| p.equity).collect();
        assert_eq!(values, vec![2000.0, 1900.0, 2050.0]);
        assert_eq!(curve[2].timestamp, ts(3));
    }
}
