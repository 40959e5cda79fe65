//! Performance metrics over a portfolio equity curve and its round trips.
//!
//! Returns are per bar; Sharpe and Sortino are annualized with the
//! timeframe's bars-per-year. Drawdown duration is counted in bars.

use serde::Serialize;

use crate::domain::position::RoundTrip;
use crate::domain::simulator::EquityPoint;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: usize,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_trade_duration_days: f64,
}

impl Metrics {
    pub fn compute(
        equity_curve: &[EquityPoint],
        trips: &[RoundTrip],
        initial_balance: f64,
        periods_per_year: f64,
    ) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_balance);

        let total_return = if initial_balance > 0.0 {
            (final_equity - initial_balance) / initial_balance
        } else {
            0.0
        };

        let years = equity_curve.len() as f64 / periods_per_year;
        let annualized_return = if years > 0.0 && total_return > -1.0 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(equity_curve, periods_per_year);

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_duration_days = 0i64;

        for trip in trips {
            let pnl = trip.pnl;
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if pnl < 0.0 {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }
            total_duration_days += (trip.exit_time - trip.entry_time).num_days();
        }

        let total_trades = trips.len();
        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if trades_won > 0 {
            total_wins / trades_won as f64
        } else {
            0.0
        };

        let avg_loss = if trades_lost > 0 {
            total_losses / trades_lost as f64
        } else {
            0.0
        };

        let avg_trade_duration_days = if total_trades > 0 {
            total_duration_days as f64 / total_trades as f64
        } else {
            0.0
        };

        Metrics {
            total_return,
            annualized_return,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            total_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate,
            profit_factor,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            avg_trade_duration_days,
        }
    }
}

fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut max_duration = 0usize;
    let mut duration = 0usize;

    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
            duration = 0;
        } else if peak > 0.0 && point.equity < peak {
            max_dd = max_dd.max((peak - point.equity) / peak);
            duration += 1;
            max_duration = max_duration.max(duration);
        }
    }

    (max_dd, max_duration)
}

fn compute_risk_adjusted(equity_curve: &[EquityPoint], periods_per_year: f64) -> (f64, f64) {
    if equity_curve.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            if prev > 0.0 {
                (w[1].equity - prev) / prev
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    let scale = periods_per_year.sqrt();

    let sharpe = if stddev > 0.0 {
        mean / stddev * scale
    } else {
        0.0
    };

    let downside = returns
        .iter()
        .filter(|&&r| r < 0.0)
        .map(|r| r.powi(2))
        .sum::<f64>()
        / n;
    let downside_stddev = downside.sqrt();

    let sortino = if downside_stddev > 0.0 {
        mean / downside_stddev * scale
    } else {
        0.0
    };

    (sharpe, sortino)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::TradeReason;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(days: i64) -> NaiveDateTime {
        (NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(days))
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn make_equity_curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &equity)| EquityPoint {
                timestamp: ts(i as i64),
                equity,
            })
            .collect()
    }

    fn make_trip(pnl: f64, days: i64) -> RoundTrip {
        RoundTrip {
            symbol: "AAPL".into(),
            quantity: 100,
            entry_price: 100.0,
            exit_price: 100.0 + pnl / 100.0,
            entry_time: ts(0),
            exit_time: ts(days),
            pnl,
            exit_reason: TradeReason::SignalExit,
        }
    }

    #[test]
    fn metrics_empty() {
        let metrics = Metrics::compute(&[], &[], 100_000.0, 252.0);
        assert!((metrics.total_return - 0.0).abs() < f64::EPSILON);
        assert_eq!(metrics.total_trades, 0);
        assert!((metrics.profit_factor - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn metrics_total_return() {
        let up = Metrics::compute(&make_equity_curve(&[100_000.0, 110_000.0]), &[], 100_000.0, 252.0);
        assert!((up.total_return - 0.10).abs() < 1e-9);

        let down = Metrics::compute(&make_equity_curve(&[100_000.0, 90_000.0]), &[], 100_000.0, 252.0);
        assert!((down.total_return + 0.10).abs() < 1e-9);
    }

    #[test]
    fn metrics_flat_year_has_zero_annualized_return() {
        let curve = make_equity_curve(&[100_000.0; 252]);
        let metrics = Metrics::compute(&curve, &[], 100_000.0, 252.0);
        assert!(metrics.annualized_return.abs() < 1e-9);
        assert!((metrics.sharpe_ratio - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn metrics_trade_stats() {
        let trips = vec![
            make_trip(100.0, 5),
            make_trip(-50.0, 10),
            make_trip(200.0, 15),
            make_trip(0.0, 2),
        ];
        let metrics = Metrics::compute(&[], &trips, 100_000.0, 252.0);

        assert_eq!(metrics.trades_won, 2);
        assert_eq!(metrics.trades_lost, 1);
        assert_eq!(metrics.trades_breakeven, 1);
        assert!((metrics.win_rate - 0.5).abs() < f64::EPSILON);
        assert!((metrics.profit_factor - 6.0).abs() < 1e-9);
        assert!((metrics.avg_win - 150.0).abs() < 1e-9);
        assert!((metrics.largest_loss - 50.0).abs() < 1e-9);
        assert!((metrics.avg_trade_duration_days - 8.0).abs() < 1e-9);
    }

    #[test]
    fn profit_factor_without_losses_is_infinite() {
        let metrics = Metrics::compute(&[], &[make_trip(10.0, 1)], 1000.0, 252.0);
        assert!(metrics.profit_factor.is_infinite());
    }

    #[test]
    fn metrics_max_drawdown() {
        let curve = make_equity_curve(&[100.0, 110.0, 90.0, 95.0, 80.0, 100.0]);
        let (dd, duration) = compute_drawdown(&curve);
        assert!((dd - (110.0 - 80.0) / 110.0).abs() < 1e-9);
        assert_eq!(duration, 4);
    }

    #[test]
    fn metrics_sharpe_positive_for_steady_gains() {
        let values: Vec<f64> = (0..253).map(|i| 100_000.0 * (1.0 + 0.001 * i as f64)).collect();
        let metrics = Metrics::compute(&make_equity_curve(&values), &[], 100_000.0, 252.0);
        assert!(metrics.sharpe_ratio > 0.0);
    }

    #[test]
    fn sortino_is_finite() {
        let curve = make_equity_curve(&[100.0, 101.0, 100.5, 101.5, 100.0, 102.0]);
        let (sharpe, sortino) = compute_risk_adjusted(&curve, 252.0);
        assert!(sharpe.is_finite());
        assert!(sortino.is_finite());
        assert!(sortino > 0.0);
    }
}
