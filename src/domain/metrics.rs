//! Aggregate statistics over a run's trade log.

use std::collections::BTreeMap;

use serde::Serialize;

use super::position::TradeLog;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const CALENDAR_DAYS_PER_YEAR: f64 = 365.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InstrumentStats {
    pub count: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub total_premium: f64,
    pub total_pnl: f64,
    pub avg_return_on_premium: f64,
}

/// Percentages are expressed in percent (55.0 means 55%).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub initial_capital: f64,
    pub final_capital: f64,
    pub total_pnl: f64,
    pub avg_pnl: f64,
    pub total_return_pct: f64,
    pub total_payout: f64,
    pub total_premium: f64,
    pub avg_premium: f64,
    pub max_premium: f64,
    pub avg_nominal_exposure: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub avg_win_return_on_premium: f64,
    pub avg_loss_return_on_premium: f64,
    pub trading_days: i64,
    pub trades_per_day: f64,
    pub simple_apr: f64,
    pub premium_efficient_apr: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
    pub instrument_stats: BTreeMap<String, InstrumentStats>,
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n > 0 { sum / n as f64 } else { 0.0 }
}

impl Statistics {
    pub fn compute(trades: &[TradeLog], initial_capital: f64) -> Self {
        let total_trades = trades.len();
        let wins = trades.iter().filter(|t| t.win).count();
        let total_pnl: f64 = trades.iter().map(|t| t.net_pnl).sum();
        let total_premium: f64 = trades.iter().map(|t| t.premium_paid).sum();
        let final_capital = initial_capital + total_pnl;

        let trading_days = trading_days(trades);
        let total_return_pct = if initial_capital > 0.0 {
            total_pnl / initial_capital * 100.0
        } else {
            0.0
        };
        let premium_return_pct = if total_premium > 0.0 {
            total_pnl / total_premium * 100.0
        } else {
            0.0
        };
        let days = trading_days as f64;

        Statistics {
            total_trades,
            wins,
            losses: total_trades - wins,
            win_rate: if total_trades > 0 {
                wins as f64 / total_trades as f64 * 100.0
            } else {
                0.0
            },
            initial_capital,
            final_capital,
            total_pnl,
            avg_pnl: mean(trades.iter().map(|t| t.net_pnl)),
            total_return_pct,
            total_payout: trades.iter().map(|t| t.payout).sum(),
            total_premium,
            avg_premium: mean(trades.iter().map(|t| t.premium_paid)),
            max_premium: trades.iter().map(|t| t.premium_paid).fold(0.0, f64::max),
            avg_nominal_exposure: mean(trades.iter().map(|t| t.nominal_exposure)),
            avg_win: mean(trades.iter().filter(|t| t.win).map(|t| t.net_pnl)),
            avg_loss: mean(trades.iter().filter(|t| !t.win).map(|t| t.net_pnl)),
            avg_win_return_on_premium: mean(
                trades
                    .iter()
                    .filter(|t| t.win)
                    .map(|t| t.return_on_premium_pct),
            ),
            avg_loss_return_on_premium: mean(
                trades
                    .iter()
                    .filter(|t| !t.win)
                    .map(|t| t.return_on_premium_pct),
            ),
            trading_days,
            trades_per_day: total_trades as f64 / days,
            simple_apr: total_return_pct / days * CALENDAR_DAYS_PER_YEAR,
            premium_efficient_apr: premium_return_pct / days * CALENDAR_DAYS_PER_YEAR,
            sharpe_ratio: sharpe_ratio(trades),
            max_drawdown_pct: max_drawdown_pct(trades, initial_capital),
            instrument_stats: instrument_stats(trades),
        }
    }
}

/// Whole days from the first entry to the last exit, at least one.
fn trading_days(trades: &[TradeLog]) -> i64 {
    let first = trades.iter().map(|t| t.entry_time).min();
    let last = trades.iter().map(|t| t.exit_time).max();
    match (first, last) {
        (Some(first), Some(last)) => (last - first).num_days().max(1),
        _ => 1,
    }
}

fn sharpe_ratio(trades: &[TradeLog]) -> f64 {
    if trades.len() < 2 {
        return 0.0;
    }
    let returns: Vec<f64> = trades.iter().map(|t| t.return_on_premium_pct).collect();
    let n = returns.len() as f64;
    let avg = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - avg).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();
    if std_dev > 0.0 {
        avg / std_dev * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    }
}

/// Peak-to-trough drop of the capital curve rebuilt from close order.
fn max_drawdown_pct(trades: &[TradeLog], initial_capital: f64) -> f64 {
    let mut peak = initial_capital;
    let mut max_dd = 0.0_f64;
    for capital in trades.iter().map(|t| t.capital_after) {
        if capital > peak {
            peak = capital;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - capital) / peak * 100.0);
        }
    }
    max_dd
}

fn instrument_stats(trades: &[TradeLog]) -> BTreeMap<String, InstrumentStats> {
    let mut stats: BTreeMap<String, InstrumentStats> = BTreeMap::new();
    let mut return_sums: BTreeMap<&str, f64> = BTreeMap::new();
    for trade in trades {
        let entry = stats.entry(trade.instrument.clone()).or_default();
        entry.count += 1;
        entry.wins += usize::from(trade.win);
        entry.total_premium += trade.premium_paid;
        entry.total_pnl += trade.net_pnl;
        *return_sums.entry(trade.instrument.as_str()).or_insert(0.0) +=
            trade.return_on_premium_pct;
    }
    for (name, entry) in stats.iter_mut() {
        entry.win_rate = entry.wins as f64 / entry.count as f64 * 100.0;
        entry.avg_return_on_premium =
            return_sums.get(name.as_str()).copied().unwrap_or(0.0) / entry.count as f64;
    }
    stats
}
