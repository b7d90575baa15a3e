//! Single-pass backtest over a bar series and its signal stream.
//!
//! Per bar: expirations, circuit breaker, then signal intake. Positions
//! still open after the last bar are settled at its close.

use serde::Serialize;
use tracing::info;

use super::instrument::InstrumentCatalog;
use super::metrics::Statistics;
use super::ohlcv::PriceBar;
use super::portfolio::{CapitalPoint, PortfolioConfig, PortfolioManager, RejectionCounts};
use super::position::{ExitReason, TradeLog};
use super::signal::{SignalEvent, SignalStream};

/// Everything a report sink needs from one run.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport<'a> {
    pub strategy: &'a str,
    pub symbol: &'a str,
    pub statistics: &'a Statistics,
    pub result: &'a BacktestResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub initial_capital: f64,
    pub final_capital: f64,
    pub peak_capital: f64,
    pub positions_opened: usize,
    pub unmatched_signals: usize,
    pub rejections: RejectionCounts,
    pub trade_logs: Vec<TradeLog>,
    pub capital_curve: Vec<CapitalPoint>,
}

pub fn run_backtest(
    bars: &[PriceBar],
    signals: &SignalStream,
    config: &PortfolioConfig,
    catalog: &InstrumentCatalog,
) -> BacktestResult {
    let mut manager = PortfolioManager::new(config.clone(), catalog);
    let mut capital_curve = Vec::with_capacity(bars.len());

    let mut pending: Vec<&SignalEvent> = signals.actionable().collect();
    pending.sort_by_key(|s| s.timestamp);
    let mut cursor = 0;
    let mut unmatched = 0;

    for bar in bars {
        manager.process_expirations(bar);
        manager.update_circuit_breaker(bar.timestamp);

        while cursor < pending.len() && pending[cursor].timestamp < bar.timestamp {
            unmatched += 1;
            cursor += 1;
        }
        while cursor < pending.len() && pending[cursor].timestamp == bar.timestamp {
            manager.on_signal(pending[cursor], bar);
            cursor += 1;
        }

        capital_curve.push(manager.snapshot(bar.timestamp));
    }
    unmatched += pending.len() - cursor;

    if let Some(last) = bars.last() {
        manager.close_all(last, ExitReason::EndOfData);
        if let Some(point) = capital_curve.last_mut() {
            *point = manager.snapshot(last.timestamp);
        }
    }

    let state = manager.state();
    let (final_capital, peak_capital) = (state.capital, state.peak_capital);
    let positions_opened = manager.positions_opened();
    let rejections = manager.rejections().clone();
    let trade_logs = manager.into_trade_logs();

    info!(
        bars = bars.len(),
        trades = trade_logs.len(),
        rejected = rejections.total(),
        unmatched,
        final_capital,
        "backtest complete"
    );

    BacktestResult {
        initial_capital: config.initial_capital,
        final_capital,
        peak_capital,
        positions_opened,
        unmatched_signals: unmatched,
        rejections,
        trade_logs,
        capital_curve,
    }
}
