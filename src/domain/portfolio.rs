//! Premium budgeting, position lifecycle and the drawdown circuit breaker.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::instrument::InstrumentCatalog;
use super::ohlcv::PriceBar;
use super::position::{EntryContext, ExitReason, Position, TradeLog};
use super::signal::SignalEvent;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioConfig {
    pub initial_capital: f64,
    pub premium_per_trade_pct: f64,
    pub max_daily_premium_pct: f64,
    pub max_total_premium_pct: f64,
    pub max_concurrent_positions: usize,
    pub max_drawdown_pct: f64,
    pub recovery_threshold_pct: f64,
    pub min_premium_pct: f64,
    pub scale_by_strength: bool,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10.0,
            premium_per_trade_pct: 5.0,
            max_daily_premium_pct: 15.0,
            max_total_premium_pct: 30.0,
            max_concurrent_positions: 10,
            max_drawdown_pct: 25.0,
            recovery_threshold_pct: 85.0,
            min_premium_pct: 0.1,
            scale_by_strength: true,
        }
    }
}

/// Why a signal did not open a position. None of these stop the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalRejection {
    #[error("concurrent position cap of {cap} reached")]
    ConcurrencyCap { cap: usize },

    #[error("total premium budget exhausted ({open_premium:.4} open)")]
    TotalBudgetExhausted { open_premium: f64 },

    #[error("daily premium budget exhausted on {date} ({spent:.4} spent)")]
    DailyBudgetExhausted { date: NaiveDate, spent: f64 },

    #[error("premium budget {budget:.6} below minimum {minimum:.6}")]
    BelowMinimumPremium { budget: f64, minimum: f64 },

    #[error("unknown instrument '{name}'")]
    UnknownInstrument { name: String },

    #[error("trading halted by drawdown circuit breaker")]
    TradingHalted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RejectionCounts {
    pub concurrency_cap: usize,
    pub total_budget_exhausted: usize,
    pub daily_budget_exhausted: usize,
    pub below_minimum_premium: usize,
    pub unknown_instrument: usize,
    pub trading_halted: usize,
}

impl RejectionCounts {
    pub fn record(&mut self, rejection: &SignalRejection) {
        let slot = match rejection {
            SignalRejection::ConcurrencyCap { .. } => &mut self.concurrency_cap,
            SignalRejection::TotalBudgetExhausted { .. } => &mut self.total_budget_exhausted,
            SignalRejection::DailyBudgetExhausted { .. } => &mut self.daily_budget_exhausted,
            SignalRejection::BelowMinimumPremium { .. } => &mut self.below_minimum_premium,
            SignalRejection::UnknownInstrument { .. } => &mut self.unknown_instrument,
            SignalRejection::TradingHalted => &mut self.trading_halted,
        };
        *slot += 1;
    }

    pub fn total(&self) -> usize {
        self.concurrency_cap
            + self.total_budget_exhausted
            + self.daily_budget_exhausted
            + self.below_minimum_premium
            + self.unknown_instrument
            + self.trading_halted
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapitalPoint {
    pub timestamp: NaiveDateTime,
    pub capital: f64,
    pub peak_capital: f64,
    pub drawdown_pct: f64,
    pub open_positions: usize,
    pub trading_enabled: bool,
}

/// Mutable state of one backtest run.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioState {
    pub capital: f64,
    pub peak_capital: f64,
    pub positions: Vec<Position>,
    pub daily_spend: BTreeMap<NaiveDate, f64>,
    pub trading_enabled: bool,
}

impl PortfolioState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            capital: initial_capital,
            peak_capital: initial_capital,
            positions: Vec::new(),
            daily_spend: BTreeMap::new(),
            trading_enabled: true,
        }
    }

    pub fn open_premium(&self) -> f64 {
        self.positions.iter().map(|p| p.premium_paid).sum()
    }

    pub fn spent_on(&self, date: NaiveDate) -> f64 {
        self.daily_spend.get(&date).copied().unwrap_or(0.0)
    }

    pub fn drawdown_pct(&self) -> f64 {
        if self.peak_capital > 0.0 {
            ((self.peak_capital - self.capital) / self.peak_capital * 100.0).max(0.0)
        } else {
            0.0
        }
    }
}

/// Budget fraction for a signal strength: `|s|/10` capped at 1, with an
/// unrated (zero) signal sized at half.
pub fn strength_multiplier(strength: i32) -> f64 {
    if strength == 0 {
        return 0.5;
    }
    (f64::from(strength.unsigned_abs()) / 10.0).min(1.0)
}

pub struct PortfolioManager<'a> {
    config: PortfolioConfig,
    catalog: &'a InstrumentCatalog,
    state: PortfolioState,
    trade_logs: Vec<TradeLog>,
    rejections: RejectionCounts,
    opened: usize,
}

impl<'a> PortfolioManager<'a> {
    pub fn new(config: PortfolioConfig, catalog: &'a InstrumentCatalog) -> Self {
        let state = PortfolioState::new(config.initial_capital);
        Self {
            config,
            catalog,
            state,
            trade_logs: Vec::new(),
            rejections: RejectionCounts::default(),
            opened: 0,
        }
    }

    pub fn config(&self) -> &PortfolioConfig {
        &self.config
    }

    pub fn state(&self) -> &PortfolioState {
        &self.state
    }

    pub fn trade_logs(&self) -> &[TradeLog] {
        &self.trade_logs
    }

    pub fn rejections(&self) -> &RejectionCounts {
        &self.rejections
    }

    pub fn positions_opened(&self) -> usize {
        self.opened
    }

    /// Close every position whose expiry is at or before `bar`, at its close.
    pub fn process_expirations(&mut self, bar: &PriceBar) -> usize {
        let (expired, open): (Vec<Position>, Vec<Position>) =
            std::mem::take(&mut self.state.positions)
                .into_iter()
                .partition(|p| p.is_expired(bar.timestamp));
        self.state.positions = open;
        let count = expired.len();
        for position in expired {
            self.close(position, bar, ExitReason::Expiry);
        }
        count
    }

    /// Halt entries past the drawdown limit; resume once capital recovers
    /// to the recovery threshold of peak.
    pub fn update_circuit_breaker(&mut self, timestamp: NaiveDateTime) {
        let drawdown = self.state.drawdown_pct();
        if self.state.trading_enabled {
            if drawdown > self.config.max_drawdown_pct {
                self.state.trading_enabled = false;
                warn!(
                    %timestamp,
                    drawdown_pct = drawdown,
                    capital = self.state.capital,
                    peak = self.state.peak_capital,
                    "drawdown limit breached, trading halted"
                );
            }
        } else if self.state.capital
            >= self.state.peak_capital * self.config.recovery_threshold_pct / 100.0
        {
            self.state.trading_enabled = true;
            info!(
                %timestamp,
                capital = self.state.capital,
                peak = self.state.peak_capital,
                "capital recovered, trading resumed"
            );
        }
    }

    /// Largest premium this signal may spend right now.
    pub fn premium_budget(&self, date: NaiveDate, strength: i32) -> Result<f64, SignalRejection> {
        let capital = self.state.capital;
        let open_premium = self.state.open_premium();
        let per_trade = capital * self.config.premium_per_trade_pct / 100.0;

        // open + p <= t * (capital - p)  =>  p <= (t * capital - open) / (1 + t)
        let t = self.config.max_total_premium_pct / 100.0;
        let remaining_total = (t * capital - open_premium) / (1.0 + t);
        if remaining_total <= 0.0 {
            return Err(SignalRejection::TotalBudgetExhausted { open_premium });
        }

        let spent = self.state.spent_on(date);
        let remaining_daily = capital * self.config.max_daily_premium_pct / 100.0 - spent;
        if remaining_daily <= 0.0 {
            return Err(SignalRejection::DailyBudgetExhausted { date, spent });
        }

        let mut budget = per_trade.min(remaining_total).min(remaining_daily);
        if self.config.scale_by_strength {
            budget *= strength_multiplier(strength);
        }
        let minimum = capital * self.config.min_premium_pct / 100.0;
        if budget <= 0.0 || budget < minimum {
            return Err(SignalRejection::BelowMinimumPremium { budget, minimum });
        }
        Ok(budget)
    }

    /// Try to open a position for an actionable signal on `bar`.
    pub fn open(&mut self, signal: &SignalEvent, bar: &PriceBar) -> Result<(), SignalRejection> {
        let Some(direction) = signal.direction() else {
            return Ok(());
        };
        if !self.state.trading_enabled {
            return Err(SignalRejection::TradingHalted);
        }
        let name = signal.instrument.clone().unwrap_or_default();
        let Some(instrument) = self.catalog.get(&name) else {
            return Err(SignalRejection::UnknownInstrument { name });
        };
        if self.state.positions.len() >= self.config.max_concurrent_positions {
            return Err(SignalRejection::ConcurrencyCap {
                cap: self.config.max_concurrent_positions,
            });
        }

        let date = bar.date();
        let premium = self.premium_budget(date, signal.strength)?;
        let nominal_exposure = premium / (instrument.premium_cost_pct / 100.0);
        let expiry_time = TimeDelta::try_days(instrument.duration_days)
            .and_then(|d| bar.timestamp.checked_add_signed(d))
            .unwrap_or(NaiveDateTime::MAX);

        let entry = EntryContext {
            capital_before: self.state.capital,
            concurrent_positions: self.state.positions.len(),
            total_premium_deployed: self.state.open_premium() + premium,
        };
        self.opened += 1;
        let position = Position {
            id: format!("T{:05}", self.opened),
            entry_time: bar.timestamp,
            expiry_time,
            instrument: instrument.name.clone(),
            direction,
            entry_price: bar.close,
            nominal_exposure,
            premium_paid: premium,
            profit_cap_pct: instrument.profit_cap_pct,
            signal_strength: signal.strength,
            rule_name: signal.rule_name.clone(),
            entry,
        };

        self.state.capital -= premium;
        *self.state.daily_spend.entry(date).or_insert(0.0) += premium;
        debug!(
            id = %position.id,
            instrument = %position.instrument,
            direction = ?direction,
            premium,
            nominal_exposure,
            capital = self.state.capital,
            "position opened"
        );
        self.state.positions.push(position);
        Ok(())
    }

    /// Feed one signal, counting any rejection.
    pub fn on_signal(&mut self, signal: &SignalEvent, bar: &PriceBar) {
        if let Err(rejection) = self.open(signal, bar) {
            match &rejection {
                SignalRejection::UnknownInstrument { .. } => {
                    warn!(timestamp = %signal.timestamp, %rejection, "signal rejected")
                }
                _ => debug!(timestamp = %signal.timestamp, %rejection, "signal rejected"),
            }
            self.rejections.record(&rejection);
        }
    }

    pub fn close_all(&mut self, bar: &PriceBar, reason: ExitReason) {
        for position in std::mem::take(&mut self.state.positions) {
            self.close(position, bar, reason);
        }
    }

    fn close(&mut self, position: Position, bar: &PriceBar, reason: ExitReason) {
        let settlement = position.settle(bar.close);
        self.state.capital += settlement.payout;
        self.state.peak_capital = self.state.peak_capital.max(self.state.capital);
        debug!(
            id = %position.id,
            reason = ?reason,
            net_pnl = settlement.net_pnl,
            capital = self.state.capital,
            "position closed"
        );
        self.trade_logs.push(TradeLog::close(
            position,
            bar.timestamp,
            bar.close,
            settlement,
            self.state.capital,
            self.config.initial_capital,
            reason,
        ));
    }

    pub fn snapshot(&self, timestamp: NaiveDateTime) -> CapitalPoint {
        CapitalPoint {
            timestamp,
            capital: self.state.capital,
            peak_capital: self.state.peak_capital,
            drawdown_pct: self.state.drawdown_pct(),
            open_positions: self.state.positions.len(),
            trading_enabled: self.state.trading_enabled,
        }
    }

    pub fn into_trade_logs(self) -> Vec<TradeLog> {
        self.trade_logs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::Direction;
    use crate::domain::signal::SignalType;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn bar(timestamp: NaiveDateTime, close: f64) -> PriceBar {
        PriceBar {
            timestamp,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    fn signal(timestamp: NaiveDateTime, signal_type: SignalType, strength: i32) -> SignalEvent {
        SignalEvent {
            timestamp,
            bar_index: 0,
            signal_type,
            strength,
            instrument: Some("3D_5PCT".into()),
            rule_name: None,
            close: 100.0,
            expected_move_pct: None,
            volatility_pct: None,
        }
    }

    fn unscaled() -> PortfolioConfig {
        PortfolioConfig {
            scale_by_strength: false,
            ..PortfolioConfig::default()
        }
    }

    #[test]
    fn premium_is_deducted_at_entry() {
        let catalog = InstrumentCatalog::standard();
        let mut pm = PortfolioManager::new(unscaled(), &catalog);
        let b = bar(ts(1, 10), 100.0);
        pm.open(&signal(b.timestamp, SignalType::Call, 7), &b).unwrap();

        let p = &pm.state().positions[0];
        assert_relative_eq!(p.premium_paid, 0.5);
        assert_relative_eq!(p.nominal_exposure, 0.5 / 0.022, epsilon = 1e-9);
        assert_eq!(p.expiry_time, ts(4, 10));
        assert_relative_eq!(pm.state().capital, 9.5);
        assert_eq!(p.id, "T00001");
    }

    #[test]
    fn strength_scales_budget() {
        let catalog = InstrumentCatalog::standard();
        let mut pm = PortfolioManager::new(PortfolioConfig::default(), &catalog);
        let b = bar(ts(1, 10), 100.0);
        pm.open(&signal(b.timestamp, SignalType::Put, -4), &b).unwrap();
        assert_relative_eq!(pm.state().positions[0].premium_paid, 0.2);
    }

    #[test]
    fn neutral_signal_is_ignored() {
        let catalog = InstrumentCatalog::standard();
        let mut pm = PortfolioManager::new(unscaled(), &catalog);
        let b = bar(ts(1, 10), 100.0);
        pm.on_signal(&signal(b.timestamp, SignalType::Neutral, 5), &b);
        assert!(pm.state().positions.is_empty());
        assert_eq!(pm.rejections().total(), 0);
    }

    #[test]
    fn zero_strength_call_trades_at_half_size() {
        let catalog = InstrumentCatalog::standard();
        let mut pm = PortfolioManager::new(PortfolioConfig::default(), &catalog);
        let b = bar(ts(1, 10), 100.0);
        pm.on_signal(&signal(b.timestamp, SignalType::Call, 0), &b);
        assert_eq!(pm.rejections().total(), 0);
        let p = &pm.state().positions[0];
        assert_eq!(p.direction, Direction::Call);
        assert_relative_eq!(p.premium_paid, 0.25);
    }

    #[test]
    fn multiplier_by_strength() {
        assert_relative_eq!(strength_multiplier(0), 0.5);
        assert_relative_eq!(strength_multiplier(-4), 0.4);
        assert_relative_eq!(strength_multiplier(15), 1.0);
    }

    #[test]
    fn daily_budget_caps_same_day_entries() {
        let catalog = InstrumentCatalog::standard();
        let config = PortfolioConfig {
            premium_per_trade_pct: 10.0,
            max_daily_premium_pct: 15.0,
            max_total_premium_pct: 100.0,
            min_premium_pct: 6.0,
            ..unscaled()
        };
        let mut pm = PortfolioManager::new(config, &catalog);
        let b = bar(ts(1, 10), 100.0);
        let s = signal(b.timestamp, SignalType::Call, 7);
        pm.open(&s, &b).unwrap();
        // 0.35 left today against a 0.54 floor
        assert!(matches!(
            pm.open(&s, &b),
            Err(SignalRejection::BelowMinimumPremium { .. })
        ));

        let next_day = bar(ts(2, 10), 100.0);
        pm.open(&signal(next_day.timestamp, SignalType::Call, 7), &next_day)
            .unwrap();
        assert_eq!(pm.state().positions.len(), 2);
    }

    #[test]
    fn exhausted_daily_budget_is_reported() {
        let catalog = InstrumentCatalog::standard();
        let config = PortfolioConfig {
            premium_per_trade_pct: 5.0,
            max_daily_premium_pct: 5.0,
            ..unscaled()
        };
        let mut pm = PortfolioManager::new(config, &catalog);
        let b = bar(ts(1, 10), 100.0);
        let s = signal(b.timestamp, SignalType::Call, 7);
        pm.open(&s, &b).unwrap();
        assert!(matches!(
            pm.open(&s, &b),
            Err(SignalRejection::DailyBudgetExhausted { .. })
        ));
    }

    #[test]
    fn total_budget_holds_against_remaining_capital() {
        let catalog = InstrumentCatalog::standard();
        let config = PortfolioConfig {
            max_daily_premium_pct: 100.0,
            max_concurrent_positions: 100,
            ..unscaled()
        };
        let mut pm = PortfolioManager::new(config, &catalog);
        for hour in 0..24 {
            let b = bar(ts(1, hour), 100.0);
            pm.on_signal(&signal(b.timestamp, SignalType::Call, 7), &b);
            let state = pm.state();
            assert!(state.open_premium() <= 0.30 * state.capital + 1e-9);
        }
        assert!(pm.rejections().total() > 0);
    }

    #[test]
    fn unknown_instrument_is_rejected_and_counted() {
        let catalog = InstrumentCatalog::standard();
        let mut pm = PortfolioManager::new(unscaled(), &catalog);
        let b = bar(ts(1, 10), 100.0);
        let mut s = signal(b.timestamp, SignalType::Call, 7);
        s.instrument = Some("1D_1PCT".into());
        pm.on_signal(&s, &b);
        assert_eq!(pm.rejections().unknown_instrument, 1);
        assert!(pm.state().positions.is_empty());
    }

    #[test]
    fn expiry_closes_at_bar_close() {
        let catalog = InstrumentCatalog::standard();
        let mut pm = PortfolioManager::new(unscaled(), &catalog);
        let entry = bar(ts(1, 10), 100.0);
        pm.open(&signal(entry.timestamp, SignalType::Call, 7), &entry)
            .unwrap();

        assert_eq!(pm.process_expirations(&bar(ts(4, 9), 110.0)), 0);
        assert_eq!(pm.process_expirations(&bar(ts(4, 10), 103.0)), 1);

        let log = &pm.trade_logs()[0];
        assert_eq!(log.exit_reason, ExitReason::Expiry);
        assert_relative_eq!(log.capped_move_pct, 3.0, epsilon = 1e-9);
        assert_relative_eq!(pm.state().capital, 9.5 + log.payout);
        assert!(pm.state().peak_capital >= 10.0);
    }

    #[test]
    fn circuit_breaker_hysteresis() {
        let catalog = InstrumentCatalog::standard();
        let config = PortfolioConfig {
            max_drawdown_pct: 25.0,
            recovery_threshold_pct: 85.0,
            ..unscaled()
        };
        let mut pm = PortfolioManager::new(config, &catalog);
        pm.state.capital = 7.0;
        pm.update_circuit_breaker(ts(1, 0));
        assert!(!pm.state().trading_enabled);

        // 80% of peak: still halted
        pm.state.capital = 8.0;
        pm.update_circuit_breaker(ts(1, 1));
        assert!(!pm.state().trading_enabled);
        let b = bar(ts(1, 1), 100.0);
        assert_eq!(
            pm.open(&signal(b.timestamp, SignalType::Call, 7), &b),
            Err(SignalRejection::TradingHalted)
        );

        pm.state.capital = 8.5;
        pm.update_circuit_breaker(ts(1, 2));
        assert!(pm.state().trading_enabled);
    }

    #[test]
    fn rejection_counts_by_kind() {
        let mut counts = RejectionCounts::default();
        counts.record(&SignalRejection::TradingHalted);
        counts.record(&SignalRejection::ConcurrencyCap { cap: 1 });
        counts.record(&SignalRejection::ConcurrencyCap { cap: 1 });
        assert_eq!(counts.concurrency_cap, 2);
        assert_eq!(counts.total(), 3);
    }
}
