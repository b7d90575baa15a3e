//! Open option positions and the trade log they become when closed.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Call,
    Put,
}

impl Direction {
    /// Percentage move of `exit` over `entry` in this direction's favour.
    pub fn favourable_move_pct(self, entry: f64, exit: f64) -> f64 {
        if entry == 0.0 {
            return 0.0;
        }
        match self {
            Direction::Call => (exit - entry) / entry * 100.0,
            Direction::Put => (entry - exit) / entry * 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Expiry,
    EndOfData,
}

/// Market and portfolio context captured when a position opens.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryContext {
    pub capital_before: f64,
    pub concurrent_positions: usize,
    pub total_premium_deployed: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub id: String,
    pub entry_time: NaiveDateTime,
    pub expiry_time: NaiveDateTime,
    pub instrument: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub nominal_exposure: f64,
    pub premium_paid: f64,
    pub profit_cap_pct: f64,
    pub signal_strength: i32,
    pub rule_name: Option<String>,
    pub entry: EntryContext,
}

/// Payout arithmetic for closing a position at one price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settlement {
    pub price_move_pct: f64,
    pub capped_move_pct: f64,
    pub payout: f64,
    pub net_pnl: f64,
    pub return_on_premium_pct: f64,
}

impl Position {
    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        now >= self.expiry_time
    }

    pub fn settle(&self, exit_price: f64) -> Settlement {
        let price_move_pct = self
            .direction
            .favourable_move_pct(self.entry_price, exit_price);
        let capped_move_pct = price_move_pct.clamp(0.0, self.profit_cap_pct);
        let payout = self.nominal_exposure * capped_move_pct / 100.0;
        let net_pnl = payout - self.premium_paid;
        let return_on_premium_pct = if self.premium_paid > 0.0 {
            net_pnl / self.premium_paid * 100.0
        } else {
            0.0
        };
        Settlement {
            price_move_pct,
            capped_move_pct,
            payout,
            net_pnl,
            return_on_premium_pct,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLog {
    pub id: String,
    pub entry_time: NaiveDateTime,
    pub exit_time: NaiveDateTime,
    pub instrument: String,
    pub direction: Direction,
    pub signal_strength: i32,
    pub rule_name: Option<String>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub nominal_exposure: f64,
    pub premium_paid: f64,
    pub premium_pct_of_initial: f64,
    pub price_move_pct: f64,
    pub capped_move_pct: f64,
    pub payout: f64,
    pub net_pnl: f64,
    pub return_on_premium_pct: f64,
    pub capital_before: f64,
    pub capital_after: f64,
    pub concurrent_positions: usize,
    pub total_premium_deployed: f64,
    pub win: bool,
    pub exit_reason: ExitReason,
}

impl TradeLog {
    pub fn close(
        position: Position,
        exit_time: NaiveDateTime,
        exit_price: f64,
        settlement: Settlement,
        capital_after: f64,
        initial_capital: f64,
        exit_reason: ExitReason,
    ) -> Self {
        let premium_pct_of_initial = if initial_capital > 0.0 {
            position.premium_paid / initial_capital * 100.0
        } else {
            0.0
        };
        TradeLog {
            id: position.id,
            entry_time: position.entry_time,
            exit_time,
            instrument: position.instrument,
            direction: position.direction,
            signal_strength: position.signal_strength,
            rule_name: position.rule_name,
            entry_price: position.entry_price,
            exit_price,
            nominal_exposure: position.nominal_exposure,
            premium_paid: position.premium_paid,
            premium_pct_of_initial,
            price_move_pct: settlement.price_move_pct,
            capped_move_pct: settlement.capped_move_pct,
            payout: settlement.payout,
            net_pnl: settlement.net_pnl,
            return_on_premium_pct: settlement.return_on_premium_pct,
            capital_before: position.entry.capital_before,
            capital_after,
            concurrent_positions: position.entry.concurrent_positions,
            total_premium_deployed: position.entry.total_premium_deployed,
            win: settlement.net_pnl > 0.0,
            exit_reason,
        }
    }
}
