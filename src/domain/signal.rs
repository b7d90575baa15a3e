//! Per-bar signal events emitted by the rule engine.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::position::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalType {
    Call,
    Put,
    Neutral,
}

impl SignalType {
    pub fn direction(self) -> Option<Direction> {
        match self {
            SignalType::Call => Some(Direction::Call),
            SignalType::Put => Some(Direction::Put),
            SignalType::Neutral => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub timestamp: NaiveDateTime,
    pub bar_index: usize,
    pub signal_type: SignalType,
    pub strength: i32,
    pub instrument: Option<String>,
    /// Rule that fired; `None` when the default action was taken.
    pub rule_name: Option<String>,
    pub close: f64,
    pub expected_move_pct: Option<f64>,
    pub volatility_pct: Option<f64>,
}

impl SignalEvent {
    /// Direction to trade, if this event asks for a position at all.
    /// Strength only sizes the position; it never vetoes one.
    pub fn direction(&self) -> Option<Direction> {
        self.signal_type.direction()
    }

    pub fn is_actionable(&self) -> bool {
        self.direction().is_some()
    }
}

/// Time-ordered signal events, one per bar when produced by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalStream {
    pub events: Vec<SignalEvent>,
}

impl SignalStream {
    pub fn new(events: Vec<SignalEvent>) -> Self {
        Self { events }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SignalEvent> {
        self.events.iter()
    }

    pub fn actionable(&self) -> impl Iterator<Item = &SignalEvent> {
        self.events.iter().filter(|e| e.is_actionable())
    }

    /// (calls, puts, neutral)
    pub fn counts(&self) -> (usize, usize, usize) {
        self.events
            .iter()
            .fold((0, 0, 0), |(c, p, n), e| match e.direction() {
                Some(Direction::Call) => (c + 1, p, n),
                Some(Direction::Put) => (c, p + 1, n),
                None => (c, p, n + 1),
            })
    }
}
