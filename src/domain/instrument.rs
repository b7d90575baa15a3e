//! Capped-payout option instruments and the volatility/expected-move
//! instrument selector.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const SHORT_LOW_CAP: &str = "3D_5PCT";
pub const SHORT_HIGH_CAP: &str = "3D_10PCT";
pub const LONG_LOW_CAP: &str = "7D_5PCT";
pub const LONG_HIGH_CAP: &str = "7D_10PCT";

/// Expected move assumed when the strategy cannot derive one.
pub const DEFAULT_EXPECTED_MOVE_PCT: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionInstrument {
    pub name: String,
    pub duration_days: i64,
    pub profit_cap_pct: f64,
    pub premium_cost_pct: f64,
}

impl OptionInstrument {
    pub fn new(name: &str, duration_days: i64, profit_cap_pct: f64, premium_cost_pct: f64) -> Self {
        Self {
            name: name.to_string(),
            duration_days,
            profit_cap_pct,
            premium_cost_pct,
        }
    }
}

/// Fixed, name-keyed instrument catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentCatalog {
    instruments: BTreeMap<String, OptionInstrument>,
}

impl Default for InstrumentCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl InstrumentCatalog {
    pub fn standard() -> Self {
        Self::from_instruments(vec![
            OptionInstrument::new(SHORT_LOW_CAP, 3, 5.0, 2.2),
            OptionInstrument::new(SHORT_HIGH_CAP, 3, 10.0, 2.6),
            OptionInstrument::new(LONG_LOW_CAP, 7, 5.0, 2.8),
            OptionInstrument::new(LONG_HIGH_CAP, 7, 10.0, 2.8),
        ])
    }

    pub fn from_instruments(instruments: Vec<OptionInstrument>) -> Self {
        Self {
            instruments: instruments
                .into_iter()
                .map(|i| (i.name.clone(), i))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&OptionInstrument> {
        self.instruments.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.instruments.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OptionInstrument> {
        self.instruments.values()
    }
}

/// Thresholds steering instrument selection. All of them come from strategy
/// constants.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionThresholds {
    pub strong_signal_strength: f64,
    pub volatility_threshold: f64,
    pub strong_move_threshold: f64,
    pub long_move_threshold: f64,
    pub weak_move_threshold: f64,
}

impl Default for SelectionThresholds {
    fn default() -> Self {
        Self {
            strong_signal_strength: 7.0,
            volatility_threshold: 3.0,
            strong_move_threshold: 7.0,
            long_move_threshold: 5.0,
            weak_move_threshold: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InstrumentSelector {
    pub thresholds: SelectionThresholds,
}

impl InstrumentSelector {
    pub fn new(thresholds: SelectionThresholds) -> Self {
        Self { thresholds }
    }

    /// Pick an instrument name for a signal.
    ///
    /// `volatility_pct` is ATR / close * 100; an undefined volatility counts
    /// as calm. `volatility_threshold` overrides the strategy-wide value for
    /// a single rule.
    pub fn select(
        &self,
        strength: i32,
        volatility_pct: Option<f64>,
        expected_move_pct: Option<f64>,
        volatility_threshold: Option<f64>,
    ) -> &'static str {
        let t = &self.thresholds;
        let threshold = volatility_threshold.unwrap_or(t.volatility_threshold);
        let high_vol = volatility_pct.is_some_and(|v| v > threshold);
        let expected_move = expected_move_pct.unwrap_or(DEFAULT_EXPECTED_MOVE_PCT);

        if f64::from(strength.abs()) >= t.strong_signal_strength {
            if high_vol {
                if expected_move > t.strong_move_threshold {
                    SHORT_HIGH_CAP
                } else {
                    SHORT_LOW_CAP
                }
            } else if expected_move > t.long_move_threshold {
                LONG_HIGH_CAP
            } else {
                LONG_LOW_CAP
            }
        } else if high_vol {
            SHORT_LOW_CAP
        } else if expected_move >= t.weak_move_threshold {
            LONG_LOW_CAP
        } else {
            SHORT_LOW_CAP
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn standard_catalog_terms() {
        let catalog = InstrumentCatalog::standard();
        let i = catalog.get("7D_5PCT").unwrap();
        assert_eq!(i.duration_days, 7);
        assert_relative_eq!(i.profit_cap_pct, 5.0);
        assert_relative_eq!(i.premium_cost_pct, 2.8);
        assert_relative_eq!(catalog.get("3D_10PCT").unwrap().premium_cost_pct, 2.6);
        assert!(catalog.get("1D_1PCT").is_none());
        assert_eq!(catalog.iter().count(), 4);
    }

    #[test]
    fn strong_signal_high_vol_picks_short_duration() {
        let s = InstrumentSelector::default();
        assert_eq!(s.select(7, Some(4.0), Some(8.0), None), SHORT_HIGH_CAP);
        assert_eq!(s.select(-7, Some(4.0), Some(6.0), None), SHORT_LOW_CAP);
    }

    #[test]
    fn strong_signal_low_vol_picks_long_duration() {
        let s = InstrumentSelector::default();
        assert_eq!(s.select(8, Some(1.0), Some(6.0), None), LONG_HIGH_CAP);
        assert_eq!(s.select(-9, Some(1.0), Some(4.0), None), LONG_LOW_CAP);
    }

    #[test]
    fn weak_signal_rules() {
        let s = InstrumentSelector::default();
        assert_eq!(s.select(3, Some(5.0), Some(9.0), None), SHORT_LOW_CAP);
        assert_eq!(s.select(-3, Some(1.0), Some(6.0), None), LONG_LOW_CAP);
        assert_eq!(s.select(-3, Some(1.0), Some(2.0), None), SHORT_LOW_CAP);
    }

    #[test]
    fn undefined_inputs_fall_back() {
        let s = InstrumentSelector::default();
        // calm market, expected move 2.0
        assert_eq!(s.select(7, None, None, None), LONG_LOW_CAP);
        assert_eq!(s.select(3, None, None, None), SHORT_LOW_CAP);
    }

    #[test]
    fn rule_threshold_override() {
        let s = InstrumentSelector::default();
        assert_eq!(s.select(7, Some(2.0), Some(8.0), None), LONG_HIGH_CAP);
        assert_eq!(s.select(7, Some(2.0), Some(8.0), Some(1.5)), SHORT_HIGH_CAP);
    }

    #[test]
    fn thresholds_are_tunable() {
        let s = InstrumentSelector::new(SelectionThresholds {
            strong_signal_strength: 3.0,
            ..SelectionThresholds::default()
        });
        assert_eq!(s.select(3, Some(1.0), Some(4.0), None), LONG_LOW_CAP);
        assert_eq!(s.select(3, Some(1.0), Some(5.5), None), LONG_HIGH_CAP);
    }
}
