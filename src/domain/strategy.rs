//! Declarative strategy definition.
//!
//! A [`StrategyDefinition`] is the JSON strategy document as an immutable
//! value. It is compiled into executable form by
//! [`RuleEngine`](crate::domain::engine::RuleEngine); parameter sweeps derive
//! new definitions with [`StrategyDefinition::with_constants`] instead of
//! mutating one in place.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::{ConfigurationError, OptraderError};
use super::instrument::{SHORT_LOW_CAP, SelectionThresholds};
use super::signal::SignalType;

/// A number, or text holding a number, an `@constant`, a column name or a
/// small arithmetic expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueSpec {
    Number(f64),
    Text(String),
}

impl From<f64> for ValueSpec {
    fn from(v: f64) -> Self {
        ValueSpec::Number(v)
    }
}

impl From<&str> for ValueSpec {
    fn from(v: &str) -> Self {
        ValueSpec::Text(v.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub constants: BTreeMap<String, f64>,
    #[serde(default)]
    pub indicators: Vec<IndicatorSpec>,
    #[serde(default)]
    pub signal_rules: Vec<SignalRuleSpec>,
    #[serde(default = "ActionSpec::neutral", rename = "default_action_on_no_match")]
    pub default_action: ActionSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument_selection: Option<SelectionSettings>,
    #[serde(default = "default_instrument")]
    pub default_instrument: String,
}

fn default_instrument() -> String {
    SHORT_LOW_CAP.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub params: BTreeMap<String, ValueSpec>,
    #[serde(default)]
    pub outputs: OutputSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_output_column: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub component_output_map: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRuleSpec {
    pub rule_name: String,
    pub conditions_group: ConditionGroupSpec,
    pub action_on_true: ActionSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument_selection: Option<RuleSelectionSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupLogic {
    #[serde(rename = "AND", alias = "and")]
    And,
    #[serde(rename = "OR", alias = "or")]
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionGroupSpec {
    pub operator: GroupLogic,
    #[serde(default)]
    pub conditions: Vec<ConditionSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionOperator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "crosses_above")]
    CrossesAbove,
    #[serde(rename = "crosses_below")]
    CrossesBelow,
    #[serde(rename = "is_rising")]
    IsRising,
    #[serde(rename = "is_falling")]
    IsFalling,
    #[serde(rename = "is_between")]
    IsBetween,
    #[serde(rename = "is_not_between")]
    IsNotBetween,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionSpec {
    pub series1: ValueSpec,
    pub operator: ConditionOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series2_or_value: Option<ValueSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<ValueSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<ValueSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub signal_type: SignalType,
    #[serde(default)]
    pub strength: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument_type: Option<String>,
}

impl ActionSpec {
    pub fn neutral() -> Self {
        Self {
            signal_type: SignalType::Neutral,
            strength: 0,
            instrument_type: None,
        }
    }
}

/// Per-rule selection hints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSelectionSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volatility_threshold: Option<ValueSpec>,
}

/// Enables instrument selection and names the columns feeding the
/// volatility and expected-move estimates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionSettings {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "atr_column")]
    pub atr_column: String,
    #[serde(default = "rsi_column")]
    pub rsi_column: String,
    #[serde(default = "macd_histogram_column")]
    pub macd_histogram_column: String,
}

fn enabled() -> bool {
    true
}
fn atr_column() -> String {
    "atr_value".into()
}
fn rsi_column() -> String {
    "rsi_value".into()
}
fn macd_histogram_column() -> String {
    "macd_hist".into()
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            atr_column: atr_column(),
            rsi_column: rsi_column(),
            macd_histogram_column: macd_histogram_column(),
        }
    }
}

impl StrategyDefinition {
    /// Parse a strategy document. Documents wrapped in a
    /// `strategy_logic_dsl` object are unwrapped, keeping the outer name and
    /// description.
    pub fn from_json_str(content: &str, origin: &str) -> Result<Self, OptraderError> {
        let parse_err = |e: serde_json::Error| OptraderError::StrategyParse {
            file: origin.to_string(),
            reason: e.to_string(),
        };
        let mut value: serde_json::Value = serde_json::from_str(content).map_err(parse_err)?;

        if let Some(mut inner) = value.get("strategy_logic_dsl").cloned() {
            if let (Some(obj), Some(outer)) = (inner.as_object_mut(), value.as_object()) {
                for key in ["name", "description"] {
                    if let Some(v) = outer.get(key) {
                        obj.entry(key).or_insert_with(|| v.clone());
                    }
                }
            }
            value = inner;
        }
        serde_json::from_value(value).map_err(parse_err)
    }

    pub fn to_json_pretty(&self) -> Result<String, OptraderError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// A copy of this definition with some constants replaced or added.
    pub fn with_constants(&self, overrides: &BTreeMap<String, f64>) -> Self {
        let mut next = self.clone();
        for (name, value) in overrides {
            next.constants.insert(name.clone(), *value);
        }
        next
    }

    pub fn constant(&self, name: &str) -> Result<f64, ConfigurationError> {
        self.constants
            .get(name)
            .copied()
            .ok_or_else(|| ConfigurationError::UnresolvedConstant {
                name: name.to_string(),
            })
    }

    pub fn constant_or(&self, name: &str, default: f64) -> f64 {
        self.constants.get(name).copied().unwrap_or(default)
    }

    /// Resolve a number, numeric text or `@constant` to a value. Anything
    /// else yields `Ok(None)`.
    pub fn resolve_number(&self, spec: &ValueSpec) -> Result<Option<f64>, ConfigurationError> {
        match spec {
            ValueSpec::Number(v) => Ok(Some(*v)),
            ValueSpec::Text(text) => {
                let text = text.trim();
                if let Some(name) = text.strip_prefix('@') {
                    self.constant(name).map(Some)
                } else {
                    Ok(text.parse::<f64>().ok())
                }
            }
        }
    }

    pub fn selection_thresholds(&self) -> SelectionThresholds {
        let d = SelectionThresholds::default();
        SelectionThresholds {
            strong_signal_strength: self
                .constant_or("strong_signal_strength", d.strong_signal_strength),
            volatility_threshold: self.constant_or("volatility_threshold", d.volatility_threshold),
            strong_move_threshold: self
                .constant_or("strong_move_threshold", d.strong_move_threshold),
            long_move_threshold: self.constant_or("long_move_threshold", d.long_move_threshold),
            weak_move_threshold: self.constant_or("weak_move_threshold", d.weak_move_threshold),
        }
    }

    /// Instrument selection settings when selection is switched on.
    pub fn active_selection(&self) -> Option<&SelectionSettings> {
        self.instrument_selection.as_ref().filter(|s| s.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "name": "rsi_reversal",
        "constants": {"rsi_period": 14, "oversold": 30, "volatility_threshold": 2.5},
        "indicators": [
            {"name": "rsi", "type": "rsi", "params": {"length": "@rsi_period"},
             "outputs": {"primary_output_column": "rsi_value"}}
        ],
        "signal_rules": [
            {"rule_name": "oversold_call",
             "conditions_group": {"operator": "AND", "conditions": [
                {"series1": "rsi_value", "operator": "<", "series2_or_value": "@oversold"}
             ]},
             "action_on_true": {"signal_type": "CALL", "strength": 7}}
        ],
        "default_action_on_no_match": {"signal_type": "NEUTRAL", "strength": 0}
    }"#;

    #[test]
    fn parses_document() {
        let def = StrategyDefinition::from_json_str(SAMPLE, "inline").unwrap();
        assert_eq!(def.name, "rsi_reversal");
        assert_eq!(def.indicators.len(), 1);
        assert_eq!(def.indicators[0].kind, "rsi");
        assert_eq!(def.signal_rules[0].conditions_group.operator, GroupLogic::And);
        assert_eq!(
            def.signal_rules[0].conditions_group.conditions[0].operator,
            ConditionOperator::Lt
        );
        assert_eq!(def.default_action.signal_type, SignalType::Neutral);
        assert_eq!(def.default_instrument, "3D_5PCT");
        assert!(def.instrument_selection.is_none());
    }

    #[test]
    fn unwraps_strategy_logic_dsl() {
        let wrapped = format!(
            r#"{{"name": "outer", "strategy_logic_dsl": {}}}"#,
            SAMPLE.replace("\"name\": \"rsi_reversal\",", "")
        );
        let def = StrategyDefinition::from_json_str(&wrapped, "inline").unwrap();
        assert_eq!(def.name, "outer");
        assert_eq!(def.signal_rules.len(), 1);
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = StrategyDefinition::from_json_str("{not json", "bad.json").unwrap_err();
        assert!(matches!(err, OptraderError::StrategyParse { .. }));
    }

    #[test]
    fn unknown_operator_is_parse_error() {
        let doc = SAMPLE.replace("\"<\"", "\"approximately\"");
        assert!(StrategyDefinition::from_json_str(&doc, "x").is_err());
    }

    #[test]
    fn with_constants_leaves_original_untouched() {
        let def = StrategyDefinition::from_json_str(SAMPLE, "inline").unwrap();
        let mut overrides = BTreeMap::new();
        overrides.insert("oversold".to_string(), 25.0);
        let next = def.with_constants(&overrides);
        assert_eq!(next.constant("oversold").unwrap(), 25.0);
        assert_eq!(def.constant("oversold").unwrap(), 30.0);
    }

    #[test]
    fn resolve_number_forms() {
        let def = StrategyDefinition::from_json_str(SAMPLE, "inline").unwrap();
        assert_eq!(def.resolve_number(&2.5.into()).unwrap(), Some(2.5));
        assert_eq!(def.resolve_number(&"3.5".into()).unwrap(), Some(3.5));
        assert_eq!(def.resolve_number(&"@oversold".into()).unwrap(), Some(30.0));
        assert_eq!(def.resolve_number(&"close".into()).unwrap(), None);
        assert_eq!(
            def.resolve_number(&"@missing".into()),
            Err(ConfigurationError::UnresolvedConstant {
                name: "missing".into()
            })
        );
    }

    #[test]
    fn selection_thresholds_read_constants() {
        let def = StrategyDefinition::from_json_str(SAMPLE, "inline").unwrap();
        let t = def.selection_thresholds();
        assert_eq!(t.volatility_threshold, 2.5);
        assert_eq!(t.strong_signal_strength, 7.0);
    }

    #[test]
    fn round_trips_through_json() {
        let def = StrategyDefinition::from_json_str(SAMPLE, "inline").unwrap();
        let text = def.to_json_pretty().unwrap();
        let again = StrategyDefinition::from_json_str(&text, "inline").unwrap();
        assert_eq!(def, again);
    }
}
