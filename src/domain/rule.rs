//! Compiled signal rules.
//!
//! Strategy documents are compiled once into these structures: constants
//! are substituted, column references are checked against the columns the
//! strategy will produce, and instrument hints are checked against the
//! catalog. Evaluation lives in [`rule_eval`](crate::domain::rule_eval).

use std::collections::BTreeSet;

use super::error::ConfigurationError;
use super::instrument::InstrumentCatalog;
use super::signal::SignalType;
use super::strategy::{
    ActionSpec, ConditionOperator, ConditionSpec, GroupLogic, SignalRuleSpec, StrategyDefinition,
    ValueSpec,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithOp {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "+" => Some(ArithOp::Add),
            "-" => Some(ArithOp::Sub),
            "*" => Some(ArithOp::Mul),
            "/" => Some(ArithOp::Div),
            _ => None,
        }
    }

    /// `None` on division by zero.
    pub fn apply(self, a: f64, b: f64) -> Option<f64> {
        match self {
            ArithOp::Add => Some(a + b),
            ArithOp::Sub => Some(a - b),
            ArithOp::Mul => Some(a * b),
            ArithOp::Div if b == 0.0 => None,
            ArithOp::Div => Some(a / b),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(f64),
    /// Kept by name so diagnostics can say where a value came from.
    Constant { name: String, value: f64 },
    Column(String),
    Binary {
        op: ArithOp,
        left: Box<Operand>,
        right: Box<Operand>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare {
        op: Comparison,
        left: Operand,
        right: Operand,
    },
    CrossesAbove {
        left: Operand,
        right: Operand,
    },
    CrossesBelow {
        left: Operand,
        right: Operand,
    },
    Rising(Operand),
    Falling(Operand),
    Between {
        series: Operand,
        lower: Operand,
        upper: Operand,
    },
    NotBetween {
        series: Operand,
        lower: Operand,
        upper: Operand,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionGroup {
    pub logic: GroupLogic,
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub signal_type: SignalType,
    pub strength: i32,
    /// Explicit instrument; wins over selection.
    pub instrument: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalRule {
    pub name: String,
    pub group: ConditionGroup,
    pub action: Action,
    pub volatility_threshold: Option<f64>,
}

/// Compilation context shared by every rule of one strategy.
pub struct RuleCompiler<'a> {
    pub definition: &'a StrategyDefinition,
    pub columns: &'a BTreeSet<String>,
    pub catalog: &'a InstrumentCatalog,
}

impl RuleCompiler<'_> {
    pub fn compile_rule(&self, spec: &SignalRuleSpec) -> Result<SignalRule, ConfigurationError> {
        let rule = spec.rule_name.as_str();
        let conditions = spec
            .conditions_group
            .conditions
            .iter()
            .map(|c| self.compile_condition(rule, c))
            .collect::<Result<Vec<_>, _>>()?;

        let volatility_threshold = match spec
            .instrument_selection
            .as_ref()
            .and_then(|s| s.volatility_threshold.as_ref())
        {
            Some(v) => Some(self.definition.resolve_number(v)?.ok_or_else(|| {
                ConfigurationError::InvalidCondition {
                    rule: rule.to_string(),
                    reason: format!("volatility_threshold is not a number: {v:?}"),
                }
            })?),
            None => None,
        };

        Ok(SignalRule {
            name: spec.rule_name.clone(),
            group: ConditionGroup {
                logic: spec.conditions_group.operator,
                conditions,
            },
            action: self.compile_action(&spec.action_on_true, rule)?,
            volatility_threshold,
        })
    }

    pub fn compile_action(
        &self,
        spec: &ActionSpec,
        context: &str,
    ) -> Result<Action, ConfigurationError> {
        if let Some(name) = &spec.instrument_type {
            self.check_instrument(name, context)?;
        }
        Ok(Action {
            signal_type: spec.signal_type,
            strength: spec.strength,
            instrument: spec.instrument_type.clone(),
        })
    }

    pub fn check_instrument(&self, name: &str, context: &str) -> Result<(), ConfigurationError> {
        if self.catalog.contains(name) {
            Ok(())
        } else {
            Err(ConfigurationError::UnknownInstrument {
                name: name.to_string(),
                context: context.to_string(),
            })
        }
    }

    pub fn compile_condition(
        &self,
        rule: &str,
        spec: &ConditionSpec,
    ) -> Result<Condition, ConfigurationError> {
        let series = self.operand(rule, &spec.series1)?;
        let other = || -> Result<Operand, ConfigurationError> {
            let value = spec.series2_or_value.as_ref().ok_or_else(|| {
                ConfigurationError::InvalidCondition {
                    rule: rule.to_string(),
                    reason: format!("operator {:?} needs series2_or_value", spec.operator),
                }
            })?;
            self.operand(rule, value)
        };
        let bounds = || -> Result<(Operand, Operand), ConfigurationError> {
            match (&spec.lower_bound, &spec.upper_bound) {
                (Some(lo), Some(hi)) => Ok((self.operand(rule, lo)?, self.operand(rule, hi)?)),
                _ => Err(ConfigurationError::InvalidCondition {
                    rule: rule.to_string(),
                    reason: format!(
                        "operator {:?} needs both lower_bound and upper_bound",
                        spec.operator
                    ),
                }),
            }
        };
        let compare = |op| -> Result<Condition, ConfigurationError> {
            Ok(Condition::Compare {
                op,
                left: series.clone(),
                right: other()?,
            })
        };

        match spec.operator {
            ConditionOperator::Gt => compare(Comparison::Gt),
            ConditionOperator::Lt => compare(Comparison::Lt),
            ConditionOperator::Ge => compare(Comparison::Ge),
            ConditionOperator::Le => compare(Comparison::Le),
            ConditionOperator::Eq => compare(Comparison::Eq),
            ConditionOperator::Ne => compare(Comparison::Ne),
            ConditionOperator::CrossesAbove => Ok(Condition::CrossesAbove {
                right: other()?,
                left: series,
            }),
            ConditionOperator::CrossesBelow => Ok(Condition::CrossesBelow {
                right: other()?,
                left: series,
            }),
            ConditionOperator::IsRising => Ok(Condition::Rising(series)),
            ConditionOperator::IsFalling => Ok(Condition::Falling(series)),
            ConditionOperator::IsBetween => {
                let (lower, upper) = bounds()?;
                Ok(Condition::Between {
                    series,
                    lower,
                    upper,
                })
            }
            ConditionOperator::IsNotBetween => {
                let (lower, upper) = bounds()?;
                Ok(Condition::NotBetween {
                    series,
                    lower,
                    upper,
                })
            }
        }
    }

    /// Number, numeric text, `@constant`, column name, or `a <op> b` over
    /// those.
    pub fn operand(&self, rule: &str, value: &ValueSpec) -> Result<Operand, ConfigurationError> {
        match value {
            ValueSpec::Number(v) => Ok(Operand::Literal(*v)),
            ValueSpec::Text(text) => {
                let tokens: Vec<&str> = text.split_whitespace().collect();
                match tokens.as_slice() {
                    [atom] => self.atom(rule, atom),
                    [a, op, b] => {
                        let op = ArithOp::parse(op).ok_or_else(|| {
                            ConfigurationError::InvalidCondition {
                                rule: rule.to_string(),
                                reason: format!("unsupported operator '{op}' in '{text}'"),
                            }
                        })?;
                        Ok(Operand::Binary {
                            op,
                            left: Box::new(self.atom(rule, a)?),
                            right: Box::new(self.atom(rule, b)?),
                        })
                    }
                    _ => Err(ConfigurationError::InvalidCondition {
                        rule: rule.to_string(),
                        reason: format!("cannot parse operand '{text}'"),
                    }),
                }
            }
        }
    }

    fn atom(&self, rule: &str, token: &str) -> Result<Operand, ConfigurationError> {
        if let Some(name) = token.strip_prefix('@') {
            return Ok(Operand::Constant {
                name: name.to_string(),
                value: self.definition.constant(name)?,
            });
        }
        if let Ok(v) = token.parse::<f64>() {
            return Ok(Operand::Literal(v));
        }
        if self.columns.contains(token) {
            return Ok(Operand::Column(token.to_string()));
        }
        Err(ConfigurationError::UnknownSeries {
            name: token.to_string(),
            rule: rule.to_string(),
        })
    }
}
