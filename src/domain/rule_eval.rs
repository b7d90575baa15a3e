//! Condition evaluation against a [`SeriesFrame`].
//!
//! # Evaluation semantics
//!
//! - Any undefined operand makes a condition false.
//! - `crosses_above` / `crosses_below` and `is_rising` / `is_falling` read
//!   the previous bar and are false at index 0.
//! - A group evaluates every condition, then combines them with AND / OR.
//!   An empty group never fires.

use super::frame::SeriesFrame;
use super::rule::{Comparison, Condition, ConditionGroup, Operand, SignalRule};
use super::strategy::GroupLogic;

const EPSILON: f64 = 1e-9;

pub fn resolve_operand(operand: &Operand, frame: &SeriesFrame, index: usize) -> Option<f64> {
    match operand {
        Operand::Literal(v) => Some(*v),
        Operand::Constant { value, .. } => Some(*value),
        Operand::Column(name) => frame.value(name, index),
        Operand::Binary { op, left, right } => {
            let a = resolve_operand(left, frame, index)?;
            let b = resolve_operand(right, frame, index)?;
            op.apply(a, b).filter(|v| v.is_finite())
        }
    }
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= EPSILON * a.abs().max(b.abs()).max(1.0)
}

fn pair(left: &Operand, right: &Operand, frame: &SeriesFrame, index: usize) -> Option<(f64, f64)> {
    Some((
        resolve_operand(left, frame, index)?,
        resolve_operand(right, frame, index)?,
    ))
}

pub fn evaluate_condition(condition: &Condition, frame: &SeriesFrame, index: usize) -> bool {
    match condition {
        Condition::Compare { op, left, right } => {
            let Some((a, b)) = pair(left, right, frame, index) else {
                return false;
            };
            match op {
                Comparison::Gt => a > b,
                Comparison::Lt => a < b,
                Comparison::Ge => a >= b,
                Comparison::Le => a <= b,
                Comparison::Eq => approx_eq(a, b),
                Comparison::Ne => !approx_eq(a, b),
            }
        }
        Condition::CrossesAbove { left, right } => {
            if index == 0 {
                return false;
            }
            match (
                pair(left, right, frame, index - 1),
                pair(left, right, frame, index),
            ) {
                (Some((pa, pb)), Some((a, b))) => pa <= pb && a > b,
                _ => false,
            }
        }
        Condition::CrossesBelow { left, right } => {
            if index == 0 {
                return false;
            }
            match (
                pair(left, right, frame, index - 1),
                pair(left, right, frame, index),
            ) {
                (Some((pa, pb)), Some((a, b))) => pa >= pb && a < b,
                _ => false,
            }
        }
        Condition::Rising(series) | Condition::Falling(series) => {
            if index == 0 {
                return false;
            }
            let (Some(prev), Some(curr)) = (
                resolve_operand(series, frame, index - 1),
                resolve_operand(series, frame, index),
            ) else {
                return false;
            };
            if matches!(condition, Condition::Rising(_)) {
                curr > prev
            } else {
                curr < prev
            }
        }
        Condition::Between {
            series,
            lower,
            upper,
        } => in_range(series, lower, upper, frame, index).unwrap_or(false),
        Condition::NotBetween {
            series,
            lower,
            upper,
        } => in_range(series, lower, upper, frame, index).is_some_and(|inside| !inside),
    }
}

fn in_range(
    series: &Operand,
    lower: &Operand,
    upper: &Operand,
    frame: &SeriesFrame,
    index: usize,
) -> Option<bool> {
    let v = resolve_operand(series, frame, index)?;
    let lo = resolve_operand(lower, frame, index)?;
    let hi = resolve_operand(upper, frame, index)?;
    Some(v >= lo && v <= hi)
}

pub fn evaluate_group(group: &ConditionGroup, frame: &SeriesFrame, index: usize) -> bool {
    if group.conditions.is_empty() {
        return false;
    }
    let results: Vec<bool> = group
        .conditions
        .iter()
        .map(|c| evaluate_condition(c, frame, index))
        .collect();
    match group.logic {
        GroupLogic::And => results.iter().all(|r| *r),
        GroupLogic::Or => results.iter().any(|r| *r),
    }
}

/// First rule, in definition order, whose group holds at `index`.
pub fn first_match<'r>(
    rules: &'r [SignalRule],
    frame: &SeriesFrame,
    index: usize,
) -> Option<&'r SignalRule> {
    rules.iter().find(|r| evaluate_group(&r.group, frame, index))
}
