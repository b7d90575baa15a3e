//! Run configuration validation.
//!
//! Every key is checked before a run starts. Missing keys take their
//! defaults; present keys must be in range.

use std::collections::BTreeMap;

use crate::domain::error::OptraderError;
use crate::domain::ohlcv::parse_timestamp;
use crate::domain::optimizer::ParameterGrid;
use crate::ports::config_port::ConfigPort;

fn invalid(section: &str, key: &str, reason: &str) -> OptraderError {
    OptraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

pub fn validate_run_config(config: &dyn ConfigPort) -> Result<(), OptraderError> {
    validate_portfolio_config(config)?;
    validate_data_config(config)?;
    Ok(())
}

pub fn validate_portfolio_config(config: &dyn ConfigPort) -> Result<(), OptraderError> {
    validate_initial_capital(config)?;
    for (key, default) in [
        ("premium_per_trade_pct", 5.0),
        ("max_daily_premium_pct", 15.0),
        ("max_total_premium_pct", 30.0),
        ("max_drawdown_pct", 25.0),
        ("recovery_threshold_pct", 85.0),
    ] {
        validate_percentage(config, key, default)?;
    }
    validate_min_premium(config)?;
    validate_max_concurrent(config)?;
    validate_recovery_hysteresis(config)?;
    Ok(())
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), OptraderError> {
    let value = config.get_double("portfolio", "initial_capital", 10.0);
    if value <= 0.0 {
        return Err(invalid(
            "portfolio",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_percentage(config: &dyn ConfigPort, key: &str, default: f64) -> Result<(), OptraderError> {
    let value = config.get_double("portfolio", key, default);
    if value <= 0.0 || value > 100.0 {
        return Err(invalid(
            "portfolio",
            key,
            &format!("{key} must be in (0, 100]"),
        ));
    }
    Ok(())
}

fn validate_min_premium(config: &dyn ConfigPort) -> Result<(), OptraderError> {
    let value = config.get_double("portfolio", "min_premium_pct", 0.1);
    if !(0.0..100.0).contains(&value) {
        return Err(invalid(
            "portfolio",
            "min_premium_pct",
            "min_premium_pct must be in [0, 100)",
        ));
    }
    Ok(())
}

fn validate_max_concurrent(config: &dyn ConfigPort) -> Result<(), OptraderError> {
    let value = config.get_int("portfolio", "max_concurrent_positions", 10);
    if value < 1 {
        return Err(invalid(
            "portfolio",
            "max_concurrent_positions",
            "max_concurrent_positions must be at least 1",
        ));
    }
    Ok(())
}

/// Resuming must require a smaller drawdown than the one that halted.
fn validate_recovery_hysteresis(config: &dyn ConfigPort) -> Result<(), OptraderError> {
    let max_dd = config.get_double("portfolio", "max_drawdown_pct", 25.0);
    let recovery = config.get_double("portfolio", "recovery_threshold_pct", 85.0);
    if recovery <= 100.0 - max_dd {
        return Err(invalid(
            "portfolio",
            "recovery_threshold_pct",
            "recovery_threshold_pct must exceed 100 - max_drawdown_pct",
        ));
    }
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), OptraderError> {
    validate_source(config)?;
    validate_path(config)?;
    validate_window(config)?;
    validate_max_gap(config)?;
    Ok(())
}

fn validate_source(config: &dyn ConfigPort) -> Result<(), OptraderError> {
    match config.get_string("data", "source").as_deref().map(str::trim) {
        None | Some("csv") | Some("json") => Ok(()),
        Some(other) => Err(invalid(
            "data",
            "source",
            &format!("unsupported source '{other}', expected csv or json"),
        )),
    }
}

fn validate_path(config: &dyn ConfigPort) -> Result<(), OptraderError> {
    match config.get_string("data", "path") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(OptraderError::ConfigMissing {
            section: "data".to_string(),
            key: "path".to_string(),
        }),
    }
}

fn validate_window(config: &dyn ConfigPort) -> Result<(), OptraderError> {
    let mut bounds = Vec::new();
    for key in ["start", "end"] {
        if let Some(text) = config.get_string("data", key) {
            let ts = parse_timestamp(&text).ok_or_else(|| {
                invalid(
                    "data",
                    key,
                    &format!("invalid {key} timestamp, expected YYYY-MM-DD[THH:MM:SS]"),
                )
            })?;
            bounds.push(ts);
        }
    }
    if let [start, end] = bounds.as_slice() {
        if start >= end {
            return Err(invalid("data", "start", "start must be before end"));
        }
    }
    Ok(())
}

fn validate_max_gap(config: &dyn ConfigPort) -> Result<(), OptraderError> {
    if config.get_int("data", "max_gap_minutes", 0) < 0 {
        return Err(invalid(
            "data",
            "max_gap_minutes",
            "max_gap_minutes must be non-negative",
        ));
    }
    Ok(())
}

pub fn validate_optimizer_config(config: &dyn ConfigPort) -> Result<(), OptraderError> {
    let target = config.get_double("optimizer", "target_fitness", 0.6);
    if !(0.0..=1.0).contains(&target) {
        return Err(invalid(
            "optimizer",
            "target_fitness",
            "target_fitness must be between 0 and 1",
        ));
    }
    if config.get_int("optimizer", "max_runs", 0) < 0 {
        return Err(invalid(
            "optimizer",
            "max_runs",
            "max_runs must be non-negative",
        ));
    }
    let win_rate = config.get_double("optimizer", "min_win_rate_pct", 40.0);
    if !(0.0..=100.0).contains(&win_rate) {
        return Err(invalid(
            "optimizer",
            "min_win_rate_pct",
            "min_win_rate_pct must be between 0 and 100",
        ));
    }
    Ok(())
}

/// `[grid]` as sweep axes: `<constant> = v1, v2, ...`.
pub fn parse_grid(config: &dyn ConfigPort) -> Result<ParameterGrid, OptraderError> {
    let mut axes = BTreeMap::new();
    for key in config.keys("grid") {
        let text = config.get_string("grid", &key).unwrap_or_default();
        let values = text
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| {
                v.parse::<f64>()
                    .map_err(|_| invalid("grid", &key, &format!("'{v}' is not a number")))
            })
            .collect::<Result<Vec<f64>, _>>()?;
        if values.is_empty() {
            return Err(invalid("grid", &key, "no candidate values"));
        }
        axes.insert(key, values);
    }
    if axes.is_empty() {
        return Err(OptraderError::ConfigMissing {
            section: "grid".to_string(),
            key: "<constant>".to_string(),
        });
    }
    Ok(ParameterGrid::new(axes))
}
