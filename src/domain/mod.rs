//! Core domain types and logic.

pub mod backtest;
pub mod config_validation;
pub mod engine;
pub mod error;
pub mod frame;
pub mod indicator;
pub mod instrument;
pub mod metrics;
pub mod ohlcv;
pub mod optimizer;
pub mod portfolio;
pub mod position;
pub mod rule;
pub mod rule_eval;
pub mod signal;
pub mod strategy;
