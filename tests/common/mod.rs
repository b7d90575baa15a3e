#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use optrader::domain::error::OptraderError;
pub use optrader::domain::ohlcv::PriceBar;
use optrader::domain::portfolio::PortfolioConfig;
use optrader::domain::signal::{SignalEvent, SignalStream, SignalType};
use optrader::domain::strategy::StrategyDefinition;
use optrader::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> Result<Vec<PriceBar>, OptraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(OptraderError::DataFormat {
                reason: reason.clone(),
            });
        }
        let bars: Vec<PriceBar> = self
            .data
            .get(symbol)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|b| start.is_none_or(|s| b.timestamp >= s))
            .filter(|b| end.is_none_or(|e| b.timestamp <= e))
            .collect();
        if bars.is_empty() {
            return Err(OptraderError::NoData {
                symbol: symbol.to_string(),
            });
        }
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, OptraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDateTime, NaiveDateTime, usize)>, OptraderError> {
        match self.data.get(symbol) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.timestamp).min().unwrap();
                let max = bars.iter().map(|b| b.timestamp).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

pub fn ts(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

pub fn make_bar(timestamp: NaiveDateTime, close: f64) -> PriceBar {
    PriceBar {
        timestamp,
        open: close,
        high: close * 1.01,
        low: close * 0.99,
        close,
        volume: 1000.0,
    }
}

/// One bar per day at 09:00 from 2024-03-01.
pub fn daily_bars(closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(ts(1, 9) + Duration::days(i as i64), c))
        .collect()
}

/// One bar per hour from 2024-03-01 00:00.
pub fn hourly_bars(closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(ts(1, 0) + Duration::hours(i as i64), c))
        .collect()
}

pub fn signal_at(bar: &PriceBar, signal_type: SignalType, strength: i32, instrument: &str) -> SignalEvent {
    SignalEvent {
        timestamp: bar.timestamp,
        bar_index: 0,
        signal_type,
        strength,
        instrument: Some(instrument.to_string()),
        rule_name: Some("test".into()),
        close: bar.close,
        expected_move_pct: None,
        volatility_pct: None,
    }
}

pub fn stream(events: Vec<SignalEvent>) -> SignalStream {
    SignalStream::new(events)
}

/// Budget limits loose enough that only the limit under test binds.
pub fn loose_config() -> PortfolioConfig {
    PortfolioConfig {
        premium_per_trade_pct: 5.0,
        max_daily_premium_pct: 100.0,
        max_total_premium_pct: 100.0,
        scale_by_strength: false,
        ..PortfolioConfig::default()
    }
}

/// Close/SMA crossover strategy: CALL on an upward cross, PUT on a
/// downward cross, with the SMA length held in a constant.
pub const CROSSOVER_STRATEGY: &str = r#"{
    "name": "sma_crossover",
    "description": "close against a short moving average",
    "constants": {"sma_length": 3},
    "indicators": [
        {"name": "sma", "type": "sma", "params": {"length": "@sma_length"},
         "outputs": {"primary_output_column": "sma_line"}}
    ],
    "signal_rules": [
        {"rule_name": "cross_up", "conditions_group": {"operator": "AND", "conditions": [
            {"series1": "close", "operator": "crosses_above", "series2_or_value": "sma_line"}]},
         "action_on_true": {"signal_type": "CALL", "strength": 8, "instrument_type": "3D_5PCT"}},
        {"rule_name": "cross_down", "conditions_group": {"operator": "AND", "conditions": [
            {"series1": "close", "operator": "crosses_below", "series2_or_value": "sma_line"}]},
         "action_on_true": {"signal_type": "PUT", "strength": -8, "instrument_type": "3D_5PCT"}}
    ]
}"#;

pub fn crossover_strategy() -> StrategyDefinition {
    StrategyDefinition::from_json_str(CROSSOVER_STRATEGY, "crossover").unwrap()
}

/// Deterministic zig-zag with an upward drift, long enough to produce
/// crossings in both directions.
pub fn zigzag_closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let swing = if (i / 3) % 2 == 0 { 4.0 } else { -4.0 };
            100.0 + i as f64 * 0.2 + swing * ((i % 3) as f64)
        })
        .collect()
}

pub fn valid_ini(data_path: &str) -> String {
    format!(
        "\
[data]
source = csv
path = {data_path}
symbol = ETH
max_gap_minutes = 0

[portfolio]
initial_capital = 10.0
premium_per_trade_pct = 5.0
max_daily_premium_pct = 15.0
max_total_premium_pct = 30.0
max_concurrent_positions = 10
max_drawdown_pct = 25.0
recovery_threshold_pct = 85.0
min_premium_pct = 0.1
scale_by_strength = true

[optimizer]
target_fitness = 0
max_runs = 0

[grid]
sma_length = 2, 3, 4
"
    )
}

pub fn csv_from_bars(bars: &[PriceBar]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.timestamp.format("%Y-%m-%dT%H:%M:%S"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    out
}
