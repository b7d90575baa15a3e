//! Technical indicator library.
//!
//! Every indicator is a pure function over the full bar series returning one
//! or more named component columns. A column holds `None` wherever the value
//! is undefined (lookback not yet filled, degenerate division); callers never
//! see sentinel numbers.
//!
//! Indicators are looked up by type name through [`IndicatorRegistry`], so a
//! new indicator is one [`IndicatorRegistry::register`] call.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod obv;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod stochastic;

use std::collections::{BTreeMap, HashMap};

use crate::domain::error::ConfigurationError;
use crate::domain::ohlcv::{PriceBar, PriceField};

/// One value per bar, aligned with the bar series.
pub type Column = Vec<Option<f64>>;

/// Resolved numeric parameters for a single indicator instance.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorParams {
    indicator: String,
    values: BTreeMap<String, f64>,
    source: PriceField,
}

impl IndicatorParams {
    pub fn new(indicator: &str) -> Self {
        Self {
            indicator: indicator.to_string(),
            values: BTreeMap::new(),
            source: PriceField::Close,
        }
    }

    pub fn with(mut self, key: &str, value: f64) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }

    pub fn with_source(mut self, source: PriceField) -> Self {
        self.source = source;
        self
    }

    pub fn source(&self) -> PriceField {
        self.source
    }

    pub fn number(&self, key: &str, default: f64) -> f64 {
        self.values.get(key).copied().unwrap_or(default)
    }

    /// A lookback length: a positive whole number.
    pub fn period(&self, key: &str, default: usize) -> Result<usize, ConfigurationError> {
        let Some(&raw) = self.values.get(key) else {
            return Ok(default);
        };
        if !raw.is_finite() || raw < 1.0 || raw.fract() != 0.0 {
            return Err(self.invalid(key, format!("expected a positive integer, got {raw}")));
        }
        Ok(raw as usize)
    }

    pub fn invalid(&self, key: &str, reason: String) -> ConfigurationError {
        ConfigurationError::InvalidParameter {
            indicator: self.indicator.clone(),
            param: key.to_string(),
            reason,
        }
    }
}

/// Named component columns produced by one indicator. The first component is
/// the primary output.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorOutput {
    pub components: Vec<(&'static str, Column)>,
}

impl IndicatorOutput {
    pub fn single(column: Column) -> Self {
        Self {
            components: vec![("value", column)],
        }
    }

    pub fn primary(&self) -> Option<&Column> {
        self.components.first().map(|(_, c)| c)
    }

    pub fn component(&self, name: &str) -> Option<&Column> {
        self.components
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, c)| c)
    }
}

pub type IndicatorFn =
    fn(&[PriceBar], &IndicatorParams) -> Result<IndicatorOutput, ConfigurationError>;

#[derive(Debug, Clone, Copy)]
pub struct IndicatorDescriptor {
    pub compute: IndicatorFn,
    pub components: &'static [&'static str],
}

#[derive(Debug, Clone, Default)]
pub struct IndicatorRegistry {
    entries: HashMap<String, IndicatorDescriptor>,
}

impl IndicatorRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry with every built-in indicator.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register("sma", &["value"], sma::compute);
        registry.register("ema", &["value"], ema::compute);
        registry.register("rsi", &["value"], rsi::compute);
        registry.register("rsi_wilder", &["value"], rsi::compute_wilder);
        registry.register("macd", macd::COMPONENTS, macd::compute);
        registry.register("atr", &["value"], atr::compute);
        registry.register("bollinger", bollinger::COMPONENTS, bollinger::compute);
        registry.register("bbands", bollinger::COMPONENTS, bollinger::compute);
        registry.register("stochastic", stochastic::COMPONENTS, stochastic::compute);
        registry.register("stoch", stochastic::COMPONENTS, stochastic::compute);
        registry.register("obv", &["value"], obv::compute);
        registry
    }

    pub fn register(
        &mut self,
        name: &str,
        components: &'static [&'static str],
        compute: IndicatorFn,
    ) {
        self.entries.insert(
            name.to_ascii_lowercase(),
            IndicatorDescriptor {
                compute,
                components,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&IndicatorDescriptor> {
        self.entries.get(&name.to_ascii_lowercase())
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Rolling mean over a column; a window containing any undefined value is
/// undefined.
pub fn rolling_mean(column: &[Option<f64>], period: usize) -> Column {
    let mut out = vec![None; column.len()];
    if period == 0 {
        return out;
    }
    for i in (period - 1)..column.len() {
        let window = &column[i + 1 - period..=i];
        let mut sum = 0.0;
        let mut complete = true;
        for v in window {
            match v {
                Some(x) => sum += x,
                None => {
                    complete = false;
                    break;
                }
            }
        }
        if complete {
            out[i] = Some(sum / period as f64);
        }
    }
    out
}

pub(crate) fn source_values(bars: &[PriceBar], field: PriceField) -> Vec<f64> {
    bars.iter().map(|b| b.field(field)).collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_has_builtins() {
        let registry = IndicatorRegistry::standard();
        for name in ["sma", "ema", "rsi", "macd", "atr", "bollinger", "stochastic", "obv"] {
            assert!(registry.get(name).is_some(), "missing {name}");
        }
        assert!(registry.get("RSI").is_some());
        assert!(registry.get("vwap").is_none());
    }

    #[test]
    fn register_adds_new_type() {
        fn always_one(
            bars: &[PriceBar],
            _: &IndicatorParams,
        ) -> Result<IndicatorOutput, ConfigurationError> {
            Ok(IndicatorOutput::single(vec![Some(1.0); bars.len()]))
        }

        let mut registry = IndicatorRegistry::empty();
        registry.register("one", &["value"], always_one);
        let bars = test_support::bars_from_closes(&[1.0, 2.0]);
        let out = (registry.get("one").unwrap().compute)(&bars, &IndicatorParams::new("x")).unwrap();
        assert_eq!(out.primary().unwrap(), &vec![Some(1.0), Some(1.0)]);
        assert_eq!(registry.names(), vec!["one"]);
    }

    #[test]
    fn period_validation() {
        let params = IndicatorParams::new("rsi_fast")
            .with("length", 14.0)
            .with("bad", 2.5)
            .with("zero", 0.0);
        assert_eq!(params.period("length", 3).unwrap(), 14);
        assert_eq!(params.period("missing", 3).unwrap(), 3);
        assert!(matches!(
            params.period("bad", 3),
            Err(ConfigurationError::InvalidParameter { .. })
        ));
        assert!(params.period("zero", 3).is_err());
    }

    #[test]
    fn rolling_mean_skips_undefined_windows() {
        let col = vec![None, Some(2.0), Some(4.0), Some(6.0)];
        let out = rolling_mean(&col, 2);
        assert_eq!(out, vec![None, None, Some(3.0), Some(5.0)]);
    }

    #[test]
    fn output_component_lookup() {
        let out = IndicatorOutput {
            components: vec![("k", vec![Some(1.0)]), ("d", vec![None])],
        };
        assert_eq!(out.primary(), Some(&vec![Some(1.0)]));
        assert_eq!(out.component("d"), Some(&vec![None]));
        assert!(out.component("x").is_none());
    }
}
