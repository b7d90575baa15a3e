//! Named, bar-aligned columns: OHLCV, indicator outputs and derived
//! estimates, as read by the condition evaluator.

use std::collections::BTreeMap;

use super::error::ConfigurationError;
use super::indicator::{Column, IndicatorDescriptor, IndicatorParams, IndicatorRegistry};
use super::ohlcv::{PriceBar, PriceField};
use super::strategy::{IndicatorSpec, StrategyDefinition, ValueSpec};

pub const EXPECTED_MOVE_COLUMN: &str = "expected_move_pct";
pub const VOLATILITY_COLUMN: &str = "volatility_pct";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesFrame {
    len: usize,
    columns: BTreeMap<String, Column>,
}

impl SeriesFrame {
    pub fn from_bars(bars: &[PriceBar]) -> Self {
        let mut columns = BTreeMap::new();
        for field in PriceField::ALL {
            columns.insert(
                field.name().to_string(),
                bars.iter().map(|b| Some(b.field(field))).collect(),
            );
        }
        Self {
            len: bars.len(),
            columns,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, name: &str, column: Column) -> Result<(), ConfigurationError> {
        if self.columns.contains_key(name) {
            return Err(ConfigurationError::DuplicateColumn {
                column: name.to_string(),
            });
        }
        debug_assert_eq!(column.len(), self.len);
        self.columns.insert(name.to_string(), column);
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Value of `name` at `index`; `None` when the column or value is
    /// undefined.
    pub fn value(&self, name: &str, index: usize) -> Option<f64> {
        self.columns
            .get(name)
            .and_then(|c| c.get(index).copied().flatten())
            .filter(|v| v.is_finite())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }
}

/// A strategy indicator with parameters resolved and output columns named.
#[derive(Debug, Clone)]
pub struct IndicatorPlan {
    pub name: String,
    pub descriptor: IndicatorDescriptor,
    pub params: IndicatorParams,
    /// (component, output column)
    pub outputs: Vec<(String, String)>,
}

impl IndicatorPlan {
    pub fn compile(
        spec: &IndicatorSpec,
        definition: &StrategyDefinition,
        registry: &IndicatorRegistry,
    ) -> Result<Self, ConfigurationError> {
        let descriptor =
            *registry
                .get(&spec.kind)
                .ok_or_else(|| ConfigurationError::UnknownIndicator {
                    indicator: spec.name.clone(),
                    kind: spec.kind.clone(),
                })?;

        let mut params = IndicatorParams::new(&spec.name);
        for (key, value) in &spec.params {
            if key == "column" {
                params = params.with_source(resolve_source(&spec.name, value)?);
                continue;
            }
            match definition.resolve_number(value)? {
                Some(v) => params = params.with(key, v),
                None => {
                    return Err(ConfigurationError::InvalidParameter {
                        indicator: spec.name.clone(),
                        param: key.clone(),
                        reason: format!("not a number: {value:?}"),
                    });
                }
            }
        }

        // empty input surfaces parameter errors before any data is touched
        (descriptor.compute)(&[], &params)?;

        let mut outputs = Vec::new();
        let primary = descriptor.components.first().copied().unwrap_or("value");
        let has_map = !spec.outputs.component_output_map.is_empty();
        match &spec.outputs.primary_output_column {
            Some(column) => outputs.push((primary.to_string(), column.clone())),
            None if !has_map => outputs.push((primary.to_string(), spec.name.clone())),
            None => {}
        }
        for (component, column) in &spec.outputs.component_output_map {
            if !descriptor.components.contains(&component.as_str()) {
                return Err(ConfigurationError::InvalidParameter {
                    indicator: spec.name.clone(),
                    param: "component_output_map".into(),
                    reason: format!(
                        "unknown component '{component}', expected one of {:?}",
                        descriptor.components
                    ),
                });
            }
            outputs.push((component.clone(), column.clone()));
        }

        Ok(Self {
            name: spec.name.clone(),
            descriptor,
            params,
            outputs,
        })
    }

    pub fn output_columns(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().map(|(_, c)| c.as_str())
    }

    pub fn apply(&self, bars: &[PriceBar], frame: &mut SeriesFrame) -> Result<(), ConfigurationError> {
        let output = (self.descriptor.compute)(bars, &self.params)?;
        for (component, column) in &self.outputs {
            let values = output
                .component(component)
                .cloned()
                .unwrap_or_else(|| vec![None; bars.len()]);
            frame.insert(column, values)?;
        }
        Ok(())
    }
}

fn resolve_source(indicator: &str, value: &ValueSpec) -> Result<PriceField, ConfigurationError> {
    let invalid = || ConfigurationError::InvalidParameter {
        indicator: indicator.to_string(),
        param: "column".into(),
        reason: format!("not an OHLCV column: {value:?}"),
    };
    match value {
        ValueSpec::Text(name) => PriceField::parse(name.trim()).ok_or_else(invalid),
        ValueSpec::Number(_) => Err(invalid()),
    }
}

/// Columns feeding the volatility and expected-move estimates.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedInputs {
    pub atr_column: String,
    pub rsi_column: String,
    pub macd_histogram_column: String,
}

/// volatility_pct = atr / close * 100
///
/// expected_move_pct = atr / close * 100 * (1 + (rsi_momentum + tanh(hist / close * 100)) / 2)
/// with rsi_momentum = (rsi - 50) / 50. Without RSI or histogram the estimate
/// falls back to volatility_pct; without ATR it is undefined.
pub fn add_derived_columns(
    frame: &mut SeriesFrame,
    inputs: &DerivedInputs,
) -> Result<(), ConfigurationError> {
    let mut volatility = Vec::with_capacity(frame.len());
    let mut expected = Vec::with_capacity(frame.len());
    for i in 0..frame.len() {
        let close = frame.value("close", i).filter(|c| *c != 0.0);
        let vol = match (frame.value(&inputs.atr_column, i), close) {
            (Some(atr), Some(close)) => Some(atr / close * 100.0),
            _ => None,
        };
        let estimate = vol.map(|vol| {
            let rsi = frame.value(&inputs.rsi_column, i);
            let hist = frame.value(&inputs.macd_histogram_column, i);
            match (rsi, hist, close) {
                (Some(rsi), Some(hist), Some(close)) => {
                    let rsi_momentum = (rsi - 50.0) / 50.0;
                    let macd_momentum = (hist / close * 100.0).tanh();
                    vol * (1.0 + (rsi_momentum + macd_momentum) / 2.0)
                }
                _ => vol,
            }
        });
        volatility.push(vol);
        expected.push(estimate);
    }
    frame.insert(VOLATILITY_COLUMN, volatility)?;
    frame.insert(EXPECTED_MOVE_COLUMN, expected)?;
    Ok(())
}
