//! Strategy compilation and per-bar signal generation.

use std::collections::BTreeSet;

use tracing::info;

use super::error::ConfigurationError;
use super::frame::{
    DerivedInputs, EXPECTED_MOVE_COLUMN, IndicatorPlan, SeriesFrame, VOLATILITY_COLUMN,
    add_derived_columns,
};
use super::indicator::IndicatorRegistry;
use super::instrument::{InstrumentCatalog, InstrumentSelector};
use super::ohlcv::{PriceBar, PriceField};
use super::rule::{Action, RuleCompiler, SignalRule};
use super::rule_eval::first_match;
use super::signal::{SignalEvent, SignalStream};
use super::strategy::{SelectionSettings, StrategyDefinition};

/// A compiled strategy, ready to run over any bar series.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    name: String,
    plans: Vec<IndicatorPlan>,
    rules: Vec<SignalRule>,
    default_action: Action,
    default_instrument: String,
    selector: Option<InstrumentSelector>,
    derived: DerivedInputs,
}

impl RuleEngine {
    pub fn new(definition: &StrategyDefinition) -> Result<Self, ConfigurationError> {
        Self::with_registry(
            definition,
            &IndicatorRegistry::standard(),
            &InstrumentCatalog::standard(),
        )
    }

    pub fn with_registry(
        definition: &StrategyDefinition,
        registry: &IndicatorRegistry,
        catalog: &InstrumentCatalog,
    ) -> Result<Self, ConfigurationError> {
        let mut columns: BTreeSet<String> = PriceField::ALL
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        columns.insert(EXPECTED_MOVE_COLUMN.to_string());
        columns.insert(VOLATILITY_COLUMN.to_string());

        let mut plans = Vec::with_capacity(definition.indicators.len());
        for spec in &definition.indicators {
            let plan = IndicatorPlan::compile(spec, definition, registry)?;
            for column in plan.output_columns() {
                if !columns.insert(column.to_string()) {
                    return Err(ConfigurationError::DuplicateColumn {
                        column: column.to_string(),
                    });
                }
            }
            plans.push(plan);
        }

        let compiler = RuleCompiler {
            definition,
            columns: &columns,
            catalog,
        };
        let rules = definition
            .signal_rules
            .iter()
            .map(|r| compiler.compile_rule(r))
            .collect::<Result<Vec<_>, _>>()?;
        let default_action = compiler.compile_action(&definition.default_action, "default action")?;
        compiler.check_instrument(&definition.default_instrument, "default_instrument")?;

        let settings = definition
            .instrument_selection
            .clone()
            .unwrap_or_else(SelectionSettings::default);
        let selector = definition
            .active_selection()
            .map(|_| InstrumentSelector::new(definition.selection_thresholds()));

        Ok(Self {
            name: definition.name.clone(),
            plans,
            rules,
            default_action,
            default_instrument: definition.default_instrument.clone(),
            selector,
            derived: DerivedInputs {
                atr_column: settings.atr_column,
                rsi_column: settings.rsi_column,
                macd_histogram_column: settings.macd_histogram_column,
            },
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[SignalRule] {
        &self.rules
    }

    /// Every column a condition may reference, in name order.
    pub fn compute_frame(&self, bars: &[PriceBar]) -> Result<SeriesFrame, ConfigurationError> {
        let mut frame = SeriesFrame::from_bars(bars);
        for plan in &self.plans {
            plan.apply(bars, &mut frame)?;
        }
        add_derived_columns(&mut frame, &self.derived)?;
        Ok(frame)
    }

    /// One signal per bar: the first matching rule's action, or the default.
    pub fn generate(&self, bars: &[PriceBar]) -> Result<SignalStream, ConfigurationError> {
        let frame = self.compute_frame(bars)?;
        let events: Vec<SignalEvent> = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| self.event_at(&frame, bar, i))
            .collect();
        let stream = SignalStream::new(events);
        let (calls, puts, neutral) = stream.counts();
        info!(
            strategy = %self.name,
            bars = bars.len(),
            calls,
            puts,
            neutral,
            "signals generated"
        );
        Ok(stream)
    }

    fn event_at(&self, frame: &SeriesFrame, bar: &PriceBar, index: usize) -> SignalEvent {
        let matched = first_match(&self.rules, frame, index);
        let (action, rule_name, threshold) = match matched {
            Some(rule) => (&rule.action, Some(rule.name.clone()), rule.volatility_threshold),
            None => (&self.default_action, None, None),
        };
        let expected_move_pct = frame.value(EXPECTED_MOVE_COLUMN, index);
        let volatility_pct = frame.value(VOLATILITY_COLUMN, index);

        let instrument = action.signal_type.direction().map(|_| {
            if let Some(hint) = &action.instrument {
                hint.clone()
            } else if let Some(selector) = &self.selector {
                selector
                    .select(action.strength, volatility_pct, expected_move_pct, threshold)
                    .to_string()
            } else {
                self.default_instrument.clone()
            }
        });

        SignalEvent {
            timestamp: bar.timestamp,
            bar_index: index,
            signal_type: action.signal_type,
            strength: action.strength,
            instrument,
            rule_name,
            close: bar.close,
            expected_move_pct,
            volatility_pct,
        }
    }
}
