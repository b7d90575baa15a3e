//! Parameter sweep over strategy constants.
//!
//! Every combination compiles its own definition and runs its own portfolio,
//! so runs share nothing mutable except the early-stop flag.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use super::backtest::run_backtest;
use super::engine::RuleEngine;
use super::error::ConfigurationError;
use super::indicator::IndicatorRegistry;
use super::instrument::InstrumentCatalog;
use super::metrics::Statistics;
use super::ohlcv::PriceBar;
use super::portfolio::PortfolioConfig;
use super::strategy::StrategyDefinition;

/// Candidate values per constant, ordered by constant name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParameterGrid {
    pub axes: BTreeMap<String, Vec<f64>>,
}

impl ParameterGrid {
    pub fn new(axes: BTreeMap<String, Vec<f64>>) -> Self {
        Self { axes }
    }

    pub fn total_combinations(&self) -> usize {
        if self.axes.is_empty() {
            return 0;
        }
        self.axes.values().map(Vec::len).product()
    }

    /// Cartesian product; the last axis varies fastest.
    pub fn combinations(&self) -> Vec<BTreeMap<String, f64>> {
        if self.axes.is_empty() {
            return Vec::new();
        }
        let mut combos = vec![BTreeMap::new()];
        for (name, values) in &self.axes {
            let mut next = Vec::with_capacity(combos.len() * values.len());
            for combo in &combos {
                for &value in values {
                    let mut c: BTreeMap<String, f64> = combo.clone();
                    c.insert(name.clone(), value);
                    next.push(c);
                }
            }
            combos = next;
        }
        combos
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitnessConfig {
    pub min_apr_pct: f64,
    pub min_win_rate_pct: f64,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            min_apr_pct: 0.0,
            min_win_rate_pct: 40.0,
        }
    }
}

/// Score in [0, 1]. Runs failing the APR or win-rate floor get a fixed
/// low score.
pub fn fitness(stats: &Statistics, config: &FitnessConfig) -> f64 {
    if stats.simple_apr < config.min_apr_pct {
        return 0.15;
    }
    if stats.win_rate < config.min_win_rate_pct {
        return 0.25;
    }
    let apr = ((stats.simple_apr + 50.0) / 100.0).clamp(0.0, 1.0);
    let win_rate = (stats.win_rate / 100.0).min(1.0);
    let sharpe = ((stats.sharpe_ratio + 2.0) / 4.0).clamp(0.0, 1.0);
    let drawdown = (1.0 - stats.max_drawdown_pct / 50.0).max(0.0);
    (0.4 * apr + 0.3 * win_rate + 0.2 * sharpe + 0.1 * drawdown).min(1.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepConfig {
    /// Runs not yet started are skipped once any run reaches this score.
    pub target_fitness: f64,
    /// 0 evaluates every combination.
    pub max_runs: usize,
    pub fitness: FitnessConfig,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            target_fitness: 0.6,
            max_runs: 0,
            fitness: FitnessConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepRun {
    pub index: usize,
    pub constants: BTreeMap<String, f64>,
    pub fitness: f64,
    pub statistics: Statistics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    pub combinations: usize,
    pub evaluated: usize,
    pub skipped: usize,
    pub stopped_early: bool,
    /// Best first; ties keep combination order.
    pub runs: Vec<SweepRun>,
}

impl SweepReport {
    pub fn best(&self) -> Option<&SweepRun> {
        self.runs.first()
    }
}

/// Inputs shared read-only by every run of a sweep.
pub struct SweepContext<'a> {
    pub definition: &'a StrategyDefinition,
    pub bars: &'a [PriceBar],
    pub portfolio: &'a PortfolioConfig,
    pub registry: &'a IndicatorRegistry,
    pub catalog: &'a InstrumentCatalog,
}

impl SweepContext<'_> {
    fn evaluate(
        &self,
        index: usize,
        constants: &BTreeMap<String, f64>,
        fitness_config: &FitnessConfig,
    ) -> Result<SweepRun, ConfigurationError> {
        let definition = self.definition.with_constants(constants);
        let engine = RuleEngine::with_registry(&definition, self.registry, self.catalog)?;
        let signals = engine.generate(self.bars)?;
        let result = run_backtest(self.bars, &signals, self.portfolio, self.catalog);
        let statistics = Statistics::compute(&result.trade_logs, self.portfolio.initial_capital);
        Ok(SweepRun {
            index,
            constants: constants.clone(),
            fitness: fitness(&statistics, fitness_config),
            statistics,
        })
    }
}

pub fn run_sweep(
    context: &SweepContext<'_>,
    grid: &ParameterGrid,
    config: &SweepConfig,
) -> Result<SweepReport, ConfigurationError> {
    let mut combos = grid.combinations();
    if config.max_runs > 0 {
        combos.truncate(config.max_runs);
    }
    let stop = AtomicBool::new(false);

    let mut runs = combos
        .par_iter()
        .enumerate()
        .filter_map(|(index, constants)| {
            if stop.load(Ordering::Relaxed) {
                return None;
            }
            let run = context.evaluate(index, constants, &config.fitness);
            if let Ok(run) = &run {
                if config.target_fitness > 0.0 && run.fitness >= config.target_fitness {
                    stop.store(true, Ordering::Relaxed);
                }
            }
            Some(run)
        })
        .collect::<Result<Vec<_>, _>>()?;

    runs.sort_by(|a, b| {
        b.fitness
            .total_cmp(&a.fitness)
            .then_with(|| a.index.cmp(&b.index))
    });

    let report = SweepReport {
        combinations: combos.len(),
        evaluated: runs.len(),
        skipped: combos.len() - runs.len(),
        stopped_early: stop.load(Ordering::Relaxed),
        runs,
    };
    info!(
        combinations = report.combinations,
        evaluated = report.evaluated,
        stopped_early = report.stopped_early,
        best = report.best().map(|r| r.fitness).unwrap_or(0.0),
        "sweep complete"
    );
    Ok(report)
}
