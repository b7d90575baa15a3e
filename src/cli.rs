//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_data_adapter::JsonDataAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::backtest::{BacktestReport, BacktestResult, run_backtest};
use crate::domain::config_validation::{
    parse_grid, validate_optimizer_config, validate_run_config,
};
use crate::domain::engine::RuleEngine;
use crate::domain::error::OptraderError;
use crate::domain::indicator::IndicatorRegistry;
use crate::domain::instrument::InstrumentCatalog;
use crate::domain::metrics::Statistics;
use crate::domain::ohlcv::{PriceBar, parse_timestamp, validate_series};
use crate::domain::optimizer::{FitnessConfig, SweepConfig, SweepContext, run_sweep};
use crate::domain::portfolio::PortfolioConfig;
use crate::domain::strategy::StrategyDefinition;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "optrader", about = "Declarative option strategy backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Emit the per-bar signal stream without trading it
    Signals {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a strategy document
    Validate {
        #[arg(short, long)]
        strategy: PathBuf,
    },
    /// Sweep strategy constants over the [grid] section
    Optimize {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List symbols available in the data directory
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show data range for symbol(s)
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Backtest {
            config,
            strategy,
            symbol,
            output,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config, &strategy)
            } else {
                run_backtest_command(&config, &strategy, symbol.as_deref(), output.as_deref())
            }
        }
        Command::Signals {
            config,
            strategy,
            symbol,
            output,
        } => run_signals(&config, &strategy, symbol.as_deref(), output.as_deref()),
        Command::Validate { strategy } => run_validate(&strategy),
        Command::Optimize {
            config,
            strategy,
            symbol,
            output,
        } => run_optimize(&config, &strategy, symbol.as_deref(), output.as_deref()),
        Command::ListSymbols { config } => run_list_symbols(&config),
        Command::Info { config, symbol } => run_info(&config, symbol.as_deref()),
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, OptraderError> {
    FileConfigAdapter::from_file(path).map_err(|e| OptraderError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

pub fn load_strategy(path: &Path) -> Result<StrategyDefinition, OptraderError> {
    let content = fs::read_to_string(path).map_err(|e| OptraderError::StrategyParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })?;
    StrategyDefinition::from_json_str(&content, &path.display().to_string())
}

/// Assumes `validate_run_config` has passed.
pub fn build_portfolio_config(config: &dyn ConfigPort) -> PortfolioConfig {
    let d = PortfolioConfig::default();
    PortfolioConfig {
        initial_capital: config.get_double("portfolio", "initial_capital", d.initial_capital),
        premium_per_trade_pct: config.get_double(
            "portfolio",
            "premium_per_trade_pct",
            d.premium_per_trade_pct,
        ),
        max_daily_premium_pct: config.get_double(
            "portfolio",
            "max_daily_premium_pct",
            d.max_daily_premium_pct,
        ),
        max_total_premium_pct: config.get_double(
            "portfolio",
            "max_total_premium_pct",
            d.max_total_premium_pct,
        ),
        max_concurrent_positions: usize::try_from(config.get_int(
            "portfolio",
            "max_concurrent_positions",
            d.max_concurrent_positions as i64,
        ))
        .unwrap_or(d.max_concurrent_positions),
        max_drawdown_pct: config.get_double("portfolio", "max_drawdown_pct", d.max_drawdown_pct),
        recovery_threshold_pct: config.get_double(
            "portfolio",
            "recovery_threshold_pct",
            d.recovery_threshold_pct,
        ),
        min_premium_pct: config.get_double("portfolio", "min_premium_pct", d.min_premium_pct),
        scale_by_strength: config.get_bool("portfolio", "scale_by_strength", d.scale_by_strength),
    }
}

/// Assumes `validate_optimizer_config` has passed.
pub fn build_sweep_config(config: &dyn ConfigPort) -> SweepConfig {
    let d = SweepConfig::default();
    SweepConfig {
        target_fitness: config.get_double("optimizer", "target_fitness", d.target_fitness),
        max_runs: usize::try_from(config.get_int("optimizer", "max_runs", 0)).unwrap_or(0),
        fitness: FitnessConfig {
            min_apr_pct: config.get_double("optimizer", "min_apr_pct", d.fitness.min_apr_pct),
            min_win_rate_pct: config.get_double(
                "optimizer",
                "min_win_rate_pct",
                d.fitness.min_win_rate_pct,
            ),
        },
    }
}

pub fn build_data_port(config: &dyn ConfigPort) -> Result<Box<dyn DataPort>, OptraderError> {
    let path = config
        .get_string("data", "path")
        .map(PathBuf::from)
        .ok_or_else(|| OptraderError::ConfigMissing {
            section: "data".into(),
            key: "path".into(),
        })?;
    match config.get_string("data", "source").as_deref().map(str::trim) {
        Some("json") => Ok(Box::new(JsonDataAdapter::new(path))),
        _ => Ok(Box::new(CsvAdapter::new(path))),
    }
}

pub fn resolve_symbol(
    symbol_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<String, OptraderError> {
    symbol_override
        .map(str::to_string)
        .or_else(|| config.get_string("data", "symbol"))
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| OptraderError::ConfigMissing {
            section: "data".into(),
            key: "symbol".into(),
        })
}

/// Fetch the configured window and reject out-of-order or gapped series.
pub fn load_bars(
    config: &dyn ConfigPort,
    data_port: &dyn DataPort,
    symbol: &str,
) -> Result<Vec<PriceBar>, OptraderError> {
    let start = config
        .get_string("data", "start")
        .and_then(|s| parse_timestamp(&s));
    let end = config
        .get_string("data", "end")
        .and_then(|s| parse_timestamp(&s));
    let bars = data_port.fetch_bars(symbol, start, end)?;
    validate_series(&bars, config.get_int("data", "max_gap_minutes", 0))?;
    Ok(bars)
}

/// Config, strategy, bars and compiled engine for one symbol.
struct Prepared {
    config: FileConfigAdapter,
    definition: StrategyDefinition,
    engine: RuleEngine,
    symbol: String,
    bars: Vec<PriceBar>,
}

fn prepare(
    config_path: &Path,
    strategy_path: &Path,
    symbol_override: Option<&str>,
) -> Result<Prepared, OptraderError> {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let config = load_config(config_path)?;
    validate_run_config(&config)?;

    // Stage 2: Parse and compile strategy
    eprintln!("Loading strategy from {}", strategy_path.display());
    let definition = load_strategy(strategy_path)?;
    let engine = RuleEngine::new(&definition)?;

    // Stage 3: Load bars
    let symbol = resolve_symbol(symbol_override, &config)?;
    let data_port = build_data_port(&config)?;
    let bars = load_bars(&config, data_port.as_ref(), &symbol)?;
    eprintln!("Loaded {} bars for {}", bars.len(), symbol);

    Ok(Prepared {
        config,
        definition,
        engine,
        symbol,
        bars,
    })
}

fn run_backtest_command(
    config_path: &Path,
    strategy_path: &Path,
    symbol_override: Option<&str>,
    output_path: Option<&Path>,
) -> Result<(), OptraderError> {
    let prepared = prepare(config_path, strategy_path, symbol_override)?;
    let portfolio = build_portfolio_config(&prepared.config);
    let catalog = InstrumentCatalog::standard();

    // Stage 4: Signals and backtest
    let signals = prepared.engine.generate(&prepared.bars)?;
    let result = run_backtest(&prepared.bars, &signals, &portfolio, &catalog);

    // Stage 5: Aggregate and summarise
    let statistics = Statistics::compute(&result.trade_logs, portfolio.initial_capital);
    print_summary(&prepared.definition, &prepared.symbol, &statistics, &result);

    // Stage 6: Report
    if let Some(path) = output_path {
        let report = BacktestReport {
            strategy: &prepared.definition.name,
            symbol: &prepared.symbol,
            statistics: &statistics,
            result: &result,
        };
        JsonReportAdapter::new().write_backtest(&report, &path.display().to_string())?;
        eprintln!("\nReport written to: {}", path.display());
    }
    Ok(())
}

pub fn print_summary(
    definition: &StrategyDefinition,
    symbol: &str,
    stats: &Statistics,
    result: &BacktestResult,
) {
    eprintln!("\n=== Backtest Results ===");
    eprintln!("Strategy:         {}", definition.name);
    eprintln!("Symbol:           {}", symbol);
    eprintln!(
        "Capital:          {:.4} -> {:.4} ({:+.2}%)",
        stats.initial_capital, stats.final_capital, stats.total_return_pct
    );
    eprintln!("Trades:           {}", stats.total_trades);
    eprintln!("Win Rate:         {:.1}%", stats.win_rate);
    eprintln!("Net P&L:          {:+.4}", stats.total_pnl);
    eprintln!("Premium Paid:     {:.4}", stats.total_premium);
    eprintln!("Simple APR:       {:.2}%", stats.simple_apr);
    eprintln!("Premium APR:      {:.2}%", stats.premium_efficient_apr);
    eprintln!("Sharpe Ratio:     {:.2}", stats.sharpe_ratio);
    eprintln!("Max Drawdown:     -{:.1}%", stats.max_drawdown_pct);

    if !stats.instrument_stats.is_empty() {
        eprintln!("\n=== Per-Instrument Summary ===");
        for (name, s) in &stats.instrument_stats {
            eprintln!(
                "  {}:  {} trades, {:.1}% win rate, {:+.4} P&L, {:+.1}% avg return on premium",
                name, s.count, s.win_rate, s.total_pnl, s.avg_return_on_premium
            );
        }
    }

    let r = &result.rejections;
    if r.total() > 0 || result.unmatched_signals > 0 {
        eprintln!("\n=== Skipped Signals ===");
        eprintln!("  concurrency cap:      {}", r.concurrency_cap);
        eprintln!("  total budget:         {}", r.total_budget_exhausted);
        eprintln!("  daily budget:         {}", r.daily_budget_exhausted);
        eprintln!("  below min premium:    {}", r.below_minimum_premium);
        eprintln!("  unknown instrument:   {}", r.unknown_instrument);
        eprintln!("  trading halted:       {}", r.trading_halted);
        eprintln!("  unmatched timestamp:  {}", result.unmatched_signals);
    }
}

pub fn run_dry_run(config_path: &Path, strategy_path: &Path) -> Result<(), OptraderError> {
    eprintln!("Loading config from {}", config_path.display());
    let config = load_config(config_path)?;
    validate_run_config(&config)?;
    eprintln!("Config validated successfully");

    let definition = load_strategy(strategy_path)?;
    let engine = RuleEngine::new(&definition)?;
    describe_strategy(&definition, &engine);

    let portfolio = build_portfolio_config(&config);
    eprintln!("\nPortfolio:");
    eprintln!("  initial capital:  {}", portfolio.initial_capital);
    eprintln!(
        "  premium/trade:    {}% (daily {}%, total {}%)",
        portfolio.premium_per_trade_pct,
        portfolio.max_daily_premium_pct,
        portfolio.max_total_premium_pct
    );
    eprintln!(
        "  max positions:    {}",
        portfolio.max_concurrent_positions
    );
    eprintln!(
        "  circuit breaker:  halt past {}% drawdown, resume at {}% of peak",
        portfolio.max_drawdown_pct, portfolio.recovery_threshold_pct
    );

    eprintln!("\nDry run complete: configuration is valid");
    Ok(())
}

fn describe_strategy(definition: &StrategyDefinition, engine: &RuleEngine) {
    eprintln!("\nStrategy: {}", definition.name);
    if !definition.description.is_empty() {
        eprintln!("  {}", definition.description);
    }
    eprintln!("\nIndicators:");
    for spec in &definition.indicators {
        eprintln!("  {} ({})", spec.name, spec.kind);
    }
    eprintln!("\nRules (first match wins):");
    for rule in engine.rules() {
        eprintln!(
            "  {}: {} condition(s) -> {:?} {}",
            rule.name,
            rule.group.conditions.len(),
            rule.action.signal_type,
            rule.action.strength
        );
    }
    eprintln!(
        "\nInstrument selection: {}",
        if definition.active_selection().is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );
}

fn run_signals(
    config_path: &Path,
    strategy_path: &Path,
    symbol_override: Option<&str>,
    output_path: Option<&Path>,
) -> Result<(), OptraderError> {
    let prepared = prepare(config_path, strategy_path, symbol_override)?;
    let signals = prepared.engine.generate(&prepared.bars)?;
    let (calls, puts, neutral) = signals.counts();
    eprintln!(
        "{} signals: {} CALL, {} PUT, {} neutral",
        signals.len(),
        calls,
        puts,
        neutral
    );
    match output_path {
        Some(path) => {
            JsonReportAdapter::new().write_signals(&signals, &path.display().to_string())?;
            eprintln!("Signals written to: {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&signals.events)?),
    }
    Ok(())
}

fn run_validate(strategy_path: &Path) -> Result<(), OptraderError> {
    eprintln!("Validating strategy: {}", strategy_path.display());
    let definition = load_strategy(strategy_path)?;
    let engine = RuleEngine::new(&definition)?;
    describe_strategy(&definition, &engine);
    eprintln!("\nStrategy is valid.");
    Ok(())
}

fn run_optimize(
    config_path: &Path,
    strategy_path: &Path,
    symbol_override: Option<&str>,
    output_path: Option<&Path>,
) -> Result<(), OptraderError> {
    let prepared = prepare(config_path, strategy_path, symbol_override)?;
    validate_optimizer_config(&prepared.config)?;
    let grid = parse_grid(&prepared.config)?;
    let sweep = build_sweep_config(&prepared.config);
    let portfolio = build_portfolio_config(&prepared.config);
    let registry = IndicatorRegistry::standard();
    let catalog = InstrumentCatalog::standard();

    eprintln!(
        "Sweeping {} combinations over {}",
        grid.total_combinations(),
        grid.axes.keys().cloned().collect::<Vec<_>>().join(", ")
    );
    let context = SweepContext {
        definition: &prepared.definition,
        bars: &prepared.bars,
        portfolio: &portfolio,
        registry: &registry,
        catalog: &catalog,
    };
    let report = run_sweep(&context, &grid, &sweep)?;

    eprintln!("\n=== Sweep Results ===");
    eprintln!(
        "Evaluated {} of {} ({} skipped{})",
        report.evaluated,
        report.combinations,
        report.skipped,
        if report.stopped_early {
            ", target reached"
        } else {
            ""
        }
    );
    for run in report.runs.iter().take(5) {
        let constants: Vec<String> = run
            .constants
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        eprintln!(
            "  fitness {:.3}  APR {:.1}%  win {:.1}%  trades {}  [{}]",
            run.fitness,
            run.statistics.simple_apr,
            run.statistics.win_rate,
            run.statistics.total_trades,
            constants.join(", ")
        );
    }

    if let Some(path) = output_path {
        JsonReportAdapter::new().write_sweep(&report, &path.display().to_string())?;
        eprintln!("\nSweep report written to: {}", path.display());
    }
    Ok(())
}

fn run_list_symbols(config_path: &Path) -> Result<(), OptraderError> {
    let config = load_config(config_path)?;
    let data_port = build_data_port(&config)?;
    let symbols = data_port.list_symbols()?;
    if symbols.is_empty() {
        eprintln!("No symbols found");
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    Ok(())
}

fn run_info(config_path: &Path, symbol: Option<&str>) -> Result<(), OptraderError> {
    let config = load_config(config_path)?;
    let data_port = build_data_port(&config)?;
    let symbols = match symbol {
        Some(s) => vec![s.to_string()],
        None => data_port.list_symbols()?,
    };
    for s in &symbols {
        match data_port.get_data_range(s)? {
            Some((first, last, count)) => println!("{}: {} bars, {} to {}", s, count, first, last),
            None => eprintln!("{}: no data found", s),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn portfolio_defaults() {
        let c = build_portfolio_config(&config("[data]\npath = d\n"));
        assert_eq!(c, PortfolioConfig::default());
    }

    #[test]
    fn portfolio_overrides() {
        let c = build_portfolio_config(&config(
            "[portfolio]\ninitial_capital = 50\nmax_concurrent_positions = 3\nscale_by_strength = false\n",
        ));
        assert_eq!(c.initial_capital, 50.0);
        assert_eq!(c.max_concurrent_positions, 3);
        assert!(!c.scale_by_strength);
    }

    #[test]
    fn sweep_config_from_ini() {
        let s = build_sweep_config(&config(
            "[optimizer]\ntarget_fitness = 0.7\nmax_runs = 12\nmin_win_rate_pct = 50\n",
        ));
        assert_eq!(s.target_fitness, 0.7);
        assert_eq!(s.max_runs, 12);
        assert_eq!(s.fitness.min_win_rate_pct, 50.0);
        assert_eq!(s.fitness.min_apr_pct, 0.0);
    }

    #[test]
    fn symbol_override_wins() {
        let c = config("[data]\nsymbol = ETH\n");
        assert_eq!(resolve_symbol(Some("BTC"), &c).unwrap(), "BTC");
        assert_eq!(resolve_symbol(None, &c).unwrap(), "ETH");
        assert!(matches!(
            resolve_symbol(None, &config("[data]\n")),
            Err(OptraderError::ConfigMissing { .. })
        ));
    }
}
