//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::{CsvAdapter, file_stem};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::adaptive::{select_best, survey_regimes};
use crate::domain::backtest::{BacktestConfig, BacktestResult, run_backtest};
use crate::domain::config_validation::{
    adaptive_config, backtest_config, data_settings, decision_config, regime_config, validate_backtest_config,
    validate_decision_config, validate_strategy_config,
};
use crate::domain::decision::{AgentOutput, Decision, DecisionAggregator, DecisionConfig};
use crate::domain::error::{SigtraderError, StrategyError};
use crate::domain::ohlcv::{BarSeries, Interval};
use crate::domain::position::Direction;
use crate::domain::regime::{MarketRegime, RegimeConfig, RegimeDetector};
use crate::domain::strategies::{self, BoxedStrategy, StrategyKind};
use crate::domain::technical_signal::{SignalSource, TechnicalSignal};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

const DEFAULT_SYMBOL: &str = "UNKNOWN";

#[derive(Parser, Debug)]
#[command(name = "sigtrader", about = "Strategy backtester and signal aggregator")]
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
        /// CSV file, or a directory of <SYMBOL>.csv files
        #[arg(short, long, required_unless_present = "dry_run")]
        data: Option<PathBuf>,
        #[arg(short, long)]
        strategy: Option<PathBuf>,
        /// Write the full result as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Run several strategies over the same data in parallel
    Compare {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        /// Comma-separated strategy names (default: all)
        #[arg(long, value_delimiter = ',')]
        strategies: Vec<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Pick the best strategy suited to the dominant market regime
    Adaptive {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        /// Comma-separated strategy names (default: all)
        #[arg(long, value_delimiter = ',')]
        strategies: Vec<String>,
        /// Write the selected result as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a strategy configuration
    Validate {
        #[arg(short, long)]
        strategy: PathBuf,
    },
    /// Combine signal outputs into a trading decision
    Decide {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// name=signal:confidence, repeatable
        #[arg(long = "signal", required = true)]
        signals: Vec<String>,
        #[arg(long)]
        regime: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Technical signal, regime and decision for the latest bar
    Analyze {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        data: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// List the built-in strategies
    Strategies,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data,
            strategy,
            output,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config, strategy.as_ref(), data.as_ref())
            } else {
                match data {
                    Some(data) => {
                        run_backtest_command(&config, &data, strategy.as_ref(), output.as_ref())
                    }
                    None => {
                        eprintln!("error: --data is required");
                        ExitCode::from(2)
                    }
                }
            }
        }
        Command::Compare {
            config,
            data,
            strategies,
            output,
        } => run_compare(&config, &data, &strategies, output.as_ref()),
        Command::Adaptive {
            config,
            data,
            strategies,
            output,
        } => run_adaptive(&config, &data, &strategies, output.as_ref()),
        Command::Validate { strategy } => run_validate(&strategy),
        Command::Decide {
            config,
            signals,
            regime,
            json,
        } => run_decide(config.as_ref(), &signals, regime.as_deref(), json),
        Command::Analyze { config, data, json } => run_analyze(config.as_ref(), &data, json),
        Command::Strategies => run_strategies(),
    }
}

fn fail(err: &SigtraderError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(err)
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| fail(&err))
}

/// Strategy parameters come from `--strategy` when given, else from the main config.
fn load_strategy_source(
    adapter: FileConfigAdapter,
    strategy_path: Option<&PathBuf>,
) -> Result<FileConfigAdapter, ExitCode> {
    match strategy_path {
        Some(path) => {
            eprintln!("Loading strategy from {}", path.display());
            load_config(path)
        }
        None => Ok(adapter),
    }
}

/// Symbol from `[backtest] symbol`, else the data file name.
pub fn resolve_symbol(config: Option<&dyn ConfigPort>, data_path: &Path) -> Result<String, SigtraderError> {
    let configured = match config {
        Some(config) => data_settings(config)?.symbol,
        None => None,
    };
    Ok(configured
        .or_else(|| (!data_path.is_dir()).then(|| file_stem(data_path)).flatten())
        .unwrap_or_else(|| DEFAULT_SYMBOL.to_string()))
}

pub fn load_series(
    config: Option<&dyn ConfigPort>,
    data_path: &Path,
) -> Result<BarSeries, SigtraderError> {
    let interval = match config {
        Some(config) => data_settings(config)?.interval,
        None => Interval::Day1,
    };
    let symbol = resolve_symbol(config, data_path)?;
    eprintln!("Loading {} bars for {} from {}", interval, symbol, data_path.display());
    CsvAdapter::new(data_path).fetch_bars(&symbol, interval)
}

fn run_backtest_command(
    config_path: &PathBuf,
    data_path: &Path,
    strategy_path: Option<&PathBuf>,
    output_path: Option<&PathBuf>,
) -> ExitCode {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let bt_config = match backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    // Stage 2: Load data
    let series = match load_series(Some(&adapter), data_path) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    // Stage 3: Build strategy
    let strategy_config = match load_strategy_source(adapter, strategy_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let mut strategy = match strategies::build_strategy(&strategy_config) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    eprintln!("Loading strategy: {}", strategy.name());

    // Stage 4: Run
    eprintln!(
        "Running backtest: {} bars, {} to {}",
        series.len(),
        series.bars().first().map(|b| b.timestamp.to_string()).unwrap_or_default(),
        series.bars().last().map(|b| b.timestamp.to_string()).unwrap_or_default(),
    );
    let result = match run_backtest(&series, strategy.as_mut(), &bt_config) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    // Stage 5: Summary and report
    print_summary(&result);
    if let Some(output) = output_path {
        if let Err(e) = JsonReportAdapter::new().write(&result, output) {
            return fail(&e);
        }
        eprintln!("\nReport written to: {}", output.display());
    }
    ExitCode::SUCCESS
}

fn fmt_opt(value: Option<f64>, precision: usize, suffix: &str) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.precision$}{suffix}"))
}

pub fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    eprintln!("\n=== Results: {} ===", result.strategy_name);
    eprintln!("Symbol:           {} ({})", result.symbol, result.interval);
    eprintln!("Bars:             {}", result.bar_count);
    eprintln!("Final Equity:     {:.2}", result.final_equity());
    eprintln!("Total Return:     {:.2}%", m.total_return_pct);
    eprintln!("Annualized:       {}", fmt_opt(m.annualized_return, 2, "%"));
    eprintln!("Sharpe Ratio:     {}", fmt_opt(m.sharpe_ratio, 2, ""));
    eprintln!("Sortino Ratio:    {}", fmt_opt(m.sortino_ratio, 2, ""));
    eprintln!("Max Drawdown:     -{:.1}%", m.max_drawdown_pct);
    eprintln!("Total Trades:     {}", m.total_trades);
    eprintln!(
        "Win Rate:         {}",
        fmt_opt(m.win_rate.map(|w| w * 100.0), 1, "%")
    );
    eprintln!("Profit Factor:    {}", fmt_opt(m.profit_factor, 2, ""));
    eprintln!("Commission:       {:.2}", m.total_commission);
}

pub fn run_dry_run(
    config_path: &PathBuf,
    strategy_path: Option<&PathBuf>,
    data_path: Option<&PathBuf>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(&e);
    }
    let (settings, bt_config) = match (data_settings(&adapter), backtest_config(&adapter)) {
        (Ok(s), Ok(c)) => (s, c),
        (Err(e), _) | (_, Err(e)) => return fail(&e),
    };

    if let Some(data) = data_path {
        match load_series(Some(&adapter), data) {
            Ok(series) => eprintln!("  data: {} bars", series.len()),
            Err(e) => return fail(&e),
        }
    }

    let strategy_config = match load_strategy_source(adapter, strategy_path) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if let Err(e) = validate_strategy_config(&strategy_config) {
        return fail(&e);
    }
    let strategy = match strategies::build_strategy(&strategy_config) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    eprintln!("Config validated successfully");

    eprintln!("\nBacktest:");
    eprintln!(
        "  symbol: {}",
        settings.symbol.as_deref().unwrap_or("(from data file)")
    );
    eprintln!("  interval: {}", settings.interval);
    print_backtest_config(&bt_config);

    eprintln!("\nStrategy:");
    print_strategy(&strategy);

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn print_backtest_config(config: &BacktestConfig) {
    eprintln!("  initial_capital: {:.2}", config.initial_capital);
    eprintln!(
        "  commission: {:.2} per side + {}%",
        config.commission_per_side, config.commission_pct
    );
    eprintln!("  position_size: {}", config.position_size);
    eprintln!("  allow_shorting: {}", config.allow_shorting);
    eprintln!("  close_at_end: {}", config.close_at_end);
    eprintln!("  intrabar_policy: {}", config.intrabar_policy);
}

fn print_strategy(strategy: &BoxedStrategy) {
    eprintln!("  name: {}", strategy.name());
    eprintln!("  warmup: {} bars", strategy.min_history());
    let reference = 100.0;
    let long = Direction::Long;
    let describe = |level: Result<Option<f64>, StrategyError>| match level {
        Ok(Some(price)) => format!("{:.2}% from entry", (price - reference).abs()),
        Ok(None) => "off".to_string(),
        Err(e) => format!("error ({e})"),
    };
    eprintln!("  stop_loss: {}", describe(strategy.stop_loss(reference, long)));
    eprintln!("  take_profit: {}", describe(strategy.take_profit(reference, long)));
}

/// Parse the requested names (empty means every built-in) and build each strategy.
fn build_requested(
    config: &dyn ConfigPort,
    names: &[String],
) -> Result<Vec<(StrategyKind, BoxedStrategy)>, SigtraderError> {
    let kinds: Vec<StrategyKind> = if names.is_empty() {
        StrategyKind::ALL.to_vec()
    } else {
        names
            .iter()
            .map(|n| n.parse::<StrategyKind>())
            .collect::<Result<Vec<_>, _>>()?
    };
    kinds
        .into_iter()
        .map(|kind| Ok((kind, strategies::build_kind(kind, config)?)))
        .collect()
}

/// Run every strategy over the series in parallel. Failed runs are reported
/// and dropped, and the returned exit code reflects the last failure.
fn run_parallel(
    series: &BarSeries,
    built: Vec<(StrategyKind, BoxedStrategy)>,
    bt_config: &BacktestConfig,
) -> (Vec<(StrategyKind, BacktestResult)>, ExitCode) {
    let outcomes: Vec<(StrategyKind, Result<BacktestResult, SigtraderError>)> = built
        .into_par_iter()
        .map(|(kind, mut strategy)| (kind, run_backtest(series, strategy.as_mut(), bt_config)))
        .collect();

    let mut results = Vec::with_capacity(outcomes.len());
    let mut exit = ExitCode::SUCCESS;
    for (kind, outcome) in outcomes {
        match outcome {
            Ok(result) => results.push((kind, result)),
            Err(e) => {
                eprintln!("error: {kind}: {e}");
                exit = ExitCode::from(&e);
            }
        }
    }
    (results, exit)
}

fn run_compare(
    config_path: &PathBuf,
    data_path: &Path,
    names: &[String],
    output_path: Option<&PathBuf>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let bt_config = match backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let built = match build_requested(&adapter, names) {
        Ok(b) => b,
        Err(e) => return fail(&e),
    };

    let series = match load_series(Some(&adapter), data_path) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    eprintln!(
        "Comparing {} strategies on {} bars...",
        built.len(),
        series.len()
    );
    let (runs, exit) = run_parallel(&series, built, &bt_config);
    let mut results: Vec<BacktestResult> = runs.into_iter().map(|(_, r)| r).collect();

    results.sort_by(|a, b| b.metrics.total_return_pct.total_cmp(&a.metrics.total_return_pct));
    println!(
        "{:<36} {:>10} {:>8} {:>8} {:>9} {:>8}",
        "strategy", "return%", "trades", "win%", "maxdd%", "sharpe"
    );
    for r in &results {
        let m = &r.metrics;
        println!(
            "{:<36} {:>10.2} {:>8} {:>8} {:>9.2} {:>8}",
            r.strategy_name,
            m.total_return_pct,
            m.total_trades,
            fmt_opt(m.win_rate.map(|w| w * 100.0), 1, ""),
            m.max_drawdown_pct,
            fmt_opt(m.sharpe_ratio, 2, ""),
        );
    }

    if let Some(output) = output_path {
        if let Err(e) = JsonReportAdapter::new().write_comparison(&results, output) {
            return fail(&e);
        }
        eprintln!("\nReport written to: {}", output.display());
    }
    exit
}

fn run_adaptive(
    config_path: &PathBuf,
    data_path: &Path,
    names: &[String],
    output_path: Option<&PathBuf>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let bt_config = match backtest_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let adaptive = match adaptive_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let detector = match regime_config(&adapter).and_then(RegimeDetector::new) {
        Ok(d) => d,
        Err(e) => return fail(&e),
    };
    let built = match build_requested(&adapter, names) {
        Ok(b) => b,
        Err(e) => return fail(&e),
    };
    let series = match load_series(Some(&adapter), data_path) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    let survey = match survey_regimes(&series, &detector, &adaptive) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    eprintln!(
        "Dominant regime: {} ({} samples, confidence {:.0}%)",
        survey.dominant,
        survey.samples,
        survey.confidence * 100.0
    );

    let (runs, exit) = run_parallel(&series, built, &bt_config);
    let selection = select_best(runs, &survey, adaptive.min_confidence);

    println!(
        "{:<36} {:>6} {:>10} {:>8}  {}",
        "strategy", "status", "return%", "trades", "reason"
    );
    for c in &selection.candidates {
        println!(
            "{:<36} {:>6} {:>10.2} {:>8}  {}",
            c.result.strategy_name,
            if c.compatibility.compatible { "OK" } else { "SKIP" },
            c.result.metrics.total_return_pct,
            c.result.metrics.total_trades,
            c.compatibility.reason,
        );
    }

    let Some(best) = selection.best() else {
        eprintln!("error: no strategy produced a result");
        return exit;
    };
    println!();
    if selection.fallback {
        println!("No strategy suits a {} market; best of all runs:", survey.dominant);
    } else {
        println!("Selected {} for a {} market:", best.kind, survey.dominant);
    }
    print_summary(&best.result);

    if let Some(output) = output_path {
        if let Err(e) = JsonReportAdapter::new().write(&best.result, output) {
            return fail(&e);
        }
        eprintln!("\nReport written to: {}", output.display());
    }
    exit
}

fn run_validate(strategy_path: &PathBuf) -> ExitCode {
    eprintln!("Validating strategy: {}", strategy_path.display());
    let adapter = match load_config(strategy_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_strategy_config(&adapter) {
        return fail(&e);
    }
    match strategies::build_strategy(&adapter) {
        Ok(strategy) => print_strategy(&strategy),
        Err(e) => return fail(&e),
    }

    eprintln!("\nStrategy configuration is valid.");
    ExitCode::SUCCESS
}

/// Parse `name=signal:confidence`.
pub fn parse_signal(raw: &str) -> Result<AgentOutput, SigtraderError> {
    let invalid = |reason: String| SigtraderError::InvalidInput {
        field: "signal".into(),
        reason,
    };
    let (name, values) = raw
        .split_once('=')
        .ok_or_else(|| invalid(format!("expected name=signal:confidence, got '{raw}'")))?;
    let (signal, confidence) = values
        .split_once(':')
        .ok_or_else(|| invalid(format!("expected signal:confidence after '=', got '{values}'")))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(invalid(format!("missing source name in '{raw}'")));
    }
    let number = |s: &str| {
        s.trim()
            .parse::<f64>()
            .map_err(|_| invalid(format!("'{s}' is not a number")))
    };
    AgentOutput::new(name, number(signal)?, number(confidence)?)
}

fn load_decision_settings(
    config_path: Option<&PathBuf>,
) -> Result<(Option<FileConfigAdapter>, DecisionConfig, RegimeConfig), ExitCode> {
    let Some(path) = config_path else {
        return Ok((None, DecisionConfig::default(), RegimeConfig::default()));
    };
    let adapter = load_config(path)?;
    if let Err(e) = validate_decision_config(&adapter) {
        return Err(fail(&e));
    }
    match (decision_config(&adapter), regime_config(&adapter)) {
        (Ok(d), Ok(r)) => Ok((Some(adapter), d, r)),
        (Err(e), _) | (_, Err(e)) => Err(fail(&e)),
    }
}

fn print_decision(decision: &Decision, json: bool) -> ExitCode {
    if json {
        return match serde_json::to_string_pretty(decision) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => fail(&SigtraderError::from(e)),
        };
    }
    println!("{}", decision.decision);
    println!("signal:     {:+.4}", decision.signal);
    println!("confidence: {:.4}", decision.confidence);
    if let Some(regime) = decision.regime {
        println!("regime:     {regime}");
    }
    println!("\n{}", decision.reasoning);
    ExitCode::SUCCESS
}

fn run_decide(
    config_path: Option<&PathBuf>,
    signals: &[String],
    regime: Option<&str>,
    json: bool,
) -> ExitCode {
    let (_, decision_settings, _) = match load_decision_settings(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let outputs: Vec<AgentOutput> = match signals
        .iter()
        .map(|s| parse_signal(s))
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(o) => o,
        Err(e) => return fail(&e),
    };
    let regime: Option<MarketRegime> = match regime.map(str::parse::<MarketRegime>).transpose() {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };
    let aggregator = match DecisionAggregator::new(decision_settings) {
        Ok(a) => a,
        Err(e) => return fail(&e),
    };

    print_decision(&aggregator.aggregate_in_regime(&outputs, regime), json)
}

fn run_analyze(config_path: Option<&PathBuf>, data_path: &Path, json: bool) -> ExitCode {
    let (adapter, decision_settings, regime_settings) = match load_decision_settings(config_path)
    {
        Ok(s) => s,
        Err(code) => return code,
    };
    let series = match load_series(adapter.as_ref().map(|a| a as &dyn ConfigPort), data_path) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    let Some(window) = series.window(series.len().saturating_sub(1)) else {
        return fail(&SigtraderError::InvalidInput {
            field: "bars".into(),
            reason: "series is empty".into(),
        });
    };

    let source = TechnicalSignal::default();
    let output = match source.analyze(&window) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("error: {}: {e}", source.name());
            return ExitCode::from(4);
        }
    };
    let detector = match RegimeDetector::new(regime_settings) {
        Ok(d) => d,
        Err(e) => return fail(&e),
    };
    let regime = detector.detect(&window);
    let aggregator = match DecisionAggregator::new(decision_settings) {
        Ok(a) => a,
        Err(e) => return fail(&e),
    };
    let decision = aggregator.aggregate_in_regime(std::slice::from_ref(&output), Some(regime.regime));

    if json {
        let report = serde_json::json!({
            "symbol": series.symbol(),
            "timestamp": window.current().timestamp,
            "regime": regime,
            "signals": [output],
            "decision": decision,
        });
        return match serde_json::to_string_pretty(&report) {
            Ok(text) => {
                println!("{text}");
                ExitCode::SUCCESS
            }
            Err(e) => fail(&SigtraderError::from(e)),
        };
    }

    println!("{} @ {}", series.symbol(), window.current().timestamp);
    println!(
        "regime:     {} (confidence {:.2}, ADX {:.1}, volatility {:.2}%)",
        regime.regime, regime.confidence, regime.adx, regime.volatility_pct
    );
    println!(
        "{}:  signal {:+.4}, confidence {:.4}",
        output.source, output.signal, output.confidence
    );
    println!();
    print_decision(&decision, false)
}

fn run_strategies() -> ExitCode {
    for kind in StrategyKind::ALL {
        println!("{:<20} {}", kind.as_str(), kind.description());
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_signal_reads_all_parts() {
        let output = parse_signal("technical=0.4:0.8").unwrap();
        assert_eq!(output.source, "technical");
        assert_eq!(output.signal, 0.4);
        assert_eq!(output.confidence, 0.8);

        let output = parse_signal(" ml = -0.25 : 0.5 ").unwrap();
        assert_eq!(output.source, "ml");
        assert_eq!(output.signal, -0.25);
    }

    #[test]
    fn parse_signal_rejects_bad_input() {
        for raw in ["technical", "technical=0.4", "=0.4:0.8", "t=abc:0.5", "t=1.5:0.5", "t=0.5:-1"] {
            let err = parse_signal(raw).unwrap_err();
            assert!(
                matches!(err, SigtraderError::InvalidInput { .. }),
                "{raw}: {err}"
            );
        }
    }

    #[test]
    fn symbol_falls_back_to_file_stem() {
        let config = FileConfigAdapter::from_string("[backtest]\ninitial_capital = 1000\n").unwrap();
        let path = Path::new("/data/EURUSD.csv");
        assert_eq!(resolve_symbol(Some(&config), path).unwrap(), "EURUSD");
        assert_eq!(resolve_symbol(None, path).unwrap(), "EURUSD");

        let config = FileConfigAdapter::from_string("[backtest]\nsymbol = XAUUSD\n").unwrap();
        assert_eq!(resolve_symbol(Some(&config), path).unwrap(), "XAUUSD");
    }

    #[test]
    fn fmt_opt_handles_missing_values() {
        assert_eq!(fmt_opt(None, 2, "%"), "n/a");
        assert_eq!(fmt_opt(Some(1.234), 2, "%"), "1.23%");
    }
}
