//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvMarketData;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{run_backtest, BacktestReport};
use crate::domain::cancel::CancellationToken;
use crate::domain::error::TrendsimError;
use crate::domain::optimizer::{optimize_parameters, OptimizationResult};
use crate::domain::settings;
use crate::ports::data_port::MarketDataPort;

#[derive(Parser, Debug)]
#[command(name = "trendsim", about = "Indicator strategy backtester and parameter optimizer")]
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
        /// Overrides [backtest] data_dir
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Print the full report as JSON on stdout
        #[arg(long)]
        json: bool,
    },
    /// Search strategy parameters for the best final balance
    Optimize {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Overrides [optimizer] seed
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        json: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List symbols available in a data directory
    Symbols {
        #[arg(long)]
        data_dir: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            if e.is_data_error() {
                eprintln!("hint: bars are read from <data_dir>/<SYMBOL>.csv (see --data-dir)");
            }
            (&e).into()
        }
    }
}

/// Dispatch one subcommand. Results go to stdout, progress to stderr.
pub fn execute(command: Command) -> Result<(), TrendsimError> {
    match command {
        Command::Backtest {
            config,
            data_dir,
            json,
        } => run_backtest_command(&config, data_dir, json),
        Command::Optimize {
            config,
            data_dir,
            seed,
            json,
        } => run_optimize_command(&config, data_dir, seed, json),
        Command::Validate { config } => run_validate(&config),
        Command::Symbols { data_dir } => run_symbols(&data_dir),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, TrendsimError> {
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

fn data_port(adapter: &FileConfigAdapter, data_dir: Option<PathBuf>) -> CsvMarketData {
    CsvMarketData::new(data_dir.unwrap_or_else(|| settings::data_dir(adapter)))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), TrendsimError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| TrendsimError::Io(std::io::Error::other(e)))?;
    println!("{}", text);
    Ok(())
}

fn run_backtest_command(
    config_path: &Path,
    data_dir: Option<PathBuf>,
    json: bool,
) -> Result<(), TrendsimError> {
    let adapter = load_config(config_path)?;
    settings::validate_config(&adapter)?;
    let request = settings::load_backtest_request(&adapter)?;
    let port = data_port(&adapter, data_dir);

    eprintln!(
        "Running backtest: {} on {} symbols, {} to {}",
        request.strategy,
        request.symbols.len(),
        request.start,
        request.end
    );
    let report = run_backtest(&port, &request)?;

    if json {
        print_json(&report)
    } else {
        print_report(&report);
        Ok(())
    }
}

fn print_report(report: &BacktestReport) {
    let m = &report.metrics;
    println!("=== Portfolio ===");
    println!("Strategy:         {}", report.strategy);
    println!("Period:           {} to {}", report.start, report.end);
    println!("Initial Balance:  {:.2}", report.initial_balance);
    println!("Final Balance:    {:.2}", report.final_balance);
    println!("Total Return:     {:.2}%", report.total_return_pct);
    println!("Annualized:       {:.2}%", m.annualized_return * 100.0);
    println!("Sharpe Ratio:     {:.2}", m.sharpe_ratio);
    println!("Sortino Ratio:    {:.2}", m.sortino_ratio);
    println!("Max Drawdown:     -{:.1}%", m.max_drawdown * 100.0);
    println!("Round Trips:      {}", m.total_trades);
    println!("Win Rate:         {:.1}%", m.win_rate * 100.0);
    println!("Profit Factor:    {:.2}", m.profit_factor);

    if let Some(b) = &report.benchmark {
        println!("Buy & Hold {}: {:.2}%", b.symbol, b.return_pct);
    }

    if !report.per_symbol.is_empty() {
        println!("\n=== Per-Symbol Summary ===");
        for s in &report.per_symbol {
            let sign = if s.pnl >= 0.0 { "+" } else { "" };
            println!(
                "  {}:  {} trades, {}{:.2} ({:.2}%)",
                s.symbol, s.trade_count, sign, s.pnl, s.return_pct
            );
        }
    }

    if !report.skipped.is_empty() {
        println!("\n=== Skipped ===");
        for s in &report.skipped {
            println!("  {}: {}", s.symbol, s.reason);
        }
    }

    if !report.monthly_performance.is_empty() {
        println!("\n=== Monthly ===");
        for month in &report.monthly_performance {
            println!(
                "  {}  {:>14.2}  {:>7.2}%",
                month.month, month.balance, month.return_pct
            );
        }
    }
}

fn run_optimize_command(
    config_path: &Path,
    data_dir: Option<PathBuf>,
    seed: Option<u64>,
    json: bool,
) -> Result<(), TrendsimError> {
    let adapter = load_config(config_path)?;
    settings::validate_config(&adapter)?;
    let request = settings::load_optimizer_request(&adapter)?;
    let space = settings::load_parameter_space(&adapter)?;
    let mut optimizer = settings::load_optimizer_config(&adapter)?;
    if seed.is_some() {
        optimizer.seed = seed;
    }
    let port = data_port(&adapter, data_dir);

    eprintln!(
        "Optimizing {} over {} symbols: {} trials ({} search)",
        request.strategy.kind(),
        request.symbols.len(),
        optimizer.total_trials(),
        optimizer.search
    );
    let result = optimize_parameters(&port, &request, &space, &optimizer, &CancellationToken::new())?;

    if json {
        print_json(&result)
    } else {
        print_optimization(&result);
        Ok(())
    }
}

fn print_optimization(result: &OptimizationResult) {
    println!("=== Optimization ({}) ===", result.strategy);
    for (name, value) in &result.optimized_params {
        println!("  {:<12} {}", name, value);
    }
    println!("Best Balance:     {:.2}", result.best_balance);
    println!("Total Return:     {:.2}%", result.total_return_pct);
    println!("Trials:           {}", result.trials.len());
    let failed = result.trials.iter().filter(|t| t.error.is_some()).count();
    if failed > 0 {
        println!("Failed Trials:    {}", failed);
    }
    if result.cancelled {
        println!("(cancelled before all trials ran)");
    }
}

fn run_validate(config_path: &Path) -> Result<(), TrendsimError> {
    let adapter = load_config(config_path)?;
    settings::validate_config(&adapter)?;
    let request = settings::load_backtest_request(&adapter)?;
    let space = settings::load_parameter_space(&adapter)?;
    let optimizer = settings::load_optimizer_config(&adapter)?;

    eprintln!("Config validated successfully");
    println!("Strategy:   {}", request.strategy);
    println!("Symbols:    {}", request.symbols.join(", "));
    println!("Window:     {} to {} ({})", request.start, request.end, request.timeframe);
    println!("Regime:     {}", if request.regime.enabled { "enabled" } else { "disabled" });
    println!("On error:   {}", request.failure_policy);
    println!("Search:     {} ({} trials)", optimizer.search, optimizer.total_trials());
    for dim in space.dims() {
        println!("  {:<12} [{}, {}]", dim.name, dim.low, dim.high);
    }
    Ok(())
}

fn run_symbols(data_dir: &Path) -> Result<(), TrendsimError> {
    let port = CsvMarketData::new(data_dir.to_path_buf());
    let symbols = port.list_symbols()?;
    if symbols.is_empty() {
        eprintln!("No symbols found in {}", data_dir.display());
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    Ok(())
}
