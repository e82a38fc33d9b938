//! ReplayLab CLI: replay and walk-forward commands.
//!
//! Commands:
//! - `replay`: run one strategy over a CSV bar file with the configured parameters
//! - `walk-forward`: search parameters on the train window, replay the winner on test
//! - `strategies`: list the registered strategy adapters

mod io;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use replaylab_core::data::{BarStore, BaseSeries};
use replaylab_core::engine::ReplayResult;
use replaylab_core::strategy::StrategyRegistry;
use replaylab_runner::{
    run_walk_forward, PerformanceMetrics, RunConfig, StrategyFactory, WalkForwardReport,
};

#[derive(Parser)]
#[command(
    name = "replaylab",
    about = "ReplayLab CLI: multi-timeframe replay and walk-forward validation"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay one strategy over a CSV bar file.
    Replay {
        /// CSV with timestamp, open, high, low, close, volume columns.
        #[arg(long)]
        data: PathBuf,

        /// Path to a TOML run config.
        #[arg(long)]
        config: PathBuf,

        /// Write the full result as JSON to this file.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write the trade ledger as CSV to this file.
        #[arg(long)]
        trades_csv: Option<PathBuf>,

        /// Write the equity curve as CSV to this file.
        #[arg(long)]
        equity_csv: Option<PathBuf>,
    },
    /// Walk-forward validation: parameter search on train, frozen replay on test.
    WalkForward {
        /// CSV with timestamp, open, high, low, close, volume columns.
        #[arg(long)]
        data: PathBuf,

        /// Path to a TOML run config.
        #[arg(long)]
        config: PathBuf,

        /// Override the configured master seed.
        #[arg(long)]
        seed: Option<u64>,

        /// Override the configured number of trials.
        #[arg(long)]
        trials: Option<usize>,

        /// Write the report as JSON to this file.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List registered strategies.
    Strategies,
}

/// JSON document written by `replay --output`.
#[derive(Serialize)]
struct ReplayOutput<'a> {
    metrics: &'a PerformanceMetrics,
    result: &'a ReplayResult,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            data,
            config,
            output,
            trades_csv,
            equity_csv,
        } => run_replay_cmd(&data, &config, output, trades_csv, equity_csv),
        Commands::WalkForward {
            data,
            config,
            seed,
            trials,
            output,
        } => run_walk_forward_cmd(&data, &config, seed, trials, output),
        Commands::Strategies => {
            for name in StrategyRegistry::with_builtins().names() {
                println!("{name}");
            }
            Ok(())
        }
    }
}

/// Logs go to stderr, filtered by `RUST_LOG` (default `info`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_run(data: &Path, config_path: &Path) -> Result<(RunConfig, BarStore)> {
    let config = RunConfig::load(config_path)
        .with_context(|| format!("loading config {}", config_path.display()))?;
    let bars = io::load_bars_csv(data)?;
    let base = BaseSeries::new(config.symbol.clone(), config.base_timeframe, bars)
        .with_context(|| format!("validating bars from {}", data.display()))?;
    let store = BarStore::build(base, &config.timeframes).context("building bar store")?;
    info!(
        symbol = %config.symbol,
        bars = store.len(),
        timeframes = ?store.timeframes(),
        "loaded bar store"
    );
    Ok((config, store))
}

fn run_replay_cmd(
    data: &Path,
    config_path: &Path,
    output: Option<PathBuf>,
    trades_csv: Option<PathBuf>,
    equity_csv: Option<PathBuf>,
) -> Result<()> {
    let (config, store) = load_run(data, config_path)?;
    let factory = StrategyFactory::builtin(&config.strategy, config.engine.clone())?;
    let result = factory.replay(&store, &config.params)?;
    let metrics = PerformanceMetrics::compute(&result);

    print_replay_summary(&result, &metrics);

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&ReplayOutput {
            metrics: &metrics,
            result: &result,
        })
        .context("failed to serialize replay result")?;
        write_file(&path, &json)?;
    }
    if let Some(path) = trades_csv {
        write_file(&path, &io::export_trades_csv(&result.trades)?)?;
    }
    if let Some(path) = equity_csv {
        write_file(&path, &io::export_equity_csv(&result.equity_curve)?)?;
    }
    Ok(())
}

fn run_walk_forward_cmd(
    data: &Path,
    config_path: &Path,
    seed: Option<u64>,
    trials: Option<usize>,
    output: Option<PathBuf>,
) -> Result<()> {
    let (config, store) = load_run(data, config_path)?;
    let mut wf = config.walk_forward_config();
    if let Some(seed) = seed {
        wf.seed = seed;
    }
    if let Some(trials) = trials {
        wf.max_trials = trials;
    }
    let factory = StrategyFactory::builtin(&config.strategy, config.engine.clone())?;
    let report = run_walk_forward(&store, &wf, &factory)?;

    print_walk_forward_summary(&report);

    if let Some(path) = output {
        let json =
            serde_json::to_string_pretty(&report).context("failed to serialize walk-forward report")?;
        write_file(&path, &json)?;
    }
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn print_replay_summary(result: &ReplayResult, m: &PerformanceMetrics) {
    println!();
    println!("=== Replay Result ===");
    println!("Symbol:         {}", result.symbol);
    println!("Strategy:       {}", result.strategy);
    println!("Bars:           {}", result.bar_count);
    println!("Positions:      {} ({} exits)", m.trade_count, m.exit_count);
    if let Some(p) = &result.open_position {
        println!("Open position:  {:?} since bar {}", p.direction, p.entry_index);
    }
    println!();
    println!("--- Performance ---");
    println!("Final Equity:   {:.2}", m.final_equity);
    println!("Net Return:     {:.2}%", m.net_return * 100.0);
    println!("Buy & Hold:     {:.2}%", m.buy_hold_return * 100.0);
    println!("Sharpe:         {:.3}", m.sharpe);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
    println!("Profit Factor:  {:.2}", m.profit_factor);
    println!("Expectancy:     {:.3}R", m.expectancy_r);
    let r = &result.rejections;
    println!();
    println!("--- Rejected intents ---");
    println!(
        "cooldown {}, in position {}, invalid risk {}, nothing to exit {}, no next bar {}",
        r.cooldown, r.already_in_position, r.invalid_risk, r.nothing_to_exit, r.no_next_bar
    );
    println!();
}

fn print_walk_forward_summary(report: &WalkForwardReport) {
    println!();
    println!("=== Walk-Forward Result ===");
    println!("Symbol:         {}", report.symbol);
    println!("Strategy:       {}", report.strategy);
    println!("Objective:      {}", report.objective);
    println!(
        "Train:          {} to {} ({} bars)",
        report.split.train_start,
        report.split.train_end,
        report.split.train.len()
    );
    println!(
        "Test:           {} to {} ({} bars)",
        report.split.test_start,
        report.split.test_end,
        report.split.test.len()
    );
    println!(
        "Trials:         {} completed, {} failed, {} ineligible, {} discarded",
        report.completed_trials,
        report.failed_trials,
        report.ineligible_trials,
        report.discarded_trials
    );
    println!();
    println!("Best trial:     #{}", report.best_trial);
    println!("Parameters:     {}", report.best_params);
    println!(
        "In-sample:      {:.4} ({} positions)",
        report.in_sample_score, report.in_sample_trades
    );
    println!(
        "Out-of-sample:  {:.4} ({} positions)",
        report.out_of_sample_score, report.out_of_sample_trades
    );
    match report.retention {
        Some(r) => println!("Retention:      {:.1}%", r * 100.0),
        None => println!("Retention:      n/a (in-sample score not positive)"),
    }
    println!();
}
