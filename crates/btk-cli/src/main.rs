//! `btk` — run a backtest from a config file + CSV archive directory, or
//! pretty-print a previously saved metric set. Grounded on `mqk-cli`'s
//! `clap::Parser`/`Subcommand` shape and `commands::bkt`'s key=value summary
//! printing; no DB/broker/async subcommands since none of that is in scope
//! here (see `DESIGN.md`'s note on dropping `tokio`).

mod run_config;
mod strategy;

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use btk_backtest::{CancellationToken, MaxDrawdown, MetricAccumulator, SharpeRatio, SimulationDriver, SummaryMetrics};
use btk_core::Symbol;
use btk_marketdata::{CsvPriceSource, PriceArchive};
use clap::{Parser, Subcommand};

use crate::run_config::RunConfigFile;
use crate::strategy::EmaCrossStrategy;

#[derive(Parser)]
#[command(name = "btk")]
#[command(about = "Historical-market backtesting engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest from a YAML config file against a CSV price archive.
    Run {
        /// Path to the run config YAML file.
        config: PathBuf,

        /// Optional path to write the finalized metric set as JSON.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Pretty-print a metric set previously saved with `run --out`.
    Report {
        /// Path to a JSON metric set written by `run --out`.
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::Run { config, out } => run(&config, out.as_deref()),
        Commands::Report { input } => report(&input),
    }
}

fn run(config_path: &std::path::Path, out_path: Option<&std::path::Path>) -> Result<()> {
    let run_config = RunConfigFile::load(config_path)?;
    let backtest_config = run_config.backtest_config()?;

    let watchlist: Vec<Symbol> = run_config.symbols.iter().map(|s| Symbol::from(s.as_str())).collect();
    let source = CsvPriceSource::new(run_config.data_dir.clone());
    let archive = PriceArchive::new(source);

    let strategy = Box::new(EmaCrossStrategy::new(
        watchlist.clone(),
        run_config.ema_period,
        run_config.quantity,
        run_config.stop_pct,
        run_config.take_profit_pct,
    ));

    let mut driver = SimulationDriver::create(backtest_config, watchlist, archive, strategy)
        .context("initializing simulation driver")?;

    let mut metrics: Vec<Box<dyn MetricAccumulator>> = vec![
        Box::new(SummaryMetrics::new()),
        Box::new(SharpeRatio::new()),
        Box::new(MaxDrawdown::new()),
    ];
    let cancel = CancellationToken::new();

    let report = match driver.run(&mut metrics, &cancel) {
        Ok(report) => report,
        Err((steps, err)) => {
            println!("backtest_ok=false");
            println!("steps_completed={}", steps.len());
            println!("error={err}");
            anyhow::bail!("backtest run failed: {err}");
        }
    };

    println!("backtest_ok=true");
    println!("steps={}", report.steps.len());
    let total_trades: usize = report.steps.iter().map(|s| s.trades.len()).sum();
    println!("trades={total_trades}");
    if let Some(last) = report.steps.last() {
        println!("final_cash_micros={}", last.cash_micros);
        println!("final_portfolio_value_micros={}", last.portfolio_value_micros);
    }
    for (name, value) in &report.metrics {
        println!("{name}={value}");
    }

    if let Some(path) = out_path {
        write_metrics(path, &report.metrics)?;
        println!("metrics_written={}", path.display());
    }

    Ok(())
}

fn write_metrics(path: &std::path::Path, metrics: &HashMap<String, f64>) -> Result<()> {
    let json = serde_json::to_string_pretty(metrics).context("serializing metrics")?;
    std::fs::write(path, json).with_context(|| format!("writing metrics to {}", path.display()))
}

fn report(path: &std::path::Path) -> Result<()> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading metrics from {}", path.display()))?;
    let metrics: HashMap<String, f64> = serde_json::from_str(&text).context("parsing metrics JSON")?;
    let mut names: Vec<&String> = metrics.keys().collect();
    names.sort();
    for name in names {
        println!("{name} = {:.4}", metrics[name]);
    }
    Ok(())
}
