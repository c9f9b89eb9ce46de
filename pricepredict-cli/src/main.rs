//! PricePredict CLI — dataset inspection and cache management commands.
//!
//! Commands:
//! - `info` — per-instrument derived quantities (bar and window counts)
//! - `show` — resolve one window and print its bars
//! - `prefetch` — walk every window of every instrument to warm the caches
//! - `cache status` — row counts and time spans per instrument cache
//!
//! Logging is initialized here, and only here: the core library emits
//! `tracing` events but never installs a subscriber, so library users (and
//! tests) stay free to capture or silence them.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pricepredict_core::config::Config;
use pricepredict_core::data::{
    Bar, BarCache, CircuitBreaker, WindowSpec, WindowedDataset, YahooSource,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pricepredict",
    about = "PricePredict CLI — windowed historical bar datasets"
)]
struct Cli {
    /// Path to the JSON config file.
    #[arg(long, default_value = "tickers.json", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print derived quantities for every configured instrument.
    Info,
    /// Resolve one window and print its bars.
    Show {
        /// Instrument symbol, as listed in the config.
        #[arg(long)]
        symbol: String,

        /// Zero-based window index.
        #[arg(long)]
        index: usize,
    },
    /// Walk every window of every instrument to warm the caches.
    Prefetch,
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report bar counts and time spans per instrument cache.
    Status,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = Config::from_file(&cli.config)
        .with_context(|| format!("loading config '{}'", cli.config.display()))?;

    match cli.command {
        Commands::Info => run_info(&config),
        Commands::Show { symbol, index } => run_show(&config, &symbol, index),
        Commands::Prefetch => run_prefetch(&config),
        Commands::Cache { action } => match action {
            CacheAction::Status => run_cache_status(&config),
        },
    }
}

/// Open an instrument's cache: on-disk under the configured cache
/// directory, in-memory when no directory is configured.
fn open_cache(config: &Config, spec: &WindowSpec) -> Result<BarCache> {
    match config.cache_path(spec) {
        Some(path) => {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("creating cache dir '{}'", dir.display()))?;
            }
            Ok(BarCache::open(&path)?)
        }
        None => Ok(BarCache::in_memory()?),
    }
}

fn build_dataset(config: &Config, spec: &WindowSpec) -> Result<WindowedDataset> {
    let cache = open_cache(config, spec)?;
    let circuit_breaker = Arc::new(CircuitBreaker::default_source());
    let source = YahooSource::new(circuit_breaker);
    Ok(WindowedDataset::new(spec.clone(), Box::new(source), cache)?)
}

fn run_info(config: &Config) -> Result<()> {
    println!(
        "{:<8} {:<12} {:<12} {:<9} {:>6} {:>6} {:>10} {:>9}",
        "Symbol", "Start", "End", "Interval", "Size", "Step", "Bars", "Windows"
    );
    println!("{}", "-".repeat(78));

    for spec in &config.instruments {
        let dataset = build_dataset(config, spec)?;
        println!(
            "{:<8} {:<12} {:<12} {:<9} {:>6} {:>6} {:>10} {:>9}",
            spec.symbol,
            spec.start_date.to_string(),
            spec.end_date.to_string(),
            spec.interval.to_string(),
            spec.win_size,
            spec.win_step,
            dataset.num_bars_total(),
            dataset.len(),
        );
    }
    Ok(())
}

fn run_show(config: &Config, symbol: &str, index: usize) -> Result<()> {
    let Some(spec) = config.instrument(symbol) else {
        bail!("symbol '{symbol}' is not in the config");
    };

    let dataset = build_dataset(config, spec)?;
    let Some((win_start, win_end)) = dataset.window_range(index) else {
        bail!(
            "window index {index} out of range ({} windows for {symbol})",
            dataset.len()
        );
    };

    let bars = dataset.get(index)?;
    println!("{symbol} window {index}: {win_start} .. {win_end} ({} bars)", bars.len());
    println!(
        "{:<20} {:>10} {:>10} {:>10} {:>10} {:>12}",
        "Timestamp", "Open", "High", "Low", "Close", "Volume"
    );
    for bar in &bars {
        print_bar(bar);
    }
    Ok(())
}

fn print_bar(bar: &Bar) {
    println!(
        "{:<20} {:>10.2} {:>10.2} {:>10.2} {:>10.2} {:>12.0}",
        bar.timestamp.to_string(),
        bar.open,
        bar.high,
        bar.low,
        bar.close,
        bar.volume
    );
}

fn run_prefetch(config: &Config) -> Result<()> {
    if config.cache_dir.is_none() {
        bail!("prefetch without a cache_dir would warm caches that vanish on exit");
    }

    for spec in &config.instruments {
        let dataset = build_dataset(config, spec)?;
        let total = dataset.len();
        println!("{}: {total} windows", spec.symbol);

        let mut bars_seen = 0usize;
        for index in 0..total {
            let bars = dataset
                .get(index)
                .with_context(|| format!("{} window {index}", spec.symbol))?;
            bars_seen += bars.len();
        }
        println!("  OK: {bars_seen} bars resolved across {total} windows");
    }
    Ok(())
}

fn run_cache_status(config: &Config) -> Result<()> {
    println!(
        "{:<8} {:<9} {:>10}  {}",
        "Symbol", "Interval", "Bars", "Span"
    );
    println!("{}", "-".repeat(64));

    for spec in &config.instruments {
        let (count, span) = match config.cache_path(spec) {
            Some(path) if path.exists() => {
                let cache = BarCache::open(&path)?;
                (cache.bar_count()?, cache.span()?)
            }
            Some(_) => (0, None),
            None => {
                println!("{:<8} {:<9} (in-memory mode, nothing persisted)", spec.symbol, spec.interval.to_string());
                continue;
            }
        };

        let span = span
            .map(|(lo, hi)| format!("{lo} .. {hi}"))
            .unwrap_or_else(|| "(empty)".into());
        println!(
            "{:<8} {:<9} {:>10}  {span}",
            spec.symbol,
            spec.interval.to_string(),
            count
        );
    }
    Ok(())
}
