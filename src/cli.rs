//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_result_sink::CsvResultSink;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::retrying_data_port::{RetryPolicy, RetryingDataPort};
use crate::domain::backtest::BacktestReport;
use crate::domain::batch::{
    BatchRecord, CancelToken, RunKey, RunOutcome, expand_pairs, run_batch, run_pair,
    write_records,
};
use crate::domain::config_validation::{DataSettings, DataSource, Settings, validate_config};
use crate::domain::error::ConfluenceError;
use crate::domain::timeframe::Timeframe;
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(
    name = "confluence",
    about = "Bollinger / Stochastic / RSI confluence backtester"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest one symbol on one timeframe
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        timeframe: Timeframe,
        /// Print the trade log
        #[arg(long)]
        trades: bool,
    },
    /// Backtest every configured (symbol, timeframe) pair and write a results CSV
    Batch {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Worker threads (0 = one per CPU)
        #[arg(short, long)]
        jobs: Option<usize>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List symbols available for a timeframe
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        timeframe: Timeframe,
    },
    /// Copy CSV bar files into the SQLite store named by [data] path
    #[cfg(feature = "sqlite")]
    Import {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory of <SYMBOL>_<timeframe>.csv files
        #[arg(long)]
        from: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            symbol,
            timeframe,
            trades,
        } => run_backtest(&config, &symbol, timeframe, trades),
        Command::Batch {
            config,
            output,
            jobs,
        } => run_batch_command(&config, output.as_deref(), jobs),
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { config, timeframe } => run_list_symbols(&config, timeframe),
        #[cfg(feature = "sqlite")]
        Command::Import { config, from } => run_import(&config, &from),
    }
}

fn fail(err: ConfluenceError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

/// Read and validate a config file.
pub fn load_settings(path: &Path) -> Result<Settings, ConfluenceError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    validate_config(&adapter)
}

/// Build the configured data port, wrapped in retries.
pub fn open_data_port(
    data: &DataSettings,
    cancel: CancelToken,
) -> Result<Box<dyn DataPort>, ConfluenceError> {
    let policy = RetryPolicy {
        attempts: data.retry_attempts,
        base_delay: Duration::from_millis(data.retry_delay_ms),
    };

    match data.source {
        DataSource::Csv => Ok(Box::new(RetryingDataPort::new(
            CsvAdapter::new(data.path.clone()),
            policy,
            cancel,
        ))),
        #[cfg(feature = "sqlite")]
        DataSource::Sqlite => {
            use crate::adapters::sqlite_adapter::SqliteAdapter;
            Ok(Box::new(RetryingDataPort::new(
                SqliteAdapter::open(&data.path)?,
                policy,
                cancel,
            )))
        }
        #[cfg(not(feature = "sqlite"))]
        DataSource::Sqlite => Err(ConfluenceError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason: "built without the sqlite feature".into(),
        }),
    }
}

fn print_report(key: &RunKey, report: &BacktestReport) {
    let r = &report.result;
    eprintln!("\n=== {} ===", key);
    eprintln!("Bars:             {}", report.bar_count);
    eprintln!("Final Balance:    {:.2}", r.final_balance);
    eprintln!("Profit:           {:.2}", r.profit);
    eprintln!("Max Drawdown:     {:.2}%", r.max_drawdown_pct);
    eprintln!("Hit Rate:         {:.2}%", r.hit_rate_pct);
    eprintln!("Total Trades:     {}", r.total_trades);
    if report.open_units > 0.0 {
        eprintln!("Open Position:    {:.8} units (marked at last close)", report.open_units);
    }
}

fn run_backtest(config_path: &Path, symbol: &str, timeframe: Timeframe, show_trades: bool) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let settings = match load_settings(config_path) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    let data_port = match open_data_port(&settings.data, CancelToken::new()) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    let key = RunKey::new(symbol.trim().to_uppercase(), timeframe);
    let report = match run_pair(&*data_port, &key, &settings.backtest, settings.limits) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    print_report(&key, &report);

    if show_trades {
        println!("side,timestamp,price,size");
        for trade in &report.trades {
            println!(
                "{},{},{},{}",
                trade.side,
                trade.timestamp.format("%Y-%m-%d %H:%M:%S"),
                trade.price,
                trade.size
            );
        }
    }

    ExitCode::SUCCESS
}

fn print_batch_summary(records: &[BatchRecord]) {
    eprintln!("\n=== Batch Summary ===");
    for record in records {
        match &record.outcome {
            RunOutcome::Completed(report) => {
                let r = &report.result;
                let sign = if r.profit >= 0.0 { "+" } else { "" };
                eprintln!(
                    "  {}:  {} trades, {:.1}% hit rate, {}{:.2}, max dd {:.2}%",
                    record.key,
                    r.total_trades,
                    r.hit_rate_pct,
                    sign,
                    r.profit,
                    r.max_drawdown_pct
                );
            }
            RunOutcome::Failed { reason } => {
                eprintln!("  {}:  failed ({})", record.key, reason);
            }
        }
    }
}

fn run_batch_command(config_path: &Path, output: Option<&Path>, jobs: Option<usize>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let settings = match load_settings(config_path) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    if settings.batch.symbols.is_empty() {
        return fail(ConfluenceError::ConfigMissing {
            section: "batch".into(),
            key: "symbols".into(),
        });
    }

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        warn!("interrupt received, cancelling remaining runs");
        handler_token.cancel();
    }) {
        warn!("could not install interrupt handler: {}", e);
    }

    let data_port = match open_data_port(&settings.data, cancel.clone()) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    let pairs = expand_pairs(&settings.batch.symbols, &settings.batch.timeframes);
    let jobs = jobs.unwrap_or(settings.batch.jobs);
    eprintln!(
        "Backtesting {} symbols x {} timeframes",
        settings.batch.symbols.len(),
        settings.batch.timeframes.len()
    );

    let records = match run_batch(
        &*data_port,
        &pairs,
        &settings.backtest,
        settings.limits,
        jobs,
        &cancel,
    ) {
        Ok(r) => r,
        Err(e) => return fail(e),
    };

    let output = output.map(Path::to_path_buf).unwrap_or(settings.output);
    let mut sink = match CsvResultSink::create(&output) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let written = write_records(&records, &mut sink);
    info!("wrote {} of {} records", written, records.len());

    print_batch_summary(&records);
    eprintln!("\nResults written to: {}", output.display());

    if cancel.is_cancelled() {
        return fail(ConfluenceError::Cancelled);
    }
    if !records.iter().any(BatchRecord::is_completed) {
        eprintln!("error: every pair failed");
        return ExitCode::from(5);
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let settings = match load_settings(config_path) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    let bt = &settings.backtest;
    eprintln!("\nIndicators to compute:");
    for indicator in bt.indicators.indicator_types() {
        eprintln!("  {}", indicator);
    }

    eprintln!("\nRules ({}):", bt.rules.kind);
    for condition in bt.rules.describe() {
        eprintln!("  {}", condition);
    }

    eprintln!("\nAccount:");
    eprintln!("  initial balance: {}", bt.simulation.initial_balance);
    eprintln!("  trade size:      {}", bt.simulation.trade_size);
    eprintln!(
        "  bars:            {} to {}",
        settings.limits.min_bars, settings.limits.max_bars
    );

    if !settings.batch.symbols.is_empty() {
        let timeframes: Vec<&str> = settings.batch.timeframes.iter().map(|t| t.as_str()).collect();
        eprintln!("\nBatch:");
        eprintln!("  symbols:    {}", settings.batch.symbols.join(", "));
        eprintln!("  timeframes: {}", timeframes.join(", "));
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_list_symbols(config_path: &Path, timeframe: Timeframe) -> ExitCode {
    let settings = match load_settings(config_path) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let data_port = match open_data_port(&settings.data, CancelToken::new()) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    let symbols = match data_port.list_symbols(timeframe) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    if symbols.is_empty() {
        eprintln!("No symbols found for timeframe {}", timeframe);
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    ExitCode::SUCCESS
}

#[cfg(feature = "sqlite")]
fn run_import(config_path: &Path, from: &Path) -> ExitCode {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    let settings = match load_settings(config_path) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let store = match SqliteAdapter::open(&settings.data.path) {
        Ok(s) => s,
        Err(e) => return fail(e),
    };
    let source = CsvAdapter::new(from.to_path_buf());

    let mut total = 0;
    for timeframe in Timeframe::ALL {
        let symbols = match source.list_symbols(timeframe) {
            Ok(s) => s,
            Err(e) => return fail(e),
        };
        for symbol in symbols {
            let bars = match source.read_all(&symbol, timeframe) {
                Ok(b) => b,
                Err(e) => {
                    warn!("skipping {} {} ({})", symbol, timeframe, e);
                    continue;
                }
            };
            match store.insert_bars(&symbol, timeframe, &bars) {
                Ok(n) => {
                    eprintln!("  {} {}: {} bars", symbol, timeframe, n);
                    total += n;
                }
                Err(e) => return fail(e),
            }
        }
    }

    eprintln!("Imported {} bars into {}", total, settings.data.path.display());
    ExitCode::SUCCESS
}
