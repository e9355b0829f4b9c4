//! Batch orchestration over (symbol, timeframe) pairs.
//!
//! Every pair yields exactly one [`BatchRecord`], completed or failed; a
//! failing pair never stops its siblings. Runs execute on a rayon pool and
//! results come back in input order.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{error, info, warn};
use rayon::prelude::*;

use crate::domain::backtest::{BacktestConfig, BacktestReport, run_backtest};
use crate::domain::bar::is_strictly_increasing;
use crate::domain::error::ConfluenceError;
use crate::domain::metrics::BacktestResult;
use crate::domain::timeframe::Timeframe;
use crate::ports::data_port::DataPort;
use crate::ports::result_sink::ResultSink;

pub const DEFAULT_MAX_BARS: usize = 1000;
pub const DEFAULT_MIN_BARS: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunKey {
    pub symbol: String,
    pub timeframe: Timeframe,
}

impl RunKey {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        RunKey {
            symbol: symbol.into(),
            timeframe,
        }
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.symbol, self.timeframe)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(BacktestReport),
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchRecord {
    pub key: RunKey,
    pub outcome: RunOutcome,
}

impl BatchRecord {
    /// Metrics of a completed run; `None` for a failed one.
    pub fn result(&self) -> Option<&BacktestResult> {
        match &self.outcome {
            RunOutcome::Completed(report) => Some(&report.result),
            RunOutcome::Failed { .. } => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed(_))
    }
}

/// How many bars to request and how few to accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchLimits {
    pub max_bars: usize,
    pub min_bars: usize,
}

impl Default for FetchLimits {
    fn default() -> Self {
        FetchLimits {
            max_bars: DEFAULT_MAX_BARS,
            min_bars: DEFAULT_MIN_BARS,
        }
    }
}

/// Batch-wide cancellation flag, cheap to clone into workers and adapters.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SymbolListError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

/// Parse a comma-separated symbol list, uppercasing each entry.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, SymbolListError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(SymbolListError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(SymbolListError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

/// Cross product in symbol-major order.
pub fn expand_pairs(symbols: &[String], timeframes: &[Timeframe]) -> Vec<RunKey> {
    symbols
        .iter()
        .flat_map(|s| timeframes.iter().map(move |&tf| RunKey::new(s.clone(), tf)))
        .collect()
}

/// Fetch, check and backtest one pair.
pub fn run_pair(
    data_port: &dyn DataPort,
    key: &RunKey,
    config: &BacktestConfig,
    limits: FetchLimits,
) -> Result<BacktestReport, ConfluenceError> {
    let unavailable = |reason: String| ConfluenceError::DataUnavailable {
        symbol: key.symbol.clone(),
        timeframe: key.timeframe,
        reason,
    };

    let bars = data_port
        .fetch_bars(&key.symbol, key.timeframe, limits.max_bars)
        .map_err(|e| match e {
            ConfluenceError::Provider { reason } => unavailable(reason),
            ConfluenceError::Io(io) => unavailable(io.to_string()),
            other => other,
        })?;

    if bars.is_empty() {
        return Err(unavailable("no bars returned".to_string()));
    }
    if bars.len() < limits.min_bars {
        return Err(ConfluenceError::InsufficientData {
            symbol: key.symbol.clone(),
            timeframe: key.timeframe,
            bars: bars.len(),
            minimum: limits.min_bars,
        });
    }
    if let Some(bad) = bars.iter().find(|b| !b.is_finite()) {
        return Err(unavailable(format!(
            "non-finite value in bar at {}",
            bad.timestamp
        )));
    }
    if !is_strictly_increasing(&bars) {
        return Err(unavailable(
            "bars are not in strictly increasing time order".to_string(),
        ));
    }

    run_backtest(&bars, config)
}

fn run_record(
    data_port: &dyn DataPort,
    key: &RunKey,
    config: &BacktestConfig,
    limits: FetchLimits,
    cancel: &CancelToken,
) -> BatchRecord {
    if cancel.is_cancelled() {
        return BatchRecord {
            key: key.clone(),
            outcome: RunOutcome::Failed {
                reason: "cancelled".to_string(),
            },
        };
    }

    let outcome = match run_pair(data_port, key, config, limits) {
        Ok(report) => {
            info!(
                "{}: {} bars, {} round trips, final balance {:.2}",
                key,
                report.bar_count,
                report.result.total_trades,
                report.result.final_balance
            );
            RunOutcome::Completed(report)
        }
        Err(e) => {
            if e.is_data_error() {
                warn!("skipping {} ({})", key, e);
            } else {
                error!("run {} aborted: {}", key, e);
            }
            RunOutcome::Failed {
                reason: e.to_string(),
            }
        }
    };

    BatchRecord {
        key: key.clone(),
        outcome,
    }
}

/// Run every pair on a pool of `jobs` threads (0 = one per CPU).
///
/// Configuration errors are returned before any run starts; everything after
/// that becomes a per-pair record.
pub fn run_batch(
    data_port: &dyn DataPort,
    pairs: &[RunKey],
    config: &BacktestConfig,
    limits: FetchLimits,
    jobs: usize,
    cancel: &CancelToken,
) -> Result<Vec<BatchRecord>, ConfluenceError> {
    config.validate()?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| ConfluenceError::invalid_parameter("jobs", e.to_string()))?;

    info!(
        "running {} pairs on {} worker threads",
        pairs.len(),
        pool.current_num_threads()
    );

    let records: Vec<BatchRecord> = pool.install(|| {
        pairs
            .par_iter()
            .map(|key| run_record(data_port, key, config, limits, cancel))
            .collect()
    });

    let failed = records.iter().filter(|r| !r.is_completed()).count();
    if failed > 0 {
        warn!("{} of {} pairs failed", failed, records.len());
    }

    Ok(records)
}

/// Hand records to the sink in order. Write failures are logged and skipped.
/// Returns how many records were written.
pub fn write_records(records: &[BatchRecord], sink: &mut dyn ResultSink) -> usize {
    let mut written = 0;
    for record in records {
        match sink.write_record(record) {
            Ok(()) => written += 1,
            Err(e) => warn!("failed to write result for {}: {}", record.key, e),
        }
    }
    if let Err(e) = sink.finish() {
        warn!("failed to flush results: {}", e);
    }
    written
}
