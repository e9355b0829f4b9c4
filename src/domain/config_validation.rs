//! Configuration loading and validation.
//!
//! Every field is parsed and checked before anything runs. Absent keys take
//! their defaults; present keys that do not parse are `ConfigInvalid`.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use crate::domain::backtest::BacktestConfig;
use crate::domain::batch::{FetchLimits, parse_symbols};
use crate::domain::error::ConfluenceError;
use crate::domain::indicator::IndicatorParams;
use crate::domain::signal::{RuleKind, RuleSet};
use crate::domain::simulator::SimulationParams;
use crate::domain::timeframe::{Timeframe, parse_timeframes};
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;
pub const DEFAULT_OUTPUT: &str = "backtest_results.csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Csv,
    Sqlite,
}

impl FromStr for DataSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(DataSource::Csv),
            "sqlite" => Ok(DataSource::Sqlite),
            other => Err(format!("unknown data source '{}' (expected csv or sqlite)", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataSettings {
    pub source: DataSource,
    /// CSV directory or SQLite database file.
    pub path: PathBuf,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchSettings {
    /// Empty when `[batch] symbols` is absent.
    pub symbols: Vec<String>,
    pub timeframes: Vec<Timeframe>,
    pub jobs: usize,
}

/// Everything a run needs, parsed from one config file.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub backtest: BacktestConfig,
    pub limits: FetchLimits,
    pub data: DataSettings,
    pub batch: BatchSettings,
    pub output: PathBuf,
}

/// Parse and check the whole file.
pub fn validate_config(config: &dyn ConfigPort) -> Result<Settings, ConfluenceError> {
    let backtest = load_backtest_config(config)?;
    let limits = load_fetch_limits(config)?;
    let data = load_data_settings(config)?;
    let batch = load_batch_settings(config)?;
    let output = config
        .get_string("report", "output")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_OUTPUT.to_string());

    Ok(Settings {
        backtest,
        limits,
        data,
        batch,
        output: PathBuf::from(output),
    })
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> ConfluenceError {
    ConfluenceError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

/// Parse `[section] key`, or return `default` when absent.
fn read<T>(config: &dyn ConfigPort, section: &str, key: &str, default: T) -> Result<T, ConfluenceError>
where
    T: FromStr,
    T::Err: Display,
{
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| invalid(section, key, format!("cannot parse '{}': {}", raw.trim(), e))),
    }
}

/// Attach a config section to a parameter error raised by the domain.
fn in_section(section: &str, result: Result<(), ConfluenceError>) -> Result<(), ConfluenceError> {
    result.map_err(|e| match e {
        ConfluenceError::InvalidParameter { name, reason } => ConfluenceError::ConfigInvalid {
            section: section.to_string(),
            key: name,
            reason,
        },
        other => other,
    })
}

pub fn load_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, ConfluenceError> {
    let sim_defaults = SimulationParams::default();
    let simulation = SimulationParams {
        initial_balance: read(config, "backtest", "initial_balance", sim_defaults.initial_balance)?,
        trade_size: read(config, "backtest", "trade_size", sim_defaults.trade_size)?,
    };
    in_section("backtest", simulation.validate())?;

    let ind = IndicatorParams::default();
    let indicators = IndicatorParams {
        sma_window: read(config, "indicators", "sma_window", ind.sma_window)?,
        std_dev_factor: read(config, "indicators", "std_dev_factor", ind.std_dev_factor)?,
        stddev_convention: read(config, "indicators", "stddev", ind.stddev_convention)?,
        stochastic_k_window: read(config, "indicators", "stochastic_k_window", ind.stochastic_k_window)?,
        stochastic_d_window: read(config, "indicators", "stochastic_d_window", ind.stochastic_d_window)?,
        rsi_window: read(config, "indicators", "rsi_window", ind.rsi_window)?,
        volume_window: read(config, "indicators", "volume_window", ind.volume_window)?,
    };
    in_section("indicators", indicators.validate())?;

    let base = RuleSet::default();
    let rules = RuleSet {
        kind: read(config, "rules", "rule_set", RuleKind::default())?,
        buy_stochastic_max: read(config, "rules", "buy_stochastic_max", base.buy_stochastic_max)?,
        sell_stochastic_min: read(config, "rules", "sell_stochastic_min", base.sell_stochastic_min)?,
        buy_rsi_max: read(config, "rules", "buy_rsi_max", base.buy_rsi_max)?,
        sell_rsi_min: read(config, "rules", "sell_rsi_min", base.sell_rsi_min)?,
        volume_multiple: read(config, "rules", "volume_multiple", base.volume_multiple)?,
    };
    in_section("rules", rules.validate())?;

    Ok(BacktestConfig {
        indicators,
        rules,
        simulation,
    })
}

fn load_fetch_limits(config: &dyn ConfigPort) -> Result<FetchLimits, ConfluenceError> {
    let defaults = FetchLimits::default();
    let limits = FetchLimits {
        max_bars: read(config, "backtest", "max_bars", defaults.max_bars)?,
        min_bars: read(config, "backtest", "min_bars", defaults.min_bars)?,
    };
    if limits.max_bars == 0 {
        return Err(invalid("backtest", "max_bars", "max_bars must be at least 1"));
    }
    if limits.min_bars > limits.max_bars {
        return Err(invalid(
            "backtest",
            "min_bars",
            format!(
                "min_bars ({}) exceeds max_bars ({})",
                limits.min_bars, limits.max_bars
            ),
        ));
    }
    Ok(limits)
}

fn load_data_settings(config: &dyn ConfigPort) -> Result<DataSettings, ConfluenceError> {
    let source = read(config, "data", "source", DataSource::Csv)?;
    let path = match config.get_string("data", "path") {
        Some(p) if !p.trim().is_empty() => PathBuf::from(p.trim()),
        _ => {
            return Err(ConfluenceError::ConfigMissing {
                section: "data".to_string(),
                key: "path".to_string(),
            });
        }
    };

    let retry_attempts = read(config, "data", "retry_attempts", DEFAULT_RETRY_ATTEMPTS)?;
    if retry_attempts == 0 {
        return Err(invalid("data", "retry_attempts", "retry_attempts must be at least 1"));
    }

    Ok(DataSettings {
        source,
        path,
        retry_attempts,
        retry_delay_ms: read(config, "data", "retry_delay_ms", DEFAULT_RETRY_DELAY_MS)?,
    })
}

fn load_batch_settings(config: &dyn ConfigPort) -> Result<BatchSettings, ConfluenceError> {
    let symbols = match config.get_string("batch", "symbols") {
        Some(raw) => parse_symbols(&raw).map_err(|e| invalid("batch", "symbols", e.to_string()))?,
        None => Vec::new(),
    };

    let timeframes = match config.get_string("batch", "timeframes") {
        Some(raw) => {
            parse_timeframes(&raw).map_err(|e| invalid("batch", "timeframes", e.to_string()))?
        }
        None => Timeframe::ALL.to_vec(),
    };

    Ok(BatchSettings {
        symbols,
        timeframes,
        jobs: read(config, "batch", "jobs", 0usize)?,
    })
}
