//! CSV file data adapter.
//!
//! One file per series, `<dir>/<SYMBOL>_<timeframe>.csv`, with header
//! `timestamp,open,high,low,close,volume`.

use crate::domain::bar::Bar;
use crate::domain::error::ConfluenceError;
use crate::domain::timeframe::Timeframe;
use crate::ports::data_port::{DataPort, take_latest};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

fn provider(reason: String) -> ConfluenceError {
    ConfluenceError::Provider { reason }
}

/// Epoch milliseconds, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` or
/// `YYYY-MM-DD` (midnight).
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(ms) = raw.parse::<i64>() {
        return DateTime::from_timestamp_millis(ms).map(|dt| dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parse one numeric column; NaN and infinities are rejected.
fn field(record: &csv::StringRecord, index: usize, name: &str, line: u64) -> Result<f64, String> {
    let raw = record
        .get(index)
        .ok_or_else(|| format!("line {}: missing {} column", line, name))?
        .trim();
    let value: f64 = raw
        .parse()
        .map_err(|e| format!("line {}: invalid {} value: {}", line, name, e))?;
    if !value.is_finite() {
        return Err(format!("line {}: non-finite {} value '{}'", line, name, raw));
    }
    Ok(value)
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, timeframe))
    }

    /// Every bar in the file, sorted by timestamp.
    ///
    /// A missing file or malformed content is `DataUnavailable`, which retries
    /// cannot fix; other read failures stay `Provider`.
    pub fn read_all(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<Bar>, ConfluenceError> {
        let unavailable = |reason: String| ConfluenceError::DataUnavailable {
            symbol: symbol.to_string(),
            timeframe,
            reason,
        };

        let path = self.csv_path(symbol, timeframe);
        let content = fs::read_to_string(&path).map_err(|e| {
            let reason = format!("failed to read {}: {}", path.display(), e);
            if e.kind() == ErrorKind::NotFound {
                unavailable(reason)
            } else {
                provider(reason)
            }
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| unavailable(format!("CSV parse error: {}", e)))?;
            let line = record.position().map_or(0, |p| p.line());

            let ts_raw = record
                .get(0)
                .ok_or_else(|| unavailable(format!("line {}: missing timestamp column", line)))?;
            let timestamp = parse_timestamp(ts_raw).ok_or_else(|| {
                unavailable(format!("line {}: invalid timestamp '{}'", line, ts_raw))
            })?;

            bars.push(Bar {
                timestamp,
                open: field(&record, 1, "open", line).map_err(unavailable)?,
                high: field(&record, 2, "high", line).map_err(unavailable)?,
                low: field(&record, 3, "low", line).map_err(unavailable)?,
                close: field(&record, 4, "close", line).map_err(unavailable)?,
                volume: field(&record, 5, "volume", line).map_err(unavailable)?,
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        if let Some(dup) = bars.windows(2).find(|w| w[0].timestamp == w[1].timestamp) {
            return Err(unavailable(format!(
                "duplicate timestamp {} in {}",
                dup[0].timestamp,
                path.display()
            )));
        }

        Ok(bars)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        max_count: usize,
    ) -> Result<Vec<Bar>, ConfluenceError> {
        Ok(take_latest(self.read_all(symbol, timeframe)?, max_count))
    }

    fn list_symbols(&self, timeframe: Timeframe) -> Result<Vec<String>, ConfluenceError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            provider(format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ))
        })?;

        let suffix = format!("_{}.csv", timeframe);
        let mut symbols = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| provider(format!("directory entry error: {}", e)))?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(symbol) = name_str.strip_suffix(&suffix).filter(|s| !s.is_empty()) {
                symbols.push(symbol.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}
