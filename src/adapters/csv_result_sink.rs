//! CSV results table.
//!
//! One row per (symbol, timeframe). Failed runs keep their key columns and
//! leave every metric cell empty.

use crate::domain::batch::BatchRecord;
use crate::domain::error::ConfluenceError;
use crate::ports::result_sink::ResultSink;
use serde::Serialize;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

#[derive(Debug, Serialize)]
struct ResultRow<'a> {
    #[serde(rename = "Symbol")]
    symbol: &'a str,
    #[serde(rename = "Timeframe")]
    timeframe: &'a str,
    #[serde(rename = "Final Balance")]
    final_balance: Option<f64>,
    #[serde(rename = "Profit")]
    profit: Option<f64>,
    #[serde(rename = "Max Drawdown (%)")]
    max_drawdown_pct: Option<f64>,
    #[serde(rename = "Hit Rate (%)")]
    hit_rate_pct: Option<f64>,
    #[serde(rename = "Total Trades")]
    total_trades: Option<usize>,
}

impl<'a> From<&'a BatchRecord> for ResultRow<'a> {
    fn from(record: &'a BatchRecord) -> Self {
        let result = record.result();
        ResultRow {
            symbol: &record.key.symbol,
            timeframe: record.key.timeframe.as_str(),
            final_balance: result.map(|r| r.final_balance),
            profit: result.map(|r| r.profit),
            max_drawdown_pct: result.map(|r| r.max_drawdown_pct),
            hit_rate_pct: result.map(|r| r.hit_rate_pct),
            total_trades: result.map(|r| r.total_trades),
        }
    }
}

pub struct CsvResultSink<W: Write> {
    writer: csv::Writer<W>,
}

fn csv_error(e: csv::Error) -> ConfluenceError {
    ConfluenceError::Io(io::Error::other(e))
}

impl CsvResultSink<File> {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, ConfluenceError> {
        Ok(Self::from_writer(File::create(path)?))
    }
}

impl<W: Write> CsvResultSink<W> {
    pub fn from_writer(writer: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(writer),
        }
    }

    pub fn into_inner(self) -> Result<W, ConfluenceError> {
        self.writer
            .into_inner()
            .map_err(|e| ConfluenceError::Io(io::Error::other(e.to_string())))
    }
}

impl<W: Write> ResultSink for CsvResultSink<W> {
    fn write_record(&mut self, record: &BatchRecord) -> Result<(), ConfluenceError> {
        self.writer
            .serialize(ResultRow::from(record))
            .map_err(csv_error)
    }

    fn finish(&mut self) -> Result<(), ConfluenceError> {
        self.writer.flush()?;
        Ok(())
    }
}
