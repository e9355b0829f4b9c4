#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use confluence::domain::bar::Bar;
use confluence::domain::error::ConfluenceError;
use confluence::domain::timeframe::Timeframe;
use confluence::ports::data_port::{DataPort, take_latest};
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<(String, Timeframe), Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, timeframe: Timeframe, bars: Vec<Bar>) -> Self {
        self.data.insert((symbol.to_string(), timeframe), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        max_count: usize,
    ) -> Result<Vec<Bar>, ConfluenceError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(ConfluenceError::Provider {
                reason: reason.clone(),
            });
        }
        let bars = self
            .data
            .get(&(symbol.to_string(), timeframe))
            .cloned()
            .unwrap_or_default();
        Ok(take_latest(bars, max_count))
    }

    fn list_symbols(&self, timeframe: Timeframe) -> Result<Vec<String>, ConfluenceError> {
        let mut symbols: Vec<String> = self
            .data
            .keys()
            .filter(|(_, tf)| *tf == timeframe)
            .map(|(s, _)| s.clone())
            .collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// One bar per hour with open = high = low = close.
pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            timestamp: start_time() + Timeframe::H1.interval() * i as i32,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
        })
        .collect()
}

/// Bars with a ±1 high/low envelope around each close.
pub fn ranged_bars(closes: &[f64]) -> Vec<Bar> {
    bars_from_closes(closes)
        .into_iter()
        .map(|b| Bar {
            high: b.close + 1.0,
            low: b.close - 1.0,
            ..b
        })
        .collect()
}

/// 20 bars at 100, 4 at 80, 6 at 130.
pub fn dip_and_spike() -> Vec<Bar> {
    let mut closes = vec![100.0; 20];
    closes.extend([80.0; 4]);
    closes.extend([130.0; 6]);
    bars_from_closes(&closes)
}

pub fn rising(count: usize, start: f64) -> Vec<Bar> {
    let closes: Vec<f64> = (0..count).map(|i| start + i as f64).collect();
    ranged_bars(&closes)
}

/// Render bars in the CSV adapter's file format.
pub fn to_csv(bars: &[Bar]) -> String {
    let mut out = String::from("timestamp,open,high,low,close,volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.timestamp.format("%Y-%m-%d %H:%M:%S"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    out
}
