//! OHLCV bar representation.

use chrono::{DateTime, NaiveDateTime};

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    /// Bar open time (UTC).
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Build a bar from an epoch-milliseconds open time.
    pub fn from_millis(
        open_time_ms: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Option<Self> {
        let timestamp = DateTime::from_timestamp_millis(open_time_ms)?.naive_utc();
        Some(Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    pub fn open_time_millis(&self) -> i64 {
        self.timestamp.and_utc().timestamp_millis()
    }

    /// True when every price and the volume are finite numbers.
    pub fn is_finite(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// True when every timestamp is strictly greater than its predecessor.
pub fn is_strictly_increasing(bars: &[Bar]) -> bool {
    bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp)
}
