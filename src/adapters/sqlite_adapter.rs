//! SQLite bar store.

use crate::domain::bar::Bar;
use crate::domain::error::ConfluenceError;
use crate::domain::timeframe::Timeframe;
use crate::ports::data_port::DataPort;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;

pub const DEFAULT_POOL_SIZE: u32 = 4;

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_error(e: r2d2::Error) -> ConfluenceError {
    ConfluenceError::Provider {
        reason: format!("sqlite pool: {}", e),
    }
}

fn query_error(e: rusqlite::Error) -> ConfluenceError {
    ConfluenceError::Provider {
        reason: format!("sqlite query: {}", e),
    }
}

impl SqliteAdapter {
    /// Open (or create) a database file and make sure the schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ConfluenceError> {
        let manager = SqliteConnectionManager::file(path.as_ref());
        let pool = Pool::builder()
            .max_size(DEFAULT_POOL_SIZE)
            .build(manager)
            .map_err(pool_error)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, ConfluenceError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, ConfluenceError> {
        self.pool.get().map_err(pool_error)
    }

    pub fn initialize_schema(&self) -> Result<(), ConfluenceError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS bars (
                    symbol TEXT NOT NULL,
                    timeframe TEXT NOT NULL,
                    open_time_ms INTEGER NOT NULL,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    volume REAL NOT NULL,
                    PRIMARY KEY (symbol, timeframe, open_time_ms)
                );",
            )
            .map_err(query_error)
    }

    /// Upsert bars for one series in a single transaction.
    pub fn insert_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        bars: &[Bar],
    ) -> Result<usize, ConfluenceError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_error)?;

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO bars
                    (symbol, timeframe, open_time_ms, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    symbol,
                    timeframe.as_str(),
                    bar.open_time_millis(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        Ok(bars.len())
    }
}

impl DataPort for SqliteAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        max_count: usize,
    ) -> Result<Vec<Bar>, ConfluenceError> {
        let conn = self.conn()?;
        let limit = i64::try_from(max_count).unwrap_or(i64::MAX);

        // newest first so LIMIT keeps the latest bars, reversed below
        let mut stmt = conn
            .prepare(
                "SELECT open_time_ms, open, high, low, close, volume
                 FROM bars
                 WHERE symbol = ?1 AND timeframe = ?2
                 ORDER BY open_time_ms DESC
                 LIMIT ?3",
            )
            .map_err(query_error)?;

        let rows = stmt
            .query_map(params![symbol, timeframe.as_str(), limit], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, f64>(5)?,
                ))
            })
            .map_err(query_error)?;

        let mut bars = Vec::new();
        for row in rows {
            let (ms, open, high, low, close, volume) = row.map_err(query_error)?;
            let bar = Bar::from_millis(ms, open, high, low, close, volume).ok_or_else(|| {
                ConfluenceError::Provider {
                    reason: format!("open_time_ms {} out of range", ms),
                }
            })?;
            bars.push(bar);
        }

        bars.reverse();
        Ok(bars)
    }

    fn list_symbols(&self, timeframe: Timeframe) -> Result<Vec<String>, ConfluenceError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT symbol FROM bars WHERE timeframe = ?1 ORDER BY symbol")
            .map_err(query_error)?;

        let rows = stmt
            .query_map(params![timeframe.as_str()], |row| row.get(0))
            .map_err(query_error)?;

        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row.map_err(query_error)?);
        }
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR_MS: i64 = 3_600_000;

    fn bars(start_ms: i64, closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                Bar::from_millis(start_ms + i as i64 * HOUR_MS, c, c + 1.0, c - 1.0, c, 10.5)
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn in_memory_initialization() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        // idempotent
        adapter.initialize_schema().unwrap();
    }

    #[test]
    fn fetch_returns_latest_in_order() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        let start = 1_704_067_200_000;
        adapter
            .insert_bars("BTCUSDT", Timeframe::H1, &bars(start, &[1.0, 2.0, 3.0, 4.0, 5.0]))
            .unwrap();

        let fetched = adapter.fetch_bars("BTCUSDT", Timeframe::H1, 3).unwrap();
        let closes: Vec<f64> = fetched.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![3.0, 4.0, 5.0]);
        assert_eq!(fetched[0].open_time_millis(), start + 2 * HOUR_MS);
        assert_eq!(fetched[0].volume, 10.5);
        assert_eq!(fetched[0].high, 4.0);
    }

    #[test]
    fn fetch_is_scoped_by_timeframe() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter
            .insert_bars("BTCUSDT", Timeframe::H1, &bars(0, &[1.0, 2.0]))
            .unwrap();

        assert_eq!(adapter.fetch_bars("BTCUSDT", Timeframe::H1, 10).unwrap().len(), 2);
        assert!(adapter.fetch_bars("BTCUSDT", Timeframe::D1, 10).unwrap().is_empty());
        assert!(adapter.fetch_bars("ETHUSDT", Timeframe::H1, 10).unwrap().is_empty());
    }

    #[test]
    fn reinserting_replaces_rows() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter
            .insert_bars("BTCUSDT", Timeframe::M5, &bars(0, &[1.0, 2.0]))
            .unwrap();
        adapter
            .insert_bars("BTCUSDT", Timeframe::M5, &bars(0, &[7.0]))
            .unwrap();

        let fetched = adapter.fetch_bars("BTCUSDT", Timeframe::M5, 10).unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].close, 7.0);
    }

    #[test]
    fn list_symbols_per_timeframe() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter
            .insert_bars("ETHUSDT", Timeframe::H1, &bars(0, &[1.0]))
            .unwrap();
        adapter
            .insert_bars("BTCUSDT", Timeframe::H1, &bars(0, &[1.0]))
            .unwrap();
        adapter
            .insert_bars("SOLUSDT", Timeframe::D1, &bars(0, &[1.0]))
            .unwrap();

        assert_eq!(
            adapter.list_symbols(Timeframe::H1).unwrap(),
            vec!["BTCUSDT", "ETHUSDT"]
        );
        assert_eq!(adapter.list_symbols(Timeframe::D1).unwrap(), vec!["SOLUSDT"]);
    }

    #[test]
    fn open_creates_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bars.db");
        let adapter = SqliteAdapter::open(&path).unwrap();
        adapter
            .insert_bars("BTCUSDT", Timeframe::D1, &bars(0, &[1.0]))
            .unwrap();
        drop(adapter);

        let reopened = SqliteAdapter::open(&path).unwrap();
        assert_eq!(reopened.fetch_bars("BTCUSDT", Timeframe::D1, 5).unwrap().len(), 1);
    }
}
