//! Historical bar provider port.

use crate::domain::bar::Bar;
use crate::domain::error::ConfluenceError;
use crate::domain::timeframe::Timeframe;

/// Source of historical bars.
///
/// Implementations return at most `max_count` of the most recent bars in
/// chronological order, possibly fewer. Shared across batch worker threads.
pub trait DataPort: Send + Sync {
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        max_count: usize,
    ) -> Result<Vec<Bar>, ConfluenceError>;

    fn list_symbols(&self, timeframe: Timeframe) -> Result<Vec<String>, ConfluenceError>;
}

/// Keep the newest `max_count` bars.
pub fn take_latest(mut bars: Vec<Bar>, max_count: usize) -> Vec<Bar> {
    if bars.len() > max_count {
        bars.drain(..bars.len() - max_count);
    }
    bars
}
