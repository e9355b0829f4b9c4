//! Batch result sink port.

use crate::domain::batch::BatchRecord;
use crate::domain::error::ConfluenceError;

/// Write-only destination for batch records, keyed by (symbol, timeframe).
pub trait ResultSink {
    fn write_record(&mut self, record: &BatchRecord) -> Result<(), ConfluenceError>;

    /// Flush buffered output. Called once after the last record.
    fn finish(&mut self) -> Result<(), ConfluenceError> {
        Ok(())
    }
}
