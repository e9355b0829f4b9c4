//! In-memory result collector.

use crate::domain::batch::BatchRecord;
use crate::domain::error::ConfluenceError;
use crate::ports::result_sink::ResultSink;

#[derive(Debug, Default)]
pub struct MemoryResultSink {
    pub records: Vec<BatchRecord>,
}

impl MemoryResultSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultSink for MemoryResultSink {
    fn write_record(&mut self, record: &BatchRecord) -> Result<(), ConfluenceError> {
        self.records.push(record.clone());
        Ok(())
    }
}
