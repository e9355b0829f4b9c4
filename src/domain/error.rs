//! Domain error types.

use crate::domain::timeframe::Timeframe;

/// Top-level error type for confluence.
#[derive(Debug, thiserror::Error)]
pub enum ConfluenceError {
    #[error("no data for {symbol} ({timeframe}): {reason}")]
    DataUnavailable {
        symbol: String,
        timeframe: Timeframe,
        reason: String,
    },

    #[error("insufficient data for {symbol} ({timeframe}): have {bars} bars, need {minimum}")]
    InsufficientData {
        symbol: String,
        timeframe: Timeframe,
        bars: usize,
        minimum: usize,
    },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data provider error: {reason}")]
    Provider { reason: String },

    #[error("invariant violated: {reason}")]
    InvariantViolation { reason: String },

    #[error("batch cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ConfluenceError {
    pub fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        ConfluenceError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Errors caused by a single (symbol, timeframe) run's input data, as
    /// opposed to invariant breaks or cancellation. The batch logs the former
    /// as skipped pairs and the latter as aborted runs.
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            ConfluenceError::DataUnavailable { .. }
                | ConfluenceError::InsufficientData { .. }
                | ConfluenceError::Provider { .. }
        )
    }
}

impl From<&ConfluenceError> for std::process::ExitCode {
    fn from(err: &ConfluenceError) -> Self {
        let code: u8 = match err {
            ConfluenceError::Io(_) => 1,
            ConfluenceError::ConfigParse { .. }
            | ConfluenceError::ConfigMissing { .. }
            | ConfluenceError::ConfigInvalid { .. }
            | ConfluenceError::InvalidParameter { .. } => 2,
            ConfluenceError::Provider { .. } => 3,
            ConfluenceError::DataUnavailable { .. } | ConfluenceError::InsufficientData { .. } => 5,
            ConfluenceError::InvariantViolation { .. } => 6,
            ConfluenceError::Cancelled => 7,
        };
        std::process::ExitCode::from(code)
    }
}
