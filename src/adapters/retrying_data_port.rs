//! Retry wrapper around any [`DataPort`].

use crate::domain::bar::Bar;
use crate::domain::batch::CancelToken;
use crate::domain::error::ConfluenceError;
use crate::domain::timeframe::Timeframe;
use crate::ports::data_port::DataPort;
use log::warn;
use std::thread;
use std::time::{Duration, Instant};

/// Longest single wait between attempts.
const MAX_DELAY: Duration = Duration::from_secs(30);
/// Granularity at which a sleeping retry notices cancellation.
const CANCEL_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first, at least 1.
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// `base_delay` × 2^(attempt-1), capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(MAX_DELAY)
    }
}

pub struct RetryingDataPort<P> {
    inner: P,
    policy: RetryPolicy,
    cancel: CancelToken,
}

impl<P: DataPort> RetryingDataPort<P> {
    pub fn new(inner: P, policy: RetryPolicy, cancel: CancelToken) -> Self {
        Self {
            inner,
            policy,
            cancel,
        }
    }

    /// `DataUnavailable` (missing or malformed series) fails the same way on
    /// every attempt, so only provider and I/O errors are retried.
    fn is_transient(err: &ConfluenceError) -> bool {
        matches!(err, ConfluenceError::Provider { .. } | ConfluenceError::Io(_))
    }

    /// Sleep for `delay`, waking early on cancellation. Returns false if cancelled.
    fn wait(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            if self.cancel.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(CANCEL_POLL));
        }
    }

    fn with_retry<T>(
        &self,
        context: &str,
        mut operation: impl FnMut() -> Result<T, ConfluenceError>,
    ) -> Result<T, ConfluenceError> {
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 1;

        loop {
            if self.cancel.is_cancelled() {
                return Err(ConfluenceError::Cancelled);
            }
            match operation() {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= attempts || !Self::is_transient(&err) => return Err(err),
                Err(err) => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        "Attempt {}/{} for {} failed: {}. Retrying in {}ms.",
                        attempt,
                        attempts,
                        context,
                        err,
                        delay.as_millis()
                    );
                    if !self.wait(delay) {
                        return Err(ConfluenceError::Cancelled);
                    }
                    attempt += 1;
                }
            }
        }
    }
}

impl<P: DataPort> DataPort for RetryingDataPort<P> {
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        max_count: usize,
    ) -> Result<Vec<Bar>, ConfluenceError> {
        let context = format!("{} {}", symbol, timeframe);
        self.with_retry(&context, || {
            self.inner.fetch_bars(symbol, timeframe, max_count)
        })
    }

    fn list_symbols(&self, timeframe: Timeframe) -> Result<Vec<String>, ConfluenceError> {
        let context = format!("symbol list {}", timeframe);
        self.with_retry(&context, || self.inner.list_symbols(timeframe))
    }
}
