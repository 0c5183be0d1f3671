//! error.rs
//! Defines the report and configuration error/result types.

use std::time::Duration;

use thiserror::Error;

/// The reported timestamp precedes the window floor.
///
/// This is an expected outcome for out-of-order delivery: the event is
/// discarded and the window is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("stale report: timestamp is {behind:?} behind the window start")]
pub struct StaleReport {
    /// How far the timestamp lies before `window_start`.
    pub behind: Duration,
}

/// Result type for blocking reports.
pub type ReportResult = Result<(), StaleReport>;

/// Error type for the non-blocking report path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TryReportError {
    /// The timestamp precedes the window floor.
    #[error(transparent)]
    Stale(#[from] StaleReport),
    /// The window lock is held by another producer.
    #[error("contention failure: window is locked by another report, please retry")]
    Contended,
}

/// Result type for non-blocking reports.
pub type TryReportResult = Result<(), TryReportError>;

/// Rejected window configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("bucket_unit must be greater than 0")]
    ZeroBucketUnit,
    #[error("bucket_count must be greater than 0")]
    ZeroBucketCount,
    /// `bucket_unit * bucket_count` does not fit in a [`Duration`].
    #[error("window span overflows: {bucket_count} buckets of {bucket_unit:?}")]
    SpanOverflow {
        bucket_unit: Duration,
        bucket_count: usize,
    },
}
