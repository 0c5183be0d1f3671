//! Core trait for outcome counters.
//!
//! Producers that only need to record outcomes can take any
//! [`OutcomeRecorder`] instead of a concrete window type.

use std::sync::Arc;

use crate::error::{ReportResult, TryReportResult};
use crate::sink::SnapshotSink;
use crate::timestamp::Timestamp;
use crate::window::{Bucket, Category, RollingWindowCounter};

/// Something producers can report categorized events into.
pub trait OutcomeRecorder<T: Timestamp>: Send + Sync {
    /// Records one event, waiting for exclusive access if needed.
    ///
    /// # Returns
    /// * `Ok(())` if the event was counted
    /// * `Err(StaleReport)` if `timestamp` is too old to be counted
    fn report(&self, category: Category, timestamp: T) -> ReportResult;

    /// Records one event without waiting for exclusive access.
    fn try_report(&self, category: Category, timestamp: T) -> TryReportResult;

    /// Per-category sums of everything currently held.
    fn totals(&self) -> Bucket;
}

impl<T, S> OutcomeRecorder<T> for RollingWindowCounter<T, S>
where
    T: Timestamp,
    S: SnapshotSink<T>,
{
    #[inline(always)]
    fn report(&self, category: Category, timestamp: T) -> ReportResult {
        self.report(category, timestamp)
    }

    #[inline(always)]
    fn try_report(&self, category: Category, timestamp: T) -> TryReportResult {
        self.try_report(category, timestamp)
    }

    #[inline(always)]
    fn totals(&self) -> Bucket {
        self.totals()
    }
}

impl<T, R> OutcomeRecorder<T> for Arc<R>
where
    T: Timestamp,
    R: OutcomeRecorder<T> + ?Sized,
{
    #[inline]
    fn report(&self, category: Category, timestamp: T) -> ReportResult {
        (**self).report(category, timestamp)
    }

    #[inline]
    fn try_report(&self, category: Category, timestamp: T) -> TryReportResult {
        (**self).try_report(category, timestamp)
    }

    #[inline]
    fn totals(&self) -> Bucket {
        (**self).totals()
    }
}
