//! Time sources accepted by the rolling window.
//!
//! The window never reads a clock itself. Callers hand it timestamps of any
//! type implementing [`Timestamp`], which keeps the counter deterministic and
//! lets tests drive it with plain [`Duration`] offsets.

use std::fmt::Debug;
use std::time::{Duration, Instant, SystemTime};

/// A point in time the window can measure spans from.
pub trait Timestamp: Copy + Debug + Send {
    /// Span from `earlier` to `self`, or `None` when `self` precedes `earlier`.
    fn duration_since(&self, earlier: Self) -> Option<Duration>;

    /// Amount by which `self` precedes `later`. Zero when it does not.
    fn duration_until(&self, later: Self) -> Duration {
        later.duration_since(*self).unwrap_or_default()
    }

    /// The timestamp `span` after `self`.
    ///
    /// The window only advances towards timestamps it has been given, so the
    /// result is always representable.
    fn advance(self, span: Duration) -> Self;
}

impl Timestamp for Instant {
    #[inline]
    fn duration_since(&self, earlier: Self) -> Option<Duration> {
        self.checked_duration_since(earlier)
    }

    #[inline]
    fn advance(self, span: Duration) -> Self {
        self + span
    }
}

impl Timestamp for SystemTime {
    #[inline]
    fn duration_since(&self, earlier: Self) -> Option<Duration> {
        SystemTime::duration_since(self, earlier).ok()
    }

    #[inline]
    fn advance(self, span: Duration) -> Self {
        self + span
    }
}

/// Offsets from an arbitrary origin.
impl Timestamp for Duration {
    #[inline]
    fn duration_since(&self, earlier: Self) -> Option<Duration> {
        self.checked_sub(earlier)
    }

    #[inline]
    fn advance(self, span: Duration) -> Self {
        self + span
    }
}

/// `unit * n` as a [`Duration`], or `None` when it overflows.
pub(crate) fn span_of(unit: Duration, n: u128) -> Option<Duration> {
    let nanos = unit.as_nanos().checked_mul(n)?;
    let secs = u64::try_from(nanos / NANOS_PER_SEC).ok()?;
    Some(Duration::new(secs, (nanos % NANOS_PER_SEC) as u32))
}

const NANOS_PER_SEC: u128 = 1_000_000_000;
