use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::{ConfigError, ReportResult, StaleReport, TryReportError, TryReportResult};
use crate::sink::{IdleSpan, Snapshot, SnapshotSink, TracingSink};
use crate::timestamp::{span_of, Timestamp};
use crate::window::{Bucket, Category};

/// How far the window moves when a report lands past its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "snake_case"))]
pub enum SlideMode {
    /// Move one bucket at a time, just far enough that the new event lands
    /// in the newest bucket. Older buckets stay in the window.
    #[default]
    Bucket,
    /// Move whole window spans at a time. Every bucket is evicted per span,
    /// and the new event lands in the bucket matching its offset into the
    /// fresh span.
    Span,
}

/// Shape of a rolling window: how long each bucket lasts and how many there are.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use rolling_window_core::{NullSink, RollingWindowConfig};
///
/// let config = RollingWindowConfig::new(Duration::from_millis(500), 20);
/// assert_eq!(config.window_span(), Some(Duration::from_secs(10)));
///
/// let counter = config.build(Duration::ZERO, NullSink).unwrap();
/// assert_eq!(counter.bucket_count(), 20);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RollingWindowConfig {
    /// Length of the time slice each bucket covers.
    pub bucket_unit: Duration,
    /// Number of buckets in the ring.
    pub bucket_count: usize,
    #[cfg_attr(feature = "serde", serde(default))]
    pub slide_mode: SlideMode,
}

impl Default for RollingWindowConfig {
    /// Ten one-second buckets.
    fn default() -> Self {
        RollingWindowConfig {
            bucket_unit: Duration::from_secs(1),
            bucket_count: 10,
            slide_mode: SlideMode::Bucket,
        }
    }
}

impl RollingWindowConfig {
    pub fn new(bucket_unit: Duration, bucket_count: usize) -> Self {
        RollingWindowConfig {
            bucket_unit,
            bucket_count,
            slide_mode: SlideMode::default(),
        }
    }

    pub fn with_slide_mode(mut self, slide_mode: SlideMode) -> Self {
        self.slide_mode = slide_mode;
        self
    }

    /// Total time covered by the ring (`bucket_unit * bucket_count`).
    ///
    /// `None` if the product does not fit in a [`Duration`].
    pub fn window_span(&self) -> Option<Duration> {
        span_of(self.bucket_unit, self.bucket_count as u128)
    }

    /// Checks the configuration and returns the window span.
    pub fn validate(&self) -> Result<Duration, ConfigError> {
        if self.bucket_unit.is_zero() {
            return Err(ConfigError::ZeroBucketUnit);
        }
        if self.bucket_count == 0 {
            return Err(ConfigError::ZeroBucketCount);
        }
        self.window_span().ok_or(ConfigError::SpanOverflow {
            bucket_unit: self.bucket_unit,
            bucket_count: self.bucket_count,
        })
    }

    /// Builds a counter whose head bucket starts at `window_start`.
    pub fn build<T, S>(self, window_start: T, sink: S) -> Result<RollingWindowCounter<T, S>, ConfigError>
    where
        T: Timestamp,
        S: SnapshotSink<T>,
    {
        let window_span = self.validate()?;
        Ok(RollingWindowCounter {
            bucket_unit: self.bucket_unit,
            bucket_count: self.bucket_count,
            window_span,
            slide_mode: self.slide_mode,
            stale_reports: AtomicU64::new(0),
            state: Mutex::new(RollingWindowState {
                window_start,
                head_index: 0,
                buckets: vec![Bucket::default(); self.bucket_count],
                sink,
            }),
        })
    }
}

/// Time-bucketed rolling counter of request outcomes.
///
/// The window is a ring of `bucket_count` buckets, each covering
/// `bucket_unit` of time. The bucket at ring position
/// `(head_index + k) % bucket_count` always covers
/// `[window_start + k * bucket_unit, window_start + (k + 1) * bucket_unit)`.
///
/// # Algorithm Behavior
///
/// - A report lands in the bucket covering its timestamp
/// - A report beyond the end of the window slides it forward: the head bucket
///   is handed to the sink as a [`Snapshot`], reset, and reused as the new
///   tail, until the timestamp fits. [`SlideMode`] picks whether the window
///   stops as soon as it fits or keeps going to the next span boundary
/// - A report older than `window_start` is rejected with [`StaleReport`]
/// - A jump of many window spans evicts each real bucket once, then describes
///   the remaining empty laps with a single [`IdleSpan`], so the work done per
///   report never exceeds `bucket_count` evictions
///
/// # Thread Safety
///
/// All state sits behind one mutex. [`report`](Self::report) blocks for the
/// lock; [`try_report`](Self::try_report) fails fast with
/// [`TryReportError::Contended`] instead. The sink runs with the lock held.
///
/// # Example
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use std::time::Duration;
/// use rolling_window_core::{Category, RollingWindowCounter, Snapshot};
///
/// let evicted = Arc::new(Mutex::new(Vec::new()));
/// let sink = {
///     let evicted = Arc::clone(&evicted);
///     move |s: Snapshot<Duration>| evicted.lock().unwrap().push(s)
/// };
///
/// // Three one-second buckets starting at t = 0.
/// let counter = RollingWindowCounter::with_sink(Duration::ZERO, Duration::from_secs(1), 3, sink);
///
/// counter.report(Category::Success, Duration::from_millis(500)).unwrap();
/// counter.report(Category::Failure, Duration::from_millis(1_200)).unwrap();
///
/// // t = 3.4s is past the window [0s, 3s): the head bucket [0s, 1s) goes.
/// counter.report(Category::Timeout, Duration::from_millis(3_400)).unwrap();
///
/// let evicted = evicted.lock().unwrap();
/// assert_eq!(evicted.len(), 1);
/// assert_eq!(evicted[0].success, 1);
/// assert_eq!(evicted[0].range_end, Duration::from_secs(1));
/// assert_eq!(counter.window_start(), Duration::from_secs(1));
/// assert_eq!(counter.totals().failure, 1);
/// ```
pub struct RollingWindowCounter<T, S = TracingSink> {
    /// Duration of each bucket
    bucket_unit: Duration,
    /// Number of buckets in the ring
    bucket_count: usize,
    /// bucket_unit * bucket_count
    window_span: Duration,
    /// Whether a slide moves by buckets or by whole spans
    slide_mode: SlideMode,
    /// Reports rejected for preceding the window
    stale_reports: AtomicU64,
    /// Internal state protected by mutex for thread safety
    state: Mutex<RollingWindowState<T, S>>,
}

/// Internal state of the rolling window
struct RollingWindowState<T, S> {
    /// Start of the head bucket
    window_start: T,
    /// Ring index of the head bucket
    head_index: usize,
    /// Event counters (circular array)
    buckets: Vec<Bucket>,
    /// Destination of evicted buckets
    sink: S,
}

impl<T: Timestamp> RollingWindowCounter<T, TracingSink> {
    /// Creates a counter that logs evicted buckets through `tracing`.
    ///
    /// # Panics
    ///
    /// Panics if `bucket_unit` or `bucket_count` is zero, or if the window
    /// span overflows a [`Duration`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::time::{Duration, Instant};
    /// use rolling_window_core::RollingWindowCounter;
    ///
    /// // Ten one-second buckets starting now.
    /// let counter = RollingWindowCounter::new(Instant::now(), Duration::from_secs(1), 10);
    /// assert_eq!(counter.window_span(), Duration::from_secs(10));
    /// ```
    pub fn new(window_start: T, bucket_unit: Duration, bucket_count: usize) -> Self {
        Self::with_sink(window_start, bucket_unit, bucket_count, TracingSink::new())
    }
}

impl<T, S> RollingWindowCounter<T, S>
where
    T: Timestamp,
    S: SnapshotSink<T>,
{
    /// Creates a counter that hands evicted buckets to `sink`.
    ///
    /// # Panics
    ///
    /// Panics if `bucket_unit` or `bucket_count` is zero, or if the window
    /// span overflows a [`Duration`]. Use [`RollingWindowConfig::build`] to
    /// get the error back instead.
    pub fn with_sink(window_start: T, bucket_unit: Duration, bucket_count: usize, sink: S) -> Self {
        assert!(!bucket_unit.is_zero(), "bucket_unit must be greater than 0");
        assert!(bucket_count > 0, "bucket_count must be greater than 0");

        match RollingWindowConfig::new(bucket_unit, bucket_count).build(window_start, sink) {
            Ok(counter) => counter,
            Err(err) => panic!("{}", err),
        }
    }

    /// Records one event of `category` at `timestamp`.
    ///
    /// Slides the window first if `timestamp` lies past its end, emitting
    /// every bucket that falls off the head.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The event was counted
    /// * `Err(StaleReport)` - `timestamp` precedes `window_start`; nothing changed
    pub fn report(&self, category: Category, timestamp: T) -> ReportResult {
        let mut state = self.lock();
        self.record(&mut state, category, timestamp)
    }

    /// Like [`report`](Self::report), but returns
    /// [`TryReportError::Contended`] instead of waiting for the lock.
    pub fn try_report(&self, category: Category, timestamp: T) -> TryReportResult {
        let mut state = match self.state.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(TryReportError::Contended),
            Err(TryLockError::Poisoned(poisoned)) => {
                warn!("recovering rolling window state after a panicking sink");
                poisoned.into_inner()
            }
        };
        Ok(self.record(&mut state, category, timestamp)?)
    }

    /// Slides the window as if an event had arrived at `timestamp`, without
    /// counting one.
    ///
    /// Lets an idle caller force expired buckets out to the sink.
    pub fn flush_through(&self, timestamp: T) -> ReportResult {
        let mut state = self.lock();
        self.locate(&mut state, timestamp).map(|_| ())
    }

    #[inline]
    pub fn bucket_unit(&self) -> Duration {
        self.bucket_unit
    }

    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    #[inline]
    pub fn window_span(&self) -> Duration {
        self.window_span
    }

    #[inline]
    pub fn slide_mode(&self) -> SlideMode {
        self.slide_mode
    }

    /// Start of the head bucket; reports before it are stale.
    pub fn window_start(&self) -> T {
        self.lock().window_start
    }

    /// Ring index of the head bucket.
    pub fn head_index(&self) -> usize {
        self.lock().head_index
    }

    /// Number of reports rejected as stale so far.
    pub fn stale_reports(&self) -> u64 {
        self.stale_reports.load(Ordering::Relaxed)
    }

    /// The live buckets with their time ranges, oldest first.
    ///
    /// Nothing is evicted or reset.
    pub fn current_snapshots(&self) -> Vec<Snapshot<T>> {
        let state = self.lock();
        let mut range_start = state.window_start;
        (0..self.bucket_count)
            .map(|k| {
                let range_end = range_start.advance(self.bucket_unit);
                let bucket = &state.buckets[(state.head_index + k) % self.bucket_count];
                let snapshot = Snapshot::new(range_start, range_end, bucket);
                range_start = range_end;
                snapshot
            })
            .collect()
    }

    /// Per-category sums over the live buckets.
    pub fn totals(&self) -> Bucket {
        let state = self.lock();
        state.buckets.iter().fold(Bucket::default(), |mut acc, bucket| {
            acc.absorb(bucket);
            acc
        })
    }

    /// Consumes the counter and returns its sink.
    ///
    /// Live buckets are discarded without being emitted.
    pub fn into_sink(self) -> S {
        let state = match self.state.into_inner() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.sink
    }

    fn lock(&self) -> MutexGuard<'_, RollingWindowState<T, S>> {
        // Every sink call happens after the ring is consistent again, so a
        // panicking sink cannot leave a half-rotated window behind.
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("recovering rolling window state after a panicking sink");
            poisoned.into_inner()
        })
    }

    fn record(&self, state: &mut RollingWindowState<T, S>, category: Category, timestamp: T) -> ReportResult {
        let index = self.locate(state, timestamp)?;
        state.buckets[index].update(category);
        Ok(())
    }

    /// Slides the window until `timestamp` fits and returns the ring index of
    /// the bucket covering it.
    fn locate(&self, state: &mut RollingWindowState<T, S>, timestamp: T) -> Result<usize, StaleReport> {
        let delta = match timestamp.duration_since(state.window_start) {
            Some(delta) => delta,
            None => return Err(self.reject(state, timestamp)),
        };

        let count = self.bucket_count as u128;
        let mut offset = delta.as_nanos() / self.bucket_unit.as_nanos();
        if offset >= count {
            let steps = match self.slide_mode {
                SlideMode::Bucket => offset - (count - 1),
                SlideMode::Span => offset / count * count,
            };
            self.slide(state, steps);
            offset -= steps;
        }

        Ok(((state.head_index as u128 + offset) % count) as usize)
    }

    /// Evicts `steps` buckets from the head of the window.
    ///
    /// At most one lap of buckets is evicted individually; whatever lies
    /// beyond that is empty and goes to the sink as one [`IdleSpan`].
    fn slide(&self, state: &mut RollingWindowState<T, S>, steps: u128) {
        let count = self.bucket_count as u128;
        let evicted = steps.min(count) as usize;

        for _ in 0..evicted {
            let head = state.head_index;
            let range_start = state.window_start;
            let range_end = range_start.advance(self.bucket_unit);

            let snapshot = Snapshot::new(range_start, range_end, &state.buckets[head]);
            state.buckets[head].reset();
            state.window_start = range_end;
            state.head_index = (head + 1) % self.bucket_count;

            state.sink.evict(snapshot);
        }

        let idle = steps - evicted as u128;
        if idle > 0 {
            let range_start = state.window_start;
            // Never beyond the timestamp that caused the slide.
            let skipped = span_of(self.bucket_unit, idle).unwrap_or(Duration::MAX);
            state.window_start = range_start.advance(skipped);
            state.head_index = ((state.head_index as u128 + idle) % count) as usize;

            state.sink.evict_idle(IdleSpan {
                range_start,
                bucket_unit: self.bucket_unit,
                count: idle,
            });
        }

        trace!(
            evicted,
            idle = %idle,
            head_index = state.head_index,
            window_start = ?state.window_start,
            "window slid"
        );
    }

    fn reject(&self, state: &RollingWindowState<T, S>, timestamp: T) -> StaleReport {
        let behind = timestamp.duration_until(state.window_start);
        self.stale_reports.fetch_add(1, Ordering::Relaxed);
        debug!(
            ?timestamp,
            window_start = ?state.window_start,
            ?behind,
            "dropping stale report"
        );
        StaleReport { behind }
    }
}

impl<T, S> std::fmt::Debug for RollingWindowCounter<T, S>
where
    T: Timestamp,
    S: SnapshotSink<T>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("RollingWindowCounter")
            .field("bucket_unit", &self.bucket_unit)
            .field("bucket_count", &self.bucket_count)
            .field("slide_mode", &self.slide_mode)
            .field("window_start", &state.window_start)
            .field("head_index", &state.head_index)
            .field("buckets", &state.buckets)
            .field("stale_reports", &self.stale_reports())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::NullSink;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn locate_maps_offsets_onto_ring() {
        let counter = RollingWindowCounter::with_sink(ms(0), ms(100), 4, NullSink);
        let mut state = counter.lock();
        assert_eq!(counter.locate(&mut state, ms(0)), Ok(0));
        assert_eq!(counter.locate(&mut state, ms(99)), Ok(0));
        assert_eq!(counter.locate(&mut state, ms(100)), Ok(1));
        assert_eq!(counter.locate(&mut state, ms(399)), Ok(3));
        assert_eq!(state.head_index, 0);

        // First slot past the window: head moves one step, slot reused.
        assert_eq!(counter.locate(&mut state, ms(400)), Ok(0));
        assert_eq!(state.head_index, 1);
        assert_eq!(state.window_start, ms(100));
    }

    #[test]
    fn slide_bounds_individual_evictions_to_one_lap() {
        let mut evictions = 0usize;
        let mut idle_buckets = 0u128;
        {
            struct Counting<'a>(&'a mut usize, &'a mut u128);
            impl SnapshotSink<Duration> for Counting<'_> {
                fn evict(&mut self, _snapshot: Snapshot<Duration>) {
                    *self.0 += 1;
                }
                fn evict_idle(&mut self, idle: IdleSpan<Duration>) {
                    *self.1 += idle.count;
                }
            }

            let counter =
                RollingWindowCounter::with_sink(ms(0), ms(1), 5, Counting(&mut evictions, &mut idle_buckets));
            counter.report(Category::Success, Duration::from_secs(3_600)).unwrap();
            assert_eq!(counter.window_start(), Duration::from_secs(3_600) - ms(4));
            assert_eq!(counter.head_index(), (3_600_000 - 4) % 5);
        }
        assert_eq!(evictions, 5);
        assert_eq!(idle_buckets, 3_600_000 - 4 - 5);
    }

    #[test]
    fn span_mode_moves_by_whole_laps() {
        let counter = RollingWindowConfig::new(ms(100), 4)
            .with_slide_mode(SlideMode::Span)
            .build(ms(0), NullSink)
            .unwrap();
        let mut state = counter.lock();
        assert_eq!(counter.locate(&mut state, ms(250)), Ok(2));

        // 0.95s is two full spans past the start plus 150ms.
        assert_eq!(counter.locate(&mut state, ms(950)), Ok(1));
        assert_eq!(state.head_index, 0);
        assert_eq!(state.window_start, ms(800));
    }

    #[test]
    fn stale_report_reports_distance() {
        let counter = RollingWindowCounter::with_sink(ms(1_000), ms(100), 2, NullSink);
        assert_eq!(
            counter.report(Category::Failure, ms(750)),
            Err(StaleReport { behind: ms(250) })
        );
        assert_eq!(counter.stale_reports(), 1);
    }

    #[test]
    fn config_rejects_degenerate_shapes() {
        assert_eq!(
            RollingWindowConfig::new(Duration::ZERO, 3).validate(),
            Err(ConfigError::ZeroBucketUnit)
        );
        assert_eq!(
            RollingWindowConfig::new(ms(1), 0).validate(),
            Err(ConfigError::ZeroBucketCount)
        );
        assert!(matches!(
            RollingWindowConfig::new(Duration::MAX, 2).validate(),
            Err(ConfigError::SpanOverflow { bucket_count: 2, .. })
        ));
        assert_eq!(RollingWindowConfig::default().validate(), Ok(Duration::from_secs(10)));
    }
}
