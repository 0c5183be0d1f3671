//! Destinations for evicted buckets.
//!
//! When the window slides, every bucket that falls off its head is handed to
//! a [`SnapshotSink`] as a [`Snapshot`] before being reset. Sinks run while
//! the window lock is held, so they must be quick and must never call back
//! into the window that owns them.
//!
//! # Available Sinks
//!
//! - **[`TracingSink`]** - logs each snapshot through `tracing` (the default)
//! - **[`ChannelSink`]** - non-blocking hand-off over a bounded channel
//! - **[`NullSink`]** - discards everything
//! - any `FnMut(Snapshot<T>) + Send` closure

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::Serialize;
use tracing::{info, warn};

use crate::timestamp::{span_of, Timestamp};
use crate::window::Bucket;
use crate::Uint;

/// Counters of one evicted bucket, tagged with the time range it covered.
///
/// The range is half-open: `[range_start, range_end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Snapshot<T> {
    pub range_start: T,
    pub range_end: T,
    pub success: Uint,
    pub failure: Uint,
    pub timeout: Uint,
    pub rejection: Uint,
}

impl<T> Snapshot<T> {
    pub fn new(range_start: T, range_end: T, counts: &Bucket) -> Self {
        Snapshot {
            range_start,
            range_end,
            success: counts.success,
            failure: counts.failure,
            timeout: counts.timeout,
            rejection: counts.rejection,
        }
    }

    /// The four counters as a [`Bucket`].
    pub fn counts(&self) -> Bucket {
        Bucket {
            success: self.success,
            failure: self.failure,
            timeout: self.timeout,
            rejection: self.rejection,
        }
    }

    pub fn total(&self) -> Uint {
        self.counts().total()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// A run of consecutive empty buckets skipped over by a long time jump.
///
/// After a full lap of evictions every bucket in the ring is zero, so the
/// window describes any further laps with one `IdleSpan` instead of
/// evicting each slot again. [`IdleSpan::snapshots`] expands it back into
/// the individual zero snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleSpan<T> {
    /// Start of the first skipped bucket.
    pub range_start: T,
    pub bucket_unit: Duration,
    /// Number of skipped buckets. Always at least one.
    pub count: u128,
}

impl<T: Timestamp> IdleSpan<T> {
    /// End of the last skipped bucket.
    pub fn range_end(&self) -> T {
        // The window only builds spans that end at or before a timestamp it
        // was handed, so the product fits.
        let span = span_of(self.bucket_unit, self.count).unwrap_or(Duration::MAX);
        self.range_start.advance(span)
    }

    /// One zero snapshot per skipped bucket, oldest first.
    pub fn snapshots(&self) -> IdleSnapshots<T> {
        IdleSnapshots {
            next_start: self.range_start,
            bucket_unit: self.bucket_unit,
            remaining: self.count,
        }
    }
}

/// Iterator returned by [`IdleSpan::snapshots`].
#[derive(Debug, Clone)]
pub struct IdleSnapshots<T> {
    next_start: T,
    bucket_unit: Duration,
    remaining: u128,
}

impl<T: Timestamp> Iterator for IdleSnapshots<T> {
    type Item = Snapshot<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let start = self.next_start;
        let end = start.advance(self.bucket_unit);
        self.next_start = end;
        Some(Snapshot::new(start, end, &Bucket::default()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

/// Receives buckets evicted from a rolling window.
///
/// Both methods are called with the window lock held. Implementations must
/// handle their own delivery failures; nothing they do can fail a report.
pub trait SnapshotSink<T: Timestamp>: Send {
    /// Called exactly once per evicted bucket, in chronological order.
    fn evict(&mut self, snapshot: Snapshot<T>);

    /// Called for runs of empty buckets skipped by a multi-lap jump.
    ///
    /// The default forwards one zero snapshot per skipped bucket to
    /// [`evict`](SnapshotSink::evict). Override it when per-bucket zeros are
    /// not needed, since a very large jump produces a very long span.
    fn evict_idle(&mut self, idle: IdleSpan<T>) {
        for snapshot in idle.snapshots() {
            self.evict(snapshot);
        }
    }
}

impl<T, F> SnapshotSink<T> for F
where
    T: Timestamp,
    F: FnMut(Snapshot<T>) + Send,
{
    #[inline]
    fn evict(&mut self, snapshot: Snapshot<T>) {
        self(snapshot)
    }
}

/// Logs every evicted bucket at `info` level.
///
/// Skipped idle laps are logged as a single line.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink {
    skip_empty: bool,
}

impl TracingSink {
    pub fn new() -> Self {
        TracingSink::default()
    }

    /// Only log buckets that saw at least one event.
    pub fn skip_empty(mut self) -> Self {
        self.skip_empty = true;
        self
    }
}

impl<T: Timestamp> SnapshotSink<T> for TracingSink {
    fn evict(&mut self, snapshot: Snapshot<T>) {
        if self.skip_empty && snapshot.is_empty() {
            return;
        }
        info!(
            range_start = ?snapshot.range_start,
            range_end = ?snapshot.range_end,
            success = %snapshot.success,
            failure = %snapshot.failure,
            timeout = %snapshot.timeout,
            rejection = %snapshot.rejection,
            "bucket evicted"
        );
    }

    fn evict_idle(&mut self, idle: IdleSpan<T>) {
        if self.skip_empty {
            return;
        }
        info!(
            range_start = ?idle.range_start,
            range_end = ?idle.range_end(),
            buckets = %idle.count,
            "idle buckets evicted"
        );
    }
}

/// Discards every snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl<T: Timestamp> SnapshotSink<T> for NullSink {
    #[inline]
    fn evict(&mut self, _snapshot: Snapshot<T>) {}

    #[inline]
    fn evict_idle(&mut self, _idle: IdleSpan<T>) {}
}

/// Shared count of snapshots a [`ChannelSink`] could not deliver.
#[derive(Debug, Clone, Default)]
pub struct DroppedSnapshots(Arc<AtomicU64>);

impl DroppedSnapshots {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }
}

/// Hands snapshots to a consumer thread without blocking the window.
///
/// Uses `try_send` on a bounded channel. When the channel is full or the
/// receiver is gone the snapshot is dropped, counted, and logged at `warn`.
#[derive(Debug)]
pub struct ChannelSink<T> {
    sender: SyncSender<Snapshot<T>>,
    dropped: DroppedSnapshots,
}

impl<T> ChannelSink<T> {
    /// Creates a sink and the receiving end of its channel.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero, since a rendezvous channel would drop
    /// every snapshot the consumer is not already waiting for.
    pub fn bounded(capacity: usize) -> (Self, Receiver<Snapshot<T>>) {
        assert!(capacity > 0, "capacity must be greater than 0");
        let (sender, receiver) = mpsc::sync_channel(capacity);
        (ChannelSink::from_sender(sender), receiver)
    }

    pub fn from_sender(sender: SyncSender<Snapshot<T>>) -> Self {
        ChannelSink {
            sender,
            dropped: DroppedSnapshots::default(),
        }
    }

    /// Handle to the drop counter, still readable after the sink has been
    /// moved into a window.
    pub fn dropped(&self) -> DroppedSnapshots {
        self.dropped.clone()
    }

    fn offer(&mut self, snapshot: Snapshot<T>) -> bool {
        match self.sender.try_send(snapshot) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.add(1);
                warn!(dropped = self.dropped.get(), "snapshot channel full, dropping snapshot");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.add(1);
                warn!(dropped = self.dropped.get(), "snapshot receiver gone, dropping snapshot");
                false
            }
        }
    }
}

impl<T: Timestamp> SnapshotSink<T> for ChannelSink<T> {
    #[inline]
    fn evict(&mut self, snapshot: Snapshot<T>) {
        self.offer(snapshot);
    }

    fn evict_idle(&mut self, idle: IdleSpan<T>) {
        let mut sent: u128 = 0;
        for snapshot in idle.snapshots() {
            if !self.offer(snapshot) {
                // `offer` already counted this one.
                let rest = idle.count - sent - 1;
                self.dropped.add(u64::try_from(rest).unwrap_or(u64::MAX));
                return;
            }
            sent += 1;
        }
    }
}
