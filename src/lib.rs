//! A thread-safe rolling window counter for request outcomes.
//!
//! The window divides time into fixed-length buckets arranged in a ring. Each
//! bucket counts four outcome categories (success, failure, timeout,
//! rejection). As time advances the oldest bucket is emitted to a sink as a
//! [`Snapshot`], reset, and reused for the newest time slice.
//!
//! # Quick Start
//!
//! ```rust
//! use std::time::{Duration, Instant};
//! use rolling_window_core::{Category, RollingWindowCounter};
//!
//! // Ten one-second buckets; evicted buckets are logged through `tracing`.
//! let start = Instant::now();
//! let counter = RollingWindowCounter::new(start, Duration::from_secs(1), 10);
//!
//! counter.report(Category::Success, start + Duration::from_millis(300)).unwrap();
//! counter.report(Category::Timeout, start + Duration::from_millis(1_700)).unwrap();
//!
//! let totals = counter.totals();
//! assert_eq!(totals.success, 1);
//! assert_eq!(totals.timeout, 1);
//! ```
//!
//! # Core Concepts
//!
//! ## Time Representation
//! The counter never reads a clock. Every report carries its own timestamp,
//! which may be an [`Instant`](std::time::Instant), a
//! [`SystemTime`](std::time::SystemTime), or a [`Duration`](std::time::Duration)
//! offset from any origin (see [`Timestamp`]).
//!
//! ## Eviction
//! A report past the end of the window slides it forward one bucket at a time.
//! Each bucket leaving the head is handed to the window's [`SnapshotSink`]
//! exactly once, oldest first. Very long jumps evict each real bucket once and
//! describe the remaining empty laps as an [`IdleSpan`].
//!
//! ## Error Handling
//! - **[`StaleReport`]** - the timestamp precedes the window; the event is dropped
//! - **[`TryReportError::Contended`]** - the non-blocking path found the lock taken
//! - **[`ConfigError`]** - rejected window shape at construction
//!
//! ## Thread Safety
//! All state is guarded by one mutex, so the counter can be shared between
//! producers through an [`Arc`](std::sync::Arc). Sinks run while the lock is
//! held and must not report back into the same window.
//!
//! # Sink Selection Guide
//!
//! - **Log each bucket**: [`TracingSink`] (the default)
//! - **Export without slowing producers**: [`ChannelSink`]
//! - **Custom handling or tests**: any `FnMut(Snapshot<T>) + Send` closure
//! - **Discard**: [`NullSink`]

pub mod error;
pub mod outcome_recorder;
pub mod sink;
pub mod timestamp;
pub mod types;
pub mod window;

pub use error::{ConfigError, ReportResult, StaleReport, TryReportError, TryReportResult};
pub use outcome_recorder::OutcomeRecorder;
pub use sink::{ChannelSink, DroppedSnapshots, IdleSpan, NullSink, Snapshot, SnapshotSink, TracingSink};
pub use timestamp::Timestamp;
pub use types::Uint;
pub use window::{Bucket, Category, RollingWindowConfig, RollingWindowCounter, SlideMode};
