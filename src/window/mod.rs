//! The rolling window counter and its buckets.
//!
//! # Components
//!
//! - **[`Bucket`]** - four outcome counters for one time slice
//! - **[`Category`]** - which of the four counters an event increments
//! - **[`RollingWindowCounter`]** - the ring of buckets, its time arithmetic
//!   and the eviction of expired buckets to a sink
//! - **[`RollingWindowConfig`]** - validated window shape
//! - **[`SlideMode`]** - whether a slide moves by buckets or by whole spans
//!
//! # Thread Safety
//!
//! The counter keeps its whole state behind a single mutex. Bucket boundaries
//! move as the ring rotates, so per-bucket locking would not compose with a
//! slide; every report serializes on the one lock instead.

pub mod bucket;
pub use bucket::Bucket;
pub use bucket::Category;

pub mod rolling_window_counter;
pub use rolling_window_counter::RollingWindowConfig;
pub use rolling_window_counter::RollingWindowCounter;
pub use rolling_window_counter::SlideMode;
