//! Unsigned integer type alias for bucket counters.
//!
//! This module defines `Uint` as the integer type used for every event counter
//! held by a bucket and reported in a snapshot. The actual type is determined
//! at compile time via feature flags.
//!
//! # Features
//! - `count-u64` (default): uses [`u64`] as `Uint`
//! - `count-u128`: uses [`u128`] as `Uint`
//!   (Both features cannot be enabled at the same time.)
//! - If neither feature is enabled, `u64` is used as the default type.

#[cfg(all(feature = "count-u64", feature = "count-u128"))]
compile_error!("You cannot enable both `count-u64` and `count-u128` features at the same time");

/// Alias for the unsigned integer type used for event counters.
///
/// Selected by the **`count-u64`** (default) feature.
#[cfg(all(feature = "count-u64", not(feature = "count-u128")))]
pub type Uint = u64;

/// Alias for the unsigned integer type used for event counters.
///
/// Selected by the **`count-u128`** feature.
#[cfg(all(feature = "count-u128", not(feature = "count-u64")))]
pub type Uint = u128;

/// Alias for the unsigned integer type used for event counters.
///
/// Neither width feature is enabled, so [`u64`] is used.
#[cfg(not(any(feature = "count-u64", feature = "count-u128")))]
pub type Uint = u64;
