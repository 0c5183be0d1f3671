use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::Uint;

/// Outcome category of a reported event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "snake_case"))]
pub enum Category {
    Success,
    Failure,
    Timeout,
    Rejection,
}

impl Category {
    /// Every category, in counter order.
    pub const ALL: [Category; 4] = [
        Category::Success,
        Category::Failure,
        Category::Timeout,
        Category::Rejection,
    ];
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Success => "success",
            Category::Failure => "failure",
            Category::Timeout => "timeout",
            Category::Rejection => "rejection",
        };
        f.write_str(name)
    }
}

/// Event counters for one time slice of the window.
///
/// Buckets live in the window's ring for its whole lifetime; expiry resets
/// them in place instead of reallocating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Bucket {
    pub success: Uint,
    pub failure: Uint,
    pub timeout: Uint,
    pub rejection: Uint,
}

impl Bucket {
    /// Increments the counter matching `category`.
    #[inline]
    pub fn update(&mut self, category: Category) {
        let counter = match category {
            Category::Success => &mut self.success,
            Category::Failure => &mut self.failure,
            Category::Timeout => &mut self.timeout,
            Category::Rejection => &mut self.rejection,
        };
        *counter = counter.saturating_add(1);
    }

    /// Zeroes all four counters.
    #[inline]
    pub fn reset(&mut self) {
        *self = Bucket::default();
    }

    #[inline]
    pub fn get(&self, category: Category) -> Uint {
        match category {
            Category::Success => self.success,
            Category::Failure => self.failure,
            Category::Timeout => self.timeout,
            Category::Rejection => self.rejection,
        }
    }

    /// Sum of all four counters.
    pub fn total(&self) -> Uint {
        self.success
            .saturating_add(self.failure)
            .saturating_add(self.timeout)
            .saturating_add(self.rejection)
    }

    pub fn is_empty(&self) -> bool {
        *self == Bucket::default()
    }

    /// Adds another bucket's counts into this one.
    pub(crate) fn absorb(&mut self, other: &Bucket) {
        self.success = self.success.saturating_add(other.success);
        self.failure = self.failure.saturating_add(other.failure);
        self.timeout = self.timeout.saturating_add(other.timeout);
        self.rejection = self.rejection.saturating_add(other.rejection);
    }
}
