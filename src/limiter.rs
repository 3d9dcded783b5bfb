//! Rate limiter coupling insert and sample throughput.
//!
//! The limiter tracks two monotone counters and admits operations based on
//! the running difference
//!
//! ```text
//!   diff = samples_per_insert * insert_count - sample_count
//! ```
//!
//! - a **sample** is admitted while the table holds at least
//!   `min_size_to_sample` items and one more sample keeps
//!   `diff >= min_diff`;
//! - an **insert** is admitted while one more insert keeps
//!   `diff <= max_diff`.
//!
//! With `samples_per_insert = 1` and a tight `[min_diff, max_diff]` window
//! this alternates producers and consumers in lock-step; widening the
//! window buffers bursts of either side.
//!
//! The limiter owns no lock of its own: the table drives it under the table
//! mutex and parks blocked callers on the table's condition variable. Every
//! counter change must therefore be followed by a broadcast, which the
//! table performs. `cancel` is terminal and releases all pending waiters.

use serde::{Deserialize, Serialize};

use crate::error::TableError;

/// Admission gate for table inserts and samples.
///
/// # Example
///
/// ```
/// use replaykit::limiter::RateLimiter;
///
/// // One sample per insert, lock-step.
/// let mut limiter = RateLimiter::new(1.0, 1, -1.0, 1.0).unwrap();
/// assert!(limiter.can_insert());
/// limiter.insert();
///
/// // A second insert would push diff past max_diff.
/// assert!(!limiter.can_insert());
/// assert!(limiter.can_sample(1));
/// limiter.sample();
/// assert!(limiter.can_insert());
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    samples_per_insert: f64,
    min_size_to_sample: i64,
    min_diff: f64,
    max_diff: f64,
    insert_count: u64,
    sample_count: u64,
    cancelled: bool,
}

/// Snapshot of a limiter's configuration and counters, for checkpoints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimiterCheckpoint {
    pub samples_per_insert: f64,
    pub min_size_to_sample: i64,
    pub min_diff: f64,
    pub max_diff: f64,
    pub insert_count: u64,
    pub sample_count: u64,
}

impl RateLimiter {
    /// Creates a limiter.
    ///
    /// Fails with `InvalidArgument` unless `samples_per_insert > 0` and
    /// `min_diff <= max_diff`.
    pub fn new(
        samples_per_insert: f64,
        min_size_to_sample: i64,
        min_diff: f64,
        max_diff: f64,
    ) -> Result<Self, TableError> {
        if !(samples_per_insert > 0.0) {
            return Err(TableError::invalid_argument(format!(
                "samples_per_insert must be positive, got {samples_per_insert}"
            )));
        }
        if !(min_diff <= max_diff) {
            return Err(TableError::invalid_argument(format!(
                "min_diff ({min_diff}) must not exceed max_diff ({max_diff})"
            )));
        }
        Ok(Self {
            samples_per_insert,
            min_size_to_sample,
            min_diff,
            max_diff,
            insert_count: 0,
            sample_count: 0,
            cancelled: false,
        })
    }

    /// A limiter that only enforces a minimum size before sampling.
    pub fn min_size(min_size_to_sample: i64) -> Self {
        Self::new(1.0, min_size_to_sample, -f64::MAX, f64::MAX)
            .expect("static configuration is valid")
    }

    /// `true` while a sample is admissible at the given table size.
    #[inline]
    pub fn can_sample(&self, current_size: i64) -> bool {
        current_size >= self.min_size_to_sample && self.diff_after_sample() >= self.min_diff
    }

    /// `true` while an insert is admissible.
    #[inline]
    pub fn can_insert(&self) -> bool {
        self.diff_after_insert() <= self.max_diff
    }

    #[inline]
    fn diff_after_sample(&self) -> f64 {
        self.samples_per_insert * self.insert_count as f64 - (self.sample_count + 1) as f64
    }

    #[inline]
    fn diff_after_insert(&self) -> f64 {
        self.samples_per_insert * (self.insert_count + 1) as f64 - self.sample_count as f64
    }

    /// Records a committed insert. Call after the item is in the table.
    #[inline]
    pub fn insert(&mut self) {
        self.insert_count += 1;
    }

    /// Records a committed sample.
    #[inline]
    pub fn sample(&mut self) {
        self.sample_count += 1;
    }

    /// Zeros both counters.
    pub fn reset(&mut self) {
        self.insert_count = 0;
        self.sample_count = 0;
    }

    /// Marks the limiter as terminally cancelled. Pending and future waits
    /// observe this and bail out.
    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// `true` once [`cancel`](Self::cancel) has been called.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Total successful inserts since construction or the last reset.
    #[inline]
    pub fn insert_count(&self) -> u64 {
        self.insert_count
    }

    /// Total successful samples since construction or the last reset.
    #[inline]
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Configuration and counters as a checkpoint record.
    pub fn checkpoint(&self) -> RateLimiterCheckpoint {
        RateLimiterCheckpoint {
            samples_per_insert: self.samples_per_insert,
            min_size_to_sample: self.min_size_to_sample,
            min_diff: self.min_diff,
            max_diff: self.max_diff,
            insert_count: self.insert_count,
            sample_count: self.sample_count,
        }
    }

    /// Rebuilds a limiter from a checkpoint record, counters included.
    pub(crate) fn restore(checkpoint: &RateLimiterCheckpoint) -> Result<Self, TableError> {
        let mut limiter = Self::new(
            checkpoint.samples_per_insert,
            checkpoint.min_size_to_sample,
            checkpoint.min_diff,
            checkpoint.max_diff,
        )?;
        limiter.insert_count = checkpoint.insert_count;
        limiter.sample_count = checkpoint.sample_count;
        Ok(limiter)
    }
}
