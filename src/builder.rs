//! Unified table builder.
//!
//! Provides one construction surface over the distribution variants and the
//! rate limiter, with validation at `build` time.
//!
//! ## Example
//!
//! ```
//! use replaykit::builder::TableBuilder;
//! use replaykit::distribution::DistributionOptions;
//! use replaykit::limiter::RateLimiter;
//!
//! let table = TableBuilder::new("replay", 1000)
//!     .sampler(DistributionOptions::Prioritized { priority_exponent: 0.8 })
//!     .remover(DistributionOptions::Fifo)
//!     .rate_limiter(RateLimiter::new(4.0, 100, -10.0, 10.0).unwrap())
//!     .build()
//!     .unwrap();
//! assert_eq!(table.name(), "replay");
//! ```

use crate::distribution::{build_distribution, DistributionOptions};
use crate::error::TableError;
use crate::extension::TableExtension;
use crate::limiter::RateLimiter;
use crate::table::Table;

/// Builder for [`Table`].
///
/// Defaults: uniform sampler, FIFO remover, a rate limiter that only
/// requires one item before sampling, auto-delete disabled, no signature,
/// no extensions.
pub struct TableBuilder {
    name: String,
    max_size: i64,
    max_times_sampled: i32,
    sampler: DistributionOptions,
    remover: DistributionOptions,
    rate_limiter: Option<RateLimiter>,
    extensions: Vec<Box<dyn TableExtension>>,
    signature: Option<Vec<u8>>,
}

impl TableBuilder {
    /// Starts a builder for a table called `name` holding at most
    /// `max_size` items.
    pub fn new(name: impl Into<String>, max_size: i64) -> Self {
        Self {
            name: name.into(),
            max_size,
            max_times_sampled: 0,
            sampler: DistributionOptions::Uniform,
            remover: DistributionOptions::Fifo,
            rate_limiter: None,
            extensions: Vec::new(),
            signature: None,
        }
    }

    /// Number of samples after which an item is removed. `<= 0` (the
    /// default) disables auto-deletion.
    pub fn max_times_sampled(mut self, max_times_sampled: i32) -> Self {
        self.max_times_sampled = max_times_sampled;
        self
    }

    /// The policy picking what `sample` returns.
    pub fn sampler(mut self, sampler: DistributionOptions) -> Self {
        self.sampler = sampler;
        self
    }

    /// The policy picking eviction victims.
    pub fn remover(mut self, remover: DistributionOptions) -> Self {
        self.remover = remover;
        self
    }

    /// The admission gate coupling insert and sample throughput.
    pub fn rate_limiter(mut self, rate_limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(rate_limiter);
        self
    }

    /// Attaches an extension. Repeatable; extensions register in call
    /// order.
    pub fn extension(mut self, extension: Box<dyn TableExtension>) -> Self {
        self.extensions.push(extension);
        self
    }

    /// An opaque signature preserved in checkpoints.
    pub fn signature(mut self, signature: Vec<u8>) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Validates the configuration and builds the table.
    pub fn build(self) -> Result<Table, TableError> {
        let sampler = build_distribution(&self.sampler)?;
        let remover = build_distribution(&self.remover)?;
        let rate_limiter = match self.rate_limiter {
            Some(limiter) => limiter,
            None => RateLimiter::min_size(1),
        };
        Table::new(
            self.name,
            sampler,
            remover,
            self.max_size,
            self.max_times_sampled,
            rate_limiter,
            self.extensions,
            self.signature,
        )
    }
}
