//! # Key distributions
//!
//! A key distribution maintains the set of candidate keys of a table under a
//! weighting scheme and answers "pick one". Tables own two of them: the
//! *sampler* chooses what `Sample` returns, the *remover* chooses the victim
//! when an insert overflows `max_size`.
//!
//! ## Variant summary
//!
//! | Variant       | `sample` returns             | Probability        | Uses priority |
//! |---------------|------------------------------|--------------------|---------------|
//! | `Uniform`     | any present key              | `1 / n`            | no            |
//! | `Prioritized` | key ∝ `priority^exponent`    | `weight / total`   | yes           |
//! | `Fifo`        | least-recently-inserted key  | `1.0`              | no            |
//! | `Lifo`        | most-recently-inserted key   | `1.0`              | no            |
//! | `Heap`        | min- or max-priority key     | `1.0`              | yes           |
//!
//! All variants insert and delete in amortized O(1) or O(log n) and never
//! return a key that is not currently present. Order-based variants ignore
//! priority values but still verify presence on `update`.
//!
//! ## Design
//!
//! The variants form a closed sum: [`DistributionOptions`] is the tagged
//! configuration record (also the checkpoint representation) and
//! [`build_distribution`] maps it to a boxed implementation. Each variant
//! owns its own index structure from [`crate::ds`].

use serde::{Deserialize, Serialize};

use crate::error::TableError;
use crate::item::Key;

pub mod fifo;
pub mod heap;
pub mod lifo;
pub mod prioritized;
pub mod uniform;

pub use fifo::FifoDistribution;
pub use heap::HeapDistribution;
pub use lifo::LifoDistribution;
pub use prioritized::PrioritizedDistribution;
pub use uniform::UniformDistribution;

/// A sampled key and the probability with which this call chose it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyWithProbability {
    pub key: Key,
    pub probability: f64,
}

/// Policy object over the current key set of a table.
///
/// Implementations are driven strictly under the owning table's lock, so
/// they are `Send` but need no internal synchronization.
pub trait KeyDistribution: Send + std::fmt::Debug {
    /// Adds a key. Fails with `InvalidArgument` if the key is present, or if
    /// the priority is rejected by the variant (negative for prioritized).
    fn insert(&mut self, key: Key, priority: f64) -> Result<(), TableError>;

    /// Removes a key. Fails with `InvalidArgument` if the key is absent.
    fn delete(&mut self, key: Key) -> Result<(), TableError>;

    /// Replaces a key's priority. Order-based variants ignore the value but
    /// still fail with `InvalidArgument` if the key is absent.
    fn update(&mut self, key: Key, priority: f64) -> Result<(), TableError>;

    /// Picks a key according to the variant's policy.
    ///
    /// Must not be called on an empty distribution; that is a programming
    /// error and panics.
    fn sample(&mut self) -> KeyWithProbability;

    /// Drops all keys.
    fn clear(&mut self);

    /// Number of keys currently held.
    fn len(&self) -> usize;

    /// Returns `true` if no keys are held.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The variant tag and configuration, for checkpointing.
    fn options(&self) -> DistributionOptions;
}

/// Tagged configuration record identifying a distribution variant.
///
/// Serialized into checkpoints and used to reconstruct the distribution on
/// restore.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DistributionOptions {
    Uniform,
    Prioritized { priority_exponent: f64 },
    Fifo,
    Lifo,
    Heap { min_heap: bool },
}

/// Builds the distribution a configuration record describes.
///
/// # Example
///
/// ```
/// use replaykit::distribution::{build_distribution, DistributionOptions, KeyDistribution};
///
/// let mut dist = build_distribution(&DistributionOptions::Fifo).unwrap();
/// dist.insert(1, 0.0).unwrap();
/// assert_eq!(dist.sample().key, 1);
/// assert_eq!(dist.options(), DistributionOptions::Fifo);
/// ```
pub fn build_distribution(
    options: &DistributionOptions,
) -> Result<Box<dyn KeyDistribution>, TableError> {
    Ok(match *options {
        DistributionOptions::Uniform => Box::new(UniformDistribution::new()),
        DistributionOptions::Prioritized { priority_exponent } => {
            Box::new(PrioritizedDistribution::new(priority_exponent)?)
        }
        DistributionOptions::Fifo => Box::new(FifoDistribution::new()),
        DistributionOptions::Lifo => Box::new(LifoDistribution::new()),
        DistributionOptions::Heap { min_heap } => Box::new(HeapDistribution::new(min_heap)),
    })
}
