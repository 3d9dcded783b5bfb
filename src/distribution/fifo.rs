//! FIFO key distribution.
//!
//! `sample` returns the least-recently-inserted key with probability 1.0.
//! Priorities are ignored. Deletion may happen anywhere in the chain, so a
//! table can use FIFO for the sampler, the remover, or both (which turns
//! the table into a bounded queue).
//!
//! ## Operations
//!
//! | Operation | Time | Notes                       |
//! |-----------|------|-----------------------------|
//! | `insert`  | O(1) | appended to the back        |
//! | `delete`  | O(1) | interior removal is allowed |
//! | `update`  | O(1) | presence check only         |
//! | `sample`  | O(1) | front of the chain          |

use crate::distribution::{DistributionOptions, KeyDistribution, KeyWithProbability};
use crate::ds::KeyChain;
use crate::error::TableError;
use crate::item::Key;

/// Oldest-key-first selection.
///
/// # Example
///
/// ```
/// use replaykit::distribution::{FifoDistribution, KeyDistribution};
///
/// let mut dist = FifoDistribution::new();
/// dist.insert(10, 0.0).unwrap();
/// dist.insert(20, 0.0).unwrap();
///
/// assert_eq!(dist.sample().key, 10);
/// dist.delete(10).unwrap();
/// assert_eq!(dist.sample().key, 20);
/// ```
#[derive(Debug, Default)]
pub struct FifoDistribution {
    chain: KeyChain,
}

impl FifoDistribution {
    /// Creates an empty distribution.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyDistribution for FifoDistribution {
    fn insert(&mut self, key: Key, _priority: f64) -> Result<(), TableError> {
        if !self.chain.push_back(key) {
            return Err(TableError::invalid_argument(format!(
                "key {key} already in fifo distribution"
            )));
        }
        Ok(())
    }

    fn delete(&mut self, key: Key) -> Result<(), TableError> {
        if !self.chain.remove(key) {
            return Err(TableError::invalid_argument(format!(
                "key {key} not in fifo distribution"
            )));
        }
        Ok(())
    }

    fn update(&mut self, key: Key, _priority: f64) -> Result<(), TableError> {
        if !self.chain.contains(key) {
            return Err(TableError::invalid_argument(format!(
                "key {key} not in fifo distribution"
            )));
        }
        Ok(())
    }

    fn sample(&mut self) -> KeyWithProbability {
        let key = self
            .chain
            .front()
            .expect("sample on empty fifo distribution");
        KeyWithProbability {
            key,
            probability: 1.0,
        }
    }

    fn clear(&mut self) {
        self.chain.clear();
    }

    fn len(&self) -> usize {
        self.chain.len()
    }

    fn options(&self) -> DistributionOptions {
        DistributionOptions::Fifo
    }
}
