//! LIFO key distribution.
//!
//! `sample` returns the most-recently-inserted key with probability 1.0
//! until that key is deleted. All operations are O(1). Mirrors
//! [`FifoDistribution`](crate::distribution::FifoDistribution) with the
//! chain read from the other end.

use crate::distribution::{DistributionOptions, KeyDistribution, KeyWithProbability};
use crate::ds::KeyChain;
use crate::error::TableError;
use crate::item::Key;

/// Newest-key-first selection.
#[derive(Debug, Default)]
pub struct LifoDistribution {
    chain: KeyChain,
}

impl LifoDistribution {
    /// Creates an empty distribution.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyDistribution for LifoDistribution {
    fn insert(&mut self, key: Key, _priority: f64) -> Result<(), TableError> {
        if !self.chain.push_back(key) {
            return Err(TableError::invalid_argument(format!(
                "key {key} already in lifo distribution"
            )));
        }
        Ok(())
    }

    fn delete(&mut self, key: Key) -> Result<(), TableError> {
        if !self.chain.remove(key) {
            return Err(TableError::invalid_argument(format!(
                "key {key} not in lifo distribution"
            )));
        }
        Ok(())
    }

    fn update(&mut self, key: Key, _priority: f64) -> Result<(), TableError> {
        if !self.chain.contains(key) {
            return Err(TableError::invalid_argument(format!(
                "key {key} not in lifo distribution"
            )));
        }
        Ok(())
    }

    fn sample(&mut self) -> KeyWithProbability {
        let key = self.chain.back().expect("sample on empty lifo distribution");
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
        DistributionOptions::Lifo
    }
}
