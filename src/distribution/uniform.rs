//! Uniform key distribution.
//!
//! Every present key is returned with probability `1/n`. Priorities are
//! accepted and ignored.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  keys: Vec<Key>            index: FxHashMap<Key, usize>      │
//! │  dense array for O(1)      key → position in `keys`          │
//! │  random access                                               │
//! │                                                              │
//! │  ┌─────┬─────┬─────┬─────┐     ┌──────┬──────┐               │
//! │  │  0  │  1  │  2  │  3  │     │ key  │ pos  │               │
//! │  ├─────┼─────┼─────┼─────┤     ├──────┼──────┤               │
//! │  │ k17 │ k40 │ k09 │ k33 │     │ k40  │  1   │ ...           │
//! │  └─────┴─────┴─────┴─────┘     └──────┴──────┘               │
//! │                                                              │
//! │  delete(k40): swap position 1 with last, fix k33's index,    │
//! │  pop. O(1), no shifting.                                     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Operations
//!
//! | Operation | Time | Notes                         |
//! |-----------|------|-------------------------------|
//! | `insert`  | O(1) | append to dense array         |
//! | `delete`  | O(1) | swap-with-last                |
//! | `update`  | O(1) | presence check only           |
//! | `sample`  | O(1) | XorShift64 index pick         |

use rustc_hash::FxHashMap;

use crate::distribution::{DistributionOptions, KeyDistribution, KeyWithProbability};
use crate::ds::XorShift64;
use crate::error::TableError;
use crate::item::Key;

/// Equal-probability sampling over the present keys.
///
/// # Example
///
/// ```
/// use replaykit::distribution::{KeyDistribution, UniformDistribution};
///
/// let mut dist = UniformDistribution::new();
/// dist.insert(1, 0.0).unwrap();
/// dist.insert(2, 0.0).unwrap();
///
/// let picked = dist.sample();
/// assert!(picked.key == 1 || picked.key == 2);
/// assert_eq!(picked.probability, 0.5);
/// ```
#[derive(Debug)]
pub struct UniformDistribution {
    keys: Vec<Key>,
    index: FxHashMap<Key, usize>,
    rng: XorShift64,
}

impl UniformDistribution {
    /// Creates an empty distribution.
    pub fn new() -> Self {
        Self::with_seed(0x5eed)
    }

    /// Creates an empty distribution with a fixed RNG seed, for
    /// deterministic tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            keys: Vec::new(),
            index: FxHashMap::default(),
            rng: XorShift64::new(seed),
        }
    }

    /// Checks dense-array/index agreement. Debug builds only.
    #[cfg(debug_assertions)]
    fn validate_invariants(&self) {
        debug_assert_eq!(self.keys.len(), self.index.len());
        for (pos, key) in self.keys.iter().enumerate() {
            debug_assert_eq!(self.index.get(key), Some(&pos), "index mismatch for key {key}");
        }
    }
}

impl Default for UniformDistribution {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyDistribution for UniformDistribution {
    fn insert(&mut self, key: Key, _priority: f64) -> Result<(), TableError> {
        if self.index.contains_key(&key) {
            return Err(TableError::invalid_argument(format!(
                "key {key} already in uniform distribution"
            )));
        }
        self.index.insert(key, self.keys.len());
        self.keys.push(key);

        #[cfg(debug_assertions)]
        self.validate_invariants();

        Ok(())
    }

    fn delete(&mut self, key: Key) -> Result<(), TableError> {
        let Some(pos) = self.index.remove(&key) else {
            return Err(TableError::invalid_argument(format!(
                "key {key} not in uniform distribution"
            )));
        };
        let last = self.keys.len() - 1;
        if pos != last {
            self.keys.swap(pos, last);
            self.index.insert(self.keys[pos], pos);
        }
        self.keys.pop();

        #[cfg(debug_assertions)]
        self.validate_invariants();

        Ok(())
    }

    fn update(&mut self, key: Key, _priority: f64) -> Result<(), TableError> {
        if !self.index.contains_key(&key) {
            return Err(TableError::invalid_argument(format!(
                "key {key} not in uniform distribution"
            )));
        }
        Ok(())
    }

    fn sample(&mut self) -> KeyWithProbability {
        assert!(!self.keys.is_empty(), "sample on empty uniform distribution");
        let pos = self.rng.next_index(self.keys.len());
        KeyWithProbability {
            key: self.keys[pos],
            probability: 1.0 / self.keys.len() as f64,
        }
    }

    fn clear(&mut self) {
        self.keys.clear();
        self.index.clear();
    }

    fn len(&self) -> usize {
        self.keys.len()
    }

    fn options(&self) -> DistributionOptions {
        DistributionOptions::Uniform
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==============================================
    // Membership
    // ==============================================

    mod membership {
        use super::*;

        #[test]
        fn duplicate_insert_fails() {
            let mut dist = UniformDistribution::new();
            dist.insert(1, 0.0).unwrap();
            assert!(dist.insert(1, 0.0).is_err());
            assert_eq!(dist.len(), 1);
        }

        #[test]
        fn delete_missing_key_fails() {
            let mut dist = UniformDistribution::new();
            assert!(dist.delete(1).is_err());
        }

        #[test]
        fn update_checks_presence_only() {
            let mut dist = UniformDistribution::new();
            dist.insert(1, 0.0).unwrap();
            assert!(dist.update(1, 999.0).is_ok());
            assert!(dist.update(2, 0.0).is_err());
        }

        #[test]
        fn delete_interior_key_keeps_others() {
            let mut dist = UniformDistribution::new();
            for k in 0..5 {
                dist.insert(k, 0.0).unwrap();
            }
            dist.delete(2).unwrap();
            assert_eq!(dist.len(), 4);
            for k in [0, 1, 3, 4] {
                assert!(dist.update(k, 0.0).is_ok());
            }
        }

        #[test]
        fn clear_drops_everything() {
            let mut dist = UniformDistribution::new();
            for k in 0..5 {
                dist.insert(k, 0.0).unwrap();
            }
            dist.clear();
            assert!(dist.is_empty());
            dist.insert(3, 0.0).unwrap();
            assert_eq!(dist.sample().key, 3);
        }
    }

    // ==============================================
    // Sampling
    // ==============================================

    mod sampling {
        use super::*;

        #[test]
        fn single_key_sampled_with_probability_one() {
            let mut dist = UniformDistribution::new();
            dist.insert(7, 0.0).unwrap();
            let picked = dist.sample();
            assert_eq!(picked.key, 7);
            assert_eq!(picked.probability, 1.0);
        }

        #[test]
        fn probability_is_one_over_n() {
            let mut dist = UniformDistribution::new();
            for k in 0..4 {
                dist.insert(k, 0.0).unwrap();
            }
            assert_eq!(dist.sample().probability, 0.25);
        }

        #[test]
        fn all_keys_are_reachable() {
            let mut dist = UniformDistribution::with_seed(11);
            for k in 0..8 {
                dist.insert(k, 0.0).unwrap();
            }
            let mut seen = [false; 8];
            for _ in 0..1000 {
                seen[dist.sample().key as usize] = true;
            }
            assert!(seen.iter().all(|&s| s));
        }

        #[test]
        fn sample_never_returns_deleted_key() {
            let mut dist = UniformDistribution::with_seed(23);
            for k in 0..10 {
                dist.insert(k, 0.0).unwrap();
            }
            for k in (0..10).step_by(2) {
                dist.delete(k).unwrap();
            }
            for _ in 0..500 {
                assert_eq!(dist.sample().key % 2, 1);
            }
        }

        #[test]
        #[should_panic(expected = "empty uniform")]
        fn sample_on_empty_panics() {
            let mut dist = UniformDistribution::new();
            dist.sample();
        }
    }
}
