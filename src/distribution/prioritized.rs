//! Prioritized key distribution.
//!
//! The probability of sampling a key is proportional to its priority raised
//! to a configurable exponent. Incremental key changes stay cheap: inserts,
//! deletes, and updates all touch one O(log n) path of a sum tree.
//!
//! Priorities and weights are `f64`, so rounding error accumulates when the
//! relative spread of weights is large. Keep priorities on roughly the same
//! scale and the exponent modest (below ~2) for faithful probabilities.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │  tree: SumTree             positions ↔ keys                    │
//! │  weight[p] =               ┌──────┬──────┐  ┌─────┬─────┐      │
//! │  priority^exponent         │ key  │ pos  │  │ pos │ key │      │
//! │                            ├──────┼──────┤  ├─────┼─────┤      │
//! │  sample(u·total) walks     │ k40  │  0   │  │  0  │ k40 │      │
//! │  one root-to-node path     │ k17  │  1   │  │  1  │ k17 │      │
//! │                            └──────┴──────┘  └─────┴─────┘      │
//! │                                                                │
//! │  delete(k40): move the last position's weight and key into     │
//! │  position 0, pop the tail. O(log n), positions stay dense.     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Operations
//!
//! | Operation | Time     | Notes                                |
//! |-----------|----------|--------------------------------------|
//! | `insert`  | O(log n) | rejects negative priority            |
//! | `delete`  | O(log n) | swap-with-last position recycling    |
//! | `update`  | O(log n) | re-weights one tree path             |
//! | `sample`  | O(log n) | proportional descent; uniform fallback when the total weight is zero |

use rustc_hash::FxHashMap;

use crate::distribution::{DistributionOptions, KeyDistribution, KeyWithProbability};
use crate::ds::{SumTree, XorShift64};
use crate::error::TableError;
use crate::item::Key;

/// Sampling proportional to `priority^priority_exponent`.
///
/// An exponent of zero gives every key equal weight; an exponent of one
/// samples proportionally to raw priority.
///
/// # Example
///
/// ```
/// use replaykit::distribution::{KeyDistribution, PrioritizedDistribution};
///
/// let mut dist = PrioritizedDistribution::new(1.0).unwrap();
/// dist.insert(1, 1.0).unwrap();
/// dist.insert(2, 3.0).unwrap();
///
/// let picked = dist.sample();
/// if picked.key == 2 {
///     assert_eq!(picked.probability, 0.75);
/// } else {
///     assert_eq!(picked.probability, 0.25);
/// }
/// ```
#[derive(Debug)]
pub struct PrioritizedDistribution {
    priority_exponent: f64,
    tree: SumTree,
    key_to_position: FxHashMap<Key, usize>,
    position_to_key: Vec<Key>,
    rng: XorShift64,
}

impl PrioritizedDistribution {
    /// Creates an empty distribution.
    ///
    /// Fails with `InvalidArgument` if the exponent is negative or not
    /// finite.
    pub fn new(priority_exponent: f64) -> Result<Self, TableError> {
        Self::with_seed(priority_exponent, 0x5eed)
    }

    /// As [`new`](Self::new) with a fixed RNG seed, for deterministic tests.
    pub fn with_seed(priority_exponent: f64, seed: u64) -> Result<Self, TableError> {
        if !priority_exponent.is_finite() || priority_exponent < 0.0 {
            return Err(TableError::invalid_argument(format!(
                "priority_exponent must be finite and non-negative, got {priority_exponent}"
            )));
        }
        Ok(Self {
            priority_exponent,
            tree: SumTree::new(),
            key_to_position: FxHashMap::default(),
            position_to_key: Vec::new(),
            rng: XorShift64::new(seed),
        })
    }

    /// The configured exponent.
    #[inline]
    pub fn priority_exponent(&self) -> f64 {
        self.priority_exponent
    }

    fn weight_of(&self, priority: f64) -> f64 {
        if self.priority_exponent == 0.0 {
            // priority^0 including 0^0: every key weighs the same.
            1.0
        } else if self.priority_exponent == 1.0 {
            priority
        } else {
            priority.powf(self.priority_exponent)
        }
    }

    fn check_priority(&self, key: Key, priority: f64) -> Result<(), TableError> {
        if !priority.is_finite() || priority < 0.0 {
            return Err(TableError::invalid_argument(format!(
                "priority for key {key} must be finite and non-negative, got {priority}"
            )));
        }
        Ok(())
    }

    /// Checks map/tree agreement. Debug builds only.
    #[cfg(debug_assertions)]
    fn validate_invariants(&self) {
        debug_assert_eq!(self.key_to_position.len(), self.position_to_key.len());
        debug_assert_eq!(self.tree.len(), self.position_to_key.len());
        for (pos, key) in self.position_to_key.iter().enumerate() {
            debug_assert_eq!(self.key_to_position.get(key), Some(&pos));
        }
    }
}

impl KeyDistribution for PrioritizedDistribution {
    fn insert(&mut self, key: Key, priority: f64) -> Result<(), TableError> {
        self.check_priority(key, priority)?;
        if self.key_to_position.contains_key(&key) {
            return Err(TableError::invalid_argument(format!(
                "key {key} already in prioritized distribution"
            )));
        }
        let position = self.tree.push(self.weight_of(priority));
        self.key_to_position.insert(key, position);
        self.position_to_key.push(key);

        #[cfg(debug_assertions)]
        self.validate_invariants();

        Ok(())
    }

    fn delete(&mut self, key: Key) -> Result<(), TableError> {
        let Some(position) = self.key_to_position.remove(&key) else {
            return Err(TableError::invalid_argument(format!(
                "key {key} not in prioritized distribution"
            )));
        };
        let last = self.position_to_key.len() - 1;
        if position != last {
            let moved_key = self.position_to_key[last];
            self.tree.set(position, self.tree.weight(last));
            self.position_to_key[position] = moved_key;
            self.key_to_position.insert(moved_key, position);
        }
        self.position_to_key.pop();
        self.tree.pop();

        #[cfg(debug_assertions)]
        self.validate_invariants();

        Ok(())
    }

    fn update(&mut self, key: Key, priority: f64) -> Result<(), TableError> {
        self.check_priority(key, priority)?;
        let Some(&position) = self.key_to_position.get(&key) else {
            return Err(TableError::invalid_argument(format!(
                "key {key} not in prioritized distribution"
            )));
        };
        self.tree.set(position, self.weight_of(priority));
        Ok(())
    }

    fn sample(&mut self) -> KeyWithProbability {
        assert!(
            !self.position_to_key.is_empty(),
            "sample on empty prioritized distribution"
        );
        let total = self.tree.total();
        if total <= 0.0 {
            // All weights are zero; fall back to a uniform pick.
            let pos = self.rng.next_index(self.position_to_key.len());
            return KeyWithProbability {
                key: self.position_to_key[pos],
                probability: 1.0 / self.position_to_key.len() as f64,
            };
        }
        let target = self.rng.next_f64() * total;
        let position = self.tree.descend(target);
        KeyWithProbability {
            key: self.position_to_key[position],
            probability: self.tree.weight(position) / total,
        }
    }

    fn clear(&mut self) {
        self.tree.clear();
        self.key_to_position.clear();
        self.position_to_key.clear();
    }

    fn len(&self) -> usize {
        self.position_to_key.len()
    }

    fn options(&self) -> DistributionOptions {
        DistributionOptions::Prioritized {
            priority_exponent: self.priority_exponent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==============================================
    // Construction and arguments
    // ==============================================

    mod arguments {
        use super::*;

        #[test]
        fn negative_exponent_is_rejected() {
            assert!(PrioritizedDistribution::new(-0.5).is_err());
            assert!(PrioritizedDistribution::new(f64::NAN).is_err());
        }

        #[test]
        fn negative_priority_is_rejected() {
            let mut dist = PrioritizedDistribution::new(1.0).unwrap();
            assert!(dist.insert(1, -1.0).is_err());
            dist.insert(1, 1.0).unwrap();
            assert!(dist.update(1, f64::INFINITY).is_err());
        }

        #[test]
        fn duplicate_insert_fails() {
            let mut dist = PrioritizedDistribution::new(1.0).unwrap();
            dist.insert(1, 1.0).unwrap();
            assert!(dist.insert(1, 2.0).is_err());
        }

        #[test]
        fn delete_and_update_require_presence() {
            let mut dist = PrioritizedDistribution::new(1.0).unwrap();
            assert!(dist.delete(1).is_err());
            assert!(dist.update(1, 1.0).is_err());
        }
    }

    // ==============================================
    // Probabilities
    // ==============================================

    mod probabilities {
        use super::*;

        #[test]
        fn probability_is_weight_over_total() {
            let mut dist = PrioritizedDistribution::with_seed(1.0, 3).unwrap();
            dist.insert(1, 1.0).unwrap();
            dist.insert(2, 3.0).unwrap();
            for _ in 0..100 {
                let picked = dist.sample();
                match picked.key {
                    1 => assert!((picked.probability - 0.25).abs() < 1e-12),
                    2 => assert!((picked.probability - 0.75).abs() < 1e-12),
                    other => panic!("unexpected key {other}"),
                }
            }
        }

        #[test]
        fn exponent_zero_flattens_weights() {
            let mut dist = PrioritizedDistribution::with_seed(0.0, 3).unwrap();
            dist.insert(1, 0.0).unwrap();
            dist.insert(2, 1000.0).unwrap();
            for _ in 0..50 {
                assert_eq!(dist.sample().probability, 0.5);
            }
        }

        #[test]
        fn zero_priority_key_is_never_sampled_alongside_weighted_keys() {
            let mut dist = PrioritizedDistribution::with_seed(1.0, 17).unwrap();
            dist.insert(1, 0.0).unwrap();
            dist.insert(2, 5.0).unwrap();
            for _ in 0..500 {
                assert_eq!(dist.sample().key, 2);
            }
        }

        #[test]
        fn all_zero_priorities_fall_back_to_uniform() {
            let mut dist = PrioritizedDistribution::with_seed(1.0, 29).unwrap();
            dist.insert(1, 0.0).unwrap();
            dist.insert(2, 0.0).unwrap();
            let mut seen = [false; 2];
            for _ in 0..200 {
                let picked = dist.sample();
                assert_eq!(picked.probability, 0.5);
                seen[(picked.key - 1) as usize] = true;
            }
            assert!(seen[0] && seen[1]);
        }

        #[test]
        fn update_shifts_mass() {
            let mut dist = PrioritizedDistribution::with_seed(1.0, 7).unwrap();
            dist.insert(1, 1.0).unwrap();
            dist.insert(2, 1.0).unwrap();
            dist.update(1, 0.0).unwrap();
            for _ in 0..200 {
                assert_eq!(dist.sample().key, 2);
            }
        }

        #[test]
        fn empirical_frequency_tracks_weights() {
            let mut dist = PrioritizedDistribution::with_seed(1.0, 1234).unwrap();
            dist.insert(1, 1.0).unwrap();
            dist.insert(2, 9.0).unwrap();
            let mut heavy = 0usize;
            let rounds = 20_000;
            for _ in 0..rounds {
                if dist.sample().key == 2 {
                    heavy += 1;
                }
            }
            let frequency = heavy as f64 / rounds as f64;
            assert!(
                (frequency - 0.9).abs() < 0.02,
                "heavy key sampled with frequency {frequency}, expected ~0.9"
            );
        }
    }

    // ==============================================
    // Deletion
    // ==============================================

    mod deletion {
        use super::*;

        #[test]
        fn deleted_key_is_never_sampled() {
            let mut dist = PrioritizedDistribution::with_seed(1.0, 5).unwrap();
            for k in 0..10 {
                dist.insert(k, 1.0 + k as f64).unwrap();
            }
            for k in (0..10).step_by(2) {
                dist.delete(k).unwrap();
            }
            for _ in 0..1000 {
                assert_eq!(dist.sample().key % 2, 1);
            }
        }

        #[test]
        fn swap_with_last_keeps_weights_attached_to_keys() {
            let mut dist = PrioritizedDistribution::with_seed(1.0, 5).unwrap();
            dist.insert(1, 1.0).unwrap();
            dist.insert(2, 0.0).unwrap();
            dist.insert(3, 3.0).unwrap();
            // Deleting the first position moves key 3 (weight 3) into it.
            dist.delete(1).unwrap();
            for _ in 0..300 {
                let picked = dist.sample();
                assert_eq!(picked.key, 3);
                assert_eq!(picked.probability, 1.0);
            }
        }

        #[test]
        fn clear_then_reuse() {
            let mut dist = PrioritizedDistribution::new(1.0).unwrap();
            for k in 0..5 {
                dist.insert(k, 1.0).unwrap();
            }
            dist.clear();
            assert!(dist.is_empty());
            dist.insert(42, 2.0).unwrap();
            assert_eq!(dist.sample().key, 42);
        }
    }

    #[test]
    fn options_carry_the_exponent() {
        let dist = PrioritizedDistribution::new(0.6).unwrap();
        assert_eq!(
            dist.options(),
            DistributionOptions::Prioritized {
                priority_exponent: 0.6
            }
        );
    }
}
