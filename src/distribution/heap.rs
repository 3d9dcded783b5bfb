//! Heap key distribution.
//!
//! `sample` returns the key with the extreme priority (lowest for a min
//! heap, highest for a max heap) with probability 1.0. Updates re-heapify
//! in O(log n). Equal priorities resolve to the earlier insertion, so a
//! min heap over constant priorities degenerates to FIFO.
//!
//! ## Operations
//!
//! | Operation | Time     |
//! |-----------|----------|
//! | `insert`  | O(log n) |
//! | `delete`  | O(log n) |
//! | `update`  | O(log n) |
//! | `sample`  | O(1)     |

use crate::distribution::{DistributionOptions, KeyDistribution, KeyWithProbability};
use crate::ds::{HeapOrder, IndexedHeap};
use crate::error::TableError;
use crate::item::Key;

/// Extremum-priority selection.
///
/// # Example
///
/// ```
/// use replaykit::distribution::{HeapDistribution, KeyDistribution};
///
/// let mut dist = HeapDistribution::new(true); // min heap
/// dist.insert(1, 5.0).unwrap();
/// dist.insert(2, 2.0).unwrap();
/// assert_eq!(dist.sample().key, 2);
///
/// dist.update(2, 9.0).unwrap();
/// assert_eq!(dist.sample().key, 1);
/// ```
#[derive(Debug)]
pub struct HeapDistribution {
    heap: IndexedHeap,
    min_heap: bool,
}

impl HeapDistribution {
    /// Creates an empty distribution. `min_heap` selects the extremum:
    /// `true` samples the lowest priority, `false` the highest.
    pub fn new(min_heap: bool) -> Self {
        let order = if min_heap {
            HeapOrder::Min
        } else {
            HeapOrder::Max
        };
        Self {
            heap: IndexedHeap::new(order),
            min_heap,
        }
    }
}

impl KeyDistribution for HeapDistribution {
    fn insert(&mut self, key: Key, priority: f64) -> Result<(), TableError> {
        if !self.heap.insert(key, priority) {
            return Err(TableError::invalid_argument(format!(
                "key {key} already in heap distribution"
            )));
        }
        Ok(())
    }

    fn delete(&mut self, key: Key) -> Result<(), TableError> {
        if !self.heap.remove(key) {
            return Err(TableError::invalid_argument(format!(
                "key {key} not in heap distribution"
            )));
        }
        Ok(())
    }

    fn update(&mut self, key: Key, priority: f64) -> Result<(), TableError> {
        if !self.heap.update(key, priority) {
            return Err(TableError::invalid_argument(format!(
                "key {key} not in heap distribution"
            )));
        }
        Ok(())
    }

    fn sample(&mut self) -> KeyWithProbability {
        let key = self.heap.peek().expect("sample on empty heap distribution");
        KeyWithProbability {
            key,
            probability: 1.0,
        }
    }

    fn clear(&mut self) {
        self.heap.clear();
    }

    fn len(&self) -> usize {
        self.heap.len()
    }

    fn options(&self) -> DistributionOptions {
        DistributionOptions::Heap {
            min_heap: self.min_heap,
        }
    }
}
