//! Item and sequence metadata stored in a table.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::chunk::ChunkRef;

/// Client-assigned item identifier, unique within a table.
pub type Key = u64;

/// The extent of an item over the steps of an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRange {
    pub episode_id: u64,
    pub start: u64,
    pub end: u64,
}

impl SequenceRange {
    pub fn new(episode_id: u64, start: u64, end: u64) -> Self {
        debug_assert!(start <= end, "inverted sequence range");
        Self {
            episode_id,
            start,
            end,
        }
    }

    /// Number of steps covered, inclusive of both ends.
    #[inline]
    pub fn num_steps(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// The unit of storage in a table.
///
/// Cloning an item clones its chunk *shares*, never chunk bytes; snapshots
/// handed to samplers and checkpoints therefore stay cheap regardless of
/// trajectory size.
#[derive(Debug, Clone)]
pub struct Item {
    /// Client-assigned identifier.
    pub key: Key,
    /// Policy-dependent weight. Prioritized and heap distributions read it;
    /// order-based distributions ignore the value.
    pub priority: f64,
    /// Number of times the item has been returned by `Sample`.
    pub times_sampled: u32,
    /// Wall-clock time of the first successful insertion. Assignments to an
    /// existing key preserve it.
    pub inserted_at: SystemTime,
    /// The item's extent over the referenced chunks.
    pub sequence_range: SequenceRange,
    /// Shares of the chunks holding the item's payload. Never empty.
    pub chunks: Vec<ChunkRef>,
}

impl Item {
    /// Creates an item about to be inserted: zero samples, timestamped now.
    pub fn new(
        key: Key,
        priority: f64,
        sequence_range: SequenceRange,
        chunks: Vec<ChunkRef>,
    ) -> Self {
        debug_assert!(!chunks.is_empty(), "item without chunks");
        Self {
            key,
            priority,
            times_sampled: 0,
            inserted_at: SystemTime::now(),
            sequence_range,
            chunks,
        }
    }

    /// Keys of the referenced chunks, in order.
    pub fn chunk_keys(&self) -> Vec<u64> {
        self.chunks.iter().map(|c| c.key()).collect()
    }
}
