//! Checkpoint views: consistent logical snapshots of a table.
//!
//! A [`CheckpointView`] carries everything needed to rebuild a table with
//! identical observable behavior: construction parameters, distribution
//! configurations, rate-limiter state including its counters, and the items
//! in insertion order. Chunk *bytes* are not part of the view; items carry
//! chunk keys and the chunk-store checkpointer persists the bytes
//! separately.
//!
//! The serialization format is whatever the embedding checkpointer chooses;
//! the types here only commit to the logical schema (they derive serde).
//! [`restore_table`] is the inverse direction: given a view and a chunk
//! store holding the referenced chunks, it reconstructs the table. Wiring
//! `on_checkpoint_loaded` across a restored *set* of tables is the
//! registry layer's job, via [`Table::notify_checkpoint_loaded`].

use std::time::{Duration, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::chunk::{ChunkRef, ChunkStore};
use crate::distribution::{build_distribution, DistributionOptions};
use crate::error::TableError;
use crate::item::{Item, Key, SequenceRange};
use crate::limiter::{RateLimiter, RateLimiterCheckpoint};
use crate::table::Table;

/// One item as persisted in a checkpoint. Chunks are referenced by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointItem {
    pub key: Key,
    pub priority: f64,
    pub times_sampled: u32,
    /// `inserted_at` as nanoseconds since the Unix epoch.
    pub inserted_at_unix_nanos: u64,
    pub sequence_range: SequenceRange,
    pub chunk_keys: Vec<u64>,
}

impl CheckpointItem {
    /// Captures an item's persistent fields.
    pub(crate) fn from_item(item: &Item) -> Self {
        Self {
            key: item.key,
            priority: item.priority,
            times_sampled: item.times_sampled,
            inserted_at_unix_nanos: item
                .inserted_at
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos() as u64,
            sequence_range: item.sequence_range,
            chunk_keys: item.chunk_keys(),
        }
    }

    /// Rebuilds the item around resolved chunk shares.
    fn into_item(self, chunks: Vec<ChunkRef>) -> Item {
        Item {
            key: self.key,
            priority: self.priority,
            times_sampled: self.times_sampled,
            inserted_at: UNIX_EPOCH + Duration::from_nanos(self.inserted_at_unix_nanos),
            sequence_range: self.sequence_range,
            chunks,
        }
    }
}

/// A consistent snapshot of table state, sufficient to reconstruct it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointView {
    pub table_name: String,
    pub max_size: i64,
    pub max_times_sampled: i32,
    pub sampler: DistributionOptions,
    pub remover: DistributionOptions,
    pub rate_limiter: RateLimiterCheckpoint,
    /// Items in insertion order.
    pub items: Vec<CheckpointItem>,
    /// Opaque signature, preserved verbatim.
    pub signature: Option<Vec<u8>>,
}

/// Reconstructs a table from a checkpoint view.
///
/// Items are reinstated in insertion order with their sampling history and
/// timestamps, and the rate-limiter counters are restored verbatim, so the
/// rebuilt table admits exactly the operations the original would have.
/// Every referenced chunk must be alive in `store`; a missing chunk is an
/// `InvalidArgument`.
pub fn restore_table(view: &CheckpointView, store: &ChunkStore) -> Result<Table, TableError> {
    let sampler = build_distribution(&view.sampler)?;
    let remover = build_distribution(&view.remover)?;
    let limiter = RateLimiter::restore(&view.rate_limiter)?;
    let table = Table::new(
        view.table_name.clone(),
        sampler,
        remover,
        view.max_size,
        view.max_times_sampled,
        limiter,
        Vec::new(),
        view.signature.clone(),
    )?;
    for item in &view.items {
        let chunks = store.get_many(&item.chunk_keys).map_err(|missing| {
            TableError::invalid_argument(format!(
                "chunk {missing} referenced by item {} is not in the chunk store",
                item.key
            ))
        })?;
        table.insert_restored(item.clone().into_item(chunks))?;
    }
    Ok(table)
}
