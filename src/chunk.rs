//! Chunk handles and a content-addressed chunk store.
//!
//! Trajectory payloads are split into chunks that live outside the tables.
//! A table only ever holds [`ChunkRef`] shares; the bytes themselves are
//! written once and dropped when the last referencing item disappears.
//!
//! The store keeps weak references: it can always hand out a live chunk but
//! never keeps one alive on its own. [`ChunkStore::cleanup`] reclaims map
//! entries whose chunks have died.

use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::item::SequenceRange;

/// Immutable chunk of trajectory data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    key: u64,
    sequence_range: SequenceRange,
    data: Bytes,
}

/// Shared handle to a [`Chunk`]. Items hold one share per referenced chunk.
pub type ChunkRef = Arc<Chunk>;

impl Chunk {
    /// Creates a chunk. The data is reference-counted, never copied.
    pub fn new(key: u64, sequence_range: SequenceRange, data: Bytes) -> Self {
        Self {
            key,
            sequence_range,
            data,
        }
    }

    /// The chunk's content key.
    #[inline]
    pub fn key(&self) -> u64 {
        self.key
    }

    /// The step range this chunk covers.
    #[inline]
    pub fn sequence_range(&self) -> &SequenceRange {
        &self.sequence_range
    }

    /// The encoded payload.
    #[inline]
    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

/// Content-addressed registry of live chunks.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use replaykit::chunk::{Chunk, ChunkStore};
/// use replaykit::item::SequenceRange;
///
/// let store = ChunkStore::new();
/// let chunk = store.insert(Chunk::new(7, SequenceRange::new(1, 0, 3), Bytes::new()));
/// assert!(store.get(7).is_some());
///
/// drop(chunk);
/// assert!(store.get(7).is_none());
/// ```
#[derive(Debug, Default)]
pub struct ChunkStore {
    chunks: RwLock<FxHashMap<u64, Weak<Chunk>>>,
}

impl ChunkStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a chunk and returns a strong share.
    ///
    /// If a live chunk with the same key already exists, that chunk wins and
    /// the argument is discarded.
    pub fn insert(&self, chunk: Chunk) -> ChunkRef {
        let mut chunks = self.chunks.write();
        if let Some(existing) = chunks.get(&chunk.key).and_then(Weak::upgrade) {
            return existing;
        }
        let chunk = Arc::new(chunk);
        chunks.insert(chunk.key, Arc::downgrade(&chunk));
        chunk
    }

    /// Returns a share of the chunk with `key`, if it is still alive.
    pub fn get(&self, key: u64) -> Option<ChunkRef> {
        self.chunks.read().get(&key).and_then(Weak::upgrade)
    }

    /// Resolves a batch of keys. Fails with the first missing key.
    pub fn get_many(&self, keys: &[u64]) -> Result<Vec<ChunkRef>, u64> {
        let chunks = self.chunks.read();
        keys.iter()
            .map(|&key| chunks.get(&key).and_then(Weak::upgrade).ok_or(key))
            .collect()
    }

    /// Drops map entries whose chunks have been released. Returns the number
    /// of entries removed.
    pub fn cleanup(&self) -> usize {
        let mut chunks = self.chunks.write();
        let before = chunks.len();
        chunks.retain(|_, weak| weak.strong_count() > 0);
        before - chunks.len()
    }
}
