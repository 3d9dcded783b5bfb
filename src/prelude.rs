pub use crate::builder::TableBuilder;
pub use crate::checkpoint::{restore_table, CheckpointItem, CheckpointView};
pub use crate::chunk::{Chunk, ChunkRef, ChunkStore};
pub use crate::distribution::{
    build_distribution, DistributionOptions, FifoDistribution, HeapDistribution, KeyDistribution,
    KeyWithProbability, LifoDistribution, PrioritizedDistribution, UniformDistribution,
};
pub use crate::error::TableError;
pub use crate::extension::{ExtensionItem, InsertOnSampleExtension, TableExtension};
pub use crate::item::{Item, Key, SequenceRange};
pub use crate::limiter::{RateLimiter, RateLimiterCheckpoint};
pub use crate::table::{KeyWithPriority, SampledItem, Table};
