//! Replicates items into a second table the first time they are sampled.
//!
//! Attached to a *source* table, this extension watches `on_sample` and,
//! when an item's `times_sampled` reaches one, inserts a copy of it into a
//! *target* table. The copy keeps the item's key (so priority updates sent
//! to the target address the same item) and its `times_sampled` of one;
//! chunk handles are shared, not duplicated.
//!
//! Replication is best-effort: if the target's insert gate stays shut past
//! the configured timeout, the copy is dropped and a warning is logged.
//! The source operation is never aborted. Prefer a short timeout whenever
//! the target can block inserts.
//!
//! The target must be a *different* table; the hook runs under the source
//! table's lock and inserting back into it would deadlock.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::extension::{ExtensionItem, TableExtension};
use crate::table::Table;

const UNDEFINED_NAME: &str = "__undefined__";

/// Copies first-time-sampled items into a target table.
pub struct InsertOnSampleExtension {
    target_table: Arc<Table>,
    /// Cached so `debug_string` does not need the source table's lock.
    source_name: String,
    timeout: Option<Duration>,
}

impl InsertOnSampleExtension {
    /// Creates an extension replicating into `target_table`.
    ///
    /// `timeout` bounds how long a replication may block on the target's
    /// insert gate; `None` blocks until the insert succeeds or the target
    /// closes.
    pub fn new(target_table: Arc<Table>, timeout: Option<Duration>) -> Self {
        Self {
            target_table,
            source_name: UNDEFINED_NAME.to_string(),
            timeout,
        }
    }
}

impl TableExtension for InsertOnSampleExtension {
    fn on_sample(&mut self, item: &ExtensionItem<'_>) {
        // Only the first sample replicates.
        if item.times_sampled != 1 {
            return;
        }
        let copy = item.item.clone();
        if let Err(error) = self
            .target_table
            .insert_or_assign_with_timeout(copy, self.timeout)
        {
            warn!(
                source = %self.source_name,
                target = %self.target_table.name(),
                %error,
                "dropped sampled item while copying between tables"
            );
        }
    }

    fn after_register(&mut self, table: &Table) {
        self.source_name = table.name().to_string();
    }

    fn before_unregister(&mut self) {
        self.source_name = UNDEFINED_NAME.to_string();
    }

    fn on_checkpoint_loaded(&mut self, tables: &[Arc<Table>]) {
        match tables
            .iter()
            .find(|table| table.name() == self.target_table.name())
        {
            Some(table) => self.target_table = Arc::clone(table),
            None => panic!(
                "target table '{}' not found in the restored set",
                self.target_table.name()
            ),
        }
    }

    fn debug_string(&self) -> String {
        format!(
            "InsertOnSampleExtension(source={}, target={})",
            self.source_name,
            self.target_table.name()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TableBuilder;
    use crate::chunk::Chunk;
    use crate::item::{Item, SequenceRange};
    use crate::limiter::RateLimiter;
    use bytes::Bytes;

    fn make_item(key: u64, priority: f64) -> Item {
        let range = SequenceRange::new(key, 0, 1);
        let chunk = Arc::new(Chunk::new(key * 100, range, Bytes::new()));
        Item::new(key, priority, range, vec![chunk])
    }

    fn source_with_target(target: Arc<Table>) -> Table {
        TableBuilder::new("source", 100)
            .extension(Box::new(InsertOnSampleExtension::new(
                target,
                Some(Duration::from_millis(100)),
            )))
            .build()
            .unwrap()
    }

    #[test]
    fn first_sample_copies_into_target() {
        let target = Arc::new(TableBuilder::new("target", 100).build().unwrap());
        let source = source_with_target(target.clone());

        source.insert_or_assign(make_item(7, 3.0)).unwrap();
        assert_eq!(target.size(), 0);

        source.sample().unwrap();
        assert_eq!(target.size(), 1);

        let copied = target.get(7).unwrap();
        assert_eq!(copied.priority, 3.0);
        assert_eq!(copied.times_sampled, 1);
    }

    #[test]
    fn later_samples_do_not_replicate_again() {
        let target = Arc::new(TableBuilder::new("target", 100).build().unwrap());
        let source = source_with_target(target.clone());

        source.insert_or_assign(make_item(7, 3.0)).unwrap();
        source.sample().unwrap();
        source.sample().unwrap();
        source.sample().unwrap();

        assert_eq!(target.size(), 1);
        assert_eq!(target.get(7).unwrap().times_sampled, 1);
    }

    #[test]
    fn chunk_shares_are_cloned_not_copied() {
        let target = Arc::new(TableBuilder::new("target", 100).build().unwrap());
        let source = source_with_target(target.clone());

        let item = make_item(7, 3.0);
        let chunk = item.chunks[0].clone();
        source.insert_or_assign(item).unwrap();
        source.sample().unwrap();

        assert!(Arc::ptr_eq(&target.get(7).unwrap().chunks[0], &chunk));
    }

    #[test]
    fn failed_replication_does_not_abort_the_sample() {
        // Target with an exhausted insert budget: replication times out.
        let target = Arc::new(
            TableBuilder::new("target", 100)
                .rate_limiter(RateLimiter::new(1.0, 1, -1.0, 1.0).unwrap())
                .build()
                .unwrap(),
        );
        target.insert_or_assign(make_item(99, 1.0)).unwrap();

        let source = TableBuilder::new("source", 100)
            .extension(Box::new(InsertOnSampleExtension::new(
                target.clone(),
                Some(Duration::from_millis(10)),
            )))
            .build()
            .unwrap();
        source.insert_or_assign(make_item(7, 3.0)).unwrap();

        let sample = source.sample().unwrap();
        assert_eq!(sample.item.key, 7);
        assert_eq!(target.size(), 1);
        assert!(target.get(7).is_none());
    }

    #[test]
    fn checkpoint_loaded_rebinds_the_target_by_name() {
        let stale = Arc::new(TableBuilder::new("target", 100).build().unwrap());
        let mut extension = InsertOnSampleExtension::new(stale, None);

        let fresh = Arc::new(TableBuilder::new("target", 100).build().unwrap());
        let other = Arc::new(TableBuilder::new("other", 100).build().unwrap());
        extension.on_checkpoint_loaded(&[other, fresh.clone()]);

        fresh
            .insert_or_assign(make_item(1, 1.0))
            .unwrap();
        assert!(extension.debug_string().contains("target=target"));
    }

    #[test]
    #[should_panic(expected = "not found in the restored set")]
    fn checkpoint_loaded_without_target_panics() {
        let stale = Arc::new(TableBuilder::new("target", 100).build().unwrap());
        let mut extension = InsertOnSampleExtension::new(stale, None);
        let other = Arc::new(TableBuilder::new("other", 100).build().unwrap());
        extension.on_checkpoint_loaded(&[other]);
    }

    #[test]
    fn debug_string_names_both_tables() {
        let target = Arc::new(TableBuilder::new("target", 100).build().unwrap());
        let source = source_with_target(target);
        assert_eq!(
            source.extension_debug_strings(),
            vec!["InsertOnSampleExtension(source=source, target=target)".to_string()]
        );
    }
}
