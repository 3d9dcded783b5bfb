//! # Table extensions
//!
//! Extensions are side-effect hooks attached to a table and invoked at
//! well-defined points of each operation, always while the table lock is
//! held. The table treats them as observers: a hook cannot veto or mutate
//! the operation it observes, and a failing hook must log and continue
//! rather than abort the table operation.
//!
//! ## Hook order
//!
//! | Operation        | Hooks, in order                                      |
//! |------------------|------------------------------------------------------|
//! | insert (new key) | `before_insert` → commit → `after_insert`            |
//! | assign / update  | `on_update` after the priority change                |
//! | sample           | (`on_delete` if auto-deleted) → `on_sample`          |
//! | delete           | `on_delete` after removal from both distributions    |
//! | reset            | `on_reset` after clearing                            |
//!
//! `after_register` / `before_unregister` bracket the attachment lifetime;
//! `on_checkpoint_loaded` lets an extension re-bind references to peer
//! tables after a restore.
//!
//! ## Re-entrancy
//!
//! Hooks run under the table lock. Calling an operation of the *same* table
//! from inside a hook deadlocks; posting to *another* table is the intended
//! pattern (see [`insert_on_sample`]). Inside `after_register` and other
//! hooks, only the owning table's lock-free accessors (`name`, `max_size`,
//! `max_times_sampled`) are safe to touch.

use std::sync::Arc;

use crate::item::{Item, Key};
use crate::table::Table;

pub mod insert_on_sample;

pub use insert_on_sample::InsertOnSampleExtension;

/// Hook view of an item involved in a table operation.
///
/// The borrow is only valid for the duration of the hook invocation; an
/// extension that needs the item beyond that clones it (cloning shares the
/// chunk handles, not the bytes).
#[derive(Debug, Clone, Copy)]
pub struct ExtensionItem<'a> {
    /// Key of the item the operation touched.
    pub key: Key,
    /// The item's `times_sampled` *after* the operation.
    pub times_sampled: u32,
    /// The full item.
    pub item: &'a Item,
}

impl<'a> ExtensionItem<'a> {
    pub(crate) fn new(item: &'a Item) -> Self {
        Self {
            key: item.key,
            times_sampled: item.times_sampled,
            item,
        }
    }
}

/// Side-effect hook attached to a table.
///
/// All hooks default to no-ops; implementations override the points they
/// care about. Hooks must not panic and must not fail: error conditions are
/// reported through logging and swallowed.
pub trait TableExtension: Send {
    /// Runs before a new item is committed. The item is in neither
    /// distribution yet; the hook must not rely on it being visible.
    fn before_insert(&mut self, _item: &ExtensionItem<'_>) {}

    /// Runs after a new item is in the item map and both distributions.
    fn after_insert(&mut self, _item: &ExtensionItem<'_>) {}

    /// Runs after `times_sampled` has been incremented. If the sample
    /// triggered an auto-delete, `on_delete` has already run and the view
    /// borrows the removed item's snapshot.
    fn on_sample(&mut self, _item: &ExtensionItem<'_>) {}

    /// Runs after a priority change (assignment or batch update).
    fn on_update(&mut self, _item: &ExtensionItem<'_>) {}

    /// Runs after removal from both distributions, while the item object
    /// still exists.
    fn on_delete(&mut self, _item: &ExtensionItem<'_>) {}

    /// Runs after the table has been cleared.
    fn on_reset(&mut self) {}

    /// Runs once when the extension is attached.
    fn after_register(&mut self, _table: &Table) {}

    /// Runs once at detachment or table teardown.
    fn before_unregister(&mut self) {}

    /// Runs after a checkpoint restore so the extension can re-bind
    /// references to peer tables by name.
    fn on_checkpoint_loaded(&mut self, _tables: &[Arc<Table>]) {}

    /// A short description for diagnostics.
    fn debug_string(&self) -> String;
}
