//! The table: a bounded, concurrent container of prioritized items.
//!
//! A table owns its items, two key distributions (the *sampler* picks what
//! [`Table::sample`] returns, the *remover* picks the eviction victim when
//! an insert overflows `max_size`), a [`RateLimiter`] coupling insert and
//! sample throughput, and a list of [`TableExtension`] hooks.
//!
//! ## Concurrency model
//!
//! One `parking_lot::Mutex` guards all mutable state; one `Condvar` parks
//! blocked inserters and samplers. Blocking operations release the lock
//! while waiting and re-check their admission predicate on every wake.
//! Every state change that could open a predicate broadcasts: successful
//! insert, sample, delete, reset, and close. Extension hooks run under the
//! lock, so they observe a consistent table but must not call back into it.
//!
//! ## Operations
//!
//! | Operation          | Blocks on              | Counters touched  |
//! |--------------------|------------------------|-------------------|
//! | `insert_or_assign` | insert gate (new keys) | `insert_count` on true inserts only |
//! | `sample`           | sample gate            | `sample_count`    |
//! | `mutate_items`     | never                  | none              |
//! | `get` / `copy`     | never                  | none              |
//! | `reset`            | never                  | both zeroed       |
//! | `close`            | never                  | none (cancels)    |
//!
//! `copy` and `checkpoint` observe items in insertion order; assignments to
//! an existing key do not re-order.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::{Condvar, Mutex, MutexGuard};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::checkpoint::{CheckpointItem, CheckpointView};
use crate::distribution::KeyDistribution;
use crate::ds::KeyChain;
use crate::error::TableError;
use crate::extension::{ExtensionItem, TableExtension};
use crate::item::{Item, Key};
use crate::limiter::RateLimiter;

/// A priority assignment for [`Table::mutate_items`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyWithPriority {
    pub key: Key,
    pub priority: f64,
}

/// The result of a successful [`Table::sample`].
#[derive(Debug, Clone)]
pub struct SampledItem {
    /// Snapshot of the item, `times_sampled` already incremented. Its
    /// `chunks` are live shares into the chunk store.
    pub item: Item,
    /// Probability with which the sampler chose this item.
    pub probability: f64,
    /// Table size at the moment of sampling, before any auto-delete.
    pub table_size: i64,
}

struct State {
    items: FxHashMap<Key, Item>,
    /// Commit order of first insertions; assignments do not re-order.
    order: KeyChain,
    sampler: Box<dyn KeyDistribution>,
    remover: Box<dyn KeyDistribution>,
    limiter: RateLimiter,
    extensions: Vec<Box<dyn TableExtension>>,
    closed: bool,
}

/// Bounded concurrent container of [`Item`]s with pluggable sampling and
/// eviction policies.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use bytes::Bytes;
/// use replaykit::builder::TableBuilder;
/// use replaykit::chunk::Chunk;
/// use replaykit::item::{Item, SequenceRange};
///
/// let table = TableBuilder::new("replay", 100).build().unwrap();
///
/// let range = SequenceRange::new(1, 0, 3);
/// let chunk = Arc::new(Chunk::new(10, range, Bytes::new()));
/// table
///     .insert_or_assign(Item::new(1, 2.5, range, vec![chunk]))
///     .unwrap();
///
/// let sample = table.sample().unwrap();
/// assert_eq!(sample.item.key, 1);
/// assert_eq!(sample.table_size, 1);
/// ```
pub struct Table {
    name: String,
    max_size: i64,
    max_times_sampled: i32,
    signature: Option<Vec<u8>>,
    state: Mutex<State>,
    wakeup: Condvar,
}

impl Table {
    /// Creates a table.
    ///
    /// `max_size` must be positive. `max_times_sampled <= 0` disables
    /// sample-count-based auto-deletion. Initial extensions are registered
    /// in order.
    pub fn new(
        name: impl Into<String>,
        sampler: Box<dyn KeyDistribution>,
        remover: Box<dyn KeyDistribution>,
        max_size: i64,
        max_times_sampled: i32,
        limiter: RateLimiter,
        extensions: Vec<Box<dyn TableExtension>>,
        signature: Option<Vec<u8>>,
    ) -> Result<Self, TableError> {
        if max_size <= 0 {
            return Err(TableError::invalid_argument(format!(
                "max_size must be positive, got {max_size}"
            )));
        }
        let table = Self {
            name: name.into(),
            max_size,
            max_times_sampled,
            signature,
            state: Mutex::new(State {
                items: FxHashMap::default(),
                order: KeyChain::new(),
                sampler,
                remover,
                limiter,
                extensions: Vec::new(),
                closed: false,
            }),
            wakeup: Condvar::new(),
        };
        for extension in extensions {
            table.unsafe_add_extension(extension);
        }
        Ok(table)
    }

    /// The table's name, as used by RPCs and extension wiring.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Capacity above which inserts evict.
    #[inline]
    pub fn max_size(&self) -> i64 {
        self.max_size
    }

    /// Sample count at which items are auto-deleted, `<= 0` if disabled.
    #[inline]
    pub fn max_times_sampled(&self) -> i32 {
        self.max_times_sampled
    }

    /// The opaque signature attached at construction, if any.
    #[inline]
    pub fn signature(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }

    /// Number of items currently stored.
    pub fn size(&self) -> i64 {
        self.state.lock().items.len() as i64
    }

    /// Inserts a new item or assigns to an existing key, blocking until the
    /// insert gate opens.
    ///
    /// If `item.key` is already present this is an *assignment*: priority,
    /// chunks, and sequence range are replaced, `inserted_at` and
    /// `times_sampled` survive, `insert_count` is not consumed, and the
    /// call never blocks. A caller that blocked on the gate and finds the
    /// key present on wake falls through to the assignment without
    /// consuming an insert right.
    ///
    /// If the table is at `max_size`, the remover picks a victim which is
    /// deleted before the new item is committed.
    pub fn insert_or_assign(&self, item: Item) -> Result<(), TableError> {
        self.insert_or_assign_with_timeout(item, None)
    }

    /// As [`insert_or_assign`](Self::insert_or_assign), giving up with
    /// `DeadlineExceeded` if the gate stays shut for `timeout`.
    pub fn insert_or_assign_with_timeout(
        &self,
        item: Item,
        timeout: Option<Duration>,
    ) -> Result<(), TableError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        if state.closed {
            return Err(TableError::Cancelled(self.name.clone()));
        }

        // Fast path: an existing key is an assignment and never waits.
        if state.items.contains_key(&item.key) {
            self.apply_assignment(&mut state, item);
            return Ok(());
        }

        loop {
            if state.closed {
                return Err(TableError::Cancelled(self.name.clone()));
            }
            if state.limiter.can_insert() {
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(TableError::DeadlineExceeded(self.name.clone()));
            }
            self.wait(&mut state, deadline);
        }

        // The key may have appeared while this call was parked. It is an
        // assignment after all, and the insert right stays unconsumed for
        // the next waiter.
        if state.items.contains_key(&item.key) {
            self.apply_assignment(&mut state, item);
            return Ok(());
        }

        // At capacity: the remover picks the victim. The incoming key is
        // not yet present, so it can never evict itself.
        if state.items.len() as i64 >= self.max_size {
            let victim = state.remover.sample().key;
            Self::remove_item(&mut state, victim)
                .expect("remover returned a key the table does not hold");
        }

        let key = item.key;
        let mut item = item;
        item.inserted_at = SystemTime::now();
        {
            let State {
                items,
                order,
                sampler,
                remover,
                extensions,
                ..
            } = &mut *state;

            let view = ExtensionItem::new(&item);
            for extension in extensions.iter_mut() {
                extension.before_insert(&view);
            }

            sampler
                .insert(key, item.priority)
                .expect("sampler already holds a key missing from the table");
            remover
                .insert(key, item.priority)
                .expect("remover already holds a key missing from the table");
            order.push_back(key);
            items.insert(key, item);

            let view = ExtensionItem::new(&items[&key]);
            for extension in extensions.iter_mut() {
                extension.after_insert(&view);
            }
        }
        state.limiter.insert();
        self.wakeup.notify_all();
        Ok(())
    }

    /// Samples one item according to the sampler's policy, blocking until
    /// the sample gate opens.
    ///
    /// Increments the item's `times_sampled`; if that reaches
    /// `max_times_sampled` the item is removed before the call returns.
    pub fn sample(&self) -> Result<SampledItem, TableError> {
        self.sample_with_timeout(None)
    }

    /// As [`sample`](Self::sample), giving up with `DeadlineExceeded` if
    /// the gate stays shut for `timeout`.
    pub fn sample_with_timeout(
        &self,
        timeout: Option<Duration>,
    ) -> Result<SampledItem, TableError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(TableError::Cancelled(self.name.clone()));
            }
            if state.limiter.can_sample(state.items.len() as i64) {
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(TableError::DeadlineExceeded(self.name.clone()));
            }
            self.wait(&mut state, deadline);
        }

        let picked = state.sampler.sample();
        let table_size = state.items.len() as i64;
        let snapshot = {
            let item = state
                .items
                .get_mut(&picked.key)
                .expect("sampler returned a key the table does not hold");
            item.times_sampled += 1;
            item.clone()
        };

        if self.max_times_sampled > 0 && snapshot.times_sampled == self.max_times_sampled as u32 {
            Self::remove_item(&mut state, picked.key)
                .expect("sampled key vanished before auto-delete");
        } else {
            state
                .sampler
                .update(picked.key, snapshot.priority)
                .expect("sampler lost a sampled key");
        }

        {
            let view = ExtensionItem::new(&snapshot);
            for extension in state.extensions.iter_mut() {
                extension.on_sample(&view);
            }
        }
        state.limiter.sample();
        self.wakeup.notify_all();
        Ok(SampledItem {
            item: snapshot,
            probability: picked.probability,
            table_size,
        })
    }

    /// Applies priority updates and deletions in order, partially.
    ///
    /// Updates and deletes whose key is missing are silently skipped; the
    /// rest are applied. Never blocks on the rate limiter and touches no
    /// limiter counters.
    pub fn mutate_items(
        &self,
        updates: &[KeyWithPriority],
        deletes: &[Key],
    ) -> Result<(), TableError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TableError::Cancelled(self.name.clone()));
        }
        for update in updates {
            let State {
                items,
                sampler,
                remover,
                extensions,
                ..
            } = &mut *state;
            let Some(item) = items.get_mut(&update.key) else {
                continue;
            };
            item.priority = update.priority;
            sampler
                .update(update.key, update.priority)
                .expect("sampler lost an updated key");
            remover
                .update(update.key, update.priority)
                .expect("remover lost an updated key");
            let view = ExtensionItem::new(item);
            for extension in extensions.iter_mut() {
                extension.on_update(&view);
            }
        }

        let mut any_deleted = false;
        for &key in deletes {
            any_deleted |= Self::remove_item(&mut state, key).is_some();
        }
        if any_deleted {
            self.wakeup.notify_all();
        }
        Ok(())
    }

    /// Non-blocking lookup. No hooks run, no counters move.
    pub fn get(&self, key: Key) -> Option<Item> {
        self.state.lock().items.get(&key).cloned()
    }

    /// Snapshots up to `count` items in insertion order (`0` means all).
    ///
    /// No hooks run and no counters move; intended for debugging and
    /// checkpointing.
    pub fn copy(&self, count: usize) -> Vec<Item> {
        let state = self.state.lock();
        let take = if count == 0 { state.items.len() } else { count };
        state
            .order
            .iter()
            .take(take)
            .map(|key| state.items[&key].clone())
            .collect()
    }

    /// Drops all items and zeroes the rate-limiter counters.
    ///
    /// Blocked operations wake and re-evaluate their predicates; whoever is
    /// still inadmissible keeps waiting.
    pub fn reset(&self) -> Result<(), TableError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TableError::Cancelled(self.name.clone()));
        }
        state.items.clear();
        state.order.clear();
        state.sampler.clear();
        state.remover.clear();
        state.limiter.reset();
        for extension in state.extensions.iter_mut() {
            extension.on_reset();
        }
        debug!(table = %self.name, "table reset");
        self.wakeup.notify_all();
        Ok(())
    }

    /// Closes the table. Pending and future blocking calls return
    /// `Cancelled`. Idempotent.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        state.limiter.cancel();
        debug!(table = %self.name, "table closed");
        self.wakeup.notify_all();
    }

    /// Takes a consistent snapshot of the table's logical state.
    pub fn checkpoint(&self) -> CheckpointView {
        let state = self.state.lock();
        CheckpointView {
            table_name: self.name.clone(),
            max_size: self.max_size,
            max_times_sampled: self.max_times_sampled,
            sampler: state.sampler.options(),
            remover: state.remover.options(),
            rate_limiter: state.limiter.checkpoint(),
            items: state
                .order
                .iter()
                .map(|key| CheckpointItem::from_item(&state.items[&key]))
                .collect(),
            signature: self.signature.clone(),
        }
    }

    /// Attaches an extension and fires its `after_register` hook.
    ///
    /// # Panics
    ///
    /// Panics if the table is not empty; attaching an extension mid-stream
    /// would let it observe a world it never saw being built.
    pub fn unsafe_add_extension(&self, mut extension: Box<dyn TableExtension>) {
        let mut state = self.state.lock();
        assert!(
            state.items.is_empty(),
            "extensions must be attached while table '{}' is empty",
            self.name
        );
        extension.after_register(self);
        state.extensions.push(extension);
    }

    /// Forwards `on_checkpoint_loaded` to every attached extension.
    ///
    /// Called by the checkpointing layer once all tables of a restored set
    /// exist, so extensions can re-bind peer tables by name.
    pub fn notify_checkpoint_loaded(&self, tables: &[Arc<Table>]) {
        let mut state = self.state.lock();
        for extension in state.extensions.iter_mut() {
            extension.on_checkpoint_loaded(tables);
        }
    }

    /// Debug descriptions of the attached extensions.
    pub fn extension_debug_strings(&self) -> Vec<String> {
        self.state
            .lock()
            .extensions
            .iter()
            .map(|extension| extension.debug_string())
            .collect()
    }

    /// Re-inserts a checkpointed item, bypassing hooks, eviction, and the
    /// rate limiter. Restore-path only.
    pub(crate) fn insert_restored(&self, item: Item) -> Result<(), TableError> {
        let mut state = self.state.lock();
        if state.items.len() as i64 >= self.max_size {
            return Err(TableError::invalid_argument(format!(
                "checkpoint holds more than max_size ({}) items",
                self.max_size
            )));
        }
        if state.items.contains_key(&item.key) {
            return Err(TableError::invalid_argument(format!(
                "checkpoint repeats key {}",
                item.key
            )));
        }
        state.sampler.insert(item.key, item.priority)?;
        state.remover.insert(item.key, item.priority)?;
        state.order.push_back(item.key);
        state.items.insert(item.key, item);
        Ok(())
    }

    /// Blocks on the wakeup condvar until broadcast or `deadline`.
    ///
    /// Returns normally in both cases; the surrounding loop re-evaluates
    /// its predicate (so a wake that races the deadline is not lost) and
    /// surfaces `DeadlineExceeded` itself once the deadline has passed.
    fn wait(&self, state: &mut MutexGuard<'_, State>, deadline: Option<Instant>) {
        match deadline {
            Some(deadline) => {
                let _ = self.wakeup.wait_until(state, deadline);
            }
            None => self.wakeup.wait(state),
        }
    }

    /// Assignment branch of `insert_or_assign`: replaces the payload,
    /// preserves identity and sampling history, consumes no insert right.
    fn apply_assignment(&self, state: &mut MutexGuard<'_, State>, item: Item) {
        let State {
            items,
            sampler,
            remover,
            extensions,
            ..
        } = &mut **state;
        let existing = items
            .get_mut(&item.key)
            .expect("assignment target disappeared under the lock");
        existing.priority = item.priority;
        existing.chunks = item.chunks;
        existing.sequence_range = item.sequence_range;
        sampler
            .update(item.key, item.priority)
            .expect("sampler lost an assigned key");
        remover
            .update(item.key, item.priority)
            .expect("remover lost an assigned key");
        let view = ExtensionItem::new(existing);
        for extension in extensions.iter_mut() {
            extension.on_update(&view);
        }
    }

    /// Removes `key` from the item map, the order index, and both
    /// distributions, then fires `on_delete`. Returns the removed item.
    fn remove_item(state: &mut MutexGuard<'_, State>, key: Key) -> Option<Item> {
        let item = state.items.remove(&key)?;
        state.order.remove(key);
        state
            .sampler
            .delete(key)
            .expect("sampler lost a deleted key");
        state
            .remover
            .delete(key)
            .expect("remover lost a deleted key");
        let view = ExtensionItem::new(&item);
        for extension in state.extensions.iter_mut() {
            extension.on_delete(&view);
        }
        Some(item)
    }
}

impl Drop for Table {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        state.closed = true;
        state.limiter.cancel();
        for extension in state.extensions.iter_mut() {
            extension.before_unregister();
        }
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("max_size", &self.max_size)
            .field("max_times_sampled", &self.max_times_sampled)
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}
