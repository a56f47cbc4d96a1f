//! Cache Table Module
//!
//! The concurrent item store: key/value map, lifecycle callbacks, data
//! loader, and expiration scheduler state.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{RwLock, RwLockWriteGuard};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::hooks::CallbackList;
use crate::cache::item::CacheItem;
use crate::error::{CacheError, Result};

/// Extra argument handed through [`CacheTable::value_with`] to the data
/// loader.
pub type LoaderArg = dyn Any + Send + Sync;

/// Callback receiving the item that was just added or is about to be
/// removed.
pub type ItemCallback<K, V> = dyn Fn(&Arc<CacheItem<K, V>>) + Send + Sync;

/// Cache-miss loader: given the key and any caller-supplied extra arguments,
/// produces a lifespan and payload for a new item, or `None` when the key
/// cannot be loaded.
pub type DataLoader<K, V> = dyn Fn(&K, &[&LoaderArg]) -> Option<(Duration, V)> + Send + Sync;

// Everything guarded by the table-wide readers/writer lock.
pub(crate) struct TableState<K, V> {
    pub(crate) items: HashMap<K, Arc<CacheItem<K, V>>>,
    /// Duration until the armed sweep fires; zero while no sweep is
    /// scheduled
    pub(crate) cleanup_interval: Duration,
    /// The armed sweep task, if any
    pub(crate) cleanup_task: Option<JoinHandle<()>>,
    load_data: Option<Arc<DataLoader<K, V>>>,
    added_item: CallbackList<ItemCallback<K, V>>,
    about_to_delete_item: CallbackList<ItemCallback<K, V>>,
}

// == Cache Table ==
/// A concurrency-safe key/value table with per-item lifespans.
///
/// Items whose lifespan elapses without an access are removed by a
/// self-adjusting background sweep that always fires at the next-soonest
/// expiry. Lifecycle callbacks and the data loader run with the table lock
/// released, so they may call back into the table.
pub struct CacheTable<K, V> {
    /// The table's name, immutable after creation
    name: String,
    pub(crate) state: RwLock<TableState<K, V>>,
    /// Runtime the sweep tasks are spawned on
    pub(crate) runtime: Handle,
    /// Handle the sweep tasks use to re-enter the table without keeping it
    /// alive
    pub(crate) me: Weak<CacheTable<K, V>>,
}

impl<K, V> CacheTable<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates an empty table with the given name.
    ///
    /// # Panics
    /// Panics when called outside a Tokio runtime; the runtime is captured
    /// here so expiration sweeps can be scheduled later.
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            name: name.into(),
            state: RwLock::new(TableState {
                items: HashMap::new(),
                cleanup_interval: Duration::ZERO,
                cleanup_task: None,
                load_data: None,
                added_item: CallbackList::new(),
                about_to_delete_item: CallbackList::new(),
            }),
            runtime: Handle::current(),
            me: me.clone(),
        })
    }

    /// Returns the table's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    // == Count ==
    /// Returns how many items are currently stored.
    pub fn count(&self) -> usize {
        self.state.read().items.len()
    }

    // == Exists ==
    /// Returns whether `key` is present. Unlike [`value`](Self::value) this
    /// neither consults the data loader nor refreshes the item's access
    /// metadata.
    pub fn exists(&self, key: &K) -> bool {
        self.state.read().items.contains_key(key)
    }

    // == Foreach ==
    /// Invokes `visit` for every stored item.
    ///
    /// The table's read lock is held for the whole traversal, so `visit`
    /// must not call back into the table.
    pub fn foreach(&self, mut visit: impl FnMut(&K, &Arc<CacheItem<K, V>>)) {
        let state = self.state.read();
        for (key, item) in &state.items {
            visit(key, item);
        }
    }

    // == Loader Registration ==
    /// Configures the data loader consulted when [`value`](Self::value)
    /// misses. The key and any extra arguments from
    /// [`value_with`](Self::value_with) are passed to the loader.
    pub fn set_data_loader(
        &self,
        f: impl Fn(&K, &[&LoaderArg]) -> Option<(Duration, V)> + Send + Sync + 'static,
    ) {
        self.state.write().load_data = Some(Arc::new(f));
    }

    // == Callback Registration ==
    /// Configures a callback fired every time an item is added, replacing
    /// any previously registered added-item callbacks.
    pub fn set_added_item_callback(
        &self,
        f: impl Fn(&Arc<CacheItem<K, V>>) + Send + Sync + 'static,
    ) {
        self.state.write().added_item.set(Arc::new(f));
    }

    /// Appends a callback fired every time an item is added.
    pub fn add_added_item_callback(
        &self,
        f: impl Fn(&Arc<CacheItem<K, V>>) + Send + Sync + 'static,
    ) {
        self.state.write().added_item.push(Arc::new(f));
    }

    /// Empties the added-item callback queue.
    pub fn remove_added_item_callbacks(&self) {
        self.state.write().added_item.clear();
    }

    /// Configures a callback fired right before an item is removed, for any
    /// removal cause, replacing any previously registered about-to-delete
    /// callbacks.
    pub fn set_about_to_delete_item_callback(
        &self,
        f: impl Fn(&Arc<CacheItem<K, V>>) + Send + Sync + 'static,
    ) {
        self.state.write().about_to_delete_item.set(Arc::new(f));
    }

    /// Appends a callback fired right before an item is removed.
    pub fn add_about_to_delete_item_callback(
        &self,
        f: impl Fn(&Arc<CacheItem<K, V>>) + Send + Sync + 'static,
    ) {
        self.state.write().about_to_delete_item.push(Arc::new(f));
    }

    /// Empties the about-to-delete callback queue.
    pub fn remove_about_to_delete_item_callbacks(&self) {
        self.state.write().about_to_delete_item.clear();
    }

    // == Add ==
    /// Inserts a key/value pair with the given lifespan and returns the new
    /// item.
    ///
    /// A zero `lifespan` means the item never expires; otherwise the item is
    /// removed once `lifespan` passes without an access. An existing item
    /// under the same key is replaced without delete callbacks firing.
    pub fn add(&self, key: K, lifespan: Duration, data: V) -> Arc<CacheItem<K, V>> {
        let item = Arc::new(CacheItem::new(key, lifespan, data));
        let state = self.state.write();
        self.add_internal(state, item)
    }

    // Inserts the item, then fires the added-item callbacks with the table
    // lock released. Triggers an immediate expiration check when the new
    // item expires sooner than the armed sweep.
    fn add_internal(
        &self,
        mut state: RwLockWriteGuard<'_, TableState<K, V>>,
        item: Arc<CacheItem<K, V>>,
    ) -> Arc<CacheItem<K, V>> {
        debug!(
            "adding item with key {:?} and lifespan {:?} to table {}",
            item.key(),
            item.lifespan(),
            self.name
        );
        state.items.insert(item.key().clone(), Arc::clone(&item));

        let cleanup_interval = state.cleanup_interval;
        let added_item = state.added_item.snapshot();
        drop(state);

        for callback in added_item {
            callback(&item);
        }

        let lifespan = item.lifespan();
        if !lifespan.is_zero() && (cleanup_interval.is_zero() || lifespan < cleanup_interval) {
            self.expiration_check();
        }

        item
    }

    // == Not Found Add ==
    /// Inserts the pair only when `key` is absent, atomically with respect
    /// to concurrent adds and deletes of the same key.
    ///
    /// Returns `true` when the insertion happened; an existing item is left
    /// untouched and `false` is returned.
    pub fn not_found_add(&self, key: K, lifespan: Duration, data: V) -> bool {
        let state = self.state.write();
        if state.items.contains_key(&key) {
            return false;
        }

        let item = Arc::new(CacheItem::new(key, lifespan, data));
        self.add_internal(state, item);
        true
    }

    // == Value ==
    /// Returns the item stored under `key` and refreshes its access
    /// metadata.
    ///
    /// On a miss the configured data loader, if any, is consulted; a loaded
    /// item is inserted through the standard add path, with added-item
    /// callbacks firing, and returned. Fails with
    /// [`CacheError::KeyNotFound`] when the key is absent and no loader is
    /// configured, and with [`CacheError::KeyNotFoundOrNotLoadable`] when
    /// the loader produced nothing.
    pub fn value(&self, key: &K) -> Result<Arc<CacheItem<K, V>>> {
        self.value_with(key, &[])
    }

    /// Like [`value`](Self::value), with extra arguments handed through to
    /// the data loader.
    pub fn value_with(&self, key: &K, args: &[&LoaderArg]) -> Result<Arc<CacheItem<K, V>>> {
        let state = self.state.read();
        let found = state.items.get(key).cloned();
        let load_data = state.load_data.clone();
        drop(state);

        if let Some(item) = found {
            item.keep_alive();
            return Ok(item);
        }

        // Miss. Try to synthesize the item with the data loader, which runs
        // with the lock released and may block.
        let Some(loader) = load_data else {
            return Err(CacheError::KeyNotFound);
        };
        match loader(key, args) {
            Some((lifespan, data)) => Ok(self.add(key.clone(), lifespan, data)),
            None => Err(CacheError::KeyNotFoundOrNotLoadable),
        }
    }

    // == Delete ==
    /// Removes the item stored under `key` and returns it.
    ///
    /// The table's about-to-delete callbacks fire first, then the item's
    /// about-to-expire callbacks, each in registration order. Fails with
    /// [`CacheError::KeyNotFound`] when the key is absent.
    pub fn delete(&self, key: &K) -> Result<Arc<CacheItem<K, V>>> {
        self.delete_internal(key)
    }

    // Shared removal routine: explicit deletes and the expiration sweep both
    // land here, so delete callbacks fire identically for either cause.
    // Callbacks run with the table lock released; the map entry is removed
    // after they return.
    pub(crate) fn delete_internal(&self, key: &K) -> Result<Arc<CacheItem<K, V>>> {
        let state = self.state.write();
        let Some(item) = state.items.get(key).cloned() else {
            return Err(CacheError::KeyNotFound);
        };
        let about_to_delete = state.about_to_delete_item.snapshot();
        drop(state);

        for callback in about_to_delete {
            callback(&item);
        }
        item.run_about_to_expire(key);

        let mut state = self.state.write();
        debug!(
            "deleting item with key {:?} accessed {} times from table {}",
            key,
            item.access_count(),
            self.name
        );
        state.items.remove(key);
        Ok(item)
    }

    // == Flush ==
    /// Discards every item and cancels any pending expiration sweep.
    pub fn flush(&self) {
        let mut state = self.state.write();
        debug!("flushing table {}", self.name);

        state.items.clear();
        state.cleanup_interval = Duration::ZERO;
        if let Some(task) = state.cleanup_task.take() {
            task.abort();
        }
    }
}

impl<K, V> fmt::Debug for CacheTable<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheTable")
            .field("name", &self.name)
            .field("items", &self.state.read().items.len())
            .finish()
    }
}

impl<K, V> Drop for CacheTable<K, V> {
    fn drop(&mut self) {
        // A sleeping sweep task only holds a weak handle; aborting it here
        // keeps a dropped table from leaving a timer behind.
        if let Some(task) = self.state.get_mut().cleanup_task.take() {
            task.abort();
        }
    }
}
