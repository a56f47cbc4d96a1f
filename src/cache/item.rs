//! Cache Item Module
//!
//! Defines a single cached entry with access tracking and expiration
//! metadata.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::cache::hooks::CallbackList;

/// Callback invoked with the item's key right before the item is removed.
pub type ExpireCallback<K> = dyn Fn(&K) + Send + Sync;

// Mutable metadata, guarded by the item's own lock.
struct ItemState<K> {
    accessed_on: Instant,
    access_count: u64,
    about_to_expire: CallbackList<ExpireCallback<K>>,
}

// == Cache Item ==
/// A single cache entry: key, payload, and per-item expiration metadata.
///
/// The engine hands out items as `Arc<CacheItem>`; the table's map holds the
/// owning reference, so an item handle does not keep the entry cached. All
/// mutable metadata lives behind the item's own lock, distinct from the
/// table lock, so access bookkeeping never serializes behind whole-table
/// operations.
pub struct CacheItem<K, V> {
    /// The item's cache key
    key: K,
    /// The stored payload, opaque to the engine
    data: V,
    /// Permitted inactivity before expiry; zero means the item never expires
    lifespan: Duration,
    /// Creation timestamp, immutable
    created_on: Instant,
    state: RwLock<ItemState<K>>,
}

impl<K, V> CacheItem<K, V> {
    // == Constructor ==
    /// Creates a new item with the given key, lifespan and payload.
    ///
    /// A zero `lifespan` marks the item as immortal: it is only removed by
    /// an explicit delete or a table flush.
    pub fn new(key: K, lifespan: Duration, data: V) -> Self {
        let now = Instant::now();
        Self {
            key,
            data,
            lifespan,
            created_on: now,
            state: RwLock::new(ItemState {
                accessed_on: now,
                access_count: 0,
                about_to_expire: CallbackList::new(),
            }),
        }
    }

    // == Keep Alive ==
    /// Marks the item as accessed: refreshes the access timestamp and bumps
    /// the access counter.
    pub fn keep_alive(&self) {
        let mut state = self.state.write();
        state.accessed_on = Instant::now();
        state.access_count += 1;
    }

    // == Accessors ==
    /// Returns the item's key.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Returns the stored payload.
    pub fn data(&self) -> &V {
        &self.data
    }

    /// Returns the item's lifespan; zero means it never expires.
    pub fn lifespan(&self) -> Duration {
        self.lifespan
    }

    /// Returns when the item was created.
    pub fn created_on(&self) -> Instant {
        self.created_on
    }

    /// Returns when the item was last accessed.
    pub fn accessed_on(&self) -> Instant {
        self.state.read().accessed_on
    }

    /// Returns how many times the item has been accessed.
    pub fn access_count(&self) -> u64 {
        self.state.read().access_count
    }

    // Lifespan together with the last access timestamp in one lock
    // acquisition; the expiration sweep reads both per item.
    pub(crate) fn timing(&self) -> (Duration, Instant) {
        let state = self.state.read();
        (self.lifespan, state.accessed_on)
    }

    // == Expiration Callbacks ==
    /// Configures a callback invoked right before the item is removed,
    /// replacing any previously registered callbacks.
    pub fn set_about_to_expire_callback(&self, f: impl Fn(&K) + Send + Sync + 'static) {
        self.state.write().about_to_expire.set(Arc::new(f));
    }

    /// Appends a callback invoked right before the item is removed.
    pub fn add_about_to_expire_callback(&self, f: impl Fn(&K) + Send + Sync + 'static) {
        self.state.write().about_to_expire.push(Arc::new(f));
    }

    /// Empties the about-to-expire callback queue.
    pub fn remove_about_to_expire_callbacks(&self) {
        self.state.write().about_to_expire.clear();
    }

    // Fires the about-to-expire callbacks in registration order. The queue
    // is snapshotted first so the callbacks run with no lock held.
    pub(crate) fn run_about_to_expire(&self, key: &K) {
        let callbacks = self.state.read().about_to_expire.snapshot();
        for callback in callbacks {
            callback(key);
        }
    }
}

impl<K: fmt::Debug, V> fmt::Debug for CacheItem<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("CacheItem")
            .field("key", &self.key)
            .field("lifespan", &self.lifespan)
            .field("access_count", &state.access_count)
            .finish()
    }
}
