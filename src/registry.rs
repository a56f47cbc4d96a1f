//! Table Registry Module
//!
//! Hands out cache tables by name, creating them lazily.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::cache::CacheTable;

// == Cache Registry ==
/// A concurrent mapping from table name to lazily created [`CacheTable`].
///
/// The first [`table`](Self::table) call for a given name creates the
/// table; later calls return the same instance. An application wanting
/// process-wide tables keeps a single registry in a `static`.
pub struct CacheRegistry<K, V> {
    tables: RwLock<HashMap<String, Arc<CacheTable<K, V>>>>,
}

impl<K, V> CacheRegistry<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the table registered under `name`, creating it on first use.
    ///
    /// # Panics
    /// Creating a table captures the current Tokio runtime, so the first
    /// call for any given name must happen inside one.
    pub fn table(&self, name: &str) -> Arc<CacheTable<K, V>> {
        if let Some(table) = self.tables.read().get(name) {
            return Arc::clone(table);
        }

        let mut tables = self.tables.write();
        // Re-check: another caller may have created the table while the
        // write lock was contended.
        match tables.get(name) {
            Some(table) => Arc::clone(table),
            None => {
                debug!("creating cache table {}", name);
                let table = CacheTable::new(name);
                tables.insert(name.to_string(), Arc::clone(&table));
                table
            }
        }
    }
}

impl<K, V> Default for CacheRegistry<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
