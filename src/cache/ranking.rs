//! Access Ranking Module
//!
//! Reports the most frequently accessed items of a table.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use crate::cache::item::CacheItem;
use crate::cache::table::CacheTable;

// == Access Pair ==
/// A key together with its access count, snapshotted for ranking.
#[derive(Debug, Clone)]
pub struct AccessPair<K> {
    /// The item's cache key
    pub key: K,
    /// The item's access count at snapshot time
    pub access_count: u64,
}

impl<K, V> CacheTable<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    // == Most Accessed ==
    /// Returns up to `count` items, most accessed first.
    ///
    /// The (key, access count) pairs are snapshotted and sorted descending;
    /// ties are returned in unspecified order. Asking for more items than
    /// the table holds returns them all.
    pub fn most_accessed(&self, count: usize) -> Vec<Arc<CacheItem<K, V>>> {
        let state = self.state.read();

        let mut pairs: Vec<AccessPair<K>> = state
            .items
            .iter()
            .map(|(key, item)| AccessPair {
                key: key.clone(),
                access_count: item.access_count(),
            })
            .collect();
        pairs.sort_unstable_by(|a, b| b.access_count.cmp(&a.access_count));

        // Look the winners up again from the live map; a key that vanished
        // in between is skipped.
        pairs
            .iter()
            .take(count)
            .filter_map(|pair| state.items.get(&pair.key).cloned())
            .collect()
    }
}
