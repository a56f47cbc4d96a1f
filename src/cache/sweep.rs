//! Expiration Sweep Module
//!
//! Self-adjusting background expiration: a single timer task, always armed
//! for the next-soonest expiry across the table. Sweeps run only when an
//! expiry is actually imminent; there is no fixed-interval polling.

use std::fmt;
use std::hash::Hash;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::cache::table::{CacheTable, TableState};

impl<K, V> CacheTable<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Runs one expiration sweep.
    ///
    /// Cancels the pending timer, deletes every item whose lifespan elapsed
    /// without an access, then rearms for the smallest remaining lifespan
    /// among the survivors, or goes idle when no finite-lifespan item is
    /// left.
    pub(crate) fn expiration_check(&self) {
        loop {
            let now = Instant::now();
            let expired: Vec<K> = {
                let mut state = self.state.write();
                // One outstanding timer at most; this sweep recomputes the
                // schedule from scratch.
                if let Some(task) = state.cleanup_task.take() {
                    task.abort();
                }
                if state.cleanup_interval.is_zero() {
                    debug!("expiration check installed for table {}", self.name());
                } else {
                    debug!(
                        "expiration check triggered after {:?} for table {}",
                        state.cleanup_interval,
                        self.name()
                    );
                }

                state
                    .items
                    .iter()
                    .filter(|(_, item)| {
                        let (lifespan, accessed_on) = item.timing();
                        !lifespan.is_zero()
                            && now.saturating_duration_since(accessed_on) >= lifespan
                    })
                    .map(|(key, _)| key.clone())
                    .collect()
            };

            // Delete through the shared routine so expiry fires the same
            // callbacks as an explicit delete. The table lock is released
            // here; a concurrent delete of the same key is fine.
            for key in &expired {
                let _ = self.delete_internal(key);
            }
            if !expired.is_empty() {
                info!(
                    "expiration sweep removed {} items from table {}",
                    expired.len(),
                    self.name()
                );
            }

            // Rearm from the live map: items may have been added or
            // refreshed while the delete callbacks ran.
            let mut state = self.state.write();
            let now = Instant::now();
            let mut smallest: Option<Duration> = None;
            let mut overdue = false;
            for item in state.items.values() {
                let (lifespan, accessed_on) = item.timing();
                if lifespan.is_zero() {
                    continue;
                }
                let remaining =
                    lifespan.saturating_sub(now.saturating_duration_since(accessed_on));
                if remaining.is_zero() {
                    // Expired while the callbacks ran; rescan.
                    overdue = true;
                    break;
                }
                if smallest.map_or(true, |d| remaining < d) {
                    smallest = Some(remaining);
                }
            }
            if overdue {
                drop(state);
                continue;
            }

            match smallest {
                Some(interval) => self.arm_sweep(&mut state, interval),
                None => {
                    state.cleanup_interval = Duration::ZERO;
                    if let Some(task) = state.cleanup_task.take() {
                        task.abort();
                    }
                }
            }
            return;
        }
    }

    // Arms the sweep timer for `interval` from now, replacing whatever task
    // a concurrent sweep may have armed in the meantime. The sleeping task
    // holds only a weak table handle, so it cannot keep a dropped table
    // alive.
    fn arm_sweep(&self, state: &mut TableState<K, V>, interval: Duration) {
        debug!(
            "next expiration sweep for table {} in {:?}",
            self.name(),
            interval
        );
        state.cleanup_interval = interval;

        let me = self.me.clone();
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(interval).await;
            if let Some(table) = me.upgrade() {
                table.expiration_check();
            }
        });
        if let Some(previous) = state.cleanup_task.replace(task) {
            previous.abort();
        }
    }
}
