// ── Per-key async locks ──
//
// Serializes write-throughs that suspend between the backing-store call
// and the cache mirror. Unrelated keys never wait on each other.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub(crate) struct KeyedLocks<K: Eq + Hash> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub(crate) fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Acquire the lock for `key`, waiting for any in-flight holder.
    pub(crate) async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the shard guard is released before awaiting.
        let lock = Arc::clone(self.locks.entry(key.clone()).or_default().value());
        lock.lock_owned().await
    }

    /// Drop the lock slot for a key that no longer exists.
    ///
    /// A slot still held or awaited elsewhere is kept, so a later caller
    /// queues behind those tasks instead of getting a fresh mutex.
    pub(crate) fn forget(&self, key: &K) {
        self.locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}
