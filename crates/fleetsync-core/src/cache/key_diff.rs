// ── Generic key-diff cache ──
//
// Keyed in-memory store with single and batch mutation, full-corpus
// listing and change-diff emission. The whole map is one copy-on-write
// snapshot owned by a `watch` sender: every mutation runs under the
// sender's write lock and is published once, so readers see a batch
// either fully applied or not at all.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tokio::sync::{broadcast, watch};

use super::stream::CacheStream;
use crate::error::CoreError;

const DEFAULT_DIFF_CAPACITY: usize = 256;

/// Key type accepted by [`KeyDiffCache`].
///
/// Writes with a key for which `is_valid_key` returns `false` fail fast
/// with [`CoreError::InvalidKey`].
pub trait CacheKey: Clone + Eq + Hash + fmt::Display + Send + Sync + 'static {
    fn is_valid_key(&self) -> bool {
        !self.to_string().trim().is_empty()
    }
}

impl CacheKey for String {}

// ── Diff records ─────────────────────────────────────────────────────

/// What happened to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    Added,
    Updated,
    Removed,
}

/// One key's change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDiff<K> {
    pub key: K,
    pub kind: DiffKind,
}

/// All diffs produced by one cache call, delivered as one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffBatch<K> {
    pub diffs: Vec<CacheDiff<K>>,
}

impl<K> DiffBatch<K> {
    pub fn len(&self) -> usize {
        self.diffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }
}

// ── Entries and snapshots ────────────────────────────────────────────

/// A cached value and the instant it was last written.
#[derive(Debug)]
pub struct CacheEntry<V> {
    pub value: Arc<V>,
    pub last_touched: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    fn new(value: Arc<V>) -> Self {
        Self {
            value,
            last_touched: Utc::now(),
        }
    }
}

// Manual impl: only the `Arc` is cloned, `V` need not be `Clone`.
impl<V> Clone for CacheEntry<V> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            last_touched: self.last_touched,
        }
    }
}

/// Immutable, insertion-ordered view of the whole cache.
pub type CacheSnapshot<K, V> = Arc<IndexMap<K, CacheEntry<V>>>;

// ── KeyDiffCache ─────────────────────────────────────────────────────

/// Generic keyed cache with batch mutation and diff emission.
///
/// Exactly one owner mutates the map, through the methods below. Reads
/// never block on anything but the in-memory snapshot.
pub struct KeyDiffCache<K: CacheKey, V: Send + Sync + 'static> {
    state: watch::Sender<CacheSnapshot<K, V>>,
    diffs: broadcast::Sender<DiffBatch<K>>,
}

impl<K: CacheKey, V: Send + Sync + 'static> KeyDiffCache<K, V> {
    pub fn new() -> Self {
        Self::with_diff_capacity(DEFAULT_DIFF_CAPACITY)
    }

    /// Create a cache whose diff channel buffers `capacity` notifications
    /// per subscriber before lagging.
    pub fn with_diff_capacity(capacity: usize) -> Self {
        let (state, _) = watch::channel(Arc::new(IndexMap::new()));
        let (diffs, _) = broadcast::channel(capacity.max(1));
        Self { state, diffs }
    }

    // ── Single-key writes ────────────────────────────────────────────

    /// Insert or overwrite one key. Returns the stored value.
    pub fn set_key_value(&self, key: K, value: V, skip_notify: bool) -> Result<Arc<V>, CoreError> {
        ensure_valid(&key)?;
        let value = Arc::new(value);
        let mut kind = DiffKind::Added;

        self.state.send_modify(|snap| {
            let map = Arc::make_mut(snap);
            if map
                .insert(key.clone(), CacheEntry::new(Arc::clone(&value)))
                .is_some()
            {
                kind = DiffKind::Updated;
            }
        });

        if !skip_notify {
            self.emit(vec![CacheDiff { key, kind }]);
        }
        Ok(value)
    }

    /// Atomically read-modify-write one key.
    ///
    /// The closure receives the current value (or `V::default()` when the
    /// key is absent) and runs under the cache's write lock, so two
    /// concurrent updates of the same key can never lose each other.
    pub fn update<F>(&self, key: K, f: F) -> Result<Arc<V>, CoreError>
    where
        V: Clone + Default,
        F: FnOnce(&mut V),
    {
        ensure_valid(&key)?;
        let mut kind = DiffKind::Added;
        let mut stored = Arc::new(V::default());

        self.state.send_modify(|snap| {
            let map = Arc::make_mut(snap);
            let mut value = match map.get(&key) {
                Some(entry) => {
                    kind = DiffKind::Updated;
                    V::clone(&entry.value)
                }
                None => V::default(),
            };
            f(&mut value);
            stored = Arc::new(value);
            map.insert(key.clone(), CacheEntry::new(Arc::clone(&stored)));
        });

        self.emit(vec![CacheDiff { key, kind }]);
        Ok(stored)
    }

    /// Atomically modify an existing key; absent keys are left absent.
    ///
    /// The closure returns whether it changed the value. Nothing is
    /// published or emitted unless it did.
    pub fn modify_existing<F>(&self, key: &K, f: F) -> bool
    where
        V: Clone,
        F: FnOnce(&mut V) -> bool,
    {
        let modified = self.state.send_if_modified(|snap| {
            let Some(entry) = snap.get(key) else {
                return false;
            };
            let mut value = V::clone(&entry.value);
            if !f(&mut value) {
                return false;
            }
            Arc::make_mut(snap).insert(key.clone(), CacheEntry::new(Arc::new(value)));
            true
        });

        if modified {
            self.emit(vec![CacheDiff {
                key: key.clone(),
                kind: DiffKind::Updated,
            }]);
        }
        modified
    }

    /// Return the value for `key`, storing `value` first if the key is absent.
    pub fn get_or_insert(&self, key: K, value: V) -> Result<Arc<V>, CoreError> {
        ensure_valid(&key)?;
        let mut found = Arc::new(value);
        let mut inserted = false;

        self.state.send_if_modified(|snap| {
            if let Some(entry) = snap.get(&key) {
                found = Arc::clone(&entry.value);
                return false;
            }
            Arc::make_mut(snap).insert(key.clone(), CacheEntry::new(Arc::clone(&found)));
            inserted = true;
            true
        });

        if inserted {
            self.emit(vec![CacheDiff {
                key,
                kind: DiffKind::Added,
            }]);
        }
        Ok(found)
    }

    /// Remove one key. Returns whether something was removed; removing an
    /// absent key is a no-op.
    pub fn delete_key_value(&self, key: &K) -> bool {
        let removed = self.state.send_if_modified(|snap| {
            if !snap.contains_key(key) {
                return false;
            }
            Arc::make_mut(snap).shift_remove(key);
            true
        });

        if removed {
            self.emit(vec![CacheDiff {
                key: key.clone(),
                kind: DiffKind::Removed,
            }]);
        }
        removed
    }

    // ── Batch writes ─────────────────────────────────────────────────

    /// Apply all entries as one visible unit.
    ///
    /// Every key is validated before anything is written; one invalid key
    /// rejects the whole batch.
    pub fn set_key_values_batch<I>(&self, entries: I, skip_notify: bool) -> Result<(), CoreError>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let entries: Vec<(K, V)> = entries.into_iter().collect();
        for (key, _) in &entries {
            ensure_valid(key)?;
        }
        if entries.is_empty() {
            return Ok(());
        }

        let mut diffs = Vec::with_capacity(entries.len());
        self.state.send_modify(|snap| {
            let map = Arc::make_mut(snap);
            for (key, value) in entries {
                let kind = if map
                    .insert(key.clone(), CacheEntry::new(Arc::new(value)))
                    .is_some()
                {
                    DiffKind::Updated
                } else {
                    DiffKind::Added
                };
                diffs.push(CacheDiff { key, kind });
            }
        });

        if !skip_notify {
            self.emit(diffs);
        }
        Ok(())
    }

    /// Upsert all entries, then prune every key not among them, as one
    /// visible unit. Used for full-corpus reloads: readers never observe
    /// the cache empty in between.
    pub fn replace_all<I>(&self, entries: I, skip_notify: bool) -> Result<(), CoreError>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let entries: Vec<(K, V)> = entries.into_iter().collect();
        for (key, _) in &entries {
            ensure_valid(key)?;
        }

        let mut diffs = Vec::new();
        self.state.send_modify(|snap| {
            let map = Arc::make_mut(snap);
            let mut incoming = IndexMap::with_capacity(entries.len());
            for (key, value) in entries {
                let kind = if map.contains_key(&key) {
                    DiffKind::Updated
                } else {
                    DiffKind::Added
                };
                diffs.push(CacheDiff {
                    key: key.clone(),
                    kind,
                });
                incoming.insert(key, CacheEntry::new(Arc::new(value)));
            }
            for stale in map.keys().filter(|k| !incoming.contains_key(*k)) {
                diffs.push(CacheDiff {
                    key: stale.clone(),
                    kind: DiffKind::Removed,
                });
            }
            // Existing keys keep their position; new keys follow in input order.
            map.retain(|k, _| incoming.contains_key(k));
            for (key, entry) in incoming {
                map.insert(key, entry);
            }
        });

        if !skip_notify {
            self.emit(diffs);
        }
        Ok(())
    }

    /// Remove many keys as one visible unit. Absent keys are skipped.
    /// Returns how many keys were actually removed.
    pub fn delete_keys_batch<'a, I>(&self, keys: I) -> usize
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        let keys: Vec<&K> = keys.into_iter().collect();
        let mut diffs = Vec::new();

        self.state.send_if_modified(|snap| {
            if !keys.iter().any(|k| snap.contains_key(*k)) {
                return false;
            }
            let map = Arc::make_mut(snap);
            for key in keys {
                if map.shift_remove(key).is_some() {
                    diffs.push(CacheDiff {
                        key: key.clone(),
                        kind: DiffKind::Removed,
                    });
                }
            }
            true
        });

        let removed = diffs.len();
        self.emit(diffs);
        removed
    }

    /// Clear the cache without touching any backing store.
    pub fn purge_all(&self) {
        let mut diffs = Vec::new();
        self.state.send_if_modified(|snap| {
            if snap.is_empty() {
                return false;
            }
            diffs = snap
                .keys()
                .map(|key| CacheDiff {
                    key: key.clone(),
                    kind: DiffKind::Removed,
                })
                .collect();
            *snap = Arc::new(IndexMap::new());
            true
        });
        self.emit(diffs);
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn get_value(&self, key: &K) -> Option<Arc<V>> {
        self.state
            .borrow()
            .get(key)
            .map(|entry| Arc::clone(&entry.value))
    }

    /// All values in insertion order.
    pub fn get_all_values(&self) -> Vec<Arc<V>> {
        self.snapshot()
            .values()
            .map(|entry| Arc::clone(&entry.value))
            .collect()
    }

    pub fn keys(&self) -> Vec<K> {
        self.snapshot().keys().cloned().collect()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.state.borrow().contains_key(key)
    }

    pub fn last_touched(&self, key: &K) -> Option<DateTime<Utc>> {
        self.state.borrow().get(key).map(|entry| entry.last_touched)
    }

    pub fn len(&self) -> usize {
        self.state.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().is_empty()
    }

    /// Current snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> CacheSnapshot<K, V> {
        Arc::clone(&self.state.borrow())
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Subscribe to whole-snapshot changes.
    pub fn subscribe(&self) -> CacheStream<K, V> {
        CacheStream::new(self.state.subscribe())
    }

    /// Subscribe to per-call diff notifications.
    pub fn subscribe_diffs(&self) -> broadcast::Receiver<DiffBatch<K>> {
        self.diffs.subscribe()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn emit(&self, diffs: Vec<CacheDiff<K>>) {
        if diffs.is_empty() {
            return;
        }
        // No subscribers is fine; the diff is simply dropped.
        let _ = self.diffs.send(DiffBatch { diffs });
    }
}

impl<K: CacheKey, V: Send + Sync + 'static> Default for KeyDiffCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

fn ensure_valid<K: CacheKey>(key: &K) -> Result<(), CoreError> {
    if key.is_valid_key() {
        Ok(())
    } else {
        Err(CoreError::InvalidKey {
            key: key.to_string(),
        })
    }
}
