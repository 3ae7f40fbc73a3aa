// ── Reactive cache streams ──
//
// Subscription types for consuming snapshot changes from a KeyDiffCache.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use super::key_diff::{CacheKey, CacheSnapshot};

/// A subscription to a whole cache.
///
/// Provides both point-in-time snapshot access and reactive change
/// notification via [`changed()`](Self::changed) or by converting to a
/// `Stream`.
pub struct CacheStream<K: CacheKey, V: Send + Sync + 'static> {
    current: CacheSnapshot<K, V>,
    receiver: watch::Receiver<CacheSnapshot<K, V>>,
}

impl<K: CacheKey, V: Send + Sync + 'static> CacheStream<K, V> {
    pub(crate) fn new(receiver: watch::Receiver<CacheSnapshot<K, V>>) -> Self {
        let current = Arc::clone(&receiver.borrow());
        Self { current, receiver }
    }

    /// Snapshot captured at creation time or at the last `changed()`.
    pub fn current(&self) -> &CacheSnapshot<K, V> {
        &self.current
    }

    /// Latest snapshot (may have changed since creation).
    pub fn latest(&self) -> CacheSnapshot<K, V> {
        Arc::clone(&self.receiver.borrow())
    }

    /// Whether the cache was mutated since the last observed snapshot.
    pub fn has_changed(&self) -> bool {
        self.receiver.has_changed().unwrap_or(false)
    }

    /// Values of the current snapshot, in insertion order.
    pub fn values(&self) -> Vec<Arc<V>> {
        self.current
            .values()
            .map(|entry| Arc::clone(&entry.value))
            .collect()
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` if the owning cache has been dropped.
    pub async fn changed(&mut self) -> Option<CacheSnapshot<K, V>> {
        self.receiver.changed().await.ok()?;
        let snap = Arc::clone(&self.receiver.borrow_and_update());
        self.current = Arc::clone(&snap);
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> CacheWatchStream<K, V> {
        CacheWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
///
/// Yields the current snapshot first, then a new one each time the
/// underlying cache is mutated.
pub struct CacheWatchStream<K: CacheKey, V: Send + Sync + 'static> {
    inner: WatchStream<CacheSnapshot<K, V>>,
}

impl<K: CacheKey, V: Send + Sync + 'static> Stream for CacheWatchStream<K, V> {
    type Item = CacheSnapshot<K, V>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
