// ── Key-diff cache engine ──
//
// Generic keyed storage with batch mutation, snapshot subscriptions and
// push-based change diffs. No knowledge of printer semantics.

mod key_diff;
mod keyed_lock;
mod stream;

pub use key_diff::{
    CacheDiff, CacheEntry, CacheKey, CacheSnapshot, DiffBatch, DiffKind, KeyDiffCache,
};
pub(crate) use keyed_lock::KeyedLocks;
pub use stream::{CacheStream, CacheWatchStream};
