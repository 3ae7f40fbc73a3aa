#![allow(clippy::unwrap_used)]

// Reader-visible behavior of the cache engine under concurrency.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use fleetsync_core::{DiffKind, KeyDiffCache};
use futures_util::StreamExt;

const BATCH: usize = 200;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_see_a_partial_batch() {
    let cache: Arc<KeyDiffCache<String, usize>> = Arc::new(KeyDiffCache::new());
    let done = Arc::new(AtomicBool::new(false));

    let mut readers = Vec::new();
    for _ in 0..3 {
        let cache = Arc::clone(&cache);
        let done = Arc::clone(&done);
        readers.push(tokio::task::spawn_blocking(move || {
            let mut observed = Vec::new();
            while !done.load(Ordering::Acquire) {
                observed.push(cache.get_all_values().len());
            }
            observed
        }));
    }

    for round in 0..20 {
        cache
            .set_key_values_batch((0..BATCH).map(|i| (format!("k{i}"), round)), false)
            .unwrap();
        let keys: Vec<String> = cache.keys();
        cache.delete_keys_batch(&keys);
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        for len in reader.await.unwrap() {
            assert!(len == 0 || len == BATCH, "observed partial batch of {len}");
        }
    }
}

#[tokio::test]
async fn batch_then_list_yields_exactly_the_batch() {
    let cache: KeyDiffCache<String, u32> = KeyDiffCache::new();
    cache.set_key_value("stale".into(), 0, false).unwrap();

    cache
        .replace_all(vec![("a".into(), 1), ("b".into(), 2)], false)
        .unwrap();

    let mut values: Vec<u32> = cache.get_all_values().iter().map(|v| **v).collect();
    values.sort_unstable();
    assert_eq!(values, vec![1, 2]);
}

#[tokio::test]
async fn snapshot_stream_follows_mutations() {
    let cache: KeyDiffCache<String, u32> = KeyDiffCache::new();
    let mut stream = cache.subscribe().into_stream();

    // First item is the snapshot at subscription time.
    assert!(stream.next().await.unwrap().is_empty());

    cache.set_key_value("a".into(), 1, true).unwrap();
    let snap = stream.next().await.unwrap();
    assert_eq!(snap.len(), 1);
}

#[tokio::test]
async fn diffs_report_each_kind() {
    let cache: KeyDiffCache<String, u32> = KeyDiffCache::new();
    let mut rx = cache.subscribe_diffs();

    cache.set_key_value("a".into(), 1, false).unwrap();
    cache.set_key_value("a".into(), 2, false).unwrap();
    cache.delete_key_value(&"a".into());

    let kinds: Vec<DiffKind> = (0..3)
        .map(|_| rx.try_recv().unwrap().diffs[0].kind)
        .collect();
    assert_eq!(
        kinds,
        vec![DiffKind::Added, DiffKind::Updated, DiffKind::Removed]
    );
}
