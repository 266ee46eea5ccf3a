use crate::{
    cache::{CacheStats, Entry, ModelCache},
    key::{Key, Termination, encode_components, primary_key},
    model::{Model, SizedModel},
    sync::DefaultLocking,
    value::Value,
};
use serde::{Deserialize, Serialize};
use std::{
    cell::Cell,
    sync::Arc,
};

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
struct Note {
    id: i64,
    body: String,
}

impl Model for Note {
    const TYPE_NAME: &'static str = "Note";

    fn id(&self) -> Vec<Value> {
        vec![Value::from(self.id)]
    }
}

fn note(id: i64, body: &str) -> Note {
    Note {
        id,
        body: body.to_string(),
    }
}

fn key(id: i64) -> Key<Note> {
    let id = encode_components(&[Value::from(id)], Termination::Closed);
    Key::from_raw(primary_key(1, &id))
}

fn cache(max_size: usize) -> ModelCache<DefaultLocking> {
    ModelCache::new(max_size)
}

fn present(id: i64, body: &str, size: usize) -> Entry<Note> {
    Entry::Present {
        model: Arc::new(note(id, body)),
        size,
    }
}

#[test]
fn unknown_key_is_absent() {
    let cache = cache(100);

    assert_eq!(cache.get_entry(&key(1)), Entry::Absent);
    assert_eq!(cache.get(&key(1)), None);
    assert!(cache.is_empty());
}

#[test]
fn put_then_lookup_returns_the_record() {
    let cache = cache(100);
    cache.put(&key(1), note(1, "a"), 10);

    assert_eq!(cache.get_entry(&key(1)), present(1, "a", 10));
    assert_eq!(cache.get(&key(1)).as_deref(), Some(&note(1, "a")));
    assert_eq!(cache.size(), 10);
}

#[test]
fn overwrite_replaces_size() {
    let cache = cache(100);
    cache.put(&key(1), note(1, "a"), 10);
    cache.put_sized(&key(1), SizedModel::new(note(1, "b"), 4));

    assert_eq!(cache.size(), 4);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get_entry(&key(1)), present(1, "b", 4));
}

#[test]
fn delete_installs_negative_entry_and_returns_previous() {
    let cache = cache(100);
    cache.put(&key(1), note(1, "a"), 10);

    assert_eq!(cache.delete(&key(1)), present(1, "a", 10));
    assert_eq!(cache.get_entry(&key(1)), Entry::Deleted);
    assert_eq!(cache.size(), 0);
    assert_eq!(cache.delete(&key(2)), Entry::Absent);
}

#[test]
fn evict_marks_without_claiming_store_state() {
    let cache = cache(100);
    cache.put(&key(1), note(1, "a"), 10);

    assert_eq!(cache.evict(&key(1)), present(1, "a", 10));
    assert_eq!(cache.get_entry(&key(1)), Entry::Evicted);
    assert_eq!(cache.size(), 0);
}

#[test]
fn clear_empties_everything() {
    let cache = cache(100);
    cache.put(&key(1), note(1, "a"), 10);
    cache.delete(&key(2));

    cache.clear();

    assert!(cache.is_empty());
    assert_eq!(cache.size(), 0);
    assert_eq!(cache.get_entry(&key(1)), Entry::Absent);
}

#[test]
fn retrieve_loads_once_then_hits() {
    let cache = cache(100);
    let calls = Cell::new(0);
    let load = || {
        calls.set(calls.get() + 1);
        Ok::<_, ()>(Some(SizedModel::new(note(1, "a"), 3)))
    };

    let first = cache.get_or_retrieve(&key(1), load).unwrap();
    let second = cache.get_or_retrieve(&key(1), load).unwrap();

    assert_eq!(calls.get(), 1);
    assert_eq!(first, second);
    assert_eq!(
        cache.stats(),
        CacheStats {
            hits: 1,
            misses: 1,
            loads: 1,
            evictions: 0,
        }
    );
}

#[test]
fn retrieve_trusts_deleted_entries() {
    let cache = cache(100);
    cache.delete(&key(1));

    let entry = cache
        .get_or_retrieve_entry(&key(1), || -> Result<_, ()> {
            panic!("deleted entries must not reload")
        })
        .unwrap();

    assert_eq!(entry, Entry::Deleted);
}

#[test]
fn retrieve_reloads_evicted_entries() {
    let cache = cache(100);
    cache.put(&key(1), note(1, "old"), 3);
    cache.evict(&key(1));

    let model = cache
        .get_or_retrieve(&key(1), || Ok::<_, ()>(Some(SizedModel::new(note(1, "new"), 3))))
        .unwrap();

    assert_eq!(model.as_deref(), Some(&note(1, "new")));
    assert_eq!(cache.get_entry(&key(1)), present(1, "new", 3));
}

#[test]
fn loader_miss_leaves_key_absent() {
    let cache = cache(100);

    let entry = cache
        .get_or_retrieve_entry(&key(1), || Ok::<Option<SizedModel<Note>>, ()>(None))
        .unwrap();

    assert_eq!(entry, Entry::Absent);
    assert_eq!(cache.get_entry(&key(1)), Entry::Absent);
    assert!(cache.is_empty());
}

#[test]
fn loader_miss_drops_an_eviction_marker() {
    let cache = cache(100);
    cache.put(&key(1), note(1, "old"), 3);
    cache.evict(&key(1));

    let entry = cache
        .get_or_retrieve_entry(&key(1), || Ok::<Option<SizedModel<Note>>, ()>(None))
        .unwrap();

    assert_eq!(entry, Entry::Absent);
    assert_eq!(cache.get_entry(&key(1)), Entry::Absent);
    assert!(cache.is_empty());
}

#[test]
fn delete_during_load_wins() {
    let cache = cache(100);

    let entry = cache
        .get_or_retrieve_entry(&key(5), || {
            cache.delete(&key(5));
            Ok::<_, ()>(Some(SizedModel::new(note(5, "old"), 3)))
        })
        .unwrap();

    assert_eq!(entry, Entry::Deleted);
    assert_eq!(cache.get_entry(&key(5)), Entry::Deleted);
    assert_eq!(cache.size(), 0);
}

#[test]
fn put_during_load_wins() {
    let cache = cache(100);

    let model = cache
        .get_or_retrieve(&key(5), || {
            cache.put(&key(5), note(5, "new"), 4);
            Ok::<_, ()>(Some(SizedModel::new(note(5, "old"), 3)))
        })
        .unwrap();

    assert_eq!(model.as_deref(), Some(&note(5, "new")));
    assert_eq!(cache.get_entry(&key(5)), present(5, "new", 4));
    assert_eq!(cache.size(), 4);
}

#[test]
fn clear_during_load_leaves_the_record_uncached() {
    let cache = cache(100);
    cache.put(&key(1), note(1, "a"), 1);

    let model = cache
        .get_or_retrieve(&key(5), || {
            cache.clear();
            Ok::<_, ()>(Some(SizedModel::new(note(5, "old"), 3)))
        })
        .unwrap();

    assert_eq!(model.as_deref(), Some(&note(5, "old")));
    assert!(cache.is_empty());

    // The next miss loads and caches as usual.
    cache
        .get_or_retrieve(&key(5), || Ok::<_, ()>(Some(SizedModel::new(note(5, "old"), 3))))
        .unwrap();
    assert_eq!(cache.get_entry(&key(5)), present(5, "old", 3));
}

#[test]
fn loader_error_propagates_and_changes_nothing() {
    let cache = cache(100);
    cache.put(&key(2), note(2, "b"), 5);

    let err = cache
        .get_or_retrieve(&key(1), || Err::<Option<SizedModel<Note>>, _>("disk on fire"))
        .unwrap_err();

    assert_eq!(err, "disk on fire");
    assert_eq!(cache.get_entry(&key(1)), Entry::Absent);
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.size(), 5);

    // A later load for the same key still runs.
    let model = cache
        .get_or_retrieve(&key(1), || Ok::<_, &str>(Some(SizedModel::new(note(1, "a"), 1))))
        .unwrap();
    assert!(model.is_some());
}

#[test]
fn batch_applies_only_on_success() {
    let cache = cache(100);
    cache.put(&key(1), note(1, "a"), 10);

    let failed: Result<(), &str> = cache.batch(|tx| {
        tx.put(&key(2), note(2, "b"), 10);
        tx.delete(&key(1));
        Err("abort")
    });
    assert_eq!(failed, Err("abort"));
    assert_eq!(
        cache.get_entries(&[key(1), key(2)]),
        vec![present(1, "a", 10), Entry::Absent]
    );

    let applied = cache.batch(|tx| {
        tx.put(&key(2), note(2, "b"), 10).delete(&key(1)).evict(&key(3));
        Ok::<_, ()>(tx.len())
    });
    assert_eq!(applied, Ok(3));
    assert_eq!(
        cache.get_entries(&[key(1), key(2), key(3)]),
        vec![Entry::Deleted, present(2, "b", 10), Entry::Evicted]
    );
    assert_eq!(cache.size(), 10);
}

#[test]
fn batch_clear_runs_in_sequence() {
    let cache = cache(100);
    cache.put(&key(1), note(1, "a"), 10);

    cache
        .batch(|tx| {
            tx.put(&key(2), note(2, "b"), 1).clear().put(&key(3), note(3, "c"), 2);
            Ok::<_, ()>(())
        })
        .unwrap();

    assert_eq!(
        cache.get_entries(&[key(1), key(2), key(3)]),
        vec![Entry::Absent, Entry::Absent, present(3, "c", 2)]
    );
    assert_eq!(cache.size(), 2);
}

#[test]
fn capacity_evicts_least_recent_but_never_the_new_entry() {
    let cache = cache(20);
    cache.put(&key(1), note(1, "a"), 10);
    cache.put(&key(2), note(2, "b"), 10);

    // Touch 1 so 2 is the coldest.
    cache
        .get_or_retrieve(&key(1), || -> Result<_, ()> { unreachable!("cached") })
        .unwrap();
    cache.put(&key(3), note(3, "c"), 10);

    assert_eq!(
        cache.get_entries(&[key(1), key(2), key(3)]),
        vec![present(1, "a", 10), Entry::Evicted, present(3, "c", 10)]
    );
    assert_eq!(cache.size(), 20);
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn oversized_entry_stays_alone() {
    let cache = cache(20);
    cache.put(&key(1), note(1, "a"), 10);
    cache.put(&key(2), note(2, "huge"), 50);

    assert_eq!(cache.get_entry(&key(1)), Entry::Evicted);
    assert_eq!(cache.get_entry(&key(2)), present(2, "huge", 50));
    assert_eq!(cache.size(), 50);
}

#[test]
fn get_entry_does_not_refresh_recency() {
    let cache = cache(20);
    cache.put(&key(1), note(1, "a"), 10);
    cache.put(&key(2), note(2, "b"), 10);

    assert!(cache.get_entry(&key(1)).is_present());
    cache.put(&key(3), note(3, "c"), 10);

    assert_eq!(cache.get_entry(&key(1)), Entry::Evicted);
    assert!(cache.get_entry(&key(2)).is_present());
}

#[test]
fn eviction_markers_are_dropped_first_on_next_overflow() {
    let cache = cache(20);
    cache.put(&key(1), note(1, "a"), 10);
    cache.put(&key(2), note(2, "b"), 10);
    cache.put(&key(3), note(3, "c"), 10);
    assert_eq!(cache.get_entry(&key(1)), Entry::Evicted);

    cache.put(&key(4), note(4, "d"), 10);

    assert_eq!(
        cache.get_entries(&[key(1), key(2), key(3), key(4)]),
        vec![
            Entry::Absent,
            Entry::Evicted,
            present(3, "c", 10),
            present(4, "d", 10)
        ]
    );
}

#[cfg(not(feature = "phony-lock"))]
#[test]
fn concurrent_misses_load_once() {
    use std::{
        sync::{
            Barrier,
            atomic::{AtomicUsize, Ordering},
        },
        thread,
        time::Duration,
    };

    const THREADS: usize = 8;

    let cache = Arc::new(cache(1_000));
    let loads = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let loads = Arc::clone(&loads);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                cache
                    .get_or_retrieve(&key(7), || {
                        loads.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(20));
                        Ok::<_, ()>(Some(SizedModel::new(note(7, "shared"), 1)))
                    })
                    .unwrap()
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().expect("reader thread should not panic"))
        .collect();

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    let first = results[0].clone().expect("loaded");
    assert!(
        results
            .iter()
            .all(|model| model.as_ref().is_some_and(|m| Arc::ptr_eq(m, &first)))
    );

    let stats = cache.stats();
    assert_eq!(stats.loads, 1);
    assert_eq!(stats.hits + stats.misses, THREADS as u64);
}

#[cfg(not(feature = "phony-lock"))]
#[test]
fn distinct_keys_load_independently() {
    use std::thread;

    let cache = Arc::new(cache(1_000));

    let handles: Vec<_> = (0..4)
        .map(|id| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                cache
                    .get_or_retrieve(&key(id), || {
                        Ok::<_, ()>(Some(SizedModel::new(note(id, "n"), 1)))
                    })
                    .unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().expect("loader thread").is_some());
    }

    assert_eq!(cache.len(), 4);
    assert_eq!(cache.stats().loads, 4);
}

#[test]
fn markers_are_bounded_by_count() {
    let cache = ModelCache::<DefaultLocking>::with_max_markers(100, 64);

    for id in 0..10_000 {
        cache.put(&key(id), note(id, "n"), 1);
        cache.delete(&key(id));
    }

    assert!(cache.len() <= 64, "kept {} markers", cache.len());
    assert_eq!(cache.size(), 0);
    assert_eq!(cache.get_entry(&key(9_999)), Entry::Deleted);
}

#[test]
fn marker_trimming_keeps_records() {
    let cache = ModelCache::<DefaultLocking>::with_max_markers(1_000, 4);
    cache.put(&key(0), note(0, "kept"), 10);

    for id in 1..=5 {
        cache.put(&key(id), note(id, "n"), 1);
        cache.evict(&key(id));
    }

    // Eviction markers are demoted, so the newest is the coldest. The fifth
    // crosses the bound; it stays and the next three coldest go.
    assert_eq!(
        cache.get_entries(&[key(0), key(1), key(2), key(3), key(4), key(5)]),
        vec![
            present(0, "kept", 10),
            Entry::Evicted,
            Entry::Absent,
            Entry::Absent,
            Entry::Absent,
            Entry::Evicted
        ]
    );
    assert_eq!(cache.size(), 10);
}

#[test]
fn cold_deleted_markers_go_first_on_overflow() {
    let cache = cache(20);
    cache.delete(&key(1));
    cache.put(&key(2), note(2, "b"), 10);
    cache.put(&key(3), note(3, "c"), 10);

    cache.put(&key(4), note(4, "d"), 10);

    assert_eq!(
        cache.get_entries(&[key(1), key(2), key(3), key(4)]),
        vec![
            Entry::Absent,
            Entry::Evicted,
            present(3, "c", 10),
            present(4, "d", 10)
        ]
    );
}

#[cfg(not(feature = "phony-lock"))]
#[test]
fn readers_never_see_half_a_batch() {
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        thread,
    };

    const READERS: usize = 4;
    const ROUNDS: usize = 500;

    let cache = cache(1_000);
    let finished = AtomicBool::new(false);

    thread::scope(|scope| {
        let readers: Vec<_> = (0..READERS)
            .map(|_| {
                scope.spawn(|| {
                    let mut checks = 0usize;
                    while !finished.load(Ordering::Acquire) {
                        match cache.get_entries(&[key(1), key(2)]).as_slice() {
                            [Entry::Absent, Entry::Absent] => {}
                            [
                                Entry::Present { model: first, .. },
                                Entry::Present { model: second, .. },
                            ] => assert_eq!(first.body, second.body, "torn batch"),
                            other => panic!("torn batch: {other:?}"),
                        }
                        checks += 1;
                    }
                    checks
                })
            })
            .collect();

        for round in 0..ROUNDS {
            let body = round.to_string();
            cache
                .batch(|tx| {
                    tx.put(&key(1), note(1, &body), 1).put(&key(2), note(2, &body), 1);
                    Ok::<_, ()>(())
                })
                .unwrap();
        }
        finished.store(true, Ordering::Release);

        for reader in readers {
            reader.join().expect("reader thread should not panic");
        }
    });

    assert_eq!(
        cache.get_entries(&[key(1), key(2)]),
        vec![present(1, "499", 1), present(2, "499", 1)]
    );
}

#[cfg(not(feature = "phony-lock"))]
#[test]
fn delete_from_another_thread_during_load_wins() {
    use std::thread;

    let cache = cache(100);

    let model = cache
        .get_or_retrieve(&key(5), || {
            thread::scope(|scope| {
                scope.spawn(|| cache.delete(&key(5)));
            });
            Ok::<_, ()>(Some(SizedModel::new(note(5, "old"), 3)))
        })
        .unwrap();

    assert_eq!(model, None);
    assert_eq!(cache.get_entry(&key(5)), Entry::Deleted);
}
