//! Batched Atomic Operation Tests
//!
//! Exercises sub-commit splitting, check short-circuiting and
//! concurrent use against the in-memory store.

use kvtoolbox_core::{
    key, BatchLimits, Error, Key, KeyPart, KvU64, SetOptions, Store, StoreLimits, Value,
};
use kvtoolbox_engine::{
    batched_atomic, blob, BatchState, BatchedAtomicOptions, BlobPayload, BlobSetOptions, CHUNK_SIZE,
};
use kvtoolbox_storage::MemoryStore;
use proptest::prelude::*;
use std::thread;

fn with_max_mutations(max_mutations: usize) -> BatchedAtomicOptions {
    BatchedAtomicOptions {
        limits: BatchLimits {
            max_mutations,
            ..BatchLimits::default()
        },
        batch_size: None,
    }
}

// ============================================================================
// Splitting
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// N sets under a mutation ceiling of M produce ceil(N / M) sub-commits
    #[test]
    fn prop_sub_commit_count(n in 1usize..200, m in 1usize..40) {
        let store = MemoryStore::new();
        let mut op = batched_atomic(&store, with_max_mutations(m));
        for i in 0..n {
            op.set(key!["k", i as i64], i as i64);
        }
        let results = op.commit().unwrap();
        prop_assert_eq!(results.len(), (n + m - 1) / m);
        prop_assert!(results.iter().all(|r| r.ok));
        prop_assert_eq!(store.len(), n);
        prop_assert_eq!(store.stats().commits as usize, results.len());
    }
}

#[test]
fn test_default_ceilings_respect_native_limits() {
    let store = MemoryStore::new();
    let mut op = batched_atomic(&store, BatchedAtomicOptions::default());
    for i in 0..40i64 {
        op.set(key!["bulk", i], Value::Bytes(vec![i as u8; 60_000]));
    }
    let results = op.commit().unwrap();
    assert!(results.len() >= 4);
    assert!(results.iter().all(|r| r.ok));
    assert_eq!(store.len(), 40);
}

#[test]
fn test_default_ceilings_hold_for_small_composite_values() {
    let store = MemoryStore::new();
    let mut op = batched_atomic(&store, BatchedAtomicOptions::default());
    for i in 0..999i64 {
        op.set(key!["v", i], Value::Array(vec![Value::Int(1); 400]));
    }
    let results = op.commit().unwrap();
    assert!(results.len() >= 4);
    assert!(results.iter().all(|r| r.ok));
    assert_eq!(store.len(), 999);
}

#[test]
fn test_default_ceilings_hold_for_objects() {
    let store = MemoryStore::new();
    let mut op = batched_atomic(&store, BatchedAtomicOptions::default());
    for i in 0..999i64 {
        let fields = (0..80)
            .map(|f| (format!("f{}", f), Value::Int(f)))
            .collect();
        op.set(key!["obj", i, 0.5, 2i64], Value::Object(fields));
    }
    let results = op.commit().unwrap();
    assert!(results.len() >= 2);
    assert!(results.iter().all(|r| r.ok));
    assert_eq!(store.len(), 999);
}

#[test]
fn test_default_ceilings_hold_for_numeric_keys() {
    let store = MemoryStore::new();
    let numeric_key = |i: i64| {
        let mut parts = vec![KeyPart::Float(i as f64)];
        parts.extend((0..9).map(|p| KeyPart::Float(p as f64)));
        Key::new(parts)
    };
    for i in 0..10i64 {
        store.set(numeric_key(i), Value::Null, SetOptions::default()).unwrap();
    }

    let mut op = batched_atomic(&store, BatchedAtomicOptions::default());
    for i in 0..999i64 {
        op.delete(numeric_key(i));
    }
    let results = op.commit().unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.ok));
    assert!(store.is_empty());
}

#[test]
fn test_unbatched_native_commit_hits_limit() {
    let store = MemoryStore::with_limits(StoreLimits::with_small_limits());
    let mut native = store.atomic();
    for i in 0..20i64 {
        native.set(key!["n", i], i);
    }
    let err = native.commit().unwrap_err();
    assert!(matches!(err, Error::LimitExceeded { .. }));

    let mut batched = batched_atomic(&store, with_max_mutations(8));
    for i in 0..20i64 {
        batched.set(key!["n", i], i);
    }
    assert_eq!(batched.commit().unwrap().len(), 3);
}

// ============================================================================
// Checks
// ============================================================================

#[test]
fn test_versionstamp_check_detects_concurrent_write() {
    let store = MemoryStore::new();
    store.set(key!["balance"], Value::Int(10), SetOptions::default()).unwrap();
    let seen = store.get(&key!["balance"]).unwrap().versionstamp;

    store.set(key!["balance"], Value::Int(20), SetOptions::default()).unwrap();

    let mut op = batched_atomic(&store, BatchedAtomicOptions::default());
    op.check(key!["balance"], seen).set(key!["balance"], Value::Int(11));
    let results = op.commit().unwrap();
    assert_eq!(results.len(), 1);
    assert!(!results[0].ok);
    assert_eq!(op.state(), BatchState::Aborted);
    assert_eq!(
        store.get(&key!["balance"]).unwrap().value,
        Some(Value::Int(20))
    );
}

#[test]
fn test_check_absent_succeeds_on_missing_key() {
    let store = MemoryStore::new();
    let mut op = batched_atomic(&store, BatchedAtomicOptions::default());
    op.check(key!["new"], None).set(key!["new"], "created");
    let results = op.commit().unwrap();
    assert!(results[0].ok);
    assert!(results[0].versionstamp.is_some());
}

// ============================================================================
// Mixed blob and primitive operations
// ============================================================================

#[test]
fn test_blob_and_sets_share_one_operation() {
    let store = MemoryStore::new();
    let data: Vec<u8> = (0..CHUNK_SIZE * 30).map(|i| (i % 7) as u8).collect();

    let mut op = batched_atomic(&store, BatchedAtomicOptions::default());
    op.set(key!["before"], 1i64)
        .set_blob(key!["big"], data.clone(), BlobSetOptions::default())
        .set(key!["after"], 2i64);
    let results = op.commit().unwrap();

    assert!(results.len() > 1);
    assert!(results.iter().all(|r| r.ok));
    assert_eq!(
        blob::get(&store, &key!["big"], Default::default()).unwrap(),
        Some(data)
    );
    assert!(store.get(&key!["before"]).unwrap().is_present());
    assert!(store.get(&key!["after"]).unwrap().is_present());
}

#[test]
fn test_delete_blob_in_batch() {
    let store = MemoryStore::new();
    blob::set(
        &store,
        &key!["tmp"],
        BlobPayload::Bytes(vec![1; CHUNK_SIZE * 2]),
        BlobSetOptions::default(),
    )
    .unwrap();

    let mut op = batched_atomic(&store, BatchedAtomicOptions::default());
    op.delete_blob(key!["tmp"]).set(key!["marker"], true);
    op.commit().unwrap();

    let keys: Vec<Key> = store.keys();
    assert_eq!(keys, vec![key!["marker"]]);
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_batched_sums() {
    let store = MemoryStore::new();
    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                let mut op = batched_atomic(&store, with_max_mutations(7));
                for _ in 0..50 {
                    op.sum(key!["counter"], 1);
                }
                let results = op.commit().unwrap();
                assert_eq!(results.len(), 8);
            });
        }
    });
    assert_eq!(
        store.get(&key!["counter"]).unwrap().value,
        Some(Value::U64(KvU64(200)))
    );
}

#[test]
fn test_concurrent_checks_single_winner() {
    let store = MemoryStore::new();
    let winners: usize = thread::scope(|scope| {
        let handles: Vec<_> = (0..8i64)
            .map(|i| {
                let store = &store;
                scope.spawn(move || {
                    let mut op = batched_atomic(store, BatchedAtomicOptions::default());
                    op.check(key!["lock"], None).set(key!["lock"], i);
                    op.commit().unwrap()[0].ok
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count()
    });
    assert_eq!(winners, 1);
}
