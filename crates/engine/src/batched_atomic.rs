//! Batched atomic operations
//!
//! `BatchedAtomicOperation` accepts an unbounded sequence of checks,
//! mutations, enqueues and blob operations, then commits them as the
//! fewest native commits that each stay within `BatchLimits`.
//!
//! # Commit algorithm
//!
//! The queued operations form a work list consumed from the front:
//! - blob operations are expanded in place: the store is read for the
//!   existing chunk count and the resulting primitive mutations are pushed
//!   back onto the front of the list, preserving order
//! - every primitive operation has a budget delta. If folding it into the
//!   current native batch would exceed any ceiling and the batch is not
//!   empty, the batch is committed first and a fresh one started.
//! - a sub-commit whose checks fail stops the whole operation. Already
//!   committed sub-commits are not rolled back.
//!
//! Atomicity holds per sub-commit only. A single primitive larger than the
//! ceilings still goes out alone and the store decides whether to accept it.

use std::collections::VecDeque;

use kvtoolbox_core::{
    AtomicBuilder, AtomicCheck, BatchLimits, CommitResult, Enqueue, EnqueueOptions, Error, Key,
    Mutation, Result, SetOptions, Store, Value, Versionstamp,
};
use tracing::{debug, info, warn};

use crate::blob::{self, BlobPayload, BlobSetOptions};
use crate::crypto::Encryptor;
use crate::estimate::{estimate_key_size, estimate_size};

// ============================================================================
// Options and state
// ============================================================================

/// Configuration for a batched atomic operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchedAtomicOptions {
    /// Per-sub-commit ceilings
    pub limits: BatchLimits,
    /// Page size when listing existing blob chunks
    pub batch_size: Option<usize>,
}

/// Lifecycle of a batched atomic operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Accepting operations
    Building,
    /// `commit` is running
    Committing,
    /// Every sub-commit succeeded
    Done,
    /// A check failed or a sub-commit errored
    Aborted,
}

// ============================================================================
// Logical operations
// ============================================================================

/// One queued operation
#[derive(Debug)]
pub enum Operation {
    /// Versionstamp check on a key
    Check(AtomicCheck),
    /// Versionstamp check on a blob's metadata entry
    CheckBlob(AtomicCheck),
    /// Set, delete, sum, min or max
    Mutate(Mutation),
    /// Queue a message
    Enqueue(Enqueue),
    /// Write a blob, expanded at commit time
    SetBlob {
        /// Blob key
        key: Key,
        /// Payload
        payload: BlobPayload,
        /// Write options
        options: BlobSetOptions,
    },
    /// Delete a blob, expanded at commit time
    DeleteBlob {
        /// Blob key
        key: Key,
    },
}

/// An operation that maps directly onto a native commit
#[derive(Debug)]
enum Primitive {
    Check(AtomicCheck),
    Mutate(Mutation),
    Enqueue(Enqueue),
}

impl Primitive {
    fn apply<S: Store>(self, builder: &mut AtomicBuilder<'_, S>) {
        match self {
            Primitive::Check(check) => {
                builder.check(check);
            }
            Primitive::Mutate(mutation) => {
                builder.mutate(mutation);
            }
            Primitive::Enqueue(enqueue) => {
                builder.enqueue(enqueue.value, enqueue.options);
            }
        }
    }
}

// ============================================================================
// Budget
// ============================================================================

/// Running totals for the native batch being built
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchAccumulator {
    /// Checks in the batch
    pub checks: usize,
    /// Mutations and enqueues in the batch
    pub mutations: usize,
    /// Estimated payload bytes
    pub bytes: usize,
    /// Estimated key bytes
    pub key_bytes: usize,
}

impl BatchAccumulator {
    /// Budget consumed by one primitive operation
    fn delta(op: &Primitive) -> BatchAccumulator {
        match op {
            Primitive::Check(check) => BatchAccumulator {
                checks: 1,
                key_bytes: estimate_key_size(&check.key),
                ..BatchAccumulator::default()
            },
            Primitive::Mutate(mutation) => {
                let key_size = estimate_key_size(&mutation.key);
                let bytes = match mutation.kind.operand() {
                    Some(value) => key_size + estimate_size(&value),
                    None => key_size,
                };
                BatchAccumulator {
                    mutations: 1,
                    bytes,
                    key_bytes: key_size,
                    ..BatchAccumulator::default()
                }
            }
            Primitive::Enqueue(enqueue) => {
                let undelivered: usize = enqueue
                    .options
                    .keys_if_undelivered
                    .iter()
                    .map(estimate_key_size)
                    .sum();
                BatchAccumulator {
                    mutations: 1,
                    bytes: estimate_size(&enqueue.value) + undelivered,
                    key_bytes: undelivered,
                    ..BatchAccumulator::default()
                }
            }
        }
    }

    /// Whether adding `delta` would exceed any ceiling
    pub fn would_exceed(&self, delta: &BatchAccumulator, limits: &BatchLimits) -> bool {
        self.checks + delta.checks > limits.max_checks
            || self.mutations + delta.mutations > limits.max_mutations
            || self.bytes + delta.bytes > limits.max_bytes
            || self.key_bytes + delta.key_bytes > limits.max_key_bytes
    }

    /// Fold `delta` into the totals
    pub fn add(&mut self, delta: &BatchAccumulator) {
        self.checks += delta.checks;
        self.mutations += delta.mutations;
        self.bytes += delta.bytes;
        self.key_bytes += delta.key_bytes;
    }

    /// Whether nothing has been folded in
    pub fn is_empty(&self) -> bool {
        *self == BatchAccumulator::default()
    }
}

// ============================================================================
// BatchedAtomicOperation
// ============================================================================

/// Start a batched atomic operation on `store`
pub fn batched_atomic<S: Store>(
    store: &S,
    options: BatchedAtomicOptions,
) -> BatchedAtomicOperation<'_, S> {
    BatchedAtomicOperation::new(store, options)
}

/// A chainable atomic operation that commits in size-bounded batches
///
/// # Example
///
/// ```
/// use kvtoolbox_core::key;
/// use kvtoolbox_engine::{batched_atomic, BatchedAtomicOptions};
/// use kvtoolbox_storage::MemoryStore;
///
/// let store = MemoryStore::new();
/// let mut op = batched_atomic(&store, BatchedAtomicOptions::default());
/// op.set(key!["a"], "1").sum(key!["hits"], 1);
/// let results = op.commit().unwrap();
/// assert_eq!(results.len(), 1);
/// assert!(results[0].ok);
/// ```
pub struct BatchedAtomicOperation<'s, S: Store> {
    store: &'s S,
    options: BatchedAtomicOptions,
    encryptor: Option<&'s dyn Encryptor>,
    queue: VecDeque<Operation>,
    state: BatchState,
}

impl<'s, S: Store> BatchedAtomicOperation<'s, S> {
    /// Create an empty operation
    pub fn new(store: &'s S, options: BatchedAtomicOptions) -> Self {
        BatchedAtomicOperation {
            store,
            options,
            encryptor: None,
            queue: VecDeque::new(),
            state: BatchState::Building,
        }
    }

    /// Encrypt every blob written by this operation
    pub fn with_encryptor(mut self, encryptor: &'s dyn Encryptor) -> Self {
        self.encryptor = Some(encryptor);
        self
    }

    /// Current lifecycle state
    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Number of queued logical operations
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queue a raw logical operation
    pub fn push(&mut self, operation: Operation) -> &mut Self {
        self.queue.push_back(operation);
        self
    }

    /// Require `key` to be at `versionstamp` (`None`: absent)
    pub fn check(&mut self, key: Key, versionstamp: Option<Versionstamp>) -> &mut Self {
        self.push(Operation::Check(AtomicCheck::new(key, versionstamp)))
    }

    /// Queue several checks
    pub fn checks(&mut self, checks: impl IntoIterator<Item = AtomicCheck>) -> &mut Self {
        self.queue.extend(checks.into_iter().map(Operation::Check));
        self
    }

    /// Queue one mutation
    pub fn mutate(&mut self, mutation: Mutation) -> &mut Self {
        self.push(Operation::Mutate(mutation))
    }

    /// Queue several mutations
    pub fn mutations(&mut self, mutations: impl IntoIterator<Item = Mutation>) -> &mut Self {
        self.queue.extend(mutations.into_iter().map(Operation::Mutate));
        self
    }

    /// Set `key` to `value`
    pub fn set(&mut self, key: Key, value: impl Into<Value>) -> &mut Self {
        self.mutate(Mutation::set(key, value))
    }

    /// Set `key` to `value`, expiring after `expire_in`
    pub fn set_with_options(
        &mut self,
        key: Key,
        value: impl Into<Value>,
        options: SetOptions,
    ) -> &mut Self {
        self.mutate(Mutation::set(key, value).with_expire_in(options.expire_in))
    }

    /// Delete `key`
    pub fn delete(&mut self, key: Key) -> &mut Self {
        self.mutate(Mutation::delete(key))
    }

    /// Add `n` to the KvU64 at `key`, wrapping
    pub fn sum(&mut self, key: Key, n: u64) -> &mut Self {
        self.mutate(Mutation::sum(key, n))
    }

    /// Keep the smaller of `n` and the KvU64 at `key`
    pub fn min(&mut self, key: Key, n: u64) -> &mut Self {
        self.mutate(Mutation::min(key, n))
    }

    /// Keep the larger of `n` and the KvU64 at `key`
    pub fn max(&mut self, key: Key, n: u64) -> &mut Self {
        self.mutate(Mutation::max(key, n))
    }

    /// Queue a message
    pub fn enqueue(&mut self, value: impl Into<Value>, options: EnqueueOptions) -> &mut Self {
        self.push(Operation::Enqueue(Enqueue {
            value: value.into(),
            options,
        }))
    }

    /// Write a blob at `key`
    pub fn set_blob(
        &mut self,
        key: Key,
        payload: impl Into<BlobPayload>,
        options: BlobSetOptions,
    ) -> &mut Self {
        self.push(Operation::SetBlob {
            key,
            payload: payload.into(),
            options,
        })
    }

    /// Delete the blob at `key`
    pub fn delete_blob(&mut self, key: Key) -> &mut Self {
        self.push(Operation::DeleteBlob { key })
    }

    /// Require the blob at `key` to be at `versionstamp`
    ///
    /// The check targets the blob's metadata entry.
    pub fn check_blob(&mut self, key: Key, versionstamp: Option<Versionstamp>) -> &mut Self {
        self.push(Operation::CheckBlob(AtomicCheck::new(key, versionstamp)))
    }

    /// Commit everything queued
    ///
    /// Returns one result per native sub-commit, in order. An empty queue
    /// returns an empty list without touching the store. If a sub-commit's
    /// checks fail the list ends with that `ok == false` result and nothing
    /// after it is committed.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidOperation` if the operation was already
    /// committed. Store errors, blob stream errors and encryption errors
    /// propagate unchanged; sub-commits before the failure stay applied.
    pub fn commit(&mut self) -> Result<Vec<CommitResult>> {
        if self.state != BatchState::Building {
            return Err(Error::InvalidOperation(format!(
                "batched atomic operation already committed (state: {:?})",
                self.state
            )));
        }
        if self.queue.is_empty() {
            self.state = BatchState::Done;
            return Ok(Vec::new());
        }

        self.state = BatchState::Committing;
        debug!(target: "kvtoolbox::batch", operations = self.queue.len(), "Batched commit started");

        match self.run() {
            Ok(results) => {
                let aborted = results.last().map_or(false, |r| !r.ok);
                self.state = if aborted {
                    BatchState::Aborted
                } else {
                    BatchState::Done
                };
                info!(
                    target: "kvtoolbox::batch",
                    sub_commits = results.len(),
                    aborted,
                    "Batched commit finished"
                );
                Ok(results)
            }
            Err(e) => {
                self.queue.clear();
                self.state = BatchState::Aborted;
                warn!(target: "kvtoolbox::batch", error = %e, "Batched commit failed");
                Err(e)
            }
        }
    }

    fn run(&mut self) -> Result<Vec<CommitResult>> {
        let store = self.store;
        let limits = self.options.limits;
        let mut results = Vec::new();
        let mut current = store.atomic();
        let mut totals = BatchAccumulator::default();

        while let Some(operation) = self.queue.pop_front() {
            let primitive = match operation {
                Operation::Check(check) => Primitive::Check(check),
                Operation::CheckBlob(check) => Primitive::Check(AtomicCheck::new(
                    blob::meta_key(&check.key),
                    check.versionstamp,
                )),
                Operation::Mutate(mutation) => Primitive::Mutate(mutation),
                Operation::Enqueue(enqueue) => Primitive::Enqueue(enqueue),
                Operation::SetBlob {
                    key,
                    payload,
                    options,
                } => {
                    let batch_size = options.batch_size.or(self.options.batch_size);
                    let existing = blob::read::existing_chunk_count(store, &key, batch_size)?;
                    let mutations =
                        blob::encode_blob_write(&key, payload, existing, &options, self.encryptor)?;
                    debug!(
                        target: "kvtoolbox::blob",
                        key = %key,
                        existing,
                        mutations = mutations.len(),
                        "Expanded blob write"
                    );
                    self.splice_front(mutations);
                    continue;
                }
                Operation::DeleteBlob { key } => {
                    let existing =
                        blob::read::existing_chunk_count(store, &key, self.options.batch_size)?;
                    debug!(target: "kvtoolbox::blob", key = %key, existing, "Expanded blob delete");
                    self.splice_front(blob::encode_blob_delete(&key, existing));
                    continue;
                }
            };

            let delta = BatchAccumulator::delta(&primitive);
            if !current.is_empty() && totals.would_exceed(&delta, &limits) {
                let full = std::mem::replace(&mut current, store.atomic());
                let result = flush(full, &totals, results.len())?;
                results.push(result);
                if !result.ok {
                    self.queue.clear();
                    return Ok(results);
                }
                totals = BatchAccumulator::default();
            }
            totals.add(&delta);
            primitive.apply(&mut current);
        }

        if !current.is_empty() {
            results.push(flush(current, &totals, results.len())?);
        }
        Ok(results)
    }

    fn splice_front(&mut self, mutations: Vec<Mutation>) {
        for mutation in mutations.into_iter().rev() {
            self.queue.push_front(Operation::Mutate(mutation));
        }
    }
}

fn flush<S: Store>(
    builder: AtomicBuilder<'_, S>,
    totals: &BatchAccumulator,
    index: usize,
) -> Result<CommitResult> {
    let result = builder.commit()?;
    if result.ok {
        debug!(
            target: "kvtoolbox::batch",
            index,
            checks = totals.checks,
            mutations = totals.mutations,
            bytes = totals.bytes,
            key_bytes = totals.key_bytes,
            "Sub-commit applied"
        );
    } else {
        warn!(
            target: "kvtoolbox::batch",
            index,
            checks = totals.checks,
            "Sub-commit check failed, stopping"
        );
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvtoolbox_core::{key, KvU64};
    use kvtoolbox_storage::MemoryStore;

    fn limits(max_checks: usize, max_mutations: usize) -> BatchedAtomicOptions {
        BatchedAtomicOptions {
            limits: BatchLimits {
                max_checks,
                max_mutations,
                ..BatchLimits::default()
            },
            batch_size: None,
        }
    }

    #[test]
    fn test_empty_commit_touches_nothing() {
        let store = MemoryStore::new();
        let mut op = batched_atomic(&store, BatchedAtomicOptions::default());
        assert!(op.commit().unwrap().is_empty());
        assert_eq!(op.state(), BatchState::Done);
        assert_eq!(store.stats().total_operations(), 0);
    }

    #[test]
    fn test_commit_twice_is_invalid() {
        let store = MemoryStore::new();
        let mut op = batched_atomic(&store, BatchedAtomicOptions::default());
        op.set(key!["a"], 1i64);
        op.commit().unwrap();
        let err = op.commit().unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));
    }

    #[test]
    fn test_splits_on_mutation_count() {
        let store = MemoryStore::new();
        let mut op = batched_atomic(&store, limits(10, 3));
        for i in 0..10i64 {
            op.set(key!["n", i], i);
        }
        let results = op.commit().unwrap();
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.ok));
        assert_eq!(store.len(), 10);
        assert_eq!(op.state(), BatchState::Done);
    }

    #[test]
    fn test_splits_on_check_count() {
        let store = MemoryStore::new();
        let mut op = batched_atomic(&store, limits(2, 100));
        for i in 0..5i64 {
            op.check(key!["c", i], None);
        }
        op.set(key!["done"], true);
        let results = op.commit().unwrap();
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.ok));
    }

    #[test]
    fn test_failed_check_stops_remaining_batches() {
        let store = MemoryStore::new();
        store.set(key!["a"], Value::from("x"), SetOptions::default()).unwrap();

        let mut op = batched_atomic(&store, limits(10, 1));
        op.check(key!["a"], None);
        op.set(key!["b"], 1i64);
        op.set(key!["c"], 2i64);

        let results = op.commit().unwrap();
        assert_eq!(results.len(), 1);
        assert!(!results[0].ok);
        assert_eq!(op.state(), BatchState::Aborted);
        assert!(!store.get(&key!["b"]).unwrap().is_present());
        assert!(!store.get(&key!["c"]).unwrap().is_present());
    }

    #[test]
    fn test_failed_check_in_later_batch_keeps_earlier() {
        let store = MemoryStore::new();
        store.set(key!["guard"], Value::from("x"), SetOptions::default()).unwrap();

        let mut op = batched_atomic(&store, limits(10, 1));
        op.set(key!["first"], 1i64);
        op.set(key!["second"], 2i64);
        op.check(key!["guard"], None);
        op.set(key!["third"], 3i64);

        let results = op.commit().unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].ok);
        assert!(!results[1].ok);
        assert!(store.get(&key!["first"]).unwrap().is_present());
        assert!(!store.get(&key!["second"]).unwrap().is_present());
        assert!(!store.get(&key!["third"]).unwrap().is_present());
    }

    #[test]
    fn test_byte_ceiling_splits_large_values() {
        let store = MemoryStore::new();
        let options = BatchedAtomicOptions {
            limits: BatchLimits {
                max_bytes: 1_000,
                ..BatchLimits::default()
            },
            batch_size: None,
        };
        let mut op = batched_atomic(&store, options);
        for i in 0..4i64 {
            op.set(key!["big", i], Value::Bytes(vec![0; 400]));
        }
        let results = op.commit().unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_oversized_single_operation_goes_alone() {
        let store = MemoryStore::new();
        let options = BatchedAtomicOptions {
            limits: BatchLimits {
                max_bytes: 100,
                ..BatchLimits::default()
            },
            batch_size: None,
        };
        let mut op = batched_atomic(&store, options);
        op.set(key!["small"], 1i64);
        op.set(key!["large"], Value::Bytes(vec![0; 500]));
        op.set(key!["tail"], 2i64);
        let results = op.commit().unwrap();
        assert_eq!(results.len(), 3);
        assert!(store.get(&key!["large"]).unwrap().is_present());
    }

    #[test]
    fn test_sum_min_max() {
        let store = MemoryStore::new();
        let mut op = batched_atomic(&store, BatchedAtomicOptions::default());
        op.sum(key!["s"], 5).sum(key!["s"], 7).min(key!["lo"], 9).max(key!["hi"], 3);
        op.commit().unwrap();

        assert_eq!(store.get(&key!["s"]).unwrap().value, Some(Value::U64(KvU64(12))));
        assert_eq!(store.get(&key!["lo"]).unwrap().value, Some(Value::U64(KvU64(9))));
        assert_eq!(store.get(&key!["hi"]).unwrap().value, Some(Value::U64(KvU64(3))));
    }

    #[test]
    fn test_blob_check_targets_meta_key() {
        let store = MemoryStore::new();
        let k = key!["blob"];
        blob::set(&store, &k, vec![1, 2, 3].into(), BlobSetOptions::default()).unwrap();
        let meta = store.get(&blob::meta_key(&k)).unwrap();

        let mut stale = batched_atomic(&store, BatchedAtomicOptions::default());
        stale.check_blob(k.clone(), None).set(key!["x"], 1i64);
        assert!(!stale.commit().unwrap()[0].ok);

        let mut fresh = batched_atomic(&store, BatchedAtomicOptions::default());
        fresh.check_blob(k.clone(), meta.versionstamp).set(key!["x"], 1i64);
        assert!(fresh.commit().unwrap()[0].ok);
    }

    #[test]
    fn test_store_error_propagates_and_aborts() {
        let store = MemoryStore::new();
        store.fail_commits_after(1, "disk on fire");

        let mut op = batched_atomic(&store, limits(10, 1));
        op.set(key!["a"], 1i64).set(key!["b"], 2i64).set(key!["c"], 3i64);
        let err = op.commit().unwrap_err();
        assert!(err.is_store_error());
        assert_eq!(op.state(), BatchState::Aborted);
        assert!(store.get(&key!["a"]).unwrap().is_present());
        assert!(!store.get(&key!["b"]).unwrap().is_present());
    }

    #[test]
    fn test_enqueue_budget_counts_undelivered_keys() {
        let enqueue = Enqueue {
            value: Value::from("msg"),
            options: EnqueueOptions {
                keys_if_undelivered: vec![key!["dead", "letter"]],
                ..EnqueueOptions::default()
            },
        };
        let delta = BatchAccumulator::delta(&Primitive::Enqueue(enqueue));
        let key_size = estimate_key_size(&key!["dead", "letter"]);
        assert_eq!(delta.mutations, 1);
        assert_eq!(delta.key_bytes, key_size);
        assert_eq!(delta.bytes, estimate_size(&Value::from("msg")) + key_size);
    }

    #[test]
    fn test_delete_budget_counts_key_only() {
        let delta = BatchAccumulator::delta(&Primitive::Mutate(Mutation::delete(key!["gone"])));
        let key_size = estimate_key_size(&key!["gone"]);
        assert_eq!(delta.bytes, key_size);
        assert_eq!(delta.key_bytes, key_size);
        assert_eq!(delta.checks, 0);
    }

    #[test]
    fn test_enqueue_reaches_store_queue() {
        let store = MemoryStore::new();
        let mut op = batched_atomic(&store, BatchedAtomicOptions::default());
        op.enqueue("hello", EnqueueOptions::default());
        op.commit().unwrap();
        assert_eq!(store.queued_messages(), 1);
    }
}
