//! MemoryStore: ordered in-memory backend with native atomic commits
//!
//! This module implements the `Store` trait using:
//! - `BTreeMap<Key, StoredValue>` for ordered key storage with expiry
//! - `parking_lot::RwLock` for thread-safe access
//! - `AtomicU64` for monotonically increasing versionstamps
//!
//! # Design Notes
//!
//! - **Check-and-apply under one write lock**: a commit validates every check
//!   and stages every mutation before anything becomes visible, so a commit
//!   is all-or-nothing even when a sum/min/max operand is rejected.
//! - **Native limits**: commits exceeding `StoreLimits` fail with
//!   `Error::LimitExceeded` before the lock is taken. Value sizes are the
//!   MessagePack-encoded length.
//! - **Logical expiry**: expired values are filtered at read time, not deleted.
//! - **Paged listing**: `list` returns a cursor that fetches `batch_size`
//!   entries per read-lock acquisition, resuming after the last key seen.

use std::collections::{BTreeMap, VecDeque};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use kvtoolbox_core::{
    AtomicOperation, CommitResult, Entry, Error, Key, KvU64, ListIterator, ListOptions,
    ListSelector, MaybeEntry, MutationKind, Result, Store, StoreLimits, Value, Versionstamp,
};

use crate::queue::{MessageQueue, QueuedMessage};
use crate::stored_value::StoredValue;

/// Default number of entries fetched per list page
pub const DEFAULT_LIST_BATCH_SIZE: usize = 100;

type Data = Arc<RwLock<BTreeMap<Key, StoredValue>>>;

/// Point-in-time copy of the access counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStatsSnapshot {
    /// `get` calls
    pub gets: u64,
    /// `list` calls
    pub lists: u64,
    /// Pages fetched by list cursors
    pub list_pages: u64,
    /// Native commits attempted (including single `set`/`delete`)
    pub commits: u64,
}

impl StoreStatsSnapshot {
    /// Calls that reached the store
    pub fn total_operations(&self) -> u64 {
        self.gets + self.lists + self.commits
    }
}

/// Access counters
///
/// Purely observational; Relaxed ordering is sufficient.
#[derive(Debug, Default)]
struct StoreStats {
    gets: AtomicU64,
    lists: AtomicU64,
    list_pages: Arc<AtomicU64>,
    commits: AtomicU64,
}

#[derive(Debug)]
struct FaultPlan {
    commits_before_failure: usize,
    message: String,
}

/// Ordered in-memory store
///
/// Thread-safe through `parking_lot::RwLock` and `AtomicU64`.
#[derive(Debug)]
pub struct MemoryStore {
    data: Data,
    queue: Mutex<MessageQueue>,
    sequence: AtomicU64,
    limits: StoreLimits,
    stats: StoreStats,
    fault: Mutex<Option<FaultPlan>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store with default native limits
    pub fn new() -> Self {
        Self::with_limits(StoreLimits::default())
    }

    /// Create an empty store with custom native limits
    pub fn with_limits(limits: StoreLimits) -> Self {
        MemoryStore {
            data: Arc::new(RwLock::new(BTreeMap::new())),
            queue: Mutex::new(MessageQueue::new()),
            sequence: AtomicU64::new(0),
            limits,
            stats: StoreStats::default(),
            fault: Mutex::new(None),
        }
    }

    /// Native limits enforced by this store
    pub fn limits(&self) -> &StoreLimits {
        &self.limits
    }

    /// Snapshot of the access counters
    pub fn stats(&self) -> StoreStatsSnapshot {
        StoreStatsSnapshot {
            gets: self.stats.gets.load(Ordering::Relaxed),
            lists: self.stats.lists.load(Ordering::Relaxed),
            list_pages: self.stats.list_pages.load(Ordering::Relaxed),
            commits: self.stats.commits.load(Ordering::Relaxed),
        }
    }

    /// Number of live (non-expired) keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.data.read().values().filter(|sv| !sv.is_expired(now)).count()
    }

    /// Whether no live key exists
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All live keys in order
    pub fn keys(&self) -> Vec<Key> {
        let now = Instant::now();
        self.data
            .read()
            .iter()
            .filter(|(_, sv)| !sv.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Remove and return enqueued messages that are due
    pub fn take_ready_messages(&self) -> Vec<QueuedMessage> {
        self.queue.lock().take_ready(Instant::now())
    }

    /// Number of messages waiting in the queue
    pub fn queued_messages(&self) -> usize {
        self.queue.lock().len()
    }

    /// Let `commits_before_failure` commits succeed, then fail every later
    /// commit with `Error::Store(message)`
    ///
    /// Used to exercise store-level failure propagation.
    pub fn fail_commits_after(&self, commits_before_failure: usize, message: impl Into<String>) {
        *self.fault.lock() = Some(FaultPlan {
            commits_before_failure,
            message: message.into(),
        });
    }

    /// Remove an injected failure
    pub fn clear_fault(&self) {
        *self.fault.lock() = None;
    }

    fn next_versionstamp(&self) -> Versionstamp {
        Versionstamp::from_sequence(self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn check_fault(&self) -> Result<()> {
        let mut fault = self.fault.lock();
        if let Some(plan) = fault.as_mut() {
            if plan.commits_before_failure == 0 {
                return Err(Error::Store(plan.message.clone()));
            }
            plan.commits_before_failure -= 1;
        }
        Ok(())
    }

    fn validate_key(&self, key: &Key) -> Result<usize> {
        if key.is_empty() {
            return Err(Error::Store("key cannot be empty".to_string()));
        }
        let len = key.encoded_len();
        StoreLimits::ensure("Key size", len, self.limits.max_key_bytes)?;
        Ok(len)
    }

    fn validate_value(&self, value: &Value) -> Result<usize> {
        let len = value.to_msgpack()?.len();
        StoreLimits::ensure("Value size", len, self.limits.max_value_bytes)?;
        Ok(len)
    }

    /// Enforce native limits on a whole operation
    fn validate_operation(&self, operation: &AtomicOperation) -> Result<()> {
        StoreLimits::ensure("Check", operation.checks.len(), self.limits.max_checks)?;
        StoreLimits::ensure(
            "Mutation",
            operation.mutations.len() + operation.enqueues.len(),
            self.limits.max_mutations,
        )?;

        let mut total_key_bytes = 0usize;
        let mut total_mutation_bytes = 0usize;
        for check in &operation.checks {
            total_key_bytes += self.validate_key(&check.key)?;
        }
        for mutation in &operation.mutations {
            let key_len = self.validate_key(&mutation.key)?;
            total_key_bytes += key_len;
            total_mutation_bytes += key_len;
            if let Some(operand) = mutation.kind.operand() {
                total_mutation_bytes += self.validate_value(&operand)?;
            }
        }
        for enqueue in &operation.enqueues {
            total_mutation_bytes += self.validate_value(&enqueue.value)?;
            for key in &enqueue.options.keys_if_undelivered {
                let key_len = self.validate_key(key)?;
                total_key_bytes += key_len;
                total_mutation_bytes += key_len;
            }
        }

        StoreLimits::ensure(
            "Total key size",
            total_key_bytes,
            self.limits.max_total_key_bytes,
        )?;
        StoreLimits::ensure(
            "Total mutation size",
            total_mutation_bytes,
            self.limits.max_total_mutation_bytes,
        )
    }
}

/// Apply a sum/min/max operand to the current value of a key
fn combine(key: &Key, kind: &MutationKind, current: Option<&Value>) -> Result<Value> {
    let current = match current {
        None => None,
        Some(Value::U64(n)) => Some(*n),
        Some(other) => {
            return Err(Error::Store(format!(
                "cannot {} into {} holding a {} value",
                kind.name(),
                key,
                other.type_name()
            )))
        }
    };
    let combined = match (kind, current) {
        (MutationKind::Sum(n), None)
        | (MutationKind::Min(n), None)
        | (MutationKind::Max(n), None) => *n,
        (MutationKind::Sum(n), Some(c)) => KvU64(c.0.wrapping_add(n.0)),
        (MutationKind::Min(n), Some(c)) => KvU64(c.0.min(n.0)),
        (MutationKind::Max(n), Some(c)) => KvU64(c.0.max(n.0)),
        (MutationKind::Set(_), _) | (MutationKind::Delete, _) => {
            return Err(Error::InvalidOperation(format!(
                "{} is not a combining mutation",
                kind.name()
            )))
        }
    };
    Ok(Value::U64(combined))
}

impl Store for MemoryStore {
    fn get(&self, key: &Key) -> Result<MaybeEntry> {
        self.stats.gets.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        let data = self.data.read();
        Ok(match data.get(key).filter(|sv| !sv.is_expired(now)) {
            Some(sv) => MaybeEntry::from(sv.to_entry(key)),
            None => MaybeEntry::missing(key.clone()),
        })
    }

    fn list(&self, selector: ListSelector, options: ListOptions) -> Result<ListIterator<'_>> {
        self.stats.lists.fetch_add(1, Ordering::Relaxed);
        let batch_size = options.batch_size.unwrap_or(DEFAULT_LIST_BATCH_SIZE);
        if batch_size == 0 {
            return Err(Error::Store("batch_size must be greater than zero".to_string()));
        }
        if let ListSelector::Range { start, end } = &selector {
            if start > end {
                return Err(Error::Store(format!(
                    "range start {} is after end {}",
                    start, end
                )));
            }
        }
        Ok(Box::new(ListCursor {
            data: Arc::clone(&self.data),
            pages: Arc::clone(&self.stats.list_pages),
            selector,
            reverse: options.reverse,
            remaining: options.limit,
            batch_size,
            last_key: None,
            buffer: VecDeque::new(),
            exhausted: false,
        }))
    }

    fn commit(&self, operation: AtomicOperation) -> Result<CommitResult> {
        self.stats.commits.fetch_add(1, Ordering::Relaxed);
        self.check_fault()?;
        if let Err(e) = self.validate_operation(&operation) {
            debug!(target: "kvtoolbox::store", error = %e, "Commit rejected");
            return Err(e);
        }

        let AtomicOperation {
            checks,
            mutations,
            enqueues,
        } = operation;

        let now = Instant::now();
        let mut data = self.data.write();

        for check in &checks {
            let current = data
                .get(&check.key)
                .filter(|sv| !sv.is_expired(now))
                .map(StoredValue::versionstamp);
            if current != check.versionstamp {
                debug!(target: "kvtoolbox::store", key = %check.key, "Check failed");
                return Ok(CommitResult::check_failed());
            }
        }

        let versionstamp = self.next_versionstamp();

        // Stage every mutation so a rejected operand leaves the store untouched
        let mut staged: BTreeMap<Key, Option<StoredValue>> = BTreeMap::new();
        for mutation in mutations {
            let next = match &mutation.kind {
                MutationKind::Set(value) => Some(StoredValue::new(
                    value.clone(),
                    versionstamp,
                    now,
                    mutation.expire_in,
                )),
                MutationKind::Delete => None,
                kind => {
                    let current = match staged.get(&mutation.key) {
                        Some(staged_value) => staged_value.as_ref().map(StoredValue::value),
                        None => data
                            .get(&mutation.key)
                            .filter(|sv| !sv.is_expired(now))
                            .map(StoredValue::value),
                    };
                    let combined = combine(&mutation.key, kind, current)?;
                    Some(StoredValue::new(combined, versionstamp, now, None))
                }
            };
            staged.insert(mutation.key, next);
        }

        for (key, next) in staged {
            match next {
                Some(sv) => {
                    data.insert(key, sv);
                }
                None => {
                    data.remove(&key);
                }
            }
        }
        drop(data);

        if !enqueues.is_empty() {
            let mut queue = self.queue.lock();
            for enqueue in enqueues {
                queue.push(enqueue.value, enqueue.options, versionstamp, now);
            }
        }

        Ok(CommitResult::committed(versionstamp))
    }
}

/// Lazy paged cursor over a `MemoryStore`
struct ListCursor {
    data: Data,
    pages: Arc<AtomicU64>,
    selector: ListSelector,
    reverse: bool,
    remaining: Option<usize>,
    batch_size: usize,
    last_key: Option<Key>,
    buffer: VecDeque<Entry>,
    exhausted: bool,
}

impl ListCursor {
    /// Whether a forward scan has moved beyond every selectable key
    fn past_end(&self, key: &Key) -> bool {
        match &self.selector {
            ListSelector::Prefix(prefix) | ListSelector::PrefixStart { prefix, .. } => {
                key > prefix && !key.starts_with(prefix)
            }
            ListSelector::PrefixEnd { prefix, end } => {
                key >= end || (key > prefix && !key.starts_with(prefix))
            }
            ListSelector::Range { end, .. } => key >= end,
        }
    }

    /// Whether a reverse scan has moved below every selectable key
    fn before_start(&self, key: &Key) -> bool {
        key < self.selector.lower_bound()
    }

    fn fetch_page(&mut self) {
        self.pages.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        let data = self.data.read();
        let mut page = Vec::with_capacity(self.batch_size);
        let mut reached_end = true;

        if self.reverse {
            let upper = match (&self.last_key, &self.selector) {
                (Some(last), _) => Bound::Excluded(last.clone()),
                (None, ListSelector::PrefixEnd { end, .. })
                | (None, ListSelector::Range { end, .. }) => Bound::Excluded(end.clone()),
                (None, _) => Bound::Unbounded,
            };
            for (key, sv) in data.range((Bound::Unbounded, upper)).rev() {
                if self.before_start(key) {
                    break;
                }
                if !self.selector.contains(key) || sv.is_expired(now) {
                    continue;
                }
                page.push(sv.to_entry(key));
                if page.len() == self.batch_size {
                    reached_end = false;
                    break;
                }
            }
        } else {
            let lower = match &self.last_key {
                Some(last) => Bound::Excluded(last.clone()),
                None => Bound::Included(self.selector.lower_bound().clone()),
            };
            for (key, sv) in data.range((lower, Bound::Unbounded)) {
                if self.past_end(key) {
                    break;
                }
                if !self.selector.contains(key) || sv.is_expired(now) {
                    continue;
                }
                page.push(sv.to_entry(key));
                if page.len() == self.batch_size {
                    reached_end = false;
                    break;
                }
            }
        }
        drop(data);

        if let Some(last) = page.last() {
            self.last_key = Some(last.key.clone());
        }
        self.exhausted = reached_end;
        self.buffer.extend(page);
    }
}

impl Iterator for ListCursor {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == Some(0) {
            return None;
        }
        if self.buffer.is_empty() && !self.exhausted {
            self.fetch_page();
        }
        let entry = self.buffer.pop_front()?;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        Some(Ok(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvtoolbox_core::{key, AtomicCheck, EnqueueOptions, Mutation, SetOptions};
    use std::time::Duration;

    fn collect(store: &MemoryStore, selector: ListSelector, options: ListOptions) -> Vec<Key> {
        store
            .list(selector, options)
            .unwrap()
            .map(|e| e.unwrap().key)
            .collect()
    }

    #[test]
    fn test_set_then_get() {
        let store = MemoryStore::new();
        let res = store
            .set(key!["a"], Value::from("1"), SetOptions::default())
            .unwrap();
        assert!(res.ok);
        let entry = store.get(&key!["a"]).unwrap();
        assert_eq!(entry.value, Some(Value::from("1")));
        assert_eq!(entry.versionstamp, res.versionstamp);
    }

    #[test]
    fn test_versionstamps_increase() {
        let store = MemoryStore::new();
        let a = store.set(key!["a"], Value::Null, SetOptions::default()).unwrap();
        let b = store.set(key!["a"], Value::Null, SetOptions::default()).unwrap();
        assert!(a.versionstamp < b.versionstamp);
    }

    #[test]
    fn test_delete() {
        let store = MemoryStore::new();
        store.set(key!["a"], Value::Null, SetOptions::default()).unwrap();
        store.delete(&key!["a"]).unwrap();
        assert!(!store.get(&key!["a"]).unwrap().is_present());
    }

    #[test]
    fn test_check_failure_applies_nothing() {
        let store = MemoryStore::new();
        store.set(key!["a"], Value::from("old"), SetOptions::default()).unwrap();

        let mut atomic = store.atomic();
        atomic
            .check(AtomicCheck::new(key!["a"], None))
            .set(key!["a"], "new")
            .set(key!["b"], "new");
        let res = atomic.commit().unwrap();

        assert!(!res.ok);
        assert!(res.versionstamp.is_none());
        assert_eq!(store.get(&key!["a"]).unwrap().value, Some(Value::from("old")));
        assert!(!store.get(&key!["b"]).unwrap().is_present());
    }

    #[test]
    fn test_check_passes_with_current_versionstamp() {
        let store = MemoryStore::new();
        let vs = store
            .set(key!["a"], Value::from("old"), SetOptions::default())
            .unwrap()
            .versionstamp;
        let mut atomic = store.atomic();
        atomic.check(AtomicCheck::new(key!["a"], vs)).set(key!["a"], "new");
        assert!(atomic.commit().unwrap().ok);
    }

    #[test]
    fn test_sum_min_max() {
        let store = MemoryStore::new();
        let mut atomic = store.atomic();
        atomic
            .sum(key!["s"], 5)
            .sum(key!["s"], 7)
            .min(key!["lo"], 9)
            .min(key!["lo"], 3)
            .max(key!["hi"], 2)
            .max(key!["hi"], 8);
        assert!(atomic.commit().unwrap().ok);

        assert_eq!(store.get(&key!["s"]).unwrap().value, Some(Value::U64(KvU64(12))));
        assert_eq!(store.get(&key!["lo"]).unwrap().value, Some(Value::U64(KvU64(3))));
        assert_eq!(store.get(&key!["hi"]).unwrap().value, Some(Value::U64(KvU64(8))));
    }

    #[test]
    fn test_sum_wraps() {
        let store = MemoryStore::new();
        store
            .set(key!["s"], Value::U64(KvU64(u64::MAX)), SetOptions::default())
            .unwrap();
        let mut atomic = store.atomic();
        atomic.sum(key!["s"], 2);
        atomic.commit().unwrap();
        assert_eq!(store.get(&key!["s"]).unwrap().value, Some(Value::U64(KvU64(1))));
    }

    #[test]
    fn test_sum_on_wrong_type_is_atomic_error() {
        let store = MemoryStore::new();
        store.set(key!["s"], Value::from("x"), SetOptions::default()).unwrap();
        let mut atomic = store.atomic();
        atomic.set(key!["other"], "y").sum(key!["s"], 1);
        let err = atomic.commit().unwrap_err();
        assert!(matches!(err, Error::Store(_)));
        assert!(!store.get(&key!["other"]).unwrap().is_present());
    }

    #[test]
    fn test_native_limits_enforced() {
        let store = MemoryStore::with_limits(StoreLimits::with_small_limits());
        let mut op = AtomicOperation::new();
        for i in 0..9 {
            op.mutations.push(Mutation::set(key!["k", i as f64], Value::Null));
        }
        let err = store.commit(op).unwrap_err();
        assert!(matches!(err, Error::LimitExceeded { what: "Mutation", .. }));

        let err = store
            .set(key!["big"], Value::Bytes(vec![0; 2000]), SetOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::LimitExceeded { what: "Value size", .. }));
        assert!(err.is_store_error());
    }

    #[test]
    fn test_empty_key_rejected() {
        let store = MemoryStore::new();
        let err = store
            .set(key![], Value::Null, SetOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Store(_)));
    }

    #[test]
    fn test_expired_values_are_hidden() {
        let store = MemoryStore::new();
        store
            .set(
                key!["t"],
                Value::Null,
                SetOptions {
                    expire_in: Some(Duration::from_millis(0)),
                },
            )
            .unwrap();
        assert!(!store.get(&key!["t"]).unwrap().is_present());
        assert!(store.is_empty());
    }

    #[test]
    fn test_list_prefix_excludes_prefix_and_siblings() {
        let store = MemoryStore::new();
        for k in [key!["a"], key!["a", 1.0], key!["a", 2.0], key!["ab"], key!["b", 1.0]] {
            store.set(k, Value::Null, SetOptions::default()).unwrap();
        }
        let keys = collect(&store, ListSelector::prefix(key!["a"]), ListOptions::default());
        assert_eq!(keys, vec![key!["a", 1.0], key!["a", 2.0]]);
    }

    #[test]
    fn test_list_paginates_lazily() {
        let store = MemoryStore::new();
        for i in 0..10 {
            store
                .set(key!["p", i as f64], Value::Null, SetOptions::default())
                .unwrap();
        }
        let before = store.stats().list_pages;
        let mut iter = store
            .list(ListSelector::prefix(key!["p"]), ListOptions::with_batch_size(Some(3)))
            .unwrap();
        assert_eq!(store.stats().list_pages, before);

        iter.next().unwrap().unwrap();
        assert_eq!(store.stats().list_pages, before + 1);

        let rest: Vec<_> = iter.map(|e| e.unwrap().key).collect();
        assert_eq!(rest.len(), 9);
        assert_eq!(store.stats().list_pages, before + 4);
    }

    #[test]
    fn test_list_reverse_and_limit() {
        let store = MemoryStore::new();
        for i in 1..=5 {
            store
                .set(key!["p", i as f64], Value::Null, SetOptions::default())
                .unwrap();
        }
        store.set(key!["q"], Value::Null, SetOptions::default()).unwrap();
        let keys = collect(
            &store,
            ListSelector::prefix(key!["p"]),
            ListOptions {
                limit: Some(3),
                reverse: true,
                batch_size: Some(2),
            },
        );
        assert_eq!(keys, vec![key!["p", 5.0], key!["p", 4.0], key!["p", 3.0]]);
    }

    #[test]
    fn test_list_range() {
        let store = MemoryStore::new();
        for c in ["a", "b", "c", "d"] {
            store.set(key![c], Value::Null, SetOptions::default()).unwrap();
        }
        let keys = collect(
            &store,
            ListSelector::Range {
                start: key!["b"],
                end: key!["d"],
            },
            ListOptions::default(),
        );
        assert_eq!(keys, vec![key!["b"], key!["c"]]);
    }

    #[test]
    fn test_enqueue_retained() {
        let store = MemoryStore::new();
        let mut atomic = store.atomic();
        atomic.enqueue("msg", EnqueueOptions::default());
        assert!(atomic.commit().unwrap().ok);
        assert_eq!(store.queued_messages(), 1);
        let ready = store.take_ready_messages();
        assert_eq!(ready[0].value, Value::from("msg"));
    }

    #[test]
    fn test_injected_fault() {
        let store = MemoryStore::new();
        store.fail_commits_after(1, "connection reset");
        assert!(store.set(key!["a"], Value::Null, SetOptions::default()).is_ok());
        let err = store
            .set(key!["b"], Value::Null, SetOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Store(ref m) if m == "connection reset"));
        store.clear_fault();
        assert!(store.set(key!["b"], Value::Null, SetOptions::default()).is_ok());
    }

    #[test]
    fn test_stats_count_calls() {
        let store = MemoryStore::new();
        assert_eq!(store.stats().total_operations(), 0);
        store.get(&key!["a"]).unwrap();
        store.set(key!["a"], Value::Null, SetOptions::default()).unwrap();
        let _ = store.list(ListSelector::prefix(key![]), ListOptions::default()).unwrap();
        let stats = store.stats();
        assert_eq!(stats.gets, 1);
        assert_eq!(stats.commits, 1);
        assert_eq!(stats.lists, 1);
    }

    proptest::proptest! {
        #[test]
        fn prop_paged_listing_matches_sorted_keys(
            ids in proptest::collection::btree_set(0i64..500, 0..60),
            batch_size in 1usize..9,
        ) {
            let store = MemoryStore::new();
            for id in &ids {
                store.set(key!["p", *id], Value::Int(*id), SetOptions::default()).unwrap();
            }
            let listed = collect(
                &store,
                ListSelector::prefix(key!["p"]),
                ListOptions::with_batch_size(Some(batch_size)),
            );
            let expected: Vec<Key> = ids.iter().map(|id| key!["p", *id]).collect();
            proptest::prop_assert_eq!(listed, expected);
        }
    }
}
