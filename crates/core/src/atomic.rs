//! Native atomic operation model
//!
//! An `AtomicOperation` is what one native commit of the store executes:
//! a set of versionstamp checks, an ordered list of mutations and an
//! ordered list of enqueued messages. Either every check passes and every
//! mutation is applied under a single versionstamp, or nothing is applied.
//!
//! `AtomicBuilder` is the chainable front end returned by `Store::atomic()`.

use std::time::Duration;

use crate::error::Result;
use crate::traits::Store;
use crate::types::{CommitResult, Key, Versionstamp};
use crate::value::{KvU64, Value};

/// Optimistic-concurrency check
///
/// Passes when the key's current versionstamp equals `versionstamp`;
/// `None` asserts the key does not exist.
#[derive(Debug, Clone, PartialEq)]
pub struct AtomicCheck {
    /// Key to check
    pub key: Key,
    /// Expected versionstamp (`None` = key must be absent)
    pub versionstamp: Option<Versionstamp>,
}

impl AtomicCheck {
    /// Create a check
    pub fn new(key: Key, versionstamp: Option<Versionstamp>) -> Self {
        AtomicCheck { key, versionstamp }
    }
}

/// Kind of a mutation
#[derive(Debug, Clone, PartialEq)]
pub enum MutationKind {
    /// Overwrite the value
    Set(Value),
    /// Remove the key
    Delete,
    /// Wrapping add to a `U64` value (absent counts as 0)
    Sum(KvU64),
    /// Keep the smaller of current and operand
    Min(KvU64),
    /// Keep the larger of current and operand
    Max(KvU64),
}

impl MutationKind {
    /// Name used in logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            MutationKind::Set(_) => "set",
            MutationKind::Delete => "delete",
            MutationKind::Sum(_) => "sum",
            MutationKind::Min(_) => "min",
            MutationKind::Max(_) => "max",
        }
    }

    /// The operand carried by this mutation, as a value
    pub fn operand(&self) -> Option<Value> {
        match self {
            MutationKind::Set(v) => Some(v.clone()),
            MutationKind::Delete => None,
            MutationKind::Sum(n) | MutationKind::Min(n) | MutationKind::Max(n) => {
                Some(Value::U64(*n))
            }
        }
    }
}

/// One mutation of an atomic operation
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    /// Target key
    pub key: Key,
    /// What to do
    pub kind: MutationKind,
    /// Optional expiry for `Set`
    pub expire_in: Option<Duration>,
}

impl Mutation {
    /// Set `key` to `value`
    pub fn set(key: Key, value: impl Into<Value>) -> Self {
        Mutation {
            key,
            kind: MutationKind::Set(value.into()),
            expire_in: None,
        }
    }

    /// Delete `key`
    pub fn delete(key: Key) -> Self {
        Mutation {
            key,
            kind: MutationKind::Delete,
            expire_in: None,
        }
    }

    /// Sum into `key`
    pub fn sum(key: Key, n: u64) -> Self {
        Mutation {
            key,
            kind: MutationKind::Sum(KvU64(n)),
            expire_in: None,
        }
    }

    /// Min into `key`
    pub fn min(key: Key, n: u64) -> Self {
        Mutation {
            key,
            kind: MutationKind::Min(KvU64(n)),
            expire_in: None,
        }
    }

    /// Max into `key`
    pub fn max(key: Key, n: u64) -> Self {
        Mutation {
            key,
            kind: MutationKind::Max(KvU64(n)),
            expire_in: None,
        }
    }

    /// Attach an expiry
    pub fn with_expire_in(mut self, expire_in: Option<Duration>) -> Self {
        self.expire_in = expire_in;
        self
    }
}

/// Options for an enqueued message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnqueueOptions {
    /// Delay before the message becomes deliverable
    pub delay: Option<Duration>,
    /// Keys the value is written to if delivery ultimately fails
    pub keys_if_undelivered: Vec<Key>,
    /// Retry delays used by the delivering side
    pub backoff_schedule: Option<Vec<Duration>>,
}

/// A message enqueued as part of an atomic operation
#[derive(Debug, Clone, PartialEq)]
pub struct Enqueue {
    /// Message payload
    pub value: Value,
    /// Delivery options
    pub options: EnqueueOptions,
}

/// Everything one native commit executes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AtomicOperation {
    /// Versionstamp checks
    pub checks: Vec<AtomicCheck>,
    /// Mutations, applied in order
    pub mutations: Vec<Mutation>,
    /// Enqueued messages, in order
    pub enqueues: Vec<Enqueue>,
}

impl AtomicOperation {
    /// Empty operation
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nothing has been added
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty() && self.mutations.is_empty() && self.enqueues.is_empty()
    }
}

/// Chainable builder for one native commit
///
/// ```
/// use kvtoolbox_core::{key, AtomicOperation, CommitResult, Entry, Key,
///     ListIterator, ListOptions, ListSelector, MaybeEntry, Result, Store, Versionstamp};
///
/// struct Null;
/// impl Store for Null {
///     fn get(&self, key: &Key) -> Result<MaybeEntry> { Ok(MaybeEntry::missing(key.clone())) }
///     fn list(&self, _: ListSelector, _: ListOptions) -> Result<ListIterator<'_>> {
///         Ok(Box::new(std::iter::empty::<Result<Entry>>()))
///     }
///     fn commit(&self, op: AtomicOperation) -> Result<CommitResult> {
///         assert_eq!(op.mutations.len(), 2);
///         Ok(CommitResult::committed(Versionstamp::from_sequence(1)))
///     }
/// }
///
/// let store = Null;
/// let mut atomic = store.atomic();
/// atomic.set(key!["a"], "1").delete(key!["b"]);
/// assert!(atomic.commit().unwrap().ok);
/// ```
pub struct AtomicBuilder<'s, S: Store + ?Sized> {
    store: &'s S,
    operation: AtomicOperation,
}

impl<'s, S: Store + ?Sized> AtomicBuilder<'s, S> {
    /// Start an empty native operation against `store`
    pub fn new(store: &'s S) -> Self {
        AtomicBuilder {
            store,
            operation: AtomicOperation::new(),
        }
    }

    /// Add a versionstamp check
    pub fn check(&mut self, check: AtomicCheck) -> &mut Self {
        self.operation.checks.push(check);
        self
    }

    /// Add a mutation
    pub fn mutate(&mut self, mutation: Mutation) -> &mut Self {
        self.operation.mutations.push(mutation);
        self
    }

    /// Set `key` to `value`
    pub fn set(&mut self, key: Key, value: impl Into<Value>) -> &mut Self {
        self.mutate(Mutation::set(key, value))
    }

    /// Set `key` to `value` with an expiry
    pub fn set_with_expiry(
        &mut self,
        key: Key,
        value: impl Into<Value>,
        expire_in: Option<Duration>,
    ) -> &mut Self {
        self.mutate(Mutation::set(key, value).with_expire_in(expire_in))
    }

    /// Delete `key`
    pub fn delete(&mut self, key: Key) -> &mut Self {
        self.mutate(Mutation::delete(key))
    }

    /// Wrapping add into a `U64` value
    pub fn sum(&mut self, key: Key, n: u64) -> &mut Self {
        self.mutate(Mutation::sum(key, n))
    }

    /// Keep the minimum of a `U64` value
    pub fn min(&mut self, key: Key, n: u64) -> &mut Self {
        self.mutate(Mutation::min(key, n))
    }

    /// Keep the maximum of a `U64` value
    pub fn max(&mut self, key: Key, n: u64) -> &mut Self {
        self.mutate(Mutation::max(key, n))
    }

    /// Enqueue a message
    pub fn enqueue(&mut self, value: impl Into<Value>, options: EnqueueOptions) -> &mut Self {
        self.operation.enqueues.push(Enqueue {
            value: value.into(),
            options,
        });
        self
    }

    /// Number of checks added so far
    pub fn check_count(&self) -> usize {
        self.operation.checks.len()
    }

    /// Whether nothing has been added
    pub fn is_empty(&self) -> bool {
        self.operation.is_empty()
    }

    /// Borrow the accumulated operation
    pub fn operation(&self) -> &AtomicOperation {
        &self.operation
    }

    /// Execute as one native commit
    pub fn commit(self) -> Result<CommitResult> {
        self.store.commit(self.operation)
    }
}
