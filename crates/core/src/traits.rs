//! Core store abstraction
//!
//! This module defines the `Store` trait: the contract the batching and blob
//! layers require from the underlying ordered key-value store. Durability,
//! replication and on-disk format are the implementation's business.
//!
//! Thread safety: all methods must be safe to call concurrently from
//! multiple threads (requires Send + Sync). The store serialises
//! conflicting native commits and performs the optimistic-concurrency
//! checks; callers add no locking of their own.

use std::time::Duration;

use crate::atomic::{AtomicBuilder, AtomicOperation, Mutation};
use crate::error::Result;
use crate::types::{CommitResult, Entry, Key, MaybeEntry};
use crate::value::Value;

/// Options for a single `set`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Expire the entry after this duration
    pub expire_in: Option<Duration>,
}

/// Which keys a `list` call visits
///
/// Prefix selectors exclude the prefix key itself. `start` is inclusive,
/// `end` is exclusive.
#[derive(Debug, Clone, PartialEq)]
pub enum ListSelector {
    /// Every key strictly under `prefix`
    Prefix(Key),
    /// Keys under `prefix` at or after `start`
    PrefixStart {
        /// Common prefix
        prefix: Key,
        /// Inclusive lower bound
        start: Key,
    },
    /// Keys under `prefix` before `end`
    PrefixEnd {
        /// Common prefix
        prefix: Key,
        /// Exclusive upper bound
        end: Key,
    },
    /// Keys in `[start, end)`
    Range {
        /// Inclusive lower bound
        start: Key,
        /// Exclusive upper bound
        end: Key,
    },
}

impl ListSelector {
    /// Prefix selector
    pub fn prefix(prefix: Key) -> Self {
        ListSelector::Prefix(prefix)
    }

    /// Whether `key` falls inside the selection
    pub fn contains(&self, key: &Key) -> bool {
        match self {
            ListSelector::Prefix(prefix) => key.len() > prefix.len() && key.starts_with(prefix),
            ListSelector::PrefixStart { prefix, start } => {
                key.len() > prefix.len() && key.starts_with(prefix) && key >= start
            }
            ListSelector::PrefixEnd { prefix, end } => {
                key.len() > prefix.len() && key.starts_with(prefix) && key < end
            }
            ListSelector::Range { start, end } => key >= start && key < end,
        }
    }

    /// The key every selected key is at or after
    pub fn lower_bound(&self) -> &Key {
        match self {
            ListSelector::Prefix(prefix) | ListSelector::PrefixEnd { prefix, .. } => prefix,
            ListSelector::PrefixStart { start, .. } | ListSelector::Range { start, .. } => start,
        }
    }
}

/// Options for a `list` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Stop after this many entries
    pub limit: Option<usize>,
    /// Iterate in descending key order
    pub reverse: bool,
    /// Entries fetched per page from the store
    pub batch_size: Option<usize>,
}

impl ListOptions {
    /// Options with a page size
    pub fn with_batch_size(batch_size: Option<usize>) -> Self {
        ListOptions {
            batch_size,
            ..ListOptions::default()
        }
    }
}

/// Lazy, ordered sequence of listed entries
///
/// Pages are fetched from the store as the iterator is pulled; dropping it
/// stops further reads. A store error is yielded once and ends the sequence.
pub type ListIterator<'a> = Box<dyn Iterator<Item = Result<Entry>> + Send + 'a>;

/// Ordered key-value store with native atomic commits
pub trait Store: Send + Sync {
    /// Read the current value of `key`
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get(&self, key: &Key) -> Result<MaybeEntry>;

    /// List entries in key order
    ///
    /// # Errors
    ///
    /// Returns an error if the selection is invalid or the storage
    /// operation fails. Errors while paging are yielded by the iterator.
    fn list(&self, selector: ListSelector, options: ListOptions) -> Result<ListIterator<'_>>;

    /// Execute one native atomic commit
    ///
    /// A failed check yields `Ok(CommitResult { ok: false, .. })`.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation exceeds native limits, a mutation
    /// is malformed, or the storage operation fails.
    fn commit(&self, operation: AtomicOperation) -> Result<CommitResult>;

    /// Write a single value
    ///
    /// # Errors
    ///
    /// Same as [`Store::commit`].
    fn set(&self, key: Key, value: Value, options: SetOptions) -> Result<CommitResult> {
        let mut operation = AtomicOperation::new();
        operation
            .mutations
            .push(Mutation::set(key, value).with_expire_in(options.expire_in));
        self.commit(operation)
    }

    /// Delete a single key
    ///
    /// # Errors
    ///
    /// Same as [`Store::commit`].
    fn delete(&self, key: &Key) -> Result<()> {
        let mut operation = AtomicOperation::new();
        operation.mutations.push(Mutation::delete(key.clone()));
        self.commit(operation).map(|_| ())
    }

    /// Start a native chainable atomic operation
    fn atomic(&self) -> AtomicBuilder<'_, Self>
    where
        Self: Sized,
    {
        AtomicBuilder::new(self)
    }
}
